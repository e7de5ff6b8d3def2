//! Integration tests for storing table images in blob stores.

use std::sync::Arc;
use std::thread;
use tbl_core::prelude::*;
use tempfile::TempDir;

fn sample_tree() -> Table<f64> {
    let mut points = Table::<f64>::new();
    points.extend_from_slice(&[0.0, 1.0, 0.0, 1.0, 1.0, 1.0]).unwrap();
    points.insert("stride", 3u64).unwrap();

    let mut root = Table::<f64>::new();
    root.insert("points", points).unwrap();
    root.insert("scale", 0.5f64).unwrap();
    root
}

fn check_tree(table: &Table<f64>) {
    assert_eq!(table.value_as::<f64>("scale").unwrap(), 0.5);
    let points = table.child::<f64>("points").unwrap();
    assert_eq!(points.len(), 6);
    assert_eq!(points.value_as::<u64>("stride").unwrap(), 3);
}

#[test]
fn test_memory_store_round_trip() {
    let store = MemoryStore::new();
    let mut tree = sample_tree();
    store_table(&store, "mesh", &mut tree).unwrap();

    let loaded: Table<f64> = load_table(&store, "mesh").unwrap();
    check_tree(&loaded);
}

#[test]
fn test_dir_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = DirStore::open(dir.path()).unwrap();
    let mut tree = sample_tree();
    let written = store_table(&store, "meshes/cube", &mut tree).unwrap();

    assert_eq!(store.size("meshes/cube").unwrap(), Some(written));
    assert_eq!(store.keys().unwrap(), vec!["meshes/cube"]);

    let loaded: Table<f64> = load_table(&store, "meshes/cube").unwrap();
    check_tree(&loaded);
}

#[test]
fn test_store_shared_across_threads() {
    let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());

    let handles: Vec<_> = (0..4u64)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut table = Table::<u64>::new();
                table.push(i).unwrap();
                store_table(store.as_ref(), &format!("t{}", i), &mut table).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.keys().unwrap().len(), 4);
    for i in 0..4u64 {
        let table: Table<u64> = load_table(store.as_ref(), &format!("t{}", i)).unwrap();
        assert_eq!(table.to_vec(), vec![i]);
    }
}
