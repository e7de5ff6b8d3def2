//! Table compaction for reclaiming unused capacity.
//!
//! Compaction rebuilds the block at its minimum size: the array capacity
//! drops to the array length, the map capacity to the number of entries,
//! and the child region keeps only images still referenced by a CHILD slot.

use super::Table;
use crate::error::Result;
use crate::layout::{HEADER_SIZE, Header, Layout, allocate_block, required_bytes};
use crate::map::{self, Slots, SlotsMut};
use crate::types::Element;
use std::collections::HashMap;

/// Result of a compaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionResult {
    /// Map from old child offsets to new child offsets.
    pub offset_map: HashMap<u64, u64>,
    /// Block size before compaction.
    pub bytes_before: u64,
    /// Block size after compaction.
    pub bytes_after: u64,
    /// Number of child images carried over.
    pub children_kept: usize,
}

impl CompactionResult {
    /// Bytes released by the compaction.
    #[must_use]
    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

impl<T: Element> Table<T> {
    /// Rebuild this table's block at its minimum size.
    ///
    /// Live nested tables stay live. Child images that no slot references
    /// any more (left behind by `remove` or overwrites) are dropped.
    ///
    /// The map keeps exactly one slot per entry, so a compacted map is full:
    /// a lookup of an absent key walks every slot, and the next new key
    /// grows the map before it is placed. Compact tables that are done
    /// changing, such as images about to be stored or sent.
    pub fn compact(&mut self) -> Result<CompactionResult> {
        let old = self.layout();
        let bytes_before = self.size_bytes();

        // Plan the new child region in slot order.
        let mut images: Vec<(u64, u64)> = Vec::new();
        let mut child_bytes = 0u64;
        for (_, record) in self.slots().occupied() {
            if !record.tag.is_child() || images.iter().any(|(at, _)| *at == record.value) {
                continue;
            }
            let start = record.value as usize;
            let size = Header::from_bytes(&self.block[start..])?.size_bytes();
            images.push((record.value, size));
            child_bytes += size;
        }

        let capacity = self.header.size();
        let mapcap = self.header.elems();
        let mut header = self.header;
        header.set_capacity(capacity)?;
        header.set_mapcap(mapcap)?;
        header.set_size_bytes(required_bytes(T::SIZE, capacity, mapcap, child_bytes)?)?;

        let mut next = allocate_block(header.size_bytes())?;
        let new = Layout::of(&header, T::SIZE);

        let array_bytes = self.len() * T::SIZE;
        next[HEADER_SIZE..HEADER_SIZE + array_bytes]
            .copy_from_slice(&self.block[HEADER_SIZE..HEADER_SIZE + array_bytes]);

        let mut offset_map = HashMap::with_capacity(images.len());
        let mut cursor = new.child_offset();
        for (start, size) in &images {
            let (start, size) = (*start as usize, *size as usize);
            next[cursor..cursor + size].copy_from_slice(&self.block[start..start + size]);
            offset_map.insert(start as u64, cursor as u64);
            cursor += size;
        }

        let old_slots = Slots::new(&self.block[old.map_range()]);
        let mut new_slots = SlotsMut::new(&mut next[new.map_range()]);
        map::rebuild(old_slots, &mut new_slots, |record| {
            if record.tag.is_child() {
                if let Some(moved) = offset_map.get(&record.value) {
                    record.value = *moved;
                }
            }
        })?;
        map::reorder(&mut new_slots)?;

        header.write_to(&mut next);

        let result = CompactionResult {
            offset_map,
            bytes_before,
            bytes_after: header.size_bytes(),
            children_kept: images.len(),
        };
        tracing::debug!(
            bytes_before,
            bytes_after = result.bytes_after,
            children_kept = result.children_kept,
            capacity,
            mapcap,
            "Compacted table"
        );

        self.block = next;
        self.header = header;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::types::Value;

    fn leaf(values: &[u64]) -> Table<u64> {
        let mut table = Table::new();
        table.extend_from_slice(values).unwrap();
        table
    }

    #[test]
    fn compact_shrinks_to_contents() {
        let config = TableConfig::default()
            .with_array_capacity(100)
            .with_map_capacity(64);
        let mut table = Table::<u32>::with_config(&config).unwrap();
        table.extend_from_slice(&[1, 2, 3]).unwrap();
        table.insert("a", 1u64).unwrap();
        table.insert("b", 2u64).unwrap();

        let result = table.compact().unwrap();
        assert_eq!(table.capacity(), 3);
        assert_eq!(table.map_capacity(), 2);
        assert_eq!(
            table.size_bytes(),
            (HEADER_SIZE + 3 * 4 + 2 * crate::layout::SLOT_SIZE) as u64
        );
        assert!(result.bytes_reclaimed() > 0);
        assert_eq!(table.to_vec(), vec![1, 2, 3]);
        assert_eq!(table.value("a").unwrap(), Value::U64(1));
        assert_eq!(table.value("b").unwrap(), Value::U64(2));
        assert!(!table.contains_key("c"));
    }

    #[test]
    fn compact_drops_dead_children() {
        let mut table = Table::<u64>::new();
        table.insert("keep", leaf(&[1, 2])).unwrap();
        table.insert("drop", leaf(&[3, 4, 5])).unwrap();
        table.flatten().unwrap();
        assert!(table.remove("drop").unwrap());
        let before = table.size_bytes();

        let result = table.compact().unwrap();
        assert_eq!(result.children_kept, 1);
        assert!(table.size_bytes() < before);
        assert_eq!(table.child::<u64>("keep").unwrap().to_vec(), vec![1, 2]);
        assert!(crate::table::TableView::<u64>::new(table.as_bytes()).is_ok());
    }

    #[test]
    fn insert_after_compaction_grows() {
        let mut table = Table::<u64>::new();
        for key in ["a", "b", "c"] {
            table.insert(key, 1u64).unwrap();
        }
        table.compact().unwrap();
        assert_eq!(table.map_capacity(), 3);

        table.insert("d", 4u64).unwrap();
        assert!(table.map_capacity() > 3);
        for key in ["a", "b", "c"] {
            assert_eq!(table.value_as::<u64>(key).unwrap(), 1);
        }
        assert_eq!(table.value_as::<u64>("d").unwrap(), 4);
    }

    #[test]
    fn full_map_after_compaction_still_answers_lookups() {
        let mut table = Table::<u64>::new();
        for key in ["a", "b", "c", "d", "e"] {
            table.insert(key, 1u64).unwrap();
        }
        table.compact().unwrap();
        assert_eq!(table.map_capacity(), table.elems());

        assert_eq!(
            table.lookup("absent").unwrap(),
            map::Lookup::Absent { insert_at: None }
        );
        assert!(!table.contains_key("absent"));
        for key in ["a", "b", "c", "d", "e"] {
            assert!(table.contains_key(key));
        }
    }

    #[test]
    fn compact_empty_table() {
        let mut table = Table::<f64>::with_capacity(10).unwrap();
        table.compact().unwrap();
        assert_eq!(table.size_bytes(), HEADER_SIZE as u64);
    }
}
