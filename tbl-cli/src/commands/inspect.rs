//! Inspect command - describe the header, segments and contents of an image.

use super::{ElemKind, JsonElement, read_image, walk};
use anyhow::{Context, Result};
use std::path::Path;
use tbl_core::TableView;

/// Run the inspect command.
pub fn run(file: &Path, elem: ElemKind, entries: bool) -> Result<()> {
    tracing::info!(file = %file.display(), %elem, entries, "Inspecting image");
    let bytes = read_image(file)?;
    let report = match elem {
        ElemKind::U64 => describe::<u64>(&bytes, entries),
        ElemKind::I64 => describe::<i64>(&bytes, entries),
        ElemKind::F64 => describe::<f64>(&bytes, entries),
    }
    .with_context(|| format!("Failed to read table image: {}", file.display()))?;

    print!("{}", report);
    Ok(())
}

/// Render the inspection report for an image.
pub fn describe<T: JsonElement>(bytes: &[u8], entries: bool) -> tbl_core::Result<String> {
    let view = TableView::<T>::new(bytes)?;
    let header = view.header();
    let layout = view.layout();
    let mut out = String::new();

    out.push_str("Header\n");
    out.push_str("======\n");
    out.push_str(&format!("Size:          {} bytes\n", header.size_bytes()));
    out.push_str(&format!("Owned:         {}\n", header.owned()));
    out.push_str(&format!(
        "Array:         {} / {} elements of {}\n",
        header.size(),
        header.capacity(),
        T::TAG
    ));
    out.push_str(&format!(
        "Map:           {} / {} slots (load {:.2})\n",
        header.elems(),
        header.mapcap(),
        if header.mapcap() == 0 {
            0.0
        } else {
            header.elems() as f64 / header.mapcap() as f64
        }
    ));
    out.push('\n');

    out.push_str("Segments\n");
    out.push_str("========\n");
    out.push_str(&format!(
        "array   @ {:>8}  ({} bytes)\n",
        layout.array_offset(),
        layout.map_offset() - layout.array_offset()
    ));
    out.push_str(&format!(
        "map     @ {:>8}  ({} bytes)\n",
        layout.map_offset(),
        layout.child_offset() - layout.map_offset()
    ));
    out.push_str(&format!(
        "children@ {:>8}  ({} bytes)\n",
        layout.child_offset(),
        layout.child_bytes()
    ));
    out.push('\n');

    if entries {
        out.push_str("Slots\n");
        out.push_str("=====\n");
        for (key, value) in view.entries() {
            let slot = view.lookup(&key)?.found();
            let (index, ideal, displacement) = match slot {
                Some(index) => (
                    index,
                    view.ideal(index).unwrap_or(index),
                    view.displacement(index).unwrap_or(0),
                ),
                None => continue,
            };
            out.push_str(&format!(
                "[{:>5}] ideal={:<5} dist={:<3} {:<42} {} ({})\n",
                index,
                ideal,
                displacement,
                key,
                value,
                value.tag()
            ));
        }
        out.push_str(&format!("max displacement: {}\n\n", view.max_displacement()));
    }

    out.push_str("Tree\n");
    out.push_str("====\n");
    out.push_str(&view.tree());

    let mut tables = Vec::new();
    walk(&view, "/", &mut |path, summary| {
        tables.push((path.to_string(), summary));
    })?;
    if tables.len() > 1 {
        out.push('\n');
        out.push_str("Tables\n");
        out.push_str("======\n");
        for (path, summary) in tables {
            out.push_str(&format!(
                "{:<30} {:<4} len={:<6} elems={:<6} max_dist={:<4} bytes={}\n",
                path,
                summary.element.to_string(),
                summary.len,
                summary.elems,
                summary.max_displacement,
                summary.size_bytes
            ));
        }
    }

    Ok(out)
}
