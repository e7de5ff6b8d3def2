//! Validate command - check an image and every table embedded in it.

use super::{ElemKind, JsonElement, read_image, walk};
use anyhow::{Result, bail};
use std::path::Path;
use tbl_core::TableView;

/// Run the validate command.
pub fn run(file: &Path, elem: ElemKind) -> Result<()> {
    tracing::info!(file = %file.display(), %elem, "Validating image");
    let bytes = read_image(file)?;

    let outcome = match elem {
        ElemKind::U64 => check::<u64>(&bytes),
        ElemKind::I64 => check::<i64>(&bytes),
        ElemKind::F64 => check::<f64>(&bytes),
    };

    match outcome {
        Ok(tables) => {
            println!(
                "✓ {} is a valid table<{}> image ({} bytes, {} table{})",
                file.display(),
                elem,
                bytes.len(),
                tables,
                if tables == 1 { "" } else { "s" }
            );
            Ok(())
        }
        Err(e) => {
            println!("✗ {} is not a valid table<{}> image", file.display(), elem);
            println!("  [{}] {}", e.code(), e);
            bail!("Validation failed with {}", e.code())
        }
    }
}

/// Validate the image and all embedded children, returning the table count.
pub fn check<T: JsonElement>(bytes: &[u8]) -> tbl_core::Result<usize> {
    let view = TableView::<T>::new(bytes)?;
    let mut tables = 0;
    walk(&view, "/", &mut |_, _| tables += 1)?;
    Ok(tables)
}
