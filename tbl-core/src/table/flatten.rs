//! Flattening a tree of tables into one relocatable image.
//!
//! Each live nested table is snapshotted (its own live children first),
//! appended to the child region, and its slot is rewritten from a live handle
//! to a CHILD reference holding the image's offset from the holder's base.
//! The result contains no process-local handles and can be copied, stored or
//! sent as opaque bytes.

use super::Table;
use super::view::validate_image;
use crate::config::DEFAULT_MAX_NESTING_DEPTH;
use crate::error::{Result, TblError};
use crate::layout::{HEADER_SIZE, Header, SLOT_SIZE};
use crate::types::{Element, LiveTable};
use std::collections::HashMap;
use std::marker::PhantomData;

impl<T: Element> Table<T> {
    /// Embed every live nested table into this table's child region.
    ///
    /// A table with no live nested tables is left byte-for-byte unchanged.
    /// Embedded children are fixed-size; to change one, copy it out with
    /// [`TableView::to_owned_table`](super::TableView::to_owned_table).
    pub fn flatten(&mut self) -> Result<&mut Self> {
        if self.live.is_empty() {
            return Ok(self);
        }

        let image = self.flattened_image_at(0, self.max_nesting_depth)?;
        self.header = Header::from_bytes(&image)?;
        self.block = image;
        self.live.clear();
        Ok(self)
    }

    /// Flatten, then return the image.
    pub fn serialize(&mut self) -> Result<&[u8]> {
        self.flatten()?;
        Ok(self.as_bytes())
    }

    /// Build the flattened image of this table without modifying it.
    ///
    /// `depth` is this table's nesting level and `limit` the deepest level
    /// the outermost table accepts. Live children are locked for reading
    /// while they are copied; a child that cannot be read-locked is an
    /// ancestor being flattened, which means a cycle. A child referenced
    /// from several slots of the same holder is embedded once and the slots
    /// share its offset.
    pub(crate) fn flattened_image_at(&self, depth: usize, limit: usize) -> Result<Vec<u8>> {
        if depth > limit {
            return Err(TblError::CyclicReference { depth });
        }

        let mut image = Vec::new();
        image
            .try_reserve_exact(self.block.len())
            .map_err(|e| TblError::AllocationFailure {
                requested: self.block.len() as u64,
                cause: e.to_string(),
            })?;
        image.extend_from_slice(&self.block);

        let map_offset = self.layout().map_offset();
        let mut embedded: Vec<(&LiveTable, u64)> = Vec::new();
        let mut shared = 0usize;

        for (index, record) in self.slots().occupied() {
            if !record.tag.is_live_table() {
                continue;
            }
            let live = self.live.get(&record.value).ok_or_else(|| {
                TblError::malformed(
                    map_offset + index * SLOT_SIZE,
                    format!("slot '{}' refers to unknown live handle", record.key_str()),
                )
            })?;

            let offset = match embedded.iter().find(|(seen, _)| seen.ptr_eq(live)) {
                Some((_, offset)) => {
                    shared += 1;
                    *offset
                }
                None => {
                    let mut child = live.flattened_image(depth + 1, limit)?;
                    let mut child_header = Header::from_bytes(&child)?;
                    child_header.set_owned(false);
                    child_header.write_to(&mut child[..HEADER_SIZE]);

                    let offset = image.len() as u64;
                    image
                        .try_reserve(child.len())
                        .map_err(|e| TblError::AllocationFailure {
                            requested: (image.len() + child.len()) as u64,
                            cause: e.to_string(),
                        })?;
                    image.extend_from_slice(&child);
                    embedded.push((live, offset));
                    offset
                }
            };

            let mut flattened = record;
            flattened.tag = record.tag.with_child();
            flattened.value = offset;
            let start = map_offset + index * SLOT_SIZE;
            flattened.write(&mut image[start..start + SLOT_SIZE]);
        }

        let mut header = self.header;
        header.set_size_bytes(image.len() as u64)?;
        header.write_to(&mut image[..HEADER_SIZE]);

        if !embedded.is_empty() {
            tracing::debug!(
                depth,
                embedded = embedded.len(),
                shared,
                appended = image.len() - self.block.len(),
                size_bytes = image.len(),
                "Flattened nested tables"
            );
        }
        Ok(image)
    }

    /// Take ownership of an image, validating it exactly like a view.
    ///
    /// The owned bit is set on the adopted block; bytes past the recorded
    /// size are dropped.
    pub fn from_image(mut bytes: Vec<u8>) -> Result<Self> {
        let mut header = validate_image::<T>(&bytes).inspect_err(|e| {
            tracing::warn!(code = e.code(), error = %e, "Rejected table image");
        })?;
        bytes.truncate(header.size_bytes() as usize);
        header.set_owned(true);
        header.write_to(&mut bytes[..HEADER_SIZE]);

        Ok(Self {
            block: bytes,
            header,
            live: HashMap::new(),
            next_handle: 1,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            _element: PhantomData,
        })
    }
}
