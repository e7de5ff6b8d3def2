//! Robin Hood open-addressing map over a slot segment.
//!
//! The map engine works on the raw bytes of a map segment. It never resizes
//! the segment itself; growth is driven by the table's layout manager, which
//! hands a fresh, larger segment to [`rebuild`].

mod hash;
mod probe;
mod slot;

pub use hash::{fnv1a_64, key_hash};
pub use probe::{Lookup, Placement, displacement, find, ideal, max_displacement, place, rebuild, reorder};
pub use slot::{SlotKey, SlotRecord};

use crate::layout::SLOT_SIZE;
use crate::types::TypeTag;

/// Read-only access to a map segment.
#[derive(Clone, Copy)]
pub struct Slots<'a> {
    bytes: &'a [u8],
}

impl<'a> Slots<'a> {
    /// Wrap a segment of `mapcap * SLOT_SIZE` bytes.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        debug_assert_eq!(bytes.len() % SLOT_SIZE, 0);
        Self { bytes }
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len() / SLOT_SIZE
    }

    /// Decode slot `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> SlotRecord {
        SlotRecord::read(&self.bytes[index * SLOT_SIZE..(index + 1) * SLOT_SIZE])
    }

    /// Tag of slot `index`.
    #[must_use]
    pub fn tag(&self, index: usize) -> TypeTag {
        self.get(index).tag
    }

    /// Iterate over `(index, record)` for every occupied slot.
    pub fn occupied(self) -> impl Iterator<Item = (usize, SlotRecord)> + 'a {
        (0..self.capacity())
            .map(move |i| (i, self.get(i)))
            .filter(|(_, record)| !record.is_empty())
    }
}

/// Mutable access to a map segment.
pub struct SlotsMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> SlotsMut<'a> {
    /// Wrap a segment of `mapcap * SLOT_SIZE` bytes.
    pub fn new(bytes: &'a mut [u8]) -> Self {
        debug_assert_eq!(bytes.len() % SLOT_SIZE, 0);
        Self { bytes }
    }

    /// Reborrow as read-only.
    #[must_use]
    pub fn as_slots(&self) -> Slots<'_> {
        Slots::new(self.bytes)
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len() / SLOT_SIZE
    }

    /// Decode slot `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> SlotRecord {
        self.as_slots().get(index)
    }

    /// Encode `record` into slot `index`.
    pub fn put(&mut self, index: usize, record: &SlotRecord) {
        record.write(&mut self.bytes[index * SLOT_SIZE..(index + 1) * SLOT_SIZE]);
    }

    /// Mark every slot EMPTY.
    pub fn clear(&mut self) {
        for index in 0..self.capacity() {
            self.put(index, &SlotRecord::EMPTY);
        }
    }
}
