//! The hybrid table: a dense array and a string-keyed map in one block.
//!
//! A [`Table`] owns its block. Every capacity change goes through a single
//! relayout that builds the new block completely before swapping it in, so a
//! failed allocation leaves the previous block untouched.
//!
//! # Example
//!
//! ```
//! use tbl_core::{Table, Value};
//!
//! let mut table = Table::<f64>::new();
//! table.push(1.0)?;
//! table.insert("scale", 2u64)?;
//!
//! assert_eq!(table.get(0)?, 1.0);
//! assert_eq!(table.value("scale")?, Value::U64(2));
//! # Ok::<(), tbl_core::TblError>(())
//! ```

mod compaction;
mod entries;
mod flatten;
mod ops;
mod view;

pub use compaction::CompactionResult;
pub use entries::SlotMut;
pub use ops::KeyPrecedence;
pub use view::{Elements, TableView};

use crate::config::{DEFAULT_MAX_NESTING_DEPTH, TableConfig};
use crate::error::{Result, TblError};
use crate::layout::{
    HEADER_SIZE, Header, Layout, SLOT_SIZE, allocate_block, grown_capacity, required_bytes,
};
use crate::map::{self, Slots, SlotsMut};
use crate::types::{Element, LiveTable};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A heap-resident table that other tables may reference.
pub type SharedTable<T> = Arc<RwLock<Table<T>>>;

/// An owning table over one contiguous block.
#[derive(Clone)]
pub struct Table<T: Element> {
    /// The block: header, array segment, map segment, child region.
    block: Vec<u8>,
    /// Decoded copy of the block's header.
    header: Header,
    /// Live nested tables, keyed by the handle stored in their slot.
    live: HashMap<u64, LiveTable>,
    /// Next live handle to hand out.
    next_handle: u64,
    /// Nesting limit for flattening.
    max_nesting_depth: usize,
    _element: PhantomData<T>,
}

impl<T: Element> Table<T> {
    /// Create an empty table with no capacity.
    #[must_use]
    pub fn new() -> Self {
        let header = Header::new();
        Self {
            block: header.to_bytes().to_vec(),
            header,
            live: HashMap::new(),
            next_handle: 1,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            _element: PhantomData,
        }
    }

    /// Create a table with room for `capacity` array elements.
    pub fn with_capacity(capacity: u64) -> Result<Self> {
        Self::with_config(&TableConfig::default().with_array_capacity(capacity))
    }

    /// Create a table from a configuration.
    pub fn with_config(config: &TableConfig) -> Result<Self> {
        let mut table = Self::new();
        table.max_nesting_depth = config.max_nesting_depth;
        table.reserve(config.array_capacity, config.map_capacity)?;
        Ok(table)
    }

    /// Wrap this table so other tables can reference it.
    #[must_use]
    pub fn into_shared(self) -> SharedTable<T> {
        Arc::new(RwLock::new(self))
    }

    /// Get the decoded header.
    #[must_use]
    pub fn header(&self) -> Header {
        self.header
    }

    /// Get the segment layout.
    #[must_use]
    pub fn layout(&self) -> Layout {
        Layout::of(&self.header, T::SIZE)
    }

    /// Get the raw block.
    ///
    /// While live nested tables remain, their slots hold process-local
    /// handles; call [`flatten`](Self::flatten) first to get a portable image.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.block
    }

    /// Total bytes of the block.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.header.size_bytes()
    }

    /// Array length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.header.size() as usize
    }

    /// Check if the array is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Array capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.header.capacity() as usize
    }

    /// Occupied map slots.
    #[must_use]
    pub fn elems(&self) -> usize {
        self.header.elems() as usize
    }

    /// Map slot capacity.
    #[must_use]
    pub fn map_capacity(&self) -> usize {
        self.header.mapcap() as usize
    }

    /// Number of live nested tables referenced from the map.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// A read-only view of this table's block.
    #[must_use]
    pub fn view(&self) -> TableView<'_, T> {
        TableView::trusted(&self.block, self.header, 0)
    }

    // =========================================================================
    // Layout manager
    // =========================================================================

    /// Ensure room for `capacity` array elements and `mapcap` map slots.
    ///
    /// Dimensions never shrink here; use [`compact`](Self::compact) for that.
    pub fn reserve(&mut self, capacity: u64, mapcap: u64) -> Result<()> {
        let capacity = capacity.max(self.header.capacity());
        let mapcap = mapcap.max(self.header.mapcap());
        if capacity == self.header.capacity() && mapcap == self.header.mapcap() {
            return Ok(());
        }
        self.relayout(capacity, mapcap)
    }

    /// Grow the array, the map, or both by one growth step.
    pub fn expand(&mut self, array: bool, map: bool) -> Result<()> {
        let capacity = if array {
            grown_capacity(self.header.capacity())
        } else {
            self.header.capacity()
        };
        let mapcap = if map {
            grown_capacity(self.header.mapcap())
        } else {
            self.header.mapcap()
        };
        self.reserve(capacity, mapcap)
    }

    /// Build a new block with the given dimensions and swap it in.
    ///
    /// The live array, the map entries and the child region carry over. Child
    /// offsets are shifted by however far the child region moved.
    fn relayout(&mut self, capacity: u64, mapcap: u64) -> Result<()> {
        let old = self.layout();
        let child_bytes = old.child_bytes() as u64;

        let mut header = self.header;
        header.set_capacity(capacity)?;
        header.set_mapcap(mapcap)?;
        header.set_size_bytes(required_bytes(T::SIZE, capacity, mapcap, child_bytes)?)?;

        let mut next = allocate_block(header.size_bytes())?;
        let new = Layout::of(&header, T::SIZE);

        let array_bytes = self.len() * T::SIZE;
        next[HEADER_SIZE..HEADER_SIZE + array_bytes]
            .copy_from_slice(&self.block[HEADER_SIZE..HEADER_SIZE + array_bytes]);
        next[new.child_offset()..].copy_from_slice(&self.block[old.child_offset()..old.size_bytes]);

        let shift = (new.child_offset() - old.child_offset()) as u64;
        let rebase = |record: &mut map::SlotRecord| {
            if record.tag.is_child() {
                record.value += shift;
            }
        };

        let old_slots = Slots::new(&self.block[old.map_range()]);
        let mut new_slots = SlotsMut::new(&mut next[new.map_range()]);
        if new.mapcap == old.mapcap {
            for (index, mut record) in old_slots.occupied() {
                rebase(&mut record);
                new_slots.put(index, &record);
            }
            for index in 0..new.mapcap {
                if old_slots.get(index).is_empty() {
                    new_slots.put(index, &map::SlotRecord::EMPTY);
                }
            }
        } else {
            map::rebuild(old_slots, &mut new_slots, rebase)?;
            map::reorder(&mut new_slots)?;
        }

        header.write_to(&mut next);

        tracing::debug!(
            old_bytes = old.size_bytes,
            new_bytes = header.size_bytes(),
            capacity,
            mapcap,
            child_shift = shift,
            "Relocated table block"
        );

        self.block = next;
        self.header = header;
        Ok(())
    }

    /// Write the cached header back into the block.
    fn commit_header(&mut self) {
        self.header.write_to(&mut self.block[..HEADER_SIZE]);
    }

    fn slots(&self) -> Slots<'_> {
        Slots::new(&self.block[self.layout().map_range()])
    }

    fn slots_mut(&mut self) -> SlotsMut<'_> {
        let range = self.layout().map_range();
        SlotsMut::new(&mut self.block[range])
    }

    fn slot_range(&self, index: usize) -> std::ops::Range<usize> {
        let start = self.layout().map_offset() + index * SLOT_SIZE;
        start..start + SLOT_SIZE
    }

    // =========================================================================
    // Array view
    // =========================================================================

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len() {
            return Err(TblError::OutOfRange {
                index: index as u64,
                len: self.len() as u64,
            });
        }
        Ok(())
    }

    fn write_element(&mut self, index: usize, value: T) {
        let range = self.layout().element_range(index);
        value.write(&mut self.block[range]);
    }

    /// Get the element at `index`.
    pub fn get(&self, index: usize) -> Result<T> {
        self.view().get(index)
    }

    /// Replace the element at `index`.
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        self.check_index(index)?;
        self.write_element(index, value);
        Ok(())
    }

    /// Append an element, growing the array by ×1.5 (at least 4) when full.
    ///
    /// The map segment keeps its capacity.
    pub fn push(&mut self, value: T) -> Result<()> {
        let len = self.len();
        if len == self.capacity() {
            self.expand(true, false)?;
        }
        self.header.set_size(len as u64 + 1)?;
        self.write_element(len, value);
        self.commit_header();
        Ok(())
    }

    /// Remove and return the last element.
    pub fn pop(&mut self) -> Option<T> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let value = self.view().get(len - 1).ok()?;
        self.write_element(len - 1, T::default());
        self.header.set_size(len as u64 - 1).ok()?;
        self.commit_header();
        Some(value)
    }

    /// First element.
    #[must_use]
    pub fn front(&self) -> Option<T> {
        self.view().front()
    }

    /// Last element.
    #[must_use]
    pub fn back(&self) -> Option<T> {
        self.view().back()
    }

    /// Iterate over the array elements.
    pub fn iter(&self) -> Elements<'_, T> {
        self.view().iter()
    }

    /// Copy the array into a `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Append every element of `values`.
    pub fn extend_from_slice(&mut self, values: &[T]) -> Result<()> {
        let len = self.len();
        let needed = len as u64 + values.len() as u64;
        if needed > self.capacity() as u64 {
            let capacity = needed.max(grown_capacity(self.capacity() as u64));
            self.reserve(capacity, self.header.mapcap())?;
        }
        self.header.set_size(needed)?;
        for (offset, value) in values.iter().enumerate() {
            self.write_element(len + offset, *value);
        }
        self.commit_header();
        Ok(())
    }

    /// Resize the array to `len`, filling new elements with `fill`.
    pub fn resize(&mut self, len: usize, fill: T) -> Result<()> {
        let current = self.len();
        if len as u64 > self.capacity() as u64 {
            self.reserve(len as u64, self.header.mapcap())?;
        }
        self.header.set_size(len as u64)?;
        for index in current..len {
            self.write_element(index, fill);
        }
        for index in len..current {
            self.write_element(index, T::default());
        }
        self.commit_header();
        Ok(())
    }

    /// Remove every array element. The map is untouched.
    pub fn clear(&mut self) {
        let len = self.len();
        for index in 0..len {
            self.write_element(index, T::default());
        }
        // Zero always fits the size field.
        let _ = self.header.set_size(0);
        self.commit_header();
    }
}

impl<T: Element> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("element", &T::TAG.name())
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("elems", &self.elems())
            .field("map_capacity", &self.map_capacity())
            .field("size_bytes", &self.size_bytes())
            .field("live", &self.live.len())
            .finish()
    }
}

impl<T: Element> PartialEq<[T]> for Table<T> {
    fn eq(&self, other: &[T]) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a == *b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn new_table_is_a_bare_header() {
        let table = Table::<u64>::new();
        assert_eq!(table.size_bytes(), HEADER_SIZE as u64);
        assert_eq!(table.as_bytes().len(), HEADER_SIZE);
        assert_eq!(&table.as_bytes()[..2], b"tb");
        assert!(table.header().owned());
        assert!(table.is_empty());
    }

    #[test]
    fn size_invariant_holds_after_growth() {
        let mut table = Table::<u32>::with_capacity(3).unwrap();
        for i in 0..10 {
            table.push(i).unwrap();
        }
        table.insert("k", 1u64).unwrap();

        let layout = table.layout();
        assert_eq!(
            table.size_bytes() as usize,
            HEADER_SIZE + layout.capacity * 4 + layout.mapcap * SLOT_SIZE + layout.child_bytes()
        );
        assert_eq!(table.as_bytes().len() as u64, table.size_bytes());
    }

    #[test]
    fn push_growth_steps() {
        let mut table = Table::<u64>::new();
        table.push(1).unwrap();
        assert_eq!(table.capacity(), 4);
        for i in 2..=5 {
            table.push(i).unwrap();
        }
        assert_eq!(table.capacity(), 6);
        assert_eq!(table.to_vec(), vec![1, 2, 3, 4, 5]);
        assert_eq!(table.map_capacity(), 0);
    }

    #[test]
    fn out_of_range_access() {
        let mut table = Table::<i32>::new();
        table.push(-1).unwrap();
        assert_eq!(table.get(0).unwrap(), -1);
        assert_eq!(
            table.get(1).unwrap_err(),
            TblError::OutOfRange { index: 1, len: 1 }
        );
        assert!(table.set(5, 0).is_err());
    }

    #[test]
    fn pop_front_back() {
        let mut table = Table::<f32>::new();
        assert_eq!(table.pop(), None);
        table.extend_from_slice(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(table.front(), Some(1.0));
        assert_eq!(table.back(), Some(3.0));
        assert_eq!(table.pop(), Some(3.0));
        assert_eq!(table.len(), 2);
        assert_eq!(table.back(), Some(2.0));
    }

    #[test]
    fn resize_and_clear() {
        let mut table = Table::<u8>::new();
        table.resize(5, 7).unwrap();
        assert_eq!(table.to_vec(), vec![7; 5]);
        table.resize(2, 0).unwrap();
        assert_eq!(table.to_vec(), vec![7, 7]);

        table.insert("keep", 1u64).unwrap();
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.value("keep").unwrap(), Value::U64(1));
    }

    #[test]
    fn array_growth_keeps_map_entries() {
        let mut table =
            Table::<u64>::with_config(&TableConfig::default().with_map_capacity(8)).unwrap();
        table.insert("a", 1u64).unwrap();
        table.insert("b", -2i64).unwrap();
        for i in 0..50 {
            table.push(i).unwrap();
        }
        assert_eq!(table.map_capacity(), 8);
        assert_eq!(table.value("a").unwrap(), Value::U64(1));
        assert_eq!(table.value("b").unwrap(), Value::I64(-2));
    }

    #[test]
    fn reserve_never_shrinks() {
        let mut table = Table::<u64>::with_capacity(10).unwrap();
        table.reserve(2, 0).unwrap();
        assert_eq!(table.capacity(), 10);
        table.reserve(2, 5).unwrap();
        assert_eq!(table.capacity(), 10);
        assert_eq!(table.map_capacity(), 5);
    }

    #[test]
    fn compares_with_slices() {
        let mut table = Table::<i16>::new();
        table.extend_from_slice(&[3, 4]).unwrap();
        assert!(table == [3i16, 4][..]);
    }
}
