//! Read-only views over table images.
//!
//! A [`TableView`] interprets bytes it does not own. Construction validates
//! everything that later accesses rely on: the magic value, the size
//! invariant, every occupied slot and every child offset. Child images are
//! validated again when they are opened.

use super::Table;
use crate::config::DEFAULT_MAX_NESTING_DEPTH;
use crate::error::{Result, TblError};
use crate::layout::{HEADER_SIZE, Header, Layout, SLOT_SIZE};
use crate::map::{self, Lookup, SlotKey, SlotRecord, Slots};
use crate::types::{ChildRef, Element, FromValue, TypeTag, Value};
use std::fmt::Write as _;
use std::marker::PhantomData;
use std::slice::ChunksExact;

/// Array elements shown per table by [`TableView::tree`].
const TREE_PREVIEW: usize = 8;

/// Decode a slot that holds a scalar or a child reference.
pub(super) fn decode_stored(record: &SlotRecord, base: u64) -> Result<Value> {
    match record.tag {
        TypeTag::U64 => Ok(Value::U64(record.value)),
        TypeTag::I64 => Ok(Value::I64(record.value as i64)),
        TypeTag::F64 => Ok(Value::F64(f64::from_bits(record.value))),
        tag if tag.is_child() && tag.is_storable() => {
            Ok(Value::Child(ChildRef::new(tag, record.value, base)))
        }
        tag => Err(TblError::malformed(
            0,
            format!("slot '{}' holds unreadable tag {}", record.key_str(), tag),
        )),
    }
}

/// Validate an image and return its header.
pub(crate) fn validate_image<T: Element>(bytes: &[u8]) -> Result<Header> {
    let header = Header::from_bytes(bytes)?;
    header.validate(T::SIZE, bytes.len())?;

    let layout = Layout::of(&header, T::SIZE);
    let slots = Slots::new(&bytes[layout.map_range()]);
    let mut occupied = 0u64;

    for (index, record) in slots.occupied() {
        let at = layout.map_offset() + index * SLOT_SIZE;
        occupied += 1;

        if !record.tag.is_storable() || record.tag.is_live_table() {
            return Err(TblError::malformed(
                at,
                format!("slot {} holds tag {}, which an image cannot store", index, record.tag),
            ));
        }

        let canonical = std::str::from_utf8(record.key_bytes())
            .ok()
            .and_then(|key| SlotKey::new(key).ok())
            .map(|key| SlotRecord::occupied(&key, record.tag, record.value));
        match canonical {
            Some(expected) if expected.key == record.key && expected.hash == record.hash => {}
            _ => {
                return Err(TblError::malformed(
                    at + 4,
                    format!("slot {} has a corrupt key or hash", index),
                ));
            }
        }

        if record.tag.is_child() {
            let start = record.value;
            let fits = start >= layout.child_offset() as u64
                && start
                    .checked_add(HEADER_SIZE as u64)
                    .is_some_and(|end| end <= header.size_bytes());
            if !fits {
                return Err(TblError::ChildOutOfBounds {
                    offset: start,
                    size: header.size_bytes(),
                });
            }
        }
    }

    if occupied != header.elems() {
        return Err(TblError::malformed(
            8,
            format!(
                "header records {} entries but {} slots are occupied",
                header.elems(),
                occupied
            ),
        ));
    }

    Ok(header)
}

/// Iterator over the array elements of a table.
pub struct Elements<'a, T> {
    chunks: ChunksExact<'a, u8>,
    _element: PhantomData<T>,
}

impl<T: Element> Iterator for Elements<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.chunks.next().map(T::read)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<T: Element> ExactSizeIterator for Elements<'_, T> {}

/// A non-owning, read-only table over borrowed bytes.
#[derive(Clone, Copy, Debug)]
pub struct TableView<'a, T: Element> {
    bytes: &'a [u8],
    header: Header,
    base: u64,
    _element: PhantomData<T>,
}

impl<'a, T: Element> TableView<'a, T> {
    /// Interpret `bytes` as a table image without copying them.
    ///
    /// Bytes past the recorded size are ignored.
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        Self::at(bytes, 0)
    }

    /// View of an image starting `base` bytes into the outermost image.
    fn at(bytes: &'a [u8], base: u64) -> Result<Self> {
        let header = validate_image::<T>(bytes).inspect_err(|e| {
            tracing::warn!(base, code = e.code(), error = %e, "Rejected table image");
        })?;
        Ok(Self::trusted(
            &bytes[..header.size_bytes() as usize],
            header,
            base,
        ))
    }

    /// View of bytes known to hold a consistent image.
    pub(crate) fn trusted(bytes: &'a [u8], header: Header, base: u64) -> Self {
        Self {
            bytes,
            header,
            base,
            _element: PhantomData,
        }
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

    /// Position of this image within the outermost image.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// The image bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Total bytes of the image.
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

    fn slots(&self) -> Slots<'a> {
        Slots::new(&self.bytes[self.layout().map_range()])
    }

    // =========================================================================
    // Array
    // =========================================================================

    /// Get the element at `index`.
    pub fn get(&self, index: usize) -> Result<T> {
        if index >= self.len() {
            return Err(TblError::OutOfRange {
                index: index as u64,
                len: self.len() as u64,
            });
        }
        Ok(T::read(&self.bytes[self.layout().element_range(index)]))
    }

    /// First element.
    #[must_use]
    pub fn front(&self) -> Option<T> {
        self.get(0).ok()
    }

    /// Last element.
    #[must_use]
    pub fn back(&self) -> Option<T> {
        self.len().checked_sub(1).and_then(|i| self.get(i).ok())
    }

    /// Iterate over the array elements.
    #[must_use]
    pub fn iter(&self) -> Elements<'a, T> {
        let end = HEADER_SIZE + self.len() * T::SIZE;
        Elements {
            chunks: self.bytes[HEADER_SIZE..end].chunks_exact(T::SIZE),
            _element: PhantomData,
        }
    }

    /// Copy the array into a `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    // =========================================================================
    // Map
    // =========================================================================

    /// Probe for `key`.
    pub fn lookup(&self, key: &str) -> Result<Lookup> {
        let key = SlotKey::new(key)?;
        Ok(map::find(self.slots(), &key))
    }

    /// Check if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        matches!(self.lookup(key), Ok(Lookup::Found(_)))
    }

    fn found(&self, key: &str) -> Result<SlotRecord> {
        match self.lookup(key)? {
            Lookup::Found(index) => Ok(self.slots().get(index)),
            Lookup::Absent { .. } => Err(TblError::KeyNotFound {
                key: key.to_string(),
            }),
        }
    }

    /// Get the value stored under `key`.
    pub fn value(&self, key: &str) -> Result<Value> {
        decode_stored(&self.found(key)?, self.base)
    }

    /// Get the value under `key` as exactly `V`.
    pub fn value_as<V: FromValue>(&self, key: &str) -> Result<V> {
        V::from_value(key, &self.value(key)?)
    }

    /// Iterate over `(key, value)` pairs in slot order.
    pub fn entries(self) -> impl Iterator<Item = (String, Value)> + 'a {
        let base = self.base;
        self.slots().occupied().filter_map(move |(_, record)| {
            decode_stored(&record, base)
                .ok()
                .map(|value| (record.key_str().to_string(), value))
        })
    }

    /// Iterate over keys in slot order.
    pub fn keys(self) -> impl Iterator<Item = String> + 'a {
        self.slots()
            .occupied()
            .map(|(_, record)| record.key_str().to_string())
    }

    /// Get the child reference stored under `key`.
    pub fn child_ref(&self, key: &str) -> Result<ChildRef> {
        let record = self.found(key)?;
        if !record.tag.is_child() {
            return Err(TblError::KeyTypeMismatch {
                key: key.to_string(),
                stored: record.tag,
                requested: record.tag.as_table().with_child(),
            });
        }
        Ok(ChildRef::new(record.tag, record.value, self.base))
    }

    /// Open the flattened table stored under `key`.
    ///
    /// The child's element kind must be `U`. Its offset and image are
    /// re-validated against this table's bytes before anything is read.
    pub fn child<U: Element>(&self, key: &str) -> Result<TableView<'a, U>> {
        let record = self.found(key)?;
        let requested = U::TAG.as_table().with_child();
        if record.tag != requested {
            return Err(TblError::KeyTypeMismatch {
                key: key.to_string(),
                stored: record.tag,
                requested,
            });
        }

        let offset = record.value;
        if offset < self.layout().child_offset() as u64 || offset >= self.size_bytes() {
            return Err(TblError::ChildOutOfBounds {
                offset,
                size: self.size_bytes(),
            });
        }
        TableView::at(&self.bytes[offset as usize..], self.base + offset)
    }

    /// Ideal bucket of the entry at slot `index`.
    #[must_use]
    pub fn ideal(&self, index: usize) -> Option<usize> {
        if index >= self.map_capacity() {
            return None;
        }
        let record = self.slots().get(index);
        (!record.is_empty()).then(|| map::ideal(record.hash, self.map_capacity()))
    }

    /// Distance of the entry at slot `index` from its ideal bucket.
    #[must_use]
    pub fn displacement(&self, index: usize) -> Option<usize> {
        if index >= self.map_capacity() {
            return None;
        }
        let record = self.slots().get(index);
        (!record.is_empty()).then(|| map::displacement(index, record.hash, self.map_capacity()))
    }

    /// Largest displacement of any entry.
    #[must_use]
    pub fn max_displacement(&self) -> usize {
        map::max_displacement(self.slots())
    }

    /// Copy this image into a new owning table.
    ///
    /// This is the only way to modify the contents of a child.
    pub fn to_owned_table(&self) -> Result<Table<T>> {
        Table::from_image(self.bytes.to_vec())
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Render the table and its children as an indented description.
    ///
    /// Children nested deeper than [`DEFAULT_MAX_NESTING_DEPTH`] are not
    /// opened; an error line marks where rendering stopped.
    #[must_use]
    pub fn tree(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, 0);
        out
    }

    fn render(&self, out: &mut String, level: usize) {
        let indent = "    ".repeat(level);
        let _ = writeln!(
            out,
            "{}table<{}> len={} cap={} elems={} mapcap={} bytes={}",
            indent,
            T::TAG,
            self.len(),
            self.capacity(),
            self.elems(),
            self.map_capacity(),
            self.size_bytes()
        );

        if !self.is_empty() {
            let preview: Vec<String> = self
                .iter()
                .take(TREE_PREVIEW)
                .map(|v| format!("{:?}", v))
                .collect();
            let more = if self.len() > TREE_PREVIEW { ", ..." } else { "" };
            let _ = writeln!(out, "{}  [{}{}]", indent, preview.join(", "), more);
        }

        for (key, value) in self.entries() {
            let _ = writeln!(out, "{}  {} = {}", indent, key, value);
            let Value::Child(child) = value else {
                continue;
            };
            let next = level + 1;
            let rendered = if next > DEFAULT_MAX_NESTING_DEPTH {
                Err(TblError::CyclicReference { depth: next })
            } else {
                match child.element_tag() {
                    TypeTag::U64 => self.child::<u64>(&key).map(|c| c.render(out, next)),
                    TypeTag::I64 => self.child::<i64>(&key).map(|c| c.render(out, next)),
                    _ => self.child::<f64>(&key).map(|c| c.render(out, next)),
                }
            };
            if let Err(e) = rendered {
                let _ = writeln!(out, "{}    <{}>", indent, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;

    /// Build an image in which every level holds one child, `levels` deep.
    ///
    /// Each level is a header plus one slot, so the image is small even when
    /// the nesting is far deeper than any tree a table could flatten.
    fn chain_image(levels: usize) -> Vec<u8> {
        let level_bytes = HEADER_SIZE + SLOT_SIZE;
        let key = SlotKey::new("c").unwrap();
        let mut image = vec![0u8; levels * level_bytes + HEADER_SIZE];

        for depth in 0..levels {
            let start = depth * level_bytes;
            let mut header = Header::new();
            header.set_mapcap(1).unwrap();
            header.set_elems(1).unwrap();
            header
                .set_size_bytes((image.len() - start) as u64)
                .unwrap();
            header.set_owned(depth == 0);
            header.write_to(&mut image[start..]);

            let slot = SlotRecord::occupied(&key, TypeTag::CHILD_U64, level_bytes as u64);
            slot.write(&mut image[start + HEADER_SIZE..start + level_bytes]);
        }
        Header::new().write_to(&mut image[levels * level_bytes..]);
        image
    }

    fn sample() -> Table<u64> {
        let mut table =
            Table::with_config(&TableConfig::default().with_map_capacity(4)).unwrap();
        table.extend_from_slice(&[10, 20, 30]).unwrap();
        table.insert("x", 1u64).unwrap();
        table.insert("y", -1i64).unwrap();
        table
    }

    #[test]
    fn view_reads_everything() {
        let table = sample();
        let view = TableView::<u64>::new(table.as_bytes()).unwrap();
        assert_eq!(view.len(), 3);
        assert_eq!(view.to_vec(), vec![10, 20, 30]);
        assert_eq!(view.back(), Some(30));
        assert_eq!(view.value("x").unwrap(), Value::U64(1));
        assert_eq!(view.value_as::<i64>("y").unwrap(), -1);
        assert!(view.contains_key("y"));
        assert!(!view.contains_key("z"));
        assert_eq!(view.keys().count(), 2);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let table = sample();
        let mut bytes = table.as_bytes().to_vec();
        bytes.extend_from_slice(&[0xEE; 16]);
        let view = TableView::<u64>::new(&bytes).unwrap();
        assert_eq!(view.as_bytes().len() as u64, table.size_bytes());
    }

    #[test]
    fn missing_magic_is_rejected() {
        let table = sample();
        let mut bytes = table.as_bytes().to_vec();
        bytes[1] = b'x';
        let err = TableView::<u64>::new(&bytes).unwrap_err();
        assert_eq!(err.code(), "E201");
    }

    #[test]
    fn truncated_image_is_rejected() {
        let table = sample();
        let bytes = &table.as_bytes()[..table.as_bytes().len() - 1];
        assert!(TableView::<u64>::new(bytes).unwrap_err().is_image_error());
    }

    #[test]
    fn inconsistent_counts_are_rejected() {
        let table = sample();
        let mut bytes = table.as_bytes().to_vec();
        let mut header = Header::from_bytes(&bytes).unwrap();
        header.set_elems(1).unwrap();
        header.write_to(&mut bytes);
        assert!(TableView::<u64>::new(&bytes).is_err());
    }

    #[test]
    fn corrupt_key_is_rejected() {
        let table = sample();
        let mut bytes = table.as_bytes().to_vec();
        let layout = table.layout();
        let index = (0..layout.mapcap)
            .find(|&i| table.view().ideal(i).is_some())
            .unwrap();
        // Flip a key byte without touching the stored hash.
        bytes[layout.map_offset() + index * SLOT_SIZE + 4] ^= 0x01;
        assert!(TableView::<u64>::new(&bytes).is_err());
    }

    #[test]
    fn live_tags_are_rejected() {
        let mut table = sample();
        table.insert("t", Table::<u64>::new()).unwrap();
        let err = TableView::<u64>::new(table.as_bytes()).unwrap_err();
        assert_eq!(err.code(), "E201");
    }

    #[test]
    fn out_of_range_view_access() {
        let table = sample();
        let view = table.view();
        assert_eq!(
            view.get(3).unwrap_err(),
            TblError::OutOfRange { index: 3, len: 3 }
        );
    }

    #[test]
    fn tree_lists_entries() {
        let table = sample();
        let tree = table.view().tree();
        assert!(tree.starts_with("table<u64> len=3"));
        assert!(tree.contains("[10, 20, 30]"));
        assert!(tree.contains("x = 1"));
        assert!(tree.contains("y = -1"));
    }

    #[test]
    fn tree_of_nested_children_is_indented() {
        let image = chain_image(2);
        let tree = TableView::<u64>::new(&image).unwrap().tree();
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[2].starts_with("    table<u64>"));
        assert!(lines[4].starts_with("        table<u64>"));
    }

    #[test]
    fn tree_stops_at_the_nesting_limit() {
        let image = chain_image(50_000);
        let view = TableView::<u64>::new(&image).unwrap();
        let tree = view.tree();
        assert_eq!(
            tree.matches("table<u64>").count(),
            DEFAULT_MAX_NESTING_DEPTH + 1
        );
        assert!(tree.contains("E203"));
    }

    #[test]
    fn owned_copy_is_independent() {
        let table = sample();
        let view = table.view();
        let mut copy = view.to_owned_table().unwrap();
        copy.push(40).unwrap();
        assert_eq!(copy.len(), 4);
        assert_eq!(view.len(), 3);
        assert!(copy.header().owned());
    }
}
