//! Map operations of an owning table.

use super::view::decode_stored;
use super::{Table, TableView};
use crate::error::{Result, TblError};
use crate::layout::{exceeds_load_factor, grown_capacity};
use crate::map::{self, Lookup, SlotKey, SlotRecord};
use crate::types::{ChildRef, Element, FromValue, NestedElement, TypeTag, Value};

/// A borrowed map slot returned by [`Table::lookup_or_insert`].
///
/// The borrow ends before any operation that could move the slot.
pub struct SlotMut<'t, T: Element> {
    table: &'t mut Table<T>,
    index: usize,
}

impl<T: Element> SlotMut<'_, T> {
    /// Slot index in the map segment.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Key stored in the slot.
    #[must_use]
    pub fn key(&self) -> String {
        self.table.record(self.index).key_str().to_string()
    }

    /// Current value of the slot.
    pub fn value(&self) -> Result<Value> {
        self.table.decode(&self.table.record(self.index))
    }

    /// Assign a new value.
    pub fn set(self, value: impl Into<Value>) -> Result<()> {
        self.table.write_slot(self.index, value.into())
    }
}

fn unsupported(key: &str, child: &ChildRef) -> TblError {
    TblError::UnsupportedValue {
        key: key.to_string(),
        tag: child.tag(),
    }
}

impl<T: Element> Table<T> {
    pub(super) fn record(&self, index: usize) -> SlotRecord {
        self.slots().get(index)
    }

    /// Decode a slot of this table, resolving live handles.
    pub(super) fn decode(&self, record: &SlotRecord) -> Result<Value> {
        if record.tag.is_live_table() {
            return self
                .live
                .get(&record.value)
                .cloned()
                .map(Value::Table)
                .ok_or_else(|| {
                    TblError::malformed(
                        self.layout().map_offset(),
                        format!(
                            "slot '{}' refers to unknown live handle {}",
                            record.key_str(),
                            record.value
                        ),
                    )
                });
        }
        decode_stored(record, 0)
    }

    fn write_slot(&mut self, index: usize, value: Value) -> Result<()> {
        let mut record = self.record(index);
        let (tag, payload) = match &value {
            Value::U64(v) => (TypeTag::U64, *v),
            Value::I64(v) => (TypeTag::I64, *v as u64),
            Value::F64(v) => (TypeTag::F64, v.to_bits()),
            Value::Table(live) => (live.tag(), self.next_handle),
            Value::Child(child) => {
                return Err(unsupported(record.key_str(), child));
            }
        };

        if record.tag.is_live_table() {
            self.live.remove(&record.value);
        }
        if let Value::Table(live) = value {
            self.live.insert(self.next_handle, live);
            self.next_handle += 1;
        }

        record.tag = tag;
        record.value = payload;
        let range = self.slot_range(index);
        record.write(&mut self.block[range]);
        Ok(())
    }

    /// Grow the map until it can hold `elems` entries within the load factor.
    fn ensure_room(&mut self, elems: u64) -> Result<()> {
        let current = self.header.mapcap();
        let mut mapcap = current;
        while exceeds_load_factor(elems, mapcap) {
            mapcap = grown_capacity(mapcap);
        }
        if mapcap != current {
            tracing::debug!(elems, from = current, to = mapcap, "Growing map");
            self.reserve(self.header.capacity(), mapcap)?;
        }
        Ok(())
    }

    /// Probe for `key` without modifying the table.
    pub fn lookup(&self, key: &str) -> Result<Lookup> {
        self.view().lookup(key)
    }

    /// Get the slot holding `key`, inserting it if absent.
    ///
    /// A new key holds `U64(0)` until assigned. Inserting grows the map first
    /// when the new entry would push the load factor past 3/4.
    pub fn lookup_or_insert(&mut self, key: &str) -> Result<SlotMut<'_, T>> {
        let slot_key = SlotKey::new(key)?;
        if let Lookup::Found(index) = map::find(self.slots(), &slot_key) {
            return Ok(SlotMut { table: self, index });
        }

        // Reject before placing if the count no longer fits the header.
        let elems = self.header.elems() + 1;
        let mut probe = self.header;
        probe.set_elems(elems)?;

        self.ensure_room(elems)?;
        let placement = map::place(
            &mut self.slots_mut(),
            SlotRecord::occupied(&slot_key, TypeTag::U64, 0),
        )?;
        self.header.set_elems(elems)?;
        self.commit_header();

        Ok(SlotMut {
            table: self,
            index: placement.index,
        })
    }

    /// Set `key` to `value`, inserting the key if absent.
    ///
    /// Narrower integers and floats widen to their 64-bit category. Replacing
    /// a live nested table releases this table's reference to it. A
    /// [`Value::Child`] belongs to the block it was read from and is rejected
    /// before the map is touched.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Value::Child(child) = &value {
            SlotKey::new(key)?;
            return Err(unsupported(key, child));
        }
        self.lookup_or_insert(key)?.set(value)
    }

    /// Get the value stored under `key`.
    pub fn value(&self, key: &str) -> Result<Value> {
        match self.lookup(key)? {
            Lookup::Found(index) => self.decode(&self.record(index)),
            Lookup::Absent { .. } => Err(TblError::KeyNotFound {
                key: key.to_string(),
            }),
        }
    }

    /// Get the value under `key` as exactly `V`.
    pub fn value_as<V: FromValue>(&self, key: &str) -> Result<V> {
        V::from_value(key, &self.value(key)?)
    }

    /// Check if `key` is present. Keys no slot could hold are never present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.view().contains_key(key)
    }

    /// Remove `key`, returning whether it was present.
    ///
    /// The slot is emptied and the whole map is re-settled with a reorder
    /// pass. Bytes of a removed child stay in the child region until
    /// [`compact`](Self::compact).
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        let index = match self.lookup(key)? {
            Lookup::Found(index) => index,
            Lookup::Absent { .. } => return Ok(false),
        };

        let record = self.record(index);
        if record.tag.is_live_table() {
            self.live.remove(&record.value);
        }

        // The count follows the slots even if the reorder below fails.
        self.slots_mut().put(index, &SlotRecord::EMPTY);
        self.header.set_elems(self.header.elems() - 1)?;
        self.commit_header();

        let visits = map::reorder(&mut self.slots_mut())?;
        tracing::trace!(key, visits, "Removed key");
        Ok(true)
    }

    /// Remove every map entry, keeping the map capacity.
    pub fn clear_map(&mut self) -> Result<()> {
        self.slots_mut().clear();
        self.live.clear();
        self.header.set_elems(0)?;
        self.commit_header();
        Ok(())
    }

    /// Iterate over `(key, value)` pairs in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (String, Value)> + '_ {
        // Slots of an owning table always decode.
        self.slots()
            .occupied()
            .filter_map(move |(_, record)| {
                self.decode(&record)
                    .ok()
                    .map(|value| (record.key_str().to_string(), value))
            })
    }

    /// Iterate over keys in slot order.
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.slots()
            .occupied()
            .map(|(_, record)| record.key_str().to_string())
    }

    /// Get a nested live table stored under `key`.
    pub fn table<U: NestedElement>(&self, key: &str) -> Result<super::SharedTable<U>> {
        self.value_as(key)
    }

    /// Get a read-only view of the flattened table stored under `key`.
    pub fn child<U: Element>(&self, key: &str) -> Result<TableView<'_, U>> {
        self.view().child(key)
    }

    /// Get the child reference stored under `key`.
    pub fn child_ref(&self, key: &str) -> Result<ChildRef> {
        self.view().child_ref(key)
    }

    /// Ideal bucket of the entry at slot `index`.
    #[must_use]
    pub fn ideal(&self, index: usize) -> Option<usize> {
        self.view().ideal(index)
    }

    /// Distance of the entry at slot `index` from its ideal bucket.
    #[must_use]
    pub fn displacement(&self, index: usize) -> Option<usize> {
        self.view().displacement(index)
    }

    /// Largest displacement of any entry.
    #[must_use]
    pub fn max_displacement(&self) -> usize {
        map::max_displacement(self.slots())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;

    fn table_with_map(mapcap: u64) -> Table<u64> {
        Table::with_config(&TableConfig::default().with_map_capacity(mapcap)).unwrap()
    }

    #[test]
    fn three_keys_in_four_slots() {
        let mut table = table_with_map(4);
        table.insert("a", 1u64).unwrap();
        table.insert("b", 2u64).unwrap();
        table.insert("c", 3u64).unwrap();

        assert_eq!(table.len(), 0);
        assert_eq!(table.elems(), 3);
        assert_eq!(table.map_capacity(), 4);

        assert!(table.remove("b").unwrap());
        assert!(matches!(table.lookup("b").unwrap(), Lookup::Absent { .. }));
        assert_eq!(table.value_as::<u64>("a").unwrap(), 1);
        assert_eq!(table.value_as::<u64>("c").unwrap(), 3);
        assert_eq!(table.elems(), 2);
    }

    #[test]
    fn fourth_key_grows_the_map() {
        let mut table = table_with_map(4);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            table.insert(key, i as u64).unwrap();
        }
        assert_eq!(table.map_capacity(), 6);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            assert_eq!(table.value_as::<u64>(key).unwrap(), i as u64);
        }
    }

    #[test]
    fn lookup_or_insert_defaults_to_zero() {
        let mut table = Table::<f64>::new();
        let slot = table.lookup_or_insert("fresh").unwrap();
        assert_eq!(slot.key(), "fresh");
        assert_eq!(slot.value().unwrap(), Value::U64(0));
        slot.set(4.5f32).unwrap();
        assert_eq!(table.value("fresh").unwrap(), Value::F64(4.5));
        assert_eq!(table.elems(), 1);

        // Existing keys are returned without changing occupancy.
        let index = table.lookup_or_insert("fresh").unwrap().index();
        assert_eq!(table.lookup("fresh").unwrap(), Lookup::Found(index));
        assert_eq!(table.elems(), 1);
    }

    #[test]
    fn overwrite_changes_type() {
        let mut table = Table::<u64>::new();
        table.insert("x", 1u8).unwrap();
        table.insert("x", -1i8).unwrap();
        assert_eq!(table.value("x").unwrap(), Value::I64(-1));
        assert_eq!(table.elems(), 1);
    }

    #[test]
    fn typed_reads_do_not_coerce() {
        let mut table = Table::<u64>::new();
        table.insert("n", 5u64).unwrap();
        let err = table.value_as::<i64>("n").unwrap_err();
        assert_eq!(
            err,
            TblError::KeyTypeMismatch {
                key: "n".to_string(),
                stored: TypeTag::U64,
                requested: TypeTag::I64,
            }
        );
        assert_eq!(table.value_as::<f64>("n").unwrap_err().code(), "E002");
    }

    #[test]
    fn missing_and_invalid_keys() {
        let mut table = Table::<u64>::new();
        assert_eq!(
            table.value("nope").unwrap_err(),
            TblError::KeyNotFound {
                key: "nope".to_string()
            }
        );
        assert!(!table.remove("nope").unwrap());
        assert!(!table.contains_key(""));
        assert_eq!(table.insert("", 1u64).unwrap_err().code(), "E004");
        assert_eq!(table.insert(&"k".repeat(43), 1u64).unwrap_err().code(), "E004");
        assert_eq!(table.elems(), 0);
    }

    fn flattened_child() -> Value {
        let mut holder = Table::<u64>::new();
        holder.insert("c", Table::<u64>::new()).unwrap();
        holder.flatten().unwrap();
        holder.value("c").unwrap()
    }

    #[test]
    fn child_value_is_rejected_without_a_trace() {
        let child = flattened_child();
        let mut table = table_with_map(8);
        table.insert("a", 1u64).unwrap();
        let before = table.as_bytes().to_vec();

        let err = table.insert("k", child.clone()).unwrap_err();
        assert_eq!(
            err,
            TblError::UnsupportedValue {
                key: "k".to_string(),
                tag: TypeTag::CHILD_U64,
            }
        );
        assert_eq!(table.elems(), 1);
        assert!(!table.contains_key("k"));
        assert_eq!(table.as_bytes(), &before[..]);

        // Existing keys keep their value too.
        assert_eq!(table.insert("a", child.clone()).unwrap_err().code(), "E005");
        assert_eq!(table.value("a").unwrap(), Value::U64(1));
        assert_eq!(table.insert("", child).unwrap_err().code(), "E004");
    }

    #[test]
    fn header_count_tracks_slots_through_removals() {
        let mut table = table_with_map(16);
        for i in 0..11 {
            table.insert(&format!("k{}", i), i as u64).unwrap();
        }
        for i in (0..11).step_by(2) {
            assert!(table.remove(&format!("k{}", i)).unwrap());
            assert_eq!(table.elems(), table.keys().count());
            assert_eq!(table.header().elems() as usize, table.elems());
        }
        assert!(TableView::<u64>::new(table.as_bytes()).is_ok());
    }

    #[test]
    fn remove_absent_key_leaves_bytes_unchanged() {
        let mut table = table_with_map(8);
        table.insert("a", 1u64).unwrap();
        table.insert("b", 2u64).unwrap();
        let before = table.as_bytes().to_vec();
        assert!(!table.remove("zzz").unwrap());
        assert_eq!(table.as_bytes(), &before[..]);
    }

    #[test]
    fn live_tables_are_shared_not_owned() {
        let mut inner = Table::<i64>::new();
        inner.push(-4).unwrap();
        let inner = inner.into_shared();

        let mut outer = Table::<u64>::new();
        outer.insert("inner", inner.clone()).unwrap();
        assert_eq!(outer.value("inner").unwrap().tag(), TypeTag::TABLE_I64);
        assert_eq!(outer.live_count(), 1);

        // Mutations through the shared handle are visible via the parent.
        inner.write().push(-5).unwrap();
        let via_parent = outer.table::<i64>("inner").unwrap();
        assert_eq!(via_parent.read().to_vec(), vec![-4, -5]);

        outer.insert("inner", 0u64).unwrap();
        assert_eq!(outer.live_count(), 0);
        assert_eq!(std::sync::Arc::strong_count(&inner), 2);
        drop(via_parent);
        assert_eq!(std::sync::Arc::strong_count(&inner), 1);
    }

    #[test]
    fn removing_a_live_table_releases_it() {
        let inner = Table::<f64>::new().into_shared();
        let mut outer = Table::<f64>::new();
        outer.insert("t", inner.clone()).unwrap();
        assert!(outer.remove("t").unwrap());
        assert_eq!(outer.live_count(), 0);
        assert_eq!(std::sync::Arc::strong_count(&inner), 1);
    }

    #[test]
    fn entries_and_keys() {
        let mut table = Table::<u64>::new();
        table.insert("a", 1u64).unwrap();
        table.insert("b", 2.0f64).unwrap();

        let mut entries: Vec<_> = table.entries().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), Value::U64(1)),
                ("b".to_string(), Value::F64(2.0)),
            ]
        );

        let mut keys: Vec<_> = table.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn clear_map_keeps_capacity() {
        let mut table = table_with_map(8);
        table.insert("a", 1u64).unwrap();
        table.clear_map().unwrap();
        assert_eq!(table.elems(), 0);
        assert_eq!(table.map_capacity(), 8);
        assert!(!table.contains_key("a"));
    }

    #[test]
    fn displacement_statistics() {
        let mut table = table_with_map(16);
        for i in 0..10 {
            table.insert(&format!("key{}", i), i as u64).unwrap();
        }
        assert!(table.max_displacement() < 16);
        for index in 0..table.map_capacity() {
            match (table.ideal(index), table.displacement(index)) {
                (Some(ideal), Some(distance)) => {
                    assert_eq!((ideal + distance) % table.map_capacity(), index);
                }
                (None, None) => {}
                other => panic!("inconsistent slot statistics: {:?}", other),
            }
        }
        assert_eq!(table.ideal(99), None);
    }
}
