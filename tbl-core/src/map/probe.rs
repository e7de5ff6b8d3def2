//! Probing, Robin Hood placement and the reorder pass.
//!
//! Every loop here is bounded by the slot capacity. A placement that walks a
//! full cycle without meeting an EMPTY slot means the load factor invariant
//! was broken; it is reported as `ProbeExhaustion` rather than looping.

use super::{SlotKey, SlotRecord, Slots, SlotsMut};
use crate::error::{Result, TblError};
use tracing::{error, trace};

/// Ideal bucket of `hash` in a map of `capacity` slots.
#[must_use]
pub fn ideal(hash: u32, capacity: usize) -> usize {
    hash as usize % capacity
}

/// Distance of slot `index` from the ideal bucket of `hash`, wrapping around.
#[must_use]
pub fn displacement(index: usize, hash: u32, capacity: usize) -> usize {
    let home = ideal(hash, capacity);
    if index >= home {
        index - home
    } else {
        index + capacity - home
    }
}

/// Result of probing for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The key is stored at this slot.
    Found(usize),
    /// The key is absent. `insert_at` is the first EMPTY slot met, if any.
    Absent {
        /// Candidate insertion point.
        insert_at: Option<usize>,
    },
}

impl Lookup {
    /// Slot index if the key was found.
    #[must_use]
    pub const fn found(&self) -> Option<usize> {
        match self {
            Self::Found(index) => Some(*index),
            Self::Absent { .. } => None,
        }
    }
}

/// Where a placement left the record it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Final slot of the placed record.
    pub index: usize,
    /// Residents pushed forward to make room.
    pub evictions: usize,
}

/// Probe for `key` from its ideal bucket.
///
/// Stops at the first EMPTY slot or after one full cycle.
#[must_use]
pub fn find(slots: Slots<'_>, key: &SlotKey) -> Lookup {
    let capacity = slots.capacity();
    if capacity == 0 {
        return Lookup::Absent { insert_at: None };
    }

    let mut index = ideal(key.hash(), capacity);
    for _ in 0..capacity {
        let record = slots.get(index);
        if record.is_empty() {
            return Lookup::Absent {
                insert_at: Some(index),
            };
        }
        if record.holds(key) {
            return Lookup::Found(index);
        }
        index = (index + 1) % capacity;
    }
    Lookup::Absent { insert_at: None }
}

fn exhausted(record: &SlotRecord, capacity: usize) -> TblError {
    error!(
        key = record.key_str(),
        capacity, "Probe cycle exhausted without an empty slot"
    );
    TblError::ProbeExhaustion {
        key: record.key_str().to_string(),
        capacity: capacity as u64,
    }
}

/// Insert `record` with the Robin Hood rule, starting at its ideal bucket.
///
/// The caller guarantees the key is not already present. A resident whose
/// displacement is smaller than the carried record's is swapped out and
/// carried forward in turn.
pub fn place(slots: &mut SlotsMut<'_>, record: SlotRecord) -> Result<Placement> {
    let capacity = slots.capacity();
    if capacity == 0 {
        return Err(exhausted(&record, capacity));
    }

    let mut carried = record;
    let mut index = ideal(carried.hash, capacity);
    let mut distance = 0;
    let mut landed = None;
    let mut evictions = 0;

    for _ in 0..capacity {
        let resident = slots.get(index);
        if resident.is_empty() {
            slots.put(index, &carried);
            return Ok(Placement {
                index: landed.unwrap_or(index),
                evictions,
            });
        }

        let resident_distance = displacement(index, resident.hash, capacity);
        if resident_distance < distance {
            slots.put(index, &carried);
            carried = resident;
            distance = resident_distance;
            evictions += 1;
            if landed.is_none() {
                landed = Some(index);
            }
        }

        index = (index + 1) % capacity;
        distance += 1;
    }

    Err(exhausted(&record, capacity))
}

/// Re-settle every occupied slot into Robin Hood order.
///
/// Each occupied slot away from its ideal bucket is lifted out and re-placed
/// from there. The pass keeps cycling until a full lap passes with nothing
/// moving, so items pushed past the starting point are revisited. Returns
/// the number of slot visits.
pub fn reorder(slots: &mut SlotsMut<'_>) -> Result<usize> {
    let capacity = slots.capacity();
    if capacity == 0 {
        return Ok(0);
    }

    let limit = capacity.saturating_mul(capacity + 1);
    let mut index = 0;
    let mut quiet = 0;
    let mut visits = 0;

    while quiet < capacity {
        if visits == limit {
            error!(capacity, visits, "Reorder pass did not settle");
            return Err(TblError::ProbeExhaustion {
                key: String::new(),
                capacity: capacity as u64,
            });
        }
        visits += 1;

        let record = slots.get(index);
        if record.is_empty() || ideal(record.hash, capacity) == index {
            quiet += 1;
        } else {
            slots.put(index, &SlotRecord::EMPTY);
            let placement = place(slots, record)?;
            if placement.index == index && placement.evictions == 0 {
                quiet += 1;
            } else {
                quiet = 0;
            }
        }
        index = (index + 1) % capacity;
    }

    trace!(capacity, visits, "Reorder pass complete");
    Ok(visits)
}

/// Place every occupied slot of `from` into the cleared segment `to`.
///
/// `adjust` may rewrite each record on the way (used to rebase child offsets).
/// Returns the number of records placed.
pub fn rebuild(
    from: Slots<'_>,
    to: &mut SlotsMut<'_>,
    mut adjust: impl FnMut(&mut SlotRecord),
) -> Result<usize> {
    to.clear();
    let mut placed = 0;
    for (_, mut record) in from.occupied() {
        adjust(&mut record);
        place(to, record)?;
        placed += 1;
    }
    Ok(placed)
}

/// Largest displacement of any occupied slot.
#[must_use]
pub fn max_displacement(slots: Slots<'_>) -> usize {
    let capacity = slots.capacity();
    slots
        .occupied()
        .map(|(index, record)| displacement(index, record.hash, capacity))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SLOT_SIZE;
    use crate::types::TypeTag;

    fn segment(capacity: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; capacity * SLOT_SIZE];
        SlotsMut::new(&mut bytes).clear();
        bytes
    }

    fn record(key: &str, value: u64) -> SlotRecord {
        SlotRecord::occupied(&SlotKey::new(key).unwrap(), TypeTag::U64, value)
    }

    fn record_with_hash(key: &str, hash: u32) -> SlotRecord {
        let mut record = record(key, 0);
        record.hash = hash;
        record
    }

    /// Robin Hood order: along each run, ideal buckets never go backwards.
    fn assert_robin_hood(slots: Slots<'_>) {
        let capacity = slots.capacity();
        for (index, record) in slots.occupied() {
            let distance = displacement(index, record.hash, capacity);
            for step in 1..=distance {
                let before = (index + capacity - step) % capacity;
                let resident = slots.get(before);
                assert!(!resident.is_empty(), "hole inside probe run at {}", before);
                assert!(
                    displacement(before, resident.hash, capacity) + step >= distance,
                    "slot {} should have been displaced by slot {}",
                    before,
                    index
                );
            }
        }
    }

    #[test]
    fn displacement_wraps() {
        assert_eq!(displacement(5, 5, 8), 0);
        assert_eq!(displacement(6, 5, 8), 1);
        assert_eq!(displacement(1, 7, 8), 2);
    }

    #[test]
    fn place_and_find() {
        let mut bytes = segment(8);
        let mut slots = SlotsMut::new(&mut bytes);
        for (i, key) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            place(&mut slots, record(key, i as u64)).unwrap();
        }

        let view = slots.as_slots();
        for (i, key) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            let found = find(view, &SlotKey::new(key).unwrap()).found().unwrap();
            assert_eq!(view.get(found).value, i as u64);
        }
        assert!(matches!(
            find(view, &SlotKey::new("zz").unwrap()),
            Lookup::Absent { insert_at: Some(_) }
        ));
        assert_robin_hood(view);
    }

    #[test]
    fn richer_resident_is_displaced() {
        let mut bytes = segment(4);
        let mut slots = SlotsMut::new(&mut bytes);

        // "x" sits at its ideal bucket 1, "y" collides at 1 and lands at 2.
        place(&mut slots, record_with_hash("x", 1)).unwrap();
        place(&mut slots, record_with_hash("y", 1)).unwrap();
        // "z" prefers 2, which "y" already holds at distance 1.
        place(&mut slots, record_with_hash("z", 2)).unwrap();

        assert_eq!(slots.get(1).key_str(), "x");
        assert_eq!(slots.get(2).key_str(), "y");
        assert_eq!(slots.get(3).key_str(), "z");

        // "v" prefers 1 and must push "z" (distance 1 at slot 3) onward.
        let placement = place(&mut slots, record_with_hash("v", 1)).unwrap();
        assert_eq!(placement.index, 3);
        assert_eq!(placement.evictions, 1);
        assert_eq!(slots.get(0).key_str(), "z");
        assert_robin_hood(slots.as_slots());
    }

    #[test]
    fn full_segment_reports_exhaustion() {
        let mut bytes = segment(2);
        let mut slots = SlotsMut::new(&mut bytes);
        place(&mut slots, record("a", 1)).unwrap();
        place(&mut slots, record("b", 2)).unwrap();
        assert_eq!(
            find(slots.as_slots(), &SlotKey::new("c").unwrap()),
            Lookup::Absent { insert_at: None }
        );

        let err = place(&mut slots, record("c", 3)).unwrap_err();
        assert!(err.is_defect());
        assert_eq!(err.code(), "E301");
    }

    #[test]
    fn reorder_fills_holes() {
        let mut bytes = segment(8);
        let mut slots = SlotsMut::new(&mut bytes);
        for (i, hash) in [3u32, 3, 3, 4].into_iter().enumerate() {
            place(&mut slots, record_with_hash(&format!("k{}", i), hash)).unwrap();
        }
        // Punch a hole at the head of the run.
        slots.put(3, &SlotRecord::EMPTY);

        let visits = reorder(&mut slots).unwrap();
        assert_eq!(visits, 15);
        let view = slots.as_slots();
        assert!(!view.get(3).is_empty());
        assert!(view.get(6).is_empty());
        assert_robin_hood(view);
    }

    #[test]
    fn reorder_of_ordered_segment_is_one_lap() {
        let mut bytes = segment(8);
        let mut slots = SlotsMut::new(&mut bytes);
        for key in ["a", "b", "c"] {
            place(&mut slots, record(key, 0)).unwrap();
        }
        let before = bytes.clone();
        let mut slots = SlotsMut::new(&mut bytes);
        assert_eq!(reorder(&mut slots).unwrap(), 8);
        assert_eq!(bytes, before);
    }

    #[test]
    fn reorder_leaves_home_records_in_place() {
        let mut bytes = segment(8);
        let mut slots = SlotsMut::new(&mut bytes);
        place(&mut slots, record_with_hash("home", 2)).unwrap();
        place(&mut slots, record_with_hash("away", 2)).unwrap();
        // Remove the head of the run; "away" should slide home.
        slots.put(2, &SlotRecord::EMPTY);
        place(&mut slots, record_with_hash("other", 5)).unwrap();

        reorder(&mut slots).unwrap();
        assert_eq!(slots.get(2).key_str(), "away");
        assert!(slots.get(3).is_empty());
        assert_eq!(slots.get(5).key_str(), "other");
        assert_robin_hood(slots.as_slots());
    }

    #[test]
    fn rebuild_into_larger_segment() {
        let mut small = segment(4);
        let mut slots = SlotsMut::new(&mut small);
        for key in ["a", "b", "c"] {
            place(&mut slots, record(key, 7)).unwrap();
        }

        let mut large = segment(6);
        let mut target = SlotsMut::new(&mut large);
        let placed = rebuild(Slots::new(&small), &mut target, |r| r.value += 1).unwrap();
        assert_eq!(placed, 3);

        let view = target.as_slots();
        for key in ["a", "b", "c"] {
            let index = find(view, &SlotKey::new(key).unwrap()).found().unwrap();
            assert_eq!(view.get(index).value, 8);
        }
        assert_robin_hood(view);
        assert!(max_displacement(view) < 6);
    }
}
