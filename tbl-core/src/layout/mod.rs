//! Block layout of a table.
//!
//! A table is one contiguous block:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (24 bytes)                            │
//! ├──────────────────────────────────────────────┤
//! │ Array segment: capacity × element size       │
//! ├──────────────────────────────────────────────┤
//! │ Map segment: mapcap × 64-byte slots          │
//! ├──────────────────────────────────────────────┤
//! │ Child region: embedded flattened tables      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Segment boundaries are derived from the header alone, so a block can be
//! moved or copied as opaque bytes.

mod header;

pub use header::Header;

use crate::error::{Result, TblError};

/// Magic value in the first two bytes of every table block.
pub const MAGIC: [u8; 2] = *b"tb";

/// Fixed size of the header in bytes.
pub const HEADER_SIZE: usize = 24;

/// Size of one map slot in bytes.
pub const SLOT_SIZE: usize = 64;

/// Size of the key buffer inside a slot.
pub const KEY_SIZE: usize = 43;

/// Longest key that fits a slot (the last key byte is always NUL).
pub const MAX_KEY_LEN: usize = KEY_SIZE - 1;

/// Width of the stored key hash.
pub const HASH_BITS: u32 = 26;

/// Mask applied to the folded key hash.
pub const HASH_MASK: u32 = (1 << HASH_BITS) - 1;

/// Smallest capacity reached by a growth step.
pub const MIN_GROWTH_CAPACITY: u64 = 4;

/// Next capacity after a growth step: ×1.5, at least 4.
#[must_use]
pub const fn grown_capacity(capacity: u64) -> u64 {
    let next = capacity + capacity / 2;
    if next < MIN_GROWTH_CAPACITY {
        MIN_GROWTH_CAPACITY
    } else {
        next
    }
}

/// Check whether the map needs to grow before holding `elems` entries.
///
/// The load factor may not exceed 3/4.
#[must_use]
pub const fn exceeds_load_factor(elems: u64, mapcap: u64) -> bool {
    elems * 4 > mapcap * 3
}

/// Total bytes needed for the given dimensions.
pub fn required_bytes(elem_size: usize, capacity: u64, mapcap: u64, child_bytes: u64) -> Result<u64> {
    let overflow = || TblError::AllocationFailure {
        requested: u64::MAX,
        cause: format!(
            "block size overflows for capacity {} and map capacity {}",
            capacity, mapcap
        ),
    };

    let array = capacity.checked_mul(elem_size as u64).ok_or_else(overflow)?;
    let map = mapcap.checked_mul(SLOT_SIZE as u64).ok_or_else(overflow)?;
    (HEADER_SIZE as u64)
        .checked_add(array)
        .and_then(|n| n.checked_add(map))
        .and_then(|n| n.checked_add(child_bytes))
        .ok_or_else(overflow)
}

/// Allocate a zeroed block of `size` bytes without aborting on failure.
pub fn allocate_block(size: u64) -> Result<Vec<u8>> {
    let fail = |cause: String| TblError::AllocationFailure {
        requested: size,
        cause,
    };
    let len = usize::try_from(size).map_err(|e| fail(e.to_string()))?;

    let mut block = Vec::new();
    block
        .try_reserve_exact(len)
        .map_err(|e| fail(e.to_string()))?;
    block.resize(len, 0);
    Ok(block)
}

/// Byte ranges of the segments of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Element size of the array segment.
    pub elem_size: usize,
    /// Array capacity in elements.
    pub capacity: usize,
    /// Map capacity in slots.
    pub mapcap: usize,
    /// Total block size.
    pub size_bytes: usize,
}

impl Layout {
    /// Layout described by a header.
    ///
    /// The header must already have been validated against the block.
    #[must_use]
    pub fn of(header: &Header, elem_size: usize) -> Self {
        Self {
            elem_size,
            capacity: header.capacity() as usize,
            mapcap: header.mapcap() as usize,
            size_bytes: header.size_bytes() as usize,
        }
    }

    /// Start of the array segment.
    #[must_use]
    pub const fn array_offset(&self) -> usize {
        HEADER_SIZE
    }

    /// Start of the map segment.
    #[must_use]
    pub const fn map_offset(&self) -> usize {
        HEADER_SIZE + self.capacity * self.elem_size
    }

    /// Start of the child region.
    #[must_use]
    pub const fn child_offset(&self) -> usize {
        self.map_offset() + self.mapcap * SLOT_SIZE
    }

    /// Bytes held by the child region.
    #[must_use]
    pub const fn child_bytes(&self) -> usize {
        self.size_bytes.saturating_sub(self.child_offset())
    }

    /// Byte range of array element `index`.
    #[must_use]
    pub const fn element_range(&self, index: usize) -> std::ops::Range<usize> {
        let start = self.array_offset() + index * self.elem_size;
        start..start + self.elem_size
    }

    /// Byte range of the whole map segment.
    #[must_use]
    pub const fn map_range(&self) -> std::ops::Range<usize> {
        self.map_offset()..self.child_offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_steps() {
        assert_eq!(grown_capacity(0), 4);
        assert_eq!(grown_capacity(2), 4);
        assert_eq!(grown_capacity(4), 6);
        assert_eq!(grown_capacity(6), 9);
        assert_eq!(grown_capacity(9), 13);
    }

    #[test]
    fn load_factor_threshold() {
        assert!(!exceeds_load_factor(3, 4));
        assert!(exceeds_load_factor(4, 4));
        assert!(exceeds_load_factor(1, 0));
        assert!(!exceeds_load_factor(0, 0));
    }

    #[test]
    fn segment_offsets() {
        let layout = Layout {
            elem_size: 8,
            capacity: 2,
            mapcap: 4,
            size_bytes: HEADER_SIZE + 16 + 256 + 40,
        };
        assert_eq!(layout.array_offset(), 24);
        assert_eq!(layout.map_offset(), 40);
        assert_eq!(layout.child_offset(), 296);
        assert_eq!(layout.child_bytes(), 40);
        assert_eq!(layout.element_range(1), 32..40);
        assert_eq!(layout.map_range(), 40..296);
    }

    #[test]
    fn allocation_is_zeroed() {
        let block = allocate_block(64).unwrap();
        assert_eq!(block.len(), 64);
        assert!(block.iter().all(|&b| b == 0));
        assert_eq!(allocate_block(u64::MAX).unwrap_err().code(), "E101");
    }

    #[test]
    fn required_bytes_matches_layout() {
        assert_eq!(required_bytes(8, 2, 4, 40).unwrap(), 336);
        assert_eq!(required_bytes(4, 0, 0, 0).unwrap(), 24);
        assert_eq!(required_bytes(8, u64::MAX, 0, 0).unwrap_err().code(), "E101");
    }
}
