//! Slot record codec.
//!
//! ```text
//!  0..4    type (low 6 bits) | hash (high 26 bits)
//!  4..47   key, NUL padded
//!  47      pad
//!  48..56  value payload
//!  56..64  base scratch
//! ```

use super::hash::key_hash;
use crate::error::{Result, TblError};
use crate::layout::{KEY_SIZE, MAX_KEY_LEN, SLOT_SIZE};
use crate::types::TypeTag;
use byteorder::{ByteOrder, LittleEndian};

const KEY_START: usize = 4;
const VALUE_START: usize = 48;
const BASE_START: usize = 56;

/// An encoded, validated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotKey {
    bytes: [u8; KEY_SIZE],
    len: usize,
    hash: u32,
}

impl SlotKey {
    /// Encode a key, rejecting anything a slot cannot hold.
    pub fn new(key: &str) -> Result<Self> {
        let invalid = |reason| TblError::InvalidKey {
            key: key.to_string(),
            reason,
        };
        if key.is_empty() {
            return Err(invalid("key is empty"));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(invalid("key is longer than 42 bytes"));
        }
        if key.as_bytes().contains(&0) {
            return Err(invalid("key contains a NUL byte"));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes[..key.len()].copy_from_slice(key.as_bytes());
        Ok(Self {
            bytes,
            len: key.len(),
            hash: key_hash(key.as_bytes()),
        })
    }

    /// Truncated hash of the key.
    #[must_use]
    pub const fn hash(&self) -> u32 {
        self.hash
    }

    /// Key bytes without padding.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// One decoded map slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRecord {
    /// Type tag of the value.
    pub tag: TypeTag,
    /// Truncated key hash.
    pub hash: u32,
    /// NUL-padded key buffer.
    pub key: [u8; KEY_SIZE],
    /// Value payload.
    pub value: u64,
    /// Base scratch field.
    pub base: u64,
}

impl SlotRecord {
    /// An unoccupied slot.
    pub const EMPTY: Self = Self {
        tag: TypeTag::EMPTY,
        hash: 0,
        key: [0u8; KEY_SIZE],
        value: 0,
        base: 0,
    };

    /// A fresh occupied slot for `key`.
    #[must_use]
    pub fn occupied(key: &SlotKey, tag: TypeTag, value: u64) -> Self {
        Self {
            tag,
            hash: key.hash,
            key: key.bytes,
            value,
            base: 0,
        }
    }

    /// Decode from exactly `SLOT_SIZE` bytes.
    #[must_use]
    pub fn read(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), SLOT_SIZE);
        let word = LittleEndian::read_u32(&bytes[0..KEY_START]);
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes[KEY_START..KEY_START + KEY_SIZE]);

        Self {
            tag: TypeTag::from_bits((word as u8) & TypeTag::MASK).unwrap_or(TypeTag::ERR),
            hash: word >> 6,
            key,
            value: LittleEndian::read_u64(&bytes[VALUE_START..BASE_START]),
            base: LittleEndian::read_u64(&bytes[BASE_START..SLOT_SIZE]),
        }
    }

    /// Encode into exactly `SLOT_SIZE` bytes.
    pub fn write(&self, bytes: &mut [u8]) {
        debug_assert_eq!(bytes.len(), SLOT_SIZE);
        let word = u32::from(self.tag.bits()) | (self.hash << 6);
        LittleEndian::write_u32(&mut bytes[0..KEY_START], word);
        bytes[KEY_START..KEY_START + KEY_SIZE].copy_from_slice(&self.key);
        bytes[KEY_START + KEY_SIZE] = 0;
        LittleEndian::write_u64(&mut bytes[VALUE_START..BASE_START], self.value);
        LittleEndian::write_u64(&mut bytes[BASE_START..SLOT_SIZE], self.base);
    }

    /// Check if the slot is unoccupied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tag.is_empty()
    }

    /// Key bytes up to the first NUL.
    #[must_use]
    pub fn key_bytes(&self) -> &[u8] {
        let end = self.key.iter().position(|&b| b == 0).unwrap_or(KEY_SIZE);
        &self.key[..end]
    }

    /// Key as text. Invalid UTF-8 (only possible in unvalidated bytes) reads as empty.
    #[must_use]
    pub fn key_str(&self) -> &str {
        std::str::from_utf8(self.key_bytes()).unwrap_or_default()
    }

    /// Check if this slot holds `key`.
    #[must_use]
    pub fn holds(&self, key: &SlotKey) -> bool {
        !self.is_empty() && self.hash == key.hash && self.key == key.bytes
    }
}
