//! Table header record.
//!
//! ```text
//!  word 0   bytes 0..2  magic "tb"            bits 16..64  size_bytes (48)
//!  word 1   bits 0..42  array size (42)       bits 42..63  elems (21)     bit 63 owned
//!  word 2   bits 0..42  array capacity (42)   bits 42..64  mapcap (22)
//! ```
//!
//! All words are little-endian.

use super::{HEADER_SIZE, MAGIC};
use crate::error::{Result, TblError};
use byteorder::{ByteOrder, LittleEndian};

const SIZE_BYTES_BITS: u32 = 48;
const SIZE_BITS: u32 = 42;
const ELEMS_BITS: u32 = 21;
const CAPACITY_BITS: u32 = 42;
const MAPCAP_BITS: u32 = 22;

const fn field_mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

fn check_width(field: &'static str, value: u64, bits: u32) -> Result<u64> {
    if value > field_mask(bits) {
        return Err(TblError::FieldOverflow { field, value, bits });
    }
    Ok(value)
}

/// Decoded table header.
///
/// Setters reject values wider than the field they target instead of
/// truncating them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    size_bytes: u64,
    size: u64,
    elems: u64,
    owned: bool,
    capacity: u64,
    mapcap: u64,
}

impl Header {
    /// Header of a fresh, empty, owned block.
    #[must_use]
    pub fn new() -> Self {
        Self {
            size_bytes: HEADER_SIZE as u64,
            owned: true,
            ..Self::default()
        }
    }

    /// Total bytes of the block.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Array length.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Occupied map slots.
    #[must_use]
    pub const fn elems(&self) -> u64 {
        self.elems
    }

    /// Whether the holder owns the block.
    #[must_use]
    pub const fn owned(&self) -> bool {
        self.owned
    }

    /// Array capacity.
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Map slot capacity.
    #[must_use]
    pub const fn mapcap(&self) -> u64 {
        self.mapcap
    }

    /// Set the total block size.
    pub fn set_size_bytes(&mut self, value: u64) -> Result<()> {
        self.size_bytes = check_width("size_bytes", value, SIZE_BYTES_BITS)?;
        Ok(())
    }

    /// Set the array length.
    pub fn set_size(&mut self, value: u64) -> Result<()> {
        self.size = check_width("size", value, SIZE_BITS)?;
        Ok(())
    }

    /// Set the occupied slot count.
    pub fn set_elems(&mut self, value: u64) -> Result<()> {
        self.elems = check_width("elems", value, ELEMS_BITS)?;
        Ok(())
    }

    /// Set the ownership flag.
    pub fn set_owned(&mut self, owned: bool) {
        self.owned = owned;
    }

    /// Set the array capacity.
    pub fn set_capacity(&mut self, value: u64) -> Result<()> {
        self.capacity = check_width("capacity", value, CAPACITY_BITS)?;
        Ok(())
    }

    /// Set the map slot capacity.
    pub fn set_mapcap(&mut self, value: u64) -> Result<()> {
        self.mapcap = check_width("mapcap", value, MAPCAP_BITS)?;
        Ok(())
    }

    /// Largest map capacity the header can record.
    #[must_use]
    pub const fn max_mapcap() -> u64 {
        field_mask(MAPCAP_BITS)
    }

    /// Read a header from the start of `bytes`, checking the magic value.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(TblError::malformed(
                bytes.len(),
                format!("buffer of {} bytes is too small for a header", bytes.len()),
            ));
        }
        if bytes[..2] != MAGIC {
            return Err(TblError::malformed(0, "missing table magic"));
        }

        let word0 = LittleEndian::read_u64(&bytes[0..8]);
        let word1 = LittleEndian::read_u64(&bytes[8..16]);
        let word2 = LittleEndian::read_u64(&bytes[16..24]);

        Ok(Self {
            size_bytes: word0 >> 16,
            size: word1 & field_mask(SIZE_BITS),
            elems: (word1 >> SIZE_BITS) & field_mask(ELEMS_BITS),
            owned: word1 >> 63 == 1,
            capacity: word2 & field_mask(CAPACITY_BITS),
            mapcap: word2 >> CAPACITY_BITS,
        })
    }

    /// Encode into the first `HEADER_SIZE` bytes of `bytes`.
    pub fn write_to(&self, bytes: &mut [u8]) {
        let word0 = (self.size_bytes << 16) | u64::from(LittleEndian::read_u16(&MAGIC));
        let word1 = self.size | (self.elems << SIZE_BITS) | (u64::from(self.owned) << 63);
        let word2 = self.capacity | (self.mapcap << CAPACITY_BITS);

        LittleEndian::write_u64(&mut bytes[0..8], word0);
        LittleEndian::write_u64(&mut bytes[8..16], word1);
        LittleEndian::write_u64(&mut bytes[16..24], word2);
    }

    /// Encode into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.write_to(&mut buf);
        buf
    }

    /// Check the header against the block it describes.
    ///
    /// `available` is the number of bytes the caller can provide; the header
    /// may describe fewer bytes than that but never more.
    pub fn validate(&self, elem_size: usize, available: usize) -> Result<()> {
        if self.size_bytes > available as u64 {
            return Err(TblError::malformed(
                0,
                format!(
                    "header claims {} bytes but only {} are available",
                    self.size_bytes, available
                ),
            ));
        }
        if self.size > self.capacity {
            return Err(TblError::malformed(
                8,
                format!("array size {} exceeds capacity {}", self.size, self.capacity),
            ));
        }
        if self.elems > self.mapcap {
            return Err(TblError::malformed(
                8,
                format!("{} occupied slots exceed map capacity {}", self.elems, self.mapcap),
            ));
        }

        let minimum = super::required_bytes(elem_size, self.capacity, self.mapcap, 0)
            .map_err(|_| TblError::malformed(16, "segment sizes overflow"))?;
        if self.size_bytes < minimum {
            return Err(TblError::malformed(
                0,
                format!(
                    "size invariant violated: {} bytes recorded, segments need {}",
                    self.size_bytes, minimum
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        let mut header = Header::new();
        header.set_size_bytes(4096).unwrap();
        header.set_size(3).unwrap();
        header.set_capacity(6).unwrap();
        header.set_elems(5).unwrap();
        header.set_mapcap(9).unwrap();
        header
    }

    #[test]
    fn header_roundtrip() {
        let header = sample();
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..2], b"tb");

        let restored = Header::from_bytes(&bytes).unwrap();
        assert_eq!(restored, header);
        assert!(restored.owned());
    }

    #[test]
    fn owned_bit_is_the_top_of_word_one() {
        let mut header = sample();
        header.set_owned(false);
        let bytes = header.to_bytes();
        assert_eq!(bytes[15] & 0x80, 0);
        assert!(!Header::from_bytes(&bytes).unwrap().owned());
    }

    #[test]
    fn field_widths_are_enforced() {
        let mut header = Header::new();
        assert!(header.set_elems((1 << 21) - 1).is_ok());
        assert_eq!(
            header.set_elems(1 << 21),
            Err(TblError::FieldOverflow {
                field: "elems",
                value: 1 << 21,
                bits: 21,
            })
        );
        assert!(header.set_mapcap(1 << 22).is_err());
        assert!(header.set_size_bytes(1 << 48).is_err());
        assert!(header.set_capacity(1 << 42).is_err());
        // Rejected assignments leave the field untouched.
        assert_eq!(header.elems(), (1 << 21) - 1);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[0] = b'x';
        let err = Header::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.code(), "E201");
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(Header::from_bytes(b"tb").is_err());
    }

    #[test]
    fn header_validation() {
        let mut header = Header::new();
        header.set_capacity(2).unwrap();
        header.set_mapcap(1).unwrap();
        header.set_size_bytes((HEADER_SIZE + 2 * 8 + 64) as u64).unwrap();
        assert!(header.validate(8, 200).is_ok());
        assert!(header.validate(8, 50).is_err());

        header.set_size(3).unwrap();
        assert!(header.validate(8, 200).is_err());
        header.set_size(2).unwrap();

        header.set_size_bytes(HEADER_SIZE as u64).unwrap();
        assert!(header.validate(8, 200).is_err());
    }
}
