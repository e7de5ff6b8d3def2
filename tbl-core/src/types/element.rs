//! Array element kinds.

use super::tag::TypeTag;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt::Debug;

/// A fixed-size plain value that can live in a table's array segment.
///
/// Elements are stored little-endian, so an image is readable on any host.
pub trait Element: Copy + Debug + PartialEq + Default + Send + Sync + 'static {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Numeric tag of this element kind.
    const TAG: TypeTag;

    /// Decode from exactly `SIZE` bytes.
    fn read(bytes: &[u8]) -> Self;

    /// Encode into exactly `SIZE` bytes.
    fn write(self, bytes: &mut [u8]);
}

macro_rules! impl_element {
    ($ty:ty, $integer:expr, $signed:expr, $width:expr, $read:expr, $write:expr) => {
        impl Element for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();
            const TAG: TypeTag = TypeTag::numeric($integer, $signed, $width);

            #[inline]
            fn read(bytes: &[u8]) -> Self {
                $read(bytes)
            }

            #[inline]
            fn write(self, bytes: &mut [u8]) {
                $write(bytes, self)
            }
        }
    };
}

impl_element!(u8, true, false, TypeTag::BITS_8, |b: &[u8]| b[0], |b: &mut [u8], v: u8| {
    b[0] = v
});
impl_element!(i8, true, true, TypeTag::BITS_8, |b: &[u8]| b[0] as i8, |b: &mut [u8], v: i8| {
    b[0] = v as u8
});
impl_element!(u16, true, false, TypeTag::BITS_16, LittleEndian::read_u16, LittleEndian::write_u16);
impl_element!(i16, true, true, TypeTag::BITS_16, LittleEndian::read_i16, LittleEndian::write_i16);
impl_element!(u32, true, false, TypeTag::BITS_32, LittleEndian::read_u32, LittleEndian::write_u32);
impl_element!(i32, true, true, TypeTag::BITS_32, LittleEndian::read_i32, LittleEndian::write_i32);
impl_element!(u64, true, false, TypeTag::BITS_64, LittleEndian::read_u64, LittleEndian::write_u64);
impl_element!(i64, true, true, TypeTag::BITS_64, LittleEndian::read_i64, LittleEndian::write_i64);
impl_element!(f32, false, true, TypeTag::BITS_32, LittleEndian::read_f32, LittleEndian::write_f32);
impl_element!(f64, false, true, TypeTag::BITS_64, LittleEndian::read_f64, LittleEndian::write_f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_scalar_tags() {
        assert_eq!(u64::TAG, TypeTag::U64);
        assert_eq!(i64::TAG, TypeTag::I64);
        assert_eq!(f64::TAG, TypeTag::F64);
        assert_eq!(u8::TAG.width_bits(), 8);
        assert_eq!(f32::TAG.name(), "f32");
    }

    #[test]
    fn codec_is_little_endian() {
        let mut buf = [0u8; 8];
        0x0102_0304_0506_0708u64.write(&mut buf);
        assert_eq!(buf, [8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(u64::read(&buf), 0x0102_0304_0506_0708);

        let mut buf = [0u8; 4];
        (-2i32).write(&mut buf);
        assert_eq!(i32::read(&buf), -2);

        let mut buf = [0u8; 1];
        (-1i8).write(&mut buf);
        assert_eq!(buf, [0xFF]);
        assert_eq!(i8::read(&buf), -1);
    }

    #[test]
    fn float_codec() {
        let mut buf = [0u8; 8];
        2.5f64.write(&mut buf);
        assert_eq!(f64::read(&buf), 2.5);
    }
}
