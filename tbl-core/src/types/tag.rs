//! The 6-bit slot type tag.
//!
//! ```text
//!  bit   5      4      3       2        1..0
//!      CHILD  TABLE  SIGNED  INTEGER  width (0=8, 1=16, 2=32, 3=64 bits)
//! ```
//!
//! An unsigned float cannot exist, so the three unsigned non-integer 64/32/16
//! bit patterns are reserved for the `EMPTY`, `NONE` and `ERR` states.

use std::fmt;

/// A 6-bit type tag describing the contents of a map slot or an element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag(u8);

impl TypeTag {
    /// Mask of the six meaningful bits.
    pub const MASK: u8 = 0x3F;
    /// Value is a flattened table addressed by offset.
    pub const CHILD: u8 = 1 << 5;
    /// Value is a nested table.
    pub const TABLE: u8 = 1 << 4;
    /// Numeric category is signed.
    pub const SIGNED: u8 = 1 << 3;
    /// Numeric category is integral.
    pub const INTEGER: u8 = 1 << 2;
    /// 8-bit width code.
    pub const BITS_8: u8 = 0;
    /// 16-bit width code.
    pub const BITS_16: u8 = 1;
    /// 32-bit width code.
    pub const BITS_32: u8 = 1 << 1;
    /// 64-bit width code.
    pub const BITS_64: u8 = (1 << 1) | 1;
    /// Mask of the width code.
    pub const BITS_MASK: u8 = Self::BITS_64;

    /// Sentinel for a failed operation. Never stored.
    pub const ERR: Self = Self(Self::BITS_16);
    /// Sentinel for a slot without a value. Never stored.
    pub const NONE: Self = Self(Self::BITS_32);
    /// An unoccupied slot.
    pub const EMPTY: Self = Self(Self::BITS_64);

    /// Unsigned 64-bit integer.
    pub const U64: Self = Self(Self::INTEGER | Self::BITS_64);
    /// Signed 64-bit integer.
    pub const I64: Self = Self(Self::INTEGER | Self::BITS_64 | Self::SIGNED);
    /// 64-bit float.
    pub const F64: Self = Self(Self::BITS_64 | Self::SIGNED);

    /// Live table of unsigned 64-bit integers.
    pub const TABLE_U64: Self = Self(Self::TABLE | Self::U64.0);
    /// Live table of signed 64-bit integers.
    pub const TABLE_I64: Self = Self(Self::TABLE | Self::I64.0);
    /// Live table of 64-bit floats.
    pub const TABLE_F64: Self = Self(Self::TABLE | Self::F64.0);

    /// Flattened table of unsigned 64-bit integers.
    pub const CHILD_U64: Self = Self(Self::CHILD | Self::TABLE_U64.0);
    /// Flattened table of signed 64-bit integers.
    pub const CHILD_I64: Self = Self(Self::CHILD | Self::TABLE_I64.0);
    /// Flattened table of 64-bit floats.
    pub const CHILD_F64: Self = Self(Self::CHILD | Self::TABLE_F64.0);

    /// Build a tag from raw bits, rejecting anything wider than six bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::MASK != 0 {
            None
        } else {
            Some(Self(bits))
        }
    }

    /// Numeric tag for an element kind.
    #[must_use]
    pub(crate) const fn numeric(integer: bool, signed: bool, width: u8) -> Self {
        let mut bits = width & Self::BITS_MASK;
        if integer {
            bits |= Self::INTEGER;
        }
        if signed {
            bits |= Self::SIGNED;
        }
        Self(bits)
    }

    /// Raw tag bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Check if the slot is unoccupied.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == Self::EMPTY.0
    }

    /// Check if the tag is one of the reserved sentinel states.
    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        self.0 == Self::EMPTY.0 || self.0 == Self::NONE.0 || self.0 == Self::ERR.0
    }

    /// Check if the TABLE bit is set.
    #[must_use]
    pub const fn is_table(self) -> bool {
        self.0 & Self::TABLE != 0
    }

    /// Check if the CHILD bit is set.
    #[must_use]
    pub const fn is_child(self) -> bool {
        self.0 & Self::CHILD != 0
    }

    /// Check if this is a live (heap-resident) table reference.
    #[must_use]
    pub const fn is_live_table(self) -> bool {
        self.is_table() && !self.is_child()
    }

    /// Check if the SIGNED bit is set.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        self.0 & Self::SIGNED != 0
    }

    /// Check if the INTEGER bit is set.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        self.0 & Self::INTEGER != 0
    }

    /// Width of the numeric category in bits.
    #[must_use]
    pub const fn width_bits(self) -> u32 {
        8 << (self.0 & Self::BITS_MASK)
    }

    /// Tag of the element kind, with the TABLE and CHILD bits cleared.
    #[must_use]
    pub const fn element(self) -> Self {
        Self(self.0 & !(Self::TABLE | Self::CHILD))
    }

    /// Same tag with the TABLE bit set.
    #[must_use]
    pub const fn as_table(self) -> Self {
        Self(self.0 | Self::TABLE)
    }

    /// Same tag with the CHILD bit set.
    #[must_use]
    pub const fn with_child(self) -> Self {
        Self(self.0 | Self::CHILD)
    }

    /// Check if a slot may hold this tag.
    ///
    /// Stored slots are EMPTY, a 64-bit scalar, or a 64-bit table of either kind.
    #[must_use]
    pub const fn is_storable(self) -> bool {
        if self.is_empty() {
            return true;
        }
        let element = self.element().0;
        element == Self::U64.0 || element == Self::I64.0 || element == Self::F64.0
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(self) -> String {
        match self {
            Self::EMPTY => return "empty".to_string(),
            Self::NONE => return "none".to_string(),
            Self::ERR => return "error".to_string(),
            _ => {}
        }

        let element = self.element();
        let base = match (element.is_integer(), element.is_signed()) {
            (true, false) => format!("u{}", element.width_bits()),
            (true, true) => format!("i{}", element.width_bits()),
            (false, true) => format!("f{}", element.width_bits()),
            (false, false) => return format!("unknown(0x{:02x})", self.0),
        };

        if self.is_child() {
            format!("child {}", base)
        } else if self.is_table() {
            format!("table {}", base)
        } else {
            base
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
