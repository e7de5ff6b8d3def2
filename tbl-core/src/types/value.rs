//! Tagged map values.
//!
//! A slot holds one 8-byte payload interpreted through its [`TypeTag`]. The
//! closed [`Value`] enum is the typed form of that payload.

use super::element::Element;
use super::tag::TypeTag;
use crate::error::{Result, TblError};
use crate::table::{SharedTable, Table};
use std::fmt;
use std::sync::Arc;

/// A reference to a heap-resident table stored in a map slot.
///
/// The holding table keeps a clone of the `Arc` but never owns the nested
/// table's block.
#[derive(Clone)]
pub enum LiveTable {
    /// Table of unsigned 64-bit integers.
    U64(SharedTable<u64>),
    /// Table of signed 64-bit integers.
    I64(SharedTable<i64>),
    /// Table of 64-bit floats.
    F64(SharedTable<f64>),
}

impl LiveTable {
    /// Slot tag for this reference.
    #[must_use]
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::U64(_) => TypeTag::TABLE_U64,
            Self::I64(_) => TypeTag::TABLE_I64,
            Self::F64(_) => TypeTag::TABLE_F64,
        }
    }

    /// Check if both references point at the same table.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::U64(a), Self::U64(b)) => Arc::ptr_eq(a, b),
            (Self::I64(a), Self::I64(b)) => Arc::ptr_eq(a, b),
            (Self::F64(a), Self::F64(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Produce the flattened image of the referenced table without modifying it.
    ///
    /// Fails with `CyclicReference` if the table is locked for writing, which
    /// happens when it is an ancestor currently being flattened, or if `depth`
    /// exceeds `limit`.
    pub(crate) fn flattened_image(&self, depth: usize, limit: usize) -> Result<Vec<u8>> {
        fn image<T: Element>(table: &SharedTable<T>, depth: usize, limit: usize) -> Result<Vec<u8>> {
            let guard = table
                .try_read()
                .ok_or(TblError::CyclicReference { depth })?;
            guard.flattened_image_at(depth, limit)
        }

        match self {
            Self::U64(t) => image(t, depth, limit),
            Self::I64(t) => image(t, depth, limit),
            Self::F64(t) => image(t, depth, limit),
        }
    }
}

impl fmt::Debug for LiveTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LiveTable").field(&self.tag().name()).finish()
    }
}

/// A flattened table embedded in the child-data region of its holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRef {
    tag: TypeTag,
    offset: u64,
    base: u64,
}

impl ChildRef {
    pub(crate) const fn new(tag: TypeTag, offset: u64, base: u64) -> Self {
        Self { tag, offset, base }
    }

    /// Slot tag (CHILD and TABLE bits set).
    #[must_use]
    pub const fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Element kind of the embedded table.
    #[must_use]
    pub const fn element_tag(&self) -> TypeTag {
        self.tag.element()
    }

    /// Byte offset of the embedded image relative to the holding table's base.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Position of the holding table's base within the outermost image.
    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Position of the embedded image within the outermost image.
    #[must_use]
    pub const fn absolute(&self) -> u64 {
        self.base + self.offset
    }
}

/// A typed map value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Unsigned 64-bit integer.
    U64(u64),
    /// Signed 64-bit integer.
    I64(i64),
    /// 64-bit float.
    F64(f64),
    /// Live reference to a heap-resident table.
    Table(LiveTable),
    /// Flattened table embedded in the holder's block.
    Child(ChildRef),
}

impl Value {
    /// Slot tag for this value.
    #[must_use]
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::U64(_) => TypeTag::U64,
            Self::I64(_) => TypeTag::I64,
            Self::F64(_) => TypeTag::F64,
            Self::Table(t) => t.tag(),
            Self::Child(c) => c.tag(),
        }
    }

    /// Get the child reference, if this is a flattened table.
    #[must_use]
    pub fn as_child(&self) -> Option<&ChildRef> {
        match self {
            Self::Child(c) => Some(c),
            _ => None,
        }
    }

    /// Get the live table reference, if any.
    #[must_use]
    pub fn as_live(&self) -> Option<&LiveTable> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::U64(a), Self::U64(b)) => a == b,
            (Self::I64(a), Self::I64(b)) => a == b,
            (Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
            (Self::Table(a), Self::Table(b)) => a.ptr_eq(b),
            (Self::Child(a), Self::Child(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U64(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::F64(v) => write!(f, "{}", v),
            Self::Table(t) => write!(f, "<{}>", t.tag()),
            Self::Child(c) => write!(f, "<{} @ {}>", c.tag(), c.offset()),
        }
    }
}

macro_rules! widen_into {
    ($variant:ident, $target:ty, $($src:ty),+) => {
        $(
            impl From<$src> for Value {
                fn from(v: $src) -> Self {
                    Self::$variant(<$target>::from(v))
                }
            }
        )+
    };
}

widen_into!(U64, u64, u8, u16, u32, u64);
widen_into!(I64, i64, i8, i16, i32, i64);
widen_into!(F64, f64, f32, f64);

impl<T: NestedElement> From<SharedTable<T>> for Value {
    fn from(table: SharedTable<T>) -> Self {
        Self::Table(T::into_live(table))
    }
}

impl From<LiveTable> for Value {
    fn from(table: LiveTable) -> Self {
        Self::Table(table)
    }
}

/// Element kinds that may be nested inside another table.
pub trait NestedElement: Element {
    /// Wrap a shared table in the matching [`LiveTable`] variant.
    fn into_live(table: SharedTable<Self>) -> LiveTable;

    /// Extract a shared table of this kind from a [`LiveTable`].
    fn from_live(live: &LiveTable) -> Option<SharedTable<Self>>;
}

macro_rules! impl_nested {
    ($ty:ty, $variant:ident) => {
        impl NestedElement for $ty {
            fn into_live(table: SharedTable<Self>) -> LiveTable {
                LiveTable::$variant(table)
            }

            fn from_live(live: &LiveTable) -> Option<SharedTable<Self>> {
                match live {
                    LiveTable::$variant(t) => Some(Arc::clone(t)),
                    _ => None,
                }
            }
        }
    };
}

impl_nested!(u64, U64);
impl_nested!(i64, I64);
impl_nested!(f64, F64);

/// Exact, non-coercing extraction from a [`Value`].
///
/// Integers are never read as floats, signed values never as unsigned, and
/// tables never as scalars.
pub trait FromValue: Sized {
    /// Tag a value must carry to be extracted as `Self`.
    const REQUESTED: TypeTag;

    /// Extract, or report `KeyTypeMismatch` naming `key`.
    fn from_value(key: &str, value: &Value) -> Result<Self>;
}

fn mismatch(key: &str, value: &Value, requested: TypeTag) -> TblError {
    TblError::KeyTypeMismatch {
        key: key.to_string(),
        stored: value.tag(),
        requested,
    }
}

macro_rules! impl_from_value {
    ($ty:ty, $variant:ident, $tag:expr) => {
        impl FromValue for $ty {
            const REQUESTED: TypeTag = $tag;

            fn from_value(key: &str, value: &Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(*v),
                    other => Err(mismatch(key, other, Self::REQUESTED)),
                }
            }
        }
    };
}

impl_from_value!(u64, U64, TypeTag::U64);
impl_from_value!(i64, I64, TypeTag::I64);
impl_from_value!(f64, F64, TypeTag::F64);

impl<T: NestedElement> FromValue for SharedTable<T> {
    const REQUESTED: TypeTag = T::TAG.as_table();

    fn from_value(key: &str, value: &Value) -> Result<Self> {
        value
            .as_live()
            .and_then(T::from_live)
            .ok_or_else(|| mismatch(key, value, Self::REQUESTED))
    }
}

/// Convenience constructor used by tests and callers building trees.
impl<T: NestedElement> From<Table<T>> for Value {
    fn from(table: Table<T>) -> Self {
        Self::from(table.into_shared())
    }
}
