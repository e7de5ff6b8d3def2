//! Element-wise arithmetic on array elements.

use super::element::Element;
use std::fmt;

/// An arithmetic operator applied element by element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// `a % b`
    Rem,
}

impl ArithOp {
    /// Operator symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Element kinds that support element-wise arithmetic.
///
/// Integers wrap on overflow; floats follow IEEE 754.
pub trait Numeric: Element {
    /// Apply `op` to `self` and `rhs`.
    ///
    /// Returns `None` for an integer division or remainder by zero.
    fn apply(self, op: ArithOp, rhs: Self) -> Option<Self>;
}

macro_rules! impl_integer {
    ($($ty:ty),+) => {
        $(
            impl Numeric for $ty {
                #[inline]
                fn apply(self, op: ArithOp, rhs: Self) -> Option<Self> {
                    match op {
                        ArithOp::Add => Some(self.wrapping_add(rhs)),
                        ArithOp::Sub => Some(self.wrapping_sub(rhs)),
                        ArithOp::Mul => Some(self.wrapping_mul(rhs)),
                        ArithOp::Div => (rhs != 0).then(|| self.wrapping_div(rhs)),
                        ArithOp::Rem => (rhs != 0).then(|| self.wrapping_rem(rhs)),
                    }
                }
            }
        )+
    };
}

macro_rules! impl_float {
    ($($ty:ty),+) => {
        $(
            impl Numeric for $ty {
                #[inline]
                fn apply(self, op: ArithOp, rhs: Self) -> Option<Self> {
                    Some(match op {
                        ArithOp::Add => self + rhs,
                        ArithOp::Sub => self - rhs,
                        ArithOp::Mul => self * rhs,
                        ArithOp::Div => self / rhs,
                        ArithOp::Rem => self % rhs,
                    })
                }
            }
        )+
    };
}

impl_integer!(u8, u16, u32, u64, i8, i16, i32, i64);
impl_float!(f32, f64);
