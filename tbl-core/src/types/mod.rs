//! Element kinds, slot type tags and typed map values.

mod arith;
mod element;
mod tag;
mod value;

pub use arith::{ArithOp, Numeric};
pub use element::Element;
pub use tag::TypeTag;
pub use value::{ChildRef, FromValue, LiveTable, NestedElement, Value};
