//! Prelude for convenient imports.
//!
//! ```
//! use tbl_core::prelude::*;
//! ```

// Tables
pub use crate::table::{
    CompactionResult, KeyPrecedence, SharedTable, SlotMut, Table, TableView,
};

// Error handling
pub use crate::error::{Result, TblError};

// Configuration
pub use crate::config::TableConfig;

// Values and element kinds
pub use crate::types::{
    ArithOp, ChildRef, Element, FromValue, LiveTable, NestedElement, Numeric, TypeTag, Value,
};

// Map inspection
pub use crate::map::Lookup;

// Stores
pub use crate::store::{BlobStore, DirStore, MemoryStore, load_table, store_table};
