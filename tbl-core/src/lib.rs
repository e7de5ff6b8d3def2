//! Table Core Library
//!
//! This crate provides a hybrid container that keeps a dense typed array and
//! a string-keyed map in one contiguous block of memory.
//!
//! # Overview
//!
//! A table block starts with a 24-byte header, followed by the array segment,
//! the map segment (64-byte Robin Hood hashed slots) and a child region that
//! holds embedded sub-tables. Every offset inside a block is relative, so a
//! flattened table can be copied, written to disk or sent across a process
//! boundary as plain bytes and read back in place.
//!
//! # Key Components
//!
//! - **Layout**: Header bit packing and segment arithmetic
//! - **Map**: Key hashing, slot records and the Robin Hood probe engine
//! - **Table**: The owning table, borrowed views, flattening and compaction
//! - **Store**: Blob stores for flattened images
//!
//! # Example
//!
//! ```
//! use tbl_core::prelude::*;
//!
//! let mut child = Table::<u64>::new();
//! child.push(9)?;
//!
//! let mut table = Table::<f64>::new();
//! table.extend_from_slice(&[1.0, 2.0])?;
//! table.insert("child", child)?;
//!
//! // Flatten into one relocatable image and read it back without copying.
//! let image = table.serialize()?.to_vec();
//! let view = TableView::<f64>::new(&image)?;
//! assert_eq!(view.to_vec(), vec![1.0, 2.0]);
//! assert_eq!(view.child::<u64>("child")?.to_vec(), vec![9]);
//! # Ok::<(), tbl_core::TblError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod layout;
pub mod map;
pub mod prelude;
pub mod store;
pub mod table;
pub mod types;

// Re-export key types at crate root for convenience
pub use config::TableConfig;
pub use error::{Result, TblError};
pub use layout::{Header, Layout};
pub use map::Lookup;
pub use store::{BlobStore, DirStore, MemoryStore, load_table, store_table};
pub use table::{CompactionResult, KeyPrecedence, SharedTable, Table, TableView};
pub use types::{
    ArithOp, ChildRef, Element, FromValue, LiveTable, NestedElement, Numeric, TypeTag, Value,
};
