//! CLI command implementations.

pub mod get;
pub mod inspect;
pub mod pack;
pub mod store;
pub mod validate;
pub mod version;

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::fmt;
use std::path::Path;
use tbl_core::config::DEFAULT_MAX_NESTING_DEPTH;
use tbl_core::{NestedElement, TableView, TblError, TypeTag, Value};

/// Element kind of the outermost table in an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ElemKind {
    /// Unsigned 64-bit integers.
    U64,
    /// Signed 64-bit integers.
    I64,
    /// 64-bit floats.
    #[default]
    F64,
}

impl fmt::Display for ElemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Element kinds the CLI can read from and write to JSON.
pub trait JsonElement: NestedElement + fmt::Display {
    /// Convert a JSON number, if it fits this kind exactly.
    fn from_json(number: &serde_json::Number) -> Option<Self>;

    /// Convert to a JSON value.
    fn to_json(self) -> serde_json::Value;
}

impl JsonElement for u64 {
    fn from_json(number: &serde_json::Number) -> Option<Self> {
        number.as_u64()
    }

    fn to_json(self) -> serde_json::Value {
        serde_json::Value::from(self)
    }
}

impl JsonElement for i64 {
    fn from_json(number: &serde_json::Number) -> Option<Self> {
        number.as_i64()
    }

    fn to_json(self) -> serde_json::Value {
        serde_json::Value::from(self)
    }
}

impl JsonElement for f64 {
    fn from_json(number: &serde_json::Number) -> Option<Self> {
        number.as_f64()
    }

    fn to_json(self) -> serde_json::Value {
        serde_json::Value::from(self)
    }
}

/// Read an image file into memory.
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read image: {}", path.display()))
}

/// Walk every embedded child of `view`, depth first, calling `visit` with the
/// slash-separated path of each table (the root is "/").
///
/// Children nested deeper than [`DEFAULT_MAX_NESTING_DEPTH`] stop the walk
/// with `CyclicReference`.
pub fn walk<T: JsonElement>(
    view: &TableView<'_, T>,
    path: &str,
    visit: &mut dyn FnMut(&str, TableSummary),
) -> tbl_core::Result<()> {
    walk_at(view, path, 0, visit)
}

fn walk_at<T: JsonElement>(
    view: &TableView<'_, T>,
    path: &str,
    depth: usize,
    visit: &mut dyn FnMut(&str, TableSummary),
) -> tbl_core::Result<()> {
    visit(path, TableSummary::of(view));
    for (key, value) in view.entries() {
        let Value::Child(child) = value else {
            continue;
        };
        let depth = depth + 1;
        if depth > DEFAULT_MAX_NESTING_DEPTH {
            return Err(TblError::CyclicReference { depth });
        }
        let path = if path == "/" {
            format!("/{}", key)
        } else {
            format!("{}/{}", path, key)
        };
        match child.element_tag() {
            TypeTag::U64 => walk_at(&view.child::<u64>(&key)?, &path, depth, visit)?,
            TypeTag::I64 => walk_at(&view.child::<i64>(&key)?, &path, depth, visit)?,
            _ => walk_at(&view.child::<f64>(&key)?, &path, depth, visit)?,
        }
    }
    Ok(())
}

/// Shape of one table met during a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSummary {
    /// Element kind tag.
    pub element: TypeTag,
    /// Array length.
    pub len: usize,
    /// Occupied map slots.
    pub elems: usize,
    /// Total image bytes.
    pub size_bytes: u64,
    /// Largest probe displacement in the map.
    pub max_displacement: usize,
}

impl TableSummary {
    fn of<T: JsonElement>(view: &TableView<'_, T>) -> Self {
        Self {
            element: T::TAG,
            len: view.len(),
            elems: view.elems(),
            size_bytes: view.size_bytes(),
            max_displacement: view.max_displacement(),
        }
    }
}
