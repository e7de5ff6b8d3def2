//! Get command - print one value, descending through embedded tables.

use super::{ElemKind, JsonElement, read_image};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tbl_core::{TableView, TypeTag, Value};

/// A value resolved from an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved {
    /// Slash-separated path of the value.
    pub path: String,
    /// Slot tag name.
    pub tag: String,
    /// The value; an embedded table shows its array.
    pub value: serde_json::Value,
    /// Rendered tree, for embedded tables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<String>,
}

/// Run the get command.
pub fn run(file: &Path, key: &str, path: Option<&str>, elem: ElemKind, json: bool) -> Result<()> {
    let tables: Vec<&str> = path
        .map(|p| p.split('/').filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    tracing::info!(file = %file.display(), key, depth = tables.len(), "Reading value");

    let bytes = read_image(file)?;
    let resolved = match elem {
        ElemKind::U64 => resolve(TableView::<u64>::new(&bytes)?, &tables, key, String::new()),
        ElemKind::I64 => resolve(TableView::<i64>::new(&bytes)?, &tables, key, String::new()),
        ElemKind::F64 => resolve(TableView::<f64>::new(&bytes)?, &tables, key, String::new()),
    }
    .with_context(|| format!("Failed to read '{}' from {}", key, file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        match &resolved.tree {
            Some(tree) => print!("{}", tree),
            None => println!("{}", resolved.value),
        }
    }
    Ok(())
}

/// Follow `tables` from `view`, then read `key`.
pub fn resolve<T: JsonElement>(
    view: TableView<'_, T>,
    tables: &[&str],
    key: &str,
    prefix: String,
) -> tbl_core::Result<Resolved> {
    if let Some((next, rest)) = tables.split_first() {
        let prefix = format!("{}/{}", prefix, next);
        let child = view.child_ref(next)?;
        return match child.element_tag() {
            TypeTag::U64 => resolve(view.child::<u64>(next)?, rest, key, prefix),
            TypeTag::I64 => resolve(view.child::<i64>(next)?, rest, key, prefix),
            _ => resolve(view.child::<f64>(next)?, rest, key, prefix),
        };
    }

    let path = format!("{}/{}", prefix, key);
    let value = view.value(key)?;
    let tag = value.tag().name();
    let resolved = match value {
        Value::U64(v) => Resolved::scalar(path, tag, v.into()),
        Value::I64(v) => Resolved::scalar(path, tag, v.into()),
        Value::F64(v) => Resolved::scalar(path, tag, v.into()),
        Value::Child(child) => match child.element_tag() {
            TypeTag::U64 => Resolved::table(path, tag, view.child::<u64>(key)?),
            TypeTag::I64 => Resolved::table(path, tag, view.child::<i64>(key)?),
            _ => Resolved::table(path, tag, view.child::<f64>(key)?),
        },
        // Views never hold live references.
        Value::Table(_) => Resolved::scalar(path, tag, serde_json::Value::Null),
    };
    Ok(resolved)
}

impl Resolved {
    fn scalar(path: String, tag: String, value: serde_json::Value) -> Self {
        Self {
            path,
            tag,
            value,
            tree: None,
        }
    }

    fn table<U: JsonElement>(path: String, tag: String, view: TableView<'_, U>) -> Self {
        let items = view.iter().map(JsonElement::to_json).collect();
        Self {
            path,
            tag,
            value: serde_json::Value::Array(items),
            tree: Some(view.tree()),
        }
    }
}
