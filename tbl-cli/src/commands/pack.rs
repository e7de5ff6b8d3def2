//! Pack command - build a table tree from JSON and write its image.
//!
//! A JSON array becomes a table's array segment. A JSON object becomes a
//! table's map: numbers are stored as `u64`, `i64` or `f64` (in that order of
//! preference) and nested arrays or objects become nested tables. The
//! reserved key `"[]"` inside an object fills that table's array segment.

use super::{ElemKind, JsonElement};
use anyhow::{Context, Result, bail};
use std::path::Path;
use tbl_core::Table;

/// Object key whose array fills the enclosing table's array segment.
pub const ARRAY_KEY: &str = "[]";

/// Run the pack command.
pub fn run(input: &Path, output: &Path, elem: ElemKind, compact: bool) -> Result<()> {
    tracing::info!(input = %input.display(), output = %output.display(), %elem, "Packing JSON");

    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read JSON: {}", input.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse JSON: {}", input.display()))?;

    let image = match elem {
        ElemKind::U64 => pack::<u64>(&json, compact)?,
        ElemKind::I64 => pack::<i64>(&json, compact)?,
        ElemKind::F64 => pack::<f64>(&json, compact)?,
    };

    std::fs::write(output, &image)
        .with_context(|| format!("Failed to write image: {}", output.display()))?;
    println!(
        "✓ Packed {} into {} ({} bytes, table<{}>)",
        input.display(),
        output.display(),
        image.len(),
        elem
    );
    Ok(())
}

/// Build, flatten and optionally compact a table tree, returning its image.
pub fn pack<T: JsonElement>(json: &serde_json::Value, compact: bool) -> Result<Vec<u8>> {
    let mut table = build::<T>(json, "")?;
    table.flatten()?;
    if compact {
        let result = table.compact()?;
        tracing::debug!(reclaimed = result.bytes_reclaimed(), "Compacted packed table");
    }
    Ok(table.as_bytes().to_vec())
}

/// Build a table from a JSON array or object.
pub fn build<T: JsonElement>(json: &serde_json::Value, path: &str) -> Result<Table<T>> {
    let mut table = Table::<T>::new();
    match json {
        serde_json::Value::Array(items) => fill_array(&mut table, items, path)?,
        serde_json::Value::Object(fields) => {
            for (key, value) in fields {
                let at = format!("{}/{}", path, key);
                if key == ARRAY_KEY {
                    let serde_json::Value::Array(items) = value else {
                        bail!("{}: '{}' must hold an array", at, ARRAY_KEY);
                    };
                    fill_array(&mut table, items, &at)?;
                    continue;
                }
                insert_field(&mut table, key, value, &at)?;
            }
        }
        other => bail!(
            "{}: expected an array or object, found {}",
            display_path(path),
            kind(other)
        ),
    }
    Ok(table)
}

fn fill_array<T: JsonElement>(
    table: &mut Table<T>,
    items: &[serde_json::Value],
    path: &str,
) -> Result<()> {
    let mut values = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let value = match item {
            serde_json::Value::Number(n) => T::from_json(n),
            _ => None,
        };
        match value {
            Some(v) => values.push(v),
            None => bail!(
                "{}[{}]: {} is not a {} element",
                display_path(path),
                i,
                item,
                T::TAG
            ),
        }
    }
    table.extend_from_slice(&values)?;
    Ok(())
}

fn insert_field<T: JsonElement>(
    table: &mut Table<T>,
    key: &str,
    value: &serde_json::Value,
    path: &str,
) -> Result<()> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                table.insert(key, v)?;
            } else if let Some(v) = n.as_i64() {
                table.insert(key, v)?;
            } else if let Some(v) = n.as_f64() {
                table.insert(key, v)?;
            } else {
                bail!("{}: number {} is out of range", path, n);
            }
        }
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            let child = build::<T>(value, path)?;
            table.insert(key, child)?;
        }
        other => bail!("{}: {} values cannot be stored", path, kind(other)),
    }
    Ok(())
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}

fn kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tbl_core::{TableView, Value};

    #[test]
    fn packs_nested_document() {
        let doc = json!({
            "[]": [1.0, 2.0],
            "count": 3,
            "delta": -4,
            "ratio": 0.25,
            "points": [0.5, 1.5],
            "meta": { "version": 2, "[]": [7.0] }
        });
        let image = pack::<f64>(&doc, false).unwrap();
        let view = TableView::<f64>::new(&image).unwrap();

        assert_eq!(view.to_vec(), vec![1.0, 2.0]);
        assert_eq!(view.value("count").unwrap(), Value::U64(3));
        assert_eq!(view.value("delta").unwrap(), Value::I64(-4));
        assert_eq!(view.value("ratio").unwrap(), Value::F64(0.25));
        assert_eq!(view.child::<f64>("points").unwrap().to_vec(), vec![0.5, 1.5]);

        let meta = view.child::<f64>("meta").unwrap();
        assert_eq!(meta.to_vec(), vec![7.0]);
        assert_eq!(meta.value_as::<u64>("version").unwrap(), 2);
    }

    #[test]
    fn compact_packs_tightly() {
        let doc = json!({ "[]": [1, 2, 3], "a": 1 });
        let loose = pack::<u64>(&doc, false).unwrap();
        let tight = pack::<u64>(&doc, true).unwrap();
        assert!(tight.len() < loose.len());

        let view = TableView::<u64>::new(&tight).unwrap();
        assert_eq!(view.capacity(), 3);
        assert_eq!(view.map_capacity(), 1);
    }

    #[test]
    fn rejects_unstorable_values() {
        assert!(pack::<f64>(&json!({ "name": "x" }), false).is_err());
        assert!(pack::<u64>(&json!([1, -1]), false).is_err());
        assert!(pack::<u64>(&json!(5), false).is_err());
        assert!(pack::<f64>(&json!({ "[]": 1 }), false).is_err());
    }
}
