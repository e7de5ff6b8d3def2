//! Element-wise arithmetic and concatenation.
//!
//! Arithmetic works on the array segment only. Every result is computed
//! before anything is written, so a zero integer divisor leaves the table
//! unchanged.

use super::Table;
use crate::config::TableConfig;
use crate::error::{Result, TblError};
use crate::types::{ArithOp, Element, Numeric, TypeTag, Value};

/// Which operand's map entry survives when both hold the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPrecedence {
    /// Entries of `self` win.
    #[default]
    Left,
    /// Entries of the other table win.
    Right,
}

fn combine<T: Numeric>(
    lhs: impl Iterator<Item = T>,
    rhs: impl Iterator<Item = T>,
    op: ArithOp,
) -> Result<Vec<T>> {
    lhs.zip(rhs)
        .enumerate()
        .map(|(index, (a, b))| {
            a.apply(op, b).ok_or(TblError::DivisionByZero {
                index: index as u64,
            })
        })
        .collect()
}

impl<T: Numeric> Table<T> {
    /// Apply `op` between this array and `rhs`, element by element, in place.
    ///
    /// Only the first `min(len, rhs.len)` elements change.
    pub fn apply_assign(&mut self, op: ArithOp, rhs: &Table<T>) -> Result<()> {
        let results = combine(self.iter(), rhs.iter(), op)?;
        for (index, value) in results.into_iter().enumerate() {
            self.write_element(index, value);
        }
        Ok(())
    }

    /// Apply `op` between every element and `rhs`, in place.
    pub fn apply_scalar_assign(&mut self, op: ArithOp, rhs: T) -> Result<()> {
        let results = combine(self.iter(), std::iter::repeat(rhs), op)?;
        for (index, value) in results.into_iter().enumerate() {
            self.write_element(index, value);
        }
        Ok(())
    }

    /// Apply `op` between this array and `rhs` into a new table.
    ///
    /// The result is as long as the longer operand; past the shorter one,
    /// elements of the longer are copied unchanged. The result has no map
    /// entries.
    pub fn apply(&self, op: ArithOp, rhs: &Table<T>) -> Result<Table<T>> {
        let mut values = combine(self.iter(), rhs.iter(), op)?;
        let longer = if self.len() >= rhs.len() { self } else { rhs };
        let shared = values.len();
        values.extend(longer.iter().skip(shared));
        self.array_table(&values)
    }

    /// Apply `op` between every element and `rhs` into a new table with no
    /// map entries.
    pub fn apply_scalar(&self, op: ArithOp, rhs: T) -> Result<Table<T>> {
        let values = combine(self.iter(), std::iter::repeat(rhs), op)?;
        self.array_table(&values)
    }

    fn array_table(&self, values: &[T]) -> Result<Table<T>> {
        let mut table = Table::with_config(
            &TableConfig::default()
                .with_array_capacity(values.len() as u64)
                .with_max_nesting_depth(self.max_nesting_depth),
        )?;
        table.extend_from_slice(values)?;
        Ok(table)
    }
}

impl<T: Element> Table<T> {
    /// Concatenate two tables into a new one.
    ///
    /// The array holds the elements of `self` followed by those of `other`.
    /// The map holds the entries of both; `precedence` picks the winner for
    /// keys present in both. Live nested tables are shared with the result,
    /// while flattened children are copied out into new live tables so the
    /// result does not depend on either operand's block.
    pub fn concat(&self, other: &Table<T>, precedence: KeyPrecedence) -> Result<Table<T>> {
        let len = self.len() as u64 + other.len() as u64;
        let mut table = Table::with_config(
            &TableConfig::default()
                .with_array_capacity(len)
                .with_max_nesting_depth(self.max_nesting_depth),
        )?;
        table.extend_from_slice(&self.to_vec())?;
        table.extend_from_slice(&other.to_vec())?;

        let (first, second) = match precedence {
            KeyPrecedence::Left => (other, self),
            KeyPrecedence::Right => (self, other),
        };
        table.merge_entries(first)?;
        table.merge_entries(second)?;

        tracing::debug!(
            len,
            elems = table.elems(),
            ?precedence,
            "Concatenated tables"
        );
        Ok(table)
    }

    fn merge_entries(&mut self, from: &Table<T>) -> Result<()> {
        for key in from.keys() {
            let value = match from.value(&key)? {
                Value::Child(child) => match child.element_tag() {
                    TypeTag::U64 => Value::from(from.child::<u64>(&key)?.to_owned_table()?),
                    TypeTag::I64 => Value::from(from.child::<i64>(&key)?.to_owned_table()?),
                    _ => Value::from(from.child::<f64>(&key)?.to_owned_table()?),
                },
                value => value,
            };
            self.insert(&key, value)?;
        }
        Ok(())
    }
}
