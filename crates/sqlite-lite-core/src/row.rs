//! Owned row snapshots and row-to-tuple scanning.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::TypeError;
use crate::value::{Coercion, FromValue, Value};

/// Column metadata shared by every row read from the same statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column names in order
    names: Vec<String>,
    /// Name -> index mapping; the first column wins on duplicate names
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    pub fn new(names: Vec<String>) -> Self {
        let mut name_to_index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            name_to_index.entry(name.clone()).or_insert(i);
        }
        Self {
            names,
            name_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A copy of one result row.
///
/// Unlike column reads on a statement, a `Row` stays valid after the
/// statement is stepped or reset.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
    coercion: Coercion,
}

impl Row {
    /// Create a row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>, coercion: Coercion) -> Self {
        Self {
            values,
            columns,
            coercion,
        }
    }

    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        Self::with_columns(
            Arc::new(ColumnInfo::new(column_names)),
            values,
            Coercion::default(),
        )
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &ColumnInfo {
        &self.columns
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Get a typed value by column index.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, TypeError> {
        let value = self.values.get(index).ok_or_else(|| {
            TypeError::new(
                T::EXPECTED,
                format!(
                    "index {} out of bounds (row has {} columns)",
                    index,
                    self.len()
                ),
            )
        })?;
        T::from_value(value.clone(), self.coercion).map_err(|e| e.at_column(index))
    }

    /// Get a typed value by column name.
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T, TypeError> {
        let index = self
            .columns
            .index_of(name)
            .ok_or_else(|| TypeError::new(T::EXPECTED, format!("no column named '{}'", name)))?;
        self.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Conversion from a full result row.
pub trait FromRow: Sized {
    /// Number of columns this type consumes, or `None` for any width.
    fn arity() -> Option<usize>;

    /// Build the value from the row's columns in declared order.
    ///
    /// `values.len()` equals `arity()` whenever `arity()` is `Some`.
    fn from_row(
        columns: &Arc<ColumnInfo>,
        values: Vec<Value>,
        coercion: Coercion,
    ) -> Result<Self, TypeError>;
}

impl FromRow for Row {
    fn arity() -> Option<usize> {
        None
    }

    fn from_row(
        columns: &Arc<ColumnInfo>,
        values: Vec<Value>,
        coercion: Coercion,
    ) -> Result<Self, TypeError> {
        Ok(Row::with_columns(Arc::clone(columns), values, coercion))
    }
}

impl FromRow for Vec<Value> {
    fn arity() -> Option<usize> {
        None
    }

    fn from_row(
        _columns: &Arc<ColumnInfo>,
        values: Vec<Value>,
        _coercion: Coercion,
    ) -> Result<Self, TypeError> {
        Ok(values)
    }
}

macro_rules! from_row_tuple {
    ($len:expr => $($name:ident),+) => {
        impl<$($name: FromValue),+> FromRow for ($($name,)+) {
            fn arity() -> Option<usize> {
                Some($len)
            }

            #[allow(non_snake_case, unused_assignments)]
            fn from_row(
                _columns: &Arc<ColumnInfo>,
                values: Vec<Value>,
                coercion: Coercion,
            ) -> Result<Self, TypeError> {
                let mut iter = values.into_iter();
                let mut index = 0usize;
                $(
                    let $name = $name::from_value(iter.next().unwrap_or(Value::Null), coercion)
                        .map_err(|e| e.at_column(index))?;
                    index += 1;
                )+
                Ok(($($name,)+))
            }
        }
    };
}

from_row_tuple!(1 => A);
from_row_tuple!(2 => A, B);
from_row_tuple!(3 => A, B, C);
from_row_tuple!(4 => A, B, C, D);
from_row_tuple!(5 => A, B, C, D, E);
from_row_tuple!(6 => A, B, C, D, E, F);
from_row_tuple!(7 => A, B, C, D, E, F, G);
from_row_tuple!(8 => A, B, C, D, E, F, G, H);
