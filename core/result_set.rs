use tracing::trace;

use crate::shape::{push_scalar_values, resolve_path, scalar_columns, Shape, TupleShape};
use crate::value::{Value, ValueType};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub value_type: ValueType,
    /// Maximum cell size for text and blob columns, `None` when unbounded.
    pub max_size: Option<usize>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            max_size: None,
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }
}

/// Immutable tabular result: column metadata plus a row-major cell grid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Explicit rows and explicit metadata. No inference happens.
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::RowWidthMismatch {
                    row: i,
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
        }
        trace!(
            columns = columns.len(),
            rows = rows.len(),
            "materialized result set"
        );
        Ok(Self { columns, rows })
    }

    /// A result set with columns but no rows.
    pub fn empty(columns: Vec<ColumnMeta>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Explicit rows with column names only; types are inferred from the
    /// first row. Without rows every named column is declared `Any`, and
    /// without rows or names the shape cannot be deduced.
    pub fn with_column_names<S: AsRef<str>>(names: &[S], rows: Vec<Vec<Value>>) -> Result<Self> {
        let columns = match rows.first() {
            None if names.is_empty() => return Err(Error::UndeducibleMetadata),
            None => names
                .iter()
                .map(|name| ColumnMeta::new(name.as_ref(), ValueType::Any))
                .collect(),
            Some(first) => {
                if !names.is_empty() && names.len() != first.len() {
                    return Err(Error::ColumnCountMismatch {
                        names: names.len(),
                        width: first.len(),
                    });
                }
                first
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| {
                        let name: &str = names.get(i).map(|n| n.as_ref()).unwrap_or("");
                        ColumnMeta::new(name, cell.value_type())
                    })
                    .collect()
            }
        };
        Self::new(columns, rows)
    }

    /// A single named column holding `values`, typed from the first element.
    pub fn from_values<V: Into<Value>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let rows: Vec<Vec<Value>> = values.into_iter().map(|v| vec![v.into()]).collect();
        let value_type = rows
            .first()
            .map(|row| row[0].value_type())
            .unwrap_or(ValueType::Any);
        Self {
            columns: vec![ColumnMeta::new(name, value_type)],
            rows,
        }
    }

    /// One row per object, one column per property path. Paths may be
    /// dotted to reach nested shapes. Every path is resolved against the
    /// shape descriptor before any object is read.
    pub fn from_objects<T: Shape, S: AsRef<str>>(objects: &[T], paths: &[S]) -> Result<Self> {
        let descriptors = T::describe();
        let resolved = paths
            .iter()
            .map(|path| resolve_path(T::shape_name(), &descriptors, path.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let columns = resolved.iter().map(|r| r.column().clone()).collect();
        let rows = objects
            .iter()
            .map(|object| {
                resolved
                    .iter()
                    .map(|path| path.value_of(object))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()
            .map_err(|err| with_shape(err, T::shape_name()))?;
        Self::new(columns, rows)
    }

    /// One row per object, one column per scalar property in declaration order.
    pub fn from_shapes<T: Shape>(objects: &[T]) -> Result<Self> {
        let descriptors = T::describe();
        let columns = scalar_columns(&descriptors);
        let mut rows = Vec::with_capacity(objects.len());
        for object in objects {
            let mut row = Vec::with_capacity(columns.len());
            push_scalar_values(object, &descriptors, &mut row)
                .map_err(|err| with_shape(err, T::shape_name()))?;
            rows.push(row);
        }
        Self::new(columns, rows)
    }

    /// Rows of 2 to 4 shapes. Each slot contributes one column per scalar
    /// property, slot by slot.
    pub fn from_tuples<T: TupleShape>(rows: &[T]) -> Result<Self> {
        let columns = T::columns();
        let rows = rows
            .iter()
            .map(|tuple| {
                let mut row = Vec::with_capacity(columns.len());
                tuple.flatten(&mut row)?;
                Ok::<_, Error>(row)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(columns, rows)
    }

    /// A 1×1 result set holding a scalar.
    pub fn scalar(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            columns: vec![ColumnMeta::new("", value.value_type())],
            rows: vec![vec![value]],
        }
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive column lookup.
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// First cell of the first row, what a scalar execution returns.
    pub fn first_cell(&self) -> Value {
        self.cell(0, 0).cloned().unwrap_or(Value::Null)
    }
}

fn with_shape(err: Error, shape: &str) -> Error {
    match err {
        Error::UnknownProperty { path, .. } => Error::UnknownProperty {
            shape: shape.to_string(),
            path,
        },
        err => err,
    }
}
