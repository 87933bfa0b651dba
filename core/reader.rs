use std::collections::VecDeque;
use std::fmt::{self, Debug};

use tracing::trace;

use crate::connection::Connection;
use crate::result_set::{ColumnMeta, ResultSet};
use crate::value::{FromValue, Value, ValueType};
use crate::{Error, Result};

enum Source {
    /// Result sets of a single execution, consumed in order.
    Unbound(VecDeque<ResultSet>),
    /// Every `next_result` pulls the next responder from the connection.
    Bound(Connection),
}

/// Forward-only cursor over one or more result sets.
///
/// An unbound reader is positioned on its first result set. A bound reader
/// (pipelined mode) starts before the first result: call
/// [`DataReader::next_result`] to pull each queued responder in turn.
pub struct DataReader {
    source: Source,
    current: Option<ResultSet>,
    row: Option<usize>,
    records_affected: Option<u64>,
    closed: bool,
}

impl DataReader {
    pub(crate) fn unbound(result_sets: Vec<ResultSet>, records_affected: Option<u64>) -> Self {
        let mut remaining: VecDeque<ResultSet> = result_sets.into();
        let current = remaining.pop_front();
        Self {
            source: Source::Unbound(remaining),
            current,
            row: None,
            records_affected,
            closed: false,
        }
    }

    pub(crate) fn bound(conn: Connection) -> Self {
        Self {
            source: Source::Bound(conn),
            current: None,
            row: None,
            records_affected: None,
            closed: false,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.source, Source::Bound(_))
    }

    /// Advance to the next row of the current result set.
    pub fn read(&mut self) -> Result<bool> {
        self.check_open()?;
        let Some(current) = &self.current else {
            return Ok(false);
        };
        let next = self.row.map_or(0, |row| row + 1);
        if next < current.row_count() {
            self.row = Some(next);
            Ok(true)
        } else {
            self.row = Some(current.row_count());
            Ok(false)
        }
    }

    /// Move to the next result set. Returns `Ok(false)` when there is none.
    pub fn next_result(&mut self) -> Result<bool> {
        self.check_open()?;
        self.row = None;
        let next = match &mut self.source {
            Source::Unbound(remaining) => remaining.pop_front(),
            Source::Bound(conn) => match conn.next_responder() {
                Some(responder) => {
                    self.records_affected = responder.records_affected();
                    let mut sets = responder.result_sets()?;
                    Some(if sets.is_empty() {
                        ResultSet::default()
                    } else {
                        sets.swap_remove(0)
                    })
                }
                None => None,
            },
        };
        trace!(
            found = next.is_some(),
            bound = self.is_bound(),
            "advanced to next result"
        );
        let found = next.is_some();
        self.current = next;
        Ok(found)
    }

    pub fn field_count(&self) -> usize {
        self.current.as_ref().map_or(0, ResultSet::column_count)
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        self.current
            .as_ref()
            .map(ResultSet::columns)
            .unwrap_or(&[])
    }

    pub fn column_name(&self, idx: usize) -> Result<&str> {
        self.column(idx).map(|c| c.name.as_str())
    }

    pub fn column_type(&self, idx: usize) -> Result<ValueType> {
        self.column(idx).map(|c| c.value_type)
    }

    /// Case-insensitive column lookup in the current result set.
    pub fn ordinal(&self, name: &str) -> Result<usize> {
        self.current
            .as_ref()
            .and_then(|rs| rs.ordinal(name))
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    pub fn has_rows(&self) -> bool {
        self.current.as_ref().is_some_and(|rs| !rs.is_empty())
    }

    pub fn records_affected(&self) -> Option<u64> {
        self.records_affected
    }

    pub fn current_row(&self) -> Option<&[Value]> {
        let (current, row) = (self.current.as_ref()?, self.row?);
        current.rows().get(row).map(Vec::as_slice)
    }

    pub fn get_value(&self, idx: usize) -> Result<Value> {
        let row = self
            .current_row()
            .ok_or_else(|| Error::Misuse("no current row; call read() first".to_string()))?;
        row.get(idx).cloned().ok_or_else(|| {
            Error::Misuse(format!(
                "column index {idx} out of bounds (row has {} columns)",
                row.len()
            ))
        })
    }

    pub fn get<T: FromValue>(&self, idx: usize) -> Result<T> {
        T::from_value(&self.get_value(idx)?)
    }

    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T> {
        self.get(self.ordinal(name)?)
    }

    pub fn is_null(&self, idx: usize) -> Result<bool> {
        Ok(self.get_value(idx)?.is_null())
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.current = None;
        self.row = None;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn column(&self, idx: usize) -> Result<&ColumnMeta> {
        let columns = self.columns();
        columns.get(idx).ok_or_else(|| {
            Error::Misuse(format!(
                "column index {idx} out of bounds (result has {} columns)",
                columns.len()
            ))
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Misuse("reader is closed".to_string()));
        }
        Ok(())
    }
}

impl Debug for DataReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataReader")
            .field("bound", &self.is_bound())
            .field("fields", &self.field_count())
            .field("row", &self.row)
            .field("closed", &self.closed)
            .finish()
    }
}
