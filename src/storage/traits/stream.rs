//! Row streams.

use crate::Result;
use crate::models::{Value, ValueKind};
use std::collections::VecDeque;

/// Column metadata reported by a row stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name as the store reports it.
    pub name: String,
    /// Declared type, when the store knows one.
    pub declared_type: Option<String>,
    /// Value kind the declared type maps to, if any.
    pub kind: Option<ValueKind>,
}

impl Column {
    /// A column with no type information.
    #[must_use]
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
            kind: None,
        }
    }
}

/// A forward-only sequence of rows sharing one column list.
pub trait RowStream {
    /// Columns, known before the first row is read.
    fn columns(&self) -> &[Column];

    /// Next row, aligned with [`RowStream::columns`]. `None` once exhausted.
    fn next_row(&mut self) -> Option<Result<Vec<Value>>>;
}

/// A row stream over rows that were read up front.
///
/// A read error part way through keeps the rows read before it; the error
/// is yielded after them.
#[derive(Debug, Default)]
pub struct BufferedRows {
    columns: Vec<Column>,
    rows: VecDeque<Vec<Value>>,
    error: Option<crate::Error>,
}

impl BufferedRows {
    /// Creates a stream over `rows`.
    #[must_use]
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            error: None,
        }
    }

    /// Records an error to yield after the buffered rows.
    #[must_use]
    pub fn with_trailing_error(mut self, error: crate::Error) -> Self {
        self.error = Some(error);
        self
    }
}

impl RowStream for BufferedRows {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_row(&mut self) -> Option<Result<Vec<Value>>> {
        match self.rows.pop_front() {
            Some(row) => Some(Ok(row)),
            None => self.error.take().map(Err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_trailing_error_follows_rows() {
        let mut rows = BufferedRows::new(
            vec![Column::untyped("a")],
            vec![vec![Value::Int(1)], vec![Value::Int(2)]],
        )
        .with_trailing_error(Error::Cursor("disk gone".to_string()));

        assert!(matches!(rows.next_row(), Some(Ok(_))));
        assert!(matches!(rows.next_row(), Some(Ok(_))));
        assert!(matches!(rows.next_row(), Some(Err(Error::Cursor(_)))));
        assert!(rows.next_row().is_none());
    }

    #[test]
    fn test_empty_stream_keeps_columns() {
        let mut rows = BufferedRows::new(vec![Column::untyped("a"), Column::untyped("b")], Vec::new());
        assert_eq!(rows.columns().len(), 2);
        assert!(rows.next_row().is_none());
    }
}
