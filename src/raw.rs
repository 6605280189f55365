//! Raw SQL results and positional scanning.
//!
//! ```rust
//! use dbflex::Connection;
//!
//! let conn = Connection::open("sqlite://")?;
//! conn.exec_raw("CREATE TABLE TestTable (ID INTEGER, Title TEXT)", &[])?;
//! conn.exec_raw("INSERT INTO TestTable VALUES (1, 'first')", &[])?;
//!
//! let rows = conn.query("SELECT * FROM TestTable", &[])?;
//! assert_eq!(rows.columns(), ["ID", "Title"]);
//! for row in rows {
//!     let (id, title): (i64, String) = row?.scan()?;
//!     assert_eq!((id, title.as_str()), (1, "first"));
//! }
//! # Ok::<(), dbflex::Error>(())
//! ```

use crate::models::{Record, Value};
use crate::storage::{Column, RowStream};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Rows returned by [`Connection::query`](crate::Connection::query).
///
/// Column names and types are known before the first row is read.
pub struct RawRows<'c> {
    stream: Box<dyn RowStream + 'c>,
    names: Arc<[String]>,
}

impl<'c> RawRows<'c> {
    pub(crate) fn new(stream: Box<dyn RowStream + 'c>) -> Self {
        let names = stream.columns().iter().map(|c| c.name.clone()).collect();
        Self { stream, names }
    }

    /// Column names in result order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.names
    }

    /// Column names with declared types and value kinds.
    #[must_use]
    pub fn column_types(&self) -> &[Column] {
        self.stream.columns()
    }

    /// Reads every remaining row.
    ///
    /// # Errors
    ///
    /// Returns the first read error.
    pub fn collect_rows(self) -> Result<Vec<Row>> {
        self.collect()
    }
}

impl Iterator for RawRows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.stream.next_row().map(|values| {
            values.map(|values| Row {
                names: Arc::clone(&self.names),
                values,
            })
        })
    }
}

impl fmt::Debug for RawRows<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRows")
            .field("columns", &self.names)
            .finish_non_exhaustive()
    }
}

/// One raw result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    names: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true for a row with no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.names
    }

    /// Values in column order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Converts the value at `idx`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `idx` is out of range or the value does not convert.
    pub fn get<T: FromValue>(&self, idx: usize) -> Result<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            Error::Decode(format!("column {idx} out of range for a row of {}", self.len()))
        })?;
        T::from_value(value).map_err(|e| {
            let name = self.names.get(idx).map_or("?", String::as_str);
            let cause = match e {
                Error::Decode(cause) => cause,
                other => other.to_string(),
            };
            Error::Decode(format!("column {idx} ({name}): {cause}"))
        })
    }

    /// Converts the value of the named column, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if there is no such column or the value does not convert.
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T> {
        let idx = self
            .names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::Decode(format!("no column named '{name}'")))?;
        self.get(idx)
    }

    /// Scans the whole row into a tuple, one element per column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the tuple arity differs from the column
    /// count or any value does not convert.
    pub fn scan<T: FromRow>(&self) -> Result<T> {
        if self.values.len() != T::ARITY {
            return Err(Error::Decode(format!(
                "row has {} columns but {} destinations were given",
                self.values.len(),
                T::ARITY
            )));
        }
        T::from_row(self)
    }

    /// Converts into an open record.
    #[must_use]
    pub fn into_record(self) -> Record {
        self.names.iter().cloned().zip(self.values).collect()
    }
}

/// Types a single column value converts into.
pub trait FromValue: Sized {
    /// Converts one value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the value does not fit.
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(value: &Value, target: &str) -> Error {
    Error::Decode(format!("cannot read {} value '{value}' as {target}", value.kind()))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Err(mismatch(value, "text")),
            Value::Bytes(b) => Self::from_utf8(b.clone()).map_err(|_| mismatch(value, "text")),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for i64 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(Self::from(*b)),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as Self),
            Value::Text(s) => s.trim().parse().map_err(|_| mismatch(value, "an integer")),
            _ => Err(mismatch(value, "an integer")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        let wide = i64::from_value(value)?;
        Self::try_from(wide).map_err(|_| mismatch(value, "a 32-bit integer"))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => s.trim().parse().map_err(|_| mismatch(value, "a number")),
            other => other.as_f64().ok_or_else(|| mismatch(value, "a number")),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            _ => Err(mismatch(value, "a boolean")),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_timestamp().ok_or_else(|| mismatch(value, "a timestamp"))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(mismatch(value, "bytes")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Tuples a whole row scans into.
pub trait FromRow: Sized {
    /// Number of columns the tuple consumes.
    const ARITY: usize;

    /// Converts a row whose length has already been checked against `ARITY`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if any value does not convert.
    fn from_row(row: &Row) -> Result<Self>;
}

macro_rules! impl_from_row {
    ($arity:literal => $($t:ident $idx:tt),+) => {
        impl<$($t: FromValue),+> FromRow for ($($t,)+) {
            const ARITY: usize = $arity;

            fn from_row(row: &Row) -> Result<Self> {
                Ok(($(row.get::<$t>($idx)?,)+))
            }
        }
    };
}

impl_from_row!(1 => A 0);
impl_from_row!(2 => A 0, B 1);
impl_from_row!(3 => A 0, B 1, C 2);
impl_from_row!(4 => A 0, B 1, C 2, D 3);
impl_from_row!(5 => A 0, B 1, C 2, D 3, E 4);
impl_from_row!(6 => A 0, B 1, C 2, D 3, E 4, F 5);
impl_from_row!(7 => A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_from_row!(8 => A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn row(values: Vec<Value>) -> Row {
        let names: Vec<String> = (0..values.len()).map(|i| format!("c{i}")).collect();
        Row {
            names: names.into(),
            values,
        }
    }

    #[test]
    fn test_scan_matches_arity() {
        let r = row(vec![Value::Int(1), Value::from("t")]);
        let (id, title): (i64, String) = r.scan().unwrap();
        assert_eq!((id, title.as_str()), (1, "t"));
    }

    #[test]
    fn test_scan_rejects_wrong_arity() {
        let r = row(vec![Value::Int(1), Value::from("t")]);
        assert!(matches!(r.scan::<(i64,)>(), Err(Error::Decode(_))));
        assert!(matches!(r.scan::<(i64, String, String)>(), Err(Error::Decode(_))));
    }

    #[test]
    fn test_null_needs_option() {
        let r = row(vec![Value::Null]);
        assert!(r.get::<i64>(0).is_err());
        assert_eq!(r.get::<Option<i64>>(0).unwrap(), None);
    }

    #[test_case(Value::Int(7), 7; "int")]
    #[test_case(Value::Float(7.0), 7; "integral float")]
    #[test_case(Value::from(" 7 "), 7; "numeric text")]
    #[test_case(Value::Bool(true), 1; "bool")]
    fn test_i64_conversions(value: Value, expected: i64) {
        assert_eq!(i64::from_value(&value).unwrap(), expected);
    }

    #[test]
    fn test_i32_overflow() {
        assert!(i32::from_value(&Value::Int(i64::MAX)).is_err());
    }

    #[test]
    fn test_timestamp_from_text() {
        let expected = Utc.with_ymd_and_hms(2019, 2, 23, 12, 54, 18).unwrap();
        let value = Value::from("2019-02-23 12:54:18");
        assert_eq!(DateTime::<Utc>::from_value(&value).unwrap(), expected);
    }

    #[test]
    fn test_get_by_name_and_into_record() {
        let r = row(vec![Value::Int(3), Value::from("x")]);
        assert_eq!(r.get_by_name::<String>("C1").unwrap(), "x");
        assert!(r.get_by_name::<String>("missing").is_err());
        let record = r.into_record();
        assert_eq!(record.get_i64("c0"), Some(3));
    }
}
