//! Conversions between [`Value`] and `SQLite` storage classes.

use crate::models::{Value, ValueKind, parse_timestamp};
use crate::storage::traits::{BufferedRows, Column};
use crate::{Error, Result};
use chrono::SecondsFormat;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{ToSql, params_from_iter};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Self::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            Self::Int(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Self::Float(f) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*f)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Timestamp(t) => ToSqlOutput::Owned(rusqlite::types::Value::Text(
                t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )),
            Self::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// Maps a declared column type to a value kind using `SQLite` affinity rules.
///
/// Date/time and boolean declarations are recognised first since `SQLite`
/// itself has no such storage classes.
#[must_use]
pub fn kind_for_decltype(decltype: &str) -> ValueKind {
    let upper = decltype.to_ascii_uppercase();
    if upper.contains("DATE") || upper.contains("TIME") {
        ValueKind::Timestamp
    } else if upper.contains("BOOL") {
        ValueKind::Bool
    } else if upper.contains("INT") {
        ValueKind::Int
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        ValueKind::Text
    } else if upper.is_empty() || upper.contains("BLOB") {
        ValueKind::Bytes
    } else {
        ValueKind::Float
    }
}

/// Converts one stored value, refined by the column's declared kind.
///
/// Text in a date/time column becomes a timestamp when it parses, and
/// 0/1 in a boolean column becomes a bool. Everything else keeps its
/// storage class.
#[must_use]
pub fn value_from_ref(value: ValueRef<'_>, kind: Option<ValueKind>) -> Value {
    match (value, kind) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i @ (0 | 1)), Some(ValueKind::Bool)) => Value::Bool(i == 1),
        (ValueRef::Integer(i), _) => Value::Int(i),
        (ValueRef::Real(f), _) => Value::Float(f),
        (ValueRef::Text(bytes), Some(ValueKind::Timestamp)) => {
            let text = String::from_utf8_lossy(bytes);
            parse_timestamp(&text).map_or_else(|| Value::Text(text.into_owned()), Value::Timestamp)
        },
        (ValueRef::Text(bytes), _) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        (ValueRef::Blob(bytes), _) => Value::Bytes(bytes.to_vec()),
    }
}

/// Runs a prepared query and buffers every row.
///
/// `rusqlite` rows borrow their statement, so rows are read up front and
/// handed out from memory. A step error keeps the rows read before it.
pub fn read_rows(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> Result<BufferedRows> {
    let columns: Vec<Column> = stmt
        .columns()
        .iter()
        .map(|c| Column {
            name: c.name().to_string(),
            declared_type: c.decl_type().map(str::to_string),
            kind: c.decl_type().map(kind_for_decltype),
        })
        .collect();
    let kinds: Vec<Option<ValueKind>> = columns.iter().map(|c| c.kind).collect();

    let mut rows = stmt
        .query(params_from_iter(params.iter()))
        .map_err(|e| Error::execution("select", e))?;
    let mut buffered = Vec::new();
    loop {
        match rows.next() {
            Ok(Some(row)) => {
                let mut values = Vec::with_capacity(kinds.len());
                for (idx, kind) in kinds.iter().enumerate() {
                    match row.get_ref(idx) {
                        Ok(value) => values.push(value_from_ref(value, *kind)),
                        Err(e) => {
                            return Ok(BufferedRows::new(columns, buffered)
                                .with_trailing_error(Error::Cursor(e.to_string())));
                        },
                    }
                }
                buffered.push(values);
            },
            Ok(None) => return Ok(BufferedRows::new(columns, buffered)),
            Err(e) => {
                return Ok(BufferedRows::new(columns, buffered)
                    .with_trailing_error(Error::Cursor(e.to_string())));
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::RowStream;
    use chrono::{TimeZone, Utc};
    use test_case::test_case;

    #[test_case("INTEGER", ValueKind::Int; "integer")]
    #[test_case("VARCHAR2(50)", ValueKind::Text; "varchar")]
    #[test_case("NUMBER(10,2)", ValueKind::Float; "numeric")]
    #[test_case("TIMESTAMP", ValueKind::Timestamp; "timestamp")]
    #[test_case("DATE", ValueKind::Timestamp; "date")]
    #[test_case("BOOLEAN", ValueKind::Bool; "boolean")]
    #[test_case("BLOB", ValueKind::Bytes; "blob")]
    fn test_kind_for_decltype(decl: &str, kind: ValueKind) {
        assert_eq!(kind_for_decltype(decl), kind);
    }

    #[test]
    fn test_timestamp_roundtrip_through_text_column() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (Created TIMESTAMP, Note TEXT)")
            .unwrap();
        let created = Utc.with_ymd_and_hms(2019, 2, 23, 12, 54, 18).unwrap();
        conn.execute(
            "INSERT INTO t VALUES (?1, ?2)",
            [Value::Timestamp(created), Value::from("2019-02-23T12:54:18Z")],
        )
        .unwrap();

        let mut stmt = conn.prepare("SELECT * FROM t").unwrap();
        let mut rows = read_rows(&mut stmt, &[]).unwrap();
        let row = rows.next_row().unwrap().unwrap();
        assert_eq!(row[0], Value::Timestamp(created));
        // undeclared as a timestamp, so it stays text
        assert_eq!(row[1], Value::from("2019-02-23T12:54:18Z"));
    }

    #[test]
    fn test_expression_columns_are_untyped() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT 1 + 1 AS two").unwrap();
        let rows = read_rows(&mut stmt, &[]).unwrap();
        assert_eq!(rows.columns()[0].name, "two");
        assert_eq!(rows.columns()[0].kind, None);
    }
}
