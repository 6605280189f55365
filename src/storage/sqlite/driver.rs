//! The `sqlite` driver.

use super::connection::{DEFAULT_BUSY_TIMEOUT, open};
use super::row::read_rows;
use super::sql::{build_count, build_select, build_write, quote_identifier};
use crate::command::{Command, Operation};
use crate::models::{ConnectionDescriptor, Record, Value};
use crate::storage::traits::{Driver, DriverConnection, PreparedPlan, RowStream};
use crate::{Error, Result};
use rusqlite::params_from_iter;
use std::time::Duration;
use tracing::instrument;

/// Driver for `sqlite://` descriptors.
#[derive(Debug, Clone)]
pub struct SqliteDriver {
    busy_timeout: Duration,
}

impl SqliteDriver {
    /// A driver with the default 5 second busy timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Sets how long a statement waits on a locked database.
    #[must_use]
    pub const fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    #[instrument(skip(self, descriptor), fields(driver = "sqlite", uri = %descriptor))]
    fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DriverConnection>> {
        let conn = open(descriptor, self.busy_timeout)?;
        Ok(Box::new(SqliteConnection { conn }))
    }
}

/// One open `SQLite` database.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl DriverConnection for SqliteConnection {
    fn driver_name(&self) -> &'static str {
        "sqlite"
    }

    fn ping(&self) -> Result<()> {
        self.conn
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| Error::execution("ping", e))
    }

    #[instrument(
        skip(self, command, payload),
        fields(driver = "sqlite", operation = %command.operation(), collection = command.collection())
    )]
    fn execute(&self, command: &Command, payload: Option<&Record>) -> Result<u64> {
        run_write(&self.conn, command, payload)
    }

    #[instrument(
        skip(self, command),
        fields(driver = "sqlite", operation = "select", collection = command.collection())
    )]
    fn select(&self, command: &Command) -> Result<Box<dyn RowStream + '_>> {
        let stmt = build_select(command)?;
        tracing::debug!(sql = %stmt.sql, "select");
        let mut prepared = self
            .conn
            .prepare_cached(&stmt.sql)
            .map_err(|e| Error::execution("select", e))?;
        Ok(Box::new(read_rows(&mut prepared, &stmt.params)?))
    }

    #[instrument(
        skip(self, command),
        fields(driver = "sqlite", operation = "count", collection = command.collection())
    )]
    fn count(&self, command: &Command) -> Result<u64> {
        let stmt = build_count(command)?;
        let count: i64 = self
            .conn
            .query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| row.get(0))
            .map_err(|e| Error::execution("count", e))?;
        Ok(count.max(0) as u64)
    }

    #[instrument(
        skip(self, command),
        fields(driver = "sqlite", operation = %command.operation(), collection = command.collection())
    )]
    fn prepare(&self, command: &Command) -> Result<Box<dyn PreparedPlan + '_>> {
        let prepare_error = |cause: String| Error::Prepare {
            collection: command.collection().to_string(),
            cause,
        };
        if command.operation() == Operation::Select {
            return Err(prepare_error("only write commands can be prepared".to_string()));
        }
        let table = quote_identifier(command.collection()).map_err(|e| prepare_error(e.to_string()))?;
        // Compiling a probe surfaces a missing table now instead of on first use.
        self.conn
            .prepare_cached(&format!("SELECT * FROM {table} LIMIT 0"))
            .map_err(|e| prepare_error(e.to_string()))?;
        if command.operation() == Operation::Delete {
            let stmt = build_write(command, None).map_err(|e| prepare_error(e.to_string()))?;
            self.conn
                .prepare_cached(&stmt.sql)
                .map_err(|e| prepare_error(e.to_string()))?;
        }
        Ok(Box::new(SqlitePlan {
            conn: &self.conn,
            command: command.clone(),
        }))
    }

    #[instrument(skip(self, sql, params), fields(driver = "sqlite", operation = "query"))]
    fn query(&self, sql: &str, params: &[Value]) -> Result<Box<dyn RowStream + '_>> {
        let mut prepared = self
            .conn
            .prepare(sql)
            .map_err(|e| Error::execution("query", e))?;
        Ok(Box::new(read_rows(&mut prepared, params)?))
    }

    #[instrument(skip(self, sql, params), fields(driver = "sqlite", operation = "exec"))]
    fn exec_raw(&self, sql: &str, params: &[Value]) -> Result<u64> {
        if params.is_empty() {
            self.conn
                .execute_batch(sql)
                .map_err(|e| Error::execution("exec", e))?;
            return Ok(u64::try_from(self.conn.changes()).unwrap_or(u64::MAX));
        }
        let affected = self
            .conn
            .execute(sql, params_from_iter(params.iter()))
            .map_err(|e| Error::execution("exec", e))?;
        Ok(affected as u64)
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| Error::execution("close", e))
    }
}

/// A write command compiled against one connection.
///
/// The SQL depends on the payload's column set, so statements are compiled
/// through the connection's statement cache and reused for every payload
/// with the same columns.
struct SqlitePlan<'c> {
    conn: &'c rusqlite::Connection,
    command: Command,
}

impl PreparedPlan for SqlitePlan<'_> {
    fn execute(&mut self, payload: &Record) -> Result<u64> {
        run_write(self.conn, &self.command, Some(payload))
    }
}

fn run_write(conn: &rusqlite::Connection, command: &Command, payload: Option<&Record>) -> Result<u64> {
    let operation = command.operation().as_str();
    let stmt = build_write(command, payload)?;
    tracing::debug!(sql = %stmt.sql, params = stmt.params.len(), "write");
    let mut prepared = conn
        .prepare_cached(&stmt.sql)
        .map_err(|e| Error::execution(operation, e))?;
    let affected = prepared
        .execute(params_from_iter(stmt.params.iter()))
        .map_err(|e| Error::execution(operation, e))?;
    Ok(affected as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Filter;
    use crate::storage::traits::RowStream;

    fn session() -> Box<dyn DriverConnection> {
        let descriptor = ConnectionDescriptor::parse("sqlite://").unwrap();
        let conn = SqliteDriver::new().connect(&descriptor).unwrap();
        conn.exec_raw(
            "CREATE TABLE TestModel (ID TEXT PRIMARY KEY, Title TEXT, DataInt INTEGER)",
            &[],
        )
        .unwrap();
        conn
    }

    fn row(id: &str, n: i64) -> Record {
        Record::new()
            .with("ID", id)
            .with("Title", format!("title {id}"))
            .with("DataInt", n)
    }

    #[test]
    fn test_insert_select_update_delete() {
        let conn = session();
        let insert = Command::from("TestModel").insert();
        for i in 0..3 {
            assert_eq!(conn.execute(&insert, Some(&row(&format!("data-{i}"), i))).unwrap(), 1);
        }

        let update = Command::from("TestModel")
            .update()
            .filter(Filter::eq("ID", "data-1"));
        let affected = conn
            .execute(&update, Some(&Record::new().with("Title", "changed")))
            .unwrap();
        assert_eq!(affected, 1);

        let select = Command::from("TestModel").select().order_by(["-ID"]);
        let mut rows = conn.select(&select).unwrap();
        assert_eq!(rows.columns().len(), 3);
        let first = rows.next_row().unwrap().unwrap();
        assert_eq!(first[0], Value::from("data-2"));

        let delete = Command::from("TestModel").delete();
        assert_eq!(conn.execute(&delete, None).unwrap(), 3);
        assert_eq!(conn.count(&Command::from("TestModel").select()).unwrap(), 0);
    }

    #[test]
    fn test_constraint_violation_is_execution_error() {
        let conn = session();
        let insert = Command::from("TestModel").insert();
        conn.execute(&insert, Some(&row("dup", 1))).unwrap();
        let err = conn.execute(&insert, Some(&row("dup", 2))).unwrap_err();
        assert!(matches!(err, Error::Execution { ref operation, .. } if operation == "insert"));
    }

    #[test]
    fn test_prepare_missing_table() {
        let conn = session();
        let err = conn
            .prepare(&Command::from("Missing").insert())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Prepare { ref collection, .. } if collection == "Missing"));
    }

    #[test]
    fn test_plan_reused_across_payloads() {
        let conn = session();
        {
            let mut plan = conn.prepare(&Command::from("TestModel").insert()).unwrap();
            for i in 0..5 {
                plan.execute(&row(&format!("data-{i}"), i)).unwrap();
            }
        }
        assert_eq!(conn.count(&Command::from("TestModel").select()).unwrap(), 5);
    }

    #[test]
    fn test_raw_query_with_params() {
        let conn = session();
        conn.exec_raw(
            "INSERT INTO TestModel VALUES (?1, ?2, ?3)",
            &[Value::from("a"), Value::from("t"), Value::Int(4)],
        )
        .unwrap();
        let mut rows = conn
            .query("SELECT ID, DataInt FROM TestModel WHERE DataInt > ?1", &[Value::Int(1)])
            .unwrap();
        let names: Vec<&str> = rows.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ID", "DataInt"]);
        assert_eq!(rows.next_row().unwrap().unwrap(), vec![Value::from("a"), Value::Int(4)]);
        assert!(rows.next_row().is_none());
    }

    #[test]
    fn test_close_consumes_session() {
        let conn = session();
        assert!(conn.ping().is_ok());
        assert!(conn.close().is_ok());
    }
}
