//! Prepared statements.

use crate::command::Command;
use crate::config::BatchPolicy;
use crate::connection::{Connection, restrict_payload};
use crate::models::IntoRecord;
use crate::storage::{PreparedPlan, record_operation_metrics, status_of};
use crate::{Error, Result};
use std::fmt;
use std::time::Instant;

/// A write command compiled once and executed with many payloads.
///
/// Borrowed from its [`Connection`]; it cannot outlive it.
pub struct PreparedStatement<'c> {
    conn: &'c Connection,
    command: Command,
    plan: Option<Box<dyn PreparedPlan + 'c>>,
}

impl<'c> PreparedStatement<'c> {
    pub(crate) fn new(conn: &'c Connection, command: Command, plan: Box<dyn PreparedPlan + 'c>) -> Self {
        Self {
            conn,
            command,
            plan: Some(plan),
        }
    }

    /// The command this statement runs.
    #[must_use]
    pub const fn command(&self) -> &Command {
        &self.command
    }

    /// Executes the statement with one payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterClose`] after [`PreparedStatement::close`],
    /// [`Error::InvalidInput`] for an unusable payload, and
    /// [`Error::Execution`] if the store rejects it.
    pub fn execute<P: IntoRecord + ?Sized>(&mut self, payload: &P) -> Result<u64> {
        let plan = self.plan.as_mut().ok_or(Error::UseAfterClose("statement"))?;
        let record = restrict_payload(&self.command, payload.to_record()?);
        let start = Instant::now();
        let result = plan.execute(&record);
        record_operation_metrics(
            self.conn.driver_name(),
            "statement_execute",
            start,
            status_of(&result),
        );
        result
    }

    /// Executes the statement once per payload.
    ///
    /// Each failure becomes one `item N: cause` line (N counts from 1) of an
    /// [`Error::BatchExecution`]. With [`BatchPolicy::AbortOnError`] the
    /// first failure ends the batch and `total` counts only the items tried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterClose`] after close, or
    /// [`Error::BatchExecution`] if any item fails.
    pub fn execute_batch<P: IntoRecord>(&mut self, payloads: &[P], policy: BatchPolicy) -> Result<u64> {
        if self.plan.is_none() {
            return Err(Error::UseAfterClose("statement"));
        }
        let mut affected = 0;
        let mut attempted = 0;
        let mut failures = Vec::new();
        for (idx, payload) in payloads.iter().enumerate() {
            attempted += 1;
            match self.execute(payload) {
                Ok(n) => affected += n,
                Err(err) => {
                    failures.push(format!("item {}: {err}", idx + 1));
                    if policy == BatchPolicy::AbortOnError {
                        break;
                    }
                },
            }
        }

        if failures.is_empty() {
            return Ok(affected);
        }
        tracing::warn!(
            collection = self.command.collection(),
            failed = failures.len(),
            attempted,
            total = payloads.len(),
            "batch finished with failures"
        );
        Err(Error::BatchExecution {
            failed: failures.len(),
            total: attempted,
            affected,
            message: failures.join("\n"),
        })
    }

    /// Releases the compiled plan. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.plan = None;
    }

    /// Returns true once [`PreparedStatement::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.plan.is_none()
    }
}

impl fmt::Debug for PreparedStatement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("command", &self.command.to_string())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn sqlite() -> Connection {
        let conn = Connection::open("sqlite://").unwrap();
        conn.exec_raw("CREATE TABLE t (ID INTEGER PRIMARY KEY, Name TEXT NOT NULL)", &[])
            .unwrap();
        conn
    }

    fn payloads() -> Vec<Record> {
        vec![
            Record::new().with("ID", 1).with("Name", "a"),
            Record::new().with("ID", 2),
            Record::new().with("ID", 3).with("Name", "c"),
            Record::new().with("ID", 1).with("Name", "dup"),
            Record::new().with("ID", 5).with("Name", "e"),
        ]
    }

    #[test]
    fn test_continue_collects_every_failure() {
        let conn = sqlite();
        let err = conn
            .execute_batch(&Command::from("t").insert(), &payloads())
            .unwrap_err();
        match err {
            Error::BatchExecution {
                failed,
                total,
                affected,
                message,
            } => {
                assert_eq!((failed, total, affected), (2, 5, 3));
                let lines: Vec<&str> = message.lines().collect();
                assert_eq!(lines.len(), 2);
                assert!(lines[0].starts_with("item 2: "));
                assert!(lines[1].starts_with("item 4: "));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_abort_stops_at_first_failure() {
        let conn = sqlite().with_batch_policy(BatchPolicy::AbortOnError);
        let err = conn
            .execute_batch(&Command::from("t").insert(), &payloads())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::BatchExecution {
                failed: 1,
                total: 2,
                affected: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_execute_after_close() {
        let conn = sqlite();
        let mut stmt = conn.prepare(&Command::from("t").insert()).unwrap();
        stmt.close();
        stmt.close();
        let err = stmt
            .execute(&Record::new().with("ID", 9).with("Name", "x"))
            .unwrap_err();
        assert!(err.is_use_after_close());
    }
}
