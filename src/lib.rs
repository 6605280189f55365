//! # dbflex
//!
//! A small, driver-agnostic database access layer.
//!
//! dbflex resolves a connection descriptor into a live [`Connection`], builds
//! declarative [`Command`]s (select/insert/update/delete with filters, ordering
//! and pagination), executes them, and materializes results through a
//! [`Cursor`] into either typed serde structs or open [`Record`]s.
//!
//! ## Features
//!
//! - URI or discrete-field connection descriptors with redacted credentials
//! - Immutable, fluent command builder with a server-evaluated predicate tree
//! - Prepared statements for repeated inserts/updates
//! - Batch execution that collects per-item failures into one error
//! - Cursors whose construction errors are deferred to a single checkpoint
//! - A raw query-and-scan path with column introspection
//! - Built-in drivers: `sqlite` (native, via `rusqlite`) and `mem` (in-process)
//!
//! ## Example
//!
//! ```rust
//! use dbflex::{Command, Connection, Filter, Record};
//!
//! let mut conn = Connection::open("mem://doc-example")?;
//! let insert = Command::from("people").insert();
//! conn.execute_with(&insert, &Record::new().with("ID", "p-1").with("Name", "Ada"))?;
//!
//! let select = Command::from("people").select().filter(Filter::eq("ID", "p-1"));
//! let mut cursor = conn.cursor(&select);
//! let mut rows: Vec<Record> = Vec::new();
//! cursor.fetch(&mut rows, 0)?;
//! cursor.close();
//! drop(cursor);
//! assert_eq!(rows.len(), 1);
//!
//! conn.close()?;
//! # Ok::<(), dbflex::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use std::fmt;
use thiserror::Error as ThisError;

pub mod command;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod models;
pub mod observability;
pub mod raw;
pub mod statement;
pub mod storage;

// Re-exports for convenience
pub use command::{Command, CommandBuilder, Direction, Filter, Operation, SortField};
pub use config::{BatchPolicy, DbflexConfig};
pub use connection::Connection;
pub use cursor::Cursor;
pub use models::{ConnectionDescriptor, FromRecord, IntoRecord, Record, Value, ValueKind};
pub use raw::{FromRow, FromValue, RawRows, Row};
pub use statement::PreparedStatement;
pub use storage::{Column, DriverRegistry};

/// Why a connection attempt failed after the descriptor was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailureReason {
    /// The backing store could not be reached (host down, path missing).
    Unreachable,
    /// The store was reached but rejected the credentials.
    Authentication,
    /// Any other I/O or driver failure during connect.
    Io,
}

impl fmt::Display for ConnectFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unreachable => "unreachable",
            Self::Authentication => "authentication failed",
            Self::Io => "i/o failure",
        };
        f.write_str(s)
    }
}

/// Error type for dbflex operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `MalformedDescriptor` | URI/easy-connect text cannot be parsed, port not numeric |
/// | `UnsupportedScheme` | No driver is registered for the descriptor's scheme |
/// | `ConnectFailure` | The driver could not open the backing store |
/// | `UseAfterClose` | A closed connection, cursor or statement is used |
/// | `Prepare` | A command cannot be compiled into a driver plan |
/// | `Execution` | A single write or query fails in the backing store |
/// | `BatchExecution` | One or more items of a batch failed |
/// | `Cursor` | The store reported a failure while a cursor was being read |
/// | `Decode` | A row cannot be mapped onto the destination shape |
/// | `InvalidInput` | A command or payload is unusable (bad identifier, missing payload) |
/// | `Unsupported` | The driver cannot perform the operation (raw SQL on `mem`) |
/// | `OperationFailed` | Config files, log files and other ambient I/O |
#[derive(Debug, Clone, ThisError)]
pub enum Error {
    /// The connection descriptor could not be parsed.
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(String),

    /// No driver is registered for this scheme.
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    /// The backing store could not be opened.
    #[error("unable to connect to {target} ({reason}): {cause}")]
    ConnectFailure {
        /// The redacted descriptor that was being opened.
        target: String,
        /// Failure classification.
        reason: ConnectFailureReason,
        /// The underlying cause.
        cause: String,
    },

    /// A resource was used after it was closed.
    #[error("{0} used after close")]
    UseAfterClose(&'static str),

    /// A command could not be prepared.
    #[error("prepare failed for '{collection}': {cause}")]
    Prepare {
        /// Collection the command targets.
        collection: String,
        /// The underlying cause.
        cause: String,
    },

    /// A single operation failed in the backing store.
    #[error("operation '{operation}' failed: {cause}")]
    Execution {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Some items of a batch failed.
    ///
    /// `message` holds one line per failed item.
    #[error("{failed} of {total} batch items failed:\n{message}")]
    BatchExecution {
        /// Number of failed items.
        failed: usize,
        /// Number of items attempted.
        total: usize,
        /// Rows affected by the items that succeeded.
        affected: u64,
        /// Per-item failures joined with a newline.
        message: String,
    },

    /// The store reported an error while iterating a cursor.
    #[error("cursor error: {0}")]
    Cursor(String),

    /// A row could not be mapped to the destination shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The driver does not support the operation.
    #[error("driver '{driver}' does not support {operation}")]
    Unsupported {
        /// Driver name.
        driver: &'static str,
        /// What was attempted.
        operation: &'static str,
    },

    /// An ambient operation (config, logging) failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds an [`Error::Execution`] from an operation name and any displayable cause.
    pub fn execution(operation: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::Execution {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Returns true for [`Error::UseAfterClose`].
    #[must_use]
    pub const fn is_use_after_close(&self) -> bool {
        matches!(self, Self::UseAfterClose(_))
    }
}

/// Result type alias for dbflex operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::execution("insert", "constraint failed");
        assert_eq!(err.to_string(), "operation 'insert' failed: constraint failed");

        let err = Error::UseAfterClose("cursor");
        assert_eq!(err.to_string(), "cursor used after close");
        assert!(err.is_use_after_close());

        let err = Error::UnsupportedScheme("oracle".to_string());
        assert_eq!(err.to_string(), "unsupported scheme 'oracle'");
    }

    #[test]
    fn test_batch_error_lists_every_item() {
        let err = Error::BatchExecution {
            failed: 2,
            total: 5,
            affected: 3,
            message: "item 2: boom\nitem 4: boom".to_string(),
        };
        let text = err.to_string();
        assert!(text.starts_with("2 of 5 batch items failed:"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_connect_failure_reason_display() {
        let err = Error::ConnectFailure {
            target: "sqlite:///missing/db.sqlite".to_string(),
            reason: ConnectFailureReason::Unreachable,
            cause: "unable to open database file".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("unreachable"));
        assert!(display.contains("sqlite:///missing/db.sqlite"));
    }
}
