//! Opening and tuning `SQLite` connections.

use crate::models::ConnectionDescriptor;
use crate::{ConnectFailureReason, Error, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;
use std::time::Duration;

/// Busy timeout used when neither config nor descriptor sets one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Where a descriptor points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// A private in-memory database.
    Memory,
    /// A database file.
    File(PathBuf),
}

/// Resolves the database location from a descriptor.
///
/// - `sqlite:///var/data/app.db` → absolute path `/var/data/app.db`
/// - `sqlite://app.db` or `sqlite://./dir/app.db` → relative path
/// - `sqlite://` or `?mode=memory` → in-memory database
#[must_use]
pub fn resolve_location(descriptor: &ConnectionDescriptor) -> DatabaseLocation {
    if descriptor.option("mode") == Some("memory") {
        return DatabaseLocation::Memory;
    }
    match (descriptor.host(), descriptor.database()) {
        ("", "") => DatabaseLocation::Memory,
        ("", path) => DatabaseLocation::File(PathBuf::from(format!("/{path}"))),
        (host, "") => DatabaseLocation::File(PathBuf::from(host)),
        (host, path) => DatabaseLocation::File(PathBuf::from(host).join(path)),
    }
}

/// Opens a connection, creating the file unless `?create=false` is given.
///
/// `?busy_timeout_ms=N` overrides `busy_timeout`.
///
/// # Errors
///
/// Returns [`Error::ConnectFailure`] if the file cannot be opened.
pub fn open(descriptor: &ConnectionDescriptor, busy_timeout: Duration) -> Result<Connection> {
    let create = descriptor.option_as::<bool>("create")?.unwrap_or(true);
    let busy_timeout = descriptor
        .option_as::<u64>("busy_timeout_ms")?
        .map_or(busy_timeout, Duration::from_millis);

    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if create {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }

    let conn = match resolve_location(descriptor) {
        DatabaseLocation::Memory => Connection::open_in_memory(),
        DatabaseLocation::File(path) => Connection::open_with_flags(&path, flags),
    }
    .map_err(|e| connect_failure(descriptor, &e))?;

    configure_connection(&conn, busy_timeout).map_err(|e| connect_failure(descriptor, &e))?;
    Ok(conn)
}

/// Applies journal, sync and busy-timeout pragmas.
///
/// WAL is requested but not required: in-memory databases keep their own
/// journal mode and the pragma reports it instead of failing.
///
/// # Errors
///
/// Returns the driver error if the busy timeout cannot be set, which is
/// also the first statement that touches the file.
pub fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    // journal_mode answers with a row, so ignore the value
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    conn.query_row("SELECT 1", [], |_| Ok(()))
}

fn connect_failure(descriptor: &ConnectionDescriptor, err: &rusqlite::Error) -> Error {
    let reason = match err.sqlite_error_code() {
        Some(rusqlite::ErrorCode::CannotOpen | rusqlite::ErrorCode::NotFound) => {
            ConnectFailureReason::Unreachable
        },
        Some(rusqlite::ErrorCode::PermissionDenied | rusqlite::ErrorCode::AuthorizationForStatementDenied) => {
            ConnectFailureReason::Authentication
        },
        _ => ConnectFailureReason::Io,
    };
    Error::ConnectFailure {
        target: descriptor.to_string(),
        reason,
        cause: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(uri: &str) -> DatabaseLocation {
        resolve_location(&ConnectionDescriptor::parse(uri).unwrap())
    }

    #[test]
    fn test_resolve_location() {
        assert_eq!(location("sqlite://"), DatabaseLocation::Memory);
        assert_eq!(location("sqlite://x.db?mode=memory"), DatabaseLocation::Memory);
        assert_eq!(
            location("sqlite:///tmp/data.db"),
            DatabaseLocation::File(PathBuf::from("/tmp/data.db"))
        );
        assert_eq!(
            location("sqlite://data.db"),
            DatabaseLocation::File(PathBuf::from("data.db"))
        );
    }

    #[test]
    fn test_missing_directory_is_unreachable() {
        let descriptor =
            ConnectionDescriptor::parse("sqlite:///nonexistent-dbflex-dir/sub/data.db").unwrap();
        let err = open(&descriptor, DEFAULT_BUSY_TIMEOUT).unwrap_err();
        assert!(matches!(
            err,
            Error::ConnectFailure {
                reason: ConnectFailureReason::Unreachable,
                ..
            }
        ));
    }

    #[test]
    fn test_create_false_refuses_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let uri = format!("sqlite://{}?create=false", path.display());
        let descriptor = ConnectionDescriptor::parse(&uri).unwrap();
        assert!(open(&descriptor, DEFAULT_BUSY_TIMEOUT).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_in_memory_opens() {
        let descriptor = ConnectionDescriptor::parse("sqlite://").unwrap();
        let conn = open(&descriptor, DEFAULT_BUSY_TIMEOUT).unwrap();
        let one: i64 = conn.query_row("SELECT 1", [], |r| r.get(0)).unwrap();
        assert_eq!(one, 1);
    }
}
