//! Native `SQLite` driver built on `rusqlite`.
//!
//! Commands become parameterised SQL; see [`sql`] for the translation rules.
//! Connections are opened with WAL journaling, `NORMAL` sync and a busy
//! timeout so several processes can share a database file.

mod connection;
mod driver;
mod row;
pub mod sql;

pub use connection::{
    DEFAULT_BUSY_TIMEOUT, DatabaseLocation, configure_connection, open, resolve_location,
};
pub use driver::{SqliteConnection, SqliteDriver};
pub use row::{kind_for_decltype, value_from_ref};
pub use sql::escape_like_wildcards;
