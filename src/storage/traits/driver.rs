//! Driver and session traits.

use super::RowStream;
use crate::Result;
use crate::command::Command;
use crate::models::{ConnectionDescriptor, Record, Value};

/// A backing store reachable through one descriptor scheme.
///
/// # Implementor Notes
///
/// - `connect` must fail with [`Error::ConnectFailure`](crate::Error::ConnectFailure)
///   when the target cannot be reached or rejects the credentials
/// - Drivers are shared through `Arc<dyn Driver>` and must be cheap to call
pub trait Driver: Send + Sync {
    /// Short driver name used in logs and metrics (e.g. `"sqlite"`).
    fn name(&self) -> &'static str;

    /// Opens a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is unusable or the store is unreachable.
    fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DriverConnection>>;
}

/// One live session with a backing store.
///
/// Commands reaching a session have already been validated, and write
/// payloads have already been restricted to the command's field list.
pub trait DriverConnection: Send {
    /// Driver name, as reported by [`Driver::name`].
    fn driver_name(&self) -> &'static str;

    /// Checks that the session is still usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not answer.
    fn ping(&self) -> Result<()>;

    /// Runs an insert, update or delete and returns the affected row count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execution`](crate::Error::Execution) if the store rejects the command.
    fn execute(&self, command: &Command, payload: Option<&Record>) -> Result<u64>;

    /// Opens a row stream for a select command.
    ///
    /// # Errors
    ///
    /// Returns an error if the select cannot be started.
    fn select(&self, command: &Command) -> Result<Box<dyn RowStream + '_>>;

    /// Counts the rows a select command matches, ignoring skip and take.
    ///
    /// # Errors
    ///
    /// Returns an error if the count cannot be computed.
    fn count(&self, command: &Command) -> Result<u64>;

    /// Compiles a write command for repeated execution.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Prepare`](crate::Error::Prepare) if the command cannot be compiled.
    fn prepare(&self, command: &Command) -> Result<Box<dyn PreparedPlan + '_>>;

    /// Runs a raw query and streams its rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`](crate::Error::Unsupported) for drivers
    /// without a query language.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Box<dyn RowStream + '_>>;

    /// Runs a raw statement and returns the affected row count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`](crate::Error::Unsupported) for drivers
    /// without a query language.
    fn exec_raw(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Releases the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the store reports a failure while closing.
    fn close(self: Box<Self>) -> Result<()>;
}

/// A compiled write command bound to one session.
pub trait PreparedPlan {
    /// Executes the plan with one payload and returns the affected row count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execution`](crate::Error::Execution) if the store rejects the payload.
    fn execute(&mut self, payload: &Record) -> Result<u64>;
}
