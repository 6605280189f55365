//! Driver traits.
//!
//! Every backing store plugs in through three seams:
//!
//! - [`Driver`]: turns a [`ConnectionDescriptor`](crate::ConnectionDescriptor)
//!   into a live session. Registered per scheme in a
//!   [`DriverRegistry`](crate::DriverRegistry).
//! - [`DriverConnection`]: one live session. Executes commands, opens row
//!   streams, prepares plans and runs raw SQL.
//! - [`RowStream`] and [`PreparedPlan`]: session-scoped handles. They borrow
//!   the session, so they cannot outlive it.

mod driver;
mod stream;

pub use driver::{Driver, DriverConnection, PreparedPlan};
pub use stream::{BufferedRows, Column, RowStream};
