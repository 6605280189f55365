//! Backing stores.
//!
//! This module holds the driver seams and the two built-in drivers:
//!
//! - **sqlite**: native `SQLite` through `rusqlite`
//! - **mem**: process-local named stores, handy for tests and scratch work
//!
//! Drivers are looked up by descriptor scheme in a [`DriverRegistry`].

// Row counts cross between `usize` and SQL integers.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
// Allow significant_drop_tightening - store guards are held for one short operation.
#![allow(clippy::significant_drop_tightening)]

mod lock;
pub mod memory;
mod metrics;
mod registry;
pub mod sqlite;
pub mod traits;

pub use lock::acquire_lock;
pub use memory::MemoryDriver;
pub use metrics::record_operation_metrics;
pub(crate) use metrics::status_of;
pub use registry::DriverRegistry;
pub use sqlite::SqliteDriver;
pub use traits::{BufferedRows, Column, Driver, DriverConnection, PreparedPlan, RowStream};
