//! Scheme-to-driver lookup.
//!
//! ```text
//! DriverRegistry
//!   ├── "sqlite" → SqliteDriver
//!   ├── "mem"    → MemoryDriver
//!   └── register(scheme, driver) for anything else
//! ```

use super::traits::{Driver, DriverConnection};
use super::{MemoryDriver, SqliteDriver, record_operation_metrics, status_of};
use crate::config::DbflexConfig;
use crate::models::ConnectionDescriptor;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

static GLOBAL: LazyLock<DriverRegistry> = LazyLock::new(DriverRegistry::with_defaults);

/// Maps descriptor schemes to drivers.
///
/// Schemes are matched case-insensitively. All drivers are wrapped in `Arc`
/// so a registry can be cloned cheaply.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `sqlite` and `mem` drivers.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with_driver("sqlite", Arc::new(SqliteDriver::new()))
            .with_driver("mem", Arc::new(MemoryDriver::new()))
    }

    /// The built-in drivers, tuned by `config`.
    #[must_use]
    pub fn from_config(config: &DbflexConfig) -> Self {
        Self::new()
            .with_driver(
                "sqlite",
                Arc::new(SqliteDriver::new().with_busy_timeout(config.sqlite.busy_timeout())),
            )
            .with_driver("mem", Arc::new(MemoryDriver::new()))
    }

    /// The process-wide registry used by [`Connection::open`](crate::Connection::open).
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Builder-style [`DriverRegistry::register`].
    #[must_use]
    pub fn with_driver(mut self, scheme: &str, driver: Arc<dyn Driver>) -> Self {
        self.register(scheme, driver);
        self
    }

    /// Registers `driver` for `scheme`, replacing any previous driver.
    pub fn register(&mut self, scheme: &str, driver: Arc<dyn Driver>) {
        self.drivers.insert(scheme.to_ascii_lowercase(), driver);
    }

    /// Returns the driver for `scheme`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedScheme`] if no driver is registered.
    pub fn get(&self, scheme: &str) -> Result<Arc<dyn Driver>> {
        self.drivers
            .get(&scheme.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::UnsupportedScheme(scheme.to_string()))
    }

    /// Registered schemes, sorted.
    #[must_use]
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Resolves the descriptor's driver and opens a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedScheme`] or the driver's connect error.
    pub fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DriverConnection>> {
        let driver = self.get(descriptor.scheme())?;
        tracing::debug!(driver = driver.name(), uri = %descriptor, "opening session");
        let start = Instant::now();
        let result = driver.connect(descriptor);
        record_operation_metrics(driver.name(), "connect", start, status_of(&result));
        result.inspect_err(|e| tracing::warn!(driver = driver.name(), error = %e, "connect failed"))
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}
