//! The `mem` driver: named in-memory stores shared within the process.
//!
//! `mem://scratch` and every other descriptor naming `scratch` open the same
//! store, so data written through one connection is visible to the next.
//! `mem://` with no name opens a private store that disappears with its
//! connection. Collections are schemaless and spring into existence on the
//! first insert.

mod eval;

pub use eval::{eval, matches};

use super::acquire_lock;
use super::traits::{Driver, DriverConnection, PreparedPlan, RowStream};
use crate::command::{Command, Operation};
use crate::models::{ConnectionDescriptor, Record, Value};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use tracing::instrument;

type SharedStore = Arc<Mutex<MemoryStore>>;

static STORES: LazyLock<Mutex<HashMap<String, SharedStore>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Default)]
struct MemoryStore {
    /// Keyed by lowercased collection name.
    collections: HashMap<String, Vec<Record>>,
}

/// Driver for `mem://` descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryDriver;

impl MemoryDriver {
    /// Creates the driver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Forgets a named store. Open connections keep their data.
    ///
    /// Returns true if the store existed.
    pub fn drop_store(name: &str) -> bool {
        acquire_lock(&STORES).remove(name).is_some()
    }
}

impl Driver for MemoryDriver {
    fn name(&self) -> &'static str {
        "mem"
    }

    fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DriverConnection>> {
        let name = match (descriptor.host(), descriptor.database()) {
            ("", db) => db.to_string(),
            (host, "") => host.to_string(),
            (host, db) => format!("{host}/{db}"),
        };
        let store = if name.is_empty() {
            SharedStore::default()
        } else {
            Arc::clone(acquire_lock(&STORES).entry(name.clone()).or_default())
        };
        tracing::debug!(store = %name, "mem store opened");
        Ok(Box::new(MemoryConnection { name, store }))
    }
}

/// A session on one named store.
pub struct MemoryConnection {
    name: String,
    store: SharedStore,
}

impl MemoryConnection {
    fn unsupported(operation: &'static str) -> Error {
        Error::Unsupported {
            driver: "mem",
            operation,
        }
    }
}

fn collection_key(command: &Command) -> String {
    command.collection().to_ascii_lowercase()
}

fn required_payload<'a>(command: &Command, payload: Option<&'a Record>) -> Result<&'a Record> {
    match payload {
        Some(record) if !record.is_empty() => Ok(record),
        _ => Err(Error::InvalidInput(format!(
            "{} on '{}' needs a payload with at least one field",
            command.operation(),
            command.collection()
        ))),
    }
}

impl DriverConnection for MemoryConnection {
    fn driver_name(&self) -> &'static str {
        "mem"
    }

    fn ping(&self) -> Result<()> {
        Ok(())
    }

    #[instrument(
        skip(self, command, payload),
        fields(driver = "mem", store = %self.name, operation = %command.operation(), collection = command.collection())
    )]
    fn execute(&self, command: &Command, payload: Option<&Record>) -> Result<u64> {
        let mut store = acquire_lock(&self.store);
        let key = collection_key(command);
        match command.operation() {
            Operation::Insert => {
                let payload = required_payload(command, payload)?;
                store
                    .collections
                    .entry(key)
                    .or_default()
                    .push(payload.clone());
                Ok(1)
            },
            Operation::Update => {
                let payload = required_payload(command, payload)?;
                let Some(rows) = store.collections.get_mut(&key) else {
                    return Ok(0);
                };
                let mut affected = 0;
                for row in rows
                    .iter_mut()
                    .filter(|r| matches(command.predicate(), r))
                {
                    for (field, value) in payload.iter() {
                        row.set(field, value.clone());
                    }
                    affected += 1;
                }
                Ok(affected)
            },
            Operation::Delete => {
                let Some(rows) = store.collections.get_mut(&key) else {
                    return Ok(0);
                };
                let before = rows.len();
                rows.retain(|r| !matches(command.predicate(), r));
                Ok((before - rows.len()) as u64)
            },
            Operation::Select => Err(Error::InvalidInput(format!(
                "select on '{}' is not a write command",
                command.collection()
            ))),
        }
    }

    #[instrument(
        skip(self, command),
        fields(driver = "mem", store = %self.name, operation = "select", collection = command.collection())
    )]
    fn select(&self, command: &Command) -> Result<Box<dyn RowStream + '_>> {
        let store = acquire_lock(&self.store);
        let rows = store
            .collections
            .get(&collection_key(command))
            .map_or(&[][..], Vec::as_slice);
        Ok(Box::new(eval::run_select(command, rows)))
    }

    fn count(&self, command: &Command) -> Result<u64> {
        let store = acquire_lock(&self.store);
        Ok(store
            .collections
            .get(&collection_key(command))
            .map_or(0, |rows| eval::count(command, rows)))
    }

    fn prepare(&self, command: &Command) -> Result<Box<dyn PreparedPlan + '_>> {
        if command.operation() == Operation::Select {
            return Err(Error::Prepare {
                collection: command.collection().to_string(),
                cause: "only write commands can be prepared".to_string(),
            });
        }
        Ok(Box::new(MemoryPlan {
            conn: self,
            command: command.clone(),
        }))
    }

    fn query(&self, _sql: &str, _params: &[Value]) -> Result<Box<dyn RowStream + '_>> {
        Err(Self::unsupported("raw sql queries"))
    }

    fn exec_raw(&self, _sql: &str, _params: &[Value]) -> Result<u64> {
        Err(Self::unsupported("raw sql statements"))
    }

    fn close(self: Box<Self>) -> Result<()> {
        tracing::debug!(store = %self.name, "mem store closed");
        Ok(())
    }
}

struct MemoryPlan<'c> {
    conn: &'c MemoryConnection,
    command: Command,
}

impl PreparedPlan for MemoryPlan<'_> {
    fn execute(&mut self, payload: &Record) -> Result<u64> {
        self.conn.execute(&self.command, Some(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Filter;

    fn open(name: &str) -> Box<dyn DriverConnection> {
        let descriptor = ConnectionDescriptor::parse(&format!("mem://{name}")).unwrap();
        MemoryDriver::new().connect(&descriptor).unwrap()
    }

    #[test]
    fn test_named_store_is_shared() {
        let a = open("memory-shared-test");
        let b = open("memory-shared-test");
        let insert = Command::from("Items").insert();
        a.execute(&insert, Some(&Record::new().with("ID", 1))).unwrap();
        assert_eq!(b.count(&Command::from("ITEMS").select()).unwrap(), 1);
        assert!(MemoryDriver::drop_store("memory-shared-test"));
    }

    #[test]
    fn test_unnamed_store_is_private() {
        let a = open("");
        let b = open("");
        a.execute(&Command::from("t").insert(), Some(&Record::new().with("x", 1)))
            .unwrap();
        assert_eq!(b.count(&Command::from("t").select()).unwrap(), 0);
        assert!(!acquire_lock(&STORES).contains_key(""));
    }

    #[test]
    fn test_update_and_delete_counts() {
        let conn = open("memory-update-test");
        let insert = Command::from("t").insert();
        for i in 0..4 {
            conn.execute(&insert, Some(&Record::new().with("n", i))).unwrap();
        }
        let update = Command::from("t").update().filter(Filter::gte("n", 2));
        let affected = conn
            .execute(&update, Some(&Record::new().with("flag", true)))
            .unwrap();
        assert_eq!(affected, 2);
        assert_eq!(
            conn.count(&Command::from("t").select().filter(Filter::eq("flag", true)))
                .unwrap(),
            2
        );
        let delete = Command::from("t").delete();
        assert_eq!(conn.execute(&delete, None).unwrap(), 4);
        MemoryDriver::drop_store("memory-update-test");
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let conn = open("");
        let mut rows = conn.select(&Command::from("nothing").select()).unwrap();
        assert!(rows.columns().is_empty());
        assert!(rows.next_row().is_none());
        assert_eq!(conn.execute(&Command::from("nothing").delete(), None).unwrap(), 0);
    }

    #[test]
    fn test_raw_sql_unsupported() {
        let conn = open("");
        assert!(matches!(
            conn.exec_raw("DELETE FROM t", &[]),
            Err(Error::Unsupported { driver: "mem", .. })
        ));
    }
}
