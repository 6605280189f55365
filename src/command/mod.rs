//! Declarative data commands.
//!
//! A [`Command`] describes one operation against a named collection. Commands
//! are plain values: every builder method consumes the command and returns an
//! updated one, nothing touches a connection, and a command can be executed
//! any number of times.
//!
//! ```rust
//! use dbflex::{Command, Filter, Operation};
//!
//! let top3 = Command::from("TestModel").select().order_by(["-ID"]).take(3);
//! assert_eq!(top3.operation(), Operation::Select);
//! assert_eq!(top3.limit(), Some(3));
//!
//! let range = Command::from("TestModel")
//!     .select()
//!     .filter(Filter::and([Filter::gte("ID", "data-2"), Filter::lte("ID", "data-4")]));
//! assert!(range.predicate().is_some());
//! ```

mod filter;

pub use filter::Filter;

use crate::{Error, Result};
use std::fmt;

/// Kind of data operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Read rows.
    Select,
    /// Write new rows.
    Insert,
    /// Change matching rows.
    Update,
    /// Remove matching rows.
    Delete,
}

impl Operation {
    /// Returns the operation as a lowercase string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    /// Field name.
    pub field: String,
    /// Direction.
    pub direction: Direction,
}

impl SortField {
    /// Parses a field spec: a leading `-` means descending, otherwise ascending.
    ///
    /// A leading `+` is accepted and ignored.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if let Some(field) = spec.strip_prefix('-') {
            Self {
                field: field.trim().to_string(),
                direction: Direction::Descending,
            }
        } else {
            Self {
                field: spec.strip_prefix('+').unwrap_or(spec).trim().to_string(),
                direction: Direction::Ascending,
            }
        }
    }

    /// Returns true for descending order.
    #[must_use]
    pub fn is_descending(&self) -> bool {
        self.direction == Direction::Descending
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_descending() {
            f.write_str("-")?;
        }
        f.write_str(&self.field)
    }
}

/// First step of the builder: a collection without an operation yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuilder {
    collection: String,
}

impl CommandBuilder {
    /// A select command reading every field.
    #[must_use]
    pub fn select(self) -> Command {
        Command::new(self.collection, Operation::Select)
    }

    /// An insert command. The rows come from the execution payload.
    #[must_use]
    pub fn insert(self) -> Command {
        Command::new(self.collection, Operation::Insert)
    }

    /// An update command. New values come from the execution payload.
    #[must_use]
    pub fn update(self) -> Command {
        Command::new(self.collection, Operation::Update)
    }

    /// A delete command. Without a filter it removes every row.
    #[must_use]
    pub fn delete(self) -> Command {
        Command::new(self.collection, Operation::Delete)
    }
}

/// An immutable description of one data operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    collection: String,
    operation: Operation,
    fields: Vec<String>,
    filter: Option<Filter>,
    sort: Vec<SortField>,
    skip: usize,
    take: Option<usize>,
}

impl Command {
    /// Starts a command against `collection`.
    #[allow(clippy::should_implement_trait)]
    pub fn from(collection: impl Into<String>) -> CommandBuilder {
        CommandBuilder {
            collection: collection.into(),
        }
    }

    fn new(collection: String, operation: Operation) -> Self {
        Self {
            collection,
            operation,
            fields: Vec::new(),
            filter: None,
            sort: Vec::new(),
            skip: 0,
            take: None,
        }
    }

    /// Restricts the command to the named fields.
    ///
    /// For selects this is the projection; for updates only these fields of
    /// the payload are written. An empty list means all fields.
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the predicate, replacing any previous one.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the ordering from field specs such as `"-ID"` or `"Title"`.
    #[must_use]
    pub fn order_by<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.sort = specs
            .into_iter()
            .map(|s| SortField::parse(s.as_ref()))
            .collect();
        self
    }

    /// Skips the first `n` matching rows.
    #[must_use]
    pub const fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    /// Returns at most `n` rows. `take(0)` is recorded but means unbounded.
    #[must_use]
    pub const fn take(mut self, n: usize) -> Self {
        self.take = Some(n);
        self
    }

    /// Target collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Operation kind.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Field restriction; empty means all fields.
    #[must_use]
    pub fn selected_fields(&self) -> &[String] {
        &self.fields
    }

    /// Predicate, if set.
    #[must_use]
    pub const fn predicate(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Ordering terms.
    #[must_use]
    pub fn sort_fields(&self) -> &[SortField] {
        &self.sort
    }

    /// Rows to skip.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.skip
    }

    /// The value given to [`Command::take`], if it was called.
    #[must_use]
    pub const fn take_value(&self) -> Option<usize> {
        self.take
    }

    /// Effective row limit: `None` when unset or set to 0.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        match self.take {
            Some(0) | None => None,
            Some(n) => Some(n),
        }
    }

    /// Checks that the command is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty collection or field name,
    /// or when a write command carries select-only clauses.
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(Error::InvalidInput("collection name is empty".to_string()));
        }
        if self.fields.iter().any(|f| f.trim().is_empty())
            || self.sort.iter().any(|s| s.field.is_empty())
        {
            return Err(Error::InvalidInput(format!(
                "empty field name in command on '{}'",
                self.collection
            )));
        }
        if self.operation != Operation::Select
            && (!self.sort.is_empty() || self.skip > 0 || self.take.is_some())
        {
            return Err(Error::InvalidInput(format!(
                "{} on '{}' does not support ordering or pagination",
                self.operation, self.collection
            )));
        }
        if self.operation == Operation::Insert && self.filter.is_some() {
            return Err(Error::InvalidInput(format!(
                "insert into '{}' cannot have a filter",
                self.collection
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation, self.collection)?;
        if !self.fields.is_empty() {
            write!(f, " fields [{}]", self.fields.join(", "))?;
        }
        if let Some(filter) = &self.filter {
            write!(f, " where {filter}")?;
        }
        if !self.sort.is_empty() {
            let sort: Vec<String> = self.sort.iter().map(ToString::to_string).collect();
            write!(f, " order by {}", sort.join(", "))?;
        }
        if self.skip > 0 {
            write!(f, " skip {}", self.skip)?;
        }
        if let Some(n) = self.take {
            write!(f, " take {n}")?;
        }
        Ok(())
    }
}
