//! Cursors over select results.
//!
//! A cursor is opened by [`Connection::cursor`] and never fails at that
//! point. Anything that went wrong opening the result is stored and
//! surfaces through [`Cursor::error`] and from every fetch, so callers have
//! one place to check. Once a fetch hits a store error the error sticks:
//! later fetches return it again without touching the store.

use crate::command::Command;
use crate::connection::Connection;
use crate::models::{FromRecord, Record};
use crate::storage::{Column, RowStream};
use crate::{Error, Result};
use std::fmt;

/// A forward-only reader over one select, bound to its connection.
pub struct Cursor<'c> {
    conn: &'c Connection,
    command: Command,
    stream: Option<Box<dyn RowStream + 'c>>,
    error: Option<Error>,
    fetched: usize,
    closed: bool,
}

impl<'c> Cursor<'c> {
    pub(crate) fn new(conn: &'c Connection, command: Command, stream: Box<dyn RowStream + 'c>) -> Self {
        Self {
            conn,
            command,
            stream: Some(stream),
            error: None,
            fetched: 0,
            closed: false,
        }
    }

    pub(crate) const fn failed(conn: &'c Connection, command: Command, error: Error) -> Self {
        Self {
            conn,
            command,
            stream: None,
            error: Some(error),
            fetched: 0,
            closed: false,
        }
    }

    /// The stored error, if opening or reading the result failed.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// The select this cursor reads.
    #[must_use]
    pub const fn command(&self) -> &Command {
        &self.command
    }

    /// Result columns. Empty if the cursor failed to open or is closed.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        self.stream.as_ref().map_or(&[][..], |s| s.columns())
    }

    /// Rows handed out so far.
    #[must_use]
    pub const fn fetched(&self) -> usize {
        self.fetched
    }

    /// Reads up to `limit` rows into `destination`. A limit of 0 reads every
    /// remaining row.
    ///
    /// Rows are appended, and rows appended before a failure stay in
    /// `destination`. Returns how many rows were appended; 0 means the
    /// cursor is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterClose`] after [`Cursor::close`], the stored
    /// error if there is one, [`Error::Cursor`] if the store fails while
    /// reading, and [`Error::Decode`] if a row does not fit `T`.
    pub fn fetch<T: FromRecord>(&mut self, destination: &mut Vec<T>, limit: usize) -> Result<usize> {
        if self.closed {
            return Err(Error::UseAfterClose("cursor"));
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };

        let limit = if limit == 0 { usize::MAX } else { limit };
        let mut appended = 0;
        while appended < limit {
            let values = match stream.next_row() {
                Some(Ok(values)) => values,
                Some(Err(err)) => return Err(self.stick(err)),
                None => break,
            };
            let record: Record = stream
                .columns()
                .iter()
                .map(|c| c.name.clone())
                .zip(values)
                .collect();
            match T::from_record(record) {
                Ok(item) => destination.push(item),
                Err(err) => return Err(self.stick(err)),
            }
            appended += 1;
            self.fetched += 1;
        }
        Ok(appended)
    }

    /// Reads the next row, or `None` once exhausted.
    ///
    /// # Errors
    ///
    /// Same as [`Cursor::fetch`].
    pub fn fetch_one<T: FromRecord>(&mut self) -> Result<Option<T>> {
        let mut one = Vec::with_capacity(1);
        self.fetch(&mut one, 1)?;
        Ok(one.pop())
    }

    /// Reads every remaining row into a new vector.
    ///
    /// # Errors
    ///
    /// Same as [`Cursor::fetch`].
    pub fn fetch_all<T: FromRecord>(&mut self) -> Result<Vec<T>> {
        let mut all = Vec::new();
        self.fetch(&mut all, 0)?;
        Ok(all)
    }

    /// Counts the rows the select matches, ignoring skip and take.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterClose`] after close, the stored error, or
    /// the store's error.
    pub fn count(&self) -> Result<u64> {
        if self.closed {
            return Err(Error::UseAfterClose("cursor"));
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.conn.count(&self.command)
    }

    /// Releases the result. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.stream = None;
        self.error = None;
        self.closed = true;
    }

    /// Returns true once [`Cursor::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn stick(&mut self, err: Error) -> Error {
        let err = match err {
            err @ (Error::Decode(_) | Error::Cursor(_)) => err,
            other => Error::Cursor(other.to_string()),
        };
        tracing::debug!(error = %err, fetched = self.fetched, "cursor error");
        self.error = Some(err.clone());
        err
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("command", &self.command.to_string())
            .field("fetched", &self.fetched)
            .field("error", &self.error)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Filter;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct Item {
        ID: i64,
        Name: String,
    }

    fn seeded() -> Connection {
        let conn = Connection::open("mem://").unwrap();
        let insert = Command::from("items").insert();
        for i in 0..5 {
            conn.execute_with(&insert, &Record::new().with("ID", i).with("Name", format!("n{i}")))
                .unwrap();
        }
        conn
    }

    #[test]
    fn test_fetch_in_chunks() {
        let conn = seeded();
        let mut cursor = conn.cursor(&Command::from("items").select());
        let mut items: Vec<Item> = Vec::new();
        assert_eq!(cursor.fetch(&mut items, 2).unwrap(), 2);
        assert_eq!(cursor.fetch(&mut items, 2).unwrap(), 2);
        assert_eq!(cursor.fetch(&mut items, 2).unwrap(), 1);
        assert_eq!(cursor.fetch(&mut items, 2).unwrap(), 0);
        assert_eq!(items.len(), 5);
        assert_eq!(items[4].ID, 4);
        assert_eq!(items[0].Name, "n0");
    }

    #[test]
    fn test_deferred_open_error() {
        let conn = seeded();
        let mut cursor = conn.cursor(&Command::from("").select());
        assert!(matches!(cursor.error(), Some(Error::InvalidInput(_))));
        let mut rows: Vec<Record> = Vec::new();
        assert!(cursor.fetch(&mut rows, 0).is_err());
        assert!(cursor.count().is_err());
    }

    #[test]
    fn test_decode_error_is_sticky_and_keeps_partial_rows() {
        let conn = seeded();
        let insert = Command::from("items").insert();
        conn.execute_with(&insert, &Record::new().with("ID", "not a number").with("Name", "bad"))
            .unwrap();

        let mut cursor = conn.cursor(&Command::from("items").select());
        let mut items: Vec<Item> = Vec::new();
        let err = cursor.fetch(&mut items, 0).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(items.len(), 5);
        assert!(matches!(cursor.fetch(&mut items, 0), Err(Error::Decode(_))));
        assert!(cursor.error().is_some());
    }

    #[test]
    fn test_close_is_idempotent_and_final() {
        let conn = seeded();
        let mut cursor = conn.cursor(&Command::from("items").select());
        cursor.close();
        cursor.close();
        let mut rows: Vec<Record> = Vec::new();
        assert!(cursor.fetch(&mut rows, 0).unwrap_err().is_use_after_close());
        assert!(cursor.columns().is_empty());
    }

    #[test]
    fn test_count_ignores_paging() {
        let conn = seeded();
        let cursor = conn.cursor(
            &Command::from("items")
                .select()
                .filter(Filter::gte("ID", 1))
                .take(2),
        );
        assert_eq!(cursor.count().unwrap(), 4);
    }

    #[test]
    fn test_fetch_one() {
        let conn = seeded();
        let mut cursor = conn.cursor(&Command::from("items").select().order_by(["-ID"]));
        let first: Option<Record> = cursor.fetch_one().unwrap();
        assert_eq!(first.and_then(|r| r.get_i64("ID")), Some(4));
    }
}
