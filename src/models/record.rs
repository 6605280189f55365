//! Open-schema records and the bridges to typed, serde-backed shapes.
//!
//! A [`Record`] is one row's worth of data: an ordered list of
//! `(field, value)` pairs whose lookups ignore ASCII case, matching how most
//! SQL engines treat unquoted column names.
//!
//! Typed shapes cross the boundary through serde:
//!
//! - [`FromRecord`] is implemented for [`Record`] itself and for every
//!   `DeserializeOwned` type. Column names are matched to struct fields
//!   case-insensitively, so a column `DATAINT` fills a field `DataInt`.
//! - [`IntoRecord`] is implemented for [`Record`] and for every `Serialize`
//!   type that serializes as a map/struct.

use crate::models::Value;
use crate::{Error, Result};
use serde::Serialize;
use serde::de::{DeserializeOwned, Deserializer, Visitor};

/// One row of open-schema data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Creates an empty record with room for `capacity` fields.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Builder-style [`Record::set`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a field. An existing field with the same name (ignoring case)
    /// keeps its position and original spelling.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.position(&field) {
            Some(idx) => self.fields[idx].1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Returns a field's value, ignoring case.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.position(field).map(|idx| &self.fields[idx].1)
    }

    /// Returns a text field.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Returns an integer field.
    #[must_use]
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    /// Returns a numeric field as a float.
    #[must_use]
    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    /// Returns true if the field exists, ignoring case.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.position(field).is_some()
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.position(field).map(|idx| self.fields.remove(idx).1)
    }

    /// Keeps only the named fields, in the order given. Missing fields are skipped.
    #[must_use]
    pub fn project(&self, fields: &[String]) -> Self {
        fields
            .iter()
            .filter_map(|f| {
                self.position(f)
                    .map(|idx| (self.fields[idx].0.clone(), self.fields[idx].1.clone()))
            })
            .collect()
    }

    /// Field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// `(field, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Converts to a JSON object, keeping field spelling and order.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Builds a record from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `value` is not an object.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, Value::from_json(v)))
                .collect()),
            other => Err(Error::InvalidInput(format!(
                "expected an object-shaped payload, got {}",
                json_kind(&other)
            ))),
        }
    }

    fn position(&self, field: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(field))
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Shapes a fetched row can be materialized into.
pub trait FromRecord: Sized {
    /// Converts one fetched row.
    fn from_record(record: Record) -> Result<Self>;
}

impl FromRecord for Record {
    fn from_record(record: Record) -> Result<Self> {
        Ok(record)
    }
}

impl<T: DeserializeOwned> FromRecord for T {
    fn from_record(record: Record) -> Result<Self> {
        Self::deserialize(RecordDeserializer(record)).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Payloads that can be written as one row.
pub trait IntoRecord {
    /// Converts the payload to a record.
    fn to_record(&self) -> Result<Record>;
}

impl IntoRecord for Record {
    fn to_record(&self) -> Result<Record> {
        Ok(self.clone())
    }
}

impl<T: Serialize + ?Sized> IntoRecord for T {
    fn to_record(&self) -> Result<Record> {
        let value = serde_json::to_value(self).map_err(|e| Error::InvalidInput(e.to_string()))?;
        Record::from_json(value)
    }
}

/// Feeds a record to serde, renaming columns onto the target's field names.
struct RecordDeserializer(Record);

impl RecordDeserializer {
    fn into_object(self, fields: &[&str]) -> serde_json::Value {
        let map = self
            .0
            .into_iter()
            .map(|(column, value)| {
                let key = fields
                    .iter()
                    .find(|f| f.eq_ignore_ascii_case(&column))
                    .map_or(column, |f| (*f).to_string());
                (key, value.to_json())
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

impl<'de> Deserializer<'de> for RecordDeserializer {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        self.into_object(&[]).deserialize_any(visitor)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        self.into_object(fields)
            .deserialize_struct(name, fields, visitor)
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}
