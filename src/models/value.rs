//! Dynamically typed field values.

use chrono::{DateTime, SecondsFormat, Utc};
use std::cmp::Ordering;
use std::fmt;

/// A single field value as it travels between the caller and a driver.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL `NULL` / absent.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Point in time, always UTC.
    Timestamp(DateTime<Utc>),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

/// The tag of a [`Value`], also used to describe raw result columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// See [`Value::Null`].
    Null,
    /// See [`Value::Bool`].
    Bool,
    /// See [`Value::Int`].
    Int,
    /// See [`Value::Float`].
    Float,
    /// See [`Value::Text`].
    Text,
    /// See [`Value::Timestamp`].
    Timestamp,
    /// See [`Value::Bytes`].
    Bytes,
}

impl ValueKind {
    /// Returns the kind as a lowercase string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
            Self::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    /// Returns the tag of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::Bytes(_) => ValueKind::Bytes,
        }
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text if this is a [`Value::Text`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer, widening booleans.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Returns the number as a float, widening integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the timestamp, parsing RFC 3339 text when needed.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            Self::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Converts to a JSON value. Timestamps become RFC 3339 strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Timestamp(t) => {
                serde_json::Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            },
            Self::Bytes(b) => serde_json::Value::from(b.clone()),
        }
    }

    /// Converts from a JSON value.
    ///
    /// Arrays and objects have no column representation and are stored as
    /// their JSON text.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_i64().map_or_else(
                || Self::Float(n.as_f64().unwrap_or(f64::NAN)),
                Self::Int,
            ),
            serde_json::Value::String(s) => Self::Text(s),
            other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Self::Text(other.to_string())
            },
        }
    }

    /// Compares two values the way a store compares a column against a literal.
    ///
    /// Integers and floats compare numerically, timestamps compare with
    /// timestamps or RFC 3339 text. Returns `None` when either side is null or
    /// the kinds are not comparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), _) | (_, Self::Float(a)) if a.is_nan() => None,
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                Some(Number::of(self)?.total_cmp(Number::of(other)?))
            },
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Bytes(a), Self::Bytes(b)) => Some(a.cmp(b)),
            (Self::Timestamp(_), Self::Timestamp(_) | Self::Text(_))
            | (Self::Text(_), Self::Timestamp(_)) => {
                Some(self.as_timestamp()?.cmp(&other.as_timestamp()?))
            },
            _ => None,
        }
    }

    /// Total order used when sorting rows.
    ///
    /// Values fall into classes ordered null, bool, number, time, text,
    /// bytes. Integers and floats share the number class and compare
    /// exactly, with every NaN after every other number. Text that parses as
    /// a timestamp sorts in the time class.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        SortKey::of(self).cmp(&SortKey::of(other))
    }
}

/// Position of a value in the sort order, derived from the value alone.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey<'a> {
    Null,
    Bool(bool),
    Number(Number),
    Time(DateTime<Utc>),
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> SortKey<'a> {
    fn of(value: &'a Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(i) => Self::Number(Number::Int(*i)),
            Value::Float(f) => Self::Number(Number::Float(*f)),
            Value::Timestamp(t) => Self::Time(*t),
            Value::Text(s) => parse_timestamp(s).map_or(Self::Text(s), Self::Time),
            Value::Bytes(b) => Self::Bytes(b),
        }
    }
}

/// A number compared exactly across integers and floats.
///
/// `-0.0` equals `0.0`, and all NaNs are equal and greater than any other
/// number.
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    const fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(Self::Int(*i)),
            Value::Float(f) => Some(Self::Float(*f)),
            _ => None,
        }
    }

    fn total_cmp(self, other: Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(&b),
            (Self::Float(a), Self::Float(b)) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            },
            (Self::Int(i), Self::Float(f)) => int_cmp_float(i, f),
            (Self::Float(f), Self::Int(i)) => int_cmp_float(i, f).reverse(),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.total_cmp(*other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(Ord::cmp(self, other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(*other)
    }
}

/// Compares an integer with a float without rounding the integer.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn int_cmp_float(i: i64, f: f64) -> Ordering {
    // 2^63, exactly representable.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() || f >= LIMIT {
        return Ordering::Less;
    }
    if f < -LIMIT {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal),
        ordering => ordering,
    }
}

/// Parses RFC 3339 text, then the `YYYY-MM-DD HH:MM:SS` form SQL engines print.
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_numeric_compare_crosses_kinds() {
        assert_eq!(Value::Int(3).compare(&Value::Float(2.5)), Some(Ordering::Greater));
        assert_eq!(Value::Float(1.0).compare(&Value::Int(1)), Some(Ordering::Equal));
    }

    #[test]
    fn test_null_is_not_comparable_but_sorts_first() {
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
        assert_eq!(Value::Null.sort_cmp(&Value::Int(1)), Ordering::Less);
        assert_eq!(Value::Text("a".into()).sort_cmp(&Value::Null), Ordering::Greater);
    }

    #[test]
    fn test_timestamp_compares_with_text() {
        let t = Utc.with_ymd_and_hms(2019, 2, 23, 12, 54, 18).unwrap();
        let text = Value::Text("2019-02-23 12:54:18".to_string());
        assert_eq!(Value::Timestamp(t).compare(&text), Some(Ordering::Equal));
    }

    #[test]
    fn test_int_float_compare_is_exact() {
        let big = i64::MAX - 1;
        assert_eq!(Value::Int(big).compare(&Value::Float(9.223_372_036_854_776e18)), Some(Ordering::Less));
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Value::Int(-2).compare(&Value::Float(-2.5)), Some(Ordering::Greater));
        assert_eq!(Value::Int(0).compare(&Value::Float(-0.0)), Some(Ordering::Equal));
        assert_eq!(Value::Int(i64::MIN).compare(&Value::Float(f64::NEG_INFINITY)), Some(Ordering::Greater));
        assert_eq!(Value::Int(1).compare(&Value::Float(f64::NAN)), None);
    }

    #[test]
    fn test_sort_cmp_places_nan_after_numbers() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(nan.sort_cmp(&Value::Float(f64::INFINITY)), Ordering::Greater);
        assert_eq!(nan.sort_cmp(&Value::Int(i64::MAX)), Ordering::Greater);
        assert_eq!(nan.sort_cmp(&Value::Float(-f64::NAN)), Ordering::Equal);
        assert_eq!(Value::Float(-0.0).sort_cmp(&Value::Float(0.0)), Ordering::Equal);
    }

    #[test]
    fn test_sort_cmp_is_a_total_order_over_mixed_values() {
        let t = Utc.with_ymd_and_hms(2019, 2, 23, 12, 54, 18).unwrap();
        let pool = [
            Value::Null,
            Value::Bool(true),
            Value::Int(3),
            Value::Int(-7),
            Value::Float(2.5),
            Value::Float(f64::NAN),
            Value::Float(-0.0),
            Value::Int(0),
            Value::Timestamp(t),
            Value::Text("2019-02-23 12:54:18".to_string()),
            Value::Text("2020-01-01T00:00:00Z".to_string()),
            Value::Text("n/a 1".to_string()),
            Value::Text("a".to_string()),
            Value::Bytes(vec![1, 2]),
        ];
        for a in &pool {
            for b in &pool {
                assert_eq!(a.sort_cmp(b), b.sort_cmp(a).reverse(), "{a:?} vs {b:?}");
                for c in &pool {
                    if a.sort_cmp(b) != Ordering::Greater && b.sort_cmp(c) != Ordering::Greater {
                        assert_ne!(a.sort_cmp(c), Ordering::Greater, "{a:?} {b:?} {c:?}");
                    }
                }
            }
        }

        let mut rows: Vec<Value> = (0..96).map(|i| pool[(i * 7) % pool.len()].clone()).collect();
        rows.sort_by(Value::sort_cmp);
        assert!(rows.windows(2).all(|w| w[0].sort_cmp(&w[1]) != Ordering::Greater));
        assert!(rows[0].is_null());
    }

    #[test]
    fn test_json_conversion() {
        assert_eq!(Value::from_json(serde_json::json!(31)), Value::Int(31));
        assert_eq!(Value::from_json(serde_json::json!(27.15)), Value::Float(27.15));
        assert_eq!(Value::from_json(serde_json::json!(null)), Value::Null);
        assert_eq!(
            Value::from_json(serde_json::json!([1, 2])),
            Value::Text("[1,2]".to_string())
        );
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_option_into_value() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
    }
}
