//! Predicate trees evaluated by the backing store.

use crate::models::Value;
use std::fmt;

/// A boolean combination of field comparisons.
///
/// Comparisons follow SQL semantics: a comparison against `NULL` is unknown,
/// and unknown rows never match. `Contains` and `StartsWith` behave like SQL
/// `LIKE` and ignore ASCII case.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field = value`.
    Eq(String, Value),
    /// `field <> value`.
    Ne(String, Value),
    /// `field > value`.
    Gt(String, Value),
    /// `field >= value`.
    Gte(String, Value),
    /// `field < value`.
    Lt(String, Value),
    /// `field <= value`.
    Lte(String, Value),
    /// `field IN (values...)`.
    In(String, Vec<Value>),
    /// `field` contains the text.
    Contains(String, String),
    /// `field` starts with the text.
    StartsWith(String, String),
    /// `field IS NULL`.
    IsNull(String),
    /// All children match. Empty matches everything.
    And(Vec<Self>),
    /// Any child matches. Empty matches nothing.
    Or(Vec<Self>),
    /// The child does not match.
    Not(Box<Self>),
}

impl Filter {
    /// `field = value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    /// `field <> value`.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    /// `field > value`.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(field.into(), value.into())
    }

    /// `field >= value`.
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(field.into(), value.into())
    }

    /// `field < value`.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    /// `field <= value`.
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(field.into(), value.into())
    }

    /// `field IN (values...)`.
    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    /// `field` contains `text`.
    pub fn contains(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Contains(field.into(), text.into())
    }

    /// `field` starts with `text`.
    pub fn starts_with(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::StartsWith(field.into(), text.into())
    }

    /// `field IS NULL`.
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull(field.into())
    }

    /// Conjunction.
    pub fn and(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Disjunction.
    pub fn or(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    /// Negation.
    #[must_use]
    pub fn not(filter: Self) -> Self {
        Self::Not(Box::new(filter))
    }

    /// `low <= field <= high`.
    pub fn range(field: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        let field = field.into();
        Self::And(vec![
            Self::Gte(field.clone(), low.into()),
            Self::Lte(field, high.into()),
        ])
    }

    /// Every field name referenced by the tree, depth first.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Eq(f, _)
            | Self::Ne(f, _)
            | Self::Gt(f, _)
            | Self::Gte(f, _)
            | Self::Lt(f, _)
            | Self::Lte(f, _)
            | Self::In(f, _)
            | Self::Contains(f, _)
            | Self::StartsWith(f, _)
            | Self::IsNull(f) => out.push(f),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_fields(out);
                }
            },
            Self::Not(child) => child.collect_fields(out),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(field, v) => write!(f, "{field} = {v}"),
            Self::Ne(field, v) => write!(f, "{field} <> {v}"),
            Self::Gt(field, v) => write!(f, "{field} > {v}"),
            Self::Gte(field, v) => write!(f, "{field} >= {v}"),
            Self::Lt(field, v) => write!(f, "{field} < {v}"),
            Self::Lte(field, v) => write!(f, "{field} <= {v}"),
            Self::In(field, values) => {
                let list: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{field} in ({})", list.join(", "))
            },
            Self::Contains(field, text) => write!(f, "{field} contains '{text}'"),
            Self::StartsWith(field, text) => write!(f, "{field} starts with '{text}'"),
            Self::IsNull(field) => write!(f, "{field} is null"),
            Self::And(children) => write_joined(f, children, " and ", "true"),
            Self::Or(children) => write_joined(f, children, " or ", "false"),
            Self::Not(child) => write!(f, "not ({child})"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    children: &[Filter],
    sep: &str,
    empty: &str,
) -> fmt::Result {
    if children.is_empty() {
        return f.write_str(empty);
    }
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_and_of_bounds() {
        let f = Filter::range("ID", "data-2", "data-4");
        assert_eq!(
            f,
            Filter::and([Filter::gte("ID", "data-2"), Filter::lte("ID", "data-4")])
        );
    }

    #[test]
    fn test_fields_walks_the_tree() {
        let f = Filter::or([
            Filter::eq("a", 1),
            Filter::not(Filter::and([Filter::is_null("b"), Filter::contains("c", "x")])),
        ]);
        assert_eq!(f.fields(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_display() {
        let f = Filter::and([Filter::gte("ID", "data-2"), Filter::lte("ID", "data-4")]);
        assert_eq!(f.to_string(), "(ID >= data-2 and ID <= data-4)");
        assert_eq!(Filter::or([]).to_string(), "false");
        assert_eq!(Filter::is_in("n", [1, 2]).to_string(), "n in (1, 2)");
    }
}
