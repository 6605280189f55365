//! Command evaluation over in-memory rows.
//!
//! Predicates use three-valued logic: a comparison involving a missing or
//! null field is unknown, `NOT unknown` is unknown, and only rows whose
//! predicate is definitely true are selected.

use crate::command::{Command, Filter};
use crate::models::{Record, Value, ValueKind};
use crate::storage::traits::{BufferedRows, Column};
use std::cmp::Ordering;

static NULL: Value = Value::Null;

/// Returns true if `record` satisfies `filter`. No filter matches everything.
pub fn matches(filter: Option<&Filter>, record: &Record) -> bool {
    filter.is_none_or(|f| eval(f, record) == Some(true))
}

/// Evaluates a predicate: `Some(true)`, `Some(false)` or `None` for unknown.
pub fn eval(filter: &Filter, record: &Record) -> Option<bool> {
    match filter {
        Filter::Eq(field, v) => compare(record, field, v).map(|o| o == Ordering::Equal),
        Filter::Ne(field, v) => compare(record, field, v).map(|o| o != Ordering::Equal),
        Filter::Gt(field, v) => compare(record, field, v).map(|o| o == Ordering::Greater),
        Filter::Gte(field, v) => compare(record, field, v).map(|o| o != Ordering::Less),
        Filter::Lt(field, v) => compare(record, field, v).map(|o| o == Ordering::Less),
        Filter::Lte(field, v) => compare(record, field, v).map(|o| o != Ordering::Greater),
        Filter::In(field, values) => {
            if values.is_empty() {
                return Some(false);
            }
            let mut unknown = false;
            for v in values {
                match compare(record, field, v) {
                    Some(Ordering::Equal) => return Some(true),
                    None => unknown = true,
                    Some(_) => {},
                }
            }
            if unknown { None } else { Some(false) }
        },
        Filter::Contains(field, text) => like(record, field, |s| s.contains(&text.to_ascii_lowercase())),
        Filter::StartsWith(field, text) => {
            like(record, field, |s| s.starts_with(&text.to_ascii_lowercase()))
        },
        Filter::IsNull(field) => Some(field_value(record, field).is_null()),
        Filter::And(children) => {
            let mut unknown = false;
            for child in children {
                match eval(child, record) {
                    Some(false) => return Some(false),
                    None => unknown = true,
                    Some(true) => {},
                }
            }
            if unknown { None } else { Some(true) }
        },
        Filter::Or(children) => {
            let mut unknown = false;
            for child in children {
                match eval(child, record) {
                    Some(true) => return Some(true),
                    None => unknown = true,
                    Some(false) => {},
                }
            }
            if unknown { None } else { Some(false) }
        },
        Filter::Not(child) => eval(child, record).map(|b| !b),
    }
}

fn field_value<'a>(record: &'a Record, field: &str) -> &'a Value {
    record.get(field).unwrap_or(&NULL)
}

fn compare(record: &Record, field: &str, literal: &Value) -> Option<Ordering> {
    field_value(record, field).compare(literal)
}

fn like(record: &Record, field: &str, test: impl Fn(&str) -> bool) -> Option<bool> {
    match field_value(record, field) {
        Value::Null => None,
        Value::Text(s) => Some(test(&s.to_ascii_lowercase())),
        other => Some(test(&other.to_string().to_ascii_lowercase())),
    }
}

/// Runs a select over `rows`: filter, stable sort, skip, take, project.
pub fn run_select(command: &Command, rows: &[Record]) -> BufferedRows {
    let mut matched: Vec<&Record> = rows
        .iter()
        .filter(|r| matches(command.predicate(), r))
        .collect();

    if !command.sort_fields().is_empty() {
        matched.sort_by(|a, b| {
            command
                .sort_fields()
                .iter()
                .map(|sort| {
                    let ordering = field_value(a, &sort.field).sort_cmp(field_value(b, &sort.field));
                    if sort.is_descending() { ordering.reverse() } else { ordering }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    let names = column_names(command, rows);
    let page: Vec<Vec<Value>> = matched
        .into_iter()
        .skip(command.offset())
        .take(command.limit().unwrap_or(usize::MAX))
        .map(|record| names.iter().map(|n| field_value(record, n).clone()).collect())
        .collect();

    let columns = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| Column {
            name,
            declared_type: None,
            kind: observed_kind(&page, idx),
        })
        .collect();
    BufferedRows::new(columns, page)
}

/// Counts rows matching the command's filter.
pub fn count(command: &Command, rows: &[Record]) -> u64 {
    rows.iter()
        .filter(|r| matches(command.predicate(), r))
        .count() as u64
}

/// Requested fields, or every field seen in the collection in first-seen order.
fn column_names(command: &Command, rows: &[Record]) -> Vec<String> {
    if !command.selected_fields().is_empty() {
        return command.selected_fields().to_vec();
    }
    let mut names: Vec<String> = Vec::new();
    for record in rows {
        for key in record.keys() {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(key)) {
                names.push(key.to_string());
            }
        }
    }
    names
}

fn observed_kind(rows: &[Vec<Value>], idx: usize) -> Option<ValueKind> {
    rows.iter()
        .filter_map(|row| row.get(idx))
        .find(|v| !v.is_null())
        .map(Value::kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::RowStream;

    fn rows() -> Vec<Record> {
        (0..5)
            .map(|i| {
                Record::new()
                    .with("ID", format!("data-{i}"))
                    .with("DataInt", i64::from(i))
                    .with("Note", if i % 2 == 0 { Value::Null } else { Value::from("odd") })
            })
            .collect()
    }

    fn ids(command: &Command) -> Vec<Value> {
        let mut stream = run_select(command, &rows());
        let mut out = Vec::new();
        while let Some(Ok(row)) = stream.next_row() {
            out.push(row[0].clone());
        }
        out
    }

    #[test]
    fn test_null_comparisons_are_unknown() {
        let row = Record::new().with("a", Value::Null);
        assert_eq!(eval(&Filter::eq("a", 1), &row), None);
        assert_eq!(eval(&Filter::not(Filter::eq("a", 1)), &row), None);
        assert_eq!(eval(&Filter::eq("missing", 1), &row), None);
        assert_eq!(eval(&Filter::is_null("missing"), &row), Some(true));
        assert!(!matches(Some(&Filter::ne("a", 1)), &row));
    }

    #[test]
    fn test_and_or_short_circuit_over_unknown() {
        let row = Record::new().with("a", 1);
        let unknown = Filter::eq("b", 1);
        assert_eq!(eval(&Filter::and([unknown.clone(), Filter::eq("a", 2)]), &row), Some(false));
        assert_eq!(eval(&Filter::or([unknown.clone(), Filter::eq("a", 1)]), &row), Some(true));
        assert_eq!(eval(&Filter::or([unknown, Filter::eq("a", 2)]), &row), None);
        assert_eq!(eval(&Filter::and([]), &row), Some(true));
        assert_eq!(eval(&Filter::or([]), &row), Some(false));
    }

    #[test]
    fn test_like_ignores_ascii_case() {
        let row = Record::new().with("Title", "Data Title 3");
        assert_eq!(eval(&Filter::contains("title", "TITLE"), &row), Some(true));
        assert_eq!(eval(&Filter::starts_with("title", "data"), &row), Some(true));
        assert_eq!(eval(&Filter::starts_with("title", "title"), &row), Some(false));
    }

    #[test]
    fn test_top_n_descending() {
        let cmd = Command::from("t").select().order_by(["-ID"]).take(3);
        assert_eq!(
            ids(&cmd),
            vec![Value::from("data-4"), Value::from("data-3"), Value::from("data-2")]
        );
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let cmd = Command::from("t").select().order_by(["Note"]);
        // nulls sort first, each group keeps insertion order
        assert_eq!(
            ids(&cmd),
            vec![
                Value::from("data-0"),
                Value::from("data-2"),
                Value::from("data-4"),
                Value::from("data-1"),
                Value::from("data-3"),
            ]
        );
    }

    #[test]
    fn test_range_skip_take() {
        let cmd = Command::from("t")
            .select()
            .filter(Filter::range("ID", "data-1", "data-4"))
            .skip(1)
            .take(2);
        assert_eq!(ids(&cmd), vec![Value::from("data-2"), Value::from("data-3")]);
        assert_eq!(count(&cmd, &rows()), 4);
    }

    #[test]
    fn test_projection_and_kinds() {
        let cmd = Command::from("t").select().fields(["DataInt", "Note"]);
        let stream = run_select(&cmd, &rows());
        let columns = stream.columns();
        assert_eq!(columns[0].name, "DataInt");
        assert_eq!(columns[0].kind, Some(ValueKind::Int));
        assert_eq!(columns[1].kind, Some(ValueKind::Text));
    }
}
