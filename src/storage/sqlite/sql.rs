//! SQL generation for commands.
//!
//! Every value travels as a numbered parameter (`?1`, `?2`, ...) and every
//! identifier is validated and double-quoted, so no caller-supplied text is
//! ever spliced into a statement.

use crate::command::{Command, Filter, Operation};
use crate::models::{Record, Value};
use crate::{Error, Result};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

// Static patterns are compile-time constants; expect is safe here.
#[allow(clippy::expect_used)]
static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("static regex: sql identifier")
});

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL with `?N` placeholders.
    pub sql: String,
    /// Parameter values, `params[0]` binds `?1`.
    pub params: Vec<Value>,
}

impl Statement {
    fn new() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Appends `value` as the next parameter and writes its placeholder.
    fn bind(&mut self, value: Value) {
        self.params.push(value);
        let _ = write!(self.sql, "?{}", self.params.len());
    }
}

/// Escapes SQL LIKE wildcards in a string to make them literal.
///
/// Used together with `ESCAPE '\'`.
///
/// # Examples
///
/// ```
/// use dbflex::storage::sqlite::escape_like_wildcards;
///
/// assert_eq!(escape_like_wildcards("100%"), "100\\%");
/// assert_eq!(escape_like_wildcards("user_name"), "user\\_name");
/// assert_eq!(escape_like_wildcards("path\\file"), "path\\\\file");
/// ```
#[must_use]
pub fn escape_like_wildcards(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' | '_' | '\\' => {
                result.push('\\');
                result.push(c);
            },
            _ => result.push(c),
        }
    }
    result
}

/// Validates and double-quotes an identifier. `schema.table` is quoted per part.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if any part is not a plain identifier.
pub fn quote_identifier(name: &str) -> Result<String> {
    let mut quoted = String::with_capacity(name.len() + 2);
    for (i, part) in name.split('.').enumerate() {
        if !IDENT_RE.is_match(part) {
            return Err(Error::InvalidInput(format!("invalid identifier '{name}'")));
        }
        if i > 0 {
            quoted.push('.');
        }
        quoted.push('"');
        quoted.push_str(part);
        quoted.push('"');
    }
    Ok(quoted)
}

/// `SELECT` for a select command, with projection, filter, order and paging.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for bad identifiers.
pub fn build_select(command: &Command) -> Result<Statement> {
    let mut stmt = Statement::new();
    stmt.sql.push_str("SELECT ");
    if command.selected_fields().is_empty() {
        stmt.sql.push('*');
    } else {
        stmt.sql.push_str(&quote_list(command.selected_fields())?);
    }
    let _ = write!(stmt.sql, " FROM {}", quote_identifier(command.collection())?);
    push_where(&mut stmt, command.predicate())?;

    if !command.sort_fields().is_empty() {
        stmt.sql.push_str(" ORDER BY ");
        for (i, sort) in command.sort_fields().iter().enumerate() {
            if i > 0 {
                stmt.sql.push_str(", ");
            }
            stmt.sql.push_str(&quote_identifier(&sort.field)?);
            stmt.sql.push_str(if sort.is_descending() { " DESC" } else { " ASC" });
        }
    }

    match (command.limit(), command.offset()) {
        (None, 0) => {},
        (limit, offset) => {
            stmt.sql.push_str(" LIMIT ");
            match limit {
                Some(n) => stmt.bind(Value::Int(i64::try_from(n).unwrap_or(i64::MAX))),
                None => stmt.sql.push_str("-1"),
            }
            if offset > 0 {
                stmt.sql.push_str(" OFFSET ");
                stmt.bind(Value::Int(i64::try_from(offset).unwrap_or(i64::MAX)));
            }
        },
    }
    Ok(stmt)
}

/// `SELECT COUNT(*)` over the command's filter, ignoring projection and paging.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for bad identifiers.
pub fn build_count(command: &Command) -> Result<Statement> {
    let mut stmt = Statement::new();
    let _ = write!(
        stmt.sql,
        "SELECT COUNT(*) FROM {}",
        quote_identifier(command.collection())?
    );
    push_where(&mut stmt, command.predicate())?;
    Ok(stmt)
}

/// The write statement for `command` with `payload` bound.
///
/// Inserts write every payload field. Updates set every payload field on
/// the rows the filter matches. Deletes ignore the payload.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for bad identifiers, an empty payload on
/// insert/update, or a select command.
pub fn build_write(command: &Command, payload: Option<&Record>) -> Result<Statement> {
    let table = quote_identifier(command.collection())?;
    let mut stmt = Statement::new();
    match command.operation() {
        Operation::Insert => {
            let payload = non_empty_payload(command, payload)?;
            let columns: Vec<String> = payload.keys().map(str::to_string).collect();
            let _ = write!(stmt.sql, "INSERT INTO {table} ({}) VALUES (", quote_list(&columns)?);
            for (i, (_, value)) in payload.iter().enumerate() {
                if i > 0 {
                    stmt.sql.push_str(", ");
                }
                stmt.bind(value.clone());
            }
            stmt.sql.push(')');
        },
        Operation::Update => {
            let payload = non_empty_payload(command, payload)?;
            let _ = write!(stmt.sql, "UPDATE {table} SET ");
            for (i, (column, value)) in payload.iter().enumerate() {
                if i > 0 {
                    stmt.sql.push_str(", ");
                }
                let _ = write!(stmt.sql, "{} = ", quote_identifier(column)?);
                stmt.bind(value.clone());
            }
            push_where(&mut stmt, command.predicate())?;
        },
        Operation::Delete => {
            let _ = write!(stmt.sql, "DELETE FROM {table}");
            push_where(&mut stmt, command.predicate())?;
        },
        Operation::Select => {
            return Err(Error::InvalidInput(format!(
                "select on '{}' is not a write command",
                command.collection()
            )));
        },
    }
    Ok(stmt)
}

fn non_empty_payload<'a>(command: &Command, payload: Option<&'a Record>) -> Result<&'a Record> {
    match payload {
        Some(record) if !record.is_empty() => Ok(record),
        _ => Err(Error::InvalidInput(format!(
            "{} on '{}' needs a payload with at least one field",
            command.operation(),
            command.collection()
        ))),
    }
}

fn quote_list(names: &[String]) -> Result<String> {
    let quoted = names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

fn push_where(stmt: &mut Statement, filter: Option<&Filter>) -> Result<()> {
    if let Some(filter) = filter {
        stmt.sql.push_str(" WHERE ");
        push_filter(stmt, filter)?;
    }
    Ok(())
}

fn push_filter(stmt: &mut Statement, filter: &Filter) -> Result<()> {
    match filter {
        Filter::Eq(field, v) => push_comparison(stmt, field, "=", v),
        Filter::Ne(field, v) => push_comparison(stmt, field, "<>", v),
        Filter::Gt(field, v) => push_comparison(stmt, field, ">", v),
        Filter::Gte(field, v) => push_comparison(stmt, field, ">=", v),
        Filter::Lt(field, v) => push_comparison(stmt, field, "<", v),
        Filter::Lte(field, v) => push_comparison(stmt, field, "<=", v),
        Filter::In(field, values) => {
            if values.is_empty() {
                stmt.sql.push('0');
                return Ok(());
            }
            let _ = write!(stmt.sql, "{} IN (", quote_identifier(field)?);
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    stmt.sql.push_str(", ");
                }
                stmt.bind(value.clone());
            }
            stmt.sql.push(')');
            Ok(())
        },
        Filter::Contains(field, text) => {
            push_like(stmt, field, format!("%{}%", escape_like_wildcards(text)))
        },
        Filter::StartsWith(field, text) => {
            push_like(stmt, field, format!("{}%", escape_like_wildcards(text)))
        },
        Filter::IsNull(field) => {
            let _ = write!(stmt.sql, "{} IS NULL", quote_identifier(field)?);
            Ok(())
        },
        Filter::And(children) => push_group(stmt, children, " AND ", '1'),
        Filter::Or(children) => push_group(stmt, children, " OR ", '0'),
        Filter::Not(child) => {
            stmt.sql.push_str("NOT (");
            push_filter(stmt, child)?;
            stmt.sql.push(')');
            Ok(())
        },
    }
}

fn push_comparison(stmt: &mut Statement, field: &str, op: &str, value: &Value) -> Result<()> {
    let _ = write!(stmt.sql, "{} {op} ", quote_identifier(field)?);
    stmt.bind(value.clone());
    Ok(())
}

fn push_like(stmt: &mut Statement, field: &str, pattern: String) -> Result<()> {
    let _ = write!(stmt.sql, "{} LIKE ", quote_identifier(field)?);
    stmt.bind(Value::Text(pattern));
    stmt.sql.push_str(" ESCAPE '\\'");
    Ok(())
}

fn push_group(stmt: &mut Statement, children: &[Filter], sep: &str, empty: char) -> Result<()> {
    if children.is_empty() {
        stmt.sql.push(empty);
        return Ok(());
    }
    stmt.sql.push('(');
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            stmt.sql.push_str(sep);
        }
        push_filter(stmt, child)?;
    }
    stmt.sql.push(')');
    Ok(())
}
