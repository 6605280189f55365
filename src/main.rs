//! Binary entry point for dbflex.
//!
//! A thin CLI over the library: every subcommand opens one connection,
//! runs one command and prints rows as JSON lines on stdout.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use dbflex::config::DbflexConfig;
use dbflex::observability;
use dbflex::{Command, Connection, ConnectionDescriptor, DriverRegistry, Filter, Record, Value};
use std::path::PathBuf;
use std::process::ExitCode;

/// dbflex - run commands against any registered database driver.
#[derive(Parser)]
#[command(name = "dbflex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Connection URI (defaults to `uri` from config or `DBFLEX_URI`).
    #[arg(short, long, global = true)]
    uri: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Open a connection and issue a round trip.
    Ping,

    /// Select rows from a collection.
    Select {
        /// Collection name.
        collection: String,

        /// Equality filter `FIELD=VALUE`; repeat to combine with AND.
        #[arg(short = 'w', long = "where", value_name = "FIELD=VALUE")]
        filters: Vec<String>,

        /// Sort field; prefix with `-` for descending. Repeatable.
        #[arg(short, long = "order-by", value_name = "FIELD")]
        order_by: Vec<String>,

        /// Comma-separated fields to return.
        #[arg(short, long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Rows to skip.
        #[arg(long, default_value = "0")]
        skip: usize,

        /// Maximum rows to return (0 = all).
        #[arg(long, default_value = "0")]
        take: usize,
    },

    /// Insert one row given as a JSON object.
    Insert {
        /// Collection name.
        collection: String,

        /// Row as a JSON object, e.g. `{"ID":"a","Title":"b"}`.
        json: String,
    },

    /// Delete rows from a collection.
    Delete {
        /// Collection name.
        collection: String,

        /// Equality filter `FIELD=VALUE`; repeat to combine with AND.
        #[arg(short = 'w', long = "where", value_name = "FIELD=VALUE")]
        filters: Vec<String>,
    },

    /// Run a raw SQL query and print its rows.
    Query {
        /// SQL text with `?N` placeholders.
        sql: String,

        /// Positional parameters for the placeholders.
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Run raw SQL that returns no rows.
    Exec {
        /// SQL text.
        sql: String,

        /// Positional parameters for the placeholders.
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match DbflexConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging = if cli.verbose {
        config.logging.clone().verbose()
    } else {
        config.logging.clone()
    };
    if let Err(e) = observability::init(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: DbflexConfig) -> Result<(), Box<dyn std::error::Error>> {
    let uri = cli
        .uri
        .or_else(|| config.uri.clone())
        .ok_or("no connection URI; pass --uri, set DBFLEX_URI or add `uri` to the config file")?;
    let registry = DriverRegistry::from_config(&config);
    let mut conn = Connection::open_with_registry(&registry, ConnectionDescriptor::parse(&uri)?)?
        .with_batch_policy(config.batch_policy);

    match cli.command {
        Commands::Ping => cmd_ping(&conn)?,
        Commands::Select {
            collection,
            filters,
            order_by,
            fields,
            skip,
            take,
        } => cmd_select(&conn, collection, filters, order_by, fields, skip, take)?,
        Commands::Insert { collection, json } => cmd_insert(&conn, collection, json)?,
        Commands::Delete {
            collection,
            filters,
        } => cmd_delete(&conn, collection, filters)?,
        Commands::Query { sql, params } => cmd_query(&conn, sql, params)?,
        Commands::Exec { sql, params } => cmd_exec(&conn, sql, params)?,
    }

    conn.close()?;
    Ok(())
}

fn cmd_ping(conn: &Connection) -> Result<(), Box<dyn std::error::Error>> {
    conn.ping()?;
    println!("ok: {} ({})", conn.descriptor(), conn.driver_name());
    Ok(())
}

fn cmd_select(
    conn: &Connection,
    collection: String,
    filters: Vec<String>,
    order_by: Vec<String>,
    fields: Vec<String>,
    skip: usize,
    take: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut command = Command::from(collection)
        .select()
        .fields(fields)
        .order_by(order_by)
        .skip(skip)
        .take(take);
    if let Some(filter) = parse_filters(&filters)? {
        command = command.filter(filter);
    }

    let mut cursor = conn.cursor(&command);
    let mut rows: Vec<Record> = Vec::new();
    cursor.fetch(&mut rows, 0)?;
    cursor.close();
    for row in rows {
        println!("{}", row.to_json());
    }
    Ok(())
}

fn cmd_insert(conn: &Connection, collection: String, json: String) -> Result<(), Box<dyn std::error::Error>> {
    let record = Record::from_json(serde_json::from_str(&json)?)?;
    let affected = conn.execute_with(&Command::from(collection).insert(), &record)?;
    println!("{}", serde_json::json!({ "affected": affected }));
    Ok(())
}

fn cmd_delete(
    conn: &Connection,
    collection: String,
    filters: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut command = Command::from(collection).delete();
    if let Some(filter) = parse_filters(&filters)? {
        command = command.filter(filter);
    }
    let affected = conn.execute(&command)?;
    println!("{}", serde_json::json!({ "affected": affected }));
    Ok(())
}

fn cmd_query(conn: &Connection, sql: String, params: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let params: Vec<Value> = params.iter().map(|p| parse_literal(p)).collect();
    let rows = conn.query(&sql, &params)?;
    for row in rows {
        println!("{}", row?.into_record().to_json());
    }
    Ok(())
}

fn cmd_exec(conn: &Connection, sql: String, params: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let params: Vec<Value> = params.iter().map(|p| parse_literal(p)).collect();
    let affected = conn.exec_raw(&sql, &params)?;
    println!("{}", serde_json::json!({ "affected": affected }));
    Ok(())
}

/// Parses repeated `FIELD=VALUE` arguments into one AND filter.
fn parse_filters(filters: &[String]) -> Result<Option<Filter>, Box<dyn std::error::Error>> {
    let mut terms = Vec::with_capacity(filters.len());
    for filter in filters {
        let (field, value) = filter
            .split_once('=')
            .ok_or_else(|| format!("filter '{filter}' is not FIELD=VALUE"))?;
        terms.push(match value {
            "null" | "NULL" => Filter::is_null(field.trim()),
            _ => Filter::eq(field.trim(), parse_literal(value)),
        });
    }
    Ok(match terms.len() {
        0 => None,
        1 => terms.pop(),
        _ => Some(Filter::and(terms)),
    })
}

/// Reads a CLI literal: integers, then floats, then text.
fn parse_literal(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Text(raw.to_string())
}
