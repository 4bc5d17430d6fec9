//! Catalog command handlers
//!
//! Every command is turned into an intent and handed to the dispatcher, so
//! the CLI and the upstream translator go through the same validation.

use std::io::{self, BufRead};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::Args;
use serde_json::{json, Map, Value};

use shelf_core::dispatch::{today_stamp, Position};
use shelf_core::{Dispatcher, Intent, Reference, Response};

use crate::output::{list_item, Output, OutputFormat};
use crate::prompt::{confirm, stdin_is_piped};

/// Fields for a new record
#[derive(Args, Debug, Default)]
pub struct AddArgs {
    /// Book title
    #[arg(short = 'T', long)]
    pub title: String,
    #[arg(short, long)]
    pub author: Option<String>,
    #[arg(short, long)]
    pub publisher: Option<String>,
    #[arg(long)]
    pub provenance: Option<String>,
    #[arg(short, long)]
    pub category: Option<String>,
    #[arg(short, long)]
    pub year: Option<i32>,
    /// Shelf row
    #[arg(long)]
    pub row: Option<u32>,
    /// Shelf column
    #[arg(long)]
    pub column: Option<u32>,
    #[arg(long)]
    pub isbn: Option<String>,
    /// Review date; without a value, today
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub reviewed: Option<String>,
    #[arg(long)]
    pub comments: Option<String>,
}

/// Search criteria; every given field must match
#[derive(Args, Debug, Default)]
pub struct FindArgs {
    #[arg(short = 'T', long)]
    pub title: Option<String>,
    #[arg(short, long)]
    pub author: Option<String>,
    #[arg(short, long)]
    pub publisher: Option<String>,
    #[arg(short, long)]
    pub year: Option<String>,
    #[arg(long)]
    pub isbn: Option<String>,
    #[arg(long)]
    pub provenance: Option<String>,
    #[arg(short, long)]
    pub category: Option<String>,
    /// At most this many results (1 to 50)
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Dispatch intents given as JSON
///
/// With no argument, reads one intent per non-blank line from stdin.
pub fn apply(dispatcher: &Dispatcher, intent: Option<String>, output: &Output) -> Result<()> {
    if let Some(text) = intent {
        return report(dispatcher.respond_json(&text), output);
    }

    if !stdin_is_piped() && output.should_prompt() {
        eprintln!("Reading intents from stdin, one per line (Ctrl-D to finish)");
    }

    let lines = io::stdin()
        .lock()
        .lines()
        .collect::<io::Result<Vec<_>>>()
        .context("Failed to read intents from stdin")?;

    let failed = apply_lines(dispatcher, &lines, output);
    if failed > 0 {
        bail!("{} intent(s) failed", failed);
    }
    Ok(())
}

/// Dispatch each non-blank line in order, returning how many failed
pub fn apply_lines(dispatcher: &Dispatcher, lines: &[String], output: &Output) -> usize {
    let intents: Vec<&str> = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    let total = intents.len();
    let mut failed = 0;

    for (i, text) in intents.into_iter().enumerate() {
        if total > 1 && output.format == OutputFormat::Human {
            println!("({}/{})", i + 1, total);
        }
        let response = dispatcher.respond_json(text);
        output.print_response(&response);
        if let Response::Failed { message, .. } = &response {
            eprintln!("✗ {}", message);
            failed += 1;
        }
    }

    failed
}

/// Add a record
pub fn add(dispatcher: &Dispatcher, args: AddArgs, output: &Output) -> Result<()> {
    let book = add_payload(args);
    let mut payload = Map::new();
    payload.insert("book".to_string(), Value::Object(book));
    report(dispatcher.respond(Intent::Add(payload)), output)
}

/// Show a record
pub fn get(dispatcher: &Dispatcher, id: u32, output: &Output) -> Result<()> {
    let intent = Intent::Get {
        id: Some(json!(id.to_string())),
        reference: None,
    };
    report(dispatcher.respond(intent), output)
}

/// Search records
pub fn find(dispatcher: &Dispatcher, args: FindArgs, output: &Output) -> Result<()> {
    let limit = args.limit.map(|n| json!(n));
    let query = find_query(args);
    if query.is_empty() {
        bail!("Give at least one search field, e.g. --author plat");
    }
    report(dispatcher.respond(Intent::Find { query, limit }), output)
}

/// Show the newest records
pub fn last(dispatcher: &Dispatcher, n: usize, output: &Output) -> Result<()> {
    let intent = Intent::Last { n: Some(json!(n)) };
    report(dispatcher.respond(intent), output)
}

/// Place a record on the shelf
pub fn set_position(
    dispatcher: &Dispatcher,
    id: u32,
    row: u32,
    column: u32,
    output: &Output,
) -> Result<()> {
    let intent = Intent::SetPosition {
        reference: Some(Reference::by_id(id)),
        pos: Some(Position {
            fila: Some(json!(row)),
            columna: Some(json!(column)),
        }),
        fila: None,
        columna: None,
    };
    report(dispatcher.respond(intent), output)
}

/// Set a record's ISBN
pub fn set_isbn(dispatcher: &Dispatcher, id: u32, isbn: String, output: &Output) -> Result<()> {
    let intent = Intent::SetIsbn {
        reference: Some(Reference::by_id(id)),
        isbn: Some(Value::String(isbn)),
    };
    report(dispatcher.respond(intent), output)
}

/// Change fields given as `key=value`
pub fn update(dispatcher: &Dispatcher, id: u32, pairs: Vec<String>, output: &Output) -> Result<()> {
    let mut changes = Map::new();
    for pair in &pairs {
        let (key, value) = parse_change(pair)?;
        changes.insert(key, value);
    }

    let intent = Intent::Update {
        reference: Some(Reference::by_id(id)),
        changes: Some(changes),
    };
    report(dispatcher.respond(intent), output)
}

/// Delete a record, renumbering the ones after it
pub fn delete(dispatcher: &Dispatcher, id: u32, yes: bool, output: &Output) -> Result<()> {
    if !yes && output.should_prompt() {
        if let Some(record) = dispatcher
            .store()
            .get_by_id(id)
            .context("Failed to read catalog")?
        {
            println!("Delete record: {}", list_item(&record));
            println!("Every record after it will move up one id.");
            if !confirm("Are you sure?")? {
                println!("Cancelled.");
                return Ok(());
            }
        }
    }

    let intent = Intent::Delete {
        reference: Some(Reference::by_id(id)),
    };
    report(dispatcher.respond(intent), output)
}

/// Print a response; a failure becomes the command's error
fn report(response: Response, output: &Output) -> Result<()> {
    output.print_response(&response);
    match response {
        Response::Failed { message, .. } => Err(anyhow!(message)),
        _ => Ok(()),
    }
}

fn add_payload(args: AddArgs) -> Map<String, Value> {
    let mut book = Map::new();
    book.insert("titulo".to_string(), json!(args.title));

    let text_fields = [
        ("autor", args.author),
        ("editorial", args.publisher),
        ("procedencia", args.provenance),
        ("categoria", args.category),
        ("isbn", args.isbn),
        ("comentarios", args.comments),
    ];
    for (key, value) in text_fields {
        if let Some(value) = value {
            book.insert(key.to_string(), json!(value));
        }
    }

    if let Some(year) = args.year {
        book.insert("ano".to_string(), json!(year));
    }
    if let Some(row) = args.row {
        book.insert("fila".to_string(), json!(row));
    }
    if let Some(column) = args.column {
        book.insert("columna".to_string(), json!(column));
    }

    if let Some(reviewed) = args.reviewed {
        let reviewed = if reviewed.trim().is_empty() {
            today_stamp(Local::now().date_naive())
        } else {
            reviewed
        };
        book.insert("f_revision".to_string(), json!(reviewed));
    }

    book
}

fn find_query(args: FindArgs) -> Map<String, Value> {
    [
        ("titulo", args.title),
        ("autor", args.author),
        ("editorial", args.publisher),
        ("ano", args.year),
        ("isbn", args.isbn),
        ("procedencia", args.provenance),
        ("categoria", args.category),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|v| (key.to_string(), Value::String(v))))
    .collect()
}

/// Parse a `key=value` change
///
/// An empty value is kept as `""`: it clears text fields and marks
/// `f_revision` as reviewed today.
fn parse_change(pair: &str) -> Result<(String, Value)> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected key=value, got '{}'", pair))?;

    let key = key.trim();
    if key.is_empty() {
        bail!("Missing field name in '{}'", pair);
    }

    Ok((key.to_string(), Value::String(value.trim().to_string())))
}
