//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use shelf_core::{Field, Record, Response};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a dispatcher response
    ///
    /// Failures are left to the caller, which reports them on stderr; in
    /// JSON mode the failure object is printed as well so scripts see it.
    pub fn print_response(&self, response: &Response) {
        if self.is_json() {
            print_json(response);
            return;
        }

        match response {
            Response::Added { record } => {
                self.success("Added");
                self.print_record(record);
            }
            Response::Updated { record } => {
                self.success("Updated");
                self.print_record(record);
            }
            Response::Record { record } => self.print_record(record),
            Response::List { records } => self.print_records(records),
            Response::Deleted { id } => match self.format {
                OutputFormat::Quiet => println!("{}", id),
                _ => self.success(&format!(
                    "Deleted record {} and renumbered the catalog",
                    id
                )),
            },
            Response::Chat { message } => self.message(message),
            Response::Failed { candidates, .. } => {
                if !candidates.is_empty() && !self.is_quiet() {
                    println!("Candidates:");
                    for record in candidates {
                        println!("{}", list_item(record));
                    }
                }
            }
        }
    }

    /// Print a single record
    pub fn print_record(&self, record: &Record) {
        match self.format {
            OutputFormat::Human => {
                println!("{}", render_record(record));
            }
            OutputFormat::Json => print_json(record),
            OutputFormat::Quiet => {
                println!("{}", record.id);
            }
        }
    }

    /// Print a list of records
    pub fn print_records(&self, records: &[Record]) {
        match self.format {
            OutputFormat::Human => {
                if records.is_empty() {
                    println!("No records found.");
                    return;
                }
                for record in records {
                    println!("{}", list_item(record));
                }
                println!("\n{} record(s)", records.len());
            }
            OutputFormat::Json => print_json(&records),
            OutputFormat::Quiet => {
                for record in records {
                    println!("{}", record.id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// Label shown next to a field in record cards
fn label(field: Field) -> &'static str {
    match field {
        Field::LastReviewed => "F. revisión",
        other => other.header(),
    }
}

/// Multi-line card: `Id-<n>` then one `Label: value` line per non-blank field
pub fn render_record(record: &Record) -> String {
    let mut lines = vec![format!("📚 Id-{}", record.id)];
    for field in Field::ALL.into_iter().filter(|f| *f != Field::Id) {
        let value = record.text(field);
        if !value.trim().is_empty() {
            lines.push(format!("{}: {}", label(field), value));
        }
    }
    lines.join("\n")
}

/// One-line summary used in lists
pub fn list_item(record: &Record) -> String {
    format!(
        "• {} — {} ({})",
        record.id,
        truncate(&record.title, 60),
        truncate(&record.author, 30)
    )
}

/// Truncate a string to max length in characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
