//! Shelf CLI
//!
//! Command-line interface for shelf - a library catalog kept in a CSV sheet.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use shelf_core::{CatalogStore, Config, Dispatcher, StorageError};

mod commands;
mod logging;
mod output;
mod prompt;

use commands::catalog::{AddArgs, FindArgs};
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Shelf - Library catalog in a spreadsheet")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file to use instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch intents given as JSON (one per stdin line without an argument)
    Apply {
        /// Intent, e.g. '{"op":"last","n":5}'
        intent: Option<String>,
    },
    /// Add a record
    Add(AddArgs),
    /// Show a record
    #[command(alias = "show")]
    Get {
        /// Record id
        id: u32,
    },
    /// Search records (case-insensitive substrings, all must match)
    #[command(alias = "search")]
    Find {
        #[command(flatten)]
        criteria: FindArgs,
    },
    /// Show the newest records
    Last {
        /// How many
        #[arg(default_value_t = 10)]
        n: usize,
    },
    /// Set shelf row and column of a record
    SetPos {
        /// Record id
        id: u32,
        row: u32,
        column: u32,
    },
    /// Set the ISBN of a record
    SetIsbn {
        /// Record id
        id: u32,
        isbn: String,
    },
    /// Change fields of a record
    Update {
        /// Record id
        id: u32,
        /// Changes as key=value (EMPTY clears; f_revision= marks reviewed today)
        #[arg(required = true)]
        changes: Vec<String>,
    },
    /// Delete a record and renumber the ones after it
    #[command(alias = "rm")]
    Delete {
        /// Record id
        id: u32,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show status (table path, record count)
    Status,
    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value (data_dir, sheet, lock_timeout_secs, log_file)
    Set {
        key: String,
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    logging::init(&config, cli.verbose);

    // Commands that don't need the store
    if let Commands::Config { command } = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => {
                commands::config::show(&config, cli.config.as_ref(), &output)
            }
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key.clone(), value.clone(), cli.config.as_ref(), &output)
            }
        };
    }

    // An unreadable table is fatal here, before any command runs
    let store = CatalogStore::open(&config).map_err(|e| open_failure(&config, e))?;

    if let Commands::Status = &cli.command {
        return commands::status::show(&store, &config, &output);
    }

    let dispatcher = Dispatcher::new(store);

    match cli.command {
        Commands::Apply { intent } => commands::catalog::apply(&dispatcher, intent, &output),
        Commands::Add(args) => commands::catalog::add(&dispatcher, args, &output),
        Commands::Get { id } => commands::catalog::get(&dispatcher, id, &output),
        Commands::Find { criteria } => commands::catalog::find(&dispatcher, criteria, &output),
        Commands::Last { n } => commands::catalog::last(&dispatcher, n, &output),
        Commands::SetPos { id, row, column } => {
            commands::catalog::set_position(&dispatcher, id, row, column, &output)
        }
        Commands::SetIsbn { id, isbn } => commands::catalog::set_isbn(&dispatcher, id, isbn, &output),
        Commands::Update { id, changes } => {
            commands::catalog::update(&dispatcher, id, changes, &output)
        }
        Commands::Delete { id, yes } => commands::catalog::delete(&dispatcher, id, yes, &output),
        Commands::Status | Commands::Config { .. } => Ok(()), // Handled above
    }
}

/// Startup error for a catalog that cannot be opened, with its recovery hint
fn open_failure(config: &Config, error: StorageError) -> anyhow::Error {
    let context = match error.recovery_suggestion() {
        Some(hint) => format!(
            "Failed to open catalog {:?}\nHint: {}",
            config.table_path(),
            hint
        ),
        None => format!("Failed to open catalog {:?}", config.table_path()),
    };
    anyhow::Error::new(error).context(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_update_and_flags() {
        let cli = Cli::try_parse_from(["shelf", "-vv", "--json", "update", "3", "autor=Platón", "fila=2"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        match cli.command {
            Commands::Update { id, changes } => {
                assert_eq!(id, 3);
                assert_eq!(changes, vec!["autor=Platón", "fila=2"]);
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn test_open_failure_carries_hint() {
        let config = Config::default();

        let err = open_failure(
            &config,
            StorageError::LockTimeout {
                path: config.lock_path(),
                waited: std::time::Duration::from_secs(10),
            },
        );
        let message = err.to_string();
        assert!(message.starts_with("Failed to open catalog"));
        assert!(message.contains("Hint: Another program is holding the catalog"));
        assert!(err.downcast_ref::<StorageError>().is_some());

        let err = open_failure(
            &config,
            StorageError::NotFound {
                path: config.table_path(),
            },
        );
        assert!(!err.to_string().contains("Hint"));
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from(["shelf", "config", "set", "sheet", "Prestamos"]).unwrap();
        match cli.command {
            Commands::Config {
                command: Some(ConfigCommands::Set { key, value }),
            } => {
                assert_eq!(key, "sheet");
                assert_eq!(value, "Prestamos");
            }
            _ => panic!("expected config set"),
        }
    }

    #[test]
    fn test_parse_add_reviewed_without_value() {
        let cli = Cli::try_parse_from(["shelf", "add", "--title", "Ethics", "--reviewed"]).unwrap();
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.title, "Ethics");
                assert_eq!(args.reviewed.as_deref(), Some(""));
            }
            _ => panic!("expected add"),
        }
    }
}
