//! Logging setup
//!
//! Logs go to stderr unless the config names a log file. The level comes
//! from `RUST_LOG` when set, otherwise from the number of `-v` flags.

use std::fs::OpenOptions;

use tracing::info;
use tracing_subscriber::EnvFilter;

use shelf_core::Config;

/// Map `-v` occurrences to a level
pub fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber
pub fn init(config: &Config, verbose: u8) {
    let level = level_for(verbose);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shelf_core={},shelf_cli={}", level, level)));

    if let Some(ref log_path) = config.log_file {
        let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                return;
            }
        };

        // Ignore the error if a subscriber is already installed
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(log_file)
            .try_init();

        info!("Logging to {:?}", log_path);
        return;
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
