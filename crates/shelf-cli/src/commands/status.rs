//! Status command handler

use anyhow::Result;

use shelf_core::{CatalogStore, Config};

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(store: &CatalogStore, config: &Config, output: &Output) -> Result<()> {
    let count = store.count()?;
    let size = std::fs::metadata(store.path()).map(|m| m.len()).unwrap_or(0);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "table": store.path(),
                    "sheet": config.sheet,
                    "lock_file": store.lock_path(),
                    "lock_timeout_secs": config.lock_timeout_secs,
                    "size": size,
                    "records": count
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", count);
        }
        OutputFormat::Human => {
            println!("Shelf Status");
            println!("============");
            println!();
            println!("Catalog:");
            println!("  Sheet:    {}", config.sheet);
            println!("  Table:    {}", store.path().display());
            println!("  Size:     {}", human_size(size));
            println!();
            println!("Locking:");
            println!("  Lock file: {}", store.lock_path().display());
            println!("  Timeout:   {}s", config.lock_timeout_secs);
            println!();
            println!("Contents:");
            println!("  Records: {}", count);
        }
    }

    Ok(())
}

fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
