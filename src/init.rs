use colored::*;
use std::{fs, path::Path};

use crate::config::CONFIG_FILE;

pub const TEMPLATE: &str = r#"# doc2dash Configuration File

# Directory the docset is created in
# Defaults to "." (current directory)
destination = "."

# How many parsed inventory entries may queue up before the
# inventory scan waits for the indexer
channel_capacity = 256

# What to do with inventory records whose role has no Dash type:
#   "fail" - abort the conversion (default)
#   "skip" - print a warning and leave the record out
unknown_roles = "fail"

# Allow bundled and external JavaScript in the docset
enable_js = false

# Base URL of the online documentation, offered by Dash as a fallback
# online_redirect_url = "https://example.readthedocs.io/en/latest/"
"#;

pub fn init_config(force: bool) -> Result<(), String> {
    init_config_at(Path::new(CONFIG_FILE), force)
}

pub fn init_config_at(config_path: &Path, force: bool) -> Result<(), String> {
    if config_path.exists() && !force {
        return Err(format!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        ));
    }

    fs::write(config_path, TEMPLATE)
        .map_err(|e| format!("Failed to create {}: {}", config_path.display(), e))?;

    println!("{} Created {}", "✅".green(), config_path.display());
    println!("\n{}", "Configuration file created with defaults:".cyan());
    println!("  {} destination = \".\"", "•".blue());
    println!("  {} channel_capacity = 256", "•".blue());
    println!("  {} unknown_roles = \"fail\"", "•".blue());
    println!("  {} enable_js = false", "•".blue());
    println!(
        "\n{}",
        format!("Edit {} to customize your conversions.", CONFIG_FILE).cyan()
    );

    Ok(())
}
