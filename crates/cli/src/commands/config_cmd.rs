//! `scribe config`: configuration management commands.

use scribe_config::AppConfig;
use std::path::Path;

/// Print the effective configuration with secrets redacted.
pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    println!("{}", render(&config)?);
    Ok(())
}

pub fn path() {
    println!("{}", config_path().display());
}

/// Write the default configuration unless a file already exists.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    if write_default(&path)? {
        println!("  ✅ Wrote {}", path.display());
    } else {
        println!("  Config already exists at {}", path.display());
    }
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

fn render(config: &AppConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&config.redacted())
}

/// `false` when `path` already exists.
fn write_default(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}
