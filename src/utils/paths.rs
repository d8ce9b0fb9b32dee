use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the ruler-launch configuration directory (~/.ruler-launch)
pub fn get_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".ruler-launch"))
}

/// Get the default config file path
pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.yaml"))
}
