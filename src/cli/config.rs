use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use super::{load_config, LaunchArgs};
use crate::config::launch::LaunchConfig;
use crate::utils::paths;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a config file with the default settings
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration after file, env, and flag overrides
    Show {
        #[command(flatten)]
        launch: LaunchArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the path of the config file in use
    Path,
}

impl ConfigCommands {
    pub fn execute(self, config_path: Option<&Path>) -> Result<()> {
        match self {
            Self::Init { force } => init_config(&config_file(config_path)?, force),
            Self::Show { launch, json } => show_config(config_path, launch, json),
            Self::Path => {
                println!("{}", config_file(config_path)?.display());
                Ok(())
            }
        }
    }
}

fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => paths::get_config_file(),
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite it.",
            path.display()
        );
    }

    LaunchConfig::default()
        .save(path)
        .context("Failed to write default config")?;

    println!(
        "{} Wrote default config to {}",
        "✓".green().bold(),
        path.display().to_string().cyan()
    );
    Ok(())
}

fn show_config(config_path: Option<&Path>, launch: LaunchArgs, json: bool) -> Result<()> {
    let config = load_config(config_path, launch)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", serde_yaml::to_string(&config)?);
    }
    Ok(())
}
