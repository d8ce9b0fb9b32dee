use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;
use std::process::ExitStatus;

use super::{load_config, LaunchArgs};
use crate::config::launch::{HostPaths, LaunchConfig, RunMode};
use crate::config::passthrough::{self, ForwardedVar};
use crate::docker::client::DockerClient;
use crate::docker::command::ContainerInvocation;
use crate::docker::{preflight, remove_stale_container};
use crate::error::LaunchError;
use crate::utils::identity::HostIdentity;

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub launch: LaunchArgs,

    /// Print the container command instead of running it
    #[arg(long)]
    pub dry_run: bool,

    /// With --dry-run, print the command as a JSON object
    #[arg(long, requires = "dry_run")]
    pub json: bool,

    /// With --dry-run, print credential and extra values instead of ***
    #[arg(long, requires = "dry_run")]
    pub show_secrets: bool,
}

impl RunArgs {
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path, self.launch)?;
        if let Err(e) = config.validate() {
            exit_with(&e);
        }

        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        let paths = config.host_paths(&cwd);
        let identity = HostIdentity::current()?;
        let forwarded = passthrough::resolve(&config.extra_env, |name| std::env::var(name).ok());

        if self.dry_run {
            let invocation = ContainerInvocation::build(
                config.runtime.clone(),
                &config,
                &identity,
                &paths,
                &forwarded,
            );
            let shown = if self.show_secrets {
                invocation
            } else {
                invocation.redacted()
            };
            if self.json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("{}", shown.command_line());
            }
            return Ok(());
        }

        let ready = match preflight::check(
            &config,
            &paths.project_dir,
            preflight::locate_runtime,
            || DockerClient::connect(&config.runtime, config.socket.as_deref()),
        )
        .await
        {
            Ok(ready) => ready,
            Err(e) => exit_with(&e),
        };

        remove_stale_container(&ready.runtime, &config.container_name).await;

        prepare_host(&paths);

        for line in banner_lines(&config, &paths, &identity, &forwarded) {
            println!("{}", line);
        }

        let invocation = ContainerInvocation::build(
            ready.runtime_path.display().to_string(),
            &config,
            &identity,
            &paths,
            &forwarded,
        );
        tracing::debug!("Container command: {}", invocation.display());

        let exit_code = dispatch(&invocation).await?;

        if exit_code == 0 {
            println!("{} Container exited successfully", "✓".green().bold());
        } else {
            println!(
                "{} Container exited with code {}",
                "✗".red().bold(),
                exit_code
            );
        }
        std::process::exit(exit_code);
    }
}

/// Run preflight only and report what a launch would use.
pub async fn check(config_path: Option<&Path>, args: LaunchArgs) -> Result<()> {
    let config = load_config(config_path, args)?;
    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let paths = config.host_paths(&cwd);

    println!("{} Checking {}...", "=>".blue().bold(), config.runtime.cyan());
    let ready = match preflight::check(
        &config,
        &paths.project_dir,
        preflight::locate_runtime,
        || DockerClient::connect(&config.runtime, config.socket.as_deref()),
    )
    .await
    {
        Ok(ready) => ready,
        Err(e) => exit_with(&e),
    };

    println!(
        "{} Runtime found: {}",
        "✓".green().bold(),
        ready.runtime_path.display()
    );
    println!("{} Image present: {}", "✓".green().bold(), config.image.cyan());
    Ok(())
}

/// Spawn the runtime with the assembled arguments and wait for it.
///
/// Stdio is inherited, so in interactive mode the terminal belongs to the
/// container until it exits.
async fn dispatch(invocation: &ContainerInvocation) -> Result<i32> {
    let status = tokio::process::Command::new(&invocation.program)
        .args(&invocation.args)
        .status()
        .await
        .with_context(|| format!("Failed to start {}", invocation.program))?;

    Ok(exit_code(status))
}

/// Exit code to hand back to our caller. A signal death maps to 128 + signal.
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    if let Some(code) = status.code() {
        return code;
    }
    match status.signal() {
        Some(sig) => {
            let name = nix::sys::signal::Signal::try_from(sig)
                .map(|s| s.as_str())
                .unwrap_or("unknown");
            tracing::warn!("Container process terminated by signal {} ({})", sig, name);
            128 + sig
        }
        None => 1,
    }
}

/// Host-side setup before the launch: create the output directory and
/// check the model directory. Problems are logged and returned as warnings;
/// none of them stops the launch.
fn prepare_host(paths: &HostPaths) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Err(e) = std::fs::create_dir_all(&paths.output_dir) {
        warnings.push(format!(
            "Could not create output directory {}: {}",
            paths.output_dir.display(),
            e
        ));
    }
    if !paths.model_dir.exists() {
        warnings.push(format!(
            "Model directory {} does not exist",
            paths.model_dir.display()
        ));
    }

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    warnings
}

fn banner_lines(
    config: &LaunchConfig,
    paths: &HostPaths,
    identity: &HostIdentity,
    forwarded: &[ForwardedVar],
) -> Vec<String> {
    let item = |label: &str, value: String| format!("  {} {:<11} {}", "•".yellow(), label, value);

    let mut lines = vec![
        format!("{} Launching RULER container...", "=>".blue().bold()),
        item("Image:", config.image.cyan().to_string()),
        item("Mode:", config.run_mode.to_string()),
        item("Container:", config.container_name.clone()),
        item("GPUs:", config.gpus.clone()),
        item("Shm size:", config.shm_size.clone()),
        item("Project:", paths.project_dir.display().to_string()),
        item("Models:", paths.model_dir.display().to_string()),
        item("Results:", paths.output_dir.display().to_string()),
        item("User:", identity.user_spec()),
    ];
    if config.run_mode == RunMode::Benchmark {
        lines.push(item("Model:", config.model_name.cyan().to_string()));
        lines.push(item("Benchmark:", config.benchmark_name.cyan().to_string()));
    }
    if !forwarded.is_empty() {
        let names: Vec<&str> = forwarded.iter().map(|v| v.name.as_str()).collect();
        lines.push(item("Forwarding:", names.join(", ")));
    }
    lines
}

/// Report a launch failure and exit with status 1.
fn exit_with(err: &LaunchError) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), err);
    if let Some(hint) = err.hint() {
        eprintln!("{}", hint.yellow());
    }
    std::process::exit(1);
}
