pub mod config;
pub mod run;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::launch::{LaunchConfig, LaunchOverrides, RunMode};

#[derive(Parser)]
#[command(name = "ruler-launch")]
#[command(author = "RULER Team")]
#[command(version)]
#[command(about = "Launch the RULER benchmark container against a language model", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.ruler-launch/config.yaml)
    #[arg(short, long, global = true, env = "RULER_LAUNCH_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the container: an interactive shell or a benchmark run
    Run(run::RunArgs),

    /// Check that the container runtime and image are available
    Check {
        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Manage the config file (init, show, path)
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },
}

/// Per-invocation overrides, applied on top of the config file.
#[derive(Args, Debug, Default)]
pub struct LaunchArgs {
    /// Docker image to run
    #[arg(long, env = "RULER_IMAGE")]
    pub image: Option<String>,

    /// GPU selector passed to --gpus (e.g. all, device=0,1)
    #[arg(long, env = "RULER_GPUS")]
    pub gpus: Option<String>,

    /// Shared memory size (e.g. 16g)
    #[arg(long, env = "RULER_SHM_SIZE")]
    pub shm_size: Option<String>,

    /// Host directory with model weights (relative to the current directory)
    #[arg(long, env = "RULER_MODEL_DIR", value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Host directory for benchmark results, created if missing (relative to the current directory)
    #[arg(long, env = "RULER_OUTPUT_DIR", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Container name
    #[arg(long, env = "RULER_CONTAINER_NAME")]
    pub name: Option<String>,

    /// Run mode
    #[arg(short, long, value_enum, env = "RULER_RUN_MODE")]
    pub mode: Option<RunMode>,

    /// Model name passed to the benchmark driver
    #[arg(long, env = "RULER_MODEL_NAME")]
    pub model: Option<String>,

    /// Benchmark name passed to the benchmark driver
    #[arg(long, env = "RULER_BENCHMARK_NAME")]
    pub benchmark: Option<String>,

    /// Container runtime binary (docker, podman, ...)
    #[arg(long, env = "RULER_RUNTIME")]
    pub runtime: Option<String>,

    /// API socket of the runtime (defaults depend on the runtime)
    #[arg(long, env = "RULER_RUNTIME_SOCKET", value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// RULER checkout to mount (defaults to the current directory)
    #[arg(long, env = "RULER_PROJECT_DIR", value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Extra host variable to forward when set (repeatable)
    #[arg(long = "pass-env", value_name = "NAME")]
    pub pass_env: Vec<String>,
}

impl From<LaunchArgs> for LaunchOverrides {
    fn from(args: LaunchArgs) -> Self {
        Self {
            image: args.image,
            gpus: args.gpus,
            shm_size: args.shm_size,
            model_dir: args.model_dir,
            output_dir: args.output_dir,
            container_name: args.name,
            run_mode: args.mode,
            model_name: args.model,
            benchmark_name: args.benchmark,
            runtime: args.runtime,
            socket: args.socket,
            project_dir: args.project_dir,
            extra_env: args.pass_env,
        }
    }
}

/// Load the config file and apply command-line overrides.
///
/// Relative paths among the overrides resolve against the current directory.
pub fn load_config(config_path: Option<&Path>, args: LaunchArgs) -> Result<LaunchConfig> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let mut config = LaunchConfig::load(config_path)?;
    config.apply(LaunchOverrides::from(args).resolve_paths(&cwd));
    Ok(config)
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config_path = self.config.as_deref();
        match self.command {
            Commands::Run(args) => args.execute(config_path).await,
            Commands::Check { launch } => run::check(config_path, launch).await,
            Commands::Config { command } => command.execute(config_path),
        }
    }
}
