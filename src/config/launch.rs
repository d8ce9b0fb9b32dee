use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::passthrough;
use crate::error::LaunchError;
use crate::utils::paths;

/// How the container is entered once it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Open a shell with a pseudo-terminal
    #[default]
    Interactive,
    /// Run the benchmark driver script and exit
    Benchmark,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interactive => f.write_str("interactive"),
            Self::Benchmark => f.write_str("benchmark"),
        }
    }
}

impl FromStr for RunMode {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interactive" => Ok(Self::Interactive),
            "benchmark" => Ok(Self::Benchmark),
            other => Err(LaunchError::InvalidRunMode(other.to_string())),
        }
    }
}

/// Launch configuration, stored in ~/.ruler-launch/config.yaml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaunchConfig {
    /// Image reference to run
    pub image: String,

    /// Value for `--gpus` (e.g. "all", "device=0,1")
    pub gpus: String,

    /// Shared memory size (e.g. "16g")
    pub shm_size: String,

    /// Host directory holding model weights
    pub model_dir: PathBuf,

    /// Host directory receiving benchmark results
    pub output_dir: PathBuf,

    pub container_name: String,

    pub run_mode: RunMode,

    /// Model identifier handed to the benchmark driver
    pub model_name: String,

    /// Benchmark identifier handed to the benchmark driver
    pub benchmark_name: String,

    /// Container runtime binary looked up on PATH
    pub runtime: String,

    /// API socket of the runtime. Derived from the runtime name when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,

    /// RULER checkout mounted into the container. Defaults to the current directory.
    ///
    /// Relative `model_dir` and `output_dir` values from the config file
    /// resolve against this directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<PathBuf>,

    /// Dockerfile used in the build hint, relative to the project directory
    pub dockerfile: PathBuf,

    /// Benchmark driver inside the container's scripts directory
    pub benchmark_script: String,

    /// Shell started in interactive mode
    pub shell: String,

    /// Additional host variables to forward when set
    pub extra_env: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            image: "ruler:latest".to_string(),
            gpus: "all".to_string(),
            shm_size: "16g".to_string(),
            model_dir: PathBuf::from("./models"),
            output_dir: PathBuf::from("./results"),
            container_name: "ruler-benchmark".to_string(),
            run_mode: RunMode::Interactive,
            model_name: "llama3.1-8b-chat".to_string(),
            benchmark_name: "synthetic".to_string(),
            runtime: "docker".to_string(),
            socket: None,
            project_dir: None,
            dockerfile: PathBuf::from("docker/Dockerfile"),
            benchmark_script: "run.sh".to_string(),
            shell: "bash".to_string(),
            extra_env: Vec::new(),
        }
    }
}

/// Values that replace fields of a loaded config. `None` keeps the loaded value.
#[derive(Debug, Clone, Default)]
pub struct LaunchOverrides {
    pub image: Option<String>,
    pub gpus: Option<String>,
    pub shm_size: Option<String>,
    pub model_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub container_name: Option<String>,
    pub run_mode: Option<RunMode>,
    pub model_name: Option<String>,
    pub benchmark_name: Option<String>,
    pub runtime: Option<String>,
    pub socket: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
    pub extra_env: Vec<String>,
}

impl LaunchOverrides {
    /// Make relative paths given on the command line or in the environment
    /// absolute against the caller's working directory.
    pub fn resolve_paths(mut self, cwd: &Path) -> Self {
        for path in [
            &mut self.model_dir,
            &mut self.output_dir,
            &mut self.project_dir,
            &mut self.socket,
        ]
        .into_iter()
        .flatten()
        {
            let resolved = absolutize(path, cwd);
            *path = resolved;
        }
        self
    }
}

/// Host paths a launch mounts, all absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    pub project_dir: PathBuf,
    pub model_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl LaunchConfig {
    /// Load the config from `explicit`, or from the default location.
    ///
    /// A missing default file yields the built-in defaults; a missing
    /// explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = paths::get_config_file()?;
                if !path.exists() {
                    tracing::debug!("No config file at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                Self::load_from(&path)
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: LaunchConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        Ok(())
    }

    pub fn apply(&mut self, overrides: LaunchOverrides) {
        fn set<T>(field: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *field = v;
            }
        }

        set(&mut self.image, overrides.image);
        set(&mut self.gpus, overrides.gpus);
        set(&mut self.shm_size, overrides.shm_size);
        set(&mut self.model_dir, overrides.model_dir);
        set(&mut self.output_dir, overrides.output_dir);
        set(&mut self.container_name, overrides.container_name);
        set(&mut self.run_mode, overrides.run_mode);
        set(&mut self.model_name, overrides.model_name);
        set(&mut self.benchmark_name, overrides.benchmark_name);
        set(&mut self.runtime, overrides.runtime);
        if overrides.socket.is_some() {
            self.socket = overrides.socket;
        }
        if overrides.project_dir.is_some() {
            self.project_dir = overrides.project_dir;
        }
        for name in overrides.extra_env {
            if !self.extra_env.contains(&name) {
                self.extra_env.push(name);
            }
        }
    }

    /// Check the fields the container invocation depends on.
    pub fn validate(&self) -> Result<(), LaunchError> {
        let required = [
            ("image", &self.image),
            ("gpus", &self.gpus),
            ("shm_size", &self.shm_size),
            ("runtime", &self.runtime),
            ("shell", &self.shell),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(LaunchError::Config(format!("'{}' must not be empty", field)));
            }
        }

        if !is_valid_container_name(&self.container_name) {
            return Err(LaunchError::Config(format!(
                "'{}' is not a valid container name (allowed: [a-zA-Z0-9][a-zA-Z0-9_.-]+)",
                self.container_name
            )));
        }

        if self.run_mode == RunMode::Benchmark {
            let required = [
                ("model_name", &self.model_name),
                ("benchmark_name", &self.benchmark_name),
                ("benchmark_script", &self.benchmark_script),
            ];
            for (field, value) in required {
                if value.trim().is_empty() {
                    return Err(LaunchError::Config(format!(
                        "'{}' is required in benchmark mode",
                        field
                    )));
                }
            }
        }

        if let Some(bad) = self.extra_env.iter().find(|n| !passthrough::is_valid_name(n)) {
            return Err(LaunchError::Config(format!(
                "'{}' is not a valid environment variable name",
                bad
            )));
        }

        Ok(())
    }

    /// Resolve the mounted host paths. The project directory is relative to
    /// `cwd`; relative model and output directories are relative to the
    /// project directory.
    pub fn host_paths(&self, cwd: &Path) -> HostPaths {
        let project_dir = match &self.project_dir {
            Some(dir) => absolutize(dir, cwd),
            None => cwd.to_path_buf(),
        };
        HostPaths {
            model_dir: absolutize(&self.model_dir, &project_dir),
            output_dir: absolutize(&self.output_dir, &project_dir),
            project_dir,
        }
    }

    /// The command that builds the configured image.
    pub fn build_hint(&self, project_dir: &Path) -> String {
        format!(
            "{} build -f {} -t {} {}",
            self.runtime,
            project_dir.join(&self.dockerfile).display(),
            self.image,
            project_dir.display()
        )
    }
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    // Strip "." components so mounts read cleanly; ".." is left to the runtime.
    joined
        .components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

/// Docker's rule: `[a-zA-Z0-9][a-zA-Z0-9_.-]+`, so at least two characters.
fn is_valid_container_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    let rest = chars.as_str();
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_setup() {
        let config = LaunchConfig::default();
        assert_eq!(config.gpus, "all");
        assert_eq!(config.run_mode, RunMode::Interactive);
        assert_eq!(config.model_name, "llama3.1-8b-chat");
        assert_eq!(config.benchmark_name, "synthetic");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn run_mode_parses_only_known_values() {
        assert_eq!("interactive".parse::<RunMode>().unwrap(), RunMode::Interactive);
        assert_eq!("benchmark".parse::<RunMode>().unwrap(), RunMode::Benchmark);
        let err = "Benchmark".parse::<RunMode>().unwrap_err();
        assert!(matches!(err, LaunchError::InvalidRunMode(ref m) if m == "Benchmark"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: LaunchConfig =
            serde_yaml::from_str("run_mode: benchmark\nmodel_name: qwen2-7b\n").unwrap();
        assert_eq!(config.run_mode, RunMode::Benchmark);
        assert_eq!(config.model_name, "qwen2-7b");
        assert_eq!(config.image, "ruler:latest");
    }

    #[test]
    fn unknown_run_mode_in_yaml_is_rejected() {
        let parsed = serde_yaml::from_str::<LaunchConfig>("run_mode: batch\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed = serde_yaml::from_str::<LaunchConfig>("gpu: all\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let config = LaunchConfig {
            image: "ruler:dev".to_string(),
            extra_env: vec!["HF_TOKEN".to_string()],
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(LaunchConfig::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn empty_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "\n").unwrap();
        assert_eq!(LaunchConfig::load_from(&path).unwrap(), LaunchConfig::default());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LaunchConfig::load(Some(&dir.path().join("absent.yaml"))).is_err());
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let mut config = LaunchConfig::default();
        config.apply(LaunchOverrides {
            run_mode: Some(RunMode::Benchmark),
            gpus: Some("device=1".to_string()),
            extra_env: vec!["HF_TOKEN".to_string()],
            ..Default::default()
        });
        assert_eq!(config.run_mode, RunMode::Benchmark);
        assert_eq!(config.gpus, "device=1");
        assert_eq!(config.image, "ruler:latest");
        assert_eq!(config.extra_env, ["HF_TOKEN"]);
    }

    #[test]
    fn validation_catches_bad_fields() {
        let bad_name = LaunchConfig {
            container_name: "-ruler".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad_name.validate(), Err(LaunchError::Config(_))));

        let no_model = LaunchConfig {
            run_mode: RunMode::Benchmark,
            model_name: " ".to_string(),
            ..Default::default()
        };
        assert!(no_model.validate().is_err());

        // Model name only matters when the benchmark driver runs.
        let interactive = LaunchConfig {
            model_name: String::new(),
            ..Default::default()
        };
        assert!(interactive.validate().is_ok());

        let bad_env = LaunchConfig {
            extra_env: vec!["NOT-VALID".to_string()],
            ..Default::default()
        };
        assert!(bad_env.validate().is_err());
    }

    #[test]
    fn container_names_need_two_characters() {
        for name in ["a", "-ruler", "ruler benchmark", ""] {
            assert!(!is_valid_container_name(name), "{:?}", name);
        }
        for name in ["ab", "r1", "ruler_bench.2-gpu"] {
            assert!(is_valid_container_name(name), "{:?}", name);
        }

        let single = LaunchConfig {
            container_name: "a".to_string(),
            ..Default::default()
        };
        let err = single.validate().unwrap_err().to_string();
        assert!(err.contains("[a-zA-Z0-9][a-zA-Z0-9_.-]+"), "{}", err);
    }

    #[test]
    fn override_paths_resolve_against_working_dir() {
        let overrides = LaunchOverrides {
            project_dir: Some(PathBuf::from("/srv/RULER")),
            output_dir: Some(PathBuf::from("./out")),
            model_dir: Some(PathBuf::from("weights")),
            socket: Some(PathBuf::from("podman.sock")),
            ..Default::default()
        }
        .resolve_paths(Path::new("/home/alice"));

        let mut config = LaunchConfig::default();
        config.apply(overrides);
        let paths = config.host_paths(Path::new("/home/alice"));

        assert_eq!(paths.project_dir, PathBuf::from("/srv/RULER"));
        assert_eq!(paths.output_dir, PathBuf::from("/home/alice/out"));
        assert_eq!(paths.model_dir, PathBuf::from("/home/alice/weights"));
        assert_eq!(config.socket, Some(PathBuf::from("/home/alice/podman.sock")));
    }

    #[test]
    fn config_file_paths_stay_relative_to_project() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "project_dir: /srv/RULER\noutput_dir: out\n").unwrap();

        let config = LaunchConfig::load_from(&path).unwrap();
        let paths = config.host_paths(Path::new("/home/alice"));
        assert_eq!(paths.output_dir, PathBuf::from("/srv/RULER/out"));
        assert_eq!(paths.model_dir, PathBuf::from("/srv/RULER/models"));
    }

    #[test]
    fn host_paths_resolve_against_project_dir() {
        let config = LaunchConfig {
            project_dir: Some(PathBuf::from("RULER")),
            output_dir: PathBuf::from("/data/results"),
            ..Default::default()
        };
        let paths = config.host_paths(Path::new("/home/alice"));
        assert_eq!(paths.project_dir, PathBuf::from("/home/alice/RULER"));
        assert_eq!(paths.model_dir, PathBuf::from("/home/alice/RULER/models"));
        assert_eq!(paths.output_dir, PathBuf::from("/data/results"));
    }

    #[test]
    fn build_hint_names_image_and_dockerfile() {
        let config = LaunchConfig::default();
        assert_eq!(
            config.build_hint(Path::new("/src/RULER")),
            "docker build -f /src/RULER/docker/Dockerfile -t ruler:latest /src/RULER"
        );
    }
}
