use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::launch::{HostPaths, LaunchConfig, RunMode};
use crate::config::passthrough::{ForwardedVar, PassthroughKind};
use crate::utils::identity::HostIdentity;

/// Where the RULER checkout is mounted inside the container
pub const CONTAINER_PROJECT_DIR: &str = "/workspace/RULER";
pub const CONTAINER_MODEL_DIR: &str = "/workspace/models";
pub const CONTAINER_OUTPUT_DIR: &str = "/workspace/results";
pub const CONTAINER_WORKDIR: &str = "/workspace/RULER/scripts";

const MEMLOCK_ULIMIT: &str = "memlock=-1";
const STACK_ULIMIT: &str = "stack=67108864";

/// Host user/group databases, so the mapped uid resolves to a name.
const IDENTITY_FILES: [&str; 2] = ["/etc/passwd", "/etc/group"];

/// A bind mount as passed to `-v`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
    pub readonly: bool,
}

impl Mount {
    fn new(host: impl Into<PathBuf>, container: impl Into<String>, readonly: bool) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            readonly,
        }
    }

    pub fn volume_arg(&self) -> String {
        if self.readonly {
            format!("{}:{}:ro", self.host.display(), self.container)
        } else {
            format!("{}:{}", self.host.display(), self.container)
        }
    }
}

/// A complete runtime invocation: the program and its argument tokens, in order.
///
/// Tokens are handed to the process-spawn API as-is; no shell parses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Names of forwarded variables whose values are hidden when printed
    #[serde(skip)]
    secrets: Vec<String>,
}

impl ContainerInvocation {
    /// Assemble the `run` invocation for `config`.
    ///
    /// `program` is the runtime binary (usually the resolved `docker` path).
    pub fn build(
        program: impl Into<String>,
        config: &LaunchConfig,
        identity: &HostIdentity,
        paths: &HostPaths,
        forwarded: &[ForwardedVar],
    ) -> Self {
        let mut args: Vec<String> = vec!["run".into(), "--rm".into()];

        args.extend([
            "--gpus".to_string(),
            config.gpus.clone(),
            "--name".to_string(),
            config.container_name.clone(),
            "--shm-size".to_string(),
            config.shm_size.clone(),
            "--ipc".to_string(),
            "host".to_string(),
            "--ulimit".to_string(),
            MEMLOCK_ULIMIT.to_string(),
            "--ulimit".to_string(),
            STACK_ULIMIT.to_string(),
            "--network".to_string(),
            "host".to_string(),
            "--user".to_string(),
            identity.user_spec(),
            "-e".to_string(),
            format!("HOME={}", identity.home.display()),
        ]);

        for mount in mounts(identity, paths) {
            args.push("-v".into());
            args.push(mount.volume_arg());
        }

        args.push("-w".into());
        args.push(CONTAINER_WORKDIR.into());

        let mut secrets = Vec::new();
        for var in forwarded {
            args.push("-e".into());
            args.push(var.assignment());
            // Extras are often tokens too; only proxies print in clear.
            if var.kind != PassthroughKind::Proxy {
                secrets.push(var.name.clone());
            }
        }

        match config.run_mode {
            RunMode::Interactive => {
                args.push("-it".into());
                args.push(config.image.clone());
                args.push(config.shell.clone());
            }
            RunMode::Benchmark => {
                args.push(config.image.clone());
                args.extend([
                    "bash".to_string(),
                    config.benchmark_script.clone(),
                    config.model_name.clone(),
                    config.benchmark_name.clone(),
                ]);
            }
        }

        Self {
            program: program.into(),
            args,
            secrets,
        }
    }

    /// Argument tokens with secret values replaced by `***`.
    pub fn redacted_args(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.args.len());
        let mut after_env_flag = false;
        for arg in &self.args {
            let redacted = match arg.split_once('=') {
                Some((name, _)) if after_env_flag && self.secrets.iter().any(|s| s == name) => {
                    format!("{}=***", name)
                }
                _ => arg.clone(),
            };
            after_env_flag = arg == "-e";
            out.push(redacted);
        }
        out
    }

    /// Copy of this invocation with secret values redacted.
    pub fn redacted(&self) -> Self {
        Self {
            program: self.program.clone(),
            args: self.redacted_args(),
            secrets: Vec::new(),
        }
    }

    /// Shell-quoted single-line rendering, secrets redacted.
    pub fn display(&self) -> String {
        self.redacted().command_line()
    }

    /// Shell-quoted single-line rendering of the exact tokens.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|t| shell_escape(t))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Bind mounts in launch order.
pub fn mounts(identity: &HostIdentity, paths: &HostPaths) -> Vec<Mount> {
    let home = identity.home.display().to_string();
    let mut mounts = vec![
        Mount::new(&identity.home, home, false),
        Mount::new(&paths.project_dir, CONTAINER_PROJECT_DIR, false),
        Mount::new(&paths.model_dir, CONTAINER_MODEL_DIR, false),
        Mount::new(&paths.output_dir, CONTAINER_OUTPUT_DIR, false),
    ];
    mounts.extend(
        IDENTITY_FILES
            .iter()
            .map(|f| Mount::new(Path::new(f), *f, true)),
    );
    mounts
}

/// Shell-escape a string for safe inclusion in a shell command
fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().any(|c| " \t\n\"'\\$`!*?[]{}();<>&|#~".contains(c)) {
        format!("'{}'", s.replace('\'', "'\\''"))
    } else {
        s.to_string()
    }
}
