use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::container::RemoveContainerOptions;
use bollard::errors::Error as BollardError;
use bollard::{Docker, API_DEFAULT_VERSION};
use std::path::{Path, PathBuf};

use super::ContainerRuntime;

const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Where the API socket of a runtime lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeSocket {
    /// `DOCKER_HOST`, or the default Docker socket
    DockerDefaults,
    /// A specific unix socket
    Unix(PathBuf),
}

impl RuntimeSocket {
    /// Pick the socket for `runtime`.
    ///
    /// An explicit socket always wins. Podman uses `CONTAINER_HOST`, then the
    /// rootless socket under `XDG_RUNTIME_DIR`, then the system socket. Any
    /// other runtime is treated as Docker-compatible.
    pub fn resolve<F>(runtime: &str, explicit: Option<&Path>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = explicit {
            return Self::Unix(path.to_path_buf());
        }

        let binary = Path::new(runtime)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(runtime);
        if binary != "podman" {
            return Self::DockerDefaults;
        }

        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(host) = non_empty("CONTAINER_HOST") {
            if let Some(path) = host.strip_prefix("unix://") {
                return Self::Unix(PathBuf::from(path));
            }
            tracing::warn!("Ignoring non-unix CONTAINER_HOST '{}'", host);
        }
        match non_empty("XDG_RUNTIME_DIR") {
            Some(dir) => Self::Unix(PathBuf::from(dir).join("podman").join("podman.sock")),
            None => Self::Unix(PathBuf::from("/run/podman/podman.sock")),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::DockerDefaults => "the Docker daemon".to_string(),
            Self::Unix(path) => path.display().to_string(),
        }
    }
}

/// API client for the configured container runtime
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect to the API socket of `runtime` and verify it answers.
    pub async fn connect(runtime: &str, socket: Option<&Path>) -> Result<Self> {
        let target = RuntimeSocket::resolve(runtime, socket, |name| std::env::var(name).ok());
        tracing::debug!("Connecting to {} at {}", runtime, target.describe());

        let docker = match &target {
            RuntimeSocket::DockerDefaults => Docker::connect_with_local_defaults(),
            RuntimeSocket::Unix(path) => Docker::connect_with_unix(
                &path.to_string_lossy(),
                CONNECT_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            ),
        }
        .with_context(|| {
            format!(
                "Failed to connect to {} at {}. Is it running?",
                runtime,
                target.describe()
            )
        })?;

        // Verify connection
        docker
            .ping()
            .await
            .with_context(|| format!("Failed to ping {} at {}", runtime, target.describe()))?;

        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(BollardError::DockerResponseServerError { status_code: 404, .. }) => Ok(false),
            Err(e) => Err(anyhow::anyhow!("Failed to inspect image '{}': {}", image, e)),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(name, Some(options))
            .await
            .with_context(|| format!("Failed to remove container '{}'", name))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn docker_uses_local_defaults() {
        let vars = env(&[("XDG_RUNTIME_DIR", "/run/user/1000")]);
        assert_eq!(
            RuntimeSocket::resolve("docker", None, |k| vars.get(k).cloned()),
            RuntimeSocket::DockerDefaults
        );
    }

    #[test]
    fn podman_uses_its_own_socket() {
        let vars = env(&[("XDG_RUNTIME_DIR", "/run/user/1000")]);
        assert_eq!(
            RuntimeSocket::resolve("podman", None, |k| vars.get(k).cloned()),
            RuntimeSocket::Unix(PathBuf::from("/run/user/1000/podman/podman.sock"))
        );

        // Resolved binary paths are recognized too.
        assert_eq!(
            RuntimeSocket::resolve("/usr/bin/podman", None, |_| None),
            RuntimeSocket::Unix(PathBuf::from("/run/podman/podman.sock"))
        );
    }

    #[test]
    fn podman_honors_container_host() {
        let vars = env(&[
            ("CONTAINER_HOST", "unix:///tmp/podman.sock"),
            ("XDG_RUNTIME_DIR", "/run/user/1000"),
        ]);
        assert_eq!(
            RuntimeSocket::resolve("podman", None, |k| vars.get(k).cloned()),
            RuntimeSocket::Unix(PathBuf::from("/tmp/podman.sock"))
        );
    }

    #[test]
    fn explicit_socket_wins() {
        let socket = Path::new("/var/run/custom.sock");
        for runtime in ["docker", "podman", "nerdctl"] {
            assert_eq!(
                RuntimeSocket::resolve(runtime, Some(socket), |_| None),
                RuntimeSocket::Unix(socket.to_path_buf())
            );
        }
    }

    #[tokio::test]
    async fn unreachable_podman_socket_names_podman() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("podman.sock");
        let err = match DockerClient::connect("podman", Some(&socket)).await {
            Ok(_) => panic!("connected to a missing socket"),
            Err(e) => format!("{:#}", e),
        };
        assert!(err.contains("podman"), "{}", err);
        assert!(err.contains(&socket.display().to_string()), "{}", err);
        assert!(!err.contains("Docker daemon"), "{}", err);
    }
}
