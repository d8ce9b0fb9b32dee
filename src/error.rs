use thiserror::Error;

/// Failures that stop a launch before the container is started.
///
/// Every variant is terminal: the launcher reports it and exits with status 1.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// No usable container runtime on this host.
    #[error("{0}")]
    Environment(String),

    /// The configured image is missing from the local image store.
    #[error("Image '{image}' not found locally")]
    ImageNotFound { image: String, build_hint: String },

    #[error("Invalid run mode '{0}'. Expected 'interactive' or 'benchmark'")]
    InvalidRunMode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl LaunchError {
    /// Remediation shown under the error line, if there is one.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Environment(_) => {
                Some("Install Docker or Podman and make sure its API socket is reachable (see --socket).".to_string())
            }
            Self::ImageNotFound { build_hint, .. } => {
                Some(format!("Build it first with:\n  {}", build_hint))
            }
            Self::InvalidRunMode(_) | Self::Config(_) => None,
        }
    }
}
