use anyhow::Result;
use std::future::Future;
use std::path::{Path, PathBuf};

use super::ContainerRuntime;
use crate::config::launch::LaunchConfig;
use crate::error::LaunchError;

/// A runtime that passed preflight, ready to launch with.
pub struct Ready<R> {
    /// Resolved path of the runtime binary
    pub runtime_path: PathBuf,
    pub runtime: R,
}

/// Find the runtime binary on PATH.
pub fn locate_runtime(name: &str) -> Option<PathBuf> {
    match which::which(name) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::debug!("'{}' not found on PATH: {}", name, e);
            None
        }
    }
}

/// Check the runtime binary, then the daemon, then the image. Stops at the
/// first failure; later checks never run.
pub async fn check<R, L, C, Fut>(
    config: &LaunchConfig,
    project_dir: &Path,
    locate: L,
    connect: C,
) -> Result<Ready<R>, LaunchError>
where
    R: ContainerRuntime,
    L: FnOnce(&str) -> Option<PathBuf>,
    C: FnOnce() -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let runtime_path = locate(&config.runtime).ok_or_else(|| {
        LaunchError::Environment(format!(
            "Container runtime '{}' not found on PATH",
            config.runtime
        ))
    })?;
    tracing::debug!("Using runtime at {}", runtime_path.display());

    let runtime = connect()
        .await
        .map_err(|e| LaunchError::Environment(format!("{:#}", e)))?;

    let present = runtime
        .image_exists(&config.image)
        .await
        .map_err(|e| LaunchError::Environment(format!("{:#}", e)))?;

    if !present {
        return Err(LaunchError::ImageNotFound {
            image: config.image.clone(),
            build_hint: config.build_hint(project_dir),
        });
    }

    Ok(Ready {
        runtime_path,
        runtime,
    })
}
