pub mod client;
pub mod command;
pub mod preflight;

use anyhow::Result;
use async_trait::async_trait;

/// The container runtime operations a launch needs besides the final `run`.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether `image` is present in the local image store.
    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Force-remove the container called `name`.
    async fn remove_container(&self, name: &str) -> Result<()>;
}

/// Remove a leftover container with the configured name.
///
/// Failures, including "no such container", are logged and ignored so that
/// repeated launches never trip over a previous run.
pub async fn remove_stale_container(runtime: &dyn ContainerRuntime, name: &str) {
    match runtime.remove_container(name).await {
        Ok(()) => tracing::debug!("Removed existing container '{}'", name),
        Err(e) => tracing::debug!("No container '{}' removed: {:#}", name, e),
    }
}
