//! Best-effort removal of pipeline artifacts.
//!
//! Every operation is idempotent: a missing target is logged at debug and
//! swallowed, any other fault is logged at warn and swallowed. Cleanup is
//! advisory and never feeds back into a pipeline's success or failure.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::engine::EngineClient;
use crate::error::EngineError;

/// Removes descriptor files, images and containers left behind by a run.
pub struct Reaper<'a> {
    client: &'a EngineClient,
}

impl<'a> Reaper<'a> {
    pub fn new(client: &'a EngineClient) -> Self {
        Self { client }
    }

    /// Deletes a descriptor file. Missing files are fine.
    pub async fn remove_descriptor(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => info!(path = %path.display(), "descriptor removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "descriptor already gone");
            }
            Err(e) => warn!(path = %path.display(), "failed to remove descriptor: {e}"),
        }
    }

    /// Force-removes an image by tag. Missing images are fine.
    pub async fn remove_image(&self, tag: &str) {
        match self.client.remove_image(tag).await {
            Ok(()) => info!(tag, "image removed"),
            Err(EngineError::ImageNotFound { .. }) => debug!(tag, "image already gone"),
            Err(e) => warn!(tag, "failed to remove image: {e}"),
        }
    }

    /// Removes a container by name or id.
    ///
    /// Container names are not stable identifiers across engine versions, so
    /// the target is resolved against the live container list, matching
    /// either the name or an id prefix.
    pub async fn remove_container(&self, name_or_id: &str) {
        let id = match self.resolve_container(name_or_id).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!(target = name_or_id, "container already gone");
                return;
            }
            Err(e) => {
                warn!(target = name_or_id, "failed to resolve container: {e}");
                return;
            }
        };

        match self.client.remove_container(&id).await {
            Ok(()) => info!(target = name_or_id, "container removed"),
            Err(EngineError::ContainerNotFound { .. }) => {
                debug!(target = name_or_id, "container already gone");
            }
            Err(e) => warn!(target = name_or_id, "failed to remove container: {e}"),
        }
    }

    /// Prunes dangling images. A reclamation hint, not a correctness
    /// requirement; every engine error is swallowed.
    pub async fn prune_dangling_images(&self) {
        if let Err(e) = self.client.prune_dangling_images().await {
            debug!("dangling image prune skipped: {e}");
        }
    }

    async fn resolve_container(&self, name_or_id: &str) -> Result<Option<String>, EngineError> {
        let containers = self.client.list_containers().await?;

        for container in containers {
            let by_name = container.names.as_deref().is_some_and(|names| {
                names
                    .iter()
                    .any(|n| n.trim_start_matches('/') == name_or_id)
            });
            let by_id = container
                .id
                .as_deref()
                .is_some_and(|id| id.starts_with(name_or_id));

            if by_name || by_id {
                return Ok(container.id);
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::Docker;

    fn offline_reaper_client() -> EngineClient {
        // Connects lazily; no daemon calls happen for descriptor removal.
        EngineClient::from_docker(Docker::connect_with_local_defaults().unwrap())
    }

    #[tokio::test]
    async fn test_remove_descriptor_is_idempotent() {
        let client = offline_reaper_client();
        let reaper = Reaper::new(&client);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile.test");
        std::fs::write(&path, "FROM alpine\n").unwrap();

        reaper.remove_descriptor(&path).await;
        assert!(!path.exists());

        // Second removal of the same target must not error.
        reaper.remove_descriptor(&path).await;
    }

    #[tokio::test]
    async fn test_remove_descriptor_missing_file_is_silent() {
        let client = offline_reaper_client();
        let reaper = Reaper::new(&client);
        reaper
            .remove_descriptor(Path::new("/nonexistent/Dockerfile.ghost"))
            .await;
    }
}
