//! Docker API wrapper using the bollard crate.
//!
//! One connection handle serves the whole batch; every build, run, log and
//! remove operation flows through it. Methods translate bollard faults into
//! `EngineError` so the pipeline stages never see transport details.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::{BuildImageOptions, PruneImagesOptions, RemoveImageOptions};
use bollard::models::{ContainerInspectResponse, ContainerSummary, ImageInspect};
use bollard::Docker;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::StreamExt;
use tracing::debug;

use crate::error::EngineError;

/// Which log stream to fetch from a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Connection handle to the local Docker daemon.
pub struct EngineClient {
    docker: Docker,
}

impl EngineClient {
    /// Connects to the local daemon and verifies it responds to a ping.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::DaemonUnavailable` if the daemon cannot be
    /// reached. Callers treat this as fatal for the whole batch.
    pub async fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::DaemonUnavailable(format!("failed to connect: {e}")))?;

        docker
            .ping()
            .await
            .map_err(|e| EngineError::DaemonUnavailable(format!("daemon did not respond: {e}")))?;

        Ok(Self { docker })
    }

    /// Wraps an existing bollard handle.
    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }

    /// Builds an image from a descriptor inside `context_dir`.
    ///
    /// The context directory is shipped to the daemon as a gzipped tar.
    /// Intermediate containers are removed whether or not the build succeeds.
    ///
    /// # Returns
    ///
    /// The accumulated build log on success.
    pub async fn build_image(
        &self,
        context_dir: &Path,
        descriptor_name: &str,
        tag: &str,
    ) -> Result<String, EngineError> {
        let context = tar_context(context_dir)?;

        let options = BuildImageOptions {
            dockerfile: descriptor_name.to_string(),
            t: tag.to_string(),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let mut stream = self.docker.build_image(options, None, Some(context.into()));
        let mut log = String::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(info) => {
                    if let Some(line) = info.stream {
                        log.push_str(&line);
                    }
                    if let Some(error) = info.error {
                        return Err(EngineError::BuildFailed {
                            message: error,
                            build_log: log,
                        });
                    }
                }
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: _,
                    message,
                }) => {
                    return Err(EngineError::BuildFailed {
                        message,
                        build_log: log,
                    });
                }
                Err(e) => return Err(EngineError::Api(format!("build stream failed: {e}"))),
            }
        }

        Ok(log)
    }

    /// Reads back full image metadata for a tag.
    pub async fn inspect_image(&self, tag: &str) -> Result<ImageInspect, EngineError> {
        self.docker.inspect_image(tag).await.map_err(|e| match e {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => EngineError::ImageNotFound {
                tag: tag.to_string(),
            },
            other => EngineError::Api(format!("failed to inspect image: {other}")),
        })
    }

    /// Creates and starts a detached container.
    ///
    /// The tty is left off so stdout and stderr stay separate streams.
    ///
    /// # Returns
    ///
    /// The container id.
    pub async fn run_container(
        &self,
        image_tag: &str,
        name: &str,
        command: &[String],
    ) -> Result<String, EngineError> {
        let config = Config {
            image: Some(image_tag.to_string()),
            cmd: Some(command.to_vec()),
            tty: Some(false),
            attach_stdin: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => EngineError::ImageNotFound {
                    tag: image_tag.to_string(),
                },
                other => EngineError::RunFailed(format!("failed to create container: {other}")),
            })?;

        self.docker
            .start_container(&response.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| EngineError::RunFailed(format!("failed to start container: {e}")))?;

        Ok(response.id)
    }

    /// Waits for a container to stop running.
    ///
    /// This is the pipeline's one blocking point. With a deadline the wait is
    /// cooperatively cancelled and `EngineError::Timeout` returned; the
    /// container itself is left in place for the reaper.
    ///
    /// # Returns
    ///
    /// The container's exit status.
    pub async fn wait_container(
        &self,
        id: &str,
        deadline: Option<Duration>,
    ) -> Result<i64, EngineError> {
        let wait = self.wait_inner(id);

        match deadline {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| EngineError::Timeout {
                    seconds: limit.as_secs(),
                })?,
            None => wait.await,
        }
    }

    async fn wait_inner(&self, id: &str) -> Result<i64, EngineError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = self.docker.wait_container(id, Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // A non-zero exit arrives as a wait error carrying the code.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(EngineError::RunFailed(format!(
                "error waiting for container: {e}"
            ))),
            None => Err(EngineError::RunFailed(
                "container wait stream ended without a status".to_string(),
            )),
        }
    }

    /// Fetches one log stream of a stopped container.
    pub async fn container_logs(&self, id: &str, stream: LogStream) -> Result<String, EngineError> {
        let options = LogsOptions::<String> {
            stdout: stream == LogStream::Stdout,
            stderr: stream == LogStream::Stderr,
            follow: false,
            timestamps: false,
            ..Default::default()
        };

        let mut logs = self.docker.logs(id, Some(options));
        let mut output = String::new();

        while let Some(chunk) = logs.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                    output.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => return Err(EngineError::Api(format!("error reading logs: {e}"))),
            }
        }

        Ok(output)
    }

    /// Reads back a container's stored configuration.
    pub async fn inspect_container(
        &self,
        id: &str,
    ) -> Result<ContainerInspectResponse, EngineError> {
        self.docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => EngineError::ContainerNotFound { id: id.to_string() },
                other => EngineError::Api(format!("failed to inspect container: {other}")),
            })
    }

    /// Lists all containers, running or not.
    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>, EngineError> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        self.docker
            .list_containers(Some(options))
            .await
            .map_err(|e| EngineError::Api(format!("failed to list containers: {e}")))
    }

    /// Force-removes an image by tag.
    pub async fn remove_image(&self, tag: &str) -> Result<(), EngineError> {
        let options = RemoveImageOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_image(tag, Some(options), None)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => EngineError::ImageNotFound {
                    tag: tag.to_string(),
                },
                other => EngineError::Api(format!("failed to remove image: {other}")),
            })?;

        Ok(())
    }

    /// Force-removes a container by id.
    pub async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };

        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => EngineError::ContainerNotFound { id: id.to_string() },
                other => EngineError::Api(format!("failed to remove container: {other}")),
            })?;

        Ok(())
    }

    /// Prunes dangling images. Best-effort reclamation.
    pub async fn prune_dangling_images(&self) -> Result<(), EngineError> {
        let mut filters = HashMap::new();
        filters.insert("dangling", vec!["true"]);

        let response = self
            .docker
            .prune_images(Some(PruneImagesOptions { filters }))
            .await
            .map_err(|e| EngineError::Api(format!("failed to prune images: {e}")))?;

        debug!(
            reclaimed = response.space_reclaimed.unwrap_or(0),
            "pruned dangling images"
        );
        Ok(())
    }
}

/// Packs a build context directory into a gzipped tar.
fn tar_context(dir: &Path) -> Result<Vec<u8>, EngineError> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(".", dir)?;
    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}
