//! Stage executors for the per-profile pipeline.
//!
//! Each executor wraps one engine operation, translates engine faults into
//! the pipeline's `StageError` taxonomy, and extracts a normalized record on
//! success. No executor cleans up after itself; artifact removal is always
//! the reaper's job.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::dockerfile::{self, ProjectMarkers};
use crate::engine::{EngineClient, LogStream};
use crate::error::{EngineError, StageError};
use crate::pipeline::result::{BuildDescriptor, ContainerRecord, ImageRecord};

/// Command run inside the container when the profile specifies none.
pub const DEFAULT_COMMAND: &str = "echo \"Container is running\"";

/// Synthesizes the descriptor and writes it under `dir` as
/// `Dockerfile.<image_tag>`.
///
/// The directory is created if missing. Any filesystem fault maps to
/// `StageError::Generation`.
pub async fn generate(
    base_image: &str,
    setup_commands: &[String],
    markers: ProjectMarkers,
    image_tag: &str,
    dir: &Path,
) -> Result<BuildDescriptor, StageError> {
    let content = dockerfile::synthesize(base_image, setup_commands, markers);
    let path = descriptor_path(dir, image_tag).await?;

    tokio::fs::write(&path, &content)
        .await
        .map_err(|e| StageError::Generation {
            message: format!("failed to write {}: {e}", path.display()),
        })?;

    debug!(path = %path.display(), "descriptor generated");
    Ok(BuildDescriptor {
        content,
        path: path.to_string_lossy().into_owned(),
    })
}

async fn descriptor_path(dir: &Path, image_tag: &str) -> Result<PathBuf, StageError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StageError::Generation {
            message: format!("failed to create {}: {e}", dir.display()),
        })?;

    let resolved = tokio::fs::canonicalize(dir)
        .await
        .map_err(|e| StageError::Generation {
            message: format!("failed to resolve {}: {e}", dir.display()),
        })?;

    Ok(resolved.join(dockerfile::descriptor_name(image_tag)))
}

/// Builds the image and reads back its metadata.
///
/// The build call does not return complete metadata, so a follow-up inspect
/// is required. Build-log-bearing failures become `StageError::Build` with
/// the engine's log attached; everything else is an engine availability
/// problem.
pub async fn build(
    client: &EngineClient,
    context_dir: &Path,
    descriptor_name: &str,
    image_tag: &str,
) -> Result<ImageRecord, StageError> {
    info!(tag = image_tag, "building image");

    client
        .build_image(context_dir, descriptor_name, image_tag)
        .await
        .map_err(|e| match e {
            EngineError::BuildFailed { message, build_log } => StageError::Build {
                message,
                build_log: Some(build_log),
            },
            other => engine_unavailable(other),
        })?;

    let inspect = client
        .inspect_image(image_tag)
        .await
        .map_err(engine_unavailable)?;

    let labels = inspect
        .config
        .as_ref()
        .and_then(|c| c.labels.clone())
        .unwrap_or_default();

    Ok(ImageRecord {
        tag: image_tag.to_string(),
        architecture: inspect.architecture.unwrap_or_default(),
        os: inspect.os.unwrap_or_default(),
        size_bytes: inspect.size.unwrap_or(0),
        labels,
    })
}

/// Runs the verification command in a detached container and waits for it.
///
/// The wait is the pipeline's one blocking point; `deadline` bounds it.
/// Stdout and stderr are fetched as separate streams after the wait, and the
/// recorded command line comes from the container's stored config. On a wait
/// failure the container is left in place for the reaper.
pub async fn run(
    client: &EngineClient,
    image_tag: &str,
    command: Option<&str>,
    container_name: &str,
    deadline: Option<Duration>,
) -> Result<ContainerRecord, StageError> {
    let command = shell_command(command);
    info!(tag = image_tag, name = container_name, "running container");

    let id = client
        .run_container(image_tag, container_name, &command)
        .await
        .map_err(execution_fault)?;

    let status = client
        .wait_container(&id, deadline)
        .await
        .map_err(execution_fault)?;

    if status != 0 {
        let raw_log = client.container_logs(&id, LogStream::Stderr).await.ok();
        return Err(StageError::Execution {
            message: format!("container exited with status {status}"),
            raw_log,
        });
    }

    let stdout = client
        .container_logs(&id, LogStream::Stdout)
        .await
        .map_err(execution_fault)?;
    let stderr = client
        .container_logs(&id, LogStream::Stderr)
        .await
        .map_err(execution_fault)?;

    let inspect = client.inspect_container(&id).await.map_err(execution_fault)?;
    let recorded_command = inspect
        .config
        .and_then(|c| c.cmd)
        .unwrap_or_else(|| command.clone());

    Ok(ContainerRecord {
        id,
        name: container_name.to_string(),
        command: recorded_command,
        stdout,
        stderr,
    })
}

/// Expands an optional command string into an exec vector.
fn shell_command(command: Option<&str>) -> Vec<String> {
    let command = match command {
        Some(c) if !c.trim().is_empty() => c,
        _ => DEFAULT_COMMAND,
    };
    vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()]
}

fn engine_unavailable(err: EngineError) -> StageError {
    StageError::EngineUnavailable {
        message: err.to_string(),
    }
}

/// Maps run-stage engine faults: missing images and command faults are
/// execution errors, timeouts keep their deadline, transport faults mean the
/// engine itself is unreachable.
fn execution_fault(err: EngineError) -> StageError {
    match err {
        EngineError::Timeout { seconds } => StageError::Timeout { seconds },
        EngineError::ImageNotFound { tag } => StageError::Execution {
            message: format!("image '{tag}' not found"),
            raw_log: None,
        },
        EngineError::RunFailed(message) | EngineError::BuildFailed { message, .. } => {
            StageError::Execution {
                message,
                raw_log: None,
            }
        }
        EngineError::ContainerNotFound { id } => StageError::Execution {
            message: format!("container '{id}' disappeared"),
            raw_log: None,
        },
        other => engine_unavailable(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageErrorKind;

    #[tokio::test]
    async fn test_generate_writes_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = generate(
            "debian:bookworm-slim",
            &["apt-get update".to_string()],
            ProjectMarkers::default(),
            "bookworm",
            dir.path(),
        )
        .await
        .unwrap();

        assert!(descriptor.path.ends_with("Dockerfile.bookworm"));
        let on_disk = std::fs::read_to_string(&descriptor.path).unwrap();
        assert_eq!(on_disk, descriptor.content);
        assert!(on_disk.contains("FROM debian:bookworm-slim"));
        assert!(on_disk.contains("RUN apt-get update"));
    }

    #[tokio::test]
    async fn test_generate_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out/dockerfiles");
        let descriptor = generate(
            "alpine:latest",
            &[],
            ProjectMarkers::default(),
            "alpine",
            &nested,
        )
        .await
        .unwrap();

        assert!(Path::new(&descriptor.path).is_file());
    }

    #[tokio::test]
    async fn test_generate_unwritable_dir_is_generation_error() {
        let err = generate(
            "alpine:latest",
            &[],
            ProjectMarkers::default(),
            "alpine",
            Path::new("/proc/basetest-denied"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), StageErrorKind::GenerationError);
    }

    #[test]
    fn test_shell_command_defaults_to_diagnostic_echo() {
        let cmd = shell_command(None);
        assert_eq!(cmd[0], "/bin/sh");
        assert_eq!(cmd[1], "-c");
        assert_eq!(cmd[2], DEFAULT_COMMAND);

        assert_eq!(shell_command(Some("  "))[2], DEFAULT_COMMAND);
        assert_eq!(shell_command(Some("uname -a"))[2], "uname -a");
    }

    #[test]
    fn test_execution_fault_classification() {
        let timeout = execution_fault(EngineError::Timeout { seconds: 60 });
        assert!(matches!(timeout, StageError::Timeout { seconds: 60 }));
        assert_eq!(timeout.kind(), StageErrorKind::ExecutionError);

        let missing = execution_fault(EngineError::ImageNotFound {
            tag: "ghost".to_string(),
        });
        assert_eq!(missing.kind(), StageErrorKind::ExecutionError);

        let transport = execution_fault(EngineError::Api("socket closed".to_string()));
        assert_eq!(transport.kind(), StageErrorKind::EngineUnavailable);
    }

    #[test]
    fn test_engine_unavailable_keeps_message() {
        let err = engine_unavailable(EngineError::DaemonUnavailable("no socket".to_string()));
        assert!(err.to_string().contains("no socket"));
        assert_eq!(err.kind(), StageErrorKind::EngineUnavailable);
    }
}
