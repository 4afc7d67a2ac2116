//! Result records produced by the per-profile pipeline.
//!
//! A `PipelineResult` starts empty, is filled in by each stage as it runs,
//! and becomes read-only once handed back to the batch runner. Partial
//! population is a documented state: a build failure leaves the descriptor
//! populated and the image and container absent.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::StageError;

/// A synthesized build descriptor written to disk.
#[derive(Debug, Clone, Serialize)]
pub struct BuildDescriptor {
    /// Rendered Dockerfile text.
    pub content: String,
    /// Absolute path the descriptor was written to.
    pub path: String,
}

/// Metadata of a successfully built image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    pub tag: String,
    pub architecture: String,
    pub os: String,
    pub size_bytes: i64,
    pub labels: HashMap<String, String>,
}

/// Record of a completed container run.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    /// Command line as stored in the container's config.
    pub command: Vec<String>,
    pub stdout: String,
    pub stderr: String,
}

/// Aggregated outcome of one profile's pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub profile_tag: String,
    pub descriptor: Option<BuildDescriptor>,
    pub image: Option<ImageRecord>,
    pub container: Option<ContainerRecord>,
    pub error: Option<StageError>,
}

impl PipelineResult {
    /// Empty result for a profile about to run.
    pub fn new(profile_tag: impl Into<String>) -> Self {
        Self {
            profile_tag: profile_tag.into(),
            descriptor: None,
            image: None,
            container: None,
            error: None,
        }
    }

    /// True when every stage completed and no error was recorded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
            && self.descriptor.is_some()
            && self.image.is_some()
            && self.container.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageErrorKind;

    #[test]
    fn test_new_result_is_empty() {
        let result = PipelineResult::new("py312");
        assert_eq!(result.profile_tag, "py312");
        assert!(result.descriptor.is_none());
        assert!(result.image.is_none());
        assert!(result.container.is_none());
        assert!(result.error.is_none());
        assert!(!result.is_success());
    }

    #[test]
    fn test_partial_result_is_not_success() {
        let mut result = PipelineResult::new("py312");
        result.descriptor = Some(BuildDescriptor {
            content: "FROM python:3.12-slim\n".to_string(),
            path: "/tmp/Dockerfile.py312".to_string(),
        });
        result.error = Some(StageError::Build {
            message: "no such base image".to_string(),
            build_log: None,
        });

        assert!(!result.is_success());
        assert_eq!(
            result.error.as_ref().unwrap().kind(),
            StageErrorKind::BuildFailure
        );
    }

    #[test]
    fn test_serializes_partial_population() {
        let mut result = PipelineResult::new("py312");
        result.error = Some(StageError::Generation {
            message: "permission denied".to_string(),
        });

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["profile_tag"], "py312");
        assert!(json["descriptor"].is_null());
        assert_eq!(json["error"]["kind"], "generation_error");
    }
}
