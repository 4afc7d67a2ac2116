//! Error types for basetest operations.
//!
//! Two layers are defined here:
//! - `EngineError`: faults surfaced by the container engine client
//! - `StageError`: the pipeline's error taxonomy, recorded into results

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors surfaced by the container engine client.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Docker daemon not available: {0}")]
    DaemonUnavailable(String),

    #[error("Image build failed: {message}")]
    BuildFailed { message: String, build_log: String },

    #[error("Image '{tag}' not found")]
    ImageNotFound { tag: String },

    #[error("Container '{id}' not found")]
    ContainerNotFound { id: String },

    #[error("Container run failed: {0}")]
    RunFailed(String),

    #[error("Container wait timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Docker API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a stage failure, used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    GenerationError,
    BuildFailure,
    ExecutionError,
    EngineUnavailable,
    NotFound,
}

/// A failure recorded against one pipeline stage.
///
/// Every stage returns this by value; the orchestrator is the only place
/// deciding containment vs. propagation. `Timeout` is reported under the
/// `ExecutionError` kind since callers treat a hung command and a failed
/// command the same way.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error("failed to generate build descriptor: {message}")]
    Generation { message: String },

    #[error("image build failed: {message}")]
    Build {
        message: String,
        build_log: Option<String>,
    },

    #[error("container execution failed: {message}")]
    Execution {
        message: String,
        raw_log: Option<String>,
    },

    #[error("container wait timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("engine unavailable: {message}")]
    EngineUnavailable { message: String },

    #[error("resource not found: {message}")]
    NotFound { message: String },
}

impl StageError {
    /// The report-level kind of this error.
    pub fn kind(&self) -> StageErrorKind {
        match self {
            StageError::Generation { .. } => StageErrorKind::GenerationError,
            StageError::Build { .. } => StageErrorKind::BuildFailure,
            StageError::Execution { .. } | StageError::Timeout { .. } => {
                StageErrorKind::ExecutionError
            }
            StageError::EngineUnavailable { .. } => StageErrorKind::EngineUnavailable,
            StageError::NotFound { .. } => StageErrorKind::NotFound,
        }
    }

    /// Raw engine output attached to this error, if any.
    pub fn raw_log(&self) -> Option<&str> {
        match self {
            StageError::Build { build_log, .. } => build_log.as_deref(),
            StageError::Execution { raw_log, .. } => raw_log.as_deref(),
            _ => None,
        }
    }
}

impl Serialize for StageError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("StageError", 3)?;
        s.serialize_field("kind", &self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.serialize_field("raw_log", &self.raw_log())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_reports_execution_kind() {
        let err = StageError::Timeout { seconds: 30 };
        assert_eq!(err.kind(), StageErrorKind::ExecutionError);
        assert!(err.raw_log().is_none());
    }

    #[test]
    fn test_build_error_carries_log() {
        let err = StageError::Build {
            message: "step 3 failed".to_string(),
            build_log: Some("Step 3/4 : RUN false".to_string()),
        };
        assert_eq!(err.kind(), StageErrorKind::BuildFailure);
        assert_eq!(err.raw_log(), Some("Step 3/4 : RUN false"));
    }

    #[test]
    fn test_serialized_shape() {
        let err = StageError::Execution {
            message: "exit code 2".to_string(),
            raw_log: Some("boom".to_string()),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "execution_error");
        assert_eq!(json["raw_log"], "boom");
        assert!(json["message"].as_str().unwrap().contains("exit code 2"));
    }
}
