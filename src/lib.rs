//! basetest: build and run a project across a matrix of base OS images.
//!
//! For each configured profile this library synthesizes a Dockerfile, builds
//! an image, executes a verification command inside a container and produces
//! a structured result. Failures are isolated per profile; only a dead
//! engine connection aborts a batch.

pub mod cli;
pub mod config;
pub mod dockerfile;
pub mod engine;
pub mod error;
pub mod naming;
pub mod pipeline;

// Re-export commonly used types
pub use error::{EngineError, StageError, StageErrorKind};
pub use pipeline::{run_batch, run_one, PipelineResult, RunOptions};
