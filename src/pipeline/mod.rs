//! Per-profile execution pipeline.
//!
//! Each profile moves through a staged state machine:
//!
//! ```text
//! START → GENERATED → BUILT → RAN → DONE
//!            ↘          ↘       ↘
//!                  FAILED(stage)
//! ```
//!
//! `FAILED` is absorbing: once a stage fails, no later stage executes for
//! that profile, and fields populated before the failure stay in the result.

pub mod reaper;
pub mod result;
pub mod runner;
pub mod stages;

pub use reaper::Reaper;
pub use result::{BuildDescriptor, ContainerRecord, ImageRecord, PipelineResult};
pub use runner::{run_batch, run_one, RunOptions};
