//! Container engine access layer.
//!
//! A single `EngineClient` is acquired once per batch and shared by
//! reference across every stage. Connection failure is the one fault that
//! aborts a batch before any profile runs.

pub mod client;

pub use client::{EngineClient, LogStream};
