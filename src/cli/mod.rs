//! Command-line interface for basetest.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
