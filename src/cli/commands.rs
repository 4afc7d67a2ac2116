//! CLI command definitions for basetest.
//!
//! One command: test a single base image, or the whole configured matrix
//! with `all`. Results are printed as JSON; everything human-oriented goes
//! through tracing on stderr.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use regex::Regex;

use crate::config::{self, Profile};
use crate::engine::EngineClient;
use crate::naming::{self, ResourceNamer};
use crate::pipeline::{self, RunOptions};

/// Build and run a project across a matrix of base OS container images.
#[derive(Parser)]
#[command(name = "basetest")]
#[command(about = "Build and run a project across a matrix of base OS images")]
#[command(version)]
#[command(
    long_about = "basetest synthesizes a Dockerfile per profile, builds the image, runs a \
verification command inside a container and reports one JSON result per profile.\n\n\
Example usage:\n  basetest ubuntu:22.04 --command \"uname -a\" --clean\n  basetest all --pretty"
)]
pub struct Cli {
    /// Base image to test (e.g. 'ubuntu:22.04'), or 'all' for the configured matrix.
    #[arg(default_value = "all")]
    pub os_name: String,

    /// Custom name for the generated Dockerfile and image (letters and digits only).
    #[arg(long, default_value = "")]
    pub name: String,

    /// Directory for generated Dockerfiles; also used as the build context.
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Shell command to execute inside each container.
    #[arg(long)]
    pub command: Option<String>,

    /// Remove descriptor, image and container after each run.
    #[arg(long)]
    pub clean: bool,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pub pretty: bool,

    /// Container wait deadline in seconds; 0 disables the deadline.
    #[arg(long, default_value_t = 600)]
    pub timeout: u64,

    /// Profile file (YAML); defaults to ./basetest.yaml, then the built-in matrix.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", env = "BASETEST_LOG")]
    pub log_level: String,
}

/// Parses CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Runs the CLI with pre-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if cli.os_name.trim().is_empty() {
        bail!("the OS_NAME argument cannot be empty");
    }

    let opts = RunOptions {
        command: cli.command.clone(),
        clean: cli.clean,
        descriptor_dir: cli.path.clone(),
        timeout: match cli.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        },
    };

    // A dead daemon is fatal before any profile is attempted.
    let client = EngineClient::connect()
        .await
        .context("Docker is not running. Please start the Docker daemon and try again")?;

    let output = if cli.os_name.eq_ignore_ascii_case("all") {
        let profiles = config::resolve_profiles(cli.config.as_deref())?;
        let results = pipeline::run_batch(&client, &profiles, &opts).await;
        serde_json::to_value(&results)?
    } else {
        let profile = single_profile(&cli.os_name, &cli.name)?;
        let mut namer = ResourceNamer::new();
        let result = pipeline::run_one(&client, &profile, &mut namer, &opts).await;
        serde_json::to_value(&result)?
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");

    Ok(())
}

/// Builds the ad-hoc profile for a single base image.
///
/// When no name is given it is derived by sanitizing the image name; either
/// way the final name must be purely alphanumeric.
fn single_profile(os_name: &str, name: &str) -> anyhow::Result<Profile> {
    let name = if name.is_empty() {
        naming::sanitize(os_name)
    } else {
        name.to_string()
    };

    let valid = Regex::new(r"^[a-zA-Z0-9]+$").expect("static pattern");
    if !valid.is_match(&name) {
        bail!("invalid name '{name}': must contain only letters and digits");
    }

    Ok(Profile::ad_hoc(name, os_name))
}
