//! Profile configuration for the image matrix.
//!
//! A profile pairs a base OS image with the setup commands needed to make it
//! usable for the project under test. The built-in matrix mirrors the images
//! we care about by default; a YAML file can replace it entirely.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default YAML file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "basetest.yaml";

/// Package manager available in a base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Dnf,
    Apk,
}

/// One configured base-image test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Identifier used for the image tag and descriptor filename.
    pub tag: String,
    /// Base OS image to build from (e.g. `debian:bookworm-slim`).
    pub base_image: String,
    /// Shell commands run as image build steps, in order.
    #[serde(default)]
    pub setup_commands: Vec<String>,
    /// Package manager shipped by the base image, when known.
    #[serde(default)]
    pub package_manager: Option<PackageManager>,
}

impl Profile {
    /// Ad-hoc profile for a single base image with no setup commands.
    pub fn ad_hoc(tag: impl Into<String>, base_image: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            base_image: base_image.into(),
            setup_commands: Vec::new(),
            package_manager: None,
        }
    }
}

/// On-disk shape of the profile override file.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    profiles: Vec<Profile>,
}

const CMD_CERTIFICATES: &str = "apt-get update && apt-get install -y ca-certificates";

/// The built-in profile matrix.
pub fn default_profiles() -> Vec<Profile> {
    fn profile(tag: &str, base: &str, commands: &[&str], pkg: PackageManager) -> Profile {
        Profile {
            tag: tag.to_string(),
            base_image: base.to_string(),
            setup_commands: commands.iter().map(|c| c.to_string()).collect(),
            package_manager: Some(pkg),
        }
    }

    use PackageManager::*;
    vec![
        profile("py312trixie", "python:3.12-slim-trixie", &[], Apt),
        profile("py311slim", "python:3.11-slim", &[], Apt),
        profile("py310slim", "python:3.10-slim", &[], Apt),
        profile("debianbookworm", "debian:bookworm-slim", &[CMD_CERTIFICATES], Apt),
        profile("debianbullseye", "debian:bullseye-slim", &[CMD_CERTIFICATES], Apt),
        profile("ubuntulatest", "ubuntu:latest", &[CMD_CERTIFICATES], Apt),
        profile("ubuntu20", "ubuntu:20.04", &[CMD_CERTIFICATES], Apt),
        profile("ubuntu22", "ubuntu:22.04", &[], Apt),
        profile("fedoralatest", "fedora:latest", &[], Dnf),
        profile("alpinelatest", "alpine:latest", &[], Apk),
        profile("alpine319", "alpine:3.19", &[], Apk),
        profile("alpine318", "alpine:3.18", &[], Apk),
        profile("alpine317", "alpine:3.17", &[], Apk),
    ]
}

/// Loads profiles from a YAML file.
pub fn load_profiles(path: &Path) -> anyhow::Result<Vec<Profile>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
    let parsed: ConfigFile = serde_yaml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;
    Ok(parsed.profiles)
}

/// Resolves the profile list for a batch run.
///
/// Precedence: explicit `--config` path, then `basetest.yaml` in the working
/// directory, then the built-in matrix.
pub fn resolve_profiles(config_path: Option<&Path>) -> anyhow::Result<Vec<Profile>> {
    if let Some(path) = config_path {
        return load_profiles(path);
    }
    let local = Path::new(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        return load_profiles(local);
    }
    Ok(default_profiles())
}
