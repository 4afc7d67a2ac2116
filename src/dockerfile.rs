//! Dockerfile synthesis for matrix profiles.
//!
//! The synthesizer is a pure function: the filesystem probe for project
//! markers happens in the caller and is passed in as plain booleans, so the
//! same inputs always render the same text.

use std::path::Path;

/// Image providing the uv binaries copied into every build.
const UV_IMAGE: &str = "ghcr.io/astral-sh/uv:latest";

/// Working directory used inside every generated image.
const WORKDIR: &str = "/app";

/// Presence of dependency manifests in the project being tested.
///
/// Detected once per run by the caller; the synthesizer never touches the
/// filesystem itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectMarkers {
    /// A `pyproject.toml` exists at the project root.
    pub has_manifest: bool,
    /// A `uv.lock` exists at the project root.
    pub has_lockfile: bool,
}

impl ProjectMarkers {
    /// Probes `dir` for the dependency manifest and lockfile.
    pub fn detect(dir: &Path) -> Self {
        Self {
            has_manifest: dir.join("pyproject.toml").is_file(),
            has_lockfile: dir.join("uv.lock").is_file(),
        }
    }
}

/// Renders the Dockerfile content for one profile.
///
/// Line order is fixed: base image, toolchain bootstrap, working directory,
/// dependency copies for whichever markers are present, project copy,
/// dependency sync, then one `RUN` per setup command in input order.
pub fn synthesize(base_image: &str, setup_commands: &[String], markers: ProjectMarkers) -> String {
    let mut lines = Vec::new();

    lines.push(format!("FROM {base_image}"));
    lines.push(String::new());

    lines.push(format!("COPY --from={UV_IMAGE} /uv /uvx /bin/"));
    lines.push(format!("WORKDIR {WORKDIR}"));
    lines.push(String::new());

    if markers.has_manifest {
        lines.push(format!("COPY pyproject.toml {WORKDIR}/pyproject.toml"));
    }
    if markers.has_lockfile {
        lines.push(format!("COPY uv.lock {WORKDIR}/uv.lock"));
    }
    if !markers.has_manifest && !markers.has_lockfile {
        lines.push("# no dependency manifest detected".to_string());
    }
    lines.push(String::new());

    lines.push("ENV UV_LINK_MODE=copy".to_string());
    lines.push(format!("ADD . {WORKDIR}"));
    lines.push(String::new());

    if markers.has_lockfile {
        lines.push("RUN uv sync --locked".to_string());
    } else if markers.has_manifest {
        lines.push("RUN uv sync".to_string());
    }

    for cmd in setup_commands {
        lines.push(format!("RUN {cmd}"));
    }

    let mut content = lines.join("\n");
    content.push('\n');
    content
}

/// Descriptor filename for a tag, `Dockerfile.<tag>`.
pub fn descriptor_name(tag: &str) -> String {
    format!("Dockerfile.{tag}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_index(content: &str, needle: &str) -> usize {
        content
            .lines()
            .position(|l| l == needle)
            .unwrap_or_else(|| panic!("line not found: {needle}"))
    }

    #[test]
    fn test_synthesize_base_and_commands_in_order() {
        let content = synthesize(
            "debian:bookworm-slim",
            &["apt-get update".to_string()],
            ProjectMarkers::default(),
        );

        let from = line_index(&content, "FROM debian:bookworm-slim");
        let run = line_index(&content, "RUN apt-get update");
        assert!(from < run);
    }

    #[test]
    fn test_synthesize_is_deterministic() {
        let commands = vec!["apt-get update".to_string(), "apt-get install -y curl".to_string()];
        let markers = ProjectMarkers {
            has_manifest: true,
            has_lockfile: true,
        };
        let a = synthesize("ubuntu:22.04", &commands, markers);
        let b = synthesize("ubuntu:22.04", &commands, markers);
        assert_eq!(a, b);
    }

    #[test]
    fn test_setup_commands_preserve_input_order() {
        let commands = vec!["first".to_string(), "second".to_string()];
        let content = synthesize("alpine:latest", &commands, ProjectMarkers::default());
        assert!(line_index(&content, "RUN first") < line_index(&content, "RUN second"));
    }

    #[test]
    fn test_marker_lines_only_when_present() {
        let none = synthesize("alpine:latest", &[], ProjectMarkers::default());
        assert!(!none.contains("COPY pyproject.toml"));
        assert!(!none.contains("COPY uv.lock"));
        assert!(!none.contains("RUN uv sync"));
        assert!(none.contains("# no dependency manifest detected"));

        let manifest_only = synthesize(
            "alpine:latest",
            &[],
            ProjectMarkers {
                has_manifest: true,
                has_lockfile: false,
            },
        );
        assert!(manifest_only.contains("COPY pyproject.toml /app/pyproject.toml"));
        assert!(manifest_only.contains("RUN uv sync"));
        assert!(!manifest_only.contains("--locked"));

        let locked = synthesize(
            "alpine:latest",
            &[],
            ProjectMarkers {
                has_manifest: true,
                has_lockfile: true,
            },
        );
        assert!(locked.contains("COPY uv.lock /app/uv.lock"));
        assert!(locked.contains("RUN uv sync --locked"));
    }

    #[test]
    fn test_detect_markers() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ProjectMarkers::detect(dir.path()), ProjectMarkers::default());

        std::fs::write(dir.path().join("pyproject.toml"), "[project]\n").unwrap();
        let markers = ProjectMarkers::detect(dir.path());
        assert!(markers.has_manifest);
        assert!(!markers.has_lockfile);
    }

    #[test]
    fn test_descriptor_name() {
        assert_eq!(descriptor_name("ubuntu22"), "Dockerfile.ubuntu22");
    }
}
