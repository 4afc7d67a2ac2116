//! Deterministic, collision-resistant resource naming.
//!
//! Image tags are a pure function of the profile so repeated runs reuse the
//! same image. Container names get a per-call suffix so repeated runs of the
//! same profile never collide; the suffix source is injectable so tests can
//! assert collision-freedom without a real clock.

use chrono::Utc;

/// Source of container-name suffixes.
pub trait SuffixSource: Send {
    /// Returns a suffix distinct from every previous call on this source.
    fn next_suffix(&mut self) -> String;
}

/// Default source: UTC unix timestamp plus an in-process counter.
///
/// The counter keeps same-second calls distinct; the timestamp keeps
/// separate invocations of the binary distinct.
#[derive(Debug, Default)]
pub struct TimestampSuffix {
    counter: u64,
}

impl SuffixSource for TimestampSuffix {
    fn next_suffix(&mut self) -> String {
        self.counter += 1;
        format!("{}-{}", Utc::now().timestamp(), self.counter)
    }
}

/// Source backed by random UUIDs, for callers that may race across processes.
#[derive(Debug, Default)]
pub struct UuidSuffix;

impl SuffixSource for UuidSuffix {
    fn next_suffix(&mut self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Derives engine-side resource names from profile data.
pub struct ResourceNamer {
    suffixes: Box<dyn SuffixSource>,
}

impl ResourceNamer {
    pub fn new() -> Self {
        Self::with_source(Box::new(TimestampSuffix::default()))
    }

    pub fn with_source(suffixes: Box<dyn SuffixSource>) -> Self {
        Self { suffixes }
    }

    /// Image tag for a profile: the profile tag if already set, otherwise the
    /// base image name reduced to lowercase alphanumerics. Stable across calls.
    pub fn image_tag_for(&self, tag: &str, base_image: &str) -> String {
        if !tag.is_empty() {
            return sanitize(tag);
        }
        sanitize(base_image)
    }

    /// Container name for an image tag; unique per call.
    pub fn container_name_for(&mut self, image_tag: &str) -> String {
        format!("basetest_{image_tag}_{}", self.suffixes.next_suffix())
    }
}

impl Default for ResourceNamer {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduces a name to lowercase ASCII alphanumerics.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSuffix {
        values: Vec<String>,
    }

    impl SuffixSource for FixedSuffix {
        fn next_suffix(&mut self) -> String {
            self.values.remove(0)
        }
    }

    #[test]
    fn test_sanitize_strips_non_alphanumerics() {
        assert_eq!(sanitize("debian:bookworm-slim"), "debianbookwormslim");
        assert_eq!(sanitize("Python:3.12"), "python312");
        assert_eq!(sanitize("ubuntu2204"), "ubuntu2204");
    }

    #[test]
    fn test_image_tag_stable_across_calls() {
        let namer = ResourceNamer::new();
        let a = namer.image_tag_for("py312", "python:3.12-slim");
        let b = namer.image_tag_for("py312", "python:3.12-slim");
        assert_eq!(a, b);
        assert_eq!(a, "py312");
    }

    #[test]
    fn test_image_tag_derived_from_base_when_tag_empty() {
        let namer = ResourceNamer::new();
        assert_eq!(namer.image_tag_for("", "ubuntu:20.04"), "ubuntu2004");
    }

    #[test]
    fn test_container_names_never_collide() {
        let source = FixedSuffix {
            values: vec!["100-1".to_string(), "100-2".to_string()],
        };
        let mut namer = ResourceNamer::with_source(Box::new(source));
        let first = namer.container_name_for("py312");
        let second = namer.container_name_for("py312");
        assert_ne!(first, second);
        assert_eq!(first, "basetest_py312_100-1");
        assert_eq!(second, "basetest_py312_100-2");
    }

    #[test]
    fn test_timestamp_suffix_distinct_within_same_second() {
        let mut source = TimestampSuffix::default();
        assert_ne!(source.next_suffix(), source.next_suffix());
    }

    #[test]
    fn test_uuid_suffix_distinct() {
        let mut source = UuidSuffix;
        assert_ne!(source.next_suffix(), source.next_suffix());
    }
}
