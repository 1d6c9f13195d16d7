//! Options for an archive operation.
//!
//! Callers build an [`ArchiveOptions`] and pass it into each operation.
//! Partial settings from a config file are merged over the defaults with
//! [`ArchiveOptions::apply`].

use crate::error::{ArchiveError, ArchiveResult};
use serde::{Deserialize, Serialize};

/// Default segment name prefix.
pub const DEFAULT_PREFIX: &str = "bundle";
/// Default segment budget: 1 GB.
pub const DEFAULT_MAX_SEGMENT_BYTES: u64 = 1_000_000_000;

/// What happens to already produced output when a create operation aborts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Leave closed segments, the abandoned segment and the manifest in place.
    #[default]
    Keep,
    /// Delete every file the aborted operation created.
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveOptions {
    /// Segment file name prefix.
    pub prefix: String,
    /// Budget for the summed entry sizes of one segment.
    pub max_segment_bytes: u64,
    pub on_abort: CleanupPolicy,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            max_segment_bytes: DEFAULT_MAX_SEGMENT_BYTES,
            on_abort: CleanupPolicy::Keep,
        }
    }
}

/// Partial overrides for `ArchiveOptions`, as read from YAML or JSON.
/// Unknown keys are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveOptionsOverrides {
    pub prefix: Option<String>,
    pub max_segment_bytes: Option<u64>,
    pub on_abort: Option<CleanupPolicy>,
}

impl ArchiveOptionsOverrides {
    pub fn from_yaml_str(s: &str) -> ArchiveResult<Self> {
        serde_yaml::from_str(s).map_err(|e| ArchiveError::InvalidOptions {
            reason: e.to_string(),
        })
    }

    pub fn from_json_str(s: &str) -> ArchiveResult<Self> {
        serde_json::from_str(s).map_err(|e| ArchiveError::InvalidOptions {
            reason: e.to_string(),
        })
    }
}

impl ArchiveOptions {
    pub fn new(prefix: impl Into<String>, max_segment_bytes: u64) -> Self {
        Self {
            prefix: prefix.into(),
            max_segment_bytes,
            ..Self::default()
        }
    }

    pub fn with_cleanup(mut self, policy: CleanupPolicy) -> Self {
        self.on_abort = policy;
        self
    }

    /// Apply overrides onto these options. Only `Some` values override.
    pub fn apply(self, overrides: ArchiveOptionsOverrides) -> Self {
        Self {
            prefix: overrides.prefix.unwrap_or(self.prefix),
            max_segment_bytes: overrides
                .max_segment_bytes
                .unwrap_or(self.max_segment_bytes),
            on_abort: overrides.on_abort.unwrap_or(self.on_abort),
        }
    }

    /// Reject options that could not produce well-formed segment names or
    /// would make every entry oversized.
    pub fn validate(&self) -> ArchiveResult<()> {
        if self.max_segment_bytes == 0 {
            return Err(ArchiveError::InvalidOptions {
                reason: "max_segment_bytes must be positive".into(),
            });
        }
        if self.prefix.is_empty() {
            return Err(ArchiveError::InvalidOptions {
                reason: "prefix must not be empty".into(),
            });
        }
        if self.prefix.contains(['/', '\\']) || self.prefix == "." || self.prefix == ".." {
            return Err(ArchiveError::InvalidOptions {
                reason: format!("prefix '{}' must be a plain file name", self.prefix),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ArchiveOptions::default();
        assert_eq!(options.prefix, "bundle");
        assert_eq!(options.max_segment_bytes, 1_000_000_000);
        assert_eq!(options.on_abort, CleanupPolicy::Keep);
        options.validate().unwrap();
    }

    #[test]
    fn overrides_merge_from_yaml() {
        let overrides = ArchiveOptionsOverrides::from_yaml_str(
            "max_segment_bytes: 4096\non_abort: remove\n",
        )
        .unwrap();
        let options = ArchiveOptions::default().apply(overrides);
        assert_eq!(options.max_segment_bytes, 4096);
        assert_eq!(options.on_abort, CleanupPolicy::Remove);
        assert_eq!(options.prefix, "bundle", "default preserved");
    }

    #[test]
    fn overrides_merge_from_json() {
        let overrides = ArchiveOptionsOverrides::from_json_str(r#"{"prefix": "mirror"}"#).unwrap();
        let options = ArchiveOptions::new("bundle", 10).apply(overrides);
        assert_eq!(options.prefix, "mirror");
        assert_eq!(options.max_segment_bytes, 10);
    }

    #[test]
    fn overrides_deny_unknown_fields() {
        let err = ArchiveOptionsOverrides::from_json_str(r#"{"max_segment_bytez": 1}"#)
            .unwrap_err();
        let ArchiveError::InvalidOptions { ref reason } = err else {
            panic!("unexpected error: {err}");
        };
        assert!(reason.contains("unknown"), "unknown field should fail: {err}");
    }

    #[test]
    fn validate_rejects_bad_options() {
        assert!(ArchiveOptions::new("bundle", 0).validate().is_err());
        assert!(ArchiveOptions::new("", 10).validate().is_err());
        assert!(ArchiveOptions::new("a/b", 10).validate().is_err());
        assert!(ArchiveOptions::new("..", 10).validate().is_err());
        ArchiveOptions::new("release-4.9", 10).validate().unwrap();
    }
}
