//! Construction options for a [`JsonDb`](crate::JsonDb).
//!
//! Options can be built in code or read from a JSON document using the same
//! names the on-disk configuration has always used:
//!
//! ```json
//! {
//!     "compress": false,
//!     "cache": true,
//!     "autoSaveInterval": 5000,
//!     "flushPolicy": "eager",
//!     "snapshots": { "enabled": true, "path": "./backups/", "interval": 86400000 }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Backing file used when none is given.
pub const DEFAULT_FILE_PATH: &str = "./db.json";

/// Snapshot directory used when neither the call nor the options name one.
pub const DEFAULT_SNAPSHOT_DIR: &str = "./backups/";

pub const DEFAULT_AUTO_SAVE_INTERVAL: Duration = Duration::from_millis(5_000);

pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_millis(86_400_000);

/// Shortest autosave or snapshot interval. Shorter ones are raised to this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// When `add`, `subtract`, `push` and `clear` reach the backing file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushPolicy {
    /// Start a background save right away, without waiting for it.
    #[default]
    Eager,
    /// Only mark the key dirty, like `set` and `delete`.
    Coalesced,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreOptions {
    /// Write compact JSON instead of indented JSON.
    pub compress: bool,
    /// Serve reads from a mirror of the document.
    pub cache: bool,
    #[serde(with = "millis")]
    pub auto_save_interval: Duration,
    pub flush_policy: FlushPolicy,
    pub snapshots: SnapshotOptions,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            compress: false,
            cache: false,
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL,
            flush_policy: FlushPolicy::default(),
            snapshots: SnapshotOptions::default(),
        }
    }
}

impl StoreOptions {
    /// Parse options from a JSON document. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, Error> {
        serde_json::from_str(s).map_err(|source| Error::Config { source })
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Raised to [`MIN_INTERVAL`] if shorter.
    pub fn with_auto_save_interval(mut self, interval: Duration) -> Self {
        self.auto_save_interval = interval.max(MIN_INTERVAL);
        self
    }

    pub fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    pub fn with_snapshots(mut self, snapshots: SnapshotOptions) -> Self {
        self.snapshots = snapshots;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotOptions {
    /// Take a snapshot every `interval` in the background.
    pub enabled: bool,
    /// Directory snapshots go to when `make_snapshot` is not given one.
    #[serde(alias = "folder")]
    pub path: PathBuf,
    #[serde(with = "millis")]
    pub interval: Duration,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            interval: DEFAULT_SNAPSHOT_INTERVAL,
        }
    }
}

impl SnapshotOptions {
    /// Periodic snapshots into `path` every `interval`, at least [`MIN_INTERVAL`].
    pub fn every(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            enabled: true,
            path: path.into(),
            interval: interval.max(MIN_INTERVAL),
        }
    }
}

/// Durations are written as whole milliseconds. Zero is rejected.
mod millis {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match u64::deserialize(deserializer)? {
            0 => Err(D::Error::custom("interval must be at least 1 millisecond")),
            ms => Ok(Duration::from_millis(ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = StoreOptions::default();
        assert!(!options.compress);
        assert!(!options.cache);
        assert_eq!(options.auto_save_interval, Duration::from_millis(5000));
        assert_eq!(options.flush_policy, FlushPolicy::Eager);
        assert!(!options.snapshots.enabled);
        assert_eq!(options.snapshots.path, PathBuf::from("./backups/"));
        assert_eq!(options.snapshots.interval, Duration::from_millis(86_400_000));
    }

    #[test]
    fn parse_full_document() {
        let options = StoreOptions::from_json_str(
            r#"{
                "compress": true,
                "cache": true,
                "autoSaveInterval": 250,
                "flushPolicy": "coalesced",
                "snapshots": { "enabled": true, "path": "/tmp/snaps", "interval": 1000 }
            }"#,
        )
        .unwrap();

        assert!(options.compress);
        assert!(options.cache);
        assert_eq!(options.auto_save_interval, Duration::from_millis(250));
        assert_eq!(options.flush_policy, FlushPolicy::Coalesced);
        assert_eq!(
            options.snapshots,
            SnapshotOptions::every("/tmp/snaps", Duration::from_secs(1))
        );
    }

    #[test]
    fn parse_partial_document_uses_defaults() {
        let options = StoreOptions::from_json_str(r#"{ "cache": true }"#).unwrap();
        assert_eq!(options, StoreOptions::default().with_cache(true));

        let options = StoreOptions::from_json_str("{}").unwrap();
        assert_eq!(options, StoreOptions::default());
    }

    #[test]
    fn folder_is_an_alias_for_path() {
        let options =
            StoreOptions::from_json_str(r#"{ "snapshots": { "enabled": true, "folder": "snaps" } }"#)
                .unwrap();
        assert_eq!(options.snapshots.path, PathBuf::from("snaps"));
        assert_eq!(options.snapshots.interval, DEFAULT_SNAPSHOT_INTERVAL);
    }

    #[test]
    fn bad_document_is_a_config_error() {
        let err = StoreOptions::from_json_str(r#"{ "autoSaveInterval": "soon" }"#).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn zero_intervals_are_rejected_or_raised() {
        for document in [
            r#"{ "autoSaveInterval": 0 }"#,
            r#"{ "snapshots": { "enabled": true, "interval": 0 } }"#,
        ] {
            let err = StoreOptions::from_json_str(document).unwrap_err();
            assert!(matches!(err, Error::Config { .. }));
        }

        let options = StoreOptions::default().with_auto_save_interval(Duration::ZERO);
        assert_eq!(options.auto_save_interval, MIN_INTERVAL);
        assert_eq!(SnapshotOptions::every("snaps", Duration::ZERO).interval, MIN_INTERVAL);
    }

    #[test]
    fn serializes_durations_as_millis() {
        let options = StoreOptions::default().with_auto_save_interval(Duration::from_secs(2));
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["autoSaveInterval"], serde_json::json!(2000));
        assert_eq!(value["snapshots"]["interval"], serde_json::json!(86_400_000));
    }
}
