//! Timestamped backup copies of the backing file.
//!
//! Where the bytes end up is up to a [`SnapshotSink`]; the default
//! [`DirectorySink`] drops them into a local directory, creating it on demand.

use std::io;
use std::path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::{SnapshotOptions, DEFAULT_SNAPSHOT_DIR};
use crate::persist::PersistenceGateway;
use crate::{Error, Result};

/// Destination for snapshot bytes.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Store `contents` in `dir` under a name derived from `stem`, returning
    /// where it went. Must not overwrite an existing snapshot.
    async fn write_snapshot(
        &self,
        dir: &path::Path,
        stem: &str,
        contents: &[u8],
    ) -> io::Result<path::PathBuf>;
}

/// Writes `<stem>.json` into a local directory.
///
/// Two snapshots in the same millisecond get `<stem>-1.json`, `<stem>-2.json`
/// and so on.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectorySink;

const MAX_NAME_ATTEMPTS: usize = 1000;

#[async_trait]
impl SnapshotSink for DirectorySink {
    async fn write_snapshot(
        &self,
        dir: &path::Path,
        stem: &str,
        contents: &[u8],
    ) -> io::Result<path::PathBuf> {
        use tokio::io::AsyncWriteExt;

        tokio::fs::create_dir_all(dir).await?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}.json", stem)
            } else {
                format!("{}-{}.json", stem, attempt)
            };
            let target = dir.join(name);

            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .await
            {
                Ok(file) => file,
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(error) => return Err(error),
            };
            file.write_all(contents).await?;
            file.sync_all().await?;
            return Ok(target);
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free snapshot name for '{}'", stem),
        ))
    }
}

/// File stem for a snapshot taken now.
pub fn snapshot_stem() -> String {
    format!("snapshot-{}", Utc::now().timestamp_millis())
}

pub struct SnapshotManager {
    default_dir: path::PathBuf,
    sink: Arc<dyn SnapshotSink>,
}

impl SnapshotManager {
    pub fn new(options: &SnapshotOptions, sink: Arc<dyn SnapshotSink>) -> Self {
        Self {
            default_dir: options.path.clone(),
            sink,
        }
    }

    /// The explicit directory, else the configured one, else `./backups/`.
    pub fn resolve_dir(&self, explicit: Option<&path::Path>) -> path::PathBuf {
        match explicit {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ if !self.default_dir.as_os_str().is_empty() => self.default_dir.clone(),
            _ => path::PathBuf::from(DEFAULT_SNAPSHOT_DIR),
        }
    }

    /// Create the configured directory ahead of the first snapshot.
    pub async fn prepare_default_dir(&self) -> Result<()> {
        let dir = self.resolve_dir(None);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| Error::Snapshot { dir, source })
    }

    /// Copy the backing file as last persisted into the resolved directory.
    pub async fn make_snapshot(
        &self,
        gateway: &PersistenceGateway,
        dir: Option<&path::Path>,
    ) -> Result<path::PathBuf> {
        let dir = self.resolve_dir(dir);
        let contents = gateway.read_persisted().await?;

        match self.sink.write_snapshot(&dir, &snapshot_stem(), &contents).await {
            Ok(written) => {
                log::info!("Wrote snapshot {}", written.display());
                Ok(written)
            }
            Err(source) => Err(Error::Snapshot { dir, source }),
        }
    }
}

impl std::fmt::Debug for SnapshotManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotManager")
            .field("default_dir", &self.default_dir)
            .finish_non_exhaustive()
    }
}
