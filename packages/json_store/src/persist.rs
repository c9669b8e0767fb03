//! Reading and writing the backing file.
//!
//! [`FileMedium`] knows the file format; [`PersistenceGateway`] adds the lock
//! token that keeps at most one load, save or snapshot read touching the file
//! at a time. The token is a `tokio::sync::Mutex`, so waiters queue up in FIFO
//! order and suspend instead of spinning.

use std::io;
use std::path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use jsondb_core_store::{kind_name, Document};

use crate::dirty::DirtyTracker;
use crate::document::DocumentStore;
use crate::{Error, Result};

/// What the store keeps in memory, guarded by one short-lived mutex.
#[derive(Debug)]
pub(crate) struct State {
    pub documents: DocumentStore,
    pub dirty: DirtyTracker,
}

pub(crate) fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of parsing the bytes of a backing file.
#[derive(Debug, PartialEq)]
pub enum Decoded {
    /// Nothing but whitespace.
    Empty,
    Document(Document),
    /// Not JSON, or JSON whose top level is not a mapping.
    Malformed(String),
}

/// What a load did to the in-memory document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The file was missing or empty; it now holds an empty mapping.
    Created,
    /// The document was replaced with the file's contents.
    Loaded { keys: usize },
    /// The file could not be used and the in-memory document was kept.
    Rejected { reason: String },
}

#[derive(Clone, Debug)]
pub struct FileMedium {
    path: path::PathBuf,
    compress: bool,
}

impl FileMedium {
    pub fn new(path: impl Into<path::PathBuf>, compress: bool) -> Self {
        Self {
            path: path.into(),
            compress,
        }
    }

    pub fn path(&self) -> &path::Path {
        &self.path
    }

    /// Indented JSON, or compact JSON when compressing. Both decode the same.
    pub fn encode(&self, document: &Document) -> Result<Vec<u8>> {
        let encoded = if self.compress {
            serde_json::to_vec(document)
        } else {
            serde_json::to_vec_pretty(document)
        };
        encoded.map_err(Error::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Decoded {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Decoded::Empty;
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(document)) => Decoded::Document(document),
            Ok(other) => Decoded::Malformed(format!(
                "top level is a {}, expected a mapping",
                kind_name(&other)
            )),
            Err(error) => Decoded::Malformed(error.to_string()),
        }
    }

    /// Read the whole file. A missing file is `None`.
    pub async fn read(&self) -> Result<Option<Vec<u8>>> {
        log::debug!("Reading {}...", self.path.display());
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(Error::io("read", &self.path, error)),
        }
    }

    /// Replace the whole file.
    ///
    /// The bytes go to a sibling temporary file first, which is then renamed
    /// over the target, so readers see either the old or the new contents.
    pub async fn write(&self, bytes: &[u8]) -> Result<()> {
        let staging = self.staging_path();
        log::debug!("Writing {}...", self.path.display());

        if let Err(error) = tokio::fs::write(&staging, bytes).await {
            return Err(Error::io("write", &staging, error));
        }
        if let Err(error) = tokio::fs::rename(&staging, &self.path).await {
            // Best effort; the rename error is what gets reported.
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(Error::io("replace", &self.path, error));
        }
        Ok(())
    }

    fn staging_path(&self) -> path::PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[derive(Debug)]
pub struct PersistenceGateway {
    medium: FileMedium,
    token: tokio::sync::Mutex<()>,
}

impl PersistenceGateway {
    pub fn new(medium: FileMedium) -> Self {
        Self {
            medium,
            token: tokio::sync::Mutex::new(()),
        }
    }

    pub fn medium(&self) -> &FileMedium {
        &self.medium
    }

    /// Replace the in-memory document with the file's contents.
    ///
    /// A missing or empty file becomes `{}` on disk and an empty document in
    /// memory. A malformed file is logged and ignored.
    pub(crate) async fn load(&self, state: &Mutex<State>) -> Result<LoadOutcome> {
        let _token = self.token.lock().await;

        let bytes = self.medium.read().await?;
        let decoded = match bytes {
            Some(bytes) => FileMedium::decode(&bytes),
            None => Decoded::Empty,
        };

        match decoded {
            Decoded::Empty => {
                let empty = Document::new();
                self.medium.write(&self.medium.encode(&empty)?).await?;
                let mut state = lock_state(state);
                state.documents.replace(empty);
                state.dirty.clear();
                Ok(LoadOutcome::Created)
            }
            Decoded::Document(document) => {
                let keys = document.len();
                let mut state = lock_state(state);
                state.documents.replace(document);
                state.dirty.clear();
                Ok(LoadOutcome::Loaded { keys })
            }
            Decoded::Malformed(reason) => {
                log::warn!(
                    "Ignoring malformed backing file {}: {}; keeping the in-memory document",
                    self.medium.path().display(),
                    reason
                );
                Ok(LoadOutcome::Rejected { reason })
            }
        }
    }

    /// Write the document as it is when the token is acquired.
    ///
    /// Dirty keys are taken together with the document and handed back if
    /// the write fails.
    pub(crate) async fn save(&self, state: &Mutex<State>) -> Result<()> {
        let _token = self.token.lock().await;
        self.save_locked(state).await
    }

    /// Save only if keys are still dirty once the token is held.
    ///
    /// Any save already in flight has finished by then, so a clean set means
    /// the file is current. Returns whether a write happened.
    pub(crate) async fn save_if_dirty(&self, state: &Mutex<State>) -> Result<bool> {
        let _token = self.token.lock().await;
        let clean = lock_state(state).dirty.is_empty();
        if clean {
            return Ok(false);
        }
        self.save_locked(state).await?;
        Ok(true)
    }

    async fn save_locked(&self, state: &Mutex<State>) -> Result<()> {
        let (bytes, taken) = {
            let mut state = lock_state(state);
            let bytes = self.medium.encode(state.documents.document())?;
            (bytes, state.dirty.drain())
        };

        if let Err(error) = self.medium.write(&bytes).await {
            lock_state(state).dirty.restore(taken);
            return Err(error);
        }
        Ok(())
    }

    /// The file's current bytes, read while no save is in flight.
    pub(crate) async fn read_persisted(&self) -> Result<Vec<u8>> {
        let _token = self.token.lock().await;
        self.medium.read().await?.ok_or_else(|| {
            Error::io(
                "read",
                self.medium.path(),
                io::Error::new(io::ErrorKind::NotFound, "backing file is missing"),
            )
        })
    }
}
