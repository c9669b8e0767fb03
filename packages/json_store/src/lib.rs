//! An embedded key-value store kept in a single JSON file.
//!
//! Values are addressed with dotted paths (`"user.address.city"`). Writes land
//! in memory immediately and reach the file on the next autosave; counters,
//! sequence appends and `clear` flush eagerly unless configured otherwise.
//! See [`JsonDb`] for the full surface.

pub mod config;
pub mod db;
pub mod dirty;
pub mod document;
pub mod error;
pub mod events;
pub mod persist;
pub mod scheduler;
pub mod snapshot;

pub use jsondb_core_store::{path, Path, PathError};

pub use config::{FlushPolicy, SnapshotOptions, StoreOptions, DEFAULT_FILE_PATH};
pub use db::JsonDb;
pub use document::{Amount, Entry};
pub use error::{Error, Result};
pub use events::{Event, EventKind, Listener, ListenerId};
pub use persist::LoadOutcome;
pub use snapshot::{DirectorySink, SnapshotSink};
