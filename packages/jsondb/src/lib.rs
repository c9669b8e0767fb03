//! jsondb: an embedded key-value store kept in a single JSON file.
//!
//! Values live in one JSON mapping, addressed by dotted paths such as
//! `user.address.city`. The store is layered:
//! - [`core`]: paths and the accessor that resolves them against a document
//! - [`store`]: the file-backed [`JsonDb`] with autosave, snapshots and events
//!
//! # Example
//!
//! ```rust,no_run
//! use jsondb::{JsonDb, StoreOptions};
//!
//! # async fn run() -> jsondb::Result<()> {
//! let db = JsonDb::open_default(StoreOptions::default().with_cache(true)).await?;
//! db.set("settings.theme", "dark")?;
//! db.add("visits", 1)?;
//! db.close().await?;
//! # Ok(())
//! # }
//! ```

pub use jsondb_core_store as core;
pub use jsondb_json_store as store;

pub use jsondb_core_store::{path, Document, Path, PathError, Value};
pub use jsondb_json_store::{
    Amount, DirectorySink, Entry, Error, Event, EventKind, FlushPolicy, JsonDb, Listener,
    ListenerId, LoadOutcome, Result, SnapshotOptions, SnapshotSink, StoreOptions,
    DEFAULT_FILE_PATH,
};
