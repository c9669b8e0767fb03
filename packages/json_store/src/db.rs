//! The public store handle.
//!
//! [`JsonDb`] is cheap to clone; clones share one document, one backing file
//! and one set of background tasks. Reads and writes of the document are
//! synchronous. Anything touching the file is async and goes through the
//! persistence gateway's lock token.
//!
//! # Example
//!
//! ```rust,no_run
//! use jsondb_json_store::{JsonDb, StoreOptions};
//! use serde_json::json;
//!
//! # async fn run() -> jsondb_json_store::Result<()> {
//! let db = JsonDb::open("./db.json", StoreOptions::default()).await?;
//!
//! db.on_change(|path, value| println!("{} is now {}", path, value));
//!
//! db.set("user.name", "John")?;
//! db.set("user.age", 30)?;
//! assert_eq!(db.get("user")?, Some(json!({"name": "John", "age": 30})));
//!
//! db.push("fruits", "apple")?;
//! db.add("counter", 1)?;
//!
//! db.close().await?;
//! # Ok(())
//! # }
//! ```

use std::path;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use jsondb_core_store::Path;

use crate::config::{FlushPolicy, StoreOptions, DEFAULT_FILE_PATH};
use crate::dirty::DirtyTracker;
use crate::document::{Amount, DocumentStore, Entry};
use crate::events::{Event, EventChannel, EventKind, Listener, ListenerId};
use crate::persist::{lock_state, FileMedium, LoadOutcome, PersistenceGateway, State};
use crate::scheduler::BackgroundTask;
use crate::snapshot::{DirectorySink, SnapshotManager, SnapshotSink};
use crate::{Error, Result};

struct Inner {
    options: StoreOptions,
    state: Mutex<State>,
    gateway: PersistenceGateway,
    snapshots: SnapshotManager,
    events: EventChannel,
    tasks: Mutex<Vec<BackgroundTask>>,
    runtime: tokio::runtime::Handle,
}

impl Inner {
    fn is_dirty(&self) -> bool {
        !lock_state(&self.state).dirty.is_empty()
    }

    async fn flush(&self) -> Result<()> {
        self.gateway.save(&self.state).await?;
        self.events.publish(&Event::Save);
        Ok(())
    }

    /// Flush once any save in flight has finished, if keys are still dirty.
    async fn flush_if_dirty(&self) -> Result<()> {
        if self.gateway.save_if_dirty(&self.state).await? {
            self.events.publish(&Event::Save);
        }
        Ok(())
    }

    /// Flush on behalf of nobody in particular: failures become events.
    async fn flush_reporting(&self, operation: &'static str) {
        if let Err(error) = self.flush().await {
            log::error!("{} flush of {} failed: {}", operation, self.file_path().display(), error);
            self.events.publish(&Event::Error {
                operation,
                message: error.to_string(),
            });
        }
    }

    async fn snapshot(&self, dir: Option<&path::Path>) -> Result<path::PathBuf> {
        self.snapshots.make_snapshot(&self.gateway, dir).await
    }

    fn file_path(&self) -> &path::Path {
        self.gateway.medium().path()
    }
}

#[derive(Clone)]
pub struct JsonDb {
    inner: Arc<Inner>,
}

impl JsonDb {
    /// Open (or create) the store backed by `file`.
    ///
    /// Loads the file, then starts the autosave loop and, if enabled, the
    /// snapshot loop. Must be called from within a tokio runtime.
    pub async fn open(file: impl Into<path::PathBuf>, options: StoreOptions) -> Result<Self> {
        Self::open_with_sink(file, options, Arc::new(DirectorySink)).await
    }

    /// Open `./db.json`.
    pub async fn open_default(options: StoreOptions) -> Result<Self> {
        Self::open(DEFAULT_FILE_PATH, options).await
    }

    /// Open with snapshots going to `sink` instead of a local directory.
    pub async fn open_with_sink(
        file: impl Into<path::PathBuf>,
        options: StoreOptions,
        sink: Arc<dyn SnapshotSink>,
    ) -> Result<Self> {
        let medium = FileMedium::new(file, options.compress);
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                documents: DocumentStore::new(options.cache),
                dirty: DirtyTracker::new(),
            }),
            gateway: PersistenceGateway::new(medium),
            snapshots: SnapshotManager::new(&options.snapshots, sink),
            events: EventChannel::new(),
            tasks: Mutex::new(Vec::new()),
            runtime: tokio::runtime::Handle::current(),
            options,
        });

        if inner.options.snapshots.enabled {
            inner.snapshots.prepare_default_dir().await?;
        }

        let outcome = inner.gateway.load(&inner.state).await?;
        log::info!("Opened {} ({:?})", inner.file_path().display(), outcome);

        let db = JsonDb { inner };
        db.start_background_tasks();
        Ok(db)
    }

    fn start_background_tasks(&self) {
        let mut tasks = Vec::new();

        // Tasks hold a weak reference so the store can drop while they sleep.
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tasks.push(BackgroundTask::spawn_periodic(
            "autosave",
            self.inner.options.auto_save_interval,
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        if inner.is_dirty() {
                            inner.flush_reporting("autosave").await;
                        }
                    }
                }
            },
        ));

        if self.inner.options.snapshots.enabled {
            let weak: Weak<Inner> = Arc::downgrade(&self.inner);
            tasks.push(BackgroundTask::spawn_periodic(
                "snapshot",
                self.inner.options.snapshots.interval,
                move || {
                    let weak = weak.clone();
                    async move {
                        let Some(inner) = weak.upgrade() else {
                            return;
                        };
                        if let Err(error) = inner.snapshot(None).await {
                            log::error!("Scheduled snapshot failed: {}", error);
                            inner.events.publish(&Event::Error {
                                operation: "snapshot",
                                message: error.to_string(),
                            });
                        }
                    }
                },
            ));
        }

        *self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = tasks;
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        lock_state(&self.inner.state)
    }

    pub fn file_path(&self) -> &path::Path {
        self.inner.file_path()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.inner.options
    }

    // ==================== Reads ====================

    /// The value at a dotted path, or `None` if any part of it is missing.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let path = Path::parse(path)?;
        Ok(self.state().documents.get(&path).cloned())
    }

    /// Like [`JsonDb::get`], deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| Error::Value {
                    key: path.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub fn has(&self, path: &str) -> Result<bool> {
        let path = Path::parse(path)?;
        Ok(self.state().documents.has(&path))
    }

    /// Every top-level key and its value, in insertion order.
    pub fn all(&self) -> Vec<Entry> {
        self.state().documents.all()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state().documents.keys()
    }

    pub fn len(&self) -> usize {
        self.state().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().documents.is_empty()
    }

    /// Top-level keys changed since the last successful flush.
    pub fn dirty_keys(&self) -> Vec<String> {
        self.state().dirty.keys()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.is_dirty()
    }

    // ==================== Writes ====================

    /// Set the value at a dotted path, creating missing parent mappings.
    ///
    /// Persisted by the next autosave.
    pub fn set<T: Serialize>(&self, path: &str, value: T) -> Result<()> {
        let parsed = Path::parse(path)?;
        let value = serde_json::to_value(value).map_err(|source| Error::Value {
            key: path.to_string(),
            source,
        })?;

        {
            let mut state = self.state();
            state.documents.set(&parsed, value.clone())?;
            state.dirty.mark(parsed.top_level());
        }

        self.inner.events.publish(&Event::Change {
            path: parsed.to_string(),
            value,
        });
        Ok(())
    }

    /// Delete the value at a dotted path. Returns whether anything was there.
    ///
    /// Missing paths are not an error. Persisted by the next autosave.
    pub fn delete(&self, path: &str) -> Result<bool> {
        let parsed = Path::parse(path)?;
        let removed = {
            let mut state = self.state();
            let removed = state.documents.delete(&parsed).is_some();
            if removed {
                state.dirty.mark(parsed.top_level());
            }
            removed
        };

        self.inner.events.publish(&Event::Delete {
            path: parsed.to_string(),
        });
        Ok(removed)
    }

    /// Add to the number at top-level `key` (dots are part of the key).
    ///
    /// Absent or falsy values count as zero. Returns the new value.
    pub fn add(&self, key: &str, amount: impl Into<Amount>) -> Result<Value> {
        let amount = amount.into();
        self.counter_update(key, |documents| documents.add(key, amount))
    }

    pub fn subtract(&self, key: &str, amount: impl Into<Amount>) -> Result<Value> {
        let amount = amount.into();
        self.counter_update(key, |documents| documents.subtract(key, amount))
    }

    fn counter_update(
        &self,
        key: &str,
        update: impl FnOnce(&mut DocumentStore) -> Result<Value>,
    ) -> Result<Value> {
        let value = {
            let mut state = self.state();
            let value = update(&mut state.documents)?;
            state.dirty.mark(key);
            value
        };

        self.inner.events.publish(&Event::Change {
            path: key.to_string(),
            value: value.clone(),
        });
        self.after_priority_write();
        Ok(value)
    }

    /// Append to the sequence at a dotted path, creating it if absent.
    ///
    /// Returns the new length.
    pub fn push<T: Serialize>(&self, path: &str, element: T) -> Result<usize> {
        let parsed = Path::parse(path)?;
        let element = serde_json::to_value(element).map_err(|source| Error::Value {
            key: path.to_string(),
            source,
        })?;

        let (len, value) = {
            let mut state = self.state();
            let len = state.documents.push(&parsed, element)?;
            state.dirty.mark(parsed.top_level());
            let value = state.documents.get(&parsed).cloned().unwrap_or(Value::Null);
            (len, value)
        };

        self.inner.events.publish(&Event::Change {
            path: parsed.to_string(),
            value,
        });
        self.after_priority_write();
        Ok(len)
    }

    /// Remove every key.
    pub fn clear(&self) {
        let removed = {
            let mut state = self.state();
            let removed = state.documents.clear();
            for key in &removed {
                state.dirty.mark(key.as_str());
            }
            removed
        };

        for key in removed {
            self.inner.events.publish(&Event::Delete { path: key });
        }
        self.after_priority_write();
    }

    /// `add`, `subtract`, `push` and `clear` flush right away unless the
    /// store was opened with [`FlushPolicy::Coalesced`].
    fn after_priority_write(&self) {
        if self.inner.options.flush_policy != FlushPolicy::Eager {
            return;
        }
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            inner.flush_reporting("eager").await;
        });
    }

    // ==================== Persistence ====================

    /// Write the document to the backing file now.
    pub async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }

    /// Replace the document with the backing file's contents.
    pub async fn reload(&self) -> Result<LoadOutcome> {
        self.inner.gateway.load(&self.inner.state).await
    }

    /// Copy the backing file into `dir`, or the configured snapshot directory.
    pub async fn make_snapshot(&self, dir: Option<&path::Path>) -> Result<path::PathBuf> {
        self.inner.snapshot(dir).await
    }

    /// Stop the background loops and flush anything still dirty.
    ///
    /// Returns only after every save started before the call, including
    /// eager ones nobody awaited, has reached the file. Other clones keep
    /// working afterwards, but nothing autosaves any more.
    pub async fn close(&self) -> Result<()> {
        let tasks = std::mem::take(
            &mut *self
                .inner
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            task.stop().await;
        }

        self.inner.flush_if_dirty().await?;
        log::info!("Closed {}", self.file_path().display());
        Ok(())
    }

    pub fn background_tasks_running(&self) -> usize {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|task| task.is_running())
            .count()
    }

    // ==================== Events ====================

    pub fn subscribe(&self, kind: EventKind, listener: Listener) -> ListenerId {
        self.inner.events.subscribe(kind, listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    pub fn on_save(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.subscribe(EventKind::Save, Arc::new(move |_event: &Event| listener()))
    }

    pub fn on_change(&self, listener: impl Fn(&str, &Value) + Send + Sync + 'static) -> ListenerId {
        self.subscribe(
            EventKind::Change,
            Arc::new(move |event: &Event| {
                if let Event::Change { path, value } = event {
                    listener(path, value);
                }
            }),
        )
    }

    pub fn on_delete(&self, listener: impl Fn(&str) + Send + Sync + 'static) -> ListenerId {
        self.subscribe(
            EventKind::Delete,
            Arc::new(move |event: &Event| {
                if let Event::Delete { path } = event {
                    listener(path);
                }
            }),
        )
    }

    /// Failures of flushes and snapshots nobody awaited: `(operation, message)`.
    pub fn on_error(&self, listener: impl Fn(&str, &str) + Send + Sync + 'static) -> ListenerId {
        self.subscribe(
            EventKind::Error,
            Arc::new(move |event: &Event| {
                if let Event::Error { operation, message } = event {
                    listener(operation, message);
                }
            }),
        )
    }
}

impl std::fmt::Debug for JsonDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDb")
            .field("file", &self.file_path())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}
