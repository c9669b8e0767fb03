//! Change notification.
//!
//! The store owns an [`EventChannel`] and publishes on it after every
//! mutation and flush. Listeners run synchronously on the publishing thread,
//! in registration order, after the store has released its own locks, so a
//! listener may read from or write to the store it is listening on.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// Something that happened to a store.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A flush finished writing the backing file.
    Save,
    /// The value at `path` was set to `value`.
    Change { path: String, value: Value },
    /// The value at `path` was deleted.
    Delete { path: String },
    /// A background operation nobody was awaiting failed.
    Error {
        operation: &'static str,
        message: String,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Save => EventKind::Save,
            Event::Change { .. } => EventKind::Change,
            Event::Delete { .. } => EventKind::Delete,
            Event::Error { .. } => EventKind::Error,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Save,
    Change,
    Delete,
    Error,
}

/// Handle returned by [`EventChannel::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

struct Subscription {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

#[derive(Default)]
pub struct EventChannel {
    registry: RwLock<Registry>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.subscriptions.push(Subscription { id, kind, listener });
        id
    }

    /// Returns whether a listener was removed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = registry.subscriptions.len();
        registry.subscriptions.retain(|s| s.id != id);
        registry.subscriptions.len() != before
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .subscriptions
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    /// Deliver `event` to every listener registered for its kind.
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    pub fn publish(&self, event: &Event) {
        let kind = event.kind();
        // Snapshot the listeners so they can (un)subscribe while being called.
        let listeners: Vec<(ListenerId, Listener)> = self
            .registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .subscriptions
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| (s.id, Arc::clone(&s.listener)))
            .collect();

        for (id, listener) in listeners {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
            if outcome.is_err() {
                log::warn!("Listener {:?} panicked while handling {:?} event", id, kind);
            }
        }
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self
            .registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f.debug_struct("EventChannel")
            .field("listeners", &registry.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |name: &str| -> Listener {
                let log = Arc::clone(&log);
                let name = name.to_string();
                Arc::new(move |_event: &Event| log.lock().unwrap().push(name.clone()))
            }
        };
        (log, make)
    }

    #[test]
    fn delivers_in_registration_order() {
        let channel = EventChannel::new();
        let (log, make) = recorder();

        channel.subscribe(EventKind::Save, make("first"));
        channel.subscribe(EventKind::Save, make("second"));
        channel.subscribe(EventKind::Save, make("third"));

        channel.publish(&Event::Save);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn only_matching_kind_is_called() {
        let channel = EventChannel::new();
        let (log, make) = recorder();

        channel.subscribe(EventKind::Change, make("change"));
        channel.subscribe(EventKind::Delete, make("delete"));

        channel.publish(&Event::Delete {
            path: "user.age".to_string(),
        });
        assert_eq!(*log.lock().unwrap(), vec!["delete"]);
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let channel = EventChannel::new();
        let (log, make) = recorder();

        channel.subscribe(EventKind::Change, make("before"));
        channel.subscribe(
            EventKind::Change,
            Arc::new(|_event: &Event| panic!("listener failure")),
        );
        channel.subscribe(EventKind::Change, make("after"));

        let event = Event::Change {
            path: "a".to_string(),
            value: json!(1),
        };
        channel.publish(&event);
        channel.publish(&event);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["before", "after", "before", "after"]
        );
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let channel = EventChannel::new();
        let (log, make) = recorder();

        let id = channel.subscribe(EventKind::Save, make("gone"));
        channel.subscribe(EventKind::Save, make("kept"));
        assert_eq!(channel.listener_count(EventKind::Save), 2);

        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));

        channel.publish(&Event::Save);
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    }

    #[test]
    fn listener_may_subscribe_while_called() {
        let channel = Arc::new(EventChannel::new());
        let inner = Arc::clone(&channel);
        channel.subscribe(
            EventKind::Save,
            Arc::new(move |_event: &Event| {
                inner.subscribe(EventKind::Save, Arc::new(|_event: &Event| {}));
            }),
        );

        channel.publish(&Event::Save);
        assert_eq!(channel.listener_count(EventKind::Save), 2);
    }
}
