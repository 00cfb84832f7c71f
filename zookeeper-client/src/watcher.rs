//! One-shot watcher registry.
//!
//! Each (path, kind) key holds at most one pending watcher. A watcher is
//! removed from the registry before it runs, so it fires exactly once.
//! Registering the same watcher again while it is pending is a no-op; a
//! different watcher for an occupied key is not stored.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use zookeeper_core::protocol::Record;
use zookeeper_core::{validate_path, EventType, Result, WatchedEvent};

/// Callback invoked when a watch fires.
pub type Watcher = Arc<dyn Fn(WatchedEvent) + Send + Sync>;

/// Wraps a closure as a [`Watcher`].
pub fn watcher<F>(f: F) -> Watcher
where
    F: Fn(WatchedEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Category of change a watcher waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatcherKind {
    /// Data changes and deletion, set by `get_data`.
    Data,
    /// Child list changes and deletion, set by `get_children`.
    Child,
    /// Creation and data changes, set by `exists`.
    Existence,
}

impl WatcherKind {
    /// Kinds notified and cleared by an event of the given type.
    pub fn notified_by(event_type: EventType) -> &'static [WatcherKind] {
        match event_type {
            EventType::NodeDataChanged | EventType::NodeCreated => {
                &[WatcherKind::Data, WatcherKind::Existence]
            }
            EventType::NodeChildrenChanged => &[WatcherKind::Child],
            EventType::NodeDeleted => &[WatcherKind::Data, WatcherKind::Child],
        }
    }
}

impl fmt::Display for WatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Data => "data",
            Self::Child => "child",
            Self::Existence => "existence",
        };
        f.write_str(name)
    }
}

/// Outcome of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The watcher is now pending for the key.
    Registered,
    /// The same watcher was already pending for the key.
    Duplicate,
    /// A different watcher is pending; the new one was not stored.
    Occupied,
}

/// Registry of pending one-shot watchers, keyed by path and kind.
#[derive(Default)]
pub struct WatcherManager {
    data: BTreeMap<String, Watcher>,
    child: BTreeMap<String, Watcher>,
    existence: BTreeMap<String, Watcher>,
}

impl WatcherManager {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self, kind: WatcherKind) -> &BTreeMap<String, Watcher> {
        match kind {
            WatcherKind::Data => &self.data,
            WatcherKind::Child => &self.child,
            WatcherKind::Existence => &self.existence,
        }
    }

    fn slots_mut(&mut self, kind: WatcherKind) -> &mut BTreeMap<String, Watcher> {
        match kind {
            WatcherKind::Data => &mut self.data,
            WatcherKind::Child => &mut self.child,
            WatcherKind::Existence => &mut self.existence,
        }
    }

    /// Registers `watcher` for `kind` changes on `path`.
    pub fn register(&mut self, kind: WatcherKind, path: &str, watcher: Watcher) -> Result<Registration> {
        validate_path(path)?;

        let slots = self.slots_mut(kind);
        let outcome = match slots.get(path) {
            Some(existing) if Arc::ptr_eq(existing, &watcher) => Registration::Duplicate,
            Some(_) => Registration::Occupied,
            None => {
                slots.insert(path.to_string(), watcher);
                Registration::Registered
            }
        };

        debug!(%kind, path, ?outcome, "watcher registration");
        Ok(outcome)
    }

    /// Registers a data watcher.
    pub fn register_data_watcher(&mut self, path: &str, watcher: Watcher) -> Result<Registration> {
        self.register(WatcherKind::Data, path, watcher)
    }

    /// Registers a child watcher.
    pub fn register_child_watcher(&mut self, path: &str, watcher: Watcher) -> Result<Registration> {
        self.register(WatcherKind::Child, path, watcher)
    }

    /// Registers an existence watcher.
    pub fn register_existence_watcher(
        &mut self,
        path: &str,
        watcher: Watcher,
    ) -> Result<Registration> {
        self.register(WatcherKind::Existence, path, watcher)
    }

    /// Removes and returns the watchers matching `event` without running them.
    ///
    /// Callers holding the registry behind a lock use this to release the
    /// lock before invoking the watchers with [`fire`].
    pub fn take(&mut self, event: &WatchedEvent) -> Vec<Watcher> {
        let Some(path) = event.path() else {
            return Vec::new();
        };

        let mut taken = Vec::new();
        for &kind in WatcherKind::notified_by(event.event_type()) {
            if let Some(watcher) = self.slots_mut(kind).remove(path) {
                taken.push(watcher);
            }
        }

        debug!(event = %event, watchers = taken.len(), "watch event matched");
        taken
    }

    /// Fires and clears the watchers matching `event`.
    ///
    /// Every matched watcher has run when this returns. Returns how many
    /// watchers fired.
    pub fn dispatch(&mut self, event: &WatchedEvent) -> usize {
        fire(&self.take(event), event)
    }

    /// Decodes a `protocol.WatcherEvent` record and dispatches it.
    ///
    /// An unknown event type is a protocol error and fires nothing.
    pub fn dispatch_record(&mut self, record: &Record) -> Result<usize> {
        let event = WatchedEvent::from_record(record)?;
        Ok(self.dispatch(&event))
    }

    /// Paths with a pending watcher of the given kind, in sorted order.
    pub fn watcher_paths(&self, kind: WatcherKind) -> Vec<String> {
        self.slots(kind).keys().cloned().collect()
    }

    /// Paths with a pending data watcher.
    pub fn data_watcher_paths(&self) -> Vec<String> {
        self.watcher_paths(WatcherKind::Data)
    }

    /// Paths with a pending child watcher.
    pub fn child_watcher_paths(&self) -> Vec<String> {
        self.watcher_paths(WatcherKind::Child)
    }

    /// Paths with a pending existence watcher.
    pub fn existence_watcher_paths(&self) -> Vec<String> {
        self.watcher_paths(WatcherKind::Existence)
    }

    /// Returns true when no watcher of any kind is pending.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.child.is_empty() && self.existence.is_empty()
    }
}

/// Runs each watcher once with a copy of `event`, returning how many ran.
pub fn fire(watchers: &[Watcher], event: &WatchedEvent) -> usize {
    for watcher in watchers {
        watcher(event.clone());
    }
    watchers.len()
}

impl fmt::Debug for WatcherManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherManager")
            .field("data", &self.data.keys().collect::<Vec<_>>())
            .field("child", &self.child.keys().collect::<Vec<_>>())
            .field("existence", &self.existence.keys().collect::<Vec<_>>())
            .finish()
    }
}
