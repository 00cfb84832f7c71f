//! Watch notifications delivered to registered watchers.

use std::fmt;

use crate::error::{Result, ZooKeeperError};
use crate::protocol::Record;

/// Kind of change a watch notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A node was created.
    NodeCreated = 1,
    /// A node was deleted.
    NodeDeleted = 2,
    /// A node's data changed.
    NodeDataChanged = 3,
    /// A node's children changed.
    NodeChildrenChanged = 4,
}

impl EventType {
    /// Returns the wire value of this event type.
    pub fn value(&self) -> i32 {
        *self as i32
    }

    /// Returns the protocol name, e.g. `NODE_CREATED`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NodeCreated => "NODE_CREATED",
            Self::NodeDeleted => "NODE_DELETED",
            Self::NodeDataChanged => "NODE_DATA_CHANGED",
            Self::NodeChildrenChanged => "NODE_CHILDREN_CHANGED",
        }
    }

    /// Creates an event type from its wire value.
    ///
    /// Unknown values are a protocol error.
    pub fn from_value(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Self::NodeCreated),
            2 => Ok(Self::NodeDeleted),
            3 => Ok(Self::NodeDataChanged),
            4 => Ok(Self::NodeChildrenChanged),
            other => Err(ZooKeeperError::Protocol(format!(
                "unknown event type: {}",
                other
            ))),
        }
    }
}

/// A watch notification for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    event_type: EventType,
    path: Option<String>,
}

impl WatchedEvent {
    /// Creates an event.
    pub fn new(event_type: EventType, path: impl Into<String>) -> Self {
        Self {
            event_type,
            path: Some(path.into()),
        }
    }

    /// Builds an event from a `protocol.WatcherEvent` record.
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            event_type: EventType::from_value(record.get_int("type")?)?,
            path: record.get_ustring("path")?.map(str::to_string),
        })
    }

    /// Returns the event type.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Returns the event name, e.g. `NODE_DELETED`.
    pub fn name(&self) -> &'static str {
        self.event_type.name()
    }

    /// Returns the node path.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl fmt::Display for WatchedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name(), self.event_type.value())?;
        if let Some(ref path) = self.path {
            write!(f, "@{}", path)?;
        }
        Ok(())
    }
}
