//! Core types and protocols for ZooKeeper.

#![warn(missing_docs)]

pub mod acl;
pub mod error;
pub mod event;
pub mod node;
pub mod path;
pub mod protocol;
pub mod serialization;
pub mod state;

pub use acl::{perms, Acl, Id};
pub use error::{Exception, ExceptionCode, Result, ZooKeeperError};
pub use event::{EventType, WatchedEvent};
pub use node::{CreateMode, Stat};
pub use path::validate_path;
pub use serialization::{DataInput, DataOutput, ObjectDataInput, ObjectDataOutput};
pub use state::State;
