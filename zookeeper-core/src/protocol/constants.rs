//! Protocol constants for the ZooKeeper jute wire protocol.

use crate::error::{Result, ZooKeeperError};

/// Version of the client/server protocol sent in the connect request.
pub const PROTOCOL_VERSION: i32 = 0;

/// Size of the big-endian length prefix of every request frame.
pub const SIZE_OF_LENGTH_FIELD: usize = 4;

/// Maximum size of a node's data payload (1 MiB).
pub const DATA_SIZE_LIMIT: usize = 1_048_576;

/// Version value meaning "match any version".
pub const ANY_VERSION: i32 = -1;

/// Reply xid used for watch notifications.
pub const XID_NOTIFICATION: i32 = -1;

/// Request xid used for pings.
pub const XID_PING: i32 = -2;

/// Request xid used for authentication packets.
pub const XID_AUTHENTICATION: i32 = -4;

/// Request xid used for set-watches packets.
pub const XID_SET_WATCHES: i32 = -8;

/// Operation codes carried in request and multi headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Watch notification.
    Notification = 0,
    /// Create a node.
    Create = 1,
    /// Delete a node.
    Delete = 2,
    /// Test node existence.
    Exists = 3,
    /// Read node data.
    GetData = 4,
    /// Write node data.
    SetData = 5,
    /// Read node ACL.
    GetAcl = 6,
    /// Write node ACL.
    SetAcl = 7,
    /// List children.
    GetChildren = 8,
    /// Sync with the leader.
    Sync = 9,
    /// Session keep-alive.
    Ping = 11,
    /// List children together with the parent's stat.
    GetChildren2 = 12,
    /// Version check, only valid inside a transaction.
    Check = 13,
    /// Multi-op transaction.
    Multi = 14,
    /// Add authentication info.
    Auth = 100,
    /// Re-register watches after reconnect.
    SetWatches = 101,
    /// SASL authentication.
    Sasl = 102,
    /// Session creation.
    CreateSession = -10,
    /// Session close.
    CloseSession = -11,
    /// Failed op inside a transaction response.
    Error = -1,
}

impl OpCode {
    /// Returns the wire value of this op code.
    pub fn value(&self) -> i32 {
        *self as i32
    }

    /// Creates an `OpCode` from its wire value.
    pub fn from_value(value: i32) -> Result<Self> {
        let op = match value {
            0 => Self::Notification,
            1 => Self::Create,
            2 => Self::Delete,
            3 => Self::Exists,
            4 => Self::GetData,
            5 => Self::SetData,
            6 => Self::GetAcl,
            7 => Self::SetAcl,
            8 => Self::GetChildren,
            9 => Self::Sync,
            11 => Self::Ping,
            12 => Self::GetChildren2,
            13 => Self::Check,
            14 => Self::Multi,
            100 => Self::Auth,
            101 => Self::SetWatches,
            102 => Self::Sasl,
            -10 => Self::CreateSession,
            -11 => Self::CloseSession,
            -1 => Self::Error,
            other => {
                return Err(ZooKeeperError::Protocol(format!(
                    "unknown op code: {}",
                    other
                )))
            }
        };
        Ok(op)
    }
}
