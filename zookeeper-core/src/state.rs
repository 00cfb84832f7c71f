//! Session states reported by the connection layer.

use std::fmt;

use crate::error::{Result, ZooKeeperError};

/// State of the client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// Not connected to any server.
    #[default]
    Disconnected = 0,
    /// Connected and in sync with the ensemble.
    SyncConnected = 3,
    /// Authentication failed.
    AuthFailed = 4,
    /// Connected to a read-only server.
    ConnectedReadOnly = 5,
    /// SASL authentication succeeded.
    SaslAuthenticated = 6,
    /// The session expired.
    Expired = -122,
}

impl State {
    /// Returns the wire code.
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Returns the protocol name, e.g. `SYNC_CONNECTED`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::SyncConnected => "SYNC_CONNECTED",
            Self::AuthFailed => "AUTH_FAILED",
            Self::ConnectedReadOnly => "CONNECTED_READ_ONLY",
            Self::SaslAuthenticated => "SASL_AUTHENTICATED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Creates a state from its wire code.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::Disconnected),
            3 => Ok(Self::SyncConnected),
            4 => Ok(Self::AuthFailed),
            5 => Ok(Self::ConnectedReadOnly),
            6 => Ok(Self::SaslAuthenticated),
            -122 => Ok(Self::Expired),
            other => Err(ZooKeeperError::Protocol(format!(
                "unknown session state: {}",
                other
            ))),
        }
    }

    /// Returns true for the states in which requests can be served.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            Self::SyncConnected | Self::ConnectedReadOnly | Self::SaslAuthenticated
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name(), self.code())
    }
}
