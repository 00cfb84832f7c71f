//! Error types for ZooKeeper operations.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::protocol::TransactionResult;

/// Numeric error codes reported by the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    /// Everything is OK.
    Ok = 0,
    /// A system or server-side error.
    SystemError = -1,
    /// A runtime inconsistency was found.
    RuntimeInconsistency = -2,
    /// A data inconsistency was found.
    DataInconsistency = -3,
    /// Connection to the server has been lost.
    ConnectionLoss = -4,
    /// Error while marshalling or unmarshalling data.
    MarshallingError = -5,
    /// Operation is unimplemented.
    Unimplemented = -6,
    /// Operation timeout.
    OperationTimeout = -7,
    /// Invalid arguments.
    BadArguments = -8,
    /// API errors.
    ApiError = -100,
    /// Node does not exist.
    NoNode = -101,
    /// Not authenticated.
    NoAuth = -102,
    /// Version conflict.
    BadVersion = -103,
    /// Ephemeral nodes may not have children.
    NoChildrenForEphemerals = -108,
    /// The node already exists.
    NodeExists = -110,
    /// The node has children.
    NotEmpty = -111,
    /// The session has been expired by the server.
    SessionExpired = -112,
    /// Invalid callback specified.
    InvalidCallback = -113,
    /// Invalid ACL specified.
    InvalidAcl = -114,
    /// Client authentication failed.
    AuthFailed = -115,
}

impl ExceptionCode {
    /// Returns the wire value of this code.
    pub fn value(&self) -> i32 {
        *self as i32
    }

    /// Returns the protocol name of this code, e.g. `NO_NODE`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::SystemError => "SYSTEM_ERROR",
            Self::RuntimeInconsistency => "RUNTIME_INCONSISTENCY",
            Self::DataInconsistency => "DATA_INCONSISTENCY",
            Self::ConnectionLoss => "CONNECTION_LOSS",
            Self::MarshallingError => "MARSHALLING_ERROR",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::OperationTimeout => "OPERATION_TIMEOUT",
            Self::BadArguments => "BAD_ARGUMENTS",
            Self::ApiError => "API_ERROR",
            Self::NoNode => "NO_NODE",
            Self::NoAuth => "NO_AUTH",
            Self::BadVersion => "BAD_VERSION",
            Self::NoChildrenForEphemerals => "NO_CHILDREN_FOR_EPHEMERALS",
            Self::NodeExists => "NODE_EXISTS",
            Self::NotEmpty => "NOT_EMPTY",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::InvalidCallback => "INVALID_CALLBACK",
            Self::InvalidAcl => "INVALID_ACL",
            Self::AuthFailed => "AUTH_FAILED",
        }
    }
}

impl TryFrom<i32> for ExceptionCode {
    type Error = ZooKeeperError;

    fn try_from(value: i32) -> Result<Self> {
        let code = match value {
            0 => Self::Ok,
            -1 => Self::SystemError,
            -2 => Self::RuntimeInconsistency,
            -3 => Self::DataInconsistency,
            -4 => Self::ConnectionLoss,
            -5 => Self::MarshallingError,
            -6 => Self::Unimplemented,
            -7 => Self::OperationTimeout,
            -8 => Self::BadArguments,
            -100 => Self::ApiError,
            -101 => Self::NoNode,
            -102 => Self::NoAuth,
            -103 => Self::BadVersion,
            -108 => Self::NoChildrenForEphemerals,
            -110 => Self::NodeExists,
            -111 => Self::NotEmpty,
            -112 => Self::SessionExpired,
            -113 => Self::InvalidCallback,
            -114 => Self::InvalidAcl,
            -115 => Self::AuthFailed,
            other => {
                return Err(ZooKeeperError::Protocol(format!(
                    "unknown exception code: {}",
                    other
                )))
            }
        };
        Ok(code)
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name(), self.value())
    }
}

/// A protocol exception reported by the ensemble, optionally tied to a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    code: ExceptionCode,
    path: Option<String>,
}

impl Exception {
    /// Creates an exception without a path.
    pub fn new(code: ExceptionCode) -> Self {
        Self { code, path: None }
    }

    /// Creates an exception attached to the given node path.
    pub fn with_path(code: ExceptionCode, path: impl Into<String>) -> Self {
        Self {
            code,
            path: Some(path.into()),
        }
    }

    /// Returns the exception code.
    pub fn code(&self) -> ExceptionCode {
        self.code
    }

    /// Returns the node path, if any.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exception: {}", self.code)?;
        if let Some(ref path) = self.path {
            write!(f, "@{}", path)?;
        }
        Ok(())
    }
}

/// The main error type for ZooKeeper operations.
#[derive(Debug, Error)]
pub enum ZooKeeperError {
    /// Local argument validation failed; nothing was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The ensemble answered with a non-OK exception code.
    #[error("{0}")]
    Exception(Exception),

    /// A multi-op transaction was rejected; every per-op result is kept.
    #[error("transaction failed: {exception}")]
    TransactionFailed {
        /// The first failing op's exception.
        exception: Exception,
        /// One result per submitted op.
        results: Vec<TransactionResult>,
    },

    /// Protocol violations (unknown op, event or exception codes).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration errors (invalid settings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ZooKeeperError {
    /// Builds an `Exception` error from a raw wire code.
    ///
    /// Unknown codes turn into a `Protocol` error.
    pub fn from_code(code: i32, path: Option<&str>) -> Self {
        match ExceptionCode::try_from(code) {
            Ok(code) => Self::Exception(Exception {
                code,
                path: path.map(str::to_string),
            }),
            Err(e) => e,
        }
    }

    /// Returns the exception code carried by this error, if any.
    pub fn code(&self) -> Option<ExceptionCode> {
        match self {
            Self::Exception(e) => Some(e.code()),
            Self::TransactionFailed { exception, .. } => Some(exception.code()),
            _ => None,
        }
    }

    /// Returns true when this error is a lost connection and may be retried.
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Self::Exception(e) if e.code() == ExceptionCode::ConnectionLoss)
    }
}

impl From<Exception> for ZooKeeperError {
    fn from(exception: Exception) -> Self {
        Self::Exception(exception)
    }
}

/// A specialized `Result` type for ZooKeeper operations.
pub type Result<T> = std::result::Result<T, ZooKeeperError>;
