//! The session collaborator the client drives.
//!
//! A [`ConnectionManager`] owns the TCP session: handshake, reconnects,
//! xid assignment, reply demultiplexing and delivery of watch
//! notifications. The client hands it the [`ClientConfig`] on connect,
//! queues requests with the configured chroot already applied, and
//! registers watchers through it.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use zookeeper_core::protocol::{Request, Response};
use zookeeper_core::{Result, State};

use crate::config::ClientConfig;
use crate::watcher::{Registration, Watcher};

/// Session-level connection to an ensemble.
///
/// `queue` resolves with the decoded reply for the request, including error
/// replies: a non-OK header code is reported through the `Response`, not as
/// an `Err`. An `Err` means no reply arrived, most commonly a lost connection
/// reported as `CONNECTION_LOSS`.
///
/// Replies are decoded with the chroot of the request they answer
/// ([`Request::chroot_path`]). Watch notifications are decoded with the
/// chroot of the config passed to [`connect`](Self::connect).
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Sends a request and waits for its reply.
    async fn queue(&self, request: Request) -> Result<Response>;

    /// Registers a one-shot watcher for data changes and deletion of `path`.
    fn register_data_watcher(&self, path: &str, watcher: Watcher) -> Registration;

    /// Registers a one-shot watcher for child changes and deletion of `path`.
    fn register_child_watcher(&self, path: &str, watcher: Watcher) -> Registration;

    /// Registers a one-shot watcher for the creation or data change of `path`.
    fn register_existence_watcher(&self, path: &str, watcher: Watcher) -> Registration;

    /// Returns the session timeout negotiated with the server.
    fn session_timeout(&self) -> Duration;

    /// Adds authentication info sent to the server on (re)connect.
    fn add_auth_info(&self, scheme: &str, auth: Bytes);

    /// Establishes the session for the servers, chroot, requested session
    /// timeout and spin delay in `config`.
    async fn connect(&self, config: &ClientConfig) -> Result<()>;

    /// Closes the session.
    async fn close(&self) -> Result<()>;

    /// Returns the session id, once a session exists.
    fn session_id(&self) -> Option<Bytes>;

    /// Returns the session password, once a session exists.
    fn session_password(&self) -> Option<Bytes>;

    /// Returns the current session state.
    fn state(&self) -> State;
}
