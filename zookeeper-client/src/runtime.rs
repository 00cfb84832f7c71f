//! Runtime abstraction for async executors.
//!
//! The retry loop waits between attempts through the [`Runtime`] trait
//! rather than calling the executor directly. The default implementation,
//! [`TokioRuntime`], delegates to the Tokio timer; tests substitute a
//! runtime that records the requested delays.
//!
//! # Example
//!
//! ```rust
//! use zookeeper_client::runtime::{Runtime, TokioRuntime};
//! use std::time::Duration;
//!
//! let rt = TokioRuntime;
//! // rt.sleep(Duration::from_secs(1)).await;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Abstraction over an async runtime's timer.
///
/// Implementations must be `Send + Sync + 'static` so they can be shared
/// by the client and every retry loop it runs.
pub trait Runtime: Send + Sync + 'static {
    /// Returns a future that completes after the given duration.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// The default [`Runtime`] implementation backed by Tokio.
///
/// This delegates `sleep` to [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRuntime;

impl Runtime for TokioRuntime {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}
