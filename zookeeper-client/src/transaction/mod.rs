//! Atomic multi-op transactions.
//!
//! A [`Transaction`] collects ops in call order and sends them as a single
//! multi request on [`commit`](Transaction::commit). The ensemble applies
//! all of them or none.
//!
//! # Example
//!
//! ```ignore
//! use zookeeper_core::{Acl, CreateMode};
//!
//! let results = client
//!     .transaction()
//!     .create("/jobs/1", None, &Acl::open_acl_unsafe(), CreateMode::Persistent)?
//!     .check("/jobs", 3)?
//!     .set_data("/jobs", Some(b"1".as_ref().into()), -1)?
//!     .commit()
//!     .await?;
//! ```

use bytes::Bytes;
use tracing::instrument;
use zookeeper_core::protocol::{Op, Request, ResponsePayload, TransactionRequest, TransactionResult};
use zookeeper_core::{validate_path, Acl, CreateMode, Exception, Result, ZooKeeperError};

use crate::client::{validate_acls, validate_data, ZooKeeperClient};

/// Builder for an atomic batch of ops.
#[derive(Debug, Clone)]
pub struct Transaction {
    client: ZooKeeperClient,
    ops: Vec<Op>,
}

impl Transaction {
    pub(crate) fn new(client: ZooKeeperClient) -> Self {
        Self {
            client,
            ops: Vec::new(),
        }
    }

    /// Returns the ops added so far, in order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Adds a node creation.
    pub fn create(
        mut self,
        path: &str,
        data: Option<Bytes>,
        acls: &[Acl],
        mode: CreateMode,
    ) -> Result<Self> {
        validate_path(path)?;
        validate_data(data.as_ref())?;
        validate_acls(acls)?;

        self.ops.push(Op::Create {
            path: path.to_string(),
            data,
            acls: acls.to_vec(),
            mode,
        });
        Ok(self)
    }

    /// Adds a version check; `-1` only checks that the node exists.
    pub fn check(mut self, path: &str, version: i32) -> Result<Self> {
        validate_path(path)?;

        self.ops.push(Op::Check {
            path: path.to_string(),
            version,
        });
        Ok(self)
    }

    /// Adds a data replacement.
    pub fn set_data(mut self, path: &str, data: Option<Bytes>, version: i32) -> Result<Self> {
        validate_path(path)?;
        validate_data(data.as_ref())?;

        self.ops.push(Op::SetData {
            path: path.to_string(),
            data,
            version,
        });
        Ok(self)
    }

    /// Adds a node deletion.
    pub fn remove(mut self, path: &str, version: i32) -> Result<Self> {
        validate_path(path)?;

        self.ops.push(Op::Delete {
            path: path.to_string(),
            version,
        });
        Ok(self)
    }

    /// Sends the ops as one atomic request.
    ///
    /// Returns one result per op. When the ensemble rejects the batch, the
    /// error is `TransactionFailed`, carrying the first failing op's code
    /// and the full result list.
    #[instrument(name = "zookeeper.transaction.commit", skip(self), fields(ops = self.ops.len()))]
    pub async fn commit(self) -> Result<Vec<TransactionResult>> {
        let request = Request::transaction(TransactionRequest::new(self.ops))?;
        let response = self.client.send(&request, None).await?;

        if !matches!(response.payload(), ResponsePayload::Transaction(_)) {
            response.check(None)?;
        }
        let results = response.into_transaction()?;

        match results.first_failure() {
            Some(code) => Err(ZooKeeperError::TransactionFailed {
                exception: Exception::new(code),
                results: results.into_results(),
            }),
            None => Ok(results.into_results()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::connection::ConnectionManager;
    use crate::watcher::{Registration, Watcher};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use zookeeper_core::protocol::Response;
    use zookeeper_core::State;

    struct Offline;

    #[async_trait]
    impl ConnectionManager for Offline {
        async fn queue(&self, _request: Request) -> Result<Response> {
            Err(ZooKeeperError::Protocol("offline".to_string()))
        }
        fn register_data_watcher(&self, _path: &str, _watcher: Watcher) -> Registration {
            Registration::Registered
        }
        fn register_child_watcher(&self, _path: &str, _watcher: Watcher) -> Registration {
            Registration::Registered
        }
        fn register_existence_watcher(&self, _path: &str, _watcher: Watcher) -> Registration {
            Registration::Registered
        }
        fn session_timeout(&self) -> Duration {
            Duration::from_secs(30)
        }
        fn add_auth_info(&self, _scheme: &str, _auth: Bytes) {}
        async fn connect(&self, _config: &ClientConfig) -> Result<()> {
            Ok(())
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
        fn session_id(&self) -> Option<Bytes> {
            None
        }
        fn session_password(&self) -> Option<Bytes> {
            None
        }
        fn state(&self) -> State {
            State::Disconnected
        }
    }

    fn client() -> ZooKeeperClient {
        ZooKeeperClient::new(ClientConfig::default(), Arc::new(Offline))
    }

    #[test]
    fn test_ops_kept_in_call_order() {
        let tx = client()
            .transaction()
            .create("/a", None, &Acl::open_acl_unsafe(), CreateMode::Persistent)
            .unwrap()
            .check("/b", 2)
            .unwrap()
            .set_data("/c", Some(Bytes::from_static(b"x")), -1)
            .unwrap()
            .remove("/d", 4)
            .unwrap();

        let paths: Vec<_> = tx.ops().iter().map(Op::path).collect();
        assert_eq!(paths, vec!["/a", "/b", "/c", "/d"]);
        assert!(matches!(tx.ops()[1], Op::Check { version: 2, .. }));
    }

    #[test]
    fn test_invalid_ops_are_rejected() {
        let tx = client().transaction();
        assert!(matches!(
            tx.clone().check("no-slash", -1),
            Err(ZooKeeperError::InvalidArgument(_))
        ));
        assert!(matches!(
            tx.clone().create("/a", None, &[], CreateMode::Persistent),
            Err(ZooKeeperError::InvalidArgument(_))
        ));
        let oversized = Bytes::from(vec![0u8; 1_048_577]);
        assert!(matches!(
            tx.set_data("/a", Some(oversized), -1),
            Err(ZooKeeperError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_surfaces_connection_errors() {
        let result = client()
            .transaction()
            .check("/a", -1)
            .unwrap()
            .commit()
            .await;
        assert!(matches!(result, Err(ZooKeeperError::Protocol(_))));
    }
}
