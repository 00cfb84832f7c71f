//! ZooKeeper client entry point.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};
use zookeeper_core::protocol::{
    protocol, OpCode, Record, Request, Response, Value, DATA_SIZE_LIMIT,
};
use zookeeper_core::{
    validate_path, Acl, CreateMode, ExceptionCode, Result, Stat, State, ZooKeeperError,
};

use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::retry;
use crate::runtime::{Runtime, TokioRuntime};
use crate::transaction::Transaction;
use crate::watcher::{Registration, Watcher, WatcherKind};

/// The main entry point for working with a ZooKeeper ensemble.
///
/// `ZooKeeperClient` validates arguments, builds protocol requests and hands
/// them to a [`ConnectionManager`], retrying attempts that lose their
/// connection according to the configured retry policy. Cloning is cheap
/// and clones share the same session.
///
/// # Example
///
/// ```ignore
/// use zookeeper_client::{ClientConfig, ZooKeeperClient};
/// use zookeeper_core::{Acl, CreateMode};
///
/// let config = ClientConfig::builder()
///     .connect_string("localhost:2181/app")
///     .retries(2)
///     .build()?;
/// let client = ZooKeeperClient::new(config, connection);
/// client.connect().await?;
///
/// client.mkdirp("/a/b", None, &Acl::open_acl_unsafe(), CreateMode::Persistent).await?;
/// let (data, stat) = client.get_data("/a/b").await?;
///
/// client.close().await?;
/// ```
#[derive(Clone)]
pub struct ZooKeeperClient {
    config: Arc<ClientConfig>,
    connection: Arc<dyn ConnectionManager>,
    runtime: Arc<dyn Runtime>,
}

impl ZooKeeperClient {
    /// Creates a client over `connection`, waiting between retries with Tokio.
    pub fn new(config: ClientConfig, connection: Arc<dyn ConnectionManager>) -> Self {
        Self::with_runtime(config, connection, Arc::new(TokioRuntime))
    }

    /// Creates a client that waits between retries through `runtime`.
    pub fn with_runtime(
        config: ClientConfig,
        connection: Arc<dyn ConnectionManager>,
        runtime: Arc<dyn Runtime>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            connection,
            runtime,
        }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Establishes the session.
    #[instrument(name = "zookeeper.connect", skip(self))]
    pub async fn connect(&self) -> Result<()> {
        info!(connect_string = %self.config.connect_string(), "connecting");
        self.connection.connect(&self.config).await
    }

    /// Closes the session.
    ///
    /// Calls still waiting between retries are not interrupted; dropping
    /// their futures cancels them.
    #[instrument(name = "zookeeper.close", skip(self))]
    pub async fn close(&self) -> Result<()> {
        info!("closing session");
        self.connection.close().await
    }

    /// Returns the current session state.
    pub fn state(&self) -> State {
        self.connection.state()
    }

    /// Returns the session id, once a session exists.
    pub fn session_id(&self) -> Option<Bytes> {
        self.connection.session_id()
    }

    /// Returns the session password, once a session exists.
    pub fn session_password(&self) -> Option<Bytes> {
        self.connection.session_password()
    }

    /// Returns the negotiated session timeout.
    pub fn session_timeout(&self) -> Duration {
        self.connection.session_timeout()
    }

    /// Adds authentication info for this session.
    pub fn add_auth_info(&self, scheme: &str, auth: Bytes) -> Result<()> {
        if scheme.is_empty() {
            return Err(ZooKeeperError::InvalidArgument(
                "scheme must be a non-empty string".to_string(),
            ));
        }
        self.connection.add_auth_info(scheme, auth);
        Ok(())
    }

    /// Creates a node and returns its actual path.
    ///
    /// Sequential modes make the returned path differ from `path`.
    #[instrument(name = "zookeeper.create", skip(self, data, acls))]
    pub async fn create(
        &self,
        path: &str,
        data: Option<Bytes>,
        acls: &[Acl],
        mode: CreateMode,
    ) -> Result<String> {
        validate_path(path)?;
        validate_data(data.as_ref())?;
        validate_acls(acls)?;

        let payload = Record::new(&protocol::CREATE_REQUEST)
            .with("path", path)?
            .with("data", Value::Buffer(data))?
            .with("acl", Acl::to_vector(acls)?)?
            .with("flags", mode.value())?;
        let request = Request::with_record(OpCode::Create, payload)?;

        let response = self.execute(&request, path).await?;
        Ok(response
            .record()?
            .get_ustring("path")?
            .unwrap_or_default()
            .to_string())
    }

    /// Deletes a node; `version` `-1` matches any version.
    #[instrument(name = "zookeeper.remove", skip(self))]
    pub async fn remove(&self, path: &str, version: i32) -> Result<()> {
        validate_path(path)?;

        let payload = Record::new(&protocol::DELETE_REQUEST)
            .with("path", path)?
            .with("version", version)?;
        let request = Request::with_record(OpCode::Delete, payload)?;

        self.execute(&request, path).await?;
        Ok(())
    }

    /// Replaces a node's data; `version` `-1` matches any version.
    #[instrument(name = "zookeeper.set_data", skip(self, data))]
    pub async fn set_data(&self, path: &str, data: Option<Bytes>, version: i32) -> Result<Stat> {
        validate_path(path)?;
        validate_data(data.as_ref())?;

        let payload = Record::new(&protocol::SET_DATA_REQUEST)
            .with("path", path)?
            .with("data", Value::Buffer(data))?
            .with("version", version)?;
        let request = Request::with_record(OpCode::SetData, payload)?;

        let response = self.execute(&request, path).await?;
        Stat::from_record(response.record()?.get_record("stat")?)
    }

    /// Reads a node's data and stat.
    #[instrument(name = "zookeeper.get_data", skip(self))]
    pub async fn get_data(&self, path: &str) -> Result<(Option<Bytes>, Stat)> {
        self.get_data_inner(path, None).await
    }

    /// Reads a node's data and stat, leaving a one-shot data watcher.
    #[instrument(name = "zookeeper.get_data", skip(self, watcher))]
    pub async fn get_data_with_watch(
        &self,
        path: &str,
        watcher: Watcher,
    ) -> Result<(Option<Bytes>, Stat)> {
        self.get_data_inner(path, Some(watcher)).await
    }

    async fn get_data_inner(
        &self,
        path: &str,
        watcher: Option<Watcher>,
    ) -> Result<(Option<Bytes>, Stat)> {
        validate_path(path)?;

        let payload = Record::new(&protocol::GET_DATA_REQUEST)
            .with("path", path)?
            .with("watch", watcher.is_some())?;
        let request = Request::with_record(OpCode::GetData, payload)?;

        let response = self.execute(&request, path).await?;
        if let Some(watcher) = watcher {
            self.register_watcher(WatcherKind::Data, path, watcher);
        }

        let record = response.record()?;
        let data = record.get_buffer("data")?.cloned();
        let stat = Stat::from_record(record.get_record("stat")?)?;
        Ok((data, stat))
    }

    /// Replaces a node's ACL; `version` `-1` matches any ACL version.
    #[instrument(name = "zookeeper.set_acl", skip(self, acls))]
    pub async fn set_acl(&self, path: &str, acls: &[Acl], version: i32) -> Result<Stat> {
        validate_path(path)?;
        validate_acls(acls)?;

        let payload = Record::new(&protocol::SET_ACL_REQUEST)
            .with("path", path)?
            .with("acl", Acl::to_vector(acls)?)?
            .with("version", version)?;
        let request = Request::with_record(OpCode::SetAcl, payload)?;

        let response = self.execute(&request, path).await?;
        Stat::from_record(response.record()?.get_record("stat")?)
    }

    /// Reads a node's ACL and stat.
    #[instrument(name = "zookeeper.get_acl", skip(self))]
    pub async fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat)> {
        validate_path(path)?;

        let payload = Record::new(&protocol::GET_ACL_REQUEST).with("path", path)?;
        let request = Request::with_record(OpCode::GetAcl, payload)?;

        let response = self.execute(&request, path).await?;
        let record = response.record()?;
        let acls = Acl::from_vector(record.get_vector("acl")?)?;
        let stat = Stat::from_record(record.get_record("stat")?)?;
        Ok((acls, stat))
    }

    /// Returns the node's stat, or `None` when it does not exist.
    #[instrument(name = "zookeeper.exists", skip(self))]
    pub async fn exists(&self, path: &str) -> Result<Option<Stat>> {
        self.exists_inner(path, None).await
    }

    /// Like [`exists`](Self::exists), leaving a one-shot watcher.
    ///
    /// An existing node gets a data watcher; a missing one gets an
    /// existence watcher that fires when the node is created.
    #[instrument(name = "zookeeper.exists", skip(self, watcher))]
    pub async fn exists_with_watch(&self, path: &str, watcher: Watcher) -> Result<Option<Stat>> {
        self.exists_inner(path, Some(watcher)).await
    }

    async fn exists_inner(&self, path: &str, watcher: Option<Watcher>) -> Result<Option<Stat>> {
        validate_path(path)?;

        let payload = Record::new(&protocol::EXISTS_REQUEST)
            .with("path", path)?
            .with("watch", watcher.is_some())?;
        let request = Request::with_record(OpCode::Exists, payload)?;

        let response = self.send(&request, Some(path)).await?;
        let exists = match response.check(Some(path)) {
            Ok(()) => true,
            Err(e) if e.code() == Some(ExceptionCode::NoNode) => false,
            Err(e) => return Err(e),
        };

        if let Some(watcher) = watcher {
            if exists {
                self.register_watcher(WatcherKind::Data, path, watcher);
            } else {
                self.register_watcher(WatcherKind::Existence, path, watcher);
            }
        }

        if !exists {
            return Ok(None);
        }
        let stat = Stat::from_record(response.record()?.get_record("stat")?)?;
        Ok(Some(stat))
    }

    /// Lists a node's children and returns them with its stat.
    #[instrument(name = "zookeeper.get_children", skip(self))]
    pub async fn get_children(&self, path: &str) -> Result<(Vec<String>, Stat)> {
        self.get_children_inner(path, None).await
    }

    /// Like [`get_children`](Self::get_children), leaving a one-shot child watcher.
    #[instrument(name = "zookeeper.get_children", skip(self, watcher))]
    pub async fn get_children_with_watch(
        &self,
        path: &str,
        watcher: Watcher,
    ) -> Result<(Vec<String>, Stat)> {
        self.get_children_inner(path, Some(watcher)).await
    }

    async fn get_children_inner(
        &self,
        path: &str,
        watcher: Option<Watcher>,
    ) -> Result<(Vec<String>, Stat)> {
        validate_path(path)?;

        let payload = Record::new(&protocol::GET_CHILDREN2_REQUEST)
            .with("path", path)?
            .with("watch", watcher.is_some())?;
        let request = Request::with_record(OpCode::GetChildren2, payload)?;

        let response = self.execute(&request, path).await?;
        if let Some(watcher) = watcher {
            self.register_watcher(WatcherKind::Child, path, watcher);
        }

        let record = response.record()?;
        let children = record
            .get_vector("children")?
            .unwrap_or_default()
            .iter()
            .map(|value| match value {
                Value::UString(Some(child)) => Ok(child.clone()),
                other => Err(ZooKeeperError::Serialization(format!(
                    "expected child name, got {:?}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        let stat = Stat::from_record(record.get_record("stat")?)?;
        Ok((children, stat))
    }

    /// Lists `path` and every node below it, breadth first.
    ///
    /// The listing is not an atomic snapshot; it spans one request per node.
    #[instrument(name = "zookeeper.list_sub_tree_bfs", skip(self))]
    pub async fn list_sub_tree_bfs(&self, path: &str) -> Result<Vec<String>> {
        validate_path(path)?;

        let mut tree = vec![path.to_string()];
        let mut pending = VecDeque::from([path.to_string()]);
        while let Some(node) = pending.pop_front() {
            let (children, _) = self.get_children(&node).await?;
            for child in children {
                let child_path = if node == "/" {
                    format!("/{}", child)
                } else {
                    format!("{}/{}", node, child)
                };
                tree.push(child_path.clone());
                pending.push_back(child_path);
            }
        }
        Ok(tree)
    }

    /// Deletes `path` and everything below it, deepest nodes first.
    ///
    /// Nodes that disappear concurrently are skipped.
    #[instrument(name = "zookeeper.remove_recursive", skip(self))]
    pub async fn remove_recursive(&self, path: &str, version: i32) -> Result<()> {
        validate_path(path)?;

        let tree = self.list_sub_tree_bfs(path).await?;
        for node in tree.iter().rev() {
            match self.remove(node, version).await {
                Ok(()) => {}
                Err(e) if e.code() == Some(ExceptionCode::NoNode) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Creates `path` and any missing ancestors, like `mkdir -p`.
    ///
    /// Every created node gets `data`, `acls` and `mode`. Existing nodes are
    /// left alone. Returns `path`.
    #[instrument(name = "zookeeper.mkdirp", skip(self, data, acls))]
    pub async fn mkdirp(
        &self,
        path: &str,
        data: Option<Bytes>,
        acls: &[Acl],
        mode: CreateMode,
    ) -> Result<String> {
        validate_path(path)?;
        validate_data(data.as_ref())?;
        validate_acls(acls)?;

        let mut current = String::new();
        for segment in path.split('/').skip(1).filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            match self.create(&current, data.clone(), acls, mode).await {
                Ok(_) => {}
                Err(e) if e.code() == Some(ExceptionCode::NodeExists) => {}
                Err(e) => return Err(e),
            }
        }
        if current.is_empty() {
            current.push('/');
        }
        Ok(current)
    }

    /// Flushes the channel between this client and the leader for `path`.
    #[instrument(name = "zookeeper.sync", skip(self))]
    pub async fn sync(&self, path: &str) -> Result<()> {
        validate_path(path)?;

        let payload = Record::new(&protocol::SYNC_REQUEST).with("path", path)?;
        let request = Request::with_record(OpCode::Sync, payload)?;

        self.execute(&request, path).await?;
        Ok(())
    }

    /// Starts an empty transaction.
    pub fn transaction(&self) -> Transaction {
        Transaction::new(self.clone())
    }

    /// Sends `request` until it gets a reply that is not a lost connection,
    /// then fails on any error code in the reply.
    pub(crate) async fn execute(&self, request: &Request, path: &str) -> Result<Response> {
        let response = self.send(request, Some(path)).await?;
        response.check(Some(path))?;
        Ok(response)
    }

    /// Sends `request` under the configured chroot with retries, returning
    /// the last reply as is unless it reports a lost connection.
    pub(crate) async fn send(&self, request: &Request, path: Option<&str>) -> Result<Response> {
        let mut request = request.clone();
        request.set_chroot_path(self.config.chroot());

        let connection = &self.connection;
        let request = &request;
        retry::attempt(
            self.runtime.as_ref(),
            self.config.retry(),
            || connection.session_timeout(),
            move |_| send_once(&**connection, request, path),
        )
        .await
    }

    /// Hands a watcher to the connection after a successful read.
    ///
    /// A different watcher already pending for the key keeps its slot and
    /// `watcher` is dropped.
    fn register_watcher(&self, kind: WatcherKind, path: &str, watcher: Watcher) -> Registration {
        let outcome = match kind {
            WatcherKind::Data => self.connection.register_data_watcher(path, watcher),
            WatcherKind::Child => self.connection.register_child_watcher(path, watcher),
            WatcherKind::Existence => self.connection.register_existence_watcher(path, watcher),
        };
        match outcome {
            Registration::Occupied => {
                warn!(%kind, path, "another watcher is pending; new watcher dropped")
            }
            _ => debug!(%kind, path, ?outcome, "watcher handed to connection"),
        }
        outcome
    }
}

async fn send_once(
    connection: &dyn ConnectionManager,
    request: &Request,
    path: Option<&str>,
) -> Result<Response> {
    let response = connection.queue(request.clone()).await?;
    if response.err()? == ExceptionCode::ConnectionLoss.value() {
        return Err(ZooKeeperError::from_code(response.err()?, path));
    }
    Ok(response)
}

pub(crate) fn validate_data(data: Option<&Bytes>) -> Result<()> {
    match data {
        Some(data) if data.len() > DATA_SIZE_LIMIT => Err(ZooKeeperError::InvalidArgument(
            format!(
                "data must be equal or smaller than {} bytes, got {}",
                DATA_SIZE_LIMIT,
                data.len()
            ),
        )),
        _ => Ok(()),
    }
}

pub(crate) fn validate_acls(acls: &[Acl]) -> Result<()> {
    if acls.is_empty() {
        return Err(ZooKeeperError::InvalidArgument(
            "acls must be a non-empty list".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Debug for ZooKeeperClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZooKeeperClient")
            .field("config", &self.config)
            .field("state", &self.connection.state())
            .finish()
    }
}
