//! In-memory ensemble used by the integration tests.
//!
//! `FakeEnsemble` implements `ConnectionManager` by encoding each request to
//! its wire bytes, decoding them the way a server would, applying the op to
//! an in-memory tree and encoding a real reply that the client side then
//! decodes. Watch notifications travel the same way.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use zookeeper_client::{
    fire, ClientConfig, ConnectionManager, Registration, Runtime, Watcher, WatcherManager,
    ZooKeeperClient,
};
use zookeeper_core::protocol::{
    protocol, OpCode, Op, Record, Request, RequestPayload, Response, ResponsePayload,
    TransactionResponse, TransactionResult, Value, XID_NOTIFICATION,
};
use zookeeper_core::{
    Acl, CreateMode, EventType, Exception, ExceptionCode, Result, Stat, State, WatchedEvent,
};

pub const SESSION_ID: i64 = 0x1234;

/// A failure injected ahead of the next queued requests.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// The request is lost before reaching the server.
    Disconnect,
    /// The server answers with this code and no payload.
    Reply(ExceptionCode),
}

#[derive(Debug, Clone)]
struct Node {
    data: Option<Bytes>,
    acls: Vec<Acl>,
    stat: Stat,
    sequence: i32,
}

#[derive(Debug, Clone, Default)]
struct ServerWatches {
    data: BTreeSet<String>,
    exist: BTreeSet<String>,
    child: BTreeSet<String>,
}

struct Server {
    nodes: BTreeMap<String, Node>,
    watches: ServerWatches,
    zxid: i64,
    next_xid: i32,
    faults: VecDeque<Fault>,
    log: Vec<(OpCode, Option<String>)>,
    auth: Vec<(String, Bytes)>,
    state: State,
}

/// Session settings received on connect.
struct Session {
    chroot: Option<String>,
    timeout: Duration,
    config: Option<ClientConfig>,
}

/// An ensemble and session in one object.
pub struct FakeEnsemble {
    session: Mutex<Session>,
    server: Mutex<Server>,
    watchers: Mutex<WatcherManager>,
}

impl FakeEnsemble {
    pub fn new() -> Arc<Self> {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), node(None, Acl::open_acl_unsafe(), 0, 0));
        Arc::new(Self {
            session: Mutex::new(Session {
                chroot: None,
                timeout: Duration::from_secs(30),
                config: None,
            }),
            server: Mutex::new(Server {
                nodes,
                watches: ServerWatches::default(),
                zxid: 0,
                next_xid: 1,
                faults: VecDeque::new(),
                log: Vec::new(),
                auth: Vec::new(),
                state: State::Disconnected,
            }),
            watchers: Mutex::new(WatcherManager::new()),
        })
    }

    /// Queues faults applied to the next requests, in order.
    pub fn inject(&self, faults: impl IntoIterator<Item = Fault>) {
        self.server.lock().unwrap().faults.extend(faults);
    }

    /// Ops and client-side paths of every queued request, faults included.
    pub fn log(&self) -> Vec<(OpCode, Option<String>)> {
        self.server.lock().unwrap().log.clone()
    }

    /// Server-side absolute paths of every node, root included.
    pub fn server_paths(&self) -> Vec<String> {
        self.server.lock().unwrap().nodes.keys().cloned().collect()
    }

    /// Creates a node directly on the server, bypassing the client.
    pub fn seed(&self, server_path: &str, data: &[u8]) {
        let mut server = self.server.lock().unwrap();
        server.zxid += 1;
        let zxid = server.zxid;
        let parent = parent_of(server_path).to_string();
        if let Some(parent) = server.nodes.get_mut(&parent) {
            parent.stat.num_children += 1;
            parent.stat.cversion += 1;
        }
        server.nodes.insert(
            server_path.to_string(),
            node(Some(Bytes::copy_from_slice(data)), Acl::open_acl_unsafe(), zxid, 0),
        );
    }

    pub fn auth_info(&self) -> Vec<(String, Bytes)> {
        self.server.lock().unwrap().auth.clone()
    }

    pub fn watcher_manager_is_empty(&self) -> bool {
        self.watchers.lock().unwrap().is_empty()
    }

    /// The config passed to the last `connect`.
    pub fn connected_config(&self) -> Option<ClientConfig> {
        self.session.lock().unwrap().config.clone()
    }

    fn notify(&self, events: Vec<Record>) {
        let chroot = self.session.lock().unwrap().chroot.clone();
        for event in events {
            let frame = Response::reply(XID_NOTIFICATION, -1, ExceptionCode::Ok, ResponsePayload::Record(event))
                .and_then(|reply| reply.to_bytes())
                .expect("encode notification");
            let notification = Response::decode_notification(&frame, chroot.as_deref())
                .expect("decode notification");
            let record = notification.record().expect("event record");
            let event = WatchedEvent::from_record(record).expect("known event type");
            let taken = self.watchers.lock().unwrap().take(&event);
            fire(&taken, &event);
        }
    }
}

#[async_trait]
impl ConnectionManager for FakeEnsemble {
    async fn queue(&self, mut request: Request) -> Result<Response> {
        let (reply, events) = {
            let mut server = self.server.lock().unwrap();
            let op = request.op_code()?;
            server.log.push((op, request.path().map(str::to_string)));

            let xid = server.next_xid;
            server.next_xid += 1;
            request.set_xid(xid)?;

            match server.faults.pop_front() {
                Some(Fault::Disconnect) => {
                    return Err(Exception::new(ExceptionCode::ConnectionLoss).into());
                }
                Some(Fault::Reply(code)) => {
                    let reply = Response::reply(xid, server.zxid, code, ResponsePayload::Empty)?;
                    (reply, Vec::new())
                }
                None => {
                    let wire = request.to_bytes()?;
                    let received = Request::decode(&wire[4..])?;
                    server.handle(xid, &received)?
                }
            }
        };

        let bytes = reply.to_bytes()?;
        let response = Response::decode(&request, &bytes, request.chroot_path())?;
        self.notify(events);
        Ok(response)
    }

    fn register_data_watcher(&self, path: &str, watcher: Watcher) -> Registration {
        self.watchers
            .lock()
            .unwrap()
            .register_data_watcher(path, watcher)
            .unwrap()
    }

    fn register_child_watcher(&self, path: &str, watcher: Watcher) -> Registration {
        self.watchers
            .lock()
            .unwrap()
            .register_child_watcher(path, watcher)
            .unwrap()
    }

    fn register_existence_watcher(&self, path: &str, watcher: Watcher) -> Registration {
        self.watchers
            .lock()
            .unwrap()
            .register_existence_watcher(path, watcher)
            .unwrap()
    }

    fn session_timeout(&self) -> Duration {
        self.session.lock().unwrap().timeout
    }

    fn add_auth_info(&self, scheme: &str, auth: Bytes) {
        self.server.lock().unwrap().auth.push((scheme.to_string(), auth));
    }

    async fn connect(&self, config: &ClientConfig) -> Result<()> {
        {
            let mut session = self.session.lock().unwrap();
            session.chroot = config.chroot().map(str::to_string);
            session.timeout = config.session_timeout();
            session.config = Some(config.clone());
        }
        self.server.lock().unwrap().state = State::SyncConnected;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.server.lock().unwrap().state = State::Disconnected;
        Ok(())
    }

    fn session_id(&self) -> Option<Bytes> {
        Some(Bytes::copy_from_slice(&SESSION_ID.to_be_bytes()))
    }

    fn session_password(&self) -> Option<Bytes> {
        Some(Bytes::from_static(b"secret"))
    }

    fn state(&self) -> State {
        self.server.lock().unwrap().state
    }
}

type Outcome = std::result::Result<ResponsePayload, ExceptionCode>;

impl Server {
    fn handle(&mut self, xid: i32, request: &Request) -> Result<(Response, Vec<Record>)> {
        let mut events = Vec::new();
        let op = request.op_code()?;

        let outcome = match request.payload() {
            RequestPayload::Transaction(transaction) => {
                let (results, failed) = self.multi(transaction.ops(), &mut events)?;
                let payload = ResponsePayload::Transaction(TransactionResponse::new(results));
                let err = failed.unwrap_or(ExceptionCode::Ok);
                let reply = Response::reply(xid, self.zxid, err, payload)?;
                return Ok((reply, events));
            }
            RequestPayload::Record(record) => self.single(op, record, &mut events)?,
            RequestPayload::Empty => Ok(ResponsePayload::Empty),
        };

        let reply = match outcome {
            Ok(payload) => Response::reply(xid, self.zxid, ExceptionCode::Ok, payload)?,
            Err(code) => {
                events.clear();
                Response::reply(xid, self.zxid, code, ResponsePayload::Empty)?
            }
        };
        Ok((reply, events))
    }

    fn single(&mut self, op: OpCode, record: &Record, events: &mut Vec<Record>) -> Result<Outcome> {
        let path = record.get_ustring("path")?.unwrap_or_default().to_string();
        let watch = record.spec().field_index("watch").is_some() && record.get_bool("watch")?;

        let outcome = match op {
            OpCode::Create => {
                let mode = CreateMode::from_value(record.get_int("flags")?)?;
                let acls = Acl::from_vector(record.get_vector("acl")?)?;
                let data = record.get_buffer("data")?.cloned();
                match self.create(&path, data, acls, mode, events) {
                    Ok(created) => Ok(ResponsePayload::Record(
                        Record::new(&protocol::CREATE_RESPONSE).with("path", created)?,
                    )),
                    Err(code) => Err(code),
                }
            }
            OpCode::Delete => match self.delete(&path, record.get_int("version")?, events) {
                Ok(()) => Ok(ResponsePayload::Empty),
                Err(code) => Err(code),
            },
            OpCode::SetData => {
                let data = record.get_buffer("data")?.cloned();
                match self.set_data(&path, data, record.get_int("version")?, events) {
                    Ok(stat) => Ok(ResponsePayload::Record(
                        Record::new(&protocol::SET_DATA_RESPONSE).with("stat", stat.to_record()?)?,
                    )),
                    Err(code) => Err(code),
                }
            }
            OpCode::Exists => match self.nodes.get(&path) {
                Some(node) => {
                    if watch {
                        self.watches.data.insert(path.clone());
                    }
                    Ok(ResponsePayload::Record(
                        Record::new(&protocol::EXISTS_RESPONSE).with("stat", node.stat.to_record()?)?,
                    ))
                }
                None => {
                    if watch {
                        self.watches.exist.insert(path.clone());
                    }
                    Err(ExceptionCode::NoNode)
                }
            },
            OpCode::GetData => match self.nodes.get(&path) {
                Some(node) => {
                    let payload = Record::new(&protocol::GET_DATA_RESPONSE)
                        .with("data", Value::Buffer(node.data.clone()))?
                        .with("stat", node.stat.to_record()?)?;
                    if watch {
                        self.watches.data.insert(path.clone());
                    }
                    Ok(ResponsePayload::Record(payload))
                }
                None => Err(ExceptionCode::NoNode),
            },
            OpCode::GetChildren2 => match self.nodes.get(&path) {
                Some(node) => {
                    let children = self
                        .children_of(&path)
                        .into_iter()
                        .map(|name| Value::UString(Some(name)))
                        .collect();
                    let payload = Record::new(&protocol::GET_CHILDREN2_RESPONSE)
                        .with("children", Value::Vector(Some(children)))?
                        .with("stat", node.stat.to_record()?)?;
                    if watch {
                        self.watches.child.insert(path.clone());
                    }
                    Ok(ResponsePayload::Record(payload))
                }
                None => Err(ExceptionCode::NoNode),
            },
            OpCode::GetAcl => match self.nodes.get(&path) {
                Some(node) => Ok(ResponsePayload::Record(
                    Record::new(&protocol::GET_ACL_RESPONSE)
                        .with("acl", Acl::to_vector(&node.acls)?)?
                        .with("stat", node.stat.to_record()?)?,
                )),
                None => Err(ExceptionCode::NoNode),
            },
            OpCode::SetAcl => {
                let acls = Acl::from_vector(record.get_vector("acl")?)?;
                let version = record.get_int("version")?;
                match self.nodes.get_mut(&path) {
                    Some(node) if version != -1 && version != node.stat.aversion => {
                        Err(ExceptionCode::BadVersion)
                    }
                    Some(node) => {
                        node.acls = acls;
                        node.stat.aversion += 1;
                        Ok(ResponsePayload::Record(
                            Record::new(&protocol::SET_ACL_RESPONSE)
                                .with("stat", node.stat.to_record()?)?,
                        ))
                    }
                    None => Err(ExceptionCode::NoNode),
                }
            }
            OpCode::Sync => Ok(ResponsePayload::Record(
                Record::new(&protocol::SYNC_RESPONSE).with("path", path.as_str())?,
            )),
            _ => Err(ExceptionCode::Unimplemented),
        };
        Ok(outcome)
    }

    fn multi(
        &mut self,
        ops: &[Op],
        events: &mut Vec<Record>,
    ) -> Result<(Vec<TransactionResult>, Option<ExceptionCode>)> {
        let snapshot = (self.nodes.clone(), self.watches.clone());
        let zxid = self.zxid;
        let mut results = Vec::with_capacity(ops.len());
        let mut failed = None;

        for op in ops {
            if failed.is_some() {
                results.push(TransactionResult::Failed {
                    code: ExceptionCode::RuntimeInconsistency,
                });
                continue;
            }
            let result = match op {
                Op::Create {
                    path,
                    data,
                    acls,
                    mode,
                } => self
                    .create(path, data.clone(), acls.clone(), *mode, events)
                    .map(|path| TransactionResult::Created { path }),
                Op::Delete { path, version } => self
                    .delete(path, *version, events)
                    .map(|()| TransactionResult::Deleted),
                Op::SetData {
                    path,
                    data,
                    version,
                } => self
                    .set_data(path, data.clone(), *version, events)
                    .map(|stat| TransactionResult::DataSet { stat }),
                Op::Check { path, version } => match self.nodes.get(path) {
                    Some(node) if *version == -1 || *version == node.stat.version => {
                        Ok(TransactionResult::Checked)
                    }
                    Some(_) => Err(ExceptionCode::BadVersion),
                    None => Err(ExceptionCode::NoNode),
                },
            };
            match result {
                Ok(result) => results.push(result),
                Err(code) => {
                    failed = Some(code);
                    results.push(TransactionResult::Failed { code });
                }
            }
        }

        if failed.is_some() {
            (self.nodes, self.watches) = snapshot;
            self.zxid = zxid;
            events.clear();
            for result in results.iter_mut() {
                if !matches!(result, TransactionResult::Failed { .. }) {
                    *result = TransactionResult::Failed {
                        code: ExceptionCode::Ok,
                    };
                }
            }
        }
        Ok((results, failed))
    }

    fn create(
        &mut self,
        path: &str,
        data: Option<Bytes>,
        acls: Vec<Acl>,
        mode: CreateMode,
        events: &mut Vec<Record>,
    ) -> std::result::Result<String, ExceptionCode> {
        let parent_path = parent_of(path).to_string();
        let parent = self.nodes.get_mut(&parent_path).ok_or(ExceptionCode::NoNode)?;
        if parent.stat.ephemeral_owner != 0 {
            return Err(ExceptionCode::NoChildrenForEphemerals);
        }

        let actual = if mode.is_sequential() {
            format!("{}{:010}", path, parent.sequence)
        } else {
            path.to_string()
        };
        if self.nodes.contains_key(&actual) {
            return Err(ExceptionCode::NodeExists);
        }

        self.zxid += 1;
        let zxid = self.zxid;
        if let Some(parent) = self.nodes.get_mut(&parent_path) {
            parent.sequence += 1;
            parent.stat.cversion += 1;
            parent.stat.num_children += 1;
            parent.stat.pzxid = zxid;
        }
        let owner = if mode.is_ephemeral() { SESSION_ID } else { 0 };
        self.nodes.insert(actual.clone(), node(data, acls, zxid, owner));

        self.trigger(EventType::NodeCreated, &actual, events);
        self.trigger(EventType::NodeChildrenChanged, &parent_path, events);
        Ok(actual)
    }

    fn delete(
        &mut self,
        path: &str,
        version: i32,
        events: &mut Vec<Record>,
    ) -> std::result::Result<(), ExceptionCode> {
        let node = self.nodes.get(path).ok_or(ExceptionCode::NoNode)?;
        if version != -1 && version != node.stat.version {
            return Err(ExceptionCode::BadVersion);
        }
        if node.stat.num_children > 0 {
            return Err(ExceptionCode::NotEmpty);
        }

        self.zxid += 1;
        self.nodes.remove(path);
        let parent_path = parent_of(path).to_string();
        if let Some(parent) = self.nodes.get_mut(&parent_path) {
            parent.stat.cversion += 1;
            parent.stat.num_children -= 1;
        }

        self.trigger(EventType::NodeDeleted, path, events);
        self.trigger(EventType::NodeChildrenChanged, &parent_path, events);
        Ok(())
    }

    fn set_data(
        &mut self,
        path: &str,
        data: Option<Bytes>,
        version: i32,
        events: &mut Vec<Record>,
    ) -> std::result::Result<Stat, ExceptionCode> {
        self.zxid += 1;
        let zxid = self.zxid;
        let node = self.nodes.get_mut(path).ok_or(ExceptionCode::NoNode)?;
        if version != -1 && version != node.stat.version {
            return Err(ExceptionCode::BadVersion);
        }

        node.stat.data_length = data.as_ref().map_or(0, |d| d.len() as i32);
        node.data = data;
        node.stat.version += 1;
        node.stat.mzxid = zxid;
        node.stat.mtime = zxid;
        let stat = node.stat;

        self.trigger(EventType::NodeDataChanged, path, events);
        Ok(stat)
    }

    fn children_of(&self, path: &str) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|candidate| candidate.as_str() != "/" && parent_of(candidate) == path)
            .map(|candidate| candidate.rsplit('/').next().unwrap_or_default().to_string())
            .collect()
    }

    fn trigger(&mut self, event_type: EventType, path: &str, events: &mut Vec<Record>) {
        let watches = &mut self.watches;
        let fired = match event_type {
            EventType::NodeCreated | EventType::NodeDataChanged => {
                watches.data.remove(path) | watches.exist.remove(path)
            }
            EventType::NodeChildrenChanged => watches.child.remove(path),
            EventType::NodeDeleted => watches.data.remove(path) | watches.child.remove(path),
        };
        if fired {
            let event = Record::new(&protocol::WATCHER_EVENT)
                .with("type", event_type.value())
                .and_then(|r| r.with("state", State::SyncConnected.code()))
                .and_then(|r| r.with("path", path))
                .expect("watcher event record");
            events.push(event);
        }
    }
}

fn node(data: Option<Bytes>, acls: Vec<Acl>, zxid: i64, owner: i64) -> Node {
    let data_length = data.as_ref().map_or(0, |d| d.len() as i32);
    Node {
        data,
        acls,
        stat: Stat {
            czxid: zxid,
            mzxid: zxid,
            ctime: zxid,
            mtime: zxid,
            ephemeral_owner: owner,
            data_length,
            pzxid: zxid,
            ..Stat::default()
        },
        sequence: 0,
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}

/// Runtime that records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingRuntime {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingRuntime {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Runtime for RecordingRuntime {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        self.delays.lock().unwrap().push(duration);
        Box::pin(async {})
    }
}

/// Builds a client over `ensemble` with the given retry count.
pub fn client(
    ensemble: &Arc<FakeEnsemble>,
    retries: u32,
) -> (ZooKeeperClient, Arc<RecordingRuntime>) {
    let config = ClientConfig::builder().retries(retries).build().unwrap();
    client_with(ensemble, config)
}

/// Builds a client over `ensemble` from a full config.
pub fn client_with(
    ensemble: &Arc<FakeEnsemble>,
    config: ClientConfig,
) -> (ZooKeeperClient, Arc<RecordingRuntime>) {
    init_tracing();
    let runtime = Arc::new(RecordingRuntime::default());
    let client = ZooKeeperClient::with_runtime(
        config,
        Arc::clone(ensemble) as Arc<dyn ConnectionManager>,
        Arc::clone(&runtime) as Arc<dyn Runtime>,
    );
    (client, runtime)
}

/// Builds and connects a client whose connect string ends in `chroot`.
pub async fn chrooted_client(ensemble: &Arc<FakeEnsemble>, chroot: &str) -> ZooKeeperClient {
    let config = ClientConfig::builder()
        .connect_string(format!("localhost:2181{}", chroot))
        .build()
        .unwrap();
    let (client, _) = client_with(ensemble, config);
    client.connect().await.unwrap();
    client
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
