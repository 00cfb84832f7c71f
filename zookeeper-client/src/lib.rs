//! Async Rust client for [Apache ZooKeeper](https://zookeeper.apache.org/).
//!
//! This crate layers node operations, one-shot watches, atomic multi-op
//! transactions and a connection-loss retry policy over the jute codec in
//! [`zookeeper_core`]. Session plumbing (handshake, reconnects, reply
//! demultiplexing) sits behind the [`ConnectionManager`] trait, so the same
//! client runs against a real ensemble or an in-memory test double.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use zookeeper_client::{ClientConfig, ZooKeeperClient};
//! use zookeeper_client::core::{Acl, CreateMode};
//!
//! let config = ClientConfig::builder()
//!     .connect_string("zk1:2181,zk2:2181/app")
//!     .retries(3)
//!     .build()?;
//! let client = ZooKeeperClient::new(config, Arc::new(my_connection));
//! client.connect().await?;
//!
//! let path = client
//!     .create("/config", Some("v1".into()), &Acl::open_acl_unsafe(), CreateMode::Persistent)
//!     .await?;
//! let (data, stat) = client.get_data(&path).await?;
//! ```
//!
//! # Operations
//!
//! | Operation | Method |
//! |-----------|--------|
//! | Create / delete | [`create`](ZooKeeperClient::create), [`remove`](ZooKeeperClient::remove) |
//! | Read / write data | [`get_data`](ZooKeeperClient::get_data), [`set_data`](ZooKeeperClient::set_data) |
//! | ACLs | [`get_acl`](ZooKeeperClient::get_acl), [`set_acl`](ZooKeeperClient::set_acl) |
//! | Existence and children | [`exists`](ZooKeeperClient::exists), [`get_children`](ZooKeeperClient::get_children) |
//! | Subtrees | [`mkdirp`](ZooKeeperClient::mkdirp), [`remove_recursive`](ZooKeeperClient::remove_recursive), [`list_sub_tree_bfs`](ZooKeeperClient::list_sub_tree_bfs) |
//! | Transactions | [`transaction`](ZooKeeperClient::transaction) |
//!
//! # Retries
//!
//! An attempt that fails with `CONNECTION_LOSS` is retried up to
//! [`RetryConfig::retries`] times, waiting `initial_backoff * 2^attempt`
//! capped by the session timeout. Every other error is returned as is.
//!
//! # Configuration
//!
//! Besides the builder, configuration can come from the environment
//! (`ClientConfig::from_env`) or, with the `config-file` feature, from YAML
//! and TOML files.

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod config_file;
pub mod connection;
pub mod retry;
pub mod runtime;
pub mod transaction;
pub mod watcher;

pub use client::ZooKeeperClient;
pub use config::{
    ClientConfig, ClientConfigBuilder, ConfigError, ConnectString, RetryConfig,
    RetryConfigBuilder, ServerAddress,
};
pub use config_file::{FileConfig, FileRetryConfig};
#[cfg(feature = "config-file")]
pub use config_file::load_config;
pub use connection::ConnectionManager;
pub use runtime::{Runtime, TokioRuntime};
pub use transaction::Transaction;
pub use watcher::{fire, watcher, Registration, Watcher, WatcherKind, WatcherManager};
pub use zookeeper_core as core;
