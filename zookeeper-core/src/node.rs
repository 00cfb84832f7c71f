//! Node metadata and creation modes.

use crate::error::{Result, ZooKeeperError};
use crate::protocol::{data, Record, Value};

/// Metadata kept by the ensemble for every node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Stat {
    /// Transaction id that created the node.
    pub czxid: i64,
    /// Transaction id that last modified the node.
    pub mzxid: i64,
    /// Creation time in milliseconds since the epoch.
    pub ctime: i64,
    /// Last modification time in milliseconds since the epoch.
    pub mtime: i64,
    /// Number of data changes.
    pub version: i32,
    /// Number of child changes.
    pub cversion: i32,
    /// Number of ACL changes.
    pub aversion: i32,
    /// Session id of the owner for ephemeral nodes, 0 otherwise.
    pub ephemeral_owner: i64,
    /// Length of the data field.
    pub data_length: i32,
    /// Number of children.
    pub num_children: i32,
    /// Transaction id that last modified the children.
    pub pzxid: i64,
}

impl Stat {
    /// Builds a `Stat` from a `data.Stat` record.
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            czxid: record.get_i64("czxid")?,
            mzxid: record.get_i64("mzxid")?,
            ctime: record.get_i64("ctime")?,
            mtime: record.get_i64("mtime")?,
            version: record.get_int("version")?,
            cversion: record.get_int("cversion")?,
            aversion: record.get_int("aversion")?,
            ephemeral_owner: record.get_i64("ephemeralOwner")?,
            data_length: record.get_int("dataLength")?,
            num_children: record.get_int("numChildren")?,
            pzxid: record.get_i64("pzxid")?,
        })
    }

    /// Converts to a `data.Stat` record.
    pub fn to_record(&self) -> Result<Record> {
        let long = |v: i64| Value::Long(v.to_be_bytes());
        Record::new(&data::STAT)
            .with("czxid", long(self.czxid))?
            .with("mzxid", long(self.mzxid))?
            .with("ctime", long(self.ctime))?
            .with("mtime", long(self.mtime))?
            .with("version", self.version)?
            .with("cversion", self.cversion)?
            .with("aversion", self.aversion)?
            .with("ephemeralOwner", long(self.ephemeral_owner))?
            .with("dataLength", self.data_length)?
            .with("numChildren", self.num_children)?
            .with("pzxid", long(self.pzxid))
    }
}

/// How a node is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CreateMode {
    /// The node outlives the creating session.
    #[default]
    Persistent = 0,
    /// The node is removed when the creating session ends.
    Ephemeral = 1,
    /// Persistent, with a monotonically increasing counter appended to the name.
    PersistentSequential = 2,
    /// Ephemeral, with a monotonically increasing counter appended to the name.
    EphemeralSequential = 3,
}

impl CreateMode {
    /// Returns the wire flags of this mode.
    pub fn value(&self) -> i32 {
        *self as i32
    }

    /// Creates a mode from its wire flags.
    pub fn from_value(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Persistent),
            1 => Ok(Self::Ephemeral),
            2 => Ok(Self::PersistentSequential),
            3 => Ok(Self::EphemeralSequential),
            other => Err(ZooKeeperError::InvalidArgument(format!(
                "unknown create mode: {}",
                other
            ))),
        }
    }

    /// Returns true for the two ephemeral modes.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Ephemeral | Self::EphemeralSequential)
    }

    /// Returns true for the two sequential modes.
    pub fn is_sequential(&self) -> bool {
        matches!(self, Self::PersistentSequential | Self::EphemeralSequential)
    }
}
