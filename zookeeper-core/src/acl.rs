//! Access control lists: identities and permission sets.

use std::fmt;

use crate::error::{Result, ZooKeeperError};
use crate::protocol::{data, Record, Value};

/// Permission bits carried by an [`Acl`].
pub mod perms {
    /// Read node data and list children.
    pub const READ: i32 = 1;
    /// Write node data.
    pub const WRITE: i32 = 2;
    /// Create children.
    pub const CREATE: i32 = 4;
    /// Delete children.
    pub const DELETE: i32 = 8;
    /// Change the node's ACL.
    pub const ADMIN: i32 = 16;
    /// Every permission.
    pub const ALL: i32 = READ | WRITE | CREATE | DELETE | ADMIN;
}

/// An authenticated identity: a scheme and an id within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Id {
    scheme: String,
    id: String,
}

impl Id {
    /// Creates an id. The scheme must be non-empty.
    pub fn new(scheme: impl Into<String>, id: impl Into<String>) -> Result<Self> {
        let scheme = scheme.into();
        if scheme.is_empty() {
            return Err(ZooKeeperError::InvalidArgument(
                "scheme must be a non-empty string".to_string(),
            ));
        }
        Ok(Self {
            scheme,
            id: id.into(),
        })
    }

    /// `world:anyone`, matching every client.
    pub fn anyone_id_unsafe() -> Self {
        Self {
            scheme: "world".to_string(),
            id: "anyone".to_string(),
        }
    }

    /// `auth:`, matching whatever ids the creating session authenticated with.
    pub fn auth_ids() -> Self {
        Self {
            scheme: "auth".to_string(),
            id: String::new(),
        }
    }

    /// Returns the scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the id within the scheme.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Converts to a `data.Id` record.
    pub fn to_record(&self) -> Result<Record> {
        Record::new(&data::ID)
            .with("scheme", self.scheme.as_str())?
            .with("id", self.id.as_str())
    }

    /// Builds an id from a `data.Id` record.
    pub fn from_record(record: &Record) -> Result<Self> {
        Self::new(
            record.get_ustring("scheme")?.unwrap_or_default(),
            record.get_ustring("id")?.unwrap_or_default(),
        )
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.id)
    }
}

/// A permission set granted to an [`Id`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Acl {
    perms: i32,
    id: Id,
}

impl Acl {
    /// Creates an ACL entry. `perms` must be a combination of [`perms`] bits.
    pub fn new(perms: i32, id: Id) -> Result<Self> {
        if !(1..=perms::ALL).contains(&perms) {
            return Err(ZooKeeperError::InvalidArgument(format!(
                "permission must be between 1 and {}, got {}",
                perms::ALL,
                perms
            )));
        }
        Ok(Self { perms, id })
    }

    /// Full access for everyone.
    pub fn open_acl_unsafe() -> Vec<Acl> {
        vec![Self {
            perms: perms::ALL,
            id: Id::anyone_id_unsafe(),
        }]
    }

    /// Full access for the creator's authenticated ids.
    pub fn creator_all_acl() -> Vec<Acl> {
        vec![Self {
            perms: perms::ALL,
            id: Id::auth_ids(),
        }]
    }

    /// Read-only access for everyone.
    pub fn read_acl_unsafe() -> Vec<Acl> {
        vec![Self {
            perms: perms::READ,
            id: Id::anyone_id_unsafe(),
        }]
    }

    /// Returns the permission bits.
    pub fn perms(&self) -> i32 {
        self.perms
    }

    /// Returns the identity.
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Converts to a `data.ACL` record.
    pub fn to_record(&self) -> Result<Record> {
        Record::new(&data::ACL)
            .with("perms", self.perms)?
            .with("id", self.id.to_record()?)
    }

    /// Builds an ACL entry from a `data.ACL` record.
    pub fn from_record(record: &Record) -> Result<Self> {
        Self::new(
            record.get_int("perms")?,
            Id::from_record(record.get_record("id")?)?,
        )
    }

    /// Converts a list of ACLs into a `vector<data.ACL>` value.
    pub fn to_vector(acls: &[Acl]) -> Result<Value> {
        let records = acls
            .iter()
            .map(|acl| acl.to_record().map(Value::Record))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Vector(Some(records)))
    }

    /// Reads a list of ACLs from a `vector<data.ACL>` field.
    pub fn from_vector(values: Option<&[Value]>) -> Result<Vec<Acl>> {
        values
            .unwrap_or_default()
            .iter()
            .map(|value| match value {
                Value::Record(record) => Self::from_record(record),
                other => Err(ZooKeeperError::Serialization(format!(
                    "expected data.ACL record, got {:?}",
                    other
                ))),
            })
            .collect()
    }
}
