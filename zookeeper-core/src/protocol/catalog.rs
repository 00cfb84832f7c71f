//! The jute message catalog.
//!
//! Every message kind is a static [`RecordSpec`] whose field order matches
//! the published schema. [`Catalog`] indexes them by `(module, class)`.

use std::collections::HashMap;

use super::constants::OpCode;
use super::field::FieldType;
use super::record::{FieldSpec, Record, RecordSpec};
use crate::error::{Result, ZooKeeperError};

const USTRING_VECTOR: FieldType = FieldType::Vector(&FieldType::UString);

/// Records of the `data` module.
pub mod data {
    use super::*;

    /// `data.Id`
    pub static ID: RecordSpec = RecordSpec {
        module: "data",
        name: "Id",
        fields: &[
            FieldSpec::new("scheme", FieldType::UString),
            FieldSpec::new("id", FieldType::UString),
        ],
    };

    /// `data.ACL`
    pub static ACL: RecordSpec = RecordSpec {
        module: "data",
        name: "ACL",
        fields: &[
            FieldSpec::new("perms", FieldType::Int),
            FieldSpec::new("id", FieldType::Record(&ID)),
        ],
    };

    /// `data.Stat`
    pub static STAT: RecordSpec = RecordSpec {
        module: "data",
        name: "Stat",
        fields: &[
            FieldSpec::new("czxid", FieldType::Long),
            FieldSpec::new("mzxid", FieldType::Long),
            FieldSpec::new("ctime", FieldType::Long),
            FieldSpec::new("mtime", FieldType::Long),
            FieldSpec::new("version", FieldType::Int),
            FieldSpec::new("cversion", FieldType::Int),
            FieldSpec::new("aversion", FieldType::Int),
            FieldSpec::new("ephemeralOwner", FieldType::Long),
            FieldSpec::new("dataLength", FieldType::Int),
            FieldSpec::new("numChildren", FieldType::Int),
            FieldSpec::new("pzxid", FieldType::Long),
        ],
    };

    pub(super) static ALL: [&RecordSpec; 3] = [&ID, &ACL, &STAT];
}

/// Records of the `protocol` module.
pub mod protocol {
    use super::*;

    static ACL_ELEMENT: FieldType = FieldType::Record(&data::ACL);

    macro_rules! record {
        ($ident:ident, $name:literal, [$(($field:literal, $ty:expr)),* $(,)?]) => {
            #[doc = concat!("`protocol.", $name, "`")]
            pub static $ident: RecordSpec = RecordSpec {
                module: "protocol",
                name: $name,
                fields: &[$(FieldSpec::new($field, $ty)),*],
            };
        };
    }

    record!(CONNECT_REQUEST, "ConnectRequest", [
        ("protocolVersion", FieldType::Int),
        ("lastZxidSeen", FieldType::Long),
        ("timeOut", FieldType::Int),
        ("sessionId", FieldType::Long),
        ("passwd", FieldType::Buffer),
    ]);

    record!(CONNECT_RESPONSE, "ConnectResponse", [
        ("protocolVersion", FieldType::Int),
        ("timeOut", FieldType::Int),
        ("sessionId", FieldType::Long),
        ("passwd", FieldType::Buffer),
    ]);

    record!(SET_WATCHES, "SetWatches", [
        ("relativeZxid", FieldType::Long),
        ("dataWatches", USTRING_VECTOR),
        ("existWatches", USTRING_VECTOR),
        ("childWatches", USTRING_VECTOR),
    ]);

    record!(REQUEST_HEADER, "RequestHeader", [
        ("xid", FieldType::Int),
        ("type", FieldType::Int),
    ]);

    record!(MULTI_HEADER, "MultiHeader", [
        ("type", FieldType::Int),
        ("done", FieldType::Boolean),
        ("err", FieldType::Int),
    ]);

    record!(AUTH_PACKET, "AuthPacket", [
        ("type", FieldType::Int),
        ("scheme", FieldType::UString),
        ("auth", FieldType::Buffer),
    ]);

    record!(REPLY_HEADER, "ReplyHeader", [
        ("xid", FieldType::Int),
        ("zxid", FieldType::Long),
        ("err", FieldType::Int),
    ]);

    record!(GET_DATA_REQUEST, "GetDataRequest", [
        ("path", FieldType::UString),
        ("watch", FieldType::Boolean),
    ]);

    record!(SET_DATA_REQUEST, "SetDataRequest", [
        ("path", FieldType::UString),
        ("data", FieldType::Buffer),
        ("version", FieldType::Int),
    ]);

    record!(SET_DATA_RESPONSE, "SetDataResponse", [
        ("stat", FieldType::Record(&data::STAT)),
    ]);

    record!(CREATE_REQUEST, "CreateRequest", [
        ("path", FieldType::UString),
        ("data", FieldType::Buffer),
        ("acl", FieldType::Vector(&ACL_ELEMENT)),
        ("flags", FieldType::Int),
    ]);

    record!(DELETE_REQUEST, "DeleteRequest", [
        ("path", FieldType::UString),
        ("version", FieldType::Int),
    ]);

    record!(GET_CHILDREN_REQUEST, "GetChildrenRequest", [
        ("path", FieldType::UString),
        ("watch", FieldType::Boolean),
    ]);

    record!(GET_CHILDREN2_REQUEST, "GetChildren2Request", [
        ("path", FieldType::UString),
        ("watch", FieldType::Boolean),
    ]);

    record!(CHECK_VERSION_REQUEST, "CheckVersionRequest", [
        ("path", FieldType::UString),
        ("version", FieldType::Int),
    ]);

    record!(SYNC_REQUEST, "SyncRequest", [
        ("path", FieldType::UString),
    ]);

    record!(SYNC_RESPONSE, "SyncResponse", [
        ("path", FieldType::UString),
    ]);

    record!(GET_ACL_REQUEST, "GetACLRequest", [
        ("path", FieldType::UString),
    ]);

    record!(SET_ACL_REQUEST, "SetACLRequest", [
        ("path", FieldType::UString),
        ("acl", FieldType::Vector(&ACL_ELEMENT)),
        ("version", FieldType::Int),
    ]);

    record!(SET_ACL_RESPONSE, "SetACLResponse", [
        ("stat", FieldType::Record(&data::STAT)),
    ]);

    record!(WATCHER_EVENT, "WatcherEvent", [
        ("type", FieldType::Int),
        ("state", FieldType::Int),
        ("path", FieldType::UString),
    ]);

    record!(ERROR_RESPONSE, "ErrorResponse", [
        ("err", FieldType::Int),
    ]);

    record!(CREATE_RESPONSE, "CreateResponse", [
        ("path", FieldType::UString),
    ]);

    record!(EXISTS_REQUEST, "ExistsRequest", [
        ("path", FieldType::UString),
        ("watch", FieldType::Boolean),
    ]);

    record!(EXISTS_RESPONSE, "ExistsResponse", [
        ("stat", FieldType::Record(&data::STAT)),
    ]);

    record!(GET_DATA_RESPONSE, "GetDataResponse", [
        ("data", FieldType::Buffer),
        ("stat", FieldType::Record(&data::STAT)),
    ]);

    record!(GET_CHILDREN_RESPONSE, "GetChildrenResponse", [
        ("children", USTRING_VECTOR),
    ]);

    record!(GET_CHILDREN2_RESPONSE, "GetChildren2Response", [
        ("children", USTRING_VECTOR),
        ("stat", FieldType::Record(&data::STAT)),
    ]);

    record!(GET_ACL_RESPONSE, "GetACLResponse", [
        ("acl", FieldType::Vector(&ACL_ELEMENT)),
        ("stat", FieldType::Record(&data::STAT)),
    ]);

    pub(super) static ALL: [&RecordSpec; 29] = [
        &CONNECT_REQUEST,
        &CONNECT_RESPONSE,
        &SET_WATCHES,
        &REQUEST_HEADER,
        &MULTI_HEADER,
        &AUTH_PACKET,
        &REPLY_HEADER,
        &GET_DATA_REQUEST,
        &SET_DATA_REQUEST,
        &SET_DATA_RESPONSE,
        &CREATE_REQUEST,
        &DELETE_REQUEST,
        &GET_CHILDREN_REQUEST,
        &GET_CHILDREN2_REQUEST,
        &CHECK_VERSION_REQUEST,
        &SYNC_REQUEST,
        &SYNC_RESPONSE,
        &GET_ACL_REQUEST,
        &SET_ACL_REQUEST,
        &SET_ACL_RESPONSE,
        &WATCHER_EVENT,
        &ERROR_RESPONSE,
        &CREATE_RESPONSE,
        &EXISTS_REQUEST,
        &EXISTS_RESPONSE,
        &GET_DATA_RESPONSE,
        &GET_CHILDREN_RESPONSE,
        &GET_CHILDREN2_RESPONSE,
        &GET_ACL_RESPONSE,
    ];
}

/// Returns the payload spec of a successful reply to `op`.
///
/// `None` means the reply carries no payload. Multi replies are decoded by
/// the transaction codec and also return `None` here.
pub fn response_spec(op: OpCode) -> Option<&'static RecordSpec> {
    match op {
        OpCode::Create => Some(&protocol::CREATE_RESPONSE),
        OpCode::Exists => Some(&protocol::EXISTS_RESPONSE),
        OpCode::GetData => Some(&protocol::GET_DATA_RESPONSE),
        OpCode::SetData => Some(&protocol::SET_DATA_RESPONSE),
        OpCode::GetAcl => Some(&protocol::GET_ACL_RESPONSE),
        OpCode::SetAcl => Some(&protocol::SET_ACL_RESPONSE),
        OpCode::GetChildren => Some(&protocol::GET_CHILDREN_RESPONSE),
        OpCode::GetChildren2 => Some(&protocol::GET_CHILDREN2_RESPONSE),
        OpCode::Sync => Some(&protocol::SYNC_RESPONSE),
        OpCode::Notification => Some(&protocol::WATCHER_EVENT),
        _ => None,
    }
}

/// Returns the payload spec of a request carrying `op`.
///
/// `None` means the request has no payload record. Multi requests are
/// encoded by the transaction codec and also return `None` here.
pub fn request_spec(op: OpCode) -> Option<&'static RecordSpec> {
    match op {
        OpCode::Create => Some(&protocol::CREATE_REQUEST),
        OpCode::Delete => Some(&protocol::DELETE_REQUEST),
        OpCode::Exists => Some(&protocol::EXISTS_REQUEST),
        OpCode::GetData => Some(&protocol::GET_DATA_REQUEST),
        OpCode::SetData => Some(&protocol::SET_DATA_REQUEST),
        OpCode::GetAcl => Some(&protocol::GET_ACL_REQUEST),
        OpCode::SetAcl => Some(&protocol::SET_ACL_REQUEST),
        OpCode::GetChildren => Some(&protocol::GET_CHILDREN_REQUEST),
        OpCode::GetChildren2 => Some(&protocol::GET_CHILDREN2_REQUEST),
        OpCode::Sync => Some(&protocol::SYNC_REQUEST),
        OpCode::Check => Some(&protocol::CHECK_VERSION_REQUEST),
        OpCode::Auth => Some(&protocol::AUTH_PACKET),
        OpCode::SetWatches => Some(&protocol::SET_WATCHES),
        _ => None,
    }
}

/// Registry of record specs keyed by `(module, class)`.
///
/// Built once and shared by reference; it is never mutated after
/// construction.
#[derive(Debug)]
pub struct Catalog {
    specs: HashMap<(&'static str, &'static str), &'static RecordSpec>,
}

impl Catalog {
    /// Builds the catalog of every `data` and `protocol` record.
    pub fn standard() -> Self {
        let specs = data::ALL
            .iter()
            .chain(protocol::ALL.iter())
            .map(|spec| ((spec.module, spec.name), *spec))
            .collect();
        Self { specs }
    }

    /// Returns the number of registered specs.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns true if no spec is registered.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Looks up a spec by module and class name.
    pub fn spec(&self, module: &str, class: &str) -> Option<&'static RecordSpec> {
        self.specs.get(&(module, class)).copied()
    }

    /// Creates a default-valued record of the given class.
    pub fn record(&self, module: &str, class: &str) -> Result<Record> {
        self.spec(module, class).map(Record::new).ok_or_else(|| {
            ZooKeeperError::Protocol(format!("unknown record class: {}.{}", module, class))
        })
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}
