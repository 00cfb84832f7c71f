//! ZooKeeper jute wire protocol.
//!
//! This module provides the record codec, the message catalog, request and
//! response envelopes, the transaction codec and stream framing.

mod catalog;
mod codec;
pub mod constants;
mod field;
mod record;
mod request;
mod transaction;

pub use catalog::{data, protocol, request_spec, response_spec, Catalog};
pub use codec::{JuteCodec, DEFAULT_MAX_FRAME_LENGTH};
pub use constants::*;
pub use field::{byte_length, read, write, FieldType, Value};
pub use record::{FieldSpec, Record, RecordSpec};
pub use request::{peek_xid, Request, RequestPayload, Response, ResponsePayload};
pub use transaction::{Op, TransactionRequest, TransactionResponse, TransactionResult};
