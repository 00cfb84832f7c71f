//! Request and response envelopes.
//!
//! A request on the wire is `int32 length | header | payload`. A reply, once
//! the stream framer has consumed its length prefix, is `header | payload`.

use bytes::{Bytes, BytesMut};

use super::catalog::{protocol, request_spec, response_spec};
use super::constants::{OpCode, SIZE_OF_LENGTH_FIELD, XID_NOTIFICATION};
use super::field::Value;
use super::record::Record;
use super::transaction::{TransactionRequest, TransactionResponse};
use crate::error::{ExceptionCode, Result, ZooKeeperError};
use crate::serialization::{DataInput, DataOutput, ObjectDataInput, ObjectDataOutput};

/// Body of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    /// No body, e.g. ping or close-session.
    Empty,
    /// A single payload record.
    Record(Record),
    /// A multi-op transaction.
    Transaction(TransactionRequest),
}

/// A request header paired with its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    header: Record,
    payload: RequestPayload,
    chroot: Option<String>,
}

impl Request {
    /// Creates a request with xid `0` for the given op.
    ///
    /// The connection layer assigns the real xid before sending.
    pub fn new(op: OpCode, payload: RequestPayload) -> Result<Self> {
        let header = Record::new(&protocol::REQUEST_HEADER)
            .with("xid", 0)?
            .with("type", op.value())?;
        Ok(Self {
            header,
            payload,
            chroot: None,
        })
    }

    /// Creates a request carrying a single payload record.
    pub fn with_record(op: OpCode, payload: Record) -> Result<Self> {
        Self::new(op, RequestPayload::Record(payload))
    }

    /// Creates a multi request for a transaction.
    pub fn transaction(transaction: TransactionRequest) -> Result<Self> {
        Self::new(OpCode::Multi, RequestPayload::Transaction(transaction))
    }

    /// Returns the `RequestHeader` record.
    pub fn header(&self) -> &Record {
        &self.header
    }

    /// Returns the payload.
    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    /// Returns the payload record, if the payload is a single record.
    pub fn record(&self) -> Option<&Record> {
        match &self.payload {
            RequestPayload::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Returns the op code from the header.
    pub fn op_code(&self) -> Result<OpCode> {
        OpCode::from_value(self.header.get_int("type")?)
    }

    /// Returns the xid from the header.
    pub fn xid(&self) -> Result<i32> {
        self.header.get_int("xid")
    }

    /// Replaces the xid in the header.
    pub fn set_xid(&mut self, xid: i32) -> Result<()> {
        self.header.set("xid", xid)
    }

    /// Returns the `path` field of the payload record, if it has one.
    pub fn path(&self) -> Option<&str> {
        self.record()
            .and_then(|record| record.get_ustring("path").ok().flatten())
    }

    /// Applies a chroot to the payload's path-bearing fields.
    ///
    /// `None`, an empty string and `/` all clear it.
    pub fn set_chroot_path(&mut self, chroot: Option<&str>) {
        let chroot = chroot.filter(|c| !c.is_empty() && *c != "/").map(str::to_string);
        match &mut self.payload {
            RequestPayload::Record(record) => record.set_chroot_path(chroot.clone()),
            RequestPayload::Transaction(transaction) => transaction.set_chroot_path(chroot.clone()),
            RequestPayload::Empty => {}
        }
        self.chroot = chroot;
    }

    /// Returns the chroot applied to this request.
    ///
    /// The reply to this request must be decoded with the same chroot.
    pub fn chroot_path(&self) -> Option<&str> {
        self.chroot.as_deref()
    }

    /// Returns the size of header and payload, excluding the length prefix.
    pub fn byte_length(&self) -> Result<usize> {
        let payload = match &self.payload {
            RequestPayload::Empty => 0,
            RequestPayload::Record(record) => record.byte_length()?,
            RequestPayload::Transaction(transaction) => transaction.byte_length()?,
        };
        Ok(self.header.byte_length()? + payload)
    }

    /// Appends the length-prefixed wire form to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        let size = self.byte_length()?;
        let start = dst.len();
        dst.resize(start + SIZE_OF_LENGTH_FIELD + size, 0);

        let mut output = ObjectDataOutput::new(&mut dst[start..]);
        output.write_int(size as i32)?;
        self.header.encode_fields(&mut output)?;
        match &self.payload {
            RequestPayload::Empty => {}
            RequestPayload::Record(record) => record.encode_fields(&mut output)?,
            RequestPayload::Transaction(transaction) => transaction.encode_into(&mut output)?,
        }
        Ok(())
    }

    /// Returns the length-prefixed wire form.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        self.encode_into(&mut dst)?;
        Ok(dst.freeze())
    }

    /// Parses a request frame with its length prefix already removed.
    ///
    /// Used by servers and test doubles; the payload shape is chosen by the
    /// header's op code.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let mut header = Record::new(&protocol::REQUEST_HEADER);
        let offset = header.deserialize(frame, 0)?;
        let op = OpCode::from_value(header.get_int("type")?)?;

        let payload = if op == OpCode::Multi {
            let (transaction, _) = TransactionRequest::deserialize(frame, offset)?;
            RequestPayload::Transaction(transaction)
        } else if let Some(spec) = request_spec(op) {
            let mut record = Record::new(spec);
            record.deserialize(frame, offset)?;
            RequestPayload::Record(record)
        } else {
            RequestPayload::Empty
        };

        Ok(Self {
            header,
            payload,
            chroot: None,
        })
    }
}

/// Body of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// No body: the op carries none, or the reply is an error.
    Empty,
    /// A single payload record.
    Record(Record),
    /// Per-op results of a transaction.
    Transaction(TransactionResponse),
}

/// A `ReplyHeader` paired with its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    header: Record,
    payload: ResponsePayload,
}

impl Response {
    /// Creates a response from its parts.
    pub fn new(header: Record, payload: ResponsePayload) -> Self {
        Self { header, payload }
    }

    /// Creates a reply with the given header values.
    pub fn reply(xid: i32, zxid: i64, err: ExceptionCode, payload: ResponsePayload) -> Result<Self> {
        let header = Record::new(&protocol::REPLY_HEADER)
            .with("xid", xid)?
            .with("zxid", Value::Long(zxid.to_be_bytes()))?
            .with("err", err.value())?;
        Ok(Self { header, payload })
    }

    /// Decodes the reply to `request` from `buffer`.
    ///
    /// Error replies carry no payload, except for transactions whose per-op
    /// results are decoded whenever present. With a chroot set, it is
    /// stripped from returned paths.
    pub fn decode(request: &Request, buffer: &[u8], chroot: Option<&str>) -> Result<Self> {
        let mut header = Record::new(&protocol::REPLY_HEADER);
        let offset = header.deserialize(buffer, 0)?;
        let op = request.op_code()?;
        let err = header.get_int("err")?;

        let payload = if op == OpCode::Multi {
            if offset < buffer.len() {
                let (response, _) = TransactionResponse::deserialize(buffer, offset, chroot)?;
                ResponsePayload::Transaction(response)
            } else {
                ResponsePayload::Empty
            }
        } else if err != ExceptionCode::Ok.value() {
            ResponsePayload::Empty
        } else if let Some(spec) = response_spec(op) {
            let mut record = Record::new(spec);
            record.set_chroot_path(chroot.map(str::to_string));
            record.deserialize(buffer, offset)?;
            ResponsePayload::Record(record)
        } else {
            ResponsePayload::Empty
        };

        Ok(Self { header, payload })
    }

    /// Decodes a watch notification (`xid == -1`) from `buffer`.
    pub fn decode_notification(buffer: &[u8], chroot: Option<&str>) -> Result<Self> {
        let mut header = Record::new(&protocol::REPLY_HEADER);
        let offset = header.deserialize(buffer, 0)?;
        let xid = header.get_int("xid")?;
        if xid != XID_NOTIFICATION {
            return Err(ZooKeeperError::Protocol(format!(
                "expected notification xid {}, got {}",
                XID_NOTIFICATION, xid
            )));
        }
        let mut event = Record::new(&protocol::WATCHER_EVENT);
        event.set_chroot_path(chroot.map(str::to_string));
        event.deserialize(buffer, offset)?;
        Ok(Self {
            header,
            payload: ResponsePayload::Record(event),
        })
    }

    /// Returns the `ReplyHeader` record.
    pub fn header(&self) -> &Record {
        &self.header
    }

    /// Returns the payload.
    pub fn payload(&self) -> &ResponsePayload {
        &self.payload
    }

    /// Returns the xid from the header.
    pub fn xid(&self) -> Result<i32> {
        self.header.get_int("xid")
    }

    /// Returns the zxid from the header.
    pub fn zxid(&self) -> Result<i64> {
        self.header.get_i64("zxid")
    }

    /// Returns the raw error code from the header.
    pub fn err(&self) -> Result<i32> {
        self.header.get_int("err")
    }

    /// Fails with the header's exception, tagged with `path`, unless it is `OK`.
    pub fn check(&self, path: Option<&str>) -> Result<()> {
        match self.err()? {
            0 => Ok(()),
            code => Err(ZooKeeperError::from_code(code, path)),
        }
    }

    /// Returns the payload record, failing if the payload is not a record.
    pub fn record(&self) -> Result<&Record> {
        match &self.payload {
            ResponsePayload::Record(record) => Ok(record),
            other => Err(ZooKeeperError::Protocol(format!(
                "expected a record payload, got {:?}",
                other
            ))),
        }
    }

    /// Consumes the response, returning its transaction results.
    pub fn into_transaction(self) -> Result<TransactionResponse> {
        match self.payload {
            ResponsePayload::Transaction(response) => Ok(response),
            other => Err(ZooKeeperError::Protocol(format!(
                "expected a transaction payload, got {:?}",
                other
            ))),
        }
    }

    /// Returns header and payload bytes, without a length prefix.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let payload = match &self.payload {
            ResponsePayload::Empty => 0,
            ResponsePayload::Record(record) => record.byte_length()?,
            ResponsePayload::Transaction(response) => response.byte_length()?,
        };
        let mut buf = vec![0u8; self.header.byte_length()? + payload];
        let mut output = ObjectDataOutput::new(&mut buf);
        self.header.encode_fields(&mut output)?;
        match &self.payload {
            ResponsePayload::Empty => {}
            ResponsePayload::Record(record) => record.encode_fields(&mut output)?,
            ResponsePayload::Transaction(response) => response.encode_into(&mut output)?,
        }
        Ok(Bytes::from(buf))
    }
}

/// Reads the xid of a reply frame without decoding the rest.
pub fn peek_xid(frame: &[u8]) -> Result<i32> {
    ObjectDataInput::new(frame).read_int()
}
