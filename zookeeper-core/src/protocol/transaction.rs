//! Multi-op transaction codec.
//!
//! A transaction request is a sequence of `(MultiHeader, op record)` pairs
//! followed by a terminating header with `done = true`. The response has the
//! same shape, with one result record per op.

use bytes::Bytes;

use super::catalog::protocol;
use super::constants::OpCode;
use super::field::Value;
use super::record::{Record, RecordSpec};
use crate::acl::Acl;
use crate::error::{ExceptionCode, Result, ZooKeeperError};
use crate::node::{CreateMode, Stat};
use crate::serialization::{DataOutput, ObjectDataInput, ObjectDataOutput};

/// One operation of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Create a node.
    Create {
        /// Node path.
        path: String,
        /// Initial data.
        data: Option<Bytes>,
        /// Initial ACL.
        acls: Vec<Acl>,
        /// Creation mode.
        mode: CreateMode,
    },
    /// Delete a node; version `-1` matches any version.
    Delete {
        /// Node path.
        path: String,
        /// Expected version.
        version: i32,
    },
    /// Replace a node's data; version `-1` matches any version.
    SetData {
        /// Node path.
        path: String,
        /// New data.
        data: Option<Bytes>,
        /// Expected version.
        version: i32,
    },
    /// Assert a node's version without changing it.
    Check {
        /// Node path.
        path: String,
        /// Expected version.
        version: i32,
    },
}

impl Op {
    /// Returns the op code carried in this op's multi header.
    pub fn op_code(&self) -> OpCode {
        match self {
            Op::Create { .. } => OpCode::Create,
            Op::Delete { .. } => OpCode::Delete,
            Op::SetData { .. } => OpCode::SetData,
            Op::Check { .. } => OpCode::Check,
        }
    }

    /// Returns the node path this op targets.
    pub fn path(&self) -> &str {
        match self {
            Op::Create { path, .. }
            | Op::Delete { path, .. }
            | Op::SetData { path, .. }
            | Op::Check { path, .. } => path,
        }
    }

    /// Builds the request record of this op.
    pub fn to_record(&self) -> Result<Record> {
        match self {
            Op::Create {
                path,
                data,
                acls,
                mode,
            } => Record::new(&protocol::CREATE_REQUEST)
                .with("path", path.as_str())?
                .with("data", Value::Buffer(data.clone()))?
                .with("acl", Acl::to_vector(acls)?)?
                .with("flags", mode.value()),
            Op::Delete { path, version } => Record::new(&protocol::DELETE_REQUEST)
                .with("path", path.as_str())?
                .with("version", *version),
            Op::SetData {
                path,
                data,
                version,
            } => Record::new(&protocol::SET_DATA_REQUEST)
                .with("path", path.as_str())?
                .with("data", Value::Buffer(data.clone()))?
                .with("version", *version),
            Op::Check { path, version } => Record::new(&protocol::CHECK_VERSION_REQUEST)
                .with("path", path.as_str())?
                .with("version", *version),
        }
    }

    fn from_record(op: OpCode, record: &Record) -> Result<Self> {
        let path = record.get_ustring("path")?.unwrap_or_default().to_string();
        match op {
            OpCode::Create => Ok(Op::Create {
                path,
                data: record.get_buffer("data")?.cloned(),
                acls: Acl::from_vector(record.get_vector("acl")?)?,
                mode: CreateMode::from_value(record.get_int("flags")?)?,
            }),
            OpCode::Delete => Ok(Op::Delete {
                path,
                version: record.get_int("version")?,
            }),
            OpCode::SetData => Ok(Op::SetData {
                path,
                data: record.get_buffer("data")?.cloned(),
                version: record.get_int("version")?,
            }),
            OpCode::Check => Ok(Op::Check {
                path,
                version: record.get_int("version")?,
            }),
            other => Err(unexpected_op(other)),
        }
    }
}

/// Outcome of one op of a committed transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionResult {
    /// The node was created at the given (possibly sequential) path.
    Created {
        /// Actual node path.
        path: String,
    },
    /// The node was deleted.
    Deleted,
    /// The node's data was replaced.
    DataSet {
        /// Node metadata after the write.
        stat: Stat,
    },
    /// The version check passed.
    Checked,
    /// The op was not applied.
    Failed {
        /// Reported error; `Ok` marks an op rolled back because another op failed.
        code: ExceptionCode,
    },
}

impl TransactionResult {
    fn op_code(&self) -> OpCode {
        match self {
            Self::Created { .. } => OpCode::Create,
            Self::Deleted => OpCode::Delete,
            Self::DataSet { .. } => OpCode::SetData,
            Self::Checked => OpCode::Check,
            Self::Failed { .. } => OpCode::Error,
        }
    }

    fn to_record(&self) -> Result<Option<Record>> {
        let record = match self {
            Self::Created { path } => {
                Record::new(&protocol::CREATE_RESPONSE).with("path", path.as_str())?
            }
            Self::DataSet { stat } => {
                Record::new(&protocol::SET_DATA_RESPONSE).with("stat", stat.to_record()?)?
            }
            Self::Failed { code } => {
                Record::new(&protocol::ERROR_RESPONSE).with("err", code.value())?
            }
            Self::Deleted | Self::Checked => return Ok(None),
        };
        Ok(Some(record))
    }
}

/// Encoded form of a list of ops.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRequest {
    ops: Vec<Op>,
    chroot: Option<String>,
}

impl TransactionRequest {
    /// Creates a request for the given ops, in order.
    pub fn new(ops: Vec<Op>) -> Self {
        Self { ops, chroot: None }
    }

    /// Returns the ops.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Sets the chroot prefixed to every op path.
    pub fn set_chroot_path(&mut self, chroot: Option<String>) {
        self.chroot = chroot;
    }

    /// Returns the encoded size.
    pub fn byte_length(&self) -> Result<usize> {
        let mut size = 0;
        for record in self.records()? {
            size += record.byte_length()?;
        }
        Ok(size)
    }

    /// Writes the request into `buffer` at `offset`, returning the bytes written.
    pub fn serialize(&self, buffer: &mut [u8], offset: usize) -> Result<usize> {
        if offset >= buffer.len() {
            return Err(ZooKeeperError::Serialization(format!(
                "offset: {} is out of buffer range",
                offset
            )));
        }
        let size = self.byte_length()?;
        if offset + size > buffer.len() {
            return Err(ZooKeeperError::Serialization(
                "buffer does not have enough space".to_string(),
            ));
        }
        let mut output = ObjectDataOutput::new(&mut buffer[offset..offset + size]);
        self.encode_into(&mut output)?;
        Ok(output.len())
    }

    pub(crate) fn encode_into<O>(&self, out: &mut O) -> Result<()>
    where
        O: DataOutput + ?Sized,
    {
        for record in self.records()? {
            record.encode_fields(out)?;
        }
        Ok(())
    }

    /// Reads a request from `buffer` at `offset`, returning it with the bytes read.
    pub fn deserialize(buffer: &[u8], offset: usize) -> Result<(Self, usize)> {
        let mut input = ObjectDataInput::new(buffer.get(offset..).unwrap_or_default());
        let mut ops = Vec::new();
        loop {
            let header = read_header(&mut input)?;
            if header.done {
                break;
            }
            let spec = match header.op {
                OpCode::Create => &protocol::CREATE_REQUEST,
                OpCode::Delete => &protocol::DELETE_REQUEST,
                OpCode::SetData => &protocol::SET_DATA_REQUEST,
                OpCode::Check => &protocol::CHECK_VERSION_REQUEST,
                other => return Err(unexpected_op(other)),
            };
            let mut record = Record::new(spec);
            record.decode_fields(&mut input)?;
            ops.push(Op::from_record(header.op, &record)?);
        }
        Ok((Self::new(ops), input.position()))
    }

    fn records(&self) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(self.ops.len() * 2 + 1);
        for op in &self.ops {
            records.push(multi_header(op.op_code().value(), false, -1)?);
            let mut record = op.to_record()?;
            record.set_chroot_path(self.chroot.clone());
            records.push(record);
        }
        records.push(multi_header(-1, true, -1)?);
        Ok(records)
    }
}

/// Decoded per-op results of a transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionResponse {
    results: Vec<TransactionResult>,
}

impl TransactionResponse {
    /// Creates a response holding the given results.
    pub fn new(results: Vec<TransactionResult>) -> Self {
        Self { results }
    }

    /// Returns the per-op results.
    pub fn results(&self) -> &[TransactionResult] {
        &self.results
    }

    /// Consumes the response, returning the per-op results.
    pub fn into_results(self) -> Vec<TransactionResult> {
        self.results
    }

    /// Returns the first non-OK failure code, if any op failed.
    pub fn first_failure(&self) -> Option<ExceptionCode> {
        self.results.iter().find_map(|result| match result {
            TransactionResult::Failed { code } if *code != ExceptionCode::Ok => Some(*code),
            _ => None,
        })
    }

    /// Reads results until the terminating header.
    ///
    /// With a chroot set, it is stripped from created paths.
    pub fn deserialize(buffer: &[u8], offset: usize, chroot: Option<&str>) -> Result<(Self, usize)> {
        if offset >= buffer.len() {
            return Err(ZooKeeperError::Serialization(format!(
                "offset: {} is out of buffer range",
                offset
            )));
        }
        let mut input = ObjectDataInput::new(&buffer[offset..]);
        let mut results = Vec::new();

        loop {
            let header = read_header(&mut input)?;
            if header.done {
                break;
            }
            let result = match header.op {
                OpCode::Create => {
                    let record = read_body(&protocol::CREATE_RESPONSE, &mut input, chroot)?;
                    TransactionResult::Created {
                        path: record.get_ustring("path")?.unwrap_or_default().to_string(),
                    }
                }
                OpCode::Delete => TransactionResult::Deleted,
                OpCode::SetData => {
                    let record = read_body(&protocol::SET_DATA_RESPONSE, &mut input, chroot)?;
                    TransactionResult::DataSet {
                        stat: Stat::from_record(record.get_record("stat")?)?,
                    }
                }
                OpCode::Check => TransactionResult::Checked,
                OpCode::Error => {
                    let record = read_body(&protocol::ERROR_RESPONSE, &mut input, chroot)?;
                    TransactionResult::Failed {
                        code: ExceptionCode::try_from(record.get_int("err")?)?,
                    }
                }
                other => return Err(unexpected_op(other)),
            };
            results.push(result);
        }

        Ok((Self { results }, input.position()))
    }

    /// Returns the encoded size.
    pub fn byte_length(&self) -> Result<usize> {
        let mut size = 0;
        for record in self.records()? {
            size += record.byte_length()?;
        }
        Ok(size)
    }

    pub(crate) fn encode_into<O>(&self, out: &mut O) -> Result<()>
    where
        O: DataOutput + ?Sized,
    {
        for record in self.records()? {
            record.encode_fields(out)?;
        }
        Ok(())
    }

    fn records(&self) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(self.results.len() * 2 + 1);
        for result in &self.results {
            let err = match result {
                TransactionResult::Failed { code } => code.value(),
                _ => 0,
            };
            records.push(multi_header(result.op_code().value(), false, err)?);
            if let Some(record) = result.to_record()? {
                records.push(record);
            }
        }
        records.push(multi_header(-1, true, -1)?);
        Ok(records)
    }
}

struct MultiHeader {
    op: OpCode,
    done: bool,
}

fn multi_header(op: i32, done: bool, err: i32) -> Result<Record> {
    Record::new(&protocol::MULTI_HEADER)
        .with("type", op)?
        .with("done", done)?
        .with("err", err)
}

fn read_header(input: &mut ObjectDataInput<'_>) -> Result<MultiHeader> {
    let mut header = Record::new(&protocol::MULTI_HEADER);
    header.decode_fields(input)?;
    let done = header.get_bool("done")?;
    let op = if done {
        OpCode::Error
    } else {
        OpCode::from_value(header.get_int("type")?)?
    };
    Ok(MultiHeader { op, done })
}

fn read_body(
    spec: &'static RecordSpec,
    input: &mut ObjectDataInput<'_>,
    chroot: Option<&str>,
) -> Result<Record> {
    let mut record = Record::new(spec);
    record.set_chroot_path(chroot.map(str::to_string));
    record.decode_fields(input)?;
    record.strip_chroot();
    Ok(record)
}

fn unexpected_op(op: OpCode) -> ZooKeeperError {
    ZooKeeperError::Protocol(format!("unexpected op {:?} in transaction", op))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(request: &TransactionRequest) -> Vec<u8> {
        let mut buf = vec![0u8; request.byte_length().unwrap()];
        assert_eq!(request.serialize(&mut buf, 0).unwrap(), buf.len());
        buf
    }

    fn encode_response(response: &TransactionResponse) -> Vec<u8> {
        let mut buf = vec![0u8; response.byte_length().unwrap()];
        let mut output = ObjectDataOutput::new(&mut buf);
        response.encode_into(&mut output).unwrap();
        buf
    }

    #[test]
    fn test_empty_request_is_lone_terminator() {
        let request = TransactionRequest::new(Vec::new());
        let buf = encode(&request);
        assert_eq!(buf, [0xFF, 0xFF, 0xFF, 0xFF, 1, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_request_layout() {
        let request = TransactionRequest::new(vec![Op::Delete {
            path: "/a".to_string(),
            version: 2,
        }]);
        let buf = encode(&request);
        let expected: Vec<u8> = [
            &[0, 0, 0, 2, 0, 0xFF, 0xFF, 0xFF, 0xFF][..],
            &[0, 0, 0, 2, b'/', b'a', 0, 0, 0, 2][..],
            &[0xFF, 0xFF, 0xFF, 0xFF, 1, 0xFF, 0xFF, 0xFF, 0xFF][..],
        ]
        .concat();
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_request_round_trip_with_chroot() {
        let ops = vec![
            Op::Create {
                path: "/x".to_string(),
                data: Some(Bytes::from_static(b"v")),
                acls: Acl::open_acl_unsafe(),
                mode: CreateMode::Ephemeral,
            },
            Op::SetData {
                path: "/y".to_string(),
                data: None,
                version: -1,
            },
            Op::Check {
                path: "/y".to_string(),
                version: 5,
            },
        ];
        let mut request = TransactionRequest::new(ops);
        request.set_chroot_path(Some("/app".to_string()));
        let buf = encode(&request);

        let (decoded, read) = TransactionRequest::deserialize(&buf, 0).unwrap();
        assert_eq!(read, buf.len());
        assert_eq!(decoded.ops().len(), 3);
        assert_eq!(decoded.ops()[0].path(), "/app/x");
        assert_eq!(decoded.ops()[2], Op::Check {
            path: "/app/y".to_string(),
            version: 5,
        });
    }

    #[test]
    fn test_response_with_failed_check() {
        let response = TransactionResponse::new(vec![
            TransactionResult::Failed {
                code: ExceptionCode::Ok,
            },
            TransactionResult::Failed {
                code: ExceptionCode::BadVersion,
            },
        ]);
        let buf = encode_response(&response);

        let (decoded, read) = TransactionResponse::deserialize(&buf, 0, None).unwrap();
        assert_eq!(read, buf.len());
        assert_eq!(decoded.results().len(), 2);
        assert_eq!(decoded.first_failure(), Some(ExceptionCode::BadVersion));
    }

    #[test]
    fn test_response_results_and_chroot() {
        let stat = Stat {
            version: 4,
            ..Stat::default()
        };
        let response = TransactionResponse::new(vec![
            TransactionResult::Created {
                path: "/app/x".to_string(),
            },
            TransactionResult::Deleted,
            TransactionResult::DataSet { stat },
            TransactionResult::Checked,
        ]);
        let buf = encode_response(&response);

        let (decoded, _) = TransactionResponse::deserialize(&buf, 0, Some("/app")).unwrap();
        assert_eq!(
            decoded.into_results(),
            vec![
                TransactionResult::Created {
                    path: "/x".to_string()
                },
                TransactionResult::Deleted,
                TransactionResult::DataSet { stat },
                TransactionResult::Checked,
            ]
        );
    }

    #[test]
    fn test_response_without_failure() {
        let response = TransactionResponse::new(vec![TransactionResult::Checked]);
        assert_eq!(response.first_failure(), None);
    }

    #[test]
    fn test_unknown_op_in_response_is_fatal() {
        let mut buf = vec![0u8; 9];
        multi_header(OpCode::GetData.value(), false, 0)
            .unwrap()
            .serialize(&mut buf, 0)
            .unwrap();
        let err = TransactionResponse::deserialize(&buf, 0, None).unwrap_err();
        assert!(matches!(err, ZooKeeperError::Protocol(_)));
    }

    #[test]
    fn test_truncated_response_fails() {
        let buf = [0, 0, 0, 1, 0, 0, 0, 0, 0];
        assert!(TransactionResponse::deserialize(&buf, 0, None).is_err());
    }
}
