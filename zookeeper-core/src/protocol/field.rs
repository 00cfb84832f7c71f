//! Field-type codec for jute primitive and composite types.
//!
//! Every record field is described by a [`FieldType`] and holds a [`Value`].
//! The functions in this module measure, write and read one field at a time;
//! records drive them in field-table order.

use bytes::Bytes;

use super::record::{Record, RecordSpec};
use crate::error::{Result, ZooKeeperError};
use crate::serialization::{DataInput, DataOutput, ObjectDataInput, ObjectDataOutput};

/// Size of an `int` field and of every length prefix.
const INT_SIZE: usize = 4;
/// Size of a `long` field.
const LONG_SIZE: usize = 8;
/// Size of a `boolean` field.
const BOOL_SIZE: usize = 1;

/// Wire type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// 32-bit big-endian signed integer.
    Int,
    /// 64-bit value carried as an opaque 8-byte big-endian blob.
    Long,
    /// Length-prefixed bytes; length `-1` means absent.
    Buffer,
    /// Length-prefixed UTF-8 text; length `-1` means absent.
    UString,
    /// Single byte, `1` or `0`.
    Boolean,
    /// Count-prefixed sequence of elements; count `-1` means absent.
    Vector(&'static FieldType),
    /// Nested record.
    Record(&'static RecordSpec),
}

impl FieldType {
    /// Returns the value a freshly constructed record holds for this type.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Int => Value::Int(0),
            Self::Long => Value::Long([0u8; LONG_SIZE]),
            Self::Buffer => Value::Buffer(None),
            Self::UString => Value::UString(None),
            Self::Boolean => Value::Boolean(false),
            Self::Vector(_) => Value::Vector(None),
            Self::Record(spec) => Value::Record(Record::new(spec)),
        }
    }

    /// Returns true if `value` can be stored in a field of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Int, Value::Int(_))
            | (Self::Long, Value::Long(_))
            | (Self::Buffer, Value::Buffer(_))
            | (Self::UString, Value::UString(_))
            | (Self::Boolean, Value::Boolean(_))
            | (Self::Vector(_), Value::Vector(None)) => true,
            (Self::Vector(element), Value::Vector(Some(items))) => {
                items.iter().all(|item| element.accepts(item))
            }
            (Self::Record(spec), Value::Record(record)) => *spec == record.spec(),
            _ => false,
        }
    }

    /// Returns the jute schema name of this type, e.g. `vector<ustring>`.
    pub fn type_name(&self) -> String {
        match self {
            Self::Int => "int".to_string(),
            Self::Long => "long".to_string(),
            Self::Buffer => "buffer".to_string(),
            Self::UString => "ustring".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Vector(element) => format!("vector<{}>", element.type_name()),
            Self::Record(spec) => spec.qualified_name(),
        }
    }
}

/// Value held by a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `int` value.
    Int(i32),
    /// `long` value as an 8-byte big-endian blob.
    Long([u8; 8]),
    /// `buffer` value; `None` when absent.
    Buffer(Option<Bytes>),
    /// `ustring` value; `None` when absent.
    UString(Option<String>),
    /// `boolean` value.
    Boolean(bool),
    /// `vector<T>` value; `None` when absent.
    Vector(Option<Vec<Value>>),
    /// Nested record value.
    Record(Record),
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::UString(Some(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::UString(Some(v))
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Buffer(Some(v))
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

/// Returns the number of bytes `value` occupies when encoded as `ty`.
pub fn byte_length(ty: &FieldType, value: &Value) -> Result<usize> {
    let size = match (ty, value) {
        (FieldType::Int, Value::Int(_)) => INT_SIZE,
        (FieldType::Long, Value::Long(_)) => LONG_SIZE,
        (FieldType::Buffer, Value::Buffer(v)) => INT_SIZE + v.as_ref().map_or(0, Bytes::len),
        (FieldType::UString, Value::UString(v)) => INT_SIZE + v.as_ref().map_or(0, String::len),
        (FieldType::Boolean, Value::Boolean(_)) => BOOL_SIZE,
        (FieldType::Vector(_), Value::Vector(None)) => INT_SIZE,
        (FieldType::Vector(element), Value::Vector(Some(items))) => {
            let mut size = INT_SIZE;
            for item in items {
                size += byte_length(element, item)?;
            }
            size
        }
        (FieldType::Record(_), Value::Record(record)) => record.byte_length()?,
        _ => return Err(mismatch(ty, value)),
    };
    Ok(size)
}

/// Writes `value` as `ty` into `buffer` at `offset`, returning the bytes written.
pub fn write(ty: &FieldType, value: &Value, buffer: &mut [u8], offset: usize) -> Result<usize> {
    if offset > buffer.len() {
        return Err(ZooKeeperError::Serialization(format!(
            "offset: {} is out of buffer range",
            offset
        )));
    }
    let mut output = ObjectDataOutput::new(&mut buffer[offset..]);
    encode(ty, value, &mut output)?;
    Ok(output.len())
}

/// Reads a `ty` value from `buffer` at `offset`, returning it with the bytes read.
pub fn read(ty: &FieldType, buffer: &[u8], offset: usize) -> Result<(Value, usize)> {
    if offset > buffer.len() {
        return Err(ZooKeeperError::Serialization(format!(
            "offset: {} is out of buffer range",
            offset
        )));
    }
    let mut input = ObjectDataInput::new(&buffer[offset..]);
    let value = decode(ty, &mut input)?;
    Ok((value, input.position()))
}

pub(crate) fn encode<O>(ty: &FieldType, value: &Value, out: &mut O) -> Result<()>
where
    O: DataOutput + ?Sized,
{
    match (ty, value) {
        (FieldType::Int, Value::Int(v)) => out.write_int(*v),
        (FieldType::Long, Value::Long(v)) => out.write_long(v),
        (FieldType::Buffer, Value::Buffer(v)) => out.write_buffer(v.as_deref()),
        (FieldType::UString, Value::UString(v)) => out.write_ustring(v.as_deref()),
        (FieldType::Boolean, Value::Boolean(v)) => out.write_bool(*v),
        (FieldType::Vector(_), Value::Vector(None)) => out.write_int(-1),
        (FieldType::Vector(element), Value::Vector(Some(items))) => {
            out.write_int(items.len() as i32)?;
            for item in items {
                encode(element, item, out)?;
            }
            Ok(())
        }
        (FieldType::Record(_), Value::Record(record)) => record.encode_fields(out),
        _ => Err(mismatch(ty, value)),
    }
}

pub(crate) fn decode(ty: &FieldType, input: &mut ObjectDataInput<'_>) -> Result<Value> {
    let value = match ty {
        FieldType::Int => Value::Int(input.read_int()?),
        FieldType::Long => Value::Long(input.read_long()?),
        FieldType::Buffer => Value::Buffer(input.read_buffer()?),
        FieldType::UString => Value::UString(input.read_ustring()?),
        FieldType::Boolean => Value::Boolean(input.read_bool()?),
        FieldType::Vector(element) => match input.read_length()? {
            None => Value::Vector(None),
            Some(count) => {
                // Cap the preallocation; a bogus count fails on the first short read.
                let mut items = Vec::with_capacity(count.min(input.remaining()));
                for _ in 0..count {
                    items.push(decode(element, input)?);
                }
                Value::Vector(Some(items))
            }
        },
        FieldType::Record(spec) => {
            let mut record = Record::new(spec);
            record.decode_fields(input)?;
            Value::Record(record)
        }
    };
    Ok(value)
}

fn mismatch(ty: &FieldType, value: &Value) -> ZooKeeperError {
    ZooKeeperError::Serialization(format!(
        "value {:?} does not match field type {}",
        value,
        ty.type_name()
    ))
}
