//! Jute records: an ordered, typed list of fields described by a static spec.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;

use super::field::{self, FieldType, Value};
use crate::error::{Result, ZooKeeperError};
use crate::serialization::{DataOutput, ObjectDataInput, ObjectDataOutput};

/// Name of the field whose value is rewritten under a chroot.
const PATH_FIELD: &str = "path";

/// Vector fields whose elements are prefixed with the chroot on encode.
const WATCH_FIELDS: [&str; 3] = ["dataWatches", "existWatches", "childWatches"];

/// One field of a record spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name, unique within its record.
    pub name: &'static str,
    /// Wire type of the field.
    pub ty: FieldType,
}

impl FieldSpec {
    /// Creates a field spec.
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty }
    }
}

/// Static description of a record class.
pub struct RecordSpec {
    /// Module the record belongs to, `data` or `protocol`.
    pub module: &'static str,
    /// Record class name, e.g. `Stat`.
    pub name: &'static str,
    /// Fields in wire order.
    pub fields: &'static [FieldSpec],
}

impl RecordSpec {
    /// Returns `module.name`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    /// Returns the position of the named field.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

impl PartialEq for RecordSpec {
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module && self.name == other.name
    }
}

impl Eq for RecordSpec {}

impl fmt::Debug for RecordSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// A record instance: one value per field of its spec.
#[derive(Clone)]
pub struct Record {
    spec: &'static RecordSpec,
    values: Vec<Value>,
    chroot: Option<String>,
}

impl Record {
    /// Creates a record holding the default value for every field.
    pub fn new(spec: &'static RecordSpec) -> Self {
        Self {
            spec,
            values: spec.fields.iter().map(|f| f.ty.default_value()).collect(),
            chroot: None,
        }
    }

    /// Returns the spec of this record.
    pub fn spec(&self) -> &'static RecordSpec {
        self.spec
    }

    /// Returns the record class name.
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Sets the chroot applied to path-bearing fields, or clears it.
    pub fn set_chroot_path(&mut self, chroot: Option<String>) {
        self.chroot = chroot.filter(|c| !c.is_empty());
    }

    /// Returns the chroot applied to this record.
    pub fn chroot_path(&self) -> Option<&str> {
        self.chroot.as_deref()
    }

    /// Returns the value of the named field.
    pub fn get(&self, name: &str) -> Result<&Value> {
        let index = self.index_of(name)?;
        Ok(&self.values[index])
    }

    /// Replaces the value of the named field; the value must match the field type.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.index_of(name)?;
        let value = value.into();
        let ty = &self.spec.fields[index].ty;
        if !ty.accepts(&value) {
            return Err(ZooKeeperError::InvalidArgument(format!(
                "field {}.{} expects {}",
                self.spec.name,
                name,
                ty.type_name()
            )));
        }
        self.values[index] = value;
        Ok(())
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Returns an `int` field.
    pub fn get_int(&self, name: &str) -> Result<i32> {
        match self.get(name)? {
            Value::Int(v) => Ok(*v),
            _ => Err(self.wrong_type(name, "int")),
        }
    }

    /// Returns a `long` field as its 8-byte blob.
    pub fn get_long(&self, name: &str) -> Result<[u8; 8]> {
        match self.get(name)? {
            Value::Long(v) => Ok(*v),
            _ => Err(self.wrong_type(name, "long")),
        }
    }

    /// Returns a `long` field interpreted as a signed integer.
    pub fn get_i64(&self, name: &str) -> Result<i64> {
        self.get_long(name).map(i64::from_be_bytes)
    }

    /// Returns a `buffer` field.
    pub fn get_buffer(&self, name: &str) -> Result<Option<&Bytes>> {
        match self.get(name)? {
            Value::Buffer(v) => Ok(v.as_ref()),
            _ => Err(self.wrong_type(name, "buffer")),
        }
    }

    /// Returns a `ustring` field.
    pub fn get_ustring(&self, name: &str) -> Result<Option<&str>> {
        match self.get(name)? {
            Value::UString(v) => Ok(v.as_deref()),
            _ => Err(self.wrong_type(name, "ustring")),
        }
    }

    /// Returns a `boolean` field.
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.get(name)? {
            Value::Boolean(v) => Ok(*v),
            _ => Err(self.wrong_type(name, "boolean")),
        }
    }

    /// Returns a `vector` field.
    pub fn get_vector(&self, name: &str) -> Result<Option<&[Value]>> {
        match self.get(name)? {
            Value::Vector(v) => Ok(v.as_deref()),
            _ => Err(self.wrong_type(name, "vector")),
        }
    }

    /// Returns a nested record field.
    pub fn get_record(&self, name: &str) -> Result<&Record> {
        match self.get(name)? {
            Value::Record(v) => Ok(v),
            _ => Err(self.wrong_type(name, "record")),
        }
    }

    /// Returns the number of bytes this record occupies on the wire,
    /// with the chroot applied.
    pub fn byte_length(&self) -> Result<usize> {
        let mut size = 0;
        for (index, spec) in self.spec.fields.iter().enumerate() {
            size += field::byte_length(&spec.ty, &self.outgoing(index))?;
        }
        Ok(size)
    }

    /// Writes this record into `buffer` at `offset`, returning the bytes written.
    pub fn serialize(&self, buffer: &mut [u8], offset: usize) -> Result<usize> {
        if offset >= buffer.len() {
            return Err(out_of_range(offset));
        }
        let size = self.byte_length()?;
        if offset + size > buffer.len() {
            return Err(ZooKeeperError::Serialization(
                "buffer does not have enough space".to_string(),
            ));
        }

        let mut output = ObjectDataOutput::new(&mut buffer[offset..offset + size]);
        self.encode_fields(&mut output)?;
        Ok(output.len())
    }

    /// Reads every field from `buffer` at `offset`, returning the bytes read.
    ///
    /// With a chroot set, the prefix is stripped from the `path` field.
    pub fn deserialize(&mut self, buffer: &[u8], offset: usize) -> Result<usize> {
        if offset >= buffer.len() {
            return Err(out_of_range(offset));
        }
        let mut input = ObjectDataInput::new(&buffer[offset..]);
        self.decode_fields(&mut input)?;
        self.strip_chroot();
        Ok(input.position())
    }

    pub(crate) fn encode_fields<O>(&self, out: &mut O) -> Result<()>
    where
        O: DataOutput + ?Sized,
    {
        for (index, spec) in self.spec.fields.iter().enumerate() {
            field::encode(&spec.ty, &self.outgoing(index), out)?;
        }
        Ok(())
    }

    pub(crate) fn decode_fields(&mut self, input: &mut ObjectDataInput<'_>) -> Result<()> {
        for (index, spec) in self.spec.fields.iter().enumerate() {
            self.values[index] = field::decode(&spec.ty, input)?;
        }
        Ok(())
    }

    fn outgoing(&self, index: usize) -> Cow<'_, Value> {
        let value = &self.values[index];
        let chroot = match self.chroot.as_deref() {
            Some(chroot) => chroot,
            None => return Cow::Borrowed(value),
        };
        let name = self.spec.fields[index].name;

        match value {
            Value::UString(Some(path)) if name == PATH_FIELD => {
                Cow::Owned(Value::UString(Some(prepend_chroot(chroot, path))))
            }
            Value::Vector(Some(paths)) if WATCH_FIELDS.contains(&name) => Cow::Owned(Value::Vector(
                Some(
                    paths
                        .iter()
                        .map(|item| match item {
                            Value::UString(Some(path)) => {
                                Value::UString(Some(prepend_chroot(chroot, path)))
                            }
                            other => other.clone(),
                        })
                        .collect(),
                ),
            )),
            _ => Cow::Borrowed(value),
        }
    }

    pub(crate) fn strip_chroot(&mut self) {
        let chroot = match self.chroot.as_deref() {
            Some(chroot) => chroot,
            None => return,
        };
        let index = match self.spec.field_index(PATH_FIELD) {
            Some(index) => index,
            None => return,
        };
        if let Value::UString(Some(path)) = &mut self.values[index] {
            if path == chroot {
                *path = "/".to_string();
            } else if let Some(rest) = path.strip_prefix(chroot) {
                *path = rest.to_string();
            }
        }
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.spec.field_index(name).ok_or_else(|| {
            ZooKeeperError::InvalidArgument(format!(
                "record {} has no field named {}",
                self.spec.qualified_name(),
                name
            ))
        })
    }

    fn wrong_type(&self, name: &str, expected: &str) -> ZooKeeperError {
        ZooKeeperError::InvalidArgument(format!(
            "field {}.{} is not of type {}",
            self.spec.name, name, expected
        ))
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.spec == other.spec && self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.spec.name);
        for (spec, value) in self.spec.fields.iter().zip(&self.values) {
            s.field(spec.name, value);
        }
        s.finish()
    }
}

fn prepend_chroot(chroot: &str, path: &str) -> String {
    if path == "/" {
        chroot.to_string()
    } else {
        format!("{}{}", chroot, path)
    }
}

fn out_of_range(offset: usize) -> ZooKeeperError {
    ZooKeeperError::Serialization(format!("offset: {} is out of buffer range", offset))
}
