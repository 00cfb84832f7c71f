//! Primitive readers and writers for the jute binary format.

mod data_input;
mod data_output;

pub use data_input::{DataInput, ObjectDataInput};
pub use data_output::{DataOutput, ObjectDataOutput};
