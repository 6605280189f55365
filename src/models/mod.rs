//! Data models for dbflex.
//!
//! Values, records and connection descriptors shared by every layer.

mod descriptor;
mod record;
mod value;

pub use descriptor::{ConnectionDescriptor, DescriptorBuilder};
pub use record::{FromRecord, IntoRecord, Record};
pub use value::{Value, ValueKind};

pub(crate) use value::parse_timestamp;
