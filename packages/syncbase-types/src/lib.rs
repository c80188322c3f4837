//! Schema descriptors, tagged scalar values, and column codecs.
//!
//! Everything the core engine consumes from the schema registry lives
//! here: table/column descriptors, the supported scalar type set, and the
//! codecs that map application values to their stored driver form.

pub mod codec;
pub mod schema;
pub mod value;

pub use codec::{Codec, CodecError};
pub use schema::{validate_schema, ColumnDescriptor, SchemaError, TableDescriptor};
pub use value::{Row, ScalarType, StoredValue, Value};
