//! Field schema model
//!
//! A segment describes each of its fields with a [`FieldSchema`]: how the
//! field is indexed, which doc values it carries, its point and vector
//! shape and any reserved role. Schemas are validated when they are
//! created and after every mutation, so an inconsistent schema is never
//! observable.
//!
//! # Rules
//!
//! - Unindexed fields carry no term vectors, payloads or norm flags
//! - Payloads need positions
//! - Point shape is all-zero or fully set, and never redefined
//! - Doc values may widen from `None` exactly once
//! - Two declarations of a field are compared in a fixed order and the
//!   first diverging property is reported

mod errors;
mod field;
mod numbers;
mod registry;
mod types;
mod verify;

pub use errors::{ConsistencyRule, SchemaProperty, SchemaResult, SchemaViolation};
pub use field::{FieldSchema, FieldSchemaSpec, NO_DOC_VALUES_GEN};
pub use numbers::FieldNumbers;
pub use registry::SchemaRegistry;
pub use types::{
    DocValuesType, IndexOptions, PointConfig, VectorConfig, VectorEncoding, VectorSimilarity, MAX_POINT_DIMENSIONS,
    MAX_POINT_INDEX_DIMENSIONS, MAX_POINT_NUM_BYTES, MAX_VECTOR_DIMENSIONS,
};
pub use verify::{first_mismatch, verify_same_schema, verify_same_spec};
