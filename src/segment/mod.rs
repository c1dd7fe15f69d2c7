//! Segments: immutable units of indexed content
//!
//! A segment carries its per-field [`SchemaRegistry`](crate::schema::SchemaRegistry),
//! a [`SegmentVersionStamp`] and its documents. Deletions and doc-values
//! updates are layered on top as generation-numbered state; the documents
//! and stamp themselves are never rewritten in place.

mod document;
mod id;
mod info;
mod segment;
mod sort;
mod stamp;

pub use document::{decode_int_point, encode_int_point, Document, Field, FieldValue, StoredDocument};
pub use id::SegmentId;
pub use info::{Diagnostics, SegmentInfo, SegmentInfoRecord, SegmentSource};
pub use segment::{compound_file, data_file, info_file, updates_file, Segment, SegmentUpdates, StoredFields};
pub use sort::{describe_sort, IndexSort};
pub use stamp::{SegmentVersionStamp, StampRecord};
