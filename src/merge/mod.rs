//! Combining segments
//!
//! Every merge runs in three steps and fails before touching content if
//! the first two do not pass:
//!
//! 1. Version check: each input is admitted by the compatibility policy,
//!    and all inputs share the creation major of the target index
//! 2. Schema check: every field name agrees across all inputs that
//!    declare it
//! 3. Union: one fresh registry numbered by first appearance, and the
//!    live documents of every input renumbered into it

mod merger;

pub use merger::{remap_fields, MergeKind, MergedSegment, SchemaMerger};
