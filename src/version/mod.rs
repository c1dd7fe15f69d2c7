//! Engine and on-disk format versions
//!
//! Every segment records the engine version that wrote it. The set of
//! released versions is kept as an explicit, ordered table so that
//! fixture coverage can be checked against it without introspection.

mod known;
mod types;

pub use known::{is_known, known_in_major, KNOWN_VERSIONS};
pub use types::{Version, VersionParseError};
