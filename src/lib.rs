//! strata - schema and format-version compatibility for a segment index
//!
//! Segments record the schema they were written with and the engine
//! version that wrote them. This crate decides which segments the running
//! engine may read, write, or merge, merges schemas across segments, and
//! upgrades old indexes to the current format.

pub mod cli;
pub mod compat;
pub mod error;
pub mod index;
pub mod merge;
pub mod observability;
pub mod schema;
pub mod segment;
pub mod storage;
pub mod upgrade;
pub mod version;

pub use error::{IndexError, Result, Severity};
pub use version::Version;
