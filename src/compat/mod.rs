//! Version compatibility policy
//!
//! Decides whether a segment written by some engine version can be read
//! and written, only read, or not opened at all by the running engine.
//!
//! With `N` the running major and `MIN = N - 1`:
//!
//! | segment major      | verdict                               |
//! |--------------------|---------------------------------------|
//! | `> N`              | refused, too new                      |
//! | `MIN ..= N`        | read-write                            |
//! | `MIN - 1`          | read-only, explicit opt-in path only  |
//! | `< MIN - 1`        | refused, too old, bounds reported     |
//!
//! Composition across segments is additionally restricted to a single
//! index creation major.

mod policy;
mod window;

pub use policy::{check_same_creation_major, classify, min_supported_major, Compatibility, Direction, Refusal, RefusalDetail};
pub use window::ReadWindow;
