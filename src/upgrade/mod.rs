//! In-place format upgrade
//!
//! [`IndexUpgrader`] drives an index through [`UpgradeState`]:
//!
//! 1. Open the latest commit through the opt-in read window, so segments
//!    one major below the supported range are admitted
//! 2. Validate every outdated segment: versions, creation major and
//!    schemas, before any file is written
//! 3. Rewrite the outdated segments into one current segment, or re-stamp
//!    a lone segment whose codec is already current
//! 4. Commit atomically, then delete the superseded commits and files
//!
//! Any failure before step 4 removes the files written so far and is
//! reported as `UpgradeAborted`.

mod engine;
mod state;

pub use engine::{IndexUpgrader, UpgradeOptions, UpgradeOutcome};
pub use state::UpgradeState;
