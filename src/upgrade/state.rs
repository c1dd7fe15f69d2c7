//! Upgrade state machine
//!
//! ```text
//! Open ──► Validated ──► Rewritten ──► Committed
//!   │          │             │
//!   └──────────┴─────────────┴──► Aborted
//! ```
//!
//! Nothing before `Committed` is visible in the index, so every state
//! before it can be abandoned. `Committed` and `Aborted` are terminal.

use crate::error::{IndexError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeState {
    /// Latest commit read and every segment admitted.
    Open {
        /// Segments in the commit
        segments: usize,
    },

    /// Versions and schemas checked; the rewrite plan is fixed.
    Validated {
        /// Segments that will be rewritten
        outdated: usize,
    },

    /// New segment files written, not yet referenced by any commit.
    Rewritten {
        /// Files written by the rewrite
        written: Vec<String>,
    },

    /// New commit durable. Final.
    Committed {
        generation: u64,
    },

    /// Abandoned before committing. The index is as it was.
    Aborted {
        /// State the upgrade was in when it gave up
        from: &'static str,
    },
}

impl UpgradeState {
    pub fn open(segments: usize) -> Self {
        Self::Open { segments }
    }

    /// Get the state name for observability.
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "Open",
            Self::Validated { .. } => "Validated",
            Self::Rewritten { .. } => "Rewritten",
            Self::Committed { .. } => "Committed",
            Self::Aborted { .. } => "Aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed { .. } | Self::Aborted { .. })
    }

    // =========================================================================
    // ALLOWED TRANSITIONS
    // =========================================================================

    /// Open → Validated
    pub fn validate(&self, outdated: usize) -> Result<Self> {
        match self {
            Self::Open { .. } => Ok(Self::Validated { outdated }),
            _ => Err(forbidden_transition(self.state_name(), "Validated")),
        }
    }

    /// Validated → Rewritten
    pub fn rewrite(&self, written: Vec<String>) -> Result<Self> {
        match self {
            Self::Validated { .. } => Ok(Self::Rewritten { written }),
            _ => Err(forbidden_transition(self.state_name(), "Rewritten")),
        }
    }

    /// Rewritten → Committed
    pub fn commit(&self, generation: u64) -> Result<Self> {
        match self {
            Self::Rewritten { .. } => Ok(Self::Committed { generation }),
            _ => Err(forbidden_transition(self.state_name(), "Committed")),
        }
    }

    /// Any non-terminal state → Aborted
    pub fn abort(&self) -> Result<Self> {
        if self.is_terminal() {
            return Err(forbidden_transition(self.state_name(), "Aborted"));
        }
        Ok(Self::Aborted {
            from: self.state_name(),
        })
    }
}

fn forbidden_transition(from: &str, to: &str) -> IndexError {
    IndexError::internal(format!("forbidden upgrade transition: {} → {}", from, to))
}
