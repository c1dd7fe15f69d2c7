//! Crate-wide error taxonomy
//!
//! Every failure that crosses a module boundary is an [`IndexError`].
//! Each variant has a stable code (`STRATA_*`) and a [`Severity`]:
//!
//! - `REJECT`: the caller's input or request was refused, nothing changed
//! - `ERROR`: the operation failed, the index is intact
//! - `FATAL`: an internal invariant broke and the session must not continue

use std::fmt;

use thiserror::Error;

use crate::compat::RefusalDetail;
use crate::schema::SchemaViolation;
use crate::storage::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Reject,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Reject => "REJECT",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),

    #[error("Format version is not supported (resource path=\"{resource}\"): {detail}")]
    FormatTooOld { resource: String, detail: RefusalDetail },

    #[error("Format version is not supported (resource path=\"{resource}\"): {detail}")]
    FormatTooNew { resource: String, detail: RefusalDetail },

    #[error(
        "Cannot merge a segment that has been created with major version {segment_major} \
         into this index which has been created by major version {index_major}"
    )]
    IncompatibleVersionMerge { segment_major: u32, index_major: u32 },

    #[error("upgrade aborted, index left untouched: {source}")]
    UpgradeAborted { source: Box<IndexError> },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("corrupt index (resource path=\"{resource}\"): {reason}")]
    CorruptIndex { resource: String, reason: String },

    #[error("no index found (resource path=\"{resource}\")")]
    IndexNotFound { resource: String },

    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IndexError {
    pub fn internal(message: impl Into<String>) -> Self {
        IndexError::InternalConsistency(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        IndexError::InvalidArgument(message.into())
    }

    pub fn corrupt(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        IndexError::CorruptIndex {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Wrap `cause` as the reason an upgrade gave up.
    pub fn upgrade_aborted(cause: IndexError) -> Self {
        match cause {
            already @ IndexError::UpgradeAborted { .. } => already,
            other => IndexError::UpgradeAborted {
                source: Box::new(other),
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            IndexError::SchemaViolation(_) => "STRATA_SCHEMA_VIOLATION",
            IndexError::FormatTooOld { .. } => "STRATA_FORMAT_TOO_OLD",
            IndexError::FormatTooNew { .. } => "STRATA_FORMAT_TOO_NEW",
            IndexError::IncompatibleVersionMerge { .. } => "STRATA_INCOMPATIBLE_VERSION_MERGE",
            IndexError::UpgradeAborted { .. } => "STRATA_UPGRADE_ABORTED",
            IndexError::Storage(e) => e.code().code(),
            IndexError::CorruptIndex { .. } => "STRATA_CORRUPT_INDEX",
            IndexError::IndexNotFound { .. } => "STRATA_INDEX_NOT_FOUND",
            IndexError::InternalConsistency(_) => "STRATA_INTERNAL_CONSISTENCY",
            IndexError::InvalidArgument(_) => "STRATA_INVALID_ARGUMENT",
            IndexError::InvalidConfig(_) => "STRATA_INVALID_CONFIG",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            IndexError::SchemaViolation(_)
            | IndexError::IncompatibleVersionMerge { .. }
            | IndexError::InvalidArgument(_)
            | IndexError::InvalidConfig(_) => Severity::Reject,
            IndexError::FormatTooOld { .. }
            | IndexError::FormatTooNew { .. }
            | IndexError::UpgradeAborted { .. }
            | IndexError::IndexNotFound { .. } => Severity::Error,
            IndexError::Storage(e) => e.severity(),
            IndexError::CorruptIndex { .. } | IndexError::InternalConsistency(_) => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Refusal detail of a version-window error, if this is one.
    pub fn refusal(&self) -> Option<&RefusalDetail> {
        match self {
            IndexError::FormatTooOld { detail, .. } | IndexError::FormatTooNew { detail, .. } => Some(detail),
            IndexError::UpgradeAborted { source } => source.refusal(),
            _ => None,
        }
    }

    /// Rendering used by the command line: `[SEVERITY] CODE: message`.
    pub fn render(&self) -> String {
        format!("[{}] {}: {}", self.severity(), self.code(), self)
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaProperty;
    use crate::version::Version;

    #[test]
    fn test_bounds_refusal_message_names_resource() {
        let err = IndexError::FormatTooOld {
            resource: "/data/idx/_3.si".to_string(),
            detail: RefusalDetail::Bounds {
                version: Version::new(7, 7, 3),
                min_supported: Version::new(8, 0, 0),
                max_supported: Version::new(10, 0, 0),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("path=\"/data/idx/_3.si\""));
        assert!(msg.contains("7.7.3"));
        assert_eq!(err.code(), "STRATA_FORMAT_TOO_OLD");
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn test_reason_refusal_message_names_resource() {
        let err = IndexError::FormatTooNew {
            resource: "mem:commit_4".to_string(),
            detail: RefusalDetail::Reason("segment written by a future release".to_string()),
        };
        assert!(err.to_string().contains("path=\"mem:commit_4\""));
        assert!(matches!(err.refusal(), Some(RefusalDetail::Reason(_))));
    }

    #[test]
    fn test_incompatible_merge_names_both_majors() {
        let err = IndexError::IncompatibleVersionMerge {
            segment_major: 9,
            index_major: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("major version 9"));
        assert!(msg.contains("major version 10"));
        assert_eq!(err.severity(), Severity::Reject);
    }

    #[test]
    fn test_upgrade_aborted_keeps_cause() {
        let cause = IndexError::from(SchemaViolation::mismatch("id", SchemaProperty::Points, "a", "b"));
        let err = IndexError::upgrade_aborted(cause);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("\"id\""));

        let twice = IndexError::upgrade_aborted(err);
        match twice {
            IndexError::UpgradeAborted { source } => assert!(matches!(*source, IndexError::SchemaViolation(_))),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_render_format() {
        let err = IndexError::internal("number 3 bound twice");
        assert_eq!(
            err.render(),
            "[FATAL] STRATA_INTERNAL_CONSISTENCY: internal consistency violation: number 3 bound twice"
        );
        assert!(err.is_fatal());
    }
}
