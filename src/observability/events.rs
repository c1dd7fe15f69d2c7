//! Observability events for strata
//!
//! Every log line the engine emits names one of these events in its
//! `event` field, so log consumers can match on a stable identifier
//! instead of the message text.

use std::fmt;

/// Observable events in strata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Writer lifecycle
    /// Writer opened and holds the write lock
    WriterOpened,
    /// Writer closed after a final commit
    WriterClosed,
    /// Uncommitted changes discarded
    WriterRolledBack,

    // Content
    /// Document refused before buffering
    DocumentRejected,
    /// Buffered documents written as a new segment
    SegmentFlushed,
    /// Segments combined into one
    SegmentsMerged,
    /// Segments imported from other indexes
    IndexesAdded,

    // Commits and files
    /// Commit record written
    CommitWritten,
    /// Older commit records deleted
    CommitsPruned,
    /// Unreferenced index files deleted
    FilesDeleted,

    // Version policy
    /// Segment or index refused by the version window
    SegmentRefused,
    /// Reader opened through the read-only band
    ReadOnlyOpen,
    /// Reader opened
    ReaderOpened,

    // Upgrade
    /// Upgrade started
    UpgradeStarted,
    /// Upgrade state machine advanced
    UpgradeTransition,
    /// Index already current, nothing written
    UpgradeNoop,
    /// Upgrade committed
    UpgradeCompleted,
    /// Upgrade abandoned, index untouched
    UpgradeAborted,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::WriterOpened => "WRITER_OPENED",
            Event::WriterClosed => "WRITER_CLOSED",
            Event::WriterRolledBack => "WRITER_ROLLED_BACK",

            Event::DocumentRejected => "DOCUMENT_REJECTED",
            Event::SegmentFlushed => "SEGMENT_FLUSHED",
            Event::SegmentsMerged => "SEGMENTS_MERGED",
            Event::IndexesAdded => "INDEXES_ADDED",

            Event::CommitWritten => "COMMIT_WRITTEN",
            Event::CommitsPruned => "COMMITS_PRUNED",
            Event::FilesDeleted => "FILES_DELETED",

            Event::SegmentRefused => "SEGMENT_REFUSED",
            Event::ReadOnlyOpen => "READ_ONLY_OPEN",
            Event::ReaderOpened => "READER_OPENED",

            Event::UpgradeStarted => "UPGRADE_BEGIN",
            Event::UpgradeTransition => "UPGRADE_TRANSITION",
            Event::UpgradeNoop => "UPGRADE_NOOP",
            Event::UpgradeCompleted => "UPGRADE_COMPLETE",
            Event::UpgradeAborted => "UPGRADE_ABORTED",
        }
    }

    /// Returns true if this event reports a failed operation
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::DocumentRejected | Event::SegmentRefused | Event::UpgradeAborted
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
