//! Index: segments plus commits
//!
//! An index is a set of segments named by its latest commit. One
//! [`IndexWriter`] at a time holds the store's write lock; any number of
//! [`IndexReader`]s observe committed state without locking.
//!
//! # On-disk layout
//!
//! | File              | Content                                   |
//! |-------------------|-------------------------------------------|
//! | `commit_<gen>`    | [`CommitRecord`]                          |
//! | `<seg>.cfs`       | segment metadata and documents            |
//! | `<seg>.si`        | segment metadata (non-compound)           |
//! | `<seg>.dat`       | documents (non-compound)                  |
//! | `<seg>_<gen>.upd` | deletions and doc-values updates          |
//! | `write.lock`      | held by the active writer                 |

mod commit;
mod config;
mod deleter;
mod reader;
mod segment_io;
mod writer;

pub use commit::{
    commit_file_name, list_commits, parse_generation, read_latest, segment_name, CommitRecord, SegmentRef,
    COMMIT_PREFIX,
};
pub use config::{CommitRetention, CompoundFile, InfoStream, MergePolicy, OpenMode, WriterConfig};
pub use deleter::{files_of_commit, is_index_file, FileDeleter};
pub use reader::{IndexReader, ReadMode};
pub use segment_io::{read_segment, write_segment, write_updates};
pub use writer::{DocStats, IndexWriter};

pub(crate) use reader::check_commit;
