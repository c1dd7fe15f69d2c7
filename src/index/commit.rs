//! Index-level commit records
//!
//! A commit names the live segments of an index and the index's version
//! metadata. Commits are written atomically under `commit_<generation>`;
//! the highest generation is the current state of the index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::segment::Segment;
use crate::storage::{decode_record, encode_record, RecordKind, Store};
use crate::version::Version;

pub const COMMIT_PREFIX: &str = "commit_";

pub fn commit_file_name(generation: u64) -> String {
    format!("{COMMIT_PREFIX}{generation}")
}

/// Generation encoded in a commit file name.
pub fn parse_generation(file: &str) -> Option<u64> {
    file.strip_prefix(COMMIT_PREFIX)?.parse().ok()
}

/// Name of the `counter`-th segment of an index: `_` and the counter in
/// base 36.
pub fn segment_name(counter: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = counter;
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.push('_');
    out.iter().rev().collect()
}

/// A segment as referenced from a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_generation: Option<u64>,
}

impl SegmentRef {
    pub fn of(segment: &Segment) -> Self {
        Self {
            name: segment.name().to_string(),
            update_generation: segment.update_generation(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub generation: u64,
    /// Major the index was created under. Set once at creation.
    pub index_created_version_major: u32,
    /// Engine that wrote this commit.
    pub commit_version: Version,
    pub segments: Vec<SegmentRef>,
    /// Source of fresh segment names.
    pub segment_counter: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_data: BTreeMap<String, String>,
}

impl CommitRecord {
    pub fn file_name(&self) -> String {
        commit_file_name(self.generation)
    }

    pub fn segment_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.name.as_str())
    }

    /// Write atomically. Only one commit can be in flight per index, which
    /// the write lock guarantees.
    pub fn write(&self, store: &dyn Store) -> Result<()> {
        let name = self.file_name();
        if store.exists(&name)? {
            return Err(IndexError::internal(format!(
                "commit generation {} already exists",
                self.generation
            )));
        }
        let bytes = encode_record(RecordKind::Commit, self, &store.resource(&name))?;
        store.write_atomic(&name, &bytes)?;
        Ok(())
    }

    pub fn read(store: &dyn Store, generation: u64) -> Result<Self> {
        let name = commit_file_name(generation);
        let resource = store.resource(&name);
        let bytes = store.read(&name)?;
        let record: CommitRecord = decode_record(&bytes, RecordKind::Commit, &resource)?;
        if record.generation != generation {
            return Err(IndexError::corrupt(
                resource,
                format!("file is named for generation {generation} but records {}", record.generation),
            ));
        }
        Ok(record)
    }
}

/// Generations of every commit in `store`, oldest first.
pub fn list_commits(store: &dyn Store) -> Result<Vec<u64>> {
    let mut generations: Vec<u64> = store.list()?.iter().filter_map(|f| parse_generation(f)).collect();
    generations.sort_unstable();
    Ok(generations)
}

/// The current commit, or `None` for an empty store.
pub fn read_latest(store: &dyn Store) -> Result<Option<CommitRecord>> {
    match list_commits(store)?.last() {
        Some(generation) => CommitRecord::read(store, *generation).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn record(generation: u64) -> CommitRecord {
        CommitRecord {
            generation,
            index_created_version_major: 10,
            commit_version: Version::LATEST,
            segments: vec![SegmentRef {
                name: "_0".into(),
                update_generation: Some(2),
            }],
            segment_counter: 1,
            user_data: BTreeMap::new(),
        }
    }

    #[test]
    fn test_generation_parsing() {
        assert_eq!(parse_generation("commit_12"), Some(12));
        assert_eq!(parse_generation("commit_x"), None);
        assert_eq!(parse_generation("_0.cfs"), None);
    }

    #[test]
    fn test_segment_names() {
        assert_eq!(segment_name(0), "_0");
        assert_eq!(segment_name(35), "_z");
        assert_eq!(segment_name(36), "_10");
    }

    #[test]
    fn test_latest_is_highest_generation() {
        let store = MemoryStore::new();
        assert!(read_latest(&store).unwrap().is_none());
        record(2).write(&store).unwrap();
        record(10).write(&store).unwrap();
        record(9).write(&store).unwrap();
        assert_eq!(list_commits(&store).unwrap(), vec![2, 9, 10]);
        assert_eq!(read_latest(&store).unwrap().unwrap().generation, 10);
    }

    #[test]
    fn test_generation_never_overwritten() {
        let store = MemoryStore::new();
        record(1).write(&store).unwrap();
        assert!(matches!(record(1).write(&store), Err(IndexError::InternalConsistency(_))));
    }

    #[test]
    fn test_corrupt_commit_detected() {
        let store = MemoryStore::new();
        record(1).write(&store).unwrap();
        store.corrupt("commit_1", |b| {
            let i = b.len() / 2;
            b[i] ^= 0xff;
        });
        let err = read_latest(&store).unwrap_err();
        assert!(err.is_fatal());
    }
}
