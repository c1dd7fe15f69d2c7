//! Removal of index files nothing references

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::commit::{parse_generation, CommitRecord};
use crate::error::Result;
use crate::observability::Event;
use crate::segment::{compound_file, data_file, info_file, updates_file};
use crate::storage::Store;

const SEGMENT_EXTENSIONS: [&str; 4] = [".cfs", ".si", ".dat", ".upd"];

/// Whether `file` is one the index manages. Foreign files and the write
/// lock are never touched.
pub fn is_index_file(file: &str) -> bool {
    if parse_generation(file).is_some() {
        return true;
    }
    file.starts_with('_') && SEGMENT_EXTENSIONS.iter().any(|ext| file.ends_with(ext))
}

/// Every file `commit` needs, including its own.
pub fn files_of_commit(commit: &CommitRecord) -> BTreeSet<String> {
    let mut files = BTreeSet::from([commit.file_name()]);
    for seg in &commit.segments {
        // Layout is not recorded in the commit; protect both.
        files.insert(compound_file(&seg.name));
        files.insert(info_file(&seg.name));
        files.insert(data_file(&seg.name));
        if let Some(generation) = seg.update_generation {
            files.insert(updates_file(&seg.name, generation));
        }
    }
    files
}

#[derive(Debug)]
pub struct FileDeleter {
    store: Arc<dyn Store>,
}

impl FileDeleter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Delete every commit file whose generation is not in `keep`.
    pub fn prune_commits(&self, keep: &BTreeSet<u64>) -> Result<Vec<u64>> {
        let mut pruned = Vec::new();
        for file in self.store.list()? {
            if let Some(generation) = parse_generation(&file) {
                if !keep.contains(&generation) {
                    self.store.delete(&file)?;
                    pruned.push(generation);
                }
            }
        }
        if !pruned.is_empty() {
            debug!(event = Event::CommitsPruned.as_str(), ?pruned, "prior commits deleted");
        }
        Ok(pruned)
    }

    /// Delete index files outside `protected`. Returns the names deleted.
    pub fn sweep(&self, protected: &BTreeSet<String>) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for file in self.store.list()? {
            if is_index_file(&file) && !protected.contains(&file) {
                self.store.delete(&file)?;
                deleted.push(file);
            }
        }
        if !deleted.is_empty() {
            debug!(event = Event::FilesDeleted.as_str(), count = deleted.len(), "unreferenced files deleted");
        }
        Ok(deleted)
    }

    /// Best-effort removal of files written by an operation that failed.
    pub fn discard(&self, files: &[String]) {
        for file in files {
            if let Err(e) = self.store.delete(file) {
                if !e.is_not_found() {
                    debug!(file = file.as_str(), error = %e, "could not discard file");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::commit::SegmentRef;
    use crate::storage::MemoryStore;
    use crate::version::Version;

    #[test]
    fn test_index_file_recognition() {
        assert!(is_index_file("commit_3"));
        assert!(is_index_file("_a.cfs"));
        assert!(is_index_file("_a_2.upd"));
        assert!(!is_index_file("write.lock"));
        assert!(!is_index_file("notes.txt"));
        assert!(!is_index_file("commit_x"));
    }

    #[test]
    fn test_sweep_keeps_commit_files() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        for file in ["commit_1", "_0.cfs", "_0_1.upd", "_1.si", "_1.dat", "write.lock", "README"] {
            store.write_atomic(file, b"x").unwrap();
        }
        let commit = CommitRecord {
            generation: 1,
            index_created_version_major: 10,
            commit_version: Version::LATEST,
            segments: vec![SegmentRef {
                name: "_0".into(),
                update_generation: None,
            }],
            segment_counter: 2,
            user_data: Default::default(),
        };

        let deleter = FileDeleter::new(store.clone());
        let deleted = deleter.sweep(&files_of_commit(&commit)).unwrap();
        assert_eq!(deleted, vec!["_0_1.upd", "_1.dat", "_1.si"]);
        assert_eq!(store.list().unwrap(), vec!["README", "_0.cfs", "commit_1", "write.lock"]);
    }

    #[test]
    fn test_prune_commits() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        for file in ["commit_1", "commit_2", "commit_3"] {
            store.write_atomic(file, b"x").unwrap();
        }
        let pruned = FileDeleter::new(store.clone()).prune_commits(&BTreeSet::from([3])).unwrap();
        assert_eq!(pruned, vec![1, 2]);
        assert_eq!(store.list().unwrap(), vec!["commit_3"]);
    }
}
