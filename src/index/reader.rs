//! Point-in-time index reader

use std::sync::Arc;

use tracing::{debug, warn};

use super::commit::{read_latest, CommitRecord};
use super::segment_io::read_segment;
use crate::compat::{Compatibility, ReadWindow, Refusal, RefusalDetail};
use crate::error::{IndexError, Result};
use crate::observability::Event;
use crate::segment::{FieldValue, Segment, StoredDocument};
use crate::storage::Store;
use crate::version::Version;

/// How far a reader may go with what it opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    ReadWrite,
    /// At least one segment is in the read-only band.
    ReadOnly,
}

/// Immutable view over the segments of one commit, or of a writer's
/// current state. Document ids are global: segment order, then position
/// within the segment.
#[derive(Debug, Clone)]
pub struct IndexReader {
    index_created_major: u32,
    commit: Option<CommitRecord>,
    segments: Vec<Arc<Segment>>,
    bases: Vec<u32>,
    mode: ReadMode,
}

impl IndexReader {
    /// Open the latest commit under the default version window.
    pub fn open(store: &Arc<dyn Store>) -> Result<Self> {
        Self::open_with(store, ReadWindow::default_for(Version::LATEST))
    }

    /// Open with an explicit minimum supported major. One major below the
    /// default admits the read-only band.
    pub fn open_with_min_major(store: &Arc<dyn Store>, min_major: u32) -> Result<Self> {
        Self::open_with(store, ReadWindow::with_min_major(Version::LATEST, min_major)?)
    }

    pub fn open_with(store: &Arc<dyn Store>, window: ReadWindow) -> Result<Self> {
        let commit = read_latest(store.as_ref())?.ok_or_else(|| IndexError::IndexNotFound {
            resource: store.describe(),
        })?;
        Self::open_commit(store, commit, window)
    }

    /// Open a specific commit, e.g. one kept by `CommitRetention::KeepAll`.
    pub fn open_commit(store: &Arc<dyn Store>, commit: CommitRecord, window: ReadWindow) -> Result<Self> {
        let resource = store.resource(&commit.file_name());
        if let Err(e) = check_commit(&commit, &window, &resource) {
            warn!(event = Event::SegmentRefused.as_str(), resource = resource.as_str(), error = %e, "index refused");
            return Err(e);
        }

        let mut segments = Vec::with_capacity(commit.segments.len());
        let mut mode = ReadMode::ReadWrite;
        for seg_ref in &commit.segments {
            let (segment, verdict) = read_segment(store.as_ref(), seg_ref, &window).map_err(|e| {
                warn!(event = Event::SegmentRefused.as_str(), segment = seg_ref.name.as_str(), error = %e, "segment refused");
                e
            })?;
            if verdict == Compatibility::ReadOnly {
                mode = ReadMode::ReadOnly;
            }
            segments.push(Arc::new(segment));
        }

        if mode == ReadMode::ReadOnly {
            debug!(event = Event::ReadOnlyOpen.as_str(), resource = resource.as_str(), "opened in read-only band");
        }
        debug!(
            event = Event::ReaderOpened.as_str(),
            generation = commit.generation,
            segments = segments.len(),
            "reader opened"
        );
        Ok(Self::from_segments(commit.index_created_version_major, Some(commit), segments, mode))
    }

    pub(crate) fn from_segments(
        index_created_major: u32,
        commit: Option<CommitRecord>,
        segments: Vec<Arc<Segment>>,
        mode: ReadMode,
    ) -> Self {
        let mut bases = Vec::with_capacity(segments.len());
        let mut next = 0;
        for seg in &segments {
            bases.push(next);
            next += seg.max_doc();
        }
        Self {
            index_created_major,
            commit,
            segments,
            bases,
            mode,
        }
    }

    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    pub fn index_created_major(&self) -> u32 {
        self.index_created_major
    }

    /// Commit this reader was opened on. `None` for a reader over a
    /// writer's uncommitted state.
    pub fn commit(&self) -> Option<&CommitRecord> {
        self.commit.as_ref()
    }

    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    pub fn max_doc(&self) -> u32 {
        self.segments.iter().map(|s| s.max_doc()).sum()
    }

    pub fn num_docs(&self) -> u32 {
        self.segments.iter().map(|s| s.num_docs()).sum()
    }

    fn locate(&self, doc: u32) -> Option<(&Segment, u32)> {
        let i = self.bases.partition_point(|base| *base <= doc).checked_sub(1)?;
        let seg = &self.segments[i];
        let local = doc - self.bases[i];
        (local < seg.max_doc()).then_some((seg.as_ref(), local))
    }

    pub fn is_live(&self, doc: u32) -> bool {
        self.locate(doc).is_some_and(|(seg, local)| !seg.is_deleted(local))
    }

    /// Stored fields of `doc`. Deleted documents are still readable.
    pub fn document(&self, doc: u32) -> Result<StoredDocument> {
        self.locate(doc)
            .and_then(|(seg, local)| seg.document(local))
            .ok_or_else(|| IndexError::invalid_argument(format!("doc {doc} out of range (max_doc={})", self.max_doc())))
    }

    /// Live documents with `term` under `field`, ascending.
    pub fn search_term(&self, field: &str, term: &str) -> Vec<u32> {
        let mut hits = Vec::new();
        for (seg, base) in self.segments.iter().zip(&self.bases) {
            hits.extend(
                seg.live_docs()
                    .filter(|d| seg.matches_term(*d, field, term))
                    .map(|d| base + d),
            );
        }
        hits
    }

    fn doc_value(&self, doc: u32, field: &str) -> Option<&FieldValue> {
        let (seg, local) = self.locate(doc)?;
        seg.doc_value(local, field)
    }

    pub fn numeric_doc_value(&self, doc: u32, field: &str) -> Option<i64> {
        self.doc_value(doc, field).and_then(FieldValue::as_numeric)
    }

    pub fn binary_doc_value(&self, doc: u32, field: &str) -> Option<Vec<u8>> {
        self.doc_value(doc, field)
            .and_then(FieldValue::as_bytes)
            .map(<[u8]>::to_vec)
    }

    pub fn point_value(&self, doc: u32, field: &str) -> Option<Vec<Vec<u8>>> {
        let (seg, local) = self.locate(doc)?;
        match seg.stored_value(local, field)? {
            FieldValue::Point(dims) => Some(dims.clone()),
            _ => None,
        }
    }

    pub fn vector_value(&self, doc: u32, field: &str) -> Option<Vec<f32>> {
        let (seg, local) = self.locate(doc)?;
        match seg.stored_value(local, field)? {
            FieldValue::Vector(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Index-level checks done before any segment is read.
pub(crate) fn check_commit(commit: &CommitRecord, window: &ReadWindow, resource: &str) -> Result<()> {
    window.admit_index(commit.index_created_version_major, resource)?;
    if commit.commit_version.major > window.engine().major {
        return Err(Refusal::too_new(RefusalDetail::Bounds {
            version: commit.commit_version,
            min_supported: Version::new(window.min_major(), 0, 0),
            max_supported: window.engine(),
        })
        .into_error(resource));
    }
    Ok(())
}
