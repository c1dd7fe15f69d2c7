//! Index writer
//!
//! The single schema-mutating session of an index. Holds the write lock
//! for its whole lifetime, buffers added documents into a fresh segment,
//! and publishes its state through atomic commits.

use std::collections::BTreeSet;
use std::mem;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::commit::{list_commits, read_latest, segment_name, CommitRecord, SegmentRef};
use super::config::{CommitRetention, MergePolicy, OpenMode, WriterConfig};
use super::deleter::{files_of_commit, FileDeleter};
use super::reader::{check_commit, IndexReader, ReadMode};
use super::segment_io::{read_segment, write_segment, write_updates};
use crate::compat::{check_same_creation_major, ReadWindow};
use crate::error::{IndexError, Result};
use crate::merge::{remap_fields, MergeKind, MergedSegment, SchemaMerger};
use crate::observability::Event;
use crate::schema::{verify_same_spec, DocValuesType, FieldNumbers, FieldSchemaSpec, SchemaRegistry};
use crate::segment::{
    describe_sort, Diagnostics, Document, FieldValue, IndexSort, Segment, SegmentInfo, SegmentSource,
    SegmentVersionStamp, StoredFields,
};
use crate::storage::{Store, WriteLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocStats {
    pub max_doc: u32,
    pub num_docs: u32,
}

#[derive(Debug, Default)]
struct Buffer {
    registry: SchemaRegistry,
    docs: Vec<StoredFields>,
}

#[derive(Debug)]
pub struct IndexWriter {
    store: Arc<dyn Store>,
    config: WriterConfig,
    window: ReadWindow,
    deleter: FileDeleter,
    last_commit: Option<CommitRecord>,
    index_created_major: u32,
    /// False only while a new index may still adopt another creation major.
    major_fixed: bool,
    segments: Vec<Arc<Segment>>,
    /// Superseded segments, kept while a reader still shares them.
    retired: Vec<Arc<Segment>>,
    numbers: FieldNumbers,
    /// Configured sort, or the one every loaded segment agrees on.
    index_sort: Option<IndexSort>,
    buffer: Buffer,
    segment_counter: u64,
    dirty: bool,
    _lock: WriteLock,
}

impl IndexWriter {
    pub fn open(store: Arc<dyn Store>, config: WriterConfig) -> Result<Self> {
        config.validate()?;
        let lock = WriteLock::obtain(&store)?;
        let engine = config.engine_version;
        let existing = read_latest(store.as_ref())?;

        let mut writer = Self {
            deleter: FileDeleter::new(Arc::clone(&store)),
            window: ReadWindow::default_for(engine),
            last_commit: None,
            index_created_major: config.created_version_major.unwrap_or(engine.major),
            major_fixed: config.created_version_major.is_some(),
            segments: Vec::new(),
            retired: Vec::new(),
            numbers: FieldNumbers::new(config.soft_deletes_field.clone()),
            index_sort: config.index_sort.clone(),
            buffer: Buffer::default(),
            segment_counter: 0,
            dirty: true,
            _lock: lock,
            store,
            config,
        };

        match (writer.config.open_mode, existing) {
            (OpenMode::Append, None) => {
                return Err(IndexError::IndexNotFound {
                    resource: writer.store.describe(),
                })
            }
            (OpenMode::Create, Some(previous)) => {
                // New epoch. Generations and segment names keep counting so
                // the previous commit stays intact until ours replaces it.
                writer.segment_counter = previous.segment_counter;
                writer.last_commit = Some(previous);
            }
            (_, None) => {}
            (_, Some(commit)) => writer.load(commit)?,
        }

        info!(
            event = Event::WriterOpened.as_str(),
            store = writer.store.describe().as_str(),
            mode = ?writer.config.open_mode,
            created_major = writer.index_created_major,
            segments = writer.segments.len(),
            "writer opened"
        );
        Ok(writer)
    }

    fn load(&mut self, commit: CommitRecord) -> Result<()> {
        check_commit(&commit, &self.window, &self.store.resource(&commit.file_name()))?;
        for seg_ref in &commit.segments {
            let (segment, _) = read_segment(self.store.as_ref(), seg_ref, &self.window)?;
            self.segments.push(Arc::new(segment));
        }
        self.numbers = FieldNumbers::from_registries(
            self.config.soft_deletes_field.clone(),
            self.segments.iter().map(|s| s.registry()),
        )?;
        self.index_sort = resolve_index_sort(self.config.index_sort.as_ref(), &self.segments)?;
        self.index_created_major = commit.index_created_version_major;
        self.major_fixed = true;
        self.segment_counter = commit.segment_counter;
        self.dirty = false;
        self.last_commit = Some(commit);
        Ok(())
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn index_created_major(&self) -> u32 {
        self.index_created_major
    }

    pub fn last_commit(&self) -> Option<&CommitRecord> {
        self.last_commit.as_ref()
    }

    /// Flushed segments, committed or not.
    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    pub fn field_numbers(&self) -> &FieldNumbers {
        &self.numbers
    }

    pub fn index_sort(&self) -> Option<&IndexSort> {
        self.index_sort.as_ref()
    }

    pub fn doc_stats(&self) -> DocStats {
        let buffered = self.buffer.docs.len() as u32;
        DocStats {
            max_doc: self.segments.iter().map(|s| s.max_doc()).sum::<u32>() + buffered,
            num_docs: self.segments.iter().map(|s| s.num_docs()).sum::<u32>() + buffered,
        }
    }

    // =========================================================================
    // DOCUMENTS
    // =========================================================================

    /// Buffer a document. A field whose declaration conflicts with the
    /// index, with the buffered segment or with another field of the same
    /// document rejects the whole document.
    pub fn add_document(&mut self, doc: &Document) -> Result<()> {
        if let Err(e) = self.check_document(doc) {
            warn!(event = Event::DocumentRejected.as_str(), error = %e, "document rejected");
            return Err(e);
        }

        let mut stored = Vec::with_capacity(doc.fields().len());
        for field in doc.fields() {
            let number = self.buffer.registry.declare(&field.name, &field.spec, &mut self.numbers)?;
            stored.push((number, field.value.clone()));
        }
        self.buffer.docs.push(stored);
        self.dirty = true;

        if self.buffer.docs.len() >= self.config.max_buffered_docs {
            self.flush()?;
        }
        Ok(())
    }

    fn check_document(&self, doc: &Document) -> Result<()> {
        let fields = doc.fields();
        for (i, field) in fields.iter().enumerate() {
            field.validate()?;
            if let Some(sort) = self.index_sort.as_ref().filter(|s| s.field == field.name) {
                if !field.spec.doc_values_type.is_numeric() {
                    return Err(IndexError::invalid_argument(format!(
                        "index sort {sort} needs numeric doc values on \"{}\", got {}",
                        field.name, field.spec.doc_values_type
                    )));
                }
            }
            self.numbers.check(&field.name, &field.spec)?;
            if let Some(buffered) = self.buffer.registry.get(&field.name) {
                verify_same_spec(&field.name, buffered.spec(), &field.spec)?;
            }
            if let Some(earlier) = fields[..i].iter().find(|f| f.name == field.name) {
                verify_same_spec(&field.name, &earlier.spec, &field.spec)?;
            }
        }
        Ok(())
    }

    /// Delete every live document with `term` under `field`.
    pub fn delete_documents(&mut self, field: &str, term: &str) -> Result<u32> {
        self.flush()?;
        let mut deleted = 0;
        for seg in &mut self.segments {
            let hits = matching_live_docs(seg, field, term);
            if hits.is_empty() {
                continue;
            }
            let seg = segment_mut(&mut self.retired, seg);
            for doc in hits {
                if seg.delete_doc(doc) {
                    deleted += 1;
                }
            }
        }
        if deleted > 0 {
            self.dirty = true;
        }
        if self.config.verbose() {
            debug!(field, term, deleted, "delete by term");
        }
        Ok(deleted)
    }

    /// Mark every live document with `term` under `field` as soft-deleted.
    pub fn soft_delete_documents(&mut self, field: &str, term: &str) -> Result<u32> {
        let soft = self
            .config
            .soft_deletes_field
            .clone()
            .ok_or_else(|| IndexError::invalid_argument("no soft-deletes field is configured for this writer"))?;
        let spec = FieldSchemaSpec::soft_deletes();
        self.numbers.add_or_get(&soft, &spec, None)?;
        self.apply_doc_value(field, term, &soft, &spec, FieldValue::Numeric(1))
    }

    pub fn update_numeric_doc_value(&mut self, field: &str, term: &str, update_field: &str, value: i64) -> Result<u32> {
        self.update_doc_values(field, term, update_field, DocValuesType::Numeric, FieldValue::Numeric(value))
    }

    pub fn update_binary_doc_value(
        &mut self,
        field: &str,
        term: &str,
        update_field: &str,
        value: Vec<u8>,
    ) -> Result<u32> {
        self.update_doc_values(field, term, update_field, DocValuesType::Binary, FieldValue::Binary(value))
    }

    fn update_doc_values(
        &mut self,
        field: &str,
        term: &str,
        update_field: &str,
        kind: DocValuesType,
        value: FieldValue,
    ) -> Result<u32> {
        let spec = self.numbers.spec_of(update_field).cloned().ok_or_else(|| {
            IndexError::invalid_argument(format!(
                "can only update existing doc values fields, \"{update_field}\" is not in this index"
            ))
        })?;
        if spec.doc_values_type != kind {
            return Err(IndexError::invalid_argument(format!(
                "field \"{update_field}\" has doc values type {} and cannot be updated with a {kind} value",
                spec.doc_values_type
            )));
        }
        self.apply_doc_value(field, term, update_field, &spec, value)
    }

    /// Set `update_field` on every live document with `term`. Segments
    /// written before the field existed gain it in their registry.
    fn apply_doc_value(
        &mut self,
        field: &str,
        term: &str,
        update_field: &str,
        spec: &FieldSchemaSpec,
        value: FieldValue,
    ) -> Result<u32> {
        self.flush()?;
        let number = self
            .numbers
            .number_of(update_field)
            .ok_or_else(|| IndexError::internal(format!("field \"{update_field}\" has no number")))?;

        let mut updated = 0;
        for seg in &mut self.segments {
            let hits = matching_live_docs(seg, field, term);
            if hits.is_empty() {
                continue;
            }
            let seg = segment_mut(&mut self.retired, seg);
            for doc in hits {
                seg.update_doc_value(doc, update_field, number, spec, value.clone())?;
                updated += 1;
            }
        }
        if updated > 0 {
            self.dirty = true;
        }
        if self.config.verbose() {
            debug!(field, term, update_field, updated, "doc values update");
        }
        Ok(updated)
    }

    // =========================================================================
    // SEGMENTS
    // =========================================================================

    fn next_segment_name(&mut self) -> String {
        let name = segment_name(self.segment_counter);
        self.segment_counter += 1;
        name
    }

    fn build_segment(
        &mut self,
        registry: SchemaRegistry,
        docs: Vec<StoredFields>,
        stamp: SegmentVersionStamp,
        diagnostics: Diagnostics,
    ) -> Result<Segment> {
        let info = SegmentInfo {
            name: self.next_segment_name(),
            codec: self.config.engine_version.codec_name(),
            max_doc: docs.len() as u32,
            compound: self.config.compound(),
            created_index_major_version: self.index_created_major,
            stamp,
            diagnostics,
            registry,
            index_sort: self.index_sort.clone(),
        };
        Segment::new(info, docs)
    }

    /// Write buffered documents as a new segment. Not visible to readers
    /// of the store until the next commit.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.docs.is_empty() {
            return Ok(());
        }
        let Buffer { registry, mut docs } = mem::take(&mut self.buffer);
        if let Some(sort) = &self.index_sort {
            sort.sort_docs(&registry, &mut docs)?;
        }
        let engine = self.config.engine_version;
        let segment = self.build_segment(
            registry,
            docs,
            SegmentVersionStamp::fresh(engine, engine),
            Diagnostics::now(SegmentSource::Flush),
        )?;
        write_segment(self.store.as_ref(), &segment)?;

        if self.config.verbose() {
            debug!(
                event = Event::SegmentFlushed.as_str(),
                segment = segment.name(),
                docs = segment.max_doc(),
                "segment flushed"
            );
        }
        self.segments.push(Arc::new(segment));
        self.major_fixed = true;
        Ok(())
    }

    /// Merge until at most `max_segments` remain. Segments left with
    /// deletions are rewritten on their own.
    pub fn force_merge(&mut self, max_segments: usize) -> Result<()> {
        if max_segments == 0 {
            return Err(IndexError::invalid_argument("max_segments must be at least 1"));
        }
        if self.config.merge_policy == MergePolicy::NoMerge {
            if self.config.verbose() {
                debug!(max_segments, "force merge skipped, merge policy is no_merge");
            }
            return Ok(());
        }
        self.flush()?;

        if self.segments.len() > max_segments {
            let count = self.segments.len() - max_segments + 1;
            let inputs = self.segments[..count].to_vec();
            self.merge_segments(inputs)?;
        }
        let with_deletions: Vec<_> = self.segments.iter().filter(|s| s.has_deletions()).cloned().collect();
        for seg in with_deletions {
            self.merge_segments(vec![seg])?;
        }
        Ok(())
    }

    /// Replace contiguous `inputs` with their merge.
    fn merge_segments(&mut self, inputs: Vec<Arc<Segment>>) -> Result<()> {
        let engine = self.config.engine_version;
        let refs: Vec<&Segment> = inputs.iter().map(Arc::as_ref).collect();
        let merged = SchemaMerger::new(engine, MergeKind::Regular, Some(self.index_created_major))
            .with_index_sort(self.index_sort.clone())
            .merge(&refs, &mut self.numbers)?;
        let MergedSegment {
            registry,
            docs,
            min_version,
            merged_from,
            ..
        } = merged;

        let position = self
            .segments
            .iter()
            .position(|s| inputs.iter().any(|i| Arc::ptr_eq(i, s)))
            .unwrap_or(self.segments.len());
        let output = if docs.is_empty() {
            None
        } else {
            let segment = self.build_segment(
                registry,
                docs,
                SegmentVersionStamp::fresh(engine, min_version),
                Diagnostics::merged(SegmentSource::Merge, merged_from.clone()),
            )?;
            write_segment(self.store.as_ref(), &segment)?;
            Some(segment)
        };

        self.segments.retain(|s| !inputs.iter().any(|i| Arc::ptr_eq(i, s)));
        if let Some(segment) = &output {
            if self.config.verbose() {
                debug!(
                    event = Event::SegmentsMerged.as_str(),
                    segment = segment.name(),
                    ?merged_from,
                    docs = segment.max_doc(),
                    "segments merged"
                );
            }
        }
        if let Some(segment) = output {
            self.segments.insert(position.min(self.segments.len()), Arc::new(segment));
        }
        self.retired.extend(inputs);
        self.dirty = true;
        Ok(())
    }

    /// Copy every segment of the source indexes into this one. Segments
    /// keep their version stamps. All sources are validated before
    /// anything is written.
    pub fn add_indexes(&mut self, sources: &[Arc<dyn Store>]) -> Result<()> {
        self.flush()?;
        let mut numbers = self.numbers.clone();
        let mut major = (self.major_fixed || !self.segments.is_empty()).then_some(self.index_created_major);
        let mut loaded = Vec::new();

        for source in sources {
            let commit = read_latest(source.as_ref())?.ok_or_else(|| IndexError::IndexNotFound {
                resource: source.describe(),
            })?;
            check_commit(&commit, &self.window, &source.resource(&commit.file_name()))?;
            let target = *major.get_or_insert(commit.index_created_version_major);
            check_same_creation_major(commit.index_created_version_major, target)?;

            for seg_ref in &commit.segments {
                let (segment, _) = read_segment(source.as_ref(), seg_ref, &self.window)?;
                check_same_creation_major(segment.info().created_index_major_version, target)?;
                if let Some(sort) = &self.index_sort {
                    if segment.info().index_sort.as_ref() != Some(sort) {
                        return Err(IndexError::invalid_argument(format!(
                            "cannot change index sort from {} (segment {} of {}) to {sort}",
                            describe_sort(segment.info().index_sort.as_ref()),
                            segment.name(),
                            source.describe()
                        )));
                    }
                }
                for field in segment.registry().iter() {
                    numbers.add_or_get(field.name(), field.spec(), Some(field.number()))?;
                }
                loaded.push(segment);
            }
        }

        let Some(major) = major else {
            return Ok(());
        };
        self.numbers = numbers;
        self.index_created_major = major;
        self.major_fixed = true;

        let count = loaded.len();
        for source in &loaded {
            let segment = self.import_segment(source)?;
            write_segment(self.store.as_ref(), &segment)?;
            self.segments.push(Arc::new(segment));
        }
        self.dirty |= count > 0;
        info!(
            event = Event::IndexesAdded.as_str(),
            sources = sources.len(),
            segments = count,
            "indexes added"
        );
        Ok(())
    }

    /// `source` renamed and renumbered into this index, content unchanged.
    fn import_segment(&mut self, source: &Segment) -> Result<Segment> {
        let mut registry = SchemaRegistry::new();
        for field in source.registry().iter() {
            let number = self
                .numbers
                .number_of(field.name())
                .ok_or_else(|| IndexError::internal(format!("field \"{}\" has no number", field.name())))?;
            let mut renumbered = field.renumbered(number);
            renumbered.reset_doc_values_gen();
            registry.insert(renumbered)?;
        }
        let docs = (0..source.max_doc())
            .map(|doc| remap_fields(source.materialize(doc), source.registry(), &registry))
            .collect::<Result<Vec<_>>>()?;

        let info = SegmentInfo {
            name: self.next_segment_name(),
            codec: source.info().codec.clone(),
            max_doc: source.max_doc(),
            compound: self.config.compound(),
            created_index_major_version: source.info().created_index_major_version,
            stamp: *source.stamp(),
            diagnostics: Diagnostics::merged(SegmentSource::AddIndexes, vec![source.name().to_string()]),
            registry,
            index_sort: source.info().index_sort.clone(),
        };
        Segment::with_pending_deletes(info, docs, source.updates().hard_deletes.clone())
    }

    /// Merge the live documents of `reader` into one new segment.
    pub fn add_indexes_from_reader(&mut self, reader: &IndexReader) -> Result<()> {
        self.flush()?;
        let refs: Vec<&Segment> = reader.segments().iter().map(Arc::as_ref).collect();
        if refs.is_empty() {
            return Ok(());
        }
        let engine = self.config.engine_version;
        let target = (self.major_fixed || !self.segments.is_empty()).then_some(self.index_created_major);
        let merged = SchemaMerger::new(engine, MergeKind::Regular, target)
            .with_index_sort(self.index_sort.clone())
            .merge(&refs, &mut self.numbers)?;
        self.index_created_major = merged.created_index_major;
        self.major_fixed = true;
        if merged.docs.is_empty() {
            return Ok(());
        }

        let segment = self.build_segment(
            merged.registry,
            merged.docs,
            SegmentVersionStamp::fresh(engine, merged.min_version),
            Diagnostics::merged(SegmentSource::AddIndexes, merged.merged_from),
        )?;
        write_segment(self.store.as_ref(), &segment)?;
        info!(
            event = Event::IndexesAdded.as_str(),
            segment = segment.name(),
            docs = segment.max_doc(),
            "reader merged in"
        );
        self.segments.push(Arc::new(segment));
        self.dirty = true;
        Ok(())
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    /// Flush, persist pending update state and write the next commit.
    /// Returns the generation now current.
    pub fn commit(&mut self) -> Result<u64> {
        self.flush()?;
        if !self.dirty {
            if let Some(commit) = &self.last_commit {
                return Ok(commit.generation);
            }
        }

        for seg in &mut self.segments {
            if seg.has_pending_updates() {
                let generation = seg.next_generation();
                write_updates(self.store.as_ref(), seg, generation)?;
                segment_mut(&mut self.retired, seg).seal_pending();
            }
        }

        let record = CommitRecord {
            generation: self.last_commit.as_ref().map_or(1, |c| c.generation + 1),
            index_created_version_major: self.index_created_major,
            commit_version: self.config.engine_version,
            segments: self.segments.iter().map(|s| SegmentRef::of(s)).collect(),
            segment_counter: self.segment_counter,
            user_data: Default::default(),
        };
        record.write(self.store.as_ref())?;
        let generation = record.generation;
        info!(
            event = Event::CommitWritten.as_str(),
            generation,
            segments = record.segments.len(),
            "commit written"
        );

        self.last_commit = Some(record);
        self.dirty = false;
        self.delete_unused_files()?;
        Ok(generation)
    }

    fn delete_unused_files(&mut self) -> Result<()> {
        let mut protected = BTreeSet::new();
        match self.config.commit_retention {
            CommitRetention::KeepLatest => {
                if let Some(latest) = &self.last_commit {
                    self.deleter.prune_commits(&BTreeSet::from([latest.generation]))?;
                    protected.extend(files_of_commit(latest));
                }
            }
            CommitRetention::KeepAll => {
                for generation in list_commits(self.store.as_ref())? {
                    protected.extend(files_of_commit(&CommitRecord::read(self.store.as_ref(), generation)?));
                }
            }
        }
        self.retired.retain(|s| Arc::strong_count(s) > 1);
        for seg in self.segments.iter().chain(&self.retired) {
            protected.extend(seg.files());
        }
        self.deleter.sweep(&protected)?;
        Ok(())
    }

    /// Reader over the current state, committed or not. It shares segments
    /// with the writer and is unaffected by later changes.
    pub fn open_reader(&mut self) -> Result<IndexReader> {
        self.flush()?;
        Ok(IndexReader::from_segments(
            self.index_created_major,
            None,
            self.segments.clone(),
            ReadMode::ReadWrite,
        ))
    }

    /// Discard everything since the last commit and release the lock.
    pub fn rollback(mut self) -> Result<()> {
        self.buffer = Buffer::default();
        let mut protected = BTreeSet::new();
        for generation in list_commits(self.store.as_ref())? {
            protected.extend(files_of_commit(&CommitRecord::read(self.store.as_ref(), generation)?));
        }
        self.retired.retain(|s| Arc::strong_count(s) > 1);
        for seg in &self.retired {
            protected.extend(seg.files());
        }
        self.deleter.sweep(&protected)?;
        info!(event = Event::WriterRolledBack.as_str(), "uncommitted changes discarded");
        Ok(())
    }

    /// Commit and release the lock.
    pub fn close(mut self) -> Result<()> {
        let generation = self.commit()?;
        info!(event = Event::WriterClosed.as_str(), generation, "writer closed");
        Ok(())
    }
}

/// The sort a writer works under. A configured sort must match every
/// existing segment. Without one, the index keeps the sort its segments
/// share, if any.
fn resolve_index_sort(configured: Option<&IndexSort>, segments: &[Arc<Segment>]) -> Result<Option<IndexSort>> {
    match configured {
        Some(sort) => {
            if let Some(seg) = segments.iter().find(|s| s.info().index_sort.as_ref() != Some(sort)) {
                return Err(IndexError::invalid_argument(format!(
                    "cannot change index sort from {} (segment {}) to {sort}",
                    describe_sort(seg.info().index_sort.as_ref()),
                    seg.name()
                )));
            }
            Ok(Some(sort.clone()))
        }
        None => {
            let mut sorts = segments.iter().map(|s| s.info().index_sort.as_ref());
            let first = sorts.next().flatten();
            Ok(first.filter(|f| sorts.all(|s| s == Some(*f))).cloned())
        }
    }
}

fn matching_live_docs(segment: &Segment, field: &str, term: &str) -> Vec<u32> {
    segment
        .live_docs()
        .filter(|doc| segment.matches_term(*doc, field, term))
        .collect()
}

/// Mutable access to a segment; a copy shared with a reader is retired
/// rather than changed under it.
fn segment_mut<'a>(retired: &mut Vec<Arc<Segment>>, segment: &'a mut Arc<Segment>) -> &'a mut Segment {
    if Arc::strong_count(segment) > 1 {
        retired.push(Arc::clone(segment));
    }
    Arc::make_mut(segment)
}
