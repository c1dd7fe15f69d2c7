//! Index upgrader
//!
//! Rewrites every outdated segment of an index into the current format
//! and publishes the result in one commit. An upgrade either commits or
//! leaves the index exactly as it found it.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::state::UpgradeState;
use crate::compat::{check_same_creation_major, min_supported_major, ReadWindow};
use crate::error::{IndexError, Result};
use crate::index::{
    check_commit, files_of_commit, list_commits, read_segment, segment_name, write_segment, write_updates,
    CommitRecord, CompoundFile, FileDeleter, InfoStream, SegmentRef,
};
use crate::merge::{MergeKind, SchemaMerger};
use crate::observability::Event;
use crate::schema::FieldNumbers;
use crate::segment::{describe_sort, Diagnostics, IndexSort, Segment, SegmentInfo, SegmentSource, SegmentVersionStamp};
use crate::storage::{Store, WriteLock};
use crate::version::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOptions {
    pub engine_version: Version,
    /// Allow upgrading an index with several commit points. All but the
    /// new commit are deleted.
    pub delete_prior_commits: bool,
    pub compound_file: CompoundFile,
    pub info_stream: InfoStream,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            engine_version: Version::LATEST,
            delete_prior_commits: false,
            compound_file: CompoundFile::Always,
            info_stream: InfoStream::Silent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// Every segment was already current; no segment or commit was
    /// written. Older commits are still pruned when asked to.
    AlreadyCurrent { generation: u64 },
    Upgraded {
        generation: u64,
        /// Segments that were rewritten
        rewritten: usize,
        /// Segments in the new commit
        segments_after: usize,
    },
}

/// What validation decided to do.
#[derive(Debug)]
struct Plan {
    /// Positions of outdated segments, in commit order.
    outdated: Vec<usize>,
    /// Re-stamp a single segment instead of merging.
    restamp: bool,
    numbers: FieldNumbers,
    /// Sort shared by the outdated segments, kept by the rewrite.
    index_sort: Option<IndexSort>,
}

#[derive(Debug)]
pub struct IndexUpgrader {
    store: Arc<dyn Store>,
    options: UpgradeOptions,
    deleter: FileDeleter,
}

impl IndexUpgrader {
    pub fn new(store: Arc<dyn Store>, options: UpgradeOptions) -> Self {
        Self {
            deleter: FileDeleter::new(Arc::clone(&store)),
            store,
            options,
        }
    }

    fn verbose(&self) -> bool {
        self.options.info_stream == InfoStream::Tracing
    }

    fn enter(&self, state: &mut UpgradeState, next: UpgradeState) {
        if self.verbose() {
            debug!(
                event = Event::UpgradeTransition.as_str(),
                from = state.state_name(),
                to = next.state_name(),
                "upgrade state changed"
            );
        }
        *state = next;
    }

    pub fn upgrade(&self) -> Result<UpgradeOutcome> {
        let engine = self.options.engine_version;
        info!(
            event = Event::UpgradeStarted.as_str(),
            store = self.store.describe().as_str(),
            engine = %engine,
            "upgrade started"
        );

        let _lock = WriteLock::obtain(&self.store).map_err(|e| IndexError::upgrade_aborted(e.into()))?;
        let mut state = UpgradeState::open(0);
        let mut written = Vec::new();

        match self.run(&mut state, &mut written) {
            Ok(outcome) => {
                match &outcome {
                    UpgradeOutcome::Upgraded { generation, .. } => self.delete_superseded(*generation),
                    UpgradeOutcome::AlreadyCurrent { generation } if self.options.delete_prior_commits => {
                        self.delete_superseded(*generation)
                    }
                    UpgradeOutcome::AlreadyCurrent { .. } => {}
                }
                Ok(outcome)
            }
            Err(e) => {
                self.deleter.discard(&written);
                let aborted = state.abort().unwrap_or(state);
                warn!(
                    event = Event::UpgradeAborted.as_str(),
                    state = aborted.state_name(),
                    error = %e,
                    "upgrade aborted"
                );
                Err(IndexError::upgrade_aborted(e))
            }
        }
    }

    fn run(&self, state: &mut UpgradeState, written: &mut Vec<String>) -> Result<UpgradeOutcome> {
        let store = self.store.as_ref();
        let engine = self.options.engine_version;

        // Open
        let generations = list_commits(store)?;
        let Some(&latest) = generations.last() else {
            return Err(IndexError::IndexNotFound {
                resource: store.describe(),
            });
        };
        if generations.len() > 1 && !self.options.delete_prior_commits {
            return Err(IndexError::invalid_argument(format!(
                "index has {} commit points; older commits would keep referencing outdated segments, \
                 rerun with delete-prior-commits to remove them",
                generations.len()
            )));
        }
        let commit = CommitRecord::read(store, latest)?;
        let window = ReadWindow::with_min_major(engine, min_supported_major(engine).saturating_sub(1))?;
        check_commit(&commit, &window, &store.resource(&commit.file_name()))?;
        let mut segments = Vec::with_capacity(commit.segments.len());
        for seg_ref in &commit.segments {
            let (segment, _) = read_segment(store, seg_ref, &window)?;
            segments.push(segment);
        }
        self.enter(state, UpgradeState::open(segments.len()));

        // Validated
        let plan = self.validate(&commit, &segments)?;
        let next = state.validate(plan.outdated.len())?;
        self.enter(state, next);

        let reset_major = segments.is_empty() && commit.index_created_version_major != engine.major;
        if plan.outdated.is_empty() && !reset_major {
            info!(
                event = Event::UpgradeNoop.as_str(),
                generation = commit.generation,
                "index already current"
            );
            return Ok(UpgradeOutcome::AlreadyCurrent {
                generation: commit.generation,
            });
        }

        // Rewritten
        let mut counter = commit.segment_counter;
        let replacement = self.rewrite(&commit, &segments, plan, &mut counter, written)?;
        let next = state.rewrite(written.clone())?;
        self.enter(state, next);

        let (outdated, output) = replacement;
        let mut result = Vec::with_capacity(segments.len());
        let first_outdated = outdated.first().copied();
        for (i, segment) in segments.iter().enumerate() {
            if Some(i) == first_outdated {
                result.extend(output.iter().map(SegmentRef::of));
            }
            if !outdated.contains(&i) {
                result.push(SegmentRef::of(segment));
            }
        }

        // Committed
        let record = CommitRecord {
            generation: latest + 1,
            index_created_version_major: if segments.is_empty() {
                engine.major
            } else {
                commit.index_created_version_major
            },
            commit_version: engine,
            segments: result,
            segment_counter: counter,
            user_data: commit.user_data.clone(),
        };
        record.write(store)?;
        let next = state.commit(record.generation)?;
        self.enter(state, next);

        info!(
            event = Event::UpgradeCompleted.as_str(),
            generation = record.generation,
            rewritten = outdated.len(),
            segments = record.segments.len(),
            "upgrade committed"
        );
        Ok(UpgradeOutcome::Upgraded {
            generation: record.generation,
            rewritten: outdated.len(),
            segments_after: record.segments.len(),
        })
    }

    /// Decide what to rewrite and prove the rewrite can succeed before
    /// anything is written.
    fn validate(&self, commit: &CommitRecord, segments: &[Segment]) -> Result<Plan> {
        let engine = self.options.engine_version;
        let soft_deletes_field = segments
            .iter()
            .flat_map(|s| s.registry().iter())
            .find(|f| f.is_soft_deletes_field())
            .map(|f| f.name().to_string());
        let numbers = FieldNumbers::from_registries(soft_deletes_field, segments.iter().map(Segment::registry))?;

        let outdated: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.stamp().is_current(engine))
            .map(|(i, _)| i)
            .collect();
        for i in &outdated {
            let seg = &segments[*i];
            check_same_creation_major(seg.info().created_index_major_version, commit.index_created_version_major)?;
        }

        let inputs: Vec<&Segment> = outdated.iter().map(|i| &segments[*i]).collect();
        let index_sort = inputs.first().and_then(|s| s.info().index_sort.clone());
        if let Some(seg) = inputs.iter().find(|s| s.info().index_sort != index_sort) {
            return Err(IndexError::invalid_argument(format!(
                "outdated segments disagree on index sort: {} has {}, expected {}",
                seg.name(),
                describe_sort(seg.info().index_sort.as_ref()),
                describe_sort(index_sort.as_ref())
            )));
        }
        let restamp = inputs.len() == 1 && inputs[0].info().codec == engine.codec_name();
        if !inputs.is_empty() {
            let merger = SchemaMerger::new(engine, MergeKind::Upgrade, Some(commit.index_created_version_major));
            merger.check_versions(&inputs)?;
            merger.check_schemas(&inputs, &numbers)?;
        }

        if self.verbose() {
            debug!(
                outdated = outdated.len(),
                restamp,
                fields = numbers.len(),
                "upgrade plan validated"
            );
        }
        Ok(Plan {
            outdated,
            restamp,
            numbers,
            index_sort,
        })
    }

    /// Write the replacement for the outdated segments. Returns the
    /// replaced positions and the new segments.
    fn rewrite(
        &self,
        commit: &CommitRecord,
        segments: &[Segment],
        plan: Plan,
        counter: &mut u64,
        written: &mut Vec<String>,
    ) -> Result<(Vec<usize>, Vec<Segment>)> {
        let engine = self.options.engine_version;
        let store = self.store.as_ref();
        let Plan {
            outdated,
            restamp,
            mut numbers,
            index_sort,
        } = plan;
        let inputs: Vec<&Segment> = outdated.iter().map(|i| &segments[*i]).collect();
        let mut name = || {
            let n = segment_name(*counter);
            *counter += 1;
            n
        };

        let mut output = if inputs.is_empty() {
            Vec::new()
        } else if restamp {
            let source = inputs[0];
            let mut registry = source.registry().clone();
            registry.reset_doc_values_gens();
            let docs = (0..source.max_doc()).map(|d| source.materialize(d)).collect();
            let info = SegmentInfo {
                name: name(),
                codec: engine.codec_name(),
                max_doc: source.max_doc(),
                compound: self.options.compound_file == CompoundFile::Always,
                created_index_major_version: source.info().created_index_major_version,
                stamp: SegmentVersionStamp::fresh(engine, source.stamp().min_compatible_version),
                diagnostics: Diagnostics::merged(SegmentSource::Upgrade, vec![source.name().to_string()]),
                registry,
                index_sort: source.info().index_sort.clone(),
            };
            vec![Segment::with_pending_deletes(info, docs, source.updates().hard_deletes.clone())?]
        } else {
            let merged = SchemaMerger::new(engine, MergeKind::Upgrade, Some(commit.index_created_version_major))
                .with_index_sort(index_sort)
                .merge(&inputs, &mut numbers)?;
            if merged.docs.is_empty() {
                Vec::new()
            } else {
                let info = SegmentInfo {
                    name: name(),
                    codec: engine.codec_name(),
                    max_doc: merged.docs.len() as u32,
                    compound: self.options.compound_file == CompoundFile::Always,
                    created_index_major_version: merged.created_index_major,
                    stamp: SegmentVersionStamp::fresh(engine, merged.min_version),
                    diagnostics: Diagnostics::merged(SegmentSource::Upgrade, merged.merged_from),
                    registry: merged.registry,
                    index_sort: merged.index_sort,
                };
                vec![Segment::new(info, merged.docs)?]
            }
        };

        for segment in &mut output {
            written.extend(write_segment(store, segment)?);
            if segment.has_pending_updates() {
                let generation = segment.next_generation();
                written.push(write_updates(store, segment, generation)?);
                segment.seal_pending();
            }
            if self.verbose() {
                debug!(
                    segment = segment.name(),
                    docs = segment.max_doc(),
                    restamp,
                    "segment rewritten"
                );
            }
        }
        Ok((outdated, output))
    }

    /// Remove every older commit and the files only they referenced.
    /// Failures are logged; the upgrade itself is already durable.
    fn delete_superseded(&self, generation: u64) {
        let cleanup = || -> Result<()> {
            let current = CommitRecord::read(self.store.as_ref(), generation)?;
            self.deleter.prune_commits(&BTreeSet::from([generation]))?;
            self.deleter.sweep(&files_of_commit(&current))?;
            Ok(())
        };
        if let Err(e) = cleanup() {
            warn!(generation, error = %e, "could not delete superseded commits");
        }
    }
}
