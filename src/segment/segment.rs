//! In-memory view of one segment

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::document::{FieldValue, StoredDocument};
use super::info::SegmentInfo;
use super::stamp::SegmentVersionStamp;
use crate::error::{IndexError, Result};
use crate::schema::{FieldSchema, FieldSchemaSpec, SchemaRegistry};

/// Stored values of one document, keyed by field number.
pub type StoredFields = Vec<(u32, FieldValue)>;

/// Mutable state layered over a segment's immutable documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentUpdates {
    /// Generation of the last persisted update, 0 if none.
    pub generation: u64,
    pub hard_deletes: BTreeSet<u32>,
    /// Field number to doc to updated value.
    pub doc_values: BTreeMap<u32, BTreeMap<u32, FieldValue>>,
}

/// A segment: metadata, current registry, documents and update state.
///
/// Documents are shared between clones, so copy-on-write through
/// `Arc::make_mut` only copies the small update state.
#[derive(Debug, Clone)]
pub struct Segment {
    info: SegmentInfo,
    registry: SchemaRegistry,
    docs: Arc<Vec<StoredFields>>,
    updates: SegmentUpdates,
    pending: bool,
}

impl Segment {
    pub fn new(info: SegmentInfo, docs: Vec<StoredFields>) -> Result<Self> {
        let registry = info.registry.clone();
        Self::with_updates(info, docs, registry, SegmentUpdates::default())
    }

    /// Segment with persisted update state applied.
    pub fn with_updates(
        info: SegmentInfo,
        docs: Vec<StoredFields>,
        registry: SchemaRegistry,
        updates: SegmentUpdates,
    ) -> Result<Self> {
        if docs.len() != info.max_doc as usize {
            return Err(IndexError::corrupt(
                &info.name,
                format!("segment declares {} documents but holds {}", info.max_doc, docs.len()),
            ));
        }
        for (number, _) in docs.iter().flatten() {
            if info.registry.by_number(*number).is_none() {
                return Err(IndexError::corrupt(
                    &info.name,
                    format!("document references unknown field number {number}"),
                ));
            }
        }
        if let Some(doc) = updates.hard_deletes.iter().find(|d| **d >= info.max_doc) {
            return Err(IndexError::corrupt(&info.name, format!("deleted doc {doc} out of range")));
        }

        Ok(Self {
            info,
            registry,
            docs: Arc::new(docs),
            updates,
            pending: false,
        })
    }

    /// Freshly written segment that inherits deletions from the content
    /// it was copied from. The deletions are persisted at the next commit.
    pub(crate) fn with_pending_deletes(
        info: SegmentInfo,
        docs: Vec<StoredFields>,
        hard_deletes: BTreeSet<u32>,
    ) -> Result<Self> {
        let registry = info.registry.clone();
        let pending = !hard_deletes.is_empty();
        let updates = SegmentUpdates {
            hard_deletes,
            ..SegmentUpdates::default()
        };
        let mut segment = Self::with_updates(info, docs, registry, updates)?;
        segment.pending = pending;
        Ok(segment)
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &SegmentInfo {
        &self.info
    }

    pub fn stamp(&self) -> &SegmentVersionStamp {
        &self.info.stamp
    }

    /// Registry including any doc-values updates applied since the
    /// segment was written.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn updates(&self) -> &SegmentUpdates {
        &self.updates
    }

    pub fn max_doc(&self) -> u32 {
        self.info.max_doc
    }

    pub(crate) fn docs(&self) -> &[StoredFields] {
        &self.docs
    }

    /// Update generation persisted for this segment, if any.
    pub fn update_generation(&self) -> Option<u64> {
        (self.updates.generation > 0).then_some(self.updates.generation)
    }

    pub fn has_pending_updates(&self) -> bool {
        self.pending
    }

    fn soft_deletes_number(&self) -> Option<u32> {
        self.registry.iter().find(|f| f.is_soft_deletes_field()).map(FieldSchema::number)
    }

    pub fn is_deleted(&self, doc: u32) -> bool {
        if self.updates.hard_deletes.contains(&doc) {
            return true;
        }
        match self.soft_deletes_number() {
            Some(number) => self.doc_value_by_number(doc, number).is_some(),
            None => false,
        }
    }

    pub fn live_docs(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.max_doc()).filter(move |d| !self.is_deleted(*d))
    }

    pub fn num_docs(&self) -> u32 {
        self.live_docs().count() as u32
    }

    pub fn has_deletions(&self) -> bool {
        self.num_docs() < self.max_doc()
    }

    fn doc_value_by_number(&self, doc: u32, number: u32) -> Option<&FieldValue> {
        if let Some(v) = self.updates.doc_values.get(&number).and_then(|m| m.get(&doc)) {
            return Some(v);
        }
        self.docs
            .get(doc as usize)?
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, v)| v)
    }

    /// Current doc value of `field` for `doc`, updates included.
    pub fn doc_value(&self, doc: u32, field: &str) -> Option<&FieldValue> {
        let schema = self.registry.get(field)?;
        if schema.doc_values_type().is_none() {
            return None;
        }
        self.doc_value_by_number(doc, schema.number())
    }

    /// First stored value of `field` for `doc`.
    pub fn stored_value(&self, doc: u32, field: &str) -> Option<&FieldValue> {
        let number = self.registry.get(field)?.number();
        self.docs
            .get(doc as usize)?
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, v)| v)
    }

    pub fn document(&self, doc: u32) -> Option<StoredDocument> {
        let fields = self.docs.get(doc as usize)?;
        let named = fields
            .iter()
            .filter_map(|(n, v)| self.registry.by_number(*n).map(|f| (f.name().to_string(), v.clone())))
            .collect();
        Some(StoredDocument::new(named))
    }

    /// Whether `doc` has `term` indexed under `field`.
    pub fn matches_term(&self, doc: u32, field: &str, term: &str) -> bool {
        let Some(schema) = self.registry.get(field) else {
            return false;
        };
        if !schema.index_options().is_indexed() {
            return false;
        }
        let number = schema.number();
        self.docs.get(doc as usize).is_some_and(|fields| {
            fields
                .iter()
                .filter(|(n, _)| *n == number)
                .any(|(_, v)| v.terms().iter().any(|t| t == term))
        })
    }

    /// Stored fields of `doc` with doc-values updates folded in, in this
    /// segment's numbering.
    pub fn materialize(&self, doc: u32) -> StoredFields {
        let mut fields: StoredFields = self
            .docs
            .get(doc as usize)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|(n, v)| match self.updates.doc_values.get(&n).and_then(|m| m.get(&doc)) {
                Some(updated) => (n, updated.clone()),
                None => (n, v),
            })
            .collect();

        for (number, values) in &self.updates.doc_values {
            if let Some(v) = values.get(&doc) {
                if !fields.iter().any(|(n, _)| n == number) {
                    fields.push((*number, v.clone()));
                }
            }
        }
        fields
    }

    /// Files backing this segment in its current state.
    pub fn files(&self) -> Vec<String> {
        let mut files = if self.info.compound {
            vec![compound_file(self.name())]
        } else {
            vec![info_file(self.name()), data_file(self.name())]
        };
        if let Some(gen) = self.update_generation() {
            files.push(updates_file(self.name(), gen));
        }
        files
    }

    // =========================================================================
    // MUTATION (writer only)
    // =========================================================================

    /// Generation the next persisted update will carry.
    pub(crate) fn next_generation(&self) -> u64 {
        self.updates.generation + 1
    }

    /// Mark `doc` deleted. Returns false if it already was.
    pub(crate) fn delete_doc(&mut self, doc: u32) -> bool {
        if doc >= self.max_doc() || self.is_deleted(doc) {
            return false;
        }
        self.updates.hard_deletes.insert(doc);
        self.pending = true;
        true
    }

    /// Replace the doc value of `field` for `doc`. The field is added to
    /// this segment's registry under `number` if the segment predates it.
    pub(crate) fn update_doc_value(
        &mut self,
        doc: u32,
        field: &str,
        number: u32,
        spec: &FieldSchemaSpec,
        value: FieldValue,
    ) -> Result<()> {
        let generation = self.next_generation() as i64;
        if self.registry.get(field).is_none() {
            let base = FieldSchemaSpec {
                doc_values_type: Default::default(),
                ..spec.clone()
            };
            self.registry.insert(FieldSchema::create(field, number, &base)?)?;
        }
        let schema = self
            .registry
            .get_mut(field)
            .ok_or_else(|| IndexError::internal(format!("field \"{field}\" vanished from registry")))?;
        if schema.number() != number {
            return Err(IndexError::internal(format!(
                "field \"{field}\" has number {} in segment {} but {number} in the index",
                schema.number(),
                self.info.name
            )));
        }
        schema.set_doc_values_type(spec.doc_values_type)?;
        schema.set_doc_values_gen(generation)?;

        self.updates.doc_values.entry(number).or_default().insert(doc, value);
        self.pending = true;
        Ok(())
    }

    /// Advance the generation for the pending state about to be written.
    pub(crate) fn seal_pending(&mut self) -> Option<u64> {
        if !self.pending {
            return None;
        }
        self.updates.generation += 1;
        self.pending = false;
        Some(self.updates.generation)
    }
}

pub fn compound_file(segment: &str) -> String {
    format!("{segment}.cfs")
}

pub fn info_file(segment: &str) -> String {
    format!("{segment}.si")
}

pub fn data_file(segment: &str) -> String {
    format!("{segment}.dat")
}

pub fn updates_file(segment: &str, generation: u64) -> String {
    format!("{segment}_{generation}.upd")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DocValuesType, FieldNumbers};
    use crate::segment::{Diagnostics, SegmentSource};
    use crate::version::Version;

    fn segment(compound: bool) -> Segment {
        let mut numbers = FieldNumbers::new(Some("soft".into()));
        let mut registry = SchemaRegistry::new();
        let id = registry.declare("id", &FieldSchemaSpec::keyword(), &mut numbers).unwrap();
        let dv = registry
            .declare("count", &FieldSchemaSpec::doc_values(DocValuesType::Numeric), &mut numbers)
            .unwrap();
        let soft = registry.declare("soft", &FieldSchemaSpec::soft_deletes(), &mut numbers).unwrap();

        let docs = vec![
            vec![(id, FieldValue::Keyword("0".into())), (dv, FieldValue::Numeric(10))],
            vec![(id, FieldValue::Keyword("1".into())), (dv, FieldValue::Numeric(11))],
            vec![(id, FieldValue::Keyword("2".into())), (soft, FieldValue::Numeric(1))],
        ];
        let info = SegmentInfo {
            name: "_0".into(),
            codec: Version::LATEST.codec_name(),
            max_doc: 3,
            compound,
            created_index_major_version: 10,
            stamp: SegmentVersionStamp::fresh(Version::LATEST, Version::LATEST),
            diagnostics: Diagnostics::now(SegmentSource::Flush),
            registry,
            index_sort: None,
        };
        Segment::new(info, docs).unwrap()
    }

    #[test]
    fn test_soft_deleted_doc_not_live() {
        let seg = segment(true);
        assert_eq!(seg.num_docs(), 2);
        assert!(seg.is_deleted(2));
        assert_eq!(seg.live_docs().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_hard_delete_pending_until_sealed() {
        let mut seg = segment(true);
        assert!(seg.delete_doc(0));
        assert!(!seg.delete_doc(0));
        assert!(seg.has_pending_updates());
        assert_eq!(seg.seal_pending(), Some(1));
        assert_eq!(seg.seal_pending(), None);
        assert_eq!(seg.files(), vec!["_0.cfs".to_string(), "_0_1.upd".to_string()]);
    }

    #[test]
    fn test_doc_value_update_bumps_generation() {
        let mut seg = segment(false);
        let number = seg.registry().get("count").unwrap().number();
        seg.update_doc_value(1, "count", number, &FieldSchemaSpec::doc_values(DocValuesType::Numeric), FieldValue::Numeric(99))
            .unwrap();
        assert_eq!(seg.doc_value(1, "count"), Some(&FieldValue::Numeric(99)));
        assert_eq!(seg.stored_value(1, "count"), Some(&FieldValue::Numeric(11)));
        assert_eq!(seg.registry().get("count").unwrap().doc_values_generation(), 1);
        assert_eq!(seg.info().registry.get("count").unwrap().doc_values_generation(), -1);
        assert_eq!(seg.materialize(1)[1], (number, FieldValue::Numeric(99)));
    }

    #[test]
    fn test_doc_value_update_adds_new_field() {
        let mut seg = segment(false);
        seg.update_doc_value(0, "fresh", 9, &FieldSchemaSpec::doc_values(DocValuesType::Numeric), FieldValue::Numeric(5))
            .unwrap();
        let f = seg.registry().get("fresh").unwrap();
        assert_eq!(f.number(), 9);
        assert_eq!(f.doc_values_type(), DocValuesType::Numeric);
        assert!(seg.materialize(0).contains(&(9, FieldValue::Numeric(5))));
    }

    #[test]
    fn test_non_compound_files() {
        let seg = segment(false);
        assert_eq!(seg.files(), vec!["_0.si".to_string(), "_0.dat".to_string()]);
    }

    #[test]
    fn test_term_matching_needs_indexed_field() {
        let seg = segment(true);
        assert!(seg.matches_term(1, "id", "1"));
        assert!(!seg.matches_term(1, "id", "2"));
        assert!(!seg.matches_term(0, "count", "10"));
    }

    #[test]
    fn test_rejects_doc_count_mismatch() {
        let seg = segment(true);
        let mut info = seg.info().clone();
        info.max_doc = 5;
        assert!(matches!(Segment::new(info, seg.docs().to_vec()), Err(IndexError::CorruptIndex { .. })));
    }
}
