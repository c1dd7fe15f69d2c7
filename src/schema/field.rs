//! Field schema: one field's indexing characteristics within a segment

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::{ConsistencyRule, SchemaProperty, SchemaResult, SchemaViolation};
use super::types::{
    DocValuesType, IndexOptions, PointConfig, VectorConfig, MAX_POINT_DIMENSIONS, MAX_POINT_INDEX_DIMENSIONS,
    MAX_POINT_NUM_BYTES, MAX_VECTOR_DIMENSIONS,
};

/// Doc-values generation meaning "no standalone doc-values updates".
pub const NO_DOC_VALUES_GEN: i64 = -1;

/// Declared properties of a field, independent of its name and number.
///
/// This is what a document carries for each of its fields and what two
/// segments compare when they meet in a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FieldSchemaSpec {
    pub index_options: IndexOptions,
    pub doc_values_type: DocValuesType,
    pub store_term_vectors: bool,
    pub store_payloads: bool,
    pub omit_norms: bool,
    pub points: PointConfig,
    pub vectors: VectorConfig,
    pub is_soft_deletes_field: bool,
    pub is_parent_field: bool,
}

impl FieldSchemaSpec {
    /// Exact-match keyword: docs only, no norms.
    pub fn keyword() -> Self {
        Self {
            index_options: IndexOptions::Docs,
            omit_norms: true,
            ..Self::default()
        }
    }

    /// Tokenized text with positions and norms.
    pub fn text() -> Self {
        Self {
            index_options: IndexOptions::DocsFreqsPositions,
            ..Self::default()
        }
    }

    /// Stored-only, not indexed.
    pub fn stored() -> Self {
        Self::default()
    }

    pub fn doc_values(doc_values_type: DocValuesType) -> Self {
        Self {
            doc_values_type,
            ..Self::default()
        }
    }

    pub fn point(dimension_count: u32, num_bytes: u32) -> Self {
        Self {
            points: PointConfig::new(dimension_count, dimension_count, num_bytes),
            ..Self::default()
        }
    }

    pub fn vector(vectors: VectorConfig) -> Self {
        Self {
            vectors,
            ..Self::default()
        }
    }

    /// The numeric doc-values field that marks soft-deleted documents.
    pub fn soft_deletes() -> Self {
        Self {
            doc_values_type: DocValuesType::Numeric,
            is_soft_deletes_field: true,
            ..Self::default()
        }
    }

    pub fn with_doc_values(mut self, doc_values_type: DocValuesType) -> Self {
        self.doc_values_type = doc_values_type;
        self
    }

    pub fn with_term_vectors(mut self) -> Self {
        self.store_term_vectors = true;
        self
    }

    pub fn with_payloads(mut self) -> Self {
        self.store_payloads = true;
        self
    }
}

/// Schema of a single field inside one segment.
///
/// Every constructor and setter leaves the value fully consistent: setters
/// work on a copy and only commit it once all invariants hold again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    name: String,
    number: u32,
    #[serde(flatten)]
    spec: FieldSchemaSpec,
    doc_values_generation: i64,
    attributes: BTreeMap<String, String>,
}

impl FieldSchema {
    /// Build a field schema, validating every invariant up front.
    pub fn create(name: impl Into<String>, number: u32, spec: &FieldSchemaSpec) -> SchemaResult<Self> {
        let field = Self {
            name: name.into(),
            number,
            spec: spec.clone(),
            doc_values_generation: NO_DOC_VALUES_GEN,
            attributes: BTreeMap::new(),
        };
        field.check_consistency()?;
        Ok(field)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn spec(&self) -> &FieldSchemaSpec {
        &self.spec
    }

    pub fn index_options(&self) -> IndexOptions {
        self.spec.index_options
    }

    pub fn doc_values_type(&self) -> DocValuesType {
        self.spec.doc_values_type
    }

    pub fn store_term_vectors(&self) -> bool {
        self.spec.store_term_vectors
    }

    pub fn store_payloads(&self) -> bool {
        self.spec.store_payloads
    }

    pub fn omit_norms(&self) -> bool {
        self.spec.omit_norms
    }

    pub fn has_norms(&self) -> bool {
        self.spec.index_options.is_indexed() && !self.spec.omit_norms
    }

    pub fn points(&self) -> PointConfig {
        self.spec.points
    }

    pub fn vectors(&self) -> VectorConfig {
        self.spec.vectors
    }

    pub fn doc_values_generation(&self) -> i64 {
        self.doc_values_generation
    }

    pub fn is_soft_deletes_field(&self) -> bool {
        self.spec.is_soft_deletes_field
    }

    pub fn is_parent_field(&self) -> bool {
        self.spec.is_parent_field
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Codec metadata is opaque and may change after the segment is written.
    pub fn put_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.attributes.insert(key.into(), value.into())
    }

    /// Check every invariant of a field declaration.
    pub fn check_consistency(&self) -> SchemaResult<()> {
        let s = &self.spec;
        let name = self.name.as_str();

        if !s.index_options.is_indexed() {
            if s.store_term_vectors {
                return Err(SchemaViolation::inconsistent(
                    name,
                    ConsistencyRule::UnindexedFlags,
                    "cannot store term vectors on a field that is not indexed",
                ));
            }
            if s.store_payloads {
                return Err(SchemaViolation::inconsistent(
                    name,
                    ConsistencyRule::UnindexedFlags,
                    "cannot store payloads on a field that is not indexed",
                ));
            }
            if s.omit_norms {
                return Err(SchemaViolation::inconsistent(
                    name,
                    ConsistencyRule::UnindexedFlags,
                    "cannot omit norms on a field that is not indexed",
                ));
            }
        } else if s.store_payloads && !s.index_options.has_positions() {
            return Err(SchemaViolation::inconsistent(
                name,
                ConsistencyRule::PayloadsWithoutPositions,
                format!(
                    "indexed field with index options {} cannot store payloads",
                    s.index_options
                ),
            ));
        }

        if self.doc_values_generation != NO_DOC_VALUES_GEN && s.doc_values_type.is_none() {
            return Err(SchemaViolation::inconsistent(
                name,
                ConsistencyRule::DocValuesGenerationWithoutType,
                format!(
                    "field has no doc values but doc values generation={}",
                    self.doc_values_generation
                ),
            ));
        }

        check_point_shape(name, s.points)?;

        if s.vectors.dimension > MAX_VECTOR_DIMENSIONS {
            return Err(SchemaViolation::inconsistent(
                name,
                ConsistencyRule::VectorShape,
                format!(
                    "vector dimension must be <= {}, got {}",
                    MAX_VECTOR_DIMENSIONS, s.vectors.dimension
                ),
            ));
        }

        if s.is_soft_deletes_field && s.is_parent_field {
            return Err(SchemaViolation::inconsistent(
                name,
                ConsistencyRule::ConflictingRoles,
                "field cannot be both a soft-deletes field and a parent field",
            ));
        }

        Ok(())
    }

    /// Apply `change` to a copy and keep it only if the result is consistent.
    fn mutate<F>(&mut self, change: F) -> SchemaResult<()>
    where
        F: FnOnce(&mut FieldSchema) -> SchemaResult<()>,
    {
        let mut next = self.clone();
        change(&mut next)?;
        next.check_consistency()?;
        *self = next;
        Ok(())
    }

    /// Set the point shape. Idempotent for equal values; once a shape is
    /// set it can never be redefined.
    pub fn set_point_dimensions(
        &mut self,
        dimension_count: u32,
        index_dimension_count: u32,
        num_bytes: u32,
    ) -> SchemaResult<()> {
        let incoming = PointConfig::new(dimension_count, index_dimension_count, num_bytes);
        check_point_shape(&self.name, incoming)?;
        if dimension_count == 0 {
            return Err(SchemaViolation::inconsistent(
                &self.name,
                ConsistencyRule::PointShape,
                "point dimension count must be > 0",
            ));
        }

        self.mutate(|f| {
            let existing = f.spec.points;
            if existing.is_set() && existing != incoming {
                return Err(SchemaViolation::mismatch(
                    &f.name,
                    SchemaProperty::Points,
                    existing,
                    incoming,
                ));
            }
            f.spec.points = incoming;
            Ok(())
        })
    }

    /// Widen the doc-values type from `None`. Reaffirming the current type
    /// or passing `None` is a no-op; any other change is a violation.
    pub fn set_doc_values_type(&mut self, doc_values_type: DocValuesType) -> SchemaResult<()> {
        self.mutate(|f| {
            let existing = f.spec.doc_values_type;
            if doc_values_type.is_none() || existing == doc_values_type {
                return Ok(());
            }
            if !existing.is_none() {
                return Err(SchemaViolation::mismatch(
                    &f.name,
                    SchemaProperty::DocValuesType,
                    existing,
                    doc_values_type,
                ));
            }
            f.spec.doc_values_type = doc_values_type;
            Ok(())
        })
    }

    pub fn set_store_term_vectors(&mut self) -> SchemaResult<()> {
        self.mutate(|f| {
            f.spec.store_term_vectors = true;
            Ok(())
        })
    }

    /// Norms can only be omitted on an indexed field.
    pub fn set_omit_norms(&mut self) -> SchemaResult<()> {
        self.mutate(|f| {
            f.spec.omit_norms = true;
            Ok(())
        })
    }

    /// Payloads need positions.
    pub fn set_store_payloads(&mut self) -> SchemaResult<()> {
        self.mutate(|f| {
            f.spec.store_payloads = true;
            Ok(())
        })
    }

    /// Record the generation of the latest standalone doc-values update.
    pub fn set_doc_values_gen(&mut self, generation: i64) -> SchemaResult<()> {
        self.mutate(|f| {
            f.doc_values_generation = generation;
            Ok(())
        })
    }

    /// Same field under a different number, keeping every other property.
    pub(crate) fn renumbered(&self, number: u32) -> Self {
        Self {
            number,
            ..self.clone()
        }
    }

    /// Drop per-segment update state, as when documents are rewritten.
    pub(crate) fn reset_doc_values_gen(&mut self) {
        self.doc_values_generation = NO_DOC_VALUES_GEN;
    }
}

fn check_point_shape(name: &str, p: PointConfig) -> SchemaResult<()> {
    let fail = |detail: String| Err(SchemaViolation::inconsistent(name, ConsistencyRule::PointShape, detail));

    if p.dimension_count > MAX_POINT_DIMENSIONS {
        return fail(format!(
            "point dimension count must be <= {}, got {}",
            MAX_POINT_DIMENSIONS, p.dimension_count
        ));
    }
    if p.index_dimension_count > MAX_POINT_INDEX_DIMENSIONS {
        return fail(format!(
            "point index dimension count must be <= {}, got {}",
            MAX_POINT_INDEX_DIMENSIONS, p.index_dimension_count
        ));
    }
    if p.num_bytes > MAX_POINT_NUM_BYTES {
        return fail(format!(
            "point num bytes must be <= {}, got {}",
            MAX_POINT_NUM_BYTES, p.num_bytes
        ));
    }
    if p.index_dimension_count > p.dimension_count {
        return fail(format!(
            "point index dimension count ({}) must be <= point dimension count ({})",
            p.index_dimension_count, p.dimension_count
        ));
    }
    if (p.num_bytes > 0) != (p.dimension_count > 0) {
        return fail(format!(
            "point num bytes={} is incompatible with point dimension count={}",
            p.num_bytes, p.dimension_count
        ));
    }
    if (p.index_dimension_count > 0) != (p.dimension_count > 0) {
        return fail(format!(
            "point index dimension count={} is incompatible with point dimension count={}",
            p.index_dimension_count, p.dimension_count
        ));
    }
    Ok(())
}
