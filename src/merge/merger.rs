//! Schema merger

use std::collections::BTreeMap;

use crate::compat::{check_same_creation_major, classify, min_supported_major, Compatibility, Refusal, RefusalDetail};
use crate::error::{IndexError, Result};
use crate::schema::{verify_same_schema, FieldNumbers, FieldSchema, SchemaRegistry};
use crate::segment::{IndexSort, Segment, StoredFields};
use crate::version::Version;

/// Why segments are being merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// Ordinary merge inside a writable index; inputs must be read-write.
    Regular,
    /// Format upgrade; the read-only band is accepted as input.
    Upgrade,
}

/// Output of [`SchemaMerger::merge`], ready to be written as a segment.
#[derive(Debug, Clone)]
pub struct MergedSegment {
    pub registry: SchemaRegistry,
    pub docs: Vec<StoredFields>,
    /// Lowest minimum-compatible version among the inputs.
    pub min_version: Version,
    pub created_index_major: u32,
    pub merged_from: Vec<String>,
    pub index_sort: Option<IndexSort>,
}

#[derive(Debug, Clone)]
pub struct SchemaMerger {
    engine: Version,
    kind: MergeKind,
    target_major: Option<u32>,
    index_sort: Option<IndexSort>,
}

impl SchemaMerger {
    /// `target_major` is the creation major of the receiving index. `None`
    /// means the target has no constraint yet and adopts the major of the
    /// first input.
    pub fn new(engine: Version, kind: MergeKind, target_major: Option<u32>) -> Self {
        Self {
            engine,
            kind,
            target_major,
            index_sort: None,
        }
    }

    /// Sort the merged documents, and record the sort on the output.
    pub fn with_index_sort(mut self, index_sort: Option<IndexSort>) -> Self {
        self.index_sort = index_sort;
        self
    }

    /// Admit every input and agree on one creation major, which is
    /// returned.
    pub fn check_versions(&self, inputs: &[&Segment]) -> Result<u32> {
        let first = inputs
            .first()
            .ok_or_else(|| IndexError::invalid_argument("merge needs at least one segment"))?;

        for seg in inputs {
            match classify(seg.stamp(), self.engine) {
                Compatibility::Refuse(refusal) => return Err(refusal.into_error(seg.name())),
                Compatibility::ReadOnly if self.kind == MergeKind::Regular => {
                    return Err(Refusal::too_old(RefusalDetail::Bounds {
                        version: seg.stamp().created_by_version,
                        min_supported: Version::new(min_supported_major(self.engine), 0, 0),
                        max_supported: self.engine,
                    })
                    .into_error(seg.name()))
                }
                _ => {}
            }
        }

        let major = self.target_major.unwrap_or(first.info().created_index_major_version);
        for seg in inputs {
            check_same_creation_major(seg.info().created_index_major_version, major)?;
        }
        Ok(major)
    }

    /// Every name must have one schema across all inputs and agree with
    /// what the target index already declares.
    pub fn check_schemas(&self, inputs: &[&Segment], numbers: &FieldNumbers) -> Result<()> {
        let mut seen: BTreeMap<&str, &FieldSchema> = BTreeMap::new();
        for seg in inputs {
            for field in seg.registry().iter() {
                match seen.get(field.name()) {
                    Some(first) => verify_same_schema(first, field)?,
                    None => {
                        numbers.check(field.name(), field.spec())?;
                        seen.insert(field.name(), field);
                    }
                }
            }
        }
        Ok(())
    }

    /// Union of the input registries. New names are numbered through
    /// `numbers` in first-seen order, so the same inputs always produce
    /// the same numbering.
    pub fn merge_registries(&self, inputs: &[&Segment], numbers: &mut FieldNumbers) -> Result<SchemaRegistry> {
        let mut registry = SchemaRegistry::new();
        for seg in inputs {
            for field in seg.registry().iter() {
                match registry.get_mut(field.name()) {
                    Some(existing) => absorb(existing, field)?,
                    None => {
                        let number = numbers.add_or_get(field.name(), field.spec(), None)?;
                        let mut fresh = field.renumbered(number);
                        fresh.reset_doc_values_gen();
                        registry.insert(fresh)?;
                    }
                }
            }
        }
        Ok(registry)
    }

    /// Run all three steps. Deleted documents are dropped and doc-values
    /// updates are folded into the merged documents.
    pub fn merge(&self, inputs: &[&Segment], numbers: &mut FieldNumbers) -> Result<MergedSegment> {
        let created_index_major = self.check_versions(inputs)?;
        self.check_schemas(inputs, numbers)?;
        let registry = self.merge_registries(inputs, numbers)?;

        let mut docs = Vec::new();
        for seg in inputs {
            for doc in seg.live_docs() {
                docs.push(remap_fields(seg.materialize(doc), seg.registry(), &registry)?);
            }
        }
        if let Some(sort) = &self.index_sort {
            sort.sort_docs(&registry, &mut docs)?;
        }

        let min_version = inputs
            .iter()
            .map(|s| s.stamp().min_compatible_version)
            .min()
            .unwrap_or(self.engine);

        Ok(MergedSegment {
            registry,
            docs,
            min_version,
            created_index_major,
            merged_from: inputs.iter().map(|s| s.name().to_string()).collect(),
            index_sort: self.index_sort.clone(),
        })
    }
}

/// Fold the properties `incoming` adds into `existing`. The two were
/// already verified to describe the same field.
fn absorb(existing: &mut FieldSchema, incoming: &FieldSchema) -> Result<()> {
    existing.set_doc_values_type(incoming.doc_values_type())?;
    let points = incoming.points();
    if points.is_set() {
        existing.set_point_dimensions(points.dimension_count, points.index_dimension_count, points.num_bytes)?;
    }
    if incoming.store_payloads() && !existing.store_payloads() {
        existing.set_store_payloads()?;
    }
    for (key, value) in incoming.attributes() {
        if existing.attribute(key).is_none() {
            existing.put_attribute(key.as_str(), value.as_str());
        }
    }
    Ok(())
}

/// Renumber one document's fields from registry `from` to registry `to`.
pub fn remap_fields(fields: StoredFields, from: &SchemaRegistry, to: &SchemaRegistry) -> Result<StoredFields> {
    fields
        .into_iter()
        .map(|(number, value)| {
            let name = from
                .by_number(number)
                .map(FieldSchema::name)
                .ok_or_else(|| IndexError::internal(format!("field number {number} missing from source registry")))?;
            let target = to
                .get(name)
                .ok_or_else(|| IndexError::internal(format!("field \"{name}\" missing from target registry")))?;
            Ok((target.number(), value))
        })
        .collect()
}
