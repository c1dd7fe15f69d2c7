//! Shared fixtures for integration tests
//!
//! A fixture is a small index written by the writer posing as an older
//! engine release: `DOCS_COUNT` documents plus one document whose only
//! indexed field has no positions, over several segments, with document
//! `DELETED_ID` deleted.

#![allow(dead_code)]

use std::sync::Arc;

use strata::index::{CommitRetention, CompoundFile, IndexReader, IndexWriter, OpenMode, WriterConfig};
use strata::schema::{FieldSchemaSpec, IndexOptions, VectorSimilarity};
use strata::segment::{decode_int_point, Document, Field, FieldValue, IndexSort};
use strata::storage::{Store, StoreImpl};
use strata::version::{Version, KNOWN_VERSIONS};
use strata::Result;
use tempfile::TempDir;

pub const DOCS_COUNT: u32 = 35;
pub const DELETED_ID: u32 = 7;
/// Documents in a fresh fixture, the no-positions document included.
pub const MAX_DOC: u32 = DOCS_COUNT + 1;
/// Live documents in a fresh fixture.
pub const LIVE_DOCS: u32 = MAX_DOC - 1;
/// Live documents matching "aaa" in "content".
pub const CONTENT_HITS: u32 = DOCS_COUNT - 1;
/// Field indexed without frequencies or positions.
pub const NOPROX_FIELD: &str = "content3";
/// Documents per flushed segment.
pub const SEGMENT_DOCS: usize = 10;

// =============================================================================
// Documents
// =============================================================================

pub fn make_doc(id: u32) -> Document {
    let mut doc = Document::new();
    doc.add_keyword("id", id.to_string())
        .add_text("content", format!("here is more content with aaa aaa aaa {id}"))
        .add(Field::new(
            "content2",
            FieldSchemaSpec::text().with_term_vectors(),
            FieldValue::Text(format!("here is more content with aaa aaa aaa {id}")),
        ))
        .add_int_point("points", id as i32)
        .add_int_points("points2d", &[id as i32, 2 * id as i32])
        .add_numeric_doc_value("dv", id as i64)
        .add_binary_doc_value("dv_binary", id.to_be_bytes().to_vec())
        .add_sorted_doc_value("dv_sorted", format!("s{id:03}"))
        .add_sorted_set_doc_value("dv_sorted_set", format!("t{id:03}"))
        .add_sorted_numeric_doc_value("dv_sorted_numeric", -(id as i64))
        .add_float_vector("knn_float", float_vector(id), VectorSimilarity::Cosine)
        .add_byte_vector("knn_byte", &byte_vector(id), VectorSimilarity::Euclidean);
    doc
}

pub fn float_vector(id: u32) -> Vec<f32> {
    vec![id as f32, id as f32 + 0.5, 1.0]
}

pub fn byte_vector(id: u32) -> Vec<i8> {
    vec![(id % 100) as i8, -((id % 100) as i8), 1]
}

/// Document whose only indexed field records documents alone.
pub fn make_noprox_doc() -> Document {
    let mut doc = Document::new();
    let docs_only = FieldSchemaSpec {
        index_options: IndexOptions::Docs,
        ..FieldSchemaSpec::text()
    };
    doc.add(Field::new(NOPROX_FIELD, docs_only, FieldValue::Text("aaa".into())))
        .add_stored("content4", "aaa");
    doc
}

/// Every field the fixture declares, with its schema.
pub fn expected_schema() -> Vec<(String, FieldSchemaSpec)> {
    make_doc(0)
        .fields()
        .iter()
        .chain(make_noprox_doc().fields())
        .map(|f| (f.name.clone(), f.spec.clone()))
        .collect()
}

/// Every fixture field is still declared, with the same schema, by each
/// segment holding it.
pub fn assert_schema_intact(reader: &IndexReader, context: &str) {
    for (name, spec) in expected_schema() {
        let mut seen = false;
        for seg in reader.segments() {
            if let Some(field) = seg.registry().get(&name) {
                assert_eq!(field.spec(), &spec, "{context}: \"{name}\" in {}", seg.name());
                seen = true;
            }
        }
        assert!(seen, "{context}: \"{name}\" missing");
    }
}

/// The values `make_doc(id)` wrote are what the reader returns.
pub fn assert_doc_values(reader: &IndexReader, id: u32, context: &str) {
    let hits = reader.search_term("id", &id.to_string());
    assert_eq!(hits.len(), 1, "{context}: id {id}");
    let doc = hits[0];
    assert_eq!(reader.numeric_doc_value(doc, "dv"), Some(id as i64), "{context}");
    assert_eq!(reader.binary_doc_value(doc, "dv_binary"), Some(id.to_be_bytes().to_vec()), "{context}");
    assert_eq!(reader.binary_doc_value(doc, "dv_sorted"), Some(format!("s{id:03}").into_bytes()), "{context}");
    assert_eq!(reader.binary_doc_value(doc, "dv_sorted_set"), Some(format!("t{id:03}").into_bytes()), "{context}");
    assert_eq!(reader.numeric_doc_value(doc, "dv_sorted_numeric"), Some(-(id as i64)), "{context}");

    let point = reader.point_value(doc, "points").unwrap();
    assert_eq!(decode_int_point(&point[0]), Some(id as i32), "{context}");
    let point = reader.point_value(doc, "points2d").unwrap();
    assert_eq!(point.len(), 2, "{context}");
    assert_eq!(decode_int_point(&point[1]), Some(2 * id as i32), "{context}");

    assert_eq!(reader.vector_value(doc, "knn_float"), Some(float_vector(id)), "{context}");
    let bytes: Vec<f32> = byte_vector(id).into_iter().map(f32::from).collect();
    assert_eq!(reader.vector_value(doc, "knn_byte"), Some(bytes), "{context}");
    assert_eq!(reader.search_term("content2", &id.to_string()), vec![doc], "{context}");
}

pub fn store_at(dir: &TempDir) -> Arc<dyn Store> {
    StoreImpl::FsNoSync.open(dir.path()).unwrap()
}

pub fn config_for(version: Version, compound: CompoundFile) -> WriterConfig {
    WriterConfig::default()
        .with_open_mode(OpenMode::Create)
        .with_engine_version(version)
        .with_compound_file(compound)
        .with_max_buffered_docs(SEGMENT_DOCS)
}

// =============================================================================
// Fixtures
// =============================================================================

pub struct Fixture {
    pub version: Version,
    pub compound: CompoundFile,
    pub dir: TempDir,
    pub store: Arc<dyn Store>,
}

impl Fixture {
    /// Standard index written by `version`.
    pub fn build(version: Version, compound: CompoundFile) -> Result<Self> {
        Self::build_with(version, compound, CommitRetention::KeepLatest, 1)
    }

    /// Like [`Fixture::build`], committing `commits` times. The extra
    /// commits each add one document past `DOCS_COUNT`.
    pub fn build_with(
        version: Version,
        compound: CompoundFile,
        retention: CommitRetention,
        commits: u32,
    ) -> Result<Self> {
        let config = config_for(version, compound).with_commit_retention(retention);
        Self::build_from(version, compound, config, commits)
    }

    /// Standard index whose segments are sorted by `sort`.
    pub fn build_sorted(version: Version, compound: CompoundFile, sort: IndexSort) -> Result<Self> {
        let config = config_for(version, compound).with_index_sort(sort);
        Self::build_from(version, compound, config, 1)
    }

    fn build_from(version: Version, compound: CompoundFile, config: WriterConfig, commits: u32) -> Result<Self> {
        let dir = TempDir::new().map_err(|e| strata::IndexError::internal(e.to_string()))?;
        let store = store_at(&dir);
        let mut writer = IndexWriter::open(Arc::clone(&store), config)?;
        for id in 0..DOCS_COUNT {
            writer.add_document(&make_doc(id))?;
        }
        writer.add_document(&make_noprox_doc())?;
        writer.delete_documents("id", &DELETED_ID.to_string())?;
        writer.commit()?;
        for extra in 1..commits {
            writer.add_document(&make_doc(DOCS_COUNT + extra - 1))?;
            writer.commit()?;
        }
        writer.close()?;
        Ok(Self {
            version,
            compound,
            dir,
            store,
        })
    }

    pub fn name(&self) -> String {
        let layout = match self.compound {
            CompoundFile::Always => "cfs",
            CompoundFile::Never => "nocfs",
        };
        format!("{}-{}", self.version, layout)
    }

    pub fn files(&self) -> Vec<String> {
        self.store.list().unwrap()
    }
}

/// Fixtures for a set of versions, both layouts. Every directory is
/// removed when the pool drops, including after a failed build.
pub struct FixturePool {
    fixtures: Vec<Fixture>,
}

impl FixturePool {
    pub fn build(versions: impl IntoIterator<Item = Version>) -> Result<Self> {
        let mut fixtures = Vec::new();
        for version in versions {
            for compound in [CompoundFile::Always, CompoundFile::Never] {
                // An error drops `fixtures` and with it every directory so far.
                fixtures.push(Fixture::build(version, compound)?);
            }
        }
        Ok(Self { fixtures })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fixture> {
        self.fixtures.iter()
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }
}

/// Released versions the running engine reads and writes.
pub fn supported_versions() -> Vec<Version> {
    KNOWN_VERSIONS
        .iter()
        .copied()
        .filter(|v| v.major + 1 >= Version::LATEST.major && *v != Version::LATEST)
        .collect()
}
