//! Per-segment metadata record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sort::IndexSort;
use super::stamp::{SegmentVersionStamp, StampRecord};
use crate::error::Result;
use crate::schema::SchemaRegistry;

/// What produced a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentSource {
    Flush,
    Merge,
    Upgrade,
    AddIndexes,
}

impl SegmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentSource::Flush => "flush",
            SegmentSource::Merge => "merge",
            SegmentSource::Upgrade => "upgrade",
            SegmentSource::AddIndexes => "add-indexes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub source: SegmentSource,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_from: Vec<String>,
}

impl Diagnostics {
    pub fn now(source: SegmentSource) -> Self {
        Self {
            source,
            timestamp: Utc::now(),
            merged_from: Vec::new(),
        }
    }

    pub fn merged(source: SegmentSource, merged_from: Vec<String>) -> Self {
        Self {
            merged_from,
            ..Self::now(source)
        }
    }
}

/// Everything known about a segment except its documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    pub name: String,
    pub codec: String,
    pub max_doc: u32,
    pub compound: bool,
    pub created_index_major_version: u32,
    pub stamp: SegmentVersionStamp,
    pub diagnostics: Diagnostics,
    pub registry: SchemaRegistry,
    /// Order of the documents, if the writer sorted them.
    pub index_sort: Option<IndexSort>,
}

impl SegmentInfo {
    pub fn to_record(&self) -> SegmentInfoRecord {
        SegmentInfoRecord {
            name: self.name.clone(),
            codec: self.codec.clone(),
            max_doc: self.max_doc,
            compound: self.compound,
            created_index_major_version: self.created_index_major_version,
            stamp: self.stamp.to_record(),
            diagnostics: self.diagnostics.clone(),
            registry: self.registry.clone(),
            index_sort: self.index_sort.clone(),
        }
    }

    pub fn from_record(record: SegmentInfoRecord, resource: &str) -> Result<Self> {
        let stamp = SegmentVersionStamp::from_record(&record.stamp, resource)?;
        Ok(Self {
            name: record.name,
            codec: record.codec,
            max_doc: record.max_doc,
            compound: record.compound,
            created_index_major_version: record.created_index_major_version,
            stamp,
            diagnostics: record.diagnostics,
            registry: record.registry,
            index_sort: record.index_sort,
        })
    }
}

/// Persisted form of [`SegmentInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfoRecord {
    pub name: String,
    pub codec: String,
    pub max_doc: u32,
    pub compound: bool,
    pub created_index_major_version: u32,
    pub stamp: StampRecord,
    pub diagnostics: Diagnostics,
    pub registry: SchemaRegistry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_sort: Option<IndexSort>,
}
