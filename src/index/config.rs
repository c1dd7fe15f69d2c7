//! Writer configuration
//!
//! One explicit value with named options, loadable from JSON. Defaults
//! produce a current-version, compound-file index that keeps only its
//! latest commit.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compat::min_supported_major;
use crate::error::{IndexError, Result};
use crate::segment::IndexSort;
use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Start a new index, discarding any existing commit on first commit
    Create,
    /// Open an existing index; fail if there is none
    Append,
    /// Append if an index exists, create otherwise
    #[default]
    CreateOrAppend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompoundFile {
    /// Pack each segment into one `.cfs` file
    #[default]
    Always,
    /// Separate `.si` and `.dat` files
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Never merge, `force_merge` included
    NoMerge,
    /// Merge only when asked to
    #[default]
    ForceMergeOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommitRetention {
    #[default]
    KeepLatest,
    KeepAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InfoStream {
    /// Only lifecycle events
    #[default]
    Silent,
    /// Per-operation debug events
    Tracing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    pub open_mode: OpenMode,
    pub compound_file: CompoundFile,
    pub merge_policy: MergePolicy,
    pub commit_retention: CommitRetention,
    pub info_stream: InfoStream,
    /// Documents buffered before an automatic flush
    pub max_buffered_docs: usize,
    pub soft_deletes_field: Option<String>,
    /// Order of documents inside every segment this writer produces
    pub index_sort: Option<IndexSort>,
    /// Version the writer stamps segments with
    pub engine_version: Version,
    /// Creation major for a new index; only honoured with `Create`
    pub created_version_major: Option<u32>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            open_mode: OpenMode::default(),
            compound_file: CompoundFile::default(),
            merge_policy: MergePolicy::default(),
            commit_retention: CommitRetention::default(),
            info_stream: InfoStream::default(),
            max_buffered_docs: 1000,
            soft_deletes_field: None,
            index_sort: None,
            engine_version: Version::LATEST,
            created_version_major: None,
        }
    }
}

impl WriterConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| IndexError::InvalidConfig(format!("failed to read {}: {}", path.display(), e)))?;
        let config: WriterConfig = serde_json::from_str(&content)
            .map_err(|e| IndexError::InvalidConfig(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_buffered_docs == 0 {
            return Err(IndexError::InvalidConfig("max_buffered_docs must be > 0".to_string()));
        }
        if let Some(field) = &self.soft_deletes_field {
            if field.is_empty() {
                return Err(IndexError::InvalidConfig("soft_deletes_field must not be empty".to_string()));
            }
        }
        if let Some(sort) = &self.index_sort {
            if sort.field.is_empty() {
                return Err(IndexError::InvalidConfig("index_sort field must not be empty".to_string()));
            }
        }
        if let Some(major) = self.created_version_major {
            if self.open_mode != OpenMode::Create {
                return Err(IndexError::InvalidConfig(
                    "created_version_major can only be set with open_mode=create".to_string(),
                ));
            }
            let floor = min_supported_major(self.engine_version);
            if major < floor || major > self.engine_version.major {
                return Err(IndexError::InvalidConfig(format!(
                    "created_version_major must be between {} and {}, got {}",
                    floor, self.engine_version.major, major
                )));
            }
        }
        Ok(())
    }

    pub fn with_open_mode(mut self, open_mode: OpenMode) -> Self {
        self.open_mode = open_mode;
        self
    }

    pub fn with_compound_file(mut self, compound_file: CompoundFile) -> Self {
        self.compound_file = compound_file;
        self
    }

    pub fn with_merge_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.merge_policy = merge_policy;
        self
    }

    pub fn with_commit_retention(mut self, commit_retention: CommitRetention) -> Self {
        self.commit_retention = commit_retention;
        self
    }

    pub fn with_info_stream(mut self, info_stream: InfoStream) -> Self {
        self.info_stream = info_stream;
        self
    }

    pub fn with_max_buffered_docs(mut self, max_buffered_docs: usize) -> Self {
        self.max_buffered_docs = max_buffered_docs;
        self
    }

    pub fn with_soft_deletes_field(mut self, field: impl Into<String>) -> Self {
        self.soft_deletes_field = Some(field.into());
        self
    }

    pub fn with_index_sort(mut self, index_sort: IndexSort) -> Self {
        self.index_sort = Some(index_sort);
        self
    }

    pub fn with_engine_version(mut self, engine_version: Version) -> Self {
        self.engine_version = engine_version;
        self
    }

    pub fn with_created_version_major(mut self, major: u32) -> Self {
        self.created_version_major = Some(major);
        self
    }

    pub(crate) fn compound(&self) -> bool {
        self.compound_file == CompoundFile::Always
    }

    pub(crate) fn verbose(&self) -> bool {
        self.info_stream == InfoStream::Tracing
    }
}
