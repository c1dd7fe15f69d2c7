//! Per-field indexing option types
//!
//! These are the building blocks of a [`FieldSchemaSpec`](super::FieldSchemaSpec).
//! `IndexOptions` is ordered: each variant indexes strictly more than the
//! previous one, and several invariants compare against that order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest number of point dimensions a field may declare.
pub const MAX_POINT_DIMENSIONS: u32 = 16;
/// Largest number of point dimensions that may be indexed.
pub const MAX_POINT_INDEX_DIMENSIONS: u32 = 8;
/// Largest encoded width of a single point dimension.
pub const MAX_POINT_NUM_BYTES: u32 = 16;
/// Largest vector dimension a field may declare.
pub const MAX_VECTOR_DIMENSIONS: u32 = 1024;

/// What the inverted index records for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexOptions {
    /// Not indexed
    #[default]
    None,
    Docs,
    DocsAndFreqs,
    DocsFreqsPositions,
    DocsFreqsPositionsOffsets,
}

impl IndexOptions {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexOptions::None => "NONE",
            IndexOptions::Docs => "DOCS",
            IndexOptions::DocsAndFreqs => "DOCS_AND_FREQS",
            IndexOptions::DocsFreqsPositions => "DOCS_FREQS_POSITIONS",
            IndexOptions::DocsFreqsPositionsOffsets => "DOCS_FREQS_POSITIONS_OFFSETS",
        }
    }

    pub fn is_indexed(&self) -> bool {
        *self != IndexOptions::None
    }

    pub fn has_positions(&self) -> bool {
        *self >= IndexOptions::DocsFreqsPositions
    }
}

/// Column-stride value storage kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocValuesType {
    #[default]
    None,
    Numeric,
    Binary,
    Sorted,
    SortedNumeric,
    SortedSet,
}

impl DocValuesType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocValuesType::None => "NONE",
            DocValuesType::Numeric => "NUMERIC",
            DocValuesType::Binary => "BINARY",
            DocValuesType::Sorted => "SORTED",
            DocValuesType::SortedNumeric => "SORTED_NUMERIC",
            DocValuesType::SortedSet => "SORTED_SET",
        }
    }

    pub fn is_none(&self) -> bool {
        *self == DocValuesType::None
    }

    /// Whether values of this type are integers.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DocValuesType::Numeric | DocValuesType::SortedNumeric)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VectorEncoding {
    Byte,
    #[default]
    Float32,
}

impl VectorEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorEncoding::Byte => "BYTE",
            VectorEncoding::Float32 => "FLOAT32",
        }
    }
}

/// Similarity function for vector fields. Always present, even on fields
/// with no vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VectorSimilarity {
    #[default]
    Euclidean,
    DotProduct,
    Cosine,
    MaximumInnerProduct,
}

impl VectorSimilarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorSimilarity::Euclidean => "EUCLIDEAN",
            VectorSimilarity::DotProduct => "DOT_PRODUCT",
            VectorSimilarity::Cosine => "COSINE",
            VectorSimilarity::MaximumInnerProduct => "MAXIMUM_INNER_PRODUCT",
        }
    }
}

macro_rules! display_as_str {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(IndexOptions, DocValuesType, VectorEncoding, VectorSimilarity);

/// Point (multi-dimensional numeric) shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct PointConfig {
    pub dimension_count: u32,
    pub index_dimension_count: u32,
    pub num_bytes: u32,
}

impl PointConfig {
    pub const fn new(dimension_count: u32, index_dimension_count: u32, num_bytes: u32) -> Self {
        Self {
            dimension_count,
            index_dimension_count,
            num_bytes,
        }
    }

    pub fn is_set(&self) -> bool {
        self.dimension_count != 0
    }
}

impl fmt::Display for PointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dimension count={}, index dimension count={}, num bytes={}",
            self.dimension_count, self.index_dimension_count, self.num_bytes
        )
    }
}

/// Vector shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct VectorConfig {
    pub dimension: u32,
    pub encoding: VectorEncoding,
    pub similarity: VectorSimilarity,
}

impl VectorConfig {
    pub const fn new(dimension: u32, encoding: VectorEncoding, similarity: VectorSimilarity) -> Self {
        Self {
            dimension,
            encoding,
            similarity,
        }
    }
}

impl fmt::Display for VectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vector dimension={}, vector encoding={}, vector similarity={}",
            self.dimension, self.encoding, self.similarity
        )
    }
}
