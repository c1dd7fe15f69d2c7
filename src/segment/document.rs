//! Documents and field values

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::schema::{DocValuesType, FieldSchemaSpec, VectorConfig, VectorEncoding, VectorSimilarity};

/// A single value of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Keyword(String),
    Numeric(i64),
    Binary(Vec<u8>),
    Point(Vec<Vec<u8>>),
    Vector(Vec<f32>),
}

impl FieldValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Keyword(_) => "keyword",
            FieldValue::Numeric(_) => "numeric",
            FieldValue::Binary(_) => "binary",
            FieldValue::Point(_) => "point",
            FieldValue::Vector(_) => "vector",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) | FieldValue::Keyword(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            FieldValue::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Binary(b) => Some(b),
            FieldValue::Keyword(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Terms this value contributes to the inverted index.
    pub fn terms(&self) -> Vec<String> {
        match self {
            FieldValue::Keyword(s) => vec![s.clone()],
            FieldValue::Text(s) => s.split_whitespace().map(str::to_lowercase).collect(),
            FieldValue::Numeric(n) => vec![n.to_string()],
            _ => Vec::new(),
        }
    }
}

/// A field of a document being added: name, declared schema and value.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub spec: FieldSchemaSpec,
    pub value: FieldValue,
}

impl Field {
    pub fn new(name: impl Into<String>, spec: FieldSchemaSpec, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            spec,
            value,
        }
    }

    /// Check that the value fits the declared schema.
    pub fn validate(&self) -> Result<()> {
        let spec = &self.spec;
        let reject = |detail: String| {
            Err(IndexError::invalid_argument(format!(
                "field \"{}\" ({} value): {}",
                self.name,
                self.value.kind(),
                detail
            )))
        };

        if spec.points.is_set() {
            let FieldValue::Point(dims) = &self.value else {
                return reject("field declares points but value is not a point".to_string());
            };
            if dims.len() != spec.points.dimension_count as usize {
                return reject(format!(
                    "expected {} point dimensions, got {}",
                    spec.points.dimension_count,
                    dims.len()
                ));
            }
            if let Some(bad) = dims.iter().find(|d| d.len() != spec.points.num_bytes as usize) {
                return reject(format!(
                    "expected {} bytes per dimension, got {}",
                    spec.points.num_bytes,
                    bad.len()
                ));
            }
            return Ok(());
        }

        if spec.vectors.dimension > 0 {
            let FieldValue::Vector(v) = &self.value else {
                return reject("field declares vectors but value is not a vector".to_string());
            };
            if v.len() != spec.vectors.dimension as usize {
                return reject(format!("expected vector dimension {}, got {}", spec.vectors.dimension, v.len()));
            }
            if v.iter().any(|x| !x.is_finite()) {
                return reject("vector value must be finite".to_string());
            }
            if spec.vectors.encoding == VectorEncoding::Byte {
                if let Some(bad) = v.iter().find(|x| x.fract() != 0.0 || **x < i8::MIN as f32 || **x > i8::MAX as f32) {
                    return reject(format!("byte vector value {bad} is not in [-128, 127]"));
                }
            }
            return Ok(());
        }

        match (&self.value, spec.doc_values_type) {
            (FieldValue::Point(_), _) => reject("point value on a field without points".to_string()),
            (FieldValue::Vector(_), _) => reject("vector value on a field without vectors".to_string()),
            (FieldValue::Numeric(_), dv) if dv.is_none() || dv.is_numeric() => Ok(()),
            (FieldValue::Binary(_) | FieldValue::Keyword(_), DocValuesType::Binary)
            | (FieldValue::Binary(_) | FieldValue::Keyword(_), DocValuesType::Sorted)
            | (FieldValue::Binary(_) | FieldValue::Keyword(_), DocValuesType::SortedSet) => Ok(()),
            (_, DocValuesType::None) => Ok(()),
            (_, dv) => reject(format!("value does not fit doc values type {dv}")),
        }
    }
}

/// A document to be added to an index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn add(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn add_keyword(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.add(Field::new(name, FieldSchemaSpec::keyword(), FieldValue::Keyword(value.into())))
    }

    pub fn add_text(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.add(Field::new(name, FieldSchemaSpec::text(), FieldValue::Text(value.into())))
    }

    pub fn add_stored(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.add(Field::new(name, FieldSchemaSpec::stored(), FieldValue::Keyword(value.into())))
    }

    pub fn add_numeric_doc_value(&mut self, name: &str, value: i64) -> &mut Self {
        self.add(Field::new(
            name,
            FieldSchemaSpec::doc_values(DocValuesType::Numeric),
            FieldValue::Numeric(value),
        ))
    }

    pub fn add_binary_doc_value(&mut self, name: &str, value: Vec<u8>) -> &mut Self {
        self.add(Field::new(
            name,
            FieldSchemaSpec::doc_values(DocValuesType::Binary),
            FieldValue::Binary(value),
        ))
    }

    pub fn add_sorted_doc_value(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.add(Field::new(
            name,
            FieldSchemaSpec::doc_values(DocValuesType::Sorted),
            FieldValue::Keyword(value.into()),
        ))
    }

    pub fn add_sorted_set_doc_value(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.add(Field::new(
            name,
            FieldSchemaSpec::doc_values(DocValuesType::SortedSet),
            FieldValue::Keyword(value.into()),
        ))
    }

    pub fn add_sorted_numeric_doc_value(&mut self, name: &str, value: i64) -> &mut Self {
        self.add(Field::new(
            name,
            FieldSchemaSpec::doc_values(DocValuesType::SortedNumeric),
            FieldValue::Numeric(value),
        ))
    }

    /// One-dimensional 4-byte point, sortable big-endian encoded.
    pub fn add_int_point(&mut self, name: &str, value: i32) -> &mut Self {
        self.add_int_points(name, &[value])
    }

    /// Multi-dimensional 4-byte point, one dimension per value.
    pub fn add_int_points(&mut self, name: &str, values: &[i32]) -> &mut Self {
        self.add(Field::new(
            name,
            FieldSchemaSpec::point(values.len() as u32, 4),
            FieldValue::Point(values.iter().map(|v| encode_int_point(*v).to_vec()).collect()),
        ))
    }

    pub fn add_float_vector(&mut self, name: &str, vector: Vec<f32>, similarity: VectorSimilarity) -> &mut Self {
        let config = VectorConfig::new(vector.len() as u32, VectorEncoding::Float32, similarity);
        self.add(Field::new(name, FieldSchemaSpec::vector(config), FieldValue::Vector(vector)))
    }

    pub fn add_byte_vector(&mut self, name: &str, vector: &[i8], similarity: VectorSimilarity) -> &mut Self {
        let config = VectorConfig::new(vector.len() as u32, VectorEncoding::Byte, similarity);
        let values = vector.iter().map(|b| f32::from(*b)).collect();
        self.add(Field::new(name, FieldSchemaSpec::vector(config), FieldValue::Vector(values)))
    }
}

/// Flip the sign bit so byte order matches numeric order.
pub fn encode_int_point(value: i32) -> [u8; 4] {
    ((value as u32) ^ 0x8000_0000).to_be_bytes()
}

pub fn decode_int_point(bytes: &[u8]) -> Option<i32> {
    let arr: [u8; 4] = bytes.try_into().ok()?;
    Some((u32::from_be_bytes(arr) ^ 0x8000_0000) as i32)
}

/// Stored fields of a document read back from an index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredDocument {
    fields: Vec<(String, FieldValue)>,
}

impl StoredDocument {
    pub(crate) fn new(fields: Vec<(String, FieldValue)>) -> Self {
        Self { fields }
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields.iter().filter(move |(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }
}
