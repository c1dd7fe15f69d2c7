//! Index sort: the order documents take inside every segment

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::document::FieldValue;
use super::segment::StoredFields;
use crate::error::{IndexError, Result};
use crate::schema::SchemaRegistry;

/// Sort on a numeric doc-values field. Documents without a value sort
/// last in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSort {
    pub field: String,
    #[serde(default)]
    pub reverse: bool,
}

impl IndexSort {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reverse: false,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Reorder `docs`, numbered through `registry`. Stable, so documents
    /// with equal keys keep their relative order.
    pub fn sort_docs(&self, registry: &SchemaRegistry, docs: &mut [StoredFields]) -> Result<()> {
        let Some(schema) = registry.get(&self.field) else {
            return Ok(());
        };
        if !schema.doc_values_type().is_numeric() {
            return Err(IndexError::invalid_argument(format!(
                "index sort field \"{}\" has doc values type {}, expected a numeric type",
                self.field,
                schema.doc_values_type()
            )));
        }
        let number = schema.number();
        let key = |doc: &StoredFields| {
            doc.iter()
                .find(|(n, _)| *n == number)
                .and_then(|(_, v)| v.as_numeric())
        };
        docs.sort_by(|a, b| match (key(a), key(b)) {
            (Some(x), Some(y)) if self.reverse => y.cmp(&x),
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        Ok(())
    }

    /// Whether `docs` already follow this sort.
    pub fn is_sorted(&self, registry: &SchemaRegistry, docs: &[StoredFields]) -> bool {
        let mut sorted = docs.to_vec();
        self.sort_docs(registry, &mut sorted).is_ok() && sorted == docs
    }
}

impl fmt::Display for IndexSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<long: \"{}\">", self.field)?;
        if self.reverse {
            f.write_str("!")?;
        }
        Ok(())
    }
}

/// Render an optional sort the way refusal messages show it.
pub fn describe_sort(sort: Option<&IndexSort>) -> String {
    sort.map_or_else(|| "<none>".to_string(), IndexSort::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DocValuesType, FieldNumbers, FieldSchemaSpec};

    fn registry() -> (SchemaRegistry, u32, u32) {
        let mut numbers = FieldNumbers::new(None);
        let mut registry = SchemaRegistry::new();
        let id = registry.declare("id", &FieldSchemaSpec::keyword(), &mut numbers).unwrap();
        let rank = registry
            .declare("rank", &FieldSchemaSpec::doc_values(DocValuesType::Numeric), &mut numbers)
            .unwrap();
        (registry, id, rank)
    }

    fn ids(docs: &[StoredFields], id: u32) -> Vec<String> {
        docs.iter()
            .filter_map(|d| d.iter().find(|(n, _)| *n == id))
            .filter_map(|(_, v)| v.as_str().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_sort_ascending_missing_last() {
        let (registry, id, rank) = registry();
        let mut docs = vec![
            vec![(id, FieldValue::Keyword("a".into())), (rank, FieldValue::Numeric(3))],
            vec![(id, FieldValue::Keyword("b".into()))],
            vec![(id, FieldValue::Keyword("c".into())), (rank, FieldValue::Numeric(-1))],
            vec![(id, FieldValue::Keyword("d".into())), (rank, FieldValue::Numeric(3))],
        ];
        let sort = IndexSort::new("rank");
        assert!(!sort.is_sorted(&registry, &docs));
        sort.sort_docs(&registry, &mut docs).unwrap();
        assert_eq!(ids(&docs, id), vec!["c", "a", "d", "b"]);
        assert!(sort.is_sorted(&registry, &docs));

        IndexSort::new("rank").reversed().sort_docs(&registry, &mut docs).unwrap();
        assert_eq!(ids(&docs, id), vec!["a", "d", "c", "b"]);
    }

    #[test]
    fn test_sort_field_must_be_numeric() {
        let (registry, id, _) = registry();
        let mut docs = vec![vec![(id, FieldValue::Keyword("a".into()))]];
        let err = IndexSort::new("id").sort_docs(&registry, &mut docs).unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(_)));
        // A field no document declares leaves the order alone.
        assert!(IndexSort::new("absent").sort_docs(&registry, &mut docs).is_ok());
    }

    #[test]
    fn test_display() {
        assert_eq!(IndexSort::new("dv").to_string(), "<long: \"dv\">");
        assert_eq!(describe_sort(Some(&IndexSort::new("dv").reversed())), "<long: \"dv\">!");
        assert_eq!(describe_sort(None), "<none>");
    }
}
