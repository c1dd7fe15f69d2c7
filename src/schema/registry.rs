//! Per-segment schema registry

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::field::{FieldSchema, FieldSchemaSpec};
use super::numbers::FieldNumbers;
use super::verify::verify_same_spec;
use crate::error::{IndexError, Result};

/// Ordered name→schema mapping for one segment, unique by name and by
/// number. Iteration follows field number.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldSchema>", into = "Vec<FieldSchema>")]
pub struct SchemaRegistry {
    fields: BTreeMap<u32, FieldSchema>,
    numbers: BTreeMap<String, u32>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.numbers.get(name).and_then(|n| self.fields.get(n))
    }

    pub fn by_number(&self, number: u32) -> Option<&FieldSchema> {
        self.fields.get(&number)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.values().map(FieldSchema::name)
    }

    /// Smallest number above every number in use.
    pub fn next_unused_number(&self) -> u32 {
        self.fields.keys().next_back().map_or(0, |n| n + 1)
    }

    /// Field whose attributes or doc-values generation are being updated.
    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut FieldSchema> {
        let number = *self.numbers.get(name)?;
        self.fields.get_mut(&number)
    }

    /// Forget doc-values update generations, for a registry whose
    /// updates have been folded into rewritten documents.
    pub(crate) fn reset_doc_values_gens(&mut self) {
        for field in self.fields.values_mut() {
            field.reset_doc_values_gen();
        }
    }

    /// Add a field. Reusing a name or a number is an internal bug.
    pub fn insert(&mut self, field: FieldSchema) -> Result<()> {
        if let Some(existing) = self.numbers.get(field.name()) {
            return Err(IndexError::internal(format!(
                "field \"{}\" is already registered with number {}, cannot assign number {}",
                field.name(),
                existing,
                field.number()
            )));
        }
        if let Some(other) = self.fields.get(&field.number()) {
            return Err(IndexError::internal(format!(
                "field number {} is already assigned to \"{}\", cannot reuse it for \"{}\"",
                field.number(),
                other.name(),
                field.name()
            )));
        }
        self.numbers.insert(field.name().to_string(), field.number());
        self.fields.insert(field.number(), field);
        Ok(())
    }

    /// Declare `name` with `spec` while writing a segment.
    ///
    /// A known name must agree with its earlier declaration. A new name
    /// takes its number from the index-wide `numbers` map.
    pub fn declare(&mut self, name: &str, spec: &FieldSchemaSpec, numbers: &mut FieldNumbers) -> Result<u32> {
        if let Some(existing) = self.get_mut(name) {
            verify_same_spec(name, existing.spec(), spec)?;
            if spec.store_payloads && !existing.store_payloads() {
                existing.set_store_payloads()?;
            }
            return Ok(existing.number());
        }

        let number = numbers.add_or_get(name, spec, None)?;
        self.insert(FieldSchema::create(name, number, spec)?)?;
        Ok(number)
    }
}

impl TryFrom<Vec<FieldSchema>> for SchemaRegistry {
    type Error = IndexError;

    fn try_from(fields: Vec<FieldSchema>) -> Result<Self> {
        let mut registry = SchemaRegistry::new();
        for field in fields {
            field.check_consistency()?;
            registry.insert(field)?;
        }
        Ok(registry)
    }
}

impl From<SchemaRegistry> for Vec<FieldSchema> {
    fn from(registry: SchemaRegistry) -> Self {
        registry.fields.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DocValuesType, SchemaProperty};

    #[test]
    fn test_declare_assigns_next_unused_numbers() {
        let mut numbers = FieldNumbers::new(None);
        let mut reg = SchemaRegistry::new();
        assert_eq!(reg.declare("id", &FieldSchemaSpec::keyword(), &mut numbers).unwrap(), 0);
        assert_eq!(reg.declare("body", &FieldSchemaSpec::text(), &mut numbers).unwrap(), 1);
        assert_eq!(reg.declare("id", &FieldSchemaSpec::keyword(), &mut numbers).unwrap(), 0);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.next_unused_number(), 2);
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["id", "body"]);
    }

    #[test]
    fn test_declare_conflicting_spec_is_violation() {
        let mut numbers = FieldNumbers::new(None);
        let mut reg = SchemaRegistry::new();
        reg.declare("id", &FieldSchemaSpec::keyword(), &mut numbers).unwrap();
        let err = reg
            .declare(
                "id",
                &FieldSchemaSpec::keyword().with_doc_values(DocValuesType::Numeric),
                &mut numbers,
            )
            .unwrap_err();
        match err {
            IndexError::SchemaViolation(v) => assert_eq!(v.property(), Some(SchemaProperty::DocValuesType)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_insert_rejects_duplicate_name_or_number() {
        let mut reg = SchemaRegistry::new();
        reg.insert(FieldSchema::create("a", 0, &FieldSchemaSpec::keyword()).unwrap()).unwrap();

        let dup_name = reg.insert(FieldSchema::create("a", 1, &FieldSchemaSpec::keyword()).unwrap());
        assert!(matches!(dup_name, Err(IndexError::InternalConsistency(_))));

        let dup_number = reg.insert(FieldSchema::create("b", 0, &FieldSchemaSpec::keyword()).unwrap());
        assert!(matches!(dup_number, Err(IndexError::InternalConsistency(_))));
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let mut numbers = FieldNumbers::new(None);
        let mut reg = SchemaRegistry::new();
        reg.declare("id", &FieldSchemaSpec::keyword(), &mut numbers).unwrap();
        reg.declare("dv", &FieldSchemaSpec::doc_values(DocValuesType::Binary), &mut numbers).unwrap();

        let json = serde_json::to_string(&reg).unwrap();
        let back: SchemaRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reg);

        let tampered = json.replacen("\"number\":1", "\"number\":0", 1);
        assert!(serde_json::from_str::<SchemaRegistry>(&tampered).is_err());
    }
}
