//! Index-wide field numbering
//!
//! Every segment written by one index agrees on the name→number mapping
//! and on the declared schema of each name. Reserved field roles
//! (soft-deletes, parent) are bound to a single name per index.

use std::collections::BTreeMap;

use super::errors::{ConsistencyRule, SchemaViolation};
use super::field::FieldSchemaSpec;
use super::registry::SchemaRegistry;
use super::verify::verify_same_spec;
use crate::error::{IndexError, Result};

#[derive(Debug, Clone, Default)]
pub struct FieldNumbers {
    by_name: BTreeMap<String, (u32, FieldSchemaSpec)>,
    by_number: BTreeMap<u32, String>,
    soft_deletes_field: Option<String>,
    parent_field: Option<String>,
    lowest_unassigned: u32,
}

impl FieldNumbers {
    pub fn new(soft_deletes_field: Option<String>) -> Self {
        Self {
            soft_deletes_field,
            ..Self::default()
        }
    }

    /// Numbering seeded from every registry of an existing index.
    pub fn from_registries<'a>(
        soft_deletes_field: Option<String>,
        registries: impl IntoIterator<Item = &'a SchemaRegistry>,
    ) -> Result<Self> {
        let mut numbers = Self::new(soft_deletes_field);
        for registry in registries {
            numbers.absorb(registry)?;
        }
        Ok(numbers)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn number_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).map(|(n, _)| *n)
    }

    pub fn spec_of(&self, name: &str) -> Option<&FieldSchemaSpec> {
        self.by_name.get(name).map(|(_, s)| s)
    }

    pub fn soft_deletes_field(&self) -> Option<&str> {
        self.soft_deletes_field.as_deref()
    }

    /// Check a declaration against the index without recording it.
    pub fn check(&self, name: &str, spec: &FieldSchemaSpec) -> Result<()> {
        if let Some((_, existing)) = self.by_name.get(name) {
            verify_same_spec(name, existing, spec)?;
        }

        match (&self.soft_deletes_field, spec.is_soft_deletes_field) {
            (Some(reserved), true) if reserved != name => {
                return Err(reserved_role(
                    name,
                    format!("cannot use [{name}] as soft-deletes field, this index uses [{reserved}]"),
                ))
            }
            (None, true) => {
                return Err(reserved_role(
                    name,
                    format!("cannot use [{name}] as soft-deletes field, this index has none configured"),
                ))
            }
            (Some(reserved), false) if reserved == name => {
                return Err(reserved_role(
                    name,
                    format!("field [{name}] is reserved as the soft-deletes field"),
                ))
            }
            _ => {}
        }

        match (&self.parent_field, spec.is_parent_field) {
            (Some(parent), true) if parent != name => Err(reserved_role(
                name,
                format!("cannot use [{name}] as parent field, this index uses [{parent}]"),
            )),
            (Some(parent), false) if parent == name => Err(reserved_role(
                name,
                format!("field [{name}] is reserved as the parent field"),
            )),
            _ => Ok(()),
        }
    }

    /// Number for `name`, assigning one if the name is new. `preferred` is
    /// used when it is still free.
    pub fn add_or_get(&mut self, name: &str, spec: &FieldSchemaSpec, preferred: Option<u32>) -> Result<u32> {
        self.check(name, spec)?;
        if let Some(n) = self.number_of(name) {
            return Ok(n);
        }

        let number = match preferred {
            Some(p) if !self.by_number.contains_key(&p) => p,
            _ => {
                while self.by_number.contains_key(&self.lowest_unassigned) {
                    self.lowest_unassigned += 1;
                }
                self.lowest_unassigned
            }
        };
        self.bind(name, number, spec)?;
        Ok(number)
    }

    /// Record every field of `registry`, which must agree with what is
    /// already known.
    pub fn absorb(&mut self, registry: &SchemaRegistry) -> Result<()> {
        for field in registry.iter() {
            self.check(field.name(), field.spec())?;
            self.bind(field.name(), field.number(), field.spec())?;
        }
        Ok(())
    }

    fn bind(&mut self, name: &str, number: u32, spec: &FieldSchemaSpec) -> Result<()> {
        if let Some((existing, _)) = self.by_name.get(name) {
            if *existing != number {
                return Err(IndexError::internal(format!(
                    "field \"{name}\" already has number {existing}, cannot assign number {number}"
                )));
            }
            return Ok(());
        }
        if let Some(other) = self.by_number.get(&number) {
            return Err(IndexError::internal(format!(
                "field number {number} is already bound to \"{other}\", cannot reuse it for \"{name}\""
            )));
        }

        if spec.is_parent_field {
            self.parent_field = Some(name.to_string());
        }
        self.by_name.insert(name.to_string(), (number, spec.clone()));
        self.by_number.insert(number, name.to_string());
        Ok(())
    }
}

fn reserved_role(name: &str, detail: String) -> IndexError {
    SchemaViolation::inconsistent(name, ConsistencyRule::ReservedRole, detail).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DocValuesType, FieldSchema};

    #[test]
    fn test_numbers_are_stable_per_name() {
        let mut numbers = FieldNumbers::new(None);
        assert_eq!(numbers.add_or_get("a", &FieldSchemaSpec::keyword(), None).unwrap(), 0);
        assert_eq!(numbers.add_or_get("b", &FieldSchemaSpec::keyword(), None).unwrap(), 1);
        assert_eq!(numbers.add_or_get("a", &FieldSchemaSpec::keyword(), Some(7)).unwrap(), 0);
        assert_eq!(numbers.add_or_get("c", &FieldSchemaSpec::keyword(), Some(7)).unwrap(), 7);
        assert_eq!(numbers.add_or_get("d", &FieldSchemaSpec::keyword(), Some(7)).unwrap(), 2);
    }

    #[test]
    fn test_absorb_detects_number_conflicts() {
        let mut first = SchemaRegistry::new();
        first.insert(FieldSchema::create("a", 0, &FieldSchemaSpec::keyword()).unwrap()).unwrap();
        let mut second = SchemaRegistry::new();
        second.insert(FieldSchema::create("b", 0, &FieldSchemaSpec::keyword()).unwrap()).unwrap();

        let err = FieldNumbers::from_registries(None, [&first, &second]).unwrap_err();
        assert!(matches!(err, IndexError::InternalConsistency(_)));
    }

    #[test]
    fn test_absorb_detects_schema_conflicts() {
        let mut first = SchemaRegistry::new();
        first.insert(FieldSchema::create("id", 0, &FieldSchemaSpec::keyword()).unwrap()).unwrap();
        let mut second = SchemaRegistry::new();
        second
            .insert(
                FieldSchema::create("id", 0, &FieldSchemaSpec::keyword().with_doc_values(DocValuesType::Numeric))
                    .unwrap(),
            )
            .unwrap();

        let err = FieldNumbers::from_registries(None, [&first, &second]).unwrap_err();
        assert!(matches!(err, IndexError::SchemaViolation(_)));
    }

    #[test]
    fn test_soft_deletes_role_is_reserved() {
        let mut numbers = FieldNumbers::new(Some("__soft".to_string()));
        numbers.add_or_get("__soft", &FieldSchemaSpec::soft_deletes(), None).unwrap();

        let wrong_name = numbers.add_or_get("other", &FieldSchemaSpec::soft_deletes(), None);
        assert!(matches!(wrong_name, Err(IndexError::SchemaViolation(_))));

        let mut fresh = FieldNumbers::new(Some("__soft".to_string()));
        let plain = fresh.add_or_get("__soft", &FieldSchemaSpec::doc_values(DocValuesType::Numeric), None);
        assert!(matches!(plain, Err(IndexError::SchemaViolation(_))));

        let mut unconfigured = FieldNumbers::new(None);
        assert!(unconfigured.add_or_get("__soft", &FieldSchemaSpec::soft_deletes(), None).is_err());
    }

    #[test]
    fn test_parent_role_bound_to_first_name() {
        let parent = FieldSchemaSpec {
            is_parent_field: true,
            ..FieldSchemaSpec::doc_values(DocValuesType::Numeric)
        };
        let mut numbers = FieldNumbers::new(None);
        numbers.add_or_get("_parent", &parent, None).unwrap();
        assert!(numbers.add_or_get("_other_parent", &parent, None).is_err());
    }
}
