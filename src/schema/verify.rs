//! Cross-declaration schema verification
//!
//! Two declarations of the same field are compared through an ordered list
//! of named predicates. The first predicate that fails determines the
//! reported [`SchemaProperty`], so callers can predict which violation is
//! raised when several properties differ at once.

use super::errors::{SchemaProperty, SchemaResult, SchemaViolation};
use super::field::{FieldSchema, FieldSchemaSpec};

type Predicate = fn(&FieldSchemaSpec, &FieldSchemaSpec) -> Option<(String, String)>;

const CHECKS: &[(SchemaProperty, Predicate)] = &[
    (SchemaProperty::IndexOptions, index_options),
    (SchemaProperty::OmitNorms, omit_norms),
    (SchemaProperty::StoreTermVectors, store_term_vectors),
    (SchemaProperty::DocValuesType, doc_values_type),
    (SchemaProperty::Points, points),
    (SchemaProperty::Vectors, vectors),
    (SchemaProperty::FieldRole, field_role),
];

/// Verify that two schemas for the same field agree.
pub fn verify_same_schema(existing: &FieldSchema, incoming: &FieldSchema) -> SchemaResult<()> {
    verify_same_spec(existing.name(), existing.spec(), incoming.spec())
}

/// Verify an incoming declaration against an existing one for `field`.
pub fn verify_same_spec(field: &str, existing: &FieldSchemaSpec, incoming: &FieldSchemaSpec) -> SchemaResult<()> {
    match first_mismatch(existing, incoming) {
        None => Ok(()),
        Some((property, a, b)) => Err(SchemaViolation::mismatch(field, property, a, b)),
    }
}

/// The first diverging property and both rendered values, if any.
pub fn first_mismatch(a: &FieldSchemaSpec, b: &FieldSchemaSpec) -> Option<(SchemaProperty, String, String)> {
    CHECKS
        .iter()
        .find_map(|(property, check)| check(a, b).map(|(x, y)| (*property, x, y)))
}

fn differ<T: PartialEq + ToString>(a: T, b: T) -> Option<(String, String)> {
    (a != b).then(|| (a.to_string(), b.to_string()))
}

fn index_options(a: &FieldSchemaSpec, b: &FieldSchemaSpec) -> Option<(String, String)> {
    differ(a.index_options, b.index_options)
}

// Norms and term vectors only mean something on indexed fields. By the
// time these run the index options are known to be equal.
fn omit_norms(a: &FieldSchemaSpec, b: &FieldSchemaSpec) -> Option<(String, String)> {
    if !a.index_options.is_indexed() {
        return None;
    }
    differ(a.omit_norms, b.omit_norms)
}

fn store_term_vectors(a: &FieldSchemaSpec, b: &FieldSchemaSpec) -> Option<(String, String)> {
    if !a.index_options.is_indexed() {
        return None;
    }
    differ(a.store_term_vectors, b.store_term_vectors)
}

fn doc_values_type(a: &FieldSchemaSpec, b: &FieldSchemaSpec) -> Option<(String, String)> {
    differ(a.doc_values_type, b.doc_values_type)
}

fn points(a: &FieldSchemaSpec, b: &FieldSchemaSpec) -> Option<(String, String)> {
    differ(a.points, b.points)
}

fn vectors(a: &FieldSchemaSpec, b: &FieldSchemaSpec) -> Option<(String, String)> {
    differ(a.vectors, b.vectors)
}

fn field_role(a: &FieldSchemaSpec, b: &FieldSchemaSpec) -> Option<(String, String)> {
    let role = |s: &FieldSchemaSpec| match (s.is_soft_deletes_field, s.is_parent_field) {
        (true, _) => "soft-deletes",
        (false, true) => "parent",
        (false, false) => "regular",
    };
    differ(role(a), role(b))
}
