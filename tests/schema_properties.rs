//! Schema Property Tests
//!
//! Generated checks for:
//! - Point shape: all three counts are zero or all are in range
//! - Schema comparison is reflexive and symmetric
//! - A field registry never accepts a conflicting redeclaration

use proptest::prelude::*;

use strata::schema::{
    first_mismatch, verify_same_spec, DocValuesType, FieldNumbers, FieldSchema, FieldSchemaSpec, IndexOptions,
    PointConfig, SchemaProperty, MAX_POINT_DIMENSIONS, MAX_POINT_INDEX_DIMENSIONS, MAX_POINT_NUM_BYTES,
};
use strata::IndexError;

// =============================================================================
// Strategies
// =============================================================================

fn index_options() -> impl Strategy<Value = IndexOptions> {
    prop_oneof![
        Just(IndexOptions::None),
        Just(IndexOptions::Docs),
        Just(IndexOptions::DocsAndFreqs),
        Just(IndexOptions::DocsFreqsPositions),
        Just(IndexOptions::DocsFreqsPositionsOffsets),
    ]
}

fn doc_values_type() -> impl Strategy<Value = DocValuesType> {
    prop_oneof![
        Just(DocValuesType::None),
        Just(DocValuesType::Numeric),
        Just(DocValuesType::Binary),
        Just(DocValuesType::Sorted),
        Just(DocValuesType::SortedNumeric),
        Just(DocValuesType::SortedSet),
    ]
}

fn points() -> impl Strategy<Value = PointConfig> {
    prop_oneof![
        Just(PointConfig::default()),
        (1u32..=4, 1u32..=8).prop_map(|(dims, bytes)| PointConfig::new(dims, dims, bytes)),
    ]
}

/// Declarations that are consistent on their own.
fn spec() -> impl Strategy<Value = FieldSchemaSpec> {
    (index_options(), doc_values_type(), any::<bool>(), any::<bool>(), points()).prop_map(
        |(index_options, doc_values_type, flag_a, flag_b, points)| {
            let indexed = index_options != IndexOptions::None;
            FieldSchemaSpec {
                index_options,
                doc_values_type,
                store_term_vectors: indexed && flag_a,
                omit_norms: indexed && flag_b,
                points,
                ..FieldSchemaSpec::default()
            }
        },
    )
}

fn point_shape_is_valid(dims: u32, index_dims: u32, bytes: u32) -> bool {
    let unset = dims == 0 && index_dims == 0 && bytes == 0;
    let set = (1..=MAX_POINT_DIMENSIONS).contains(&dims)
        && (1..=MAX_POINT_INDEX_DIMENSIONS.min(dims)).contains(&index_dims)
        && (1..=MAX_POINT_NUM_BYTES).contains(&bytes);
    unset || set
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// A point shape is accepted exactly when every count is zero or every
    /// count is in range.
    #[test]
    fn test_point_shape_biconditional(
        dims in 0u32..=MAX_POINT_DIMENSIONS + 2,
        index_dims in 0u32..=MAX_POINT_INDEX_DIMENSIONS + 2,
        bytes in 0u32..=MAX_POINT_NUM_BYTES + 2,
    ) {
        let spec = FieldSchemaSpec {
            points: PointConfig::new(dims, index_dims, bytes),
            ..FieldSchemaSpec::default()
        };
        let created = FieldSchema::create("p", 0, &spec);
        prop_assert_eq!(created.is_ok(), point_shape_is_valid(dims, index_dims, bytes));
    }

    #[test]
    fn test_verify_reflexive(a in spec()) {
        prop_assert!(verify_same_spec("f", &a, &a).is_ok());
    }

    /// Comparing in either order finds the same property.
    #[test]
    fn test_verify_symmetric(a in spec(), b in spec()) {
        let forward = first_mismatch(&a, &b).map(|(p, _, _)| p);
        let backward = first_mismatch(&b, &a).map(|(p, _, _)| p);
        prop_assert_eq!(forward, backward);
        prop_assert_eq!(verify_same_spec("f", &a, &b).is_ok(), verify_same_spec("f", &b, &a).is_ok());
    }

    /// Once a name is bound, only an identical declaration is accepted and
    /// the registry is unchanged by a rejected one.
    #[test]
    fn test_numbers_reject_conflicts(a in spec(), b in spec()) {
        let mut numbers = FieldNumbers::new(None);
        let first = numbers.add_or_get("f", &a, None).unwrap();

        match numbers.add_or_get("f", &b, None) {
            Ok(number) => {
                prop_assert_eq!(number, first);
                prop_assert!(first_mismatch(&a, &b).is_none());
            }
            Err(IndexError::SchemaViolation(v)) => {
                prop_assert_eq!(v.field(), "f");
                prop_assert_eq!(v.property(), first_mismatch(&a, &b).map(|(p, _, _)| p));
                prop_assert_eq!(numbers.spec_of("f"), Some(&a));
            }
            Err(other) => prop_assert!(false, "unexpected {:?}", other),
        }
        prop_assert_eq!(numbers.len(), 1);
    }
}

// =============================================================================
// Fixed Ordering
// =============================================================================

/// Doc values type is checked before points, so a field differing in both
/// reports doc values type.
#[test]
fn test_doc_values_checked_before_points() {
    let a = FieldSchemaSpec::keyword();
    let b = FieldSchemaSpec {
        doc_values_type: DocValuesType::Numeric,
        points: PointConfig::new(1, 1, 4),
        ..FieldSchemaSpec::keyword()
    };
    let err = verify_same_spec("id", &a, &b).unwrap_err();
    assert_eq!(err.property(), Some(SchemaProperty::DocValuesType));
    assert!(err.to_string().contains("doc values type"), "{err}");
}
