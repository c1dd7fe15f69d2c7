//! Schema violations
//!
//! A violation is either an internally inconsistent declaration
//! ([`SchemaViolation::Inconsistent`]) or two declarations of the same
//! field that disagree ([`SchemaViolation::Mismatch`]). Both always name
//! the field. They are caller bugs and are never retried.

use std::fmt;

use thiserror::Error;

/// Consistency rule a single declaration broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyRule {
    /// Term vectors, payloads or norms on a field that is not indexed
    UnindexedFlags,
    /// Payloads without positions
    PayloadsWithoutPositions,
    /// A doc-values generation on a field with no doc values
    DocValuesGenerationWithoutType,
    /// Point dimension counts and widths disagree or are out of range
    PointShape,
    /// Vector dimension out of range
    VectorShape,
    /// A field claims both the soft-deletes and the parent role
    ConflictingRoles,
    /// A reserved role claimed by the wrong field name
    ReservedRole,
}

impl ConsistencyRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyRule::UnindexedFlags => "unindexed-flags",
            ConsistencyRule::PayloadsWithoutPositions => "payloads-without-positions",
            ConsistencyRule::DocValuesGenerationWithoutType => "doc-values-generation-without-type",
            ConsistencyRule::PointShape => "point-shape",
            ConsistencyRule::VectorShape => "vector-shape",
            ConsistencyRule::ConflictingRoles => "conflicting-roles",
            ConsistencyRule::ReservedRole => "reserved-role",
        }
    }
}

impl fmt::Display for ConsistencyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Property compared when two declarations of one field meet.
///
/// The declaration order of the variants is the order in which
/// [`verify_same_schema`](super::verify_same_schema) checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaProperty {
    IndexOptions,
    OmitNorms,
    StoreTermVectors,
    DocValuesType,
    Points,
    Vectors,
    FieldRole,
}

impl SchemaProperty {
    /// Human-readable property name used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaProperty::IndexOptions => "index options",
            SchemaProperty::OmitNorms => "omit norms",
            SchemaProperty::StoreTermVectors => "store term vectors",
            SchemaProperty::DocValuesType => "doc values type",
            SchemaProperty::Points => "points options",
            SchemaProperty::Vectors => "vector options",
            SchemaProperty::FieldRole => "field role",
        }
    }
}

impl fmt::Display for SchemaProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("invalid schema for field \"{field}\" ({rule}): {detail}")]
    Inconsistent {
        field: String,
        rule: ConsistencyRule,
        detail: String,
    },

    #[error("cannot change field \"{field}\" from {property}=[{existing}] to inconsistent {property}=[{incoming}]")]
    Mismatch {
        field: String,
        property: SchemaProperty,
        existing: String,
        incoming: String,
    },
}

impl SchemaViolation {
    pub fn inconsistent(field: &str, rule: ConsistencyRule, detail: impl Into<String>) -> Self {
        SchemaViolation::Inconsistent {
            field: field.to_string(),
            rule,
            detail: detail.into(),
        }
    }

    pub fn mismatch(
        field: &str,
        property: SchemaProperty,
        existing: impl fmt::Display,
        incoming: impl fmt::Display,
    ) -> Self {
        SchemaViolation::Mismatch {
            field: field.to_string(),
            property,
            existing: existing.to_string(),
            incoming: incoming.to_string(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            SchemaViolation::Inconsistent { field, .. } => field,
            SchemaViolation::Mismatch { field, .. } => field,
        }
    }

    /// The diverging property, for mismatches.
    pub fn property(&self) -> Option<SchemaProperty> {
        match self {
            SchemaViolation::Mismatch { property, .. } => Some(*property),
            SchemaViolation::Inconsistent { .. } => None,
        }
    }

    /// The broken rule, for inconsistent declarations.
    pub fn rule(&self) -> Option<ConsistencyRule> {
        match self {
            SchemaViolation::Inconsistent { rule, .. } => Some(*rule),
            SchemaViolation::Mismatch { .. } => None,
        }
    }
}

pub type SchemaResult<T> = Result<T, SchemaViolation>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_names_both_values() {
        let v = SchemaViolation::mismatch("id", SchemaProperty::DocValuesType, "NONE", "NUMERIC");
        let msg = v.to_string();
        assert!(msg.contains("\"id\""));
        assert!(msg.contains("doc values type=[NONE]"));
        assert!(msg.contains("doc values type=[NUMERIC]"));
        assert_eq!(v.property(), Some(SchemaProperty::DocValuesType));
        assert_eq!(v.rule(), None);
    }

    #[test]
    fn test_inconsistent_carries_rule() {
        let v = SchemaViolation::inconsistent("body", ConsistencyRule::PayloadsWithoutPositions, "needs positions");
        assert_eq!(v.field(), "body");
        assert_eq!(v.rule(), Some(ConsistencyRule::PayloadsWithoutPositions));
        assert!(v.to_string().contains("payloads-without-positions"));
    }

    #[test]
    fn test_property_order_is_check_order() {
        assert!(SchemaProperty::IndexOptions < SchemaProperty::OmitNorms);
        assert!(SchemaProperty::StoreTermVectors < SchemaProperty::DocValuesType);
        assert!(SchemaProperty::DocValuesType < SchemaProperty::Points);
        assert!(SchemaProperty::Points < SchemaProperty::Vectors);
    }
}
