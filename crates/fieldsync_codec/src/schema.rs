//! Per-entity-type field schemas.

use std::collections::HashMap;

/// How a declared field is represented locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldKind {
    /// Not temporal; passes through the codec untouched.
    #[default]
    Plain,
    /// Temporal instant stored locally as an epoch-millisecond integer.
    TimestampMillis,
    /// Temporal instant stored locally as a rich date-time value.
    DateTime,
}

impl FieldKind {
    /// Whether this kind carries a temporal instant.
    pub fn is_temporal(self) -> bool {
        !matches!(self, FieldKind::Plain)
    }
}

/// Declared field kinds for one entity type.
///
/// Synchronized entity types declare their temporal fields explicitly;
/// any field not declared is treated as [`FieldKind::Plain`]. Lookup is
/// case-insensitive, but the codec always preserves the original key
/// casing on the wire.
#[derive(Debug, Clone, Default)]
pub struct EntitySchema {
    kinds: HashMap<String, FieldKind>,
}

impl EntitySchema {
    /// Create an empty schema (every field plain).
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field's kind. Redeclaring a field overrides the earlier
    /// declaration.
    pub fn with_field(mut self, name: &str, kind: FieldKind) -> Self {
        self.kinds.insert(name.to_lowercase(), kind);
        self
    }

    /// Look up a field's declared kind, case-insensitively.
    pub fn kind_of(&self, name: &str) -> FieldKind {
        self.kinds
            .get(&name.to_lowercase())
            .copied()
            .unwrap_or_default()
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether any fields are declared.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undeclared_fields_are_plain() {
        let schema = EntitySchema::new();
        assert_eq!(schema.kind_of("anything"), FieldKind::Plain);
        assert!(schema.is_empty());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let schema = EntitySchema::new().with_field("createdAt", FieldKind::TimestampMillis);
        assert_eq!(schema.kind_of("createdat"), FieldKind::TimestampMillis);
        assert_eq!(schema.kind_of("CREATEDAT"), FieldKind::TimestampMillis);
        assert_eq!(schema.kind_of("CreatedAt"), FieldKind::TimestampMillis);
    }

    #[test]
    fn redeclaration_overrides() {
        let schema = EntitySchema::new()
            .with_field("updated", FieldKind::DateTime)
            .with_field("Updated", FieldKind::TimestampMillis);
        assert_eq!(schema.len(), 1);
        assert_eq!(schema.kind_of("updated"), FieldKind::TimestampMillis);
    }

    #[test]
    fn kind_temporality() {
        assert!(FieldKind::TimestampMillis.is_temporal());
        assert!(FieldKind::DateTime.is_temporal());
        assert!(!FieldKind::Plain.is_temporal());
    }
}
