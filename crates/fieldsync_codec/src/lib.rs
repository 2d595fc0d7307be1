//! # Fieldsync Codec
//!
//! Field-level encoding between the local relational representation of an
//! entity and its remote document form.
//!
//! This crate provides schema-driven conversion that ensures:
//! - Epoch-millisecond integers declared temporal travel as native wire
//!   timestamps (`seconds` + `nanos`)
//! - Wire timestamps come back as epoch-millisecond integers or rich
//!   date-times, per the declared field kind
//! - Field-name matching is case-insensitive while wire key casing is
//!   preserved
//! - Malformed temporal text passes through opaque instead of failing
//!
//! ## Usage
//!
//! ```
//! use fieldsync_codec::{EntityCodec, EntitySchema, FieldKind, FieldMap, FieldValue};
//!
//! let schema = EntitySchema::new().with_field("createdAt", FieldKind::TimestampMillis);
//! let codec = EntityCodec::new(schema);
//!
//! let mut fields = FieldMap::new();
//! fields.insert("createdAt".to_string(), FieldValue::Integer(1_700_000_000_000));
//!
//! let wire = codec.to_wire(&fields);
//! assert_eq!(
//!     wire["createdAt"],
//!     FieldValue::Timestamp { seconds: 1_700_000_000, nanos: 0 }
//! );
//!
//! let back = codec.from_wire(&wire);
//! assert_eq!(back, fields);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decode;
mod encode;
mod schema;
pub mod temporal;
mod value;

pub use decode::decode_fields;
pub use encode::encode_fields;
pub use schema::{EntitySchema, FieldKind};
pub use value::{FieldMap, FieldValue};

/// Schema-driven codec for one entity type.
///
/// Both directions are total functions over field maps: values the codec
/// does not understand pass through untouched, so a codec never rejects a
/// record on its own.
#[derive(Debug, Clone)]
pub struct EntityCodec {
    schema: EntitySchema,
}

impl EntityCodec {
    /// Create a codec from an entity schema.
    pub fn new(schema: EntitySchema) -> Self {
        Self { schema }
    }

    /// The schema driving this codec.
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Convert a local field map to its wire form.
    pub fn to_wire(&self, fields: &FieldMap) -> FieldMap {
        encode_fields(&self.schema, fields)
    }

    /// Convert a wire field map to its local form.
    pub fn from_wire(&self, fields: &FieldMap) -> FieldMap {
        decode_fields(&self.schema, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec() -> EntityCodec {
        EntityCodec::new(
            EntitySchema::new()
                .with_field("dataCriacao", FieldKind::TimestampMillis)
                .with_field("signedAt", FieldKind::DateTime),
        )
    }

    #[test]
    fn roundtrip_declared_temporal_millis() {
        let mut fields = FieldMap::new();
        fields.insert(
            "dataCriacao".to_string(),
            FieldValue::Integer(1_700_000_000_000),
        );

        let wire = codec().to_wire(&fields);
        let back = codec().from_wire(&wire);
        assert_eq!(back["dataCriacao"], FieldValue::Integer(1_700_000_000_000));
    }

    #[test]
    fn roundtrip_full_record() {
        let mut fields = FieldMap::new();
        fields.insert("dataCriacao".to_string(), FieldValue::Integer(1_650_000_000_500));
        fields.insert("name".to_string(), FieldValue::Text("Bar do Zé".to_string()));
        fields.insert("routeId".to_string(), FieldValue::Integer(7));
        fields.insert("active".to_string(), FieldValue::Bool(true));
        fields.insert("balance".to_string(), FieldValue::Float(120.5));
        fields.insert("notes".to_string(), FieldValue::Null);

        let wire = codec().to_wire(&fields);
        let back = codec().from_wire(&wire);
        assert_eq!(back, fields);
    }

    #[test]
    fn roundtrip_datetime_kind() {
        let dt = temporal::datetime_from_millis(1_700_000_000_250).unwrap();
        let mut fields = FieldMap::new();
        fields.insert("signedAt".to_string(), FieldValue::DateTime(dt));

        let wire = codec().to_wire(&fields);
        assert!(wire["signedAt"].is_temporal());
        let back = codec().from_wire(&wire);
        assert_eq!(back["signedAt"], FieldValue::DateTime(dt));
    }

    proptest! {
        #[test]
        fn roundtrip_any_declared_millis(millis in -30_000_000_000_000i64..30_000_000_000_000i64) {
            let mut fields = FieldMap::new();
            fields.insert("dataCriacao".to_string(), FieldValue::Integer(millis));

            let wire = codec().to_wire(&fields);
            let back = codec().from_wire(&wire);
            prop_assert_eq!(&back["dataCriacao"], &FieldValue::Integer(millis));
        }
    }
}
