//! Local-to-wire field conversion.

use crate::schema::EntitySchema;
use crate::temporal;
use crate::value::{FieldMap, FieldValue};

/// Convert a local field map to its wire form.
///
/// Fields declared temporal in the schema are converted to native wire
/// timestamps; everything else passes through unchanged. Temporal text
/// that cannot be parsed passes through opaque rather than failing, and
/// the original key casing is preserved.
pub fn encode_fields(schema: &EntitySchema, fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .map(|(key, value)| {
            let encoded = if schema.kind_of(key).is_temporal() {
                encode_temporal(value)
            } else {
                value.clone()
            };
            (key.clone(), encoded)
        })
        .collect()
}

fn encode_temporal(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Integer(millis) => FieldValue::from_epoch_millis(*millis),
        FieldValue::DateTime(dt) => {
            FieldValue::from_epoch_millis(dt.and_utc().timestamp_millis())
        }
        FieldValue::Timestamp { .. } => value.clone(),
        FieldValue::Text(text) => match temporal::parse_temporal_text(text) {
            Some(millis) => FieldValue::from_epoch_millis(millis),
            None => value.clone(),
        },
        _ => value.clone(),
    }
}
