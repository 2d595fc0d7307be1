//! Wire-to-local field conversion.

use crate::schema::{EntitySchema, FieldKind};
use crate::temporal;
use crate::value::{FieldMap, FieldValue};

/// Convert a wire field map to its local form.
///
/// Wire timestamps in declared temporal fields become epoch-millisecond
/// integers or rich date-times according to the declared kind. Temporal
/// text on the wire follows the pinned fallback order (ISO-8601 when the
/// text contains `'T'` or `'-'`, otherwise epoch-millisecond digits);
/// text that fits neither passes through opaque. Original key casing is
/// preserved.
pub fn decode_fields(schema: &EntitySchema, fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .map(|(key, value)| {
            let decoded = match schema.kind_of(key) {
                FieldKind::Plain => value.clone(),
                FieldKind::TimestampMillis => decode_to_millis(value),
                FieldKind::DateTime => decode_to_datetime(value),
            };
            (key.clone(), decoded)
        })
        .collect()
}

fn decode_to_millis(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Timestamp { seconds, nanos } => {
            FieldValue::Integer(temporal::join_epoch_millis(*seconds, *nanos))
        }
        FieldValue::DateTime(dt) => FieldValue::Integer(dt.and_utc().timestamp_millis()),
        FieldValue::Integer(_) => value.clone(),
        FieldValue::Text(text) => match temporal::parse_temporal_text(text) {
            Some(millis) => FieldValue::Integer(millis),
            None => value.clone(),
        },
        _ => value.clone(),
    }
}

fn decode_to_datetime(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Timestamp { seconds, nanos } => {
            match temporal::datetime_from_millis(temporal::join_epoch_millis(*seconds, *nanos)) {
                Some(dt) => FieldValue::DateTime(dt),
                None => value.clone(),
            }
        }
        FieldValue::Integer(millis) => match temporal::datetime_from_millis(*millis) {
            Some(dt) => FieldValue::DateTime(dt),
            None => value.clone(),
        },
        FieldValue::DateTime(_) => value.clone(),
        FieldValue::Text(text) => match temporal::parse_temporal_datetime(text) {
            Some(dt) => FieldValue::DateTime(dt),
            None => value.clone(),
        },
        _ => value.clone(),
    }
}
