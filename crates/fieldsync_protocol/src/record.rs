//! Record shapes on both sides of the wire.

use fieldsync_codec::{FieldMap, FieldValue};
use serde::{Deserialize, Serialize};

/// A record in its local relational form.
///
/// `id` is the stable primary key shared with the remote document; the
/// fields hold the local representation (epoch-millisecond integers for
/// temporal instants).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Stable primary key, identical on both sides.
    pub id: i64,
    /// The record's fields.
    pub fields: FieldMap,
}

impl EntityRecord {
    /// Create a record from its id and fields.
    pub fn new(id: i64, fields: FieldMap) -> Self {
        Self { id, fields }
    }

    /// Read the record's last-modified instant from the named field,
    /// coerced to epoch milliseconds.
    pub fn last_modified(&self, field: &str) -> Option<i64> {
        lookup_ci(&self.fields, field).and_then(FieldValue::as_epoch_millis)
    }

    /// Read a referenced id from the named field.
    ///
    /// Accepts integer values directly and digit-only text (remote
    /// producers are not consistent about numeric typing).
    pub fn reference_id(&self, field: &str) -> Option<i64> {
        reference_id(&self.fields, field)
    }
}

/// A record in its remote document form.
///
/// Fields hold wire values (native timestamps for temporal instants).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Stable document id, identical to the local primary key.
    pub id: i64,
    /// The document's fields.
    pub fields: FieldMap,
}

impl RemoteRecord {
    /// Create a wire record from its id and fields.
    pub fn new(id: i64, fields: FieldMap) -> Self {
        Self { id, fields }
    }

    /// Read the record's last-modified instant from the named field,
    /// coerced to epoch milliseconds.
    pub fn last_modified(&self, field: &str) -> Option<i64> {
        lookup_ci(&self.fields, field).and_then(FieldValue::as_epoch_millis)
    }

    /// Read the record's route id from the named scope field.
    pub fn route_id(&self, field: &str) -> Option<i64> {
        reference_id(&self.fields, field)
    }

    /// Approximate wire size of this record in bytes, for transfer
    /// accounting. Intentionally rough: field names plus a flat estimate
    /// per value.
    pub fn approximate_size(&self) -> u64 {
        let fields: u64 = self
            .fields
            .iter()
            .map(|(key, value)| key.len() as u64 + approximate_value_size(value))
            .sum();
        // 8 bytes of id plus per-field framing
        8 + fields + 2 * self.fields.len() as u64
    }
}

fn lookup_ci<'a>(fields: &'a FieldMap, name: &str) -> Option<&'a FieldValue> {
    if let Some(value) = fields.get(name) {
        return Some(value);
    }
    fields
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn reference_id(fields: &FieldMap, name: &str) -> Option<i64> {
    match lookup_ci(fields, name)? {
        FieldValue::Integer(id) => Some(*id),
        FieldValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        FieldValue::Text(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn approximate_value_size(value: &FieldValue) -> u64 {
    match value {
        FieldValue::Null => 1,
        FieldValue::Bool(_) => 1,
        FieldValue::Integer(_) | FieldValue::Float(_) => 8,
        FieldValue::Text(s) => s.len() as u64,
        FieldValue::Timestamp { .. } => 12,
        FieldValue::DateTime(_) => 12,
    }
}
