//! Shared helpers for the FieldSync benchmarks.

use fieldsync_codec::{FieldMap, FieldValue};
use fieldsync_protocol::RemoteRecord;

/// A wire record carrying the default modified and scope fields.
pub fn wire_record(id: i64, modified: i64, route: i64) -> RemoteRecord {
    let mut fields = FieldMap::new();
    fields.insert("lastModified".to_string(), FieldValue::Integer(modified));
    fields.insert("routeId".to_string(), FieldValue::Integer(route));
    RemoteRecord::new(id, fields)
}
