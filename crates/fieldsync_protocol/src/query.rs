//! Remote query model.

use crate::path::CollectionPath;
use crate::record::RemoteRecord;

/// A scope predicate restricting a query to certain routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    /// `field == value`; used when a chunk holds a single route id.
    Equals {
        /// The record field carrying the route id.
        field: String,
        /// The admitted route id.
        value: i64,
    },
    /// `field in values`; the provider caps the list length, so plans
    /// chunk the ids and emit one query per chunk.
    AnyOf {
        /// The record field carrying the route id.
        field: String,
        /// The admitted route ids for this chunk.
        values: Vec<i64>,
    },
}

impl ScopeFilter {
    /// Whether a record with the given route id passes this filter.
    pub fn admits(&self, route_id: Option<i64>) -> bool {
        match (self, route_id) {
            (ScopeFilter::Equals { value, .. }, Some(id)) => *value == id,
            (ScopeFilter::AnyOf { values, .. }, Some(id)) => values.contains(&id),
            (_, None) => false,
        }
    }

    /// The field the filter applies to.
    pub fn field(&self) -> &str {
        match self {
            ScopeFilter::Equals { field, .. } | ScopeFilter::AnyOf { field, .. } => field,
        }
    }

    /// The route ids this filter admits.
    pub fn route_ids(&self) -> Vec<i64> {
        match self {
            ScopeFilter::Equals { value, .. } => vec![*value],
            ScopeFilter::AnyOf { values, .. } => values.clone(),
        }
    }
}

/// One timestamp-cursored query against a remote collection.
///
/// Results are always ordered ascending by `order_by`. When `cursor` is
/// set the query admits only records whose `order_by` value is strictly
/// greater; a first run (cursor 0) omits the predicate and relies on the
/// ordering alone.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    /// The collection to read.
    pub collection: CollectionPath,
    /// Field ordered ascending and compared against the cursor.
    pub order_by: String,
    /// Exclusive lower bound on `order_by`, when resuming.
    pub cursor: Option<i64>,
    /// Route restriction, when the session is scoped.
    pub scope: Option<ScopeFilter>,
}

impl RecordQuery {
    /// Create an unfiltered query over a collection, ordered by the given
    /// field.
    pub fn new(collection: CollectionPath, order_by: &str) -> Self {
        Self {
            collection,
            order_by: order_by.to_string(),
            cursor: None,
            scope: None,
        }
    }

    /// Restrict to records strictly newer than the cursor.
    pub fn with_cursor(mut self, cursor: i64) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Restrict to records matching the scope filter.
    pub fn with_scope(mut self, scope: ScopeFilter) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Whether a record is admitted by this query's predicates.
    ///
    /// Ordering is not applied here; stores sort admitted records by
    /// `order_by` before returning them.
    pub fn admits(&self, record: &RemoteRecord) -> bool {
        if let Some(cursor) = self.cursor {
            match record.last_modified(&self.order_by) {
                Some(modified) if modified > cursor => {}
                _ => return false,
            }
        }
        match &self.scope {
            Some(filter) => filter.admits(record.route_id(filter.field())),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_codec::{FieldMap, FieldValue};

    fn record(id: i64, modified: i64, route: i64) -> RemoteRecord {
        let mut fields = FieldMap::new();
        fields.insert("lastModified".to_string(), FieldValue::Integer(modified));
        fields.insert("routeId".to_string(), FieldValue::Integer(route));
        RemoteRecord::new(id, fields)
    }

    fn query() -> RecordQuery {
        RecordQuery::new(CollectionPath::locate("acme", "clients"), "lastModified")
    }

    #[test]
    fn cursor_bound_is_exclusive() {
        let q = query().with_cursor(100);
        assert!(!q.admits(&record(1, 99, 3)));
        assert!(!q.admits(&record(1, 100, 3)));
        assert!(q.admits(&record(1, 101, 3)));
    }

    #[test]
    fn missing_order_field_fails_cursored_queries() {
        let q = query().with_cursor(100);
        let bare = RemoteRecord::new(1, FieldMap::new());
        assert!(!q.admits(&bare));
    }

    #[test]
    fn uncursored_query_admits_all_timestamps() {
        let q = query();
        assert!(q.admits(&record(1, 0, 3)));
        assert!(q.admits(&record(1, i64::MAX, 3)));
    }

    #[test]
    fn equals_filter() {
        let filter = ScopeFilter::Equals {
            field: "routeId".to_string(),
            value: 3,
        };
        assert!(filter.admits(Some(3)));
        assert!(!filter.admits(Some(4)));
        assert!(!filter.admits(None));
    }

    #[test]
    fn any_of_filter() {
        let filter = ScopeFilter::AnyOf {
            field: "routeId".to_string(),
            values: vec![3, 7],
        };
        assert!(filter.admits(Some(7)));
        assert!(!filter.admits(Some(5)));
    }

    #[test]
    fn scoped_query_combines_predicates() {
        let q = query().with_cursor(100).with_scope(ScopeFilter::Equals {
            field: "routeId".to_string(),
            value: 3,
        });
        assert!(q.admits(&record(1, 101, 3)));
        assert!(!q.admits(&record(1, 101, 4)));
        assert!(!q.admits(&record(1, 100, 3)));
    }
}
