//! Property-based test generators using proptest.
//!
//! Strategies produce wire records that carry the default modified
//! field, so generated batches can flow through planner, store, and
//! handler code unchanged.

use fieldsync_codec::{FieldMap, FieldValue};
use fieldsync_protocol::RemoteRecord;
use proptest::prelude::*;

/// Strategy for generating field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating scalar field values (no temporals).
pub fn scalar_value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        Just(FieldValue::Null),
        any::<bool>().prop_map(FieldValue::Bool),
        any::<i64>().prop_map(FieldValue::Integer),
        (-1.0e9f64..1.0e9f64).prop_map(FieldValue::Float),
        prop::string::string_regex("[a-zA-Z0-9 ]{0,24}")
            .expect("Invalid regex")
            .prop_map(FieldValue::Text),
    ]
}

/// Strategy for epoch-millis instants from 1970 through 2099.
pub fn epoch_millis_strategy() -> impl Strategy<Value = i64> {
    0i64..4_102_444_800_000
}

/// Strategy for sets of route ids, already deduplicated.
pub fn route_ids_strategy(max: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(1i64..500, 0..max.max(1))
        .prop_map(|ids| ids.into_iter().collect())
}

/// Strategy for one wire record on one of the given routes, carrying
/// `lastModified` and `routeId`.
pub fn remote_record_strategy(routes: Vec<i64>) -> impl Strategy<Value = RemoteRecord> {
    let route = prop::sample::select(routes);
    (1i64..10_000, epoch_millis_strategy(), route).prop_map(|(id, modified, route_id)| {
        let mut fields = FieldMap::new();
        fields.insert("name".to_string(), FieldValue::Text(format!("Record {id}")));
        fields.insert("routeId".to_string(), FieldValue::Integer(route_id));
        fields.insert("lastModified".to_string(), FieldValue::Integer(modified));
        RemoteRecord::new(id, fields)
    })
}

/// Strategy for a batch of wire records with distinct ids.
pub fn record_batch_strategy(
    routes: Vec<i64>,
    max_len: usize,
) -> impl Strategy<Value = Vec<RemoteRecord>> {
    let route = prop::sample::select(routes);
    prop::collection::btree_map(
        1i64..10_000,
        (epoch_millis_strategy(), route),
        0..max_len.max(1),
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(id, (modified, route_id))| {
                let mut fields = FieldMap::new();
                fields.insert("routeId".to_string(), FieldValue::Integer(route_id));
                fields.insert("lastModified".to_string(), FieldValue::Integer(modified));
                RemoteRecord::new(id, fields)
            })
            .collect()
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
