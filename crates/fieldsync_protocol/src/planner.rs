//! Scope-aware query planning.

use crate::path::CollectionPath;
use crate::query::{RecordQuery, ScopeFilter};
use crate::scope::AccessScope;

/// Providers cap the number of ids an `in` predicate may carry.
pub const MAX_IN_CLAUSE: usize = 10;

/// Plans the remote queries for one pull.
///
/// Admin sessions and unscoped entity types get a single cursored query.
/// Restricted sessions get one query per chunk of assigned route ids,
/// chunked at the provider's `in` limit; the chunks partition the scope
/// exactly, so together the queries cover the scope with no overlap and
/// nothing a query returns can lie outside it.
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    max_in_clause: usize,
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self {
            max_in_clause: MAX_IN_CLAUSE,
        }
    }
}

impl QueryPlanner {
    /// Create a planner with the default `in` limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the `in` limit (clamped to at least 1).
    pub fn with_max_in_clause(mut self, limit: usize) -> Self {
        self.max_in_clause = limit.max(1);
        self
    }

    /// Plan the queries for one pull of one entity type.
    ///
    /// `scope_field` is the record field carrying the route id; entity
    /// types without one are unscoped. `cursor` of 0 means a first run
    /// and omits the timestamp predicate. An empty restricted scope
    /// plans nothing unless `allow_bootstrap` opts the entity into an
    /// unfiltered first pull.
    pub fn plan(
        &self,
        collection: CollectionPath,
        scope_field: Option<&str>,
        scope: &AccessScope,
        order_by: &str,
        cursor: i64,
        allow_bootstrap: bool,
    ) -> Vec<RecordQuery> {
        let base = self.base_query(collection, order_by, cursor);

        let field = match scope_field {
            Some(field) if !scope.is_admin() => field,
            _ => return vec![base],
        };

        let route_ids: Vec<i64> = scope.route_ids().iter().copied().collect();
        if route_ids.is_empty() {
            return if allow_bootstrap { vec![base] } else { Vec::new() };
        }

        route_ids
            .chunks(self.max_in_clause)
            .map(|chunk| {
                let filter = if chunk.len() == 1 {
                    ScopeFilter::Equals {
                        field: field.to_string(),
                        value: chunk[0],
                    }
                } else {
                    ScopeFilter::AnyOf {
                        field: field.to_string(),
                        values: chunk.to_vec(),
                    }
                };
                base.clone().with_scope(filter)
            })
            .collect()
    }

    fn base_query(&self, collection: CollectionPath, order_by: &str, cursor: i64) -> RecordQuery {
        let query = RecordQuery::new(collection, order_by);
        if cursor > 0 {
            query.with_cursor(cursor)
        } else {
            query
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn collection() -> CollectionPath {
        CollectionPath::locate("acme", "clients")
    }

    fn plan_routes(route_ids: Vec<i64>, cursor: i64) -> Vec<RecordQuery> {
        QueryPlanner::new().plan(
            collection(),
            Some("routeId"),
            &AccessScope::restricted(route_ids),
            "lastModified",
            cursor,
            false,
        )
    }

    #[test]
    fn admin_scope_plans_single_unfiltered_query() {
        let plan = QueryPlanner::new().plan(
            collection(),
            Some("routeId"),
            &AccessScope::admin(),
            "lastModified",
            0,
            false,
        );
        assert_eq!(plan.len(), 1);
        assert!(plan[0].scope.is_none());
        assert!(plan[0].cursor.is_none());
    }

    #[test]
    fn unscoped_entity_plans_single_query() {
        let plan = QueryPlanner::new().plan(
            collection(),
            None,
            &AccessScope::restricted([3, 7]),
            "lastModified",
            500,
            false,
        );
        assert_eq!(plan.len(), 1);
        assert!(plan[0].scope.is_none());
        assert_eq!(plan[0].cursor, Some(500));
    }

    #[test]
    fn single_route_uses_equality_filter() {
        let plan = plan_routes(vec![3], 0);
        assert_eq!(plan.len(), 1);
        assert_eq!(
            plan[0].scope,
            Some(ScopeFilter::Equals {
                field: "routeId".to_string(),
                value: 3,
            })
        );
    }

    #[test]
    fn twenty_three_routes_chunk_into_three_queries() {
        let plan = plan_routes((1..=23).collect(), 0);
        assert_eq!(plan.len(), 3);

        let mut seen = BTreeSet::new();
        for query in &plan {
            let ids = query.scope.as_ref().unwrap().route_ids();
            assert!(ids.len() <= MAX_IN_CLAUSE);
            for id in ids {
                assert!(seen.insert(id), "route id {id} appears in two chunks");
            }
        }
        assert_eq!(seen, (1..=23).collect());
    }

    #[test]
    fn plan_never_escapes_the_scope() {
        let plan = plan_routes(vec![3, 7], 0);
        for query in &plan {
            for id in query.scope.as_ref().unwrap().route_ids() {
                assert!(id == 3 || id == 7);
                assert_ne!(id, 5);
            }
        }
    }

    #[test]
    fn empty_scope_plans_nothing() {
        assert!(plan_routes(vec![], 0).is_empty());
    }

    #[test]
    fn empty_scope_with_bootstrap_plans_unfiltered_query() {
        let plan = QueryPlanner::new().plan(
            collection(),
            Some("routeId"),
            &AccessScope::restricted([]),
            "lastModified",
            0,
            true,
        );
        assert_eq!(plan.len(), 1);
        assert!(plan[0].scope.is_none());
    }

    #[test]
    fn failed_closed_scope_plans_nothing_without_bootstrap() {
        let plan = QueryPlanner::new().plan(
            collection(),
            Some("routeId"),
            &AccessScope::failed_closed("provider down"),
            "lastModified",
            0,
            false,
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn first_run_omits_cursor_predicate() {
        let plan = plan_routes(vec![3, 7], 0);
        assert!(plan.iter().all(|q| q.cursor.is_none()));
    }

    #[test]
    fn resumed_run_carries_cursor_in_every_chunk() {
        let plan = plan_routes((1..=23).collect(), 1_700_000_000_000);
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|q| q.cursor == Some(1_700_000_000_000)));
        assert!(plan.iter().all(|q| q.order_by == "lastModified"));
    }

    proptest! {
        #[test]
        fn chunks_partition_the_scope(
            route_ids in proptest::collection::btree_set(0i64..1_000, 0..60),
        ) {
            let plan = plan_routes(route_ids.iter().copied().collect(), 0);

            let mut covered = BTreeSet::new();
            for query in &plan {
                let ids = query.scope.as_ref().unwrap().route_ids();
                prop_assert!(ids.len() <= MAX_IN_CLAUSE);
                prop_assert!(!ids.is_empty());
                for id in ids {
                    prop_assert!(covered.insert(id));
                }
            }
            prop_assert_eq!(covered, route_ids);
        }
    }
}
