//! Access scopes for route-restricted sessions.

use std::collections::BTreeSet;

/// What data the current session may see.
///
/// Admin sessions see the whole tenant. Restricted sessions see only the
/// routes assigned to them; a restricted scope with no routes yields no
/// data unless the entity opts into bootstrap. A scope produced by a
/// failed assignment lookup is closed and carries the fault so the run
/// can report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessScope {
    admin: bool,
    route_ids: BTreeSet<i64>,
    fault: Option<String>,
}

impl AccessScope {
    /// Scope for a tenant administrator: route filtering does not apply.
    pub fn admin() -> Self {
        Self {
            admin: true,
            route_ids: BTreeSet::new(),
            fault: None,
        }
    }

    /// Scope restricted to the given route ids.
    pub fn restricted<I: IntoIterator<Item = i64>>(route_ids: I) -> Self {
        Self {
            admin: false,
            route_ids: route_ids.into_iter().collect(),
            fault: None,
        }
    }

    /// Closed scope recorded when the assignment lookup failed.
    ///
    /// Carries no access at all; the fault string becomes the run's error.
    pub fn failed_closed(fault: impl Into<String>) -> Self {
        Self {
            admin: false,
            route_ids: BTreeSet::new(),
            fault: Some(fault.into()),
        }
    }

    /// Whether this scope belongs to an administrator.
    pub fn is_admin(&self) -> bool {
        self.admin
    }

    /// The assigned route ids (empty for admin scopes).
    pub fn route_ids(&self) -> &BTreeSet<i64> {
        &self.route_ids
    }

    /// Whether a restricted scope has no routes at all.
    pub fn is_empty(&self) -> bool {
        !self.admin && self.route_ids.is_empty()
    }

    /// The fault that closed this scope, if any.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Whether this scope admits a record carrying the given route id.
    ///
    /// A missing route id is admitted only for admin scopes.
    pub fn admits(&self, route_id: Option<i64>) -> bool {
        if self.admin {
            return true;
        }
        match route_id {
            Some(id) => self.route_ids.contains(&id),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_scope_admits_everything() {
        let scope = AccessScope::admin();
        assert!(scope.is_admin());
        assert!(scope.admits(Some(5)));
        assert!(scope.admits(None));
        assert!(!scope.is_empty());
    }

    #[test]
    fn restricted_scope_admits_only_assigned_routes() {
        let scope = AccessScope::restricted([3, 7]);
        assert!(scope.admits(Some(3)));
        assert!(scope.admits(Some(7)));
        assert!(!scope.admits(Some(5)));
        assert!(!scope.admits(None));
    }

    #[test]
    fn empty_restricted_scope() {
        let scope = AccessScope::restricted([]);
        assert!(scope.is_empty());
        assert!(!scope.admits(Some(1)));
    }

    #[test]
    fn failed_closed_scope_carries_fault_and_no_access() {
        let scope = AccessScope::failed_closed("assignment provider timed out");
        assert!(scope.is_empty());
        assert!(!scope.is_admin());
        assert_eq!(scope.fault(), Some("assignment provider timed out"));
        assert!(!scope.admits(Some(1)));
    }

    #[test]
    fn duplicate_route_ids_collapse() {
        let scope = AccessScope::restricted([1, 1, 2, 2, 2]);
        assert_eq!(scope.route_ids().len(), 2);
    }
}
