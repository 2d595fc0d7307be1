//! Session context and access-scope resolution.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use fieldsync_protocol::AccessScope;

use crate::error::{SyncError, SyncResult};

/// The authenticated session a run executes under.
///
/// Passed explicitly into every run; nothing in the engine caches the
/// company id or the admin flag between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Tenant the session belongs to.
    pub company_id: String,
    /// The signed-in field agent.
    pub user_id: i64,
    /// Whether the agent administers the tenant.
    pub admin: bool,
}

impl SessionContext {
    /// Creates a restricted (non-admin) session.
    pub fn new(company_id: impl Into<String>, user_id: i64) -> Self {
        Self {
            company_id: company_id.into(),
            user_id,
            admin: false,
        }
    }

    /// Creates an admin session.
    pub fn admin(company_id: impl Into<String>, user_id: i64) -> Self {
        Self {
            company_id: company_id.into(),
            user_id,
            admin: true,
        }
    }
}

/// Provider of route assignments for field agents.
#[async_trait]
pub trait RouteAssignments: Send + Sync {
    /// The route ids assigned to the session's agent within its company.
    async fn assigned_route_ids(&self, session: &SessionContext) -> SyncResult<Vec<i64>>;
}

/// Resolves the access scope for a run.
///
/// Admin sessions resolve without touching the provider. Provider
/// failures fail closed: the resolved scope grants no access and carries
/// the fault, which the run records as its error. Resolution is fresh on
/// every call.
pub struct AccessScopeResolver {
    assignments: Arc<dyn RouteAssignments>,
}

impl AccessScopeResolver {
    /// Creates a resolver over an assignment provider.
    pub fn new(assignments: Arc<dyn RouteAssignments>) -> Self {
        Self { assignments }
    }

    /// Resolve the scope for the given session.
    pub async fn resolve(&self, session: &SessionContext) -> AccessScope {
        if session.admin {
            debug!(user_id = session.user_id, "admin session, full tenant scope");
            return AccessScope::admin();
        }
        match self.assignments.assigned_route_ids(session).await {
            Ok(route_ids) => {
                debug!(
                    user_id = session.user_id,
                    routes = route_ids.len(),
                    "resolved route scope"
                );
                AccessScope::restricted(route_ids)
            }
            Err(err) => {
                warn!(
                    user_id = session.user_id,
                    error = %err,
                    "assignment lookup failed, scope fails closed"
                );
                AccessScope::failed_closed(err.to_string())
            }
        }
    }
}

/// In-memory assignment provider for tests.
#[derive(Default)]
pub struct StaticAssignments {
    routes: RwLock<HashMap<i64, Vec<i64>>>,
    fail_with: RwLock<Option<String>>,
}

impl StaticAssignments {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns routes to an agent.
    pub fn assign(&self, user_id: i64, route_ids: Vec<i64>) {
        self.routes.write().insert(user_id, route_ids);
    }

    /// Makes every lookup fail with the given message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.fail_with.write() = Some(message.into());
    }

    /// Clears a previously injected failure.
    pub fn clear_failure(&self) {
        *self.fail_with.write() = None;
    }
}

#[async_trait]
impl RouteAssignments for StaticAssignments {
    async fn assigned_route_ids(&self, session: &SessionContext) -> SyncResult<Vec<i64>> {
        if let Some(message) = self.fail_with.read().clone() {
            return Err(SyncError::ScopeResolution(message));
        }
        Ok(self
            .routes
            .read()
            .get(&session.user_id)
            .cloned()
            .unwrap_or_default())
    }
}
