//! Referential integrity checks at apply time.

use std::sync::Arc;

use tracing::warn;

use crate::error::SyncResult;
use crate::store::LocalStore;

/// Checks that a referenced parent row exists locally before a child is
/// applied.
///
/// Local lookups only; the guard never fetches a missing parent from the
/// remote store. An absent parent means the child is skipped for this
/// run and picked up again once the parent has arrived.
pub struct ReferenceGuard {
    local: Arc<dyn LocalStore>,
}

impl ReferenceGuard {
    /// Creates a guard over the local store.
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self { local }
    }

    /// Whether the parent row exists locally.
    ///
    /// Logs a named warning when it does not; storage failures propagate.
    pub async fn ensure_exists(&self, parent: &str, parent_id: i64) -> SyncResult<bool> {
        match self.local.get(parent, parent_id).await? {
            Some(_) => Ok(true),
            None => {
                warn!(parent, parent_id, "referenced parent row missing locally");
                Ok(false)
            }
        }
    }
}
