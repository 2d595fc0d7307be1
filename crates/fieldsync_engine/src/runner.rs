//! Multi-entity orchestration.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use fieldsync_protocol::QueryPlanner;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::handler::{EntityDescriptor, PullReport, PushReport, SyncHandler};
use crate::metadata::{MetadataStore, SyncCursor, SyncDirection, GLOBAL_SYNC};
use crate::session::{RouteAssignments, SessionContext};
use crate::store::{LocalStore, RemoteStore};

/// What happened to one entity type during a cycle.
#[derive(Debug, Clone, Default)]
pub struct EntityOutcome {
    /// Entity type name.
    pub entity: String,
    /// Pull outcome, absent when the pull failed.
    pub pull: Option<PullReport>,
    /// Push outcome, absent when the pull or push failed.
    pub push: Option<PushReport>,
    /// The error that stopped this entity's unit of work, if any.
    pub error: Option<String>,
}

impl EntityOutcome {
    /// Whether this entity's unit of work completed.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Records moved in both directions.
    pub fn records_moved(&self) -> u64 {
        self.pull.as_ref().map_or(0, |p| p.applied)
            + self.push.as_ref().map_or(0, |p| p.pushed)
    }

    fn bytes(&self) -> u64 {
        self.pull.as_ref().map_or(0, |p| p.bytes) + self.push.as_ref().map_or(0, |p| p.bytes)
    }
}

/// Aggregate result of one cycle.
///
/// A cycle with failed entities still yields `Ok(summary)`: entity
/// failures never cross entity boundaries, they are only visible here
/// and in each entity's metadata row.
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    /// Per-entity outcomes, in execution order.
    pub outcomes: Vec<EntityOutcome>,
    /// Records moved in both directions across all entities.
    pub records_moved: u64,
    /// Wall-clock duration of the cycle, millis.
    pub duration_ms: u64,
    /// Errors collected from failed entities, one per entity.
    pub errors: Vec<String>,
}

impl SyncSummary {
    /// Whether every entity completed.
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    /// The outcome for one entity, if it ran.
    pub fn outcome(&self, entity: &str) -> Option<&EntityOutcome> {
        self.outcomes.iter().find(|o| o.entity == entity)
    }
}

/// Cumulative counters across the runner's lifetime.
#[derive(Debug, Clone, Default)]
pub struct RunnerStats {
    /// Cycles that completed with no entity failures.
    pub cycles_completed: u64,
    /// Cycles with at least one failed entity, or aborted outright.
    pub cycles_failed: u64,
    /// Records applied locally across all cycles.
    pub records_pulled: u64,
    /// Records written remotely across all cycles.
    pub records_pushed: u64,
    /// When the last cycle finished, epoch millis.
    pub last_cycle_at: Option<i64>,
}

/// Runs registered entity types in dependency order.
///
/// Entity types whose dependencies are satisfied at the same depth run
/// concurrently; each runs pull-then-push as one unit. Dependency order
/// is declared per descriptor and sorted topologically, so parents pull
/// before the children that reference them.
pub struct SyncRunner {
    config: SyncConfig,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    metadata: Arc<dyn MetadataStore>,
    assignments: Arc<dyn RouteAssignments>,
    handlers: Vec<Arc<SyncHandler>>,
    cancelled: Arc<AtomicBool>,
    stats: RwLock<RunnerStats>,
}

impl SyncRunner {
    /// Creates a runner over the shared stores.
    pub fn new(
        config: SyncConfig,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        metadata: Arc<dyn MetadataStore>,
        assignments: Arc<dyn RouteAssignments>,
    ) -> Self {
        Self {
            config,
            local,
            remote,
            metadata,
            assignments,
            handlers: Vec::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
            stats: RwLock::new(RunnerStats::default()),
        }
    }

    /// Registers an entity type. Registration order only breaks ties;
    /// execution order comes from the declared dependencies.
    pub fn register(&mut self, descriptor: EntityDescriptor) {
        let planner = QueryPlanner::new().with_max_in_clause(self.config.max_in_clause);
        self.handlers.push(Arc::new(SyncHandler::new(
            descriptor,
            planner,
            self.local.clone(),
            self.remote.clone(),
            self.metadata.clone(),
            self.assignments.clone(),
            self.cancelled.clone(),
        )));
    }

    /// The registered entity type names, in registration order.
    pub fn entities(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Requests cancellation; in-flight runs stop at their next boundary
    /// without touching their cursors.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clears a previous cancellation request.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Snapshot of the cumulative counters.
    pub fn stats(&self) -> RunnerStats {
        self.stats.read().clone()
    }

    /// Whether a background cycle is due: never synced, or the last full
    /// cycle is older than the configured staleness threshold.
    pub async fn should_sync(&self) -> SyncResult<bool> {
        let last = self
            .metadata
            .last_timestamp(GLOBAL_SYNC, SyncDirection::Pull)
            .await?;
        if last == 0 {
            return Ok(true);
        }
        let idle = Utc::now().timestamp_millis().saturating_sub(last);
        Ok(idle >= self.config.background_idle.as_millis() as i64)
    }

    /// Runs every registered entity type in dependency order.
    ///
    /// Returns `Err` only for whole-cycle failures (cancellation, a bad
    /// dependency graph, or an unrecordable summary row); per-entity
    /// failures land in the summary and the entity's own metadata.
    pub async fn sync_all(&self, session: &SessionContext) -> SyncResult<SyncSummary> {
        if self.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let levels = self.levels()?;
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        info!(
            run = %run_id,
            company = %session.company_id,
            entities = self.handlers.len(),
            "sync cycle starting"
        );

        let mut outcomes: Vec<EntityOutcome> = Vec::with_capacity(self.handlers.len());
        let mut errors: Vec<String> = Vec::new();
        let mut cancelled = false;

        for level in levels {
            let results = join_all(level.iter().map(|handler| {
                let handler = handler.clone();
                async move {
                    let name = handler.name().to_string();
                    let result = handler.sync(session).await;
                    (name, result)
                }
            }))
            .await;

            for (entity, result) in results {
                match result {
                    Ok((pull, push)) => outcomes.push(EntityOutcome {
                        entity,
                        pull: Some(pull),
                        push: Some(push),
                        error: None,
                    }),
                    Err(SyncError::Cancelled) => {
                        cancelled = true;
                    }
                    Err(err) => {
                        error!(entity = %entity, error = %err, "entity sync failed");
                        errors.push(format!("{entity}: {err}"));
                        outcomes.push(EntityOutcome {
                            entity,
                            error: Some(err.to_string()),
                            ..EntityOutcome::default()
                        });
                    }
                }
            }

            if cancelled {
                warn!(run = %run_id, "sync cycle cancelled");
                self.stats.write().cycles_failed += 1;
                return Err(SyncError::Cancelled);
            }
        }

        self.finish_cycle(run_id, outcomes, errors, started).await
    }

    /// Runs the cycle, retrying retryable failures with backoff.
    pub async fn sync_all_with_retry(&self, session: &SessionContext) -> SyncResult<SyncSummary> {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.sync_all(session).await {
                Ok(summary) if summary.succeeded() => return Ok(summary),
                Ok(summary) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Ok(summary);
                    }
                    warn!(
                        attempt,
                        errors = summary.errors.len(),
                        "cycle had failed entities, retrying"
                    );
                }
                Err(err) if err.is_retryable() => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(err);
                    }
                    warn!(attempt, error = %err, "cycle failed, retrying");
                }
                Err(err) => return Err(err),
            }
            tokio::time::sleep(self.config.retry.delay_for_attempt(attempt)).await;
        }
    }

    /// Pulls every entity type in dependency order, without pushing.
    pub async fn pull_all(&self, session: &SessionContext) -> SyncResult<SyncSummary> {
        let levels = self.levels()?;
        self.run_one_direction(session, levels, SyncDirection::Pull)
            .await
    }

    /// Pushes every entity type in reverse dependency order (children
    /// before the parents they reference), without pulling.
    pub async fn push_all(&self, session: &SessionContext) -> SyncResult<SyncSummary> {
        let mut levels = self.levels()?;
        levels.reverse();
        self.run_one_direction(session, levels, SyncDirection::Push)
            .await
    }

    /// Runs one entity type's pull-then-push unit by name.
    pub async fn sync_entity(
        &self,
        session: &SessionContext,
        entity: &str,
    ) -> SyncResult<(PullReport, PushReport)> {
        let handler = self
            .handlers
            .iter()
            .find(|h| h.name() == entity)
            .ok_or_else(|| SyncError::UnknownEntity(entity.to_string()))?;
        handler.sync(session).await
    }

    async fn run_one_direction(
        &self,
        session: &SessionContext,
        levels: Vec<Vec<Arc<SyncHandler>>>,
        direction: SyncDirection,
    ) -> SyncResult<SyncSummary> {
        if self.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let started = Instant::now();
        let mut outcomes: Vec<EntityOutcome> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        for level in levels {
            let results = join_all(level.iter().map(|handler| {
                let handler = handler.clone();
                async move {
                    let name = handler.name().to_string();
                    let result = match direction {
                        SyncDirection::Pull => handler.pull(session).await.map(PullOrPush::Pull),
                        SyncDirection::Push => handler.push(session).await.map(PullOrPush::Push),
                    };
                    (name, result)
                }
            }))
            .await;

            for (entity, result) in results {
                match result {
                    Ok(PullOrPush::Pull(report)) => outcomes.push(EntityOutcome {
                        entity,
                        pull: Some(report),
                        ..EntityOutcome::default()
                    }),
                    Ok(PullOrPush::Push(report)) => outcomes.push(EntityOutcome {
                        entity,
                        push: Some(report),
                        ..EntityOutcome::default()
                    }),
                    Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                    Err(err) => {
                        errors.push(format!("{entity}: {err}"));
                        outcomes.push(EntityOutcome {
                            entity,
                            error: Some(err.to_string()),
                            ..EntityOutcome::default()
                        });
                    }
                }
            }
        }

        let records_moved = outcomes.iter().map(EntityOutcome::records_moved).sum();
        {
            let mut stats = self.stats.write();
            for outcome in &outcomes {
                stats.records_pulled += outcome.pull.as_ref().map_or(0, |p| p.applied);
                stats.records_pushed += outcome.push.as_ref().map_or(0, |p| p.pushed);
            }
        }
        Ok(SyncSummary {
            outcomes,
            records_moved,
            duration_ms: started.elapsed().as_millis() as u64,
            errors,
        })
    }

    async fn finish_cycle(
        &self,
        run_id: Uuid,
        outcomes: Vec<EntityOutcome>,
        errors: Vec<String>,
        started: Instant,
    ) -> SyncResult<SyncSummary> {
        let duration_ms = started.elapsed().as_millis() as u64;
        let records_moved: u64 = outcomes.iter().map(EntityOutcome::records_moved).sum();
        let bytes: u64 = outcomes.iter().map(EntityOutcome::bytes).sum();
        let now = Utc::now().timestamp_millis();

        let row = if errors.is_empty() {
            SyncCursor::success(GLOBAL_SYNC, SyncDirection::Pull, now, records_moved, duration_ms, bytes)
        } else {
            let previous = self
                .metadata
                .last_timestamp(GLOBAL_SYNC, SyncDirection::Pull)
                .await?;
            SyncCursor::failure(
                GLOBAL_SYNC,
                SyncDirection::Pull,
                previous,
                records_moved,
                duration_ms,
                bytes,
                errors.join("; "),
            )
        };
        self.metadata.record_run(row).await?;

        {
            let mut stats = self.stats.write();
            if errors.is_empty() {
                stats.cycles_completed += 1;
            } else {
                stats.cycles_failed += 1;
            }
            for outcome in &outcomes {
                stats.records_pulled += outcome.pull.as_ref().map_or(0, |p| p.applied);
                stats.records_pushed += outcome.push.as_ref().map_or(0, |p| p.pushed);
            }
            stats.last_cycle_at = Some(now);
        }

        info!(
            run = %run_id,
            entities = outcomes.len(),
            records = records_moved,
            failed = errors.len(),
            duration_ms,
            "sync cycle finished"
        );
        Ok(SyncSummary {
            outcomes,
            records_moved,
            duration_ms,
            errors,
        })
    }

    /// Orders handlers into dependency levels: every handler's
    /// dependencies sit at an earlier level.
    fn levels(&self) -> SyncResult<Vec<Vec<Arc<SyncHandler>>>> {
        for handler in &self.handlers {
            for dep in &handler.descriptor().depends_on {
                if !self.handlers.iter().any(|h| h.name() == dep) {
                    return Err(SyncError::UnknownEntity(dep.clone()));
                }
            }
        }

        let mut placed: HashSet<String> = HashSet::new();
        let mut pending: Vec<Arc<SyncHandler>> = self.handlers.clone();
        let mut levels: Vec<Vec<Arc<SyncHandler>>> = Vec::new();

        while !pending.is_empty() {
            let (ready, rest): (Vec<_>, Vec<_>) = pending.into_iter().partition(|handler| {
                handler
                    .descriptor()
                    .depends_on
                    .iter()
                    .all(|dep| placed.contains(dep))
            });
            if ready.is_empty() {
                return Err(SyncError::DependencyCycle(rest[0].name().to_string()));
            }
            for handler in &ready {
                placed.insert(handler.name().to_string());
            }
            levels.push(ready);
            pending = rest;
        }
        Ok(levels)
    }
}

enum PullOrPush {
    Pull(PullReport),
    Push(PushReport),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MemoryMetadataStore;
    use crate::session::StaticAssignments;
    use crate::store::{MemoryLocalStore, MockRemoteStore};
    use fieldsync_codec::{EntitySchema, FieldMap, FieldValue};
    use fieldsync_protocol::RemoteRecord;

    struct Harness {
        local: Arc<MemoryLocalStore>,
        remote: Arc<MockRemoteStore>,
        metadata: Arc<MemoryMetadataStore>,
        assignments: Arc<StaticAssignments>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                local: Arc::new(MemoryLocalStore::new()),
                remote: Arc::new(MockRemoteStore::new()),
                metadata: Arc::new(MemoryMetadataStore::new()),
                assignments: Arc::new(StaticAssignments::new()),
            }
        }

        fn runner(&self, config: SyncConfig) -> SyncRunner {
            SyncRunner::new(
                config,
                self.local.clone(),
                self.remote.clone(),
                self.metadata.clone(),
                self.assignments.clone(),
            )
        }
    }

    fn descriptor(name: &str) -> EntityDescriptor {
        EntityDescriptor::new(name, EntitySchema::new())
    }

    fn wire_record(id: i64, modified: i64) -> RemoteRecord {
        let mut fields = FieldMap::new();
        fields.insert("lastModified".to_string(), FieldValue::Integer(modified));
        RemoteRecord::new(id, fields)
    }

    fn admin() -> SessionContext {
        SessionContext::admin("acme", 1)
    }

    #[test]
    fn levels_follow_declared_dependencies() {
        let harness = Harness::new();
        let mut runner = harness.runner(SyncConfig::new());
        runner.register(descriptor("clients"));
        runner.register(descriptor("tables"));
        runner.register(descriptor("contracts").with_dependency("clients"));
        runner.register(
            descriptor("settlements")
                .with_dependency("contracts")
                .with_dependency("tables"),
        );

        let levels = runner.levels().unwrap();
        let names: Vec<Vec<&str>> = levels
            .iter()
            .map(|level| level.iter().map(|h| h.name()).collect())
            .collect();
        assert_eq!(
            names,
            vec![
                vec!["clients", "tables"],
                vec!["contracts"],
                vec!["settlements"],
            ]
        );
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let harness = Harness::new();
        let mut runner = harness.runner(SyncConfig::new());
        runner.register(descriptor("contracts").with_dependency("clients"));

        assert!(matches!(
            runner.levels(),
            Err(SyncError::UnknownEntity(name)) if name == "clients"
        ));
    }

    #[test]
    fn dependency_cycles_are_rejected() {
        let harness = Harness::new();
        let mut runner = harness.runner(SyncConfig::new());
        runner.register(descriptor("a").with_dependency("b"));
        runner.register(descriptor("b").with_dependency("a"));

        assert!(matches!(
            runner.levels(),
            Err(SyncError::DependencyCycle(_))
        ));
    }

    #[tokio::test]
    async fn cycle_records_a_global_summary_row() {
        let harness = Harness::new();
        harness.remote.push_response(vec![wire_record(1, 100)]);

        let mut runner = harness.runner(SyncConfig::new());
        runner.register(descriptor("clients"));

        let summary = runner.sync_all(&admin()).await.unwrap();
        assert!(summary.succeeded());
        assert_eq!(summary.records_moved, 2); // 1 pulled + 1 echoed back up

        let row = harness
            .metadata
            .cursor(GLOBAL_SYNC, SyncDirection::Pull)
            .await
            .unwrap()
            .unwrap();
        assert!(row.succeeded());
        assert!(row.last_timestamp_millis > 0);

        let stats = runner.stats();
        assert_eq!(stats.cycles_completed, 1);
        assert_eq!(stats.records_pulled, 1);
        assert_eq!(stats.records_pushed, 1);
    }

    #[tokio::test]
    async fn entity_failure_stays_in_the_summary() {
        let harness = Harness::new();
        harness
            .remote
            .push_error(SyncError::fetch_retryable("deadline exceeded"));

        let mut runner = harness.runner(SyncConfig::new());
        runner.register(descriptor("clients"));

        let summary = runner.sync_all(&admin()).await.unwrap();
        assert!(!summary.succeeded());
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].contains("clients"));
        assert!(!summary.outcome("clients").unwrap().succeeded());

        let stats = runner.stats();
        assert_eq!(stats.cycles_failed, 1);

        // The failed cycle keeps the previous (absent) global cursor.
        let row = harness
            .metadata
            .cursor(GLOBAL_SYNC, SyncDirection::Pull)
            .await
            .unwrap()
            .unwrap();
        assert!(!row.succeeded());
        assert_eq!(row.last_timestamp_millis, 0);
    }

    #[tokio::test]
    async fn failed_parent_does_not_stop_the_child_level() {
        let harness = Harness::new();
        // Parent's query fails; child's query succeeds with nothing.
        harness
            .remote
            .push_error(SyncError::fetch_retryable("deadline exceeded"));

        let mut runner = harness.runner(SyncConfig::new());
        runner.register(descriptor("clients"));
        runner.register(descriptor("contracts").with_dependency("clients"));

        let summary = runner.sync_all(&admin()).await.unwrap();
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.outcome("contracts").unwrap().succeeded());
    }

    #[tokio::test]
    async fn cancelled_runner_refuses_to_start() {
        let harness = Harness::new();
        let mut runner = harness.runner(SyncConfig::new());
        runner.register(descriptor("clients"));

        runner.cancel();
        assert!(matches!(
            runner.sync_all(&admin()).await,
            Err(SyncError::Cancelled)
        ));

        runner.reset_cancel();
        assert!(runner.sync_all(&admin()).await.is_ok());
    }

    #[tokio::test]
    async fn sync_entity_by_name() {
        let harness = Harness::new();
        harness.remote.push_response(vec![wire_record(1, 100)]);

        let mut runner = harness.runner(SyncConfig::new());
        runner.register(descriptor("clients"));

        let (pull, _push) = runner.sync_entity(&admin(), "clients").await.unwrap();
        assert_eq!(pull.applied, 1);

        assert!(matches!(
            runner.sync_entity(&admin(), "widgets").await,
            Err(SyncError::UnknownEntity(_))
        ));
    }

    #[tokio::test]
    async fn should_sync_gates_on_global_staleness() {
        let harness = Harness::new();
        let runner = harness.runner(SyncConfig::new());

        // Never synced
        assert!(runner.should_sync().await.unwrap());

        // Fresh cycle
        let now = Utc::now().timestamp_millis();
        harness
            .metadata
            .record_run(SyncCursor::success(GLOBAL_SYNC, SyncDirection::Pull, now, 0, 0, 0))
            .await
            .unwrap();
        assert!(!runner.should_sync().await.unwrap());

        // Stale cycle
        let stale = now - 5 * 60 * 60 * 1000;
        harness
            .metadata
            .record_run(SyncCursor::success(GLOBAL_SYNC, SyncDirection::Pull, stale, 0, 0, 0))
            .await
            .unwrap();
        assert!(runner.should_sync().await.unwrap());
    }

    #[tokio::test]
    async fn retry_reruns_cycles_with_retryable_failures() {
        let harness = Harness::new();
        harness
            .remote
            .push_error(SyncError::fetch_retryable("deadline exceeded"));
        // Second attempt finds an exhausted script and succeeds empty.

        let mut runner = harness.runner(SyncConfig::new().with_retry(
            crate::config::RetryConfig::new(2).with_initial_delay(std::time::Duration::ZERO),
        ));
        runner.register(descriptor("clients"));

        let summary = runner.sync_all_with_retry(&admin()).await.unwrap();
        assert!(summary.succeeded());
        assert_eq!(runner.stats().cycles_failed, 1);
        assert_eq!(runner.stats().cycles_completed, 1);
    }

    #[tokio::test]
    async fn pull_all_and_push_all_run_one_direction() {
        let harness = Harness::new();
        harness.remote.push_response(vec![wire_record(1, 100)]);

        let mut runner = harness.runner(SyncConfig::new());
        runner.register(descriptor("clients"));

        let pulled = runner.pull_all(&admin()).await.unwrap();
        assert_eq!(pulled.records_moved, 1);
        assert!(pulled.outcomes[0].push.is_none());

        let pushed = runner.push_all(&admin()).await.unwrap();
        // The pulled record echoes back up on a first push.
        assert_eq!(pushed.records_moved, 1);
        assert!(pushed.outcomes[0].pull.is_none());
        assert_eq!(harness.remote.writes().len(), 1);
    }
}
