//! Per-entity-type sync execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use fieldsync_codec::{EntityCodec, EntitySchema};
use fieldsync_protocol::{CollectionPath, EntityRecord, QueryPlanner, RemoteRecord};

use crate::error::{SyncError, SyncResult};
use crate::guard::ReferenceGuard;
use crate::metadata::{MetadataStore, SyncCursor, SyncDirection};
use crate::session::{AccessScopeResolver, RouteAssignments, SessionContext};
use crate::store::{LocalStore, RemoteStore};

/// A foreign-key style reference from a child entity to a parent entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentReference {
    /// The child field carrying the parent's id.
    pub field: String,
    /// The parent entity type.
    pub parent: String,
}

/// Everything the engine needs to know about one syncable entity type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// Entity type name; also the collection segment on the remote side.
    pub name: String,
    /// Declared field kinds for the codec.
    pub schema: EntitySchema,
    /// Field carrying the last-modified instant.
    pub modified_field: String,
    /// Field carrying the route id, for route-scoped entity types.
    pub scope_field: Option<String>,
    /// Parent references checked before a pulled child is applied.
    pub references: Vec<ParentReference>,
    /// Entity types that must sync before this one.
    pub depends_on: Vec<String>,
    /// Whether an empty route scope may fall back to an unfiltered pull
    /// (first install, before assignments have landed).
    pub allow_bootstrap: bool,
}

impl EntityDescriptor {
    /// Creates a descriptor with the default last-modified field
    /// (`lastModified`) and no scoping, references, or dependencies.
    pub fn new(name: &str, schema: EntitySchema) -> Self {
        Self {
            name: name.to_string(),
            schema,
            modified_field: "lastModified".to_string(),
            scope_field: None,
            references: Vec::new(),
            depends_on: Vec::new(),
            allow_bootstrap: false,
        }
    }

    /// Sets the last-modified field.
    pub fn with_modified_field(mut self, field: &str) -> Self {
        self.modified_field = field.to_string();
        self
    }

    /// Makes this entity type route-scoped through the given field.
    pub fn with_scope_field(mut self, field: &str) -> Self {
        self.scope_field = Some(field.to_string());
        self
    }

    /// Declares a parent reference. The parent is also added as a sync
    /// dependency so it pulls first.
    pub fn with_reference(mut self, field: &str, parent: &str) -> Self {
        self.references.push(ParentReference {
            field: field.to_string(),
            parent: parent.to_string(),
        });
        if !self.depends_on.iter().any(|d| d == parent) {
            self.depends_on.push(parent.to_string());
        }
        self
    }

    /// Declares an ordering dependency without a field-level reference.
    pub fn with_dependency(mut self, parent: &str) -> Self {
        if !self.depends_on.iter().any(|d| d == parent) {
            self.depends_on.push(parent.to_string());
        }
        self
    }

    /// Opts this entity type into route bootstrap.
    pub fn with_bootstrap(mut self) -> Self {
        self.allow_bootstrap = true;
        self
    }
}

/// Outcome of one pull run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Records upserted locally.
    pub applied: u64,
    /// Stale remote records discarded by last-writer-wins.
    pub discarded: u64,
    /// Records skipped because they lack a usable last-modified instant.
    pub decode_skips: u64,
    /// Child records skipped because a parent row is missing locally.
    pub reference_skips: u64,
    /// Approximate bytes fetched and applied.
    pub bytes: u64,
    /// Cursor after the run.
    pub cursor: i64,
    /// Wall-clock duration, millis.
    pub duration_ms: u64,
}

/// Outcome of one push run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Records written to the remote collection.
    pub pushed: u64,
    /// Local records skipped for lacking a usable last-modified instant.
    pub skipped: u64,
    /// Approximate bytes written.
    pub bytes: u64,
    /// Cursor after the run.
    pub cursor: i64,
    /// Wall-clock duration, millis.
    pub duration_ms: u64,
}

#[derive(Default)]
struct RunStats {
    moved: u64,
    discarded: u64,
    decode_skips: u64,
    reference_skips: u64,
    bytes: u64,
    max_modified: i64,
}

/// Executes pull and push runs for one entity type.
///
/// Runs of the same direction are serialized; a pull and a push of the
/// same entity type may interleave with each other and with other entity
/// types. All failure handling follows one rule: a failed run records
/// its partial statistics and error but never advances the cursor, and a
/// cancelled run stops without touching metadata at all.
pub struct SyncHandler {
    descriptor: EntityDescriptor,
    codec: EntityCodec,
    planner: QueryPlanner,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    metadata: Arc<dyn MetadataStore>,
    resolver: AccessScopeResolver,
    guard: ReferenceGuard,
    cancelled: Arc<AtomicBool>,
    pull_lock: Mutex<()>,
    push_lock: Mutex<()>,
}

impl SyncHandler {
    /// Creates a handler for one entity type.
    pub fn new(
        descriptor: EntityDescriptor,
        planner: QueryPlanner,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        metadata: Arc<dyn MetadataStore>,
        assignments: Arc<dyn RouteAssignments>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        let codec = EntityCodec::new(descriptor.schema.clone());
        let guard = ReferenceGuard::new(local.clone());
        Self {
            descriptor,
            codec,
            planner,
            local,
            remote,
            metadata,
            resolver: AccessScopeResolver::new(assignments),
            guard,
            cancelled,
            pull_lock: Mutex::new(()),
            push_lock: Mutex::new(()),
        }
    }

    /// The entity type this handler syncs.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// The descriptor this handler was built from.
    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// Pull then push, as one unit of work. A failed pull skips the push.
    pub async fn sync(&self, session: &SessionContext) -> SyncResult<(PullReport, PushReport)> {
        let pull = self.pull(session).await?;
        let push = self.push(session).await?;
        Ok((pull, push))
    }

    /// Pull remote changes down into the local store.
    pub async fn pull(&self, session: &SessionContext) -> SyncResult<PullReport> {
        let _serial = self.pull_lock.lock().await;
        let started = Instant::now();
        let entity = self.descriptor.name.as_str();
        let previous = self
            .metadata
            .last_timestamp(entity, SyncDirection::Pull)
            .await?;

        let scope = self.resolver.resolve(session).await;
        if let Some(fault) = scope.fault() {
            let err = SyncError::ScopeResolution(fault.to_string());
            self.record_failure(SyncDirection::Pull, previous, &RunStats::default(), started, &err)
                .await;
            return Err(err);
        }

        let collection = CollectionPath::locate(&session.company_id, entity);
        let queries = self.planner.plan(
            collection,
            self.descriptor.scope_field.as_deref(),
            &scope,
            &self.descriptor.modified_field,
            previous,
            self.descriptor.allow_bootstrap,
        );

        let mut stats = RunStats::default();
        if queries.is_empty() {
            info!(entity, "no routes assigned, nothing to pull");
            return self.finish_pull(previous, stats, started).await;
        }

        debug!(
            entity,
            queries = queries.len(),
            cursor = previous,
            "pulling remote changes"
        );
        for query in &queries {
            self.check_cancelled()?;
            let batch = match self.remote.execute_query(query).await {
                Ok(batch) => batch,
                Err(err) => {
                    warn!(entity, error = %err, "remote fetch failed, aborting remaining chunks");
                    self.record_failure(SyncDirection::Pull, previous, &stats, started, &err)
                        .await;
                    return Err(err);
                }
            };
            for record in &batch {
                self.check_cancelled()?;
                if let Err(err) = self.apply_remote(record, &mut stats).await {
                    self.record_failure(SyncDirection::Pull, previous, &stats, started, &err)
                        .await;
                    return Err(err);
                }
            }
        }

        self.finish_pull(previous, stats, started).await
    }

    /// Push local changes up to the remote collection.
    ///
    /// The change feed is everything modified since the push cursor, sent
    /// oldest first. Push applies no route filtering: whatever the agent
    /// changed locally goes up.
    pub async fn push(&self, session: &SessionContext) -> SyncResult<PushReport> {
        let _serial = self.push_lock.lock().await;
        let started = Instant::now();
        let entity = self.descriptor.name.as_str();
        let previous = self
            .metadata
            .last_timestamp(entity, SyncDirection::Push)
            .await?;

        let mut stats = RunStats::default();
        let pending = match self.local.changed_since(entity, previous).await {
            Ok(pending) => pending,
            Err(err) => {
                self.record_failure(SyncDirection::Push, previous, &stats, started, &err)
                    .await;
                return Err(err);
            }
        };

        let mut skipped = 0u64;
        let mut ordered: Vec<(i64, EntityRecord)> = Vec::with_capacity(pending.len());
        for record in pending {
            match record.last_modified(&self.descriptor.modified_field) {
                Some(modified) => ordered.push((modified, record)),
                None => {
                    skipped += 1;
                    warn!(
                        entity,
                        id = record.id,
                        "local record lacks a usable last-modified instant, not pushed"
                    );
                }
            }
        }
        ordered.sort_by_key(|(modified, record)| (*modified, record.id));

        let collection = CollectionPath::locate(&session.company_id, entity);
        debug!(entity, pending = ordered.len(), cursor = previous, "pushing local changes");
        for (modified, record) in ordered {
            self.check_cancelled()?;
            let wire = RemoteRecord::new(record.id, self.codec.to_wire(&record.fields));
            if let Err(err) = self.remote.write_record(&collection, &wire).await {
                warn!(entity, id = record.id, error = %err, "remote write failed, aborting push");
                self.record_failure(SyncDirection::Push, previous, &stats, started, &err)
                    .await;
                return Err(err);
            }
            stats.moved += 1;
            stats.bytes += wire.approximate_size();
            stats.max_modified = stats.max_modified.max(modified);
        }

        let cursor = if stats.moved > 0 {
            stats.max_modified
        } else {
            previous
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        self.metadata
            .record_run(SyncCursor::success(
                entity,
                SyncDirection::Push,
                cursor,
                stats.moved,
                duration_ms,
                stats.bytes,
            ))
            .await?;
        info!(entity, pushed = stats.moved, skipped, cursor, "push complete");
        Ok(PushReport {
            pushed: stats.moved,
            skipped,
            bytes: stats.bytes,
            cursor,
            duration_ms,
        })
    }

    async fn finish_pull(
        &self,
        previous: i64,
        stats: RunStats,
        started: Instant,
    ) -> SyncResult<PullReport> {
        let entity = self.descriptor.name.as_str();
        let cursor = if stats.moved > 0 {
            stats.max_modified
        } else {
            previous
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        self.metadata
            .record_run(SyncCursor::success(
                entity,
                SyncDirection::Pull,
                cursor,
                stats.moved,
                duration_ms,
                stats.bytes,
            ))
            .await?;
        info!(
            entity,
            applied = stats.moved,
            discarded = stats.discarded,
            decode_skips = stats.decode_skips,
            reference_skips = stats.reference_skips,
            cursor,
            "pull complete"
        );
        Ok(PullReport {
            applied: stats.moved,
            discarded: stats.discarded,
            decode_skips: stats.decode_skips,
            reference_skips: stats.reference_skips,
            bytes: stats.bytes,
            cursor,
            duration_ms,
        })
    }

    /// Decode, validate, and apply one pulled record. Per-record skips
    /// (decode, referential) are counted and swallowed; local storage
    /// failures propagate and abort the run.
    async fn apply_remote(&self, record: &RemoteRecord, stats: &mut RunStats) -> SyncResult<()> {
        let entity = self.descriptor.name.as_str();
        let incoming = EntityRecord::new(record.id, self.codec.from_wire(&record.fields));

        let Some(modified) = incoming.last_modified(&self.descriptor.modified_field) else {
            stats.decode_skips += 1;
            warn!(
                entity,
                id = record.id,
                field = %self.descriptor.modified_field,
                "pulled record lacks a usable last-modified instant, skipped"
            );
            return Ok(());
        };

        for reference in &self.descriptor.references {
            match incoming.reference_id(&reference.field) {
                Some(parent_id) if parent_id > 0 => {
                    if !self.guard.ensure_exists(&reference.parent, parent_id).await? {
                        stats.reference_skips += 1;
                        return Ok(());
                    }
                }
                _ => {}
            }
        }

        if let Some(existing) = self.local.get(entity, record.id).await? {
            if let Some(local_modified) = existing.last_modified(&self.descriptor.modified_field) {
                if modified <= local_modified {
                    stats.discarded += 1;
                    debug!(
                        entity,
                        id = record.id,
                        incoming = modified,
                        local = local_modified,
                        "stale remote record discarded"
                    );
                    return Ok(());
                }
            }
        }

        self.local.upsert(entity, incoming).await?;
        stats.moved += 1;
        stats.bytes += record.approximate_size();
        stats.max_modified = stats.max_modified.max(modified);
        Ok(())
    }

    async fn record_failure(
        &self,
        direction: SyncDirection,
        previous: i64,
        stats: &RunStats,
        started: Instant,
        cause: &SyncError,
    ) {
        let row = SyncCursor::failure(
            self.descriptor.name.as_str(),
            direction,
            previous,
            stats.moved,
            started.elapsed().as_millis() as u64,
            stats.bytes,
            cause.to_string(),
        );
        if let Err(err) = self.metadata.record_run(row).await {
            error!(
                entity = %self.descriptor.name,
                %direction,
                error = %err,
                "failed to record failed run"
            );
        }
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}
