//! # FieldSync Engine
//!
//! Offline-first sync engine for FieldSync.
//!
//! This crate provides:
//! - Pull-then-push sync runs per entity type
//! - Per-entity, per-direction cursor management
//! - Last-writer-wins conflict resolution on a modified timestamp
//! - Route-scoped pulls with provider-limit-aware query planning
//! - Dependency-ordered multi-entity cycles with retry and backoff
//! - Storage and access-control abstractions with in-memory fakes
//!
//! ## Architecture
//!
//! Each entity type runs a **pull-then-push** unit of work:
//! 1. Resolve the session's access scope (admin or assigned routes)
//! 2. Pull remote changes newer than the pull cursor and apply them
//!    locally under last-writer-wins
//! 3. Push local changes newer than the push cursor, oldest first
//!
//! A [`SyncRunner`] schedules those units across entity types so that
//! parents sync before the children that reference them.
//!
//! ## Key Invariants
//!
//! - A failed or cancelled run never advances its cursor
//! - Pulls never cross tenant or scope boundaries
//! - Runs are idempotent: re-applying a batch changes nothing
//! - Conflict resolution is deterministic (highest timestamp wins,
//!   local wins ties)
//! - Entity failures stay inside the entity; cycles report them but
//!   keep going

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod guard;
mod handler;
mod metadata;
mod runner;
mod session;
mod store;

pub use config::{RetryConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use guard::ReferenceGuard;
pub use handler::{EntityDescriptor, ParentReference, PullReport, PushReport, SyncHandler};
pub use metadata::{
    MemoryMetadataStore, MetadataStore, SyncCursor, SyncDirection, GLOBAL_SYNC,
};
pub use runner::{EntityOutcome, RunnerStats, SyncRunner, SyncSummary};
pub use session::{
    AccessScopeResolver, RouteAssignments, SessionContext, StaticAssignments,
};
pub use store::{
    LocalStore, MemoryLocalStore, MockRemoteStore, RemoteStore, DEFAULT_MODIFIED_FIELD,
};
