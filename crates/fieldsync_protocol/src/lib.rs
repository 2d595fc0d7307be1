//! # Fieldsync Protocol
//!
//! The shapes exchanged with the remote document store: records, tenant
//! collection paths, access scopes, and the scope-aware query planner.
//!
//! Everything here is pure data and pure functions. Tenant isolation and
//! scope containment are enforced structurally:
//! - A remote path can only be formed through [`CollectionPath::locate`],
//!   which takes the company id from the current session
//! - A plan's queries partition the session's route scope exactly, so no
//!   query can admit a record outside it
//! - Route-id `in` predicates are chunked at the provider limit of 10

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod path;
mod planner;
mod query;
mod record;
mod scope;

pub use path::CollectionPath;
pub use planner::{QueryPlanner, MAX_IN_CLAUSE};
pub use query::{RecordQuery, ScopeFilter};
pub use record::{EntityRecord, RemoteRecord};
pub use scope::AccessScope;
