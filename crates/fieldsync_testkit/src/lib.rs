//! # FieldSync Testkit
//!
//! Test utilities for FieldSync.
//!
//! This crate provides:
//! - A query-evaluating in-memory remote store
//! - Fixtures for a realistic field-operations entity domain
//! - Property-based test generators using proptest
//! - A harness bundling every store fake behind one handle
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fieldsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn pulls_the_seeded_company() {
//!     let fixture = SyncFixture::new();
//!     fixture.remote.seed(&clients_collection("acme"), client_record(1, 3, 100));
//!     // ... drive a runner against fixture.local / fixture.remote
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod remote;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::remote::*;
}

pub use fixtures::*;
pub use generators::*;
pub use remote::*;
