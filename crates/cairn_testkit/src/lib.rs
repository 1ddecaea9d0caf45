//! # Cairn Testkit
//!
//! Test utilities for Cairn.
//!
//! This crate provides:
//! - Fixtures for items, snapshots and stores
//! - Recording progress and notice sinks
//! - Property-based test generators using proptest
//! - Test logging setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cairn_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn push_creates_pages() {
//!     init_test_logging();
//!     let store = MemoryStore::new();
//!     let snapshot = Snapshot::new().with("pages", [page("Home", "welcome")]);
//!     // ... run a push
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use cairn_store::{MemoryStore, StoreConfig};
    pub use cairn_sync::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
