//! # Cairn Store
//!
//! In-memory remote content store for Cairn.
//!
//! This crate provides:
//! - A [`RemoteStore`](cairn_sync::RemoteStore) kept entirely in memory
//! - The store's title rules and conflict codes (119, 201)
//! - Failure injection and replication lag for exercising recovery paths
//! - A write log for asserting attempt counts
//!
//! # Architecture
//!
//! Items live per category, keyed by identifier. Titles are unique per
//! category and locale, and optionally across categories. Every request is
//! logged before it is checked, so failed attempts show up in the log too.
//!
//! ```rust,ignore
//! use cairn_store::{MemoryStore, StoreConfig};
//! use cairn_sync::{Category, Push, Snapshot, SyncConfig};
//!
//! let store = MemoryStore::with_config(StoreConfig::default().with_global_titles(true));
//! let config = SyncConfig::new();
//! let results = Push::new(&store, &config).run(&categories, &snapshot).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(not(test), warn(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod config;
mod memory;

pub use config::StoreConfig;
pub use memory::MemoryStore;
