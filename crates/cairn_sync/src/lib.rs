//! # Cairn Sync
//!
//! Reconciliation engine converging a remote content store and a local
//! snapshot.
//!
//! This crate provides:
//! - Merge planning of keyed collections, flat and folder-shaped
//! - Bounded recovery from remote write conflicts
//! - Tracking of forward references with one corrective pass
//! - Concurrent, fail-fast execution of plans with deletion strategies
//! - Push, preview, pull and clear runs over a [`RemoteStore`]
//!
//! ## Architecture
//!
//! A push lists every category remotely, then for each category in order:
//! 1. Plan the local items against the remote ones
//! 2. Write creates, updates and removals through the conflict policy
//! 3. Record assigned identifiers for link resolution
//!
//! Once all categories are written, items whose links could not be resolved
//! are rewritten exactly once.
//!
//! ## Key Invariants
//!
//! - Every key of a plan lands in exactly one bucket
//! - Categories are processed strictly in order
//! - Conflict recovery makes a bounded number of attempts
//! - The corrective pass never cascades

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clear;
mod config;
mod error;
mod hierarchy;
mod item;
mod link;
mod plan;
mod preview;
mod processor;
mod progress;
mod pull;
mod push;
mod references;
mod remote;
mod results;
mod retry;
mod store;
mod transfer;

pub use clear::Clear;
pub use config::{DeletionStrategy, InclusionFilter, SyncConfig};
pub use error::{ConflictKind, SyncError, SyncResult, CODE_ALREADY_EXISTS, CODE_INVALID_DATA};
pub use hierarchy::{is_included_transitively, plan_folders, PATH_DELIMITER};
pub use item::{collection, Category, CategoryKind, Collection, Item, ItemId, LocaleVersion, Snapshot};
pub use link::{
    item_path, link, prune_links, references, remote_ref, resolve_links, split_path,
    unresolve_links, IdIndex, LinkResolver, LINK_KEY, REF_KEY,
};
pub use plan::{plan, plan_filtered, MergePlan, PlanSummary, UpdatePair};
pub use preview::Preview;
pub use processor::{TransferOps, TransferProcessor};
pub use progress::{ItemReporter, Notices, Notifier, NullProgress, ProgressSink, TracingNotifier};
pub use pull::{Pull, SnapshotBuffer, SnapshotWriter};
pub use push::{Push, REFERENCES_LABEL};
pub use references::{MissedEntries, ReferenceTracker, SealedReferences, SourceScope, UnresolvedReference};
pub use results::{CategoryResults, PushResults, TransferResults, TransferSummary};
pub use retry::{disambiguated_title, ConflictRetry, WriteTarget};
pub use store::{display_name, Draft, Locale, RemoteStore};
pub use transfer::{LocaleRegistry, StoreTransfer};

pub use cairn_codec::{Comparator, Value};
