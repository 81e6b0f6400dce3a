//! # kage-cache
//!
//! Snapshot cache for per-node Envoy configuration.
//!
//! This crate holds the data structure the xDS discovery services read
//! from:
//!
//! - [`SnapshotCache`] - DashMap-based concurrent cache keyed by node
//! - [`Snapshot`] - immutable bundle of encoded resources for one node
//! - [`Watch`] - subscription system for per-node update notification
//! - [`NodeHash`] - FNV-1a node identifier
//!
//! ## Key Design Decisions
//!
//! - Uses `DashMap` for lock-free concurrent access
//! - All `DashMap` references are dropped before any `.await` to prevent deadlocks
//! - Snapshots are immutable and atomically replaced
//! - Watch notifications are async and non-blocking

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod node;
mod snapshot;
mod stats;
mod watch;

pub use cache::SnapshotCache;
pub use node::NodeHash;
pub use snapshot::{SharedSnapshot, Snapshot, SnapshotBuilder, SnapshotResources};
pub use stats::CacheStats;
pub use watch::{Watch, WatchId, WatchManager};
