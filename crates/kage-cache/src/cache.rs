//! The snapshot cache.
//!
//! Snapshots are keyed by [`NodeHash`] in a `DashMap` so discovery
//! streams read without a global lock while the store client replaces
//! entries atomically.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::node::NodeHash;
use crate::snapshot::Snapshot;
use crate::stats::CacheStats;
use crate::watch::{Watch, WatchId, WatchManager};

/// Concurrent snapshot cache.
///
/// Single-writer through the store client, many-reader from the xDS
/// streams. All `DashMap` references are dropped before any await point
/// so no shard lock is ever held across suspension.
#[derive(Debug)]
pub struct SnapshotCache {
    snapshots: DashMap<NodeHash, Arc<Snapshot>>,
    watches: WatchManager,
    stats: CacheStats,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    /// Create a new cache with default settings.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a new cache with a specific initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshots: DashMap::with_capacity(capacity),
            watches: WatchManager::new(),
            stats: CacheStats::new(),
        }
    }

    /// Get the snapshot for a node.
    pub fn get_snapshot(&self, node: NodeHash) -> Option<Arc<Snapshot>> {
        // The DashMap Ref holds a shard lock; clone the Arc and drop it
        // immediately.
        let result = self.snapshots.get(&node).map(|r| Arc::clone(&r));

        if result.is_some() {
            self.stats.record_hit();
            trace!(node = %node, "cache hit");
        } else {
            self.stats.record_miss();
            trace!(node = %node, "cache miss");
        }

        result
    }

    /// Install a snapshot for a node, notifying its watches.
    pub fn set_snapshot(&self, node: NodeHash, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);

        self.snapshots.insert(node, Arc::clone(&snapshot));
        self.stats.record_set();

        debug!(
            node = %node,
            version = %snapshot.version(),
            resources = snapshot.total_resources(),
            "set snapshot"
        );

        // Notify watches (no DashMap lock held)
        self.watches.notify(node, snapshot);
    }

    /// Remove the snapshot for a node.
    pub fn clear_snapshot(&self, node: NodeHash) {
        if self.snapshots.remove(&node).is_some() {
            self.stats.record_clear();
            debug!(node = %node, "cleared snapshot");
        }
    }

    /// Number of cached snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// True when a snapshot exists for the node.
    pub fn has_snapshot(&self, node: NodeHash) -> bool {
        self.snapshots.contains_key(&node)
    }

    /// All node hashes in the cache.
    pub fn nodes(&self) -> Vec<NodeHash> {
        self.snapshots.iter().map(|r| *r.key()).collect()
    }

    /// Create a watch for a node.
    ///
    /// The watch receives updates when the node's snapshot changes. If a
    /// snapshot already exists the caller should check `get_snapshot`
    /// first.
    #[inline]
    pub fn create_watch(&self, node: NodeHash) -> Watch {
        self.watches.create_watch(node)
    }

    /// Cancel a watch.
    #[inline]
    pub fn cancel_watch(&self, watch_id: WatchId) {
        self.watches.cancel_watch(watch_id)
    }

    /// Cache statistics.
    #[inline]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn cache_basic_operations() {
        let cache = SnapshotCache::new();
        let node = NodeHash::from_id("kage-ns1-nginx");

        assert!(cache.get_snapshot(node).is_none());
        assert_eq!(cache.snapshot_count(), 0);

        cache.set_snapshot(node, Snapshot::builder().version("v1").build());
        assert!(cache.has_snapshot(node));
        assert_eq!(cache.snapshot_count(), 1);
        assert_eq!(cache.get_snapshot(node).unwrap().version(), "v1");

        cache.clear_snapshot(node);
        assert!(!cache.has_snapshot(node));
        assert_eq!(cache.snapshot_count(), 0);
    }

    #[test]
    fn cache_stats_tracking() {
        let cache = SnapshotCache::new();
        let node = NodeHash::from_id("kage-ns1-nginx");

        cache.get_snapshot(node);
        assert_eq!(cache.stats().snapshot_misses(), 1);

        cache.set_snapshot(node, Snapshot::builder().version("v1").build());
        assert_eq!(cache.stats().snapshots_set(), 1);

        cache.get_snapshot(node);
        assert_eq!(cache.stats().snapshot_hits(), 1);
    }

    #[test]
    fn cache_snapshot_update_replaces() {
        let cache = SnapshotCache::new();
        let node = NodeHash::from_id("kage-ns1-nginx");

        cache.set_snapshot(node, Snapshot::builder().version("v1").build());
        cache.set_snapshot(node, Snapshot::builder().version("v2").build());

        assert_eq!(cache.get_snapshot(node).unwrap().version(), "v2");
        assert_eq!(cache.snapshot_count(), 1);
    }

    #[tokio::test]
    async fn cache_watch_notification() {
        let cache = SnapshotCache::new();
        let node = NodeHash::from_id("kage-ns1-nginx");

        let mut watch = cache.create_watch(node);
        cache.set_snapshot(node, Snapshot::builder().version("v1").build());

        let snapshot = watch.recv().await.unwrap();
        assert_eq!(snapshot.version(), "v1");
    }

    #[tokio::test]
    async fn cache_multiple_watches_same_node() {
        let cache = SnapshotCache::new();
        let node = NodeHash::from_id("kage-ns1-nginx");

        let mut watch1 = cache.create_watch(node);
        let mut watch2 = cache.create_watch(node);

        cache.set_snapshot(node, Snapshot::builder().version("v1").build());

        assert_eq!(watch1.recv().await.unwrap().version(), "v1");
        assert_eq!(watch2.recv().await.unwrap().version(), "v1");
    }

    #[test]
    fn cache_concurrent_reads() {
        let cache = Arc::new(SnapshotCache::new());
        let node = NodeHash::from_id("kage-ns1-nginx");
        cache.set_snapshot(node, Snapshot::builder().version("v1").build());

        let read_count = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            let count = Arc::clone(&read_count);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    if cache.get_snapshot(node).is_some() {
                        count.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().expect("thread panicked");
        }

        assert_eq!(read_count.load(Ordering::Relaxed), 1000);
    }

    #[test]
    fn cache_concurrent_writes_distinct_nodes() {
        let cache = Arc::new(SnapshotCache::new());
        let mut handles = vec![];

        for i in 0..10 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let node = NodeHash::from_id(&format!("node-{i}-{j}"));
                    cache.set_snapshot(
                        node,
                        Snapshot::builder().version(format!("v{j}")).build(),
                    );
                }
            }));
        }

        for handle in handles {
            handle.join().expect("thread panicked");
        }

        assert_eq!(cache.snapshot_count(), 1000);
    }

    #[test]
    fn cache_clear_nonexistent_node() {
        let cache = SnapshotCache::new();
        cache.clear_snapshot(NodeHash::from_id("nonexistent"));
        assert_eq!(cache.snapshot_count(), 0);
        assert_eq!(cache.stats().snapshots_cleared(), 0);
    }
}
