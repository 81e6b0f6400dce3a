//! Watch system for cache update notifications.
//!
//! Discovery streams subscribe to per-node updates through [`Watch`]
//! handles; the store client's snapshot installs fan out through the
//! [`WatchManager`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::node::NodeHash;
use crate::Snapshot;

/// Unique identifier for a watch subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

impl WatchId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of this watch ID.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

/// A watch subscription for receiving snapshot updates.
///
/// When a snapshot is installed for a node, all active watches for that
/// node receive the new snapshot through their channel.
#[derive(Debug)]
pub struct Watch {
    id: WatchId,
    node_hash: NodeHash,
    receiver: mpsc::Receiver<Arc<Snapshot>>,
}

impl Watch {
    /// Unique identifier for this watch.
    #[inline]
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Node this watch is subscribed to.
    #[inline]
    pub fn node_hash(&self) -> NodeHash {
        self.node_hash
    }

    /// Receive the next snapshot update.
    ///
    /// Returns `None` if the watch has been cancelled.
    pub async fn recv(&mut self) -> Option<Arc<Snapshot>> {
        self.receiver.recv().await
    }

    /// Try to receive a snapshot update without waiting.
    pub fn try_recv(&mut self) -> Result<Arc<Snapshot>, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Sender half of a watch, used internally to push updates.
#[derive(Debug, Clone)]
struct WatchSender {
    id: WatchId,
    sender: mpsc::Sender<Arc<Snapshot>>,
}

impl WatchSender {
    /// Try to send a snapshot update.
    ///
    /// Uses `try_send` to avoid blocking. If the channel is full the
    /// update is dropped; the receiver will get the next one. Returns
    /// `false` when the receiver is gone.
    fn try_send(&self, snapshot: Arc<Snapshot>) -> bool {
        match self.sender.try_send(snapshot) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!(watch_id = %self.id, "watch channel full, skipping update");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Manager for watch subscriptions.
///
/// Uses a `Mutex` internally but operations are fast (no I/O).
#[derive(Debug)]
pub struct WatchManager {
    watches: std::sync::Mutex<HashMap<NodeHash, Vec<WatchSender>>>,
    channel_buffer: usize,
}

impl Default for WatchManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchManager {
    /// Create a new watch manager with default settings.
    pub fn new() -> Self {
        Self::with_buffer_size(16)
    }

    /// Create a new watch manager with a custom channel buffer size.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            watches: std::sync::Mutex::new(HashMap::new()),
            channel_buffer: buffer_size,
        }
    }

    /// Create a new watch for a node.
    pub fn create_watch(&self, node_hash: NodeHash) -> Watch {
        let id = WatchId::next();
        let (sender, receiver) = mpsc::channel(self.channel_buffer);

        {
            let mut watches = self.watches.lock().expect("watch lock poisoned");
            watches
                .entry(node_hash)
                .or_default()
                .push(WatchSender { id, sender });
        }

        debug!(watch_id = %id, node = %node_hash, "created watch");

        Watch {
            id,
            node_hash,
            receiver,
        }
    }

    /// Cancel a watch subscription.
    pub fn cancel_watch(&self, watch_id: WatchId) {
        let mut watches = self.watches.lock().expect("watch lock poisoned");

        for senders in watches.values_mut() {
            if let Some(pos) = senders.iter().position(|s| s.id == watch_id) {
                senders.swap_remove(pos);
                debug!(watch_id = %watch_id, "cancelled watch");
                return;
            }
        }

        warn!(watch_id = %watch_id, "attempted to cancel unknown watch");
    }

    /// Notify all watches for a node about a snapshot update.
    ///
    /// Removes any closed watches automatically.
    pub fn notify(&self, node_hash: NodeHash, snapshot: Arc<Snapshot>) {
        // Clone senders while holding the lock briefly
        let senders: Vec<WatchSender> = {
            let watches = self.watches.lock().expect("watch lock poisoned");
            watches.get(&node_hash).cloned().unwrap_or_default()
        };

        if senders.is_empty() {
            return;
        }

        let mut closed_ids = Vec::new();
        for sender in &senders {
            if !sender.try_send(Arc::clone(&snapshot)) {
                closed_ids.push(sender.id);
            }
        }

        if !closed_ids.is_empty() {
            let mut watches = self.watches.lock().expect("watch lock poisoned");
            if let Some(senders) = watches.get_mut(&node_hash) {
                senders.retain(|s| !closed_ids.contains(&s.id));
            }
            debug!(count = closed_ids.len(), "removed closed watches");
        }

        trace!(
            node = %node_hash,
            watch_count = senders.len() - closed_ids.len(),
            "notified watches of snapshot update"
        );
    }

    /// Number of active watches for a node.
    pub fn watch_count(&self, node_hash: NodeHash) -> usize {
        let watches = self.watches.lock().expect("watch lock poisoned");
        watches.get(&node_hash).map(Vec::len).unwrap_or(0)
    }

    /// Total number of active watches across all nodes.
    pub fn total_watch_count(&self) -> usize {
        let watches = self.watches.lock().expect("watch lock poisoned");
        watches.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_id_unique() {
        let id1 = WatchId::next();
        let id2 = WatchId::next();
        assert_ne!(id1, id2);
    }

    #[tokio::test]
    async fn watch_manager_create_and_notify() {
        let manager = WatchManager::new();
        let node = NodeHash::from_id("kage-ns1-nginx");

        let mut watch = manager.create_watch(node);
        assert_eq!(manager.watch_count(node), 1);

        let snapshot = Arc::new(Snapshot::builder().version("v1").build());
        manager.notify(node, snapshot);

        let received = watch.recv().await.unwrap();
        assert_eq!(received.version(), "v1");
    }

    #[test]
    fn watch_manager_cancel() {
        let manager = WatchManager::new();
        let node = NodeHash::from_id("kage-ns1-nginx");

        let watch = manager.create_watch(node);
        assert_eq!(manager.watch_count(node), 1);

        manager.cancel_watch(watch.id());
        assert_eq!(manager.watch_count(node), 0);
    }

    #[test]
    fn watch_manager_drops_closed_watches() {
        let manager = WatchManager::new();
        let node = NodeHash::from_id("kage-ns1-nginx");

        let watch = manager.create_watch(node);
        drop(watch);

        manager.notify(node, Arc::new(Snapshot::builder().version("v1").build()));
        assert_eq!(manager.watch_count(node), 0);
    }
}
