//! Per-stream bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use kage_cache::NodeHash;

/// Identity and counters for one discovery stream.
///
/// The node identity arrives on the first request of the stream (Envoy
/// omits it afterwards when `set_node_on_first_message_only` is on) and
/// is pinned for the stream's lifetime.
#[derive(Debug)]
pub struct StreamContext {
    id: u64,
    type_url: &'static str,
    node_id: OnceLock<String>,
    requests: AtomicU64,
    responses: AtomicU64,
}

impl StreamContext {
    /// Open a context for a stream serving one resource type.
    pub fn new(type_url: &'static str) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            type_url,
            node_id: OnceLock::new(),
            requests: AtomicU64::new(0),
            responses: AtomicU64::new(0),
        }
    }

    /// Stream identifier, unique per process.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The resource type this stream serves.
    #[inline]
    pub fn type_url(&self) -> &'static str {
        self.type_url
    }

    /// Pin the node identity. Later calls with a different id are
    /// ignored; the first one wins.
    pub fn set_node(&self, node_id: &str) {
        if !node_id.is_empty() {
            let _ = self.node_id.set(node_id.to_string());
        }
    }

    /// The pinned node identity, if any request carried one yet.
    pub fn node_id(&self) -> Option<&str> {
        self.node_id.get().map(String::as_str)
    }

    /// Cache key for this stream's node; wildcard until identified.
    pub fn node_hash(&self) -> NodeHash {
        match self.node_id() {
            Some(id) => NodeHash::from_id(id),
            None => NodeHash::wildcard(),
        }
    }

    /// Count one received request.
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one sent response.
    pub fn record_response(&self) {
        self.responses.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests received on this stream.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Responses sent on this stream.
    pub fn responses(&self) -> u64 {
        self.responses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_ids_unique() {
        let a = StreamContext::new("type-a");
        let b = StreamContext::new("type-a");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_first_node_wins() {
        let ctx = StreamContext::new("type-a");
        assert!(ctx.node_id().is_none());
        assert!(ctx.node_hash().is_wildcard());

        ctx.set_node("");
        assert!(ctx.node_id().is_none());

        ctx.set_node("kage-ns1-nginx");
        ctx.set_node("kage-ns1-other");
        assert_eq!(ctx.node_id(), Some("kage-ns1-nginx"));
        assert_eq!(ctx.node_hash(), NodeHash::from_id("kage-ns1-nginx"));
    }

    #[test]
    fn test_counters() {
        let ctx = StreamContext::new("type-a");
        ctx.record_request();
        ctx.record_request();
        ctx.record_response();
        assert_eq!(ctx.requests(), 2);
        assert_eq!(ctx.responses(), 1);
    }
}
