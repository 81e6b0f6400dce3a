//! State-of-the-world request handling.
//!
//! One handler instance is shared by all four discovery services. It
//! owns the ACK/NACK protocol: a request carrying a `response_nonce`
//! refers to an earlier response, and is an ACK when `error_detail` is
//! empty and a NACK otherwise. Neither produces a new response on its
//! own; new responses come from version mismatches and snapshot pushes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use kage_api::envoy::config::core::v3::ControlPlane;
use kage_api::envoy::service::discovery::v3::{DiscoveryRequest, DiscoveryResponse};
use kage_cache::{Snapshot, SnapshotCache};

const CONTROL_PLANE_ID: &str = "kage";

/// Shared SotW protocol handler.
#[derive(Debug)]
pub struct SotwHandler {
    cache: Arc<SnapshotCache>,
    nonce_counter: AtomicU64,
}

impl SotwHandler {
    /// Create a handler over the snapshot cache.
    pub fn new(cache: Arc<SnapshotCache>) -> Self {
        Self {
            cache,
            nonce_counter: AtomicU64::new(0),
        }
    }

    /// The cache discovery streams watch.
    #[inline]
    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Handle one discovery request from a stream.
    ///
    /// Returns `None` when the client is up to date (ACK), when it
    /// rejected the last response (NACK), or when no snapshot exists yet
    /// for its node; the stream then waits for the next snapshot push.
    pub fn process(
        &self,
        ctx: &super::StreamContext,
        request: &DiscoveryRequest,
    ) -> Option<DiscoveryResponse> {
        let type_url = if request.type_url.is_empty() {
            ctx.type_url()
        } else {
            request.type_url.as_str()
        };

        if !request.response_nonce.is_empty() {
            if let Some(detail) = &request.error_detail {
                warn!(
                    stream = ctx.id(),
                    node = ctx.node_id().unwrap_or_default(),
                    type_url,
                    version = %request.version_info,
                    code = detail.code,
                    message = %detail.message,
                    "client rejected configuration"
                );
                return None;
            }
        }

        let snapshot = self.cache.get_snapshot(ctx.node_hash())?;
        if request.version_info == snapshot.version() {
            if !request.response_nonce.is_empty() {
                debug!(
                    stream = ctx.id(),
                    node = ctx.node_id().unwrap_or_default(),
                    type_url,
                    version = %request.version_info,
                    "client acknowledged configuration"
                );
            }
            return None;
        }

        Some(self.response(&snapshot, type_url, &request.resource_names))
    }

    /// Build a response for one resource type out of a snapshot.
    ///
    /// Empty `names` is a wildcard subscription. A type the snapshot
    /// does not carry yields an empty resource list, telling the client
    /// everything of that type is gone.
    pub fn response(
        &self,
        snapshot: &Snapshot,
        type_url: &str,
        names: &[String],
    ) -> DiscoveryResponse {
        let resources = snapshot
            .resources(type_url)
            .map(|r| r.filtered(names))
            .unwrap_or_default();

        DiscoveryResponse {
            version_info: snapshot.version().to_string(),
            resources,
            canary: false,
            type_url: type_url.to_string(),
            nonce: self.next_nonce(),
            control_plane: Some(ControlPlane {
                identifier: CONTROL_PLANE_ID.to_string(),
            }),
        }
    }

    /// Nonces are unique per handler: wall clock millis plus a counter,
    /// both hex.
    fn next_nonce(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let count = self.nonce_counter.fetch_add(1, Ordering::Relaxed);
        format!("{millis:x}-{count:x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::StreamContext;
    use kage_api::type_url;
    use kage_cache::NodeHash;
    use prost_types::Any;

    fn handler_with_snapshot(node_id: &str, version: &str) -> SotwHandler {
        let cache = Arc::new(SnapshotCache::new());
        let snapshot = Snapshot::builder()
            .version(version)
            .resources(
                type_url::CLUSTER,
                vec![(
                    "c1".to_string(),
                    Any {
                        type_url: type_url::CLUSTER.to_string(),
                        value: vec![],
                    },
                )],
            )
            .build();
        cache.set_snapshot(NodeHash::from_id(node_id), snapshot);
        SotwHandler::new(cache)
    }

    fn cds_context(node_id: &str) -> StreamContext {
        let ctx = StreamContext::new(type_url::CLUSTER);
        ctx.set_node(node_id);
        ctx
    }

    fn request(version: &str, nonce: &str) -> DiscoveryRequest {
        DiscoveryRequest {
            version_info: version.to_string(),
            node: None,
            resource_names: vec![],
            type_url: type_url::CLUSTER.to_string(),
            response_nonce: nonce.to_string(),
            error_detail: None,
        }
    }

    #[test]
    fn test_initial_request_gets_response() {
        let handler = handler_with_snapshot("n1", "v1");
        let ctx = cds_context("n1");

        let response = handler.process(&ctx, &request("", "")).unwrap();
        assert_eq!(response.version_info, "v1");
        assert_eq!(response.type_url, type_url::CLUSTER);
        assert_eq!(response.resources.len(), 1);
        assert!(!response.nonce.is_empty());
    }

    #[test]
    fn test_ack_produces_no_response() {
        let handler = handler_with_snapshot("n1", "v1");
        let ctx = cds_context("n1");

        let response = handler.process(&ctx, &request("", "")).unwrap();
        let ack = request("v1", &response.nonce);
        assert!(handler.process(&ctx, &ack).is_none());
    }

    #[test]
    fn test_nack_produces_no_response() {
        let handler = handler_with_snapshot("n1", "v1");
        let ctx = cds_context("n1");

        let response = handler.process(&ctx, &request("", "")).unwrap();
        let mut nack = request("", &response.nonce);
        nack.error_detail = Some(kage_api::google::rpc::Status {
            code: 3,
            message: "bad listener".to_string(),
            details: vec![],
        });
        assert!(handler.process(&ctx, &nack).is_none());
    }

    #[test]
    fn test_stale_version_gets_new_response() {
        let handler = handler_with_snapshot("n1", "v2");
        let ctx = cds_context("n1");

        let response = handler.process(&ctx, &request("v1", "old-nonce")).unwrap();
        assert_eq!(response.version_info, "v2");
    }

    #[test]
    fn test_unknown_node_waits() {
        let handler = handler_with_snapshot("n1", "v1");
        let ctx = cds_context("unknown");
        assert!(handler.process(&ctx, &request("", "")).is_none());
    }

    #[test]
    fn test_named_subscription_filters() {
        let handler = handler_with_snapshot("n1", "v1");
        let ctx = cds_context("n1");

        let mut req = request("", "");
        req.resource_names = vec!["missing".to_string()];
        let response = handler.process(&ctx, &req).unwrap();
        assert!(response.resources.is_empty());
    }

    #[test]
    fn test_nonces_unique() {
        let handler = handler_with_snapshot("n1", "v1");
        let a = handler.next_nonce();
        let b = handler.next_nonce();
        assert_ne!(a, b);
    }
}
