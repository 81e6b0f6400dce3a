//! The four per-resource discovery services.
//!
//! One [`DiscoveryService`] implements all of them over a shared
//! [`SotwHandler`]; the only difference between the services is the
//! resource type a stream defaults to. Each stream runs its own task
//! that multiplexes incoming requests with snapshot pushes from the
//! cache watch of its node.

use std::pin::Pin;
use std::sync::Arc;

use futures::future;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info};

use kage_api::envoy::service::cluster::v3::cluster_discovery_service_server::ClusterDiscoveryService;
use kage_api::envoy::service::discovery::v3::{DiscoveryRequest, DiscoveryResponse};
use kage_api::envoy::service::endpoint::v3::endpoint_discovery_service_server::EndpointDiscoveryService;
use kage_api::envoy::service::listener::v3::listener_discovery_service_server::ListenerDiscoveryService;
use kage_api::envoy::service::route::v3::route_discovery_service_server::RouteDiscoveryService;
use kage_api::type_url;
use kage_cache::{Snapshot, Watch};

use crate::server::{SotwHandler, StreamContext};

/// Boxed response stream shared by all four services.
pub type DiscoveryStream =
    Pin<Box<dyn Stream<Item = Result<DiscoveryResponse, Status>> + Send + 'static>>;

/// gRPC front end for LDS, RDS, EDS, and CDS.
#[derive(Clone)]
pub struct DiscoveryService {
    handler: Arc<SotwHandler>,
}

impl DiscoveryService {
    /// Serve discovery from the given handler.
    pub fn new(handler: Arc<SotwHandler>) -> Self {
        Self { handler }
    }

    fn open_stream(
        &self,
        request: Request<Streaming<DiscoveryRequest>>,
        type_url: &'static str,
    ) -> Response<DiscoveryStream> {
        let handler = Arc::clone(&self.handler);
        let inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(run_stream(handler, inbound, tx, type_url));

        Response::new(Box::pin(ReceiverStream::new(rx)))
    }

    fn fetch(
        &self,
        request: Request<DiscoveryRequest>,
        type_url: &'static str,
    ) -> Result<Response<DiscoveryResponse>, Status> {
        let request = request.into_inner();
        let ctx = StreamContext::new(type_url);
        if let Some(node) = &request.node {
            ctx.set_node(&node.id);
        }

        let snapshot = self
            .handler
            .cache()
            .get_snapshot(ctx.node_hash())
            .ok_or_else(|| {
                Status::not_found(format!(
                    "no snapshot for node {}",
                    ctx.node_id().unwrap_or("<wildcard>")
                ))
            })?;
        Ok(Response::new(self.handler.response(
            &snapshot,
            type_url,
            &request.resource_names,
        )))
    }
}

/// Stream task body: answer requests, push snapshot changes.
async fn run_stream(
    handler: Arc<SotwHandler>,
    mut inbound: Streaming<DiscoveryRequest>,
    tx: mpsc::Sender<Result<DiscoveryResponse, Status>>,
    type_url: &'static str,
) {
    let ctx = StreamContext::new(type_url);
    let mut watch: Option<Watch> = None;
    let mut subscribed: Vec<String> = Vec::new();
    let mut last_sent = String::new();

    debug!(stream = ctx.id(), type_url, "discovery stream opened");

    loop {
        tokio::select! {
            message = inbound.next() => match message {
                Some(Ok(request)) => {
                    ctx.record_request();
                    if let Some(node) = &request.node {
                        ctx.set_node(&node.id);
                    }
                    if watch.is_none() && ctx.node_id().is_some() {
                        watch = Some(handler.cache().create_watch(ctx.node_hash()));
                        info!(
                            stream = ctx.id(),
                            node = ctx.node_id().unwrap_or_default(),
                            type_url,
                            "node identified"
                        );
                    }
                    subscribed.clone_from(&request.resource_names);

                    if let Some(response) = handler.process(&ctx, &request) {
                        last_sent.clone_from(&response.version_info);
                        ctx.record_response();
                        if tx.send(Ok(response)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Err(status)) => {
                    debug!(stream = ctx.id(), error = %status, "discovery stream errored");
                    break;
                }
                None => break,
            },
            update = next_update(&mut watch) => {
                let Some(snapshot) = update else {
                    // watch channel closed; stop pushing, keep answering
                    watch = None;
                    continue;
                };
                if snapshot.version() == last_sent {
                    continue;
                }
                let response = handler.response(&snapshot, type_url, &subscribed);
                last_sent.clone_from(&response.version_info);
                ctx.record_response();
                if tx.send(Ok(response)).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(watch) = watch {
        handler.cache().cancel_watch(watch.id());
    }
    debug!(
        stream = ctx.id(),
        node = ctx.node_id().unwrap_or_default(),
        requests = ctx.requests(),
        responses = ctx.responses(),
        "discovery stream closed"
    );
}

async fn next_update(watch: &mut Option<Watch>) -> Option<Arc<Snapshot>> {
    match watch {
        Some(watch) => watch.recv().await,
        None => future::pending().await,
    }
}

#[tonic::async_trait]
impl ListenerDiscoveryService for DiscoveryService {
    type StreamListenersStream = DiscoveryStream;

    async fn stream_listeners(
        &self,
        request: Request<Streaming<DiscoveryRequest>>,
    ) -> Result<Response<Self::StreamListenersStream>, Status> {
        Ok(self.open_stream(request, type_url::LISTENER))
    }

    async fn fetch_listeners(
        &self,
        request: Request<DiscoveryRequest>,
    ) -> Result<Response<DiscoveryResponse>, Status> {
        self.fetch(request, type_url::LISTENER)
    }
}

#[tonic::async_trait]
impl RouteDiscoveryService for DiscoveryService {
    type StreamRoutesStream = DiscoveryStream;

    async fn stream_routes(
        &self,
        request: Request<Streaming<DiscoveryRequest>>,
    ) -> Result<Response<Self::StreamRoutesStream>, Status> {
        Ok(self.open_stream(request, type_url::ROUTE_CONFIGURATION))
    }

    async fn fetch_routes(
        &self,
        request: Request<DiscoveryRequest>,
    ) -> Result<Response<DiscoveryResponse>, Status> {
        self.fetch(request, type_url::ROUTE_CONFIGURATION)
    }
}

#[tonic::async_trait]
impl EndpointDiscoveryService for DiscoveryService {
    type StreamEndpointsStream = DiscoveryStream;

    async fn stream_endpoints(
        &self,
        request: Request<Streaming<DiscoveryRequest>>,
    ) -> Result<Response<Self::StreamEndpointsStream>, Status> {
        Ok(self.open_stream(request, type_url::CLUSTER_LOAD_ASSIGNMENT))
    }

    async fn fetch_endpoints(
        &self,
        request: Request<DiscoveryRequest>,
    ) -> Result<Response<DiscoveryResponse>, Status> {
        self.fetch(request, type_url::CLUSTER_LOAD_ASSIGNMENT)
    }
}

#[tonic::async_trait]
impl ClusterDiscoveryService for DiscoveryService {
    type StreamClustersStream = DiscoveryStream;

    async fn stream_clusters(
        &self,
        request: Request<Streaming<DiscoveryRequest>>,
    ) -> Result<Response<Self::StreamClustersStream>, Status> {
        Ok(self.open_stream(request, type_url::CLUSTER))
    }

    async fn fetch_clusters(
        &self,
        request: Request<DiscoveryRequest>,
    ) -> Result<Response<DiscoveryResponse>, Status> {
        self.fetch(request, type_url::CLUSTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kage_cache::{NodeHash, SnapshotCache};
    use prost_types::Any;

    fn service_with_snapshot(node_id: &str, version: &str) -> DiscoveryService {
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
        DiscoveryService::new(Arc::new(SotwHandler::new(cache)))
    }

    fn fetch_request(node_id: &str) -> Request<DiscoveryRequest> {
        Request::new(DiscoveryRequest {
            version_info: String::new(),
            node: Some(kage_api::envoy::config::core::v3::Node {
                id: node_id.to_string(),
                ..Default::default()
            }),
            resource_names: vec![],
            type_url: type_url::CLUSTER.to_string(),
            response_nonce: String::new(),
            error_detail: None,
        })
    }

    #[tokio::test]
    async fn test_fetch_known_node() {
        let service = service_with_snapshot("n1", "v1");
        let response = service
            .fetch_clusters(fetch_request("n1"))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.version_info, "v1");
        assert_eq!(response.resources.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_unknown_node() {
        let service = service_with_snapshot("n1", "v1");
        let status = service
            .fetch_clusters(fetch_request("missing"))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }
}
