//! Server construction and lifecycle.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tonic::transport::Server;
use tracing::info;

use kage_api::envoy::service::cluster::v3::cluster_discovery_service_server::ClusterDiscoveryServiceServer;
use kage_api::envoy::service::endpoint::v3::endpoint_discovery_service_server::EndpointDiscoveryServiceServer;
use kage_api::envoy::service::listener::v3::listener_discovery_service_server::ListenerDiscoveryServiceServer;
use kage_api::envoy::service::route::v3::route_discovery_service_server::RouteDiscoveryServiceServer;
use kage_cache::SnapshotCache;
use kage_core::{Error, Result};

use crate::server::{DiscoveryService, ShutdownSignal, SotwHandler};

/// How long a freshly spawned server gets to fail fast (bad bind
/// address, port in use) before startup is considered successful.
pub const STARTUP_GRACE: Duration = Duration::from_secs(1);

const DEFAULT_PORT: u16 = 8081;

/// The xDS gRPC server: LDS, RDS, EDS, and CDS on one endpoint.
pub struct XdsServer {
    cache: Arc<SnapshotCache>,
    addr: SocketAddr,
}

impl XdsServer {
    /// Start building a server over the given cache.
    pub fn builder(cache: Arc<SnapshotCache>) -> XdsServerBuilder {
        XdsServerBuilder {
            cache,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }

    /// The address the server binds to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until the shutdown signal resolves.
    pub async fn serve(self, shutdown: ShutdownSignal) -> Result<()> {
        let service = DiscoveryService::new(Arc::new(SotwHandler::new(self.cache)));

        info!(addr = %self.addr, "starting xds server");
        Server::builder()
            .add_service(ClusterDiscoveryServiceServer::new(service.clone()))
            .add_service(EndpointDiscoveryServiceServer::new(service.clone()))
            .add_service(ListenerDiscoveryServiceServer::new(service.clone()))
            .add_service(RouteDiscoveryServiceServer::new(service))
            .serve_with_shutdown(self.addr, shutdown.wait())
            .await
            .map_err(|e| Error::internal_from("xds server failed", e))?;

        info!("xds server stopped");
        Ok(())
    }

    /// Spawn the server and give it [`STARTUP_GRACE`] to fail fast.
    ///
    /// A server that dies inside the grace period (port already bound,
    /// bad address) turns into an error here instead of a background
    /// task failure nobody observes.
    pub async fn spawn(self, shutdown: ShutdownSignal) -> Result<JoinHandle<Result<()>>> {
        let addr = self.addr;
        let mut task = tokio::spawn(self.serve(shutdown));

        tokio::select! {
            result = &mut task => Err(match result {
                Ok(Ok(())) => Error::internal(format!("xds server on {addr} exited during startup")),
                Ok(Err(err)) => err,
                Err(join_err) => Error::internal_from("xds server task failed", join_err),
            }),
            _ = tokio::time::sleep(STARTUP_GRACE) => Ok(task),
        }
    }
}

/// Builder for [`XdsServer`].
pub struct XdsServerBuilder {
    cache: Arc<SnapshotCache>,
    bind: IpAddr,
    port: u16,
}

impl XdsServerBuilder {
    /// Address to bind. Defaults to `0.0.0.0`.
    pub fn bind(mut self, bind: IpAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Port to listen on. Defaults to 8081.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Finish the builder.
    pub fn build(self) -> XdsServer {
        XdsServer {
            cache: self.cache,
            addr: SocketAddr::new(self.bind, self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ShutdownController;

    #[test]
    fn test_builder_defaults() {
        let server = XdsServer::builder(Arc::new(SnapshotCache::new())).build();
        assert_eq!(server.addr().to_string(), "0.0.0.0:8081");
    }

    #[tokio::test]
    async fn test_spawn_and_shutdown() {
        let controller = ShutdownController::new();
        let server = XdsServer::builder(Arc::new(SnapshotCache::new()))
            .bind(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(0)
            .build();

        let task = server.spawn(controller.subscribe()).await.unwrap();
        controller.trigger();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_spawn_reports_bind_failure() {
        let controller = ShutdownController::new();
        let cache = Arc::new(SnapshotCache::new());

        let first = XdsServer::builder(Arc::clone(&cache))
            .bind(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(18081)
            .build();
        let task = first.spawn(controller.subscribe()).await.unwrap();

        let second = XdsServer::builder(cache)
            .bind(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(18081)
            .build();
        assert!(second.spawn(controller.subscribe()).await.is_err());

        controller.trigger();
        task.await.unwrap().unwrap();
    }
}
