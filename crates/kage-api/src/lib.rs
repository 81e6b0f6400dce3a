//! Vendored Envoy xDS v3 API types.
//!
//! The protobuf modules under [`envoy`] and [`google`] are generated-style
//! prost output for the subset of the Envoy v3 API this control plane speaks:
//! core configuration (addresses, nodes, config sources), the four resource
//! types (Cluster, Listener, RouteConfiguration, ClusterLoadAssignment), the
//! HTTP connection manager and router filters, the discovery messages, and
//! tonic server definitions for the per-resource discovery services
//! (LDS / RDS / EDS / CDS).
//!
//! The files are checked in rather than produced by a build script so the
//! crate builds without the Envoy proto tree or protoc on the path.

include!("generated/mod.rs");

/// Type URL constants for the xDS v3 resource types.
pub mod type_url {
    /// Listener resources (LDS).
    pub const LISTENER: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";
    /// Route configuration resources (RDS).
    pub const ROUTE_CONFIGURATION: &str =
        "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
    /// Cluster resources (CDS).
    pub const CLUSTER: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
    /// Endpoint resources (EDS).
    pub const CLUSTER_LOAD_ASSIGNMENT: &str =
        "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";
    /// The HTTP connection manager network filter.
    pub const HTTP_CONNECTION_MANAGER: &str = "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager";
    /// The terminal router HTTP filter.
    pub const ROUTER: &str =
        "type.googleapis.com/envoy.extensions.filters.http.router.v3.Router";

    /// All resource type URLs served over discovery streams, in the order
    /// Envoy warms them.
    pub const ALL_RESOURCES: [&str; 4] =
        [CLUSTER, CLUSTER_LOAD_ASSIGNMENT, LISTENER, ROUTE_CONFIGURATION];
}

pub use prost::Message;
pub use prost_types::Any;
