//! # kage-xds
//!
//! The xDS side of the kage control plane:
//!
//! - [`EnvoyState`] - the authoritative per-node configuration record
//! - [`MeshConfig`] - the per-canary descriptor binding target and canary
//! - [`factory`] - turns Envoy state into encoded v3 resources and snapshots
//! - [`store`] - durable node-id keyed persistence with revert handles
//! - [`SnapshotClient`] - the single serialization point for state mutation
//! - [`server`] - the gRPC server exposing LDS/RDS/EDS/CDS to Envoy sidecars
//!
//! Ownership rule: the [`SnapshotClient`] is the only writer of Envoy
//! state. Persisted state, in-memory state, and the snapshot cache stay
//! mutually consistent after every successful `set`; a partial failure
//! leaves all three untouched.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod factory;
pub mod mesh;
pub mod server;
pub mod state;
pub mod store;

mod client;

pub use client::SnapshotClient;
pub use mesh::{MeshConfig, MeshSide};
pub use state::{ClusterSpec, EndpointSpec, EnvoyState, ListenerSpec, Protocol, RouteSpec, WeightedTarget};
