//! The xDS gRPC server.
//!
//! Exposes the four per-resource SotW discovery services (CDS, EDS, LDS,
//! RDS) over one tonic endpoint. Streams are push-driven: besides
//! answering discovery requests, each stream watches the snapshot cache
//! and sends unsolicited responses when its node's snapshot changes.

mod builder;
mod services;
mod shutdown;
mod sotw;
mod stream;

pub use builder::{XdsServer, XdsServerBuilder};
pub use services::DiscoveryService;
pub use shutdown::{ShutdownController, ShutdownSignal};
pub use sotw::SotwHandler;
pub use stream::StreamContext;
