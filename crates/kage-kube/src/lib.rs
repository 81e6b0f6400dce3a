//! # kage-kube
//!
//! The Kubernetes side of the kage control plane:
//!
//! - [`kinds`] - the closed set of watchable resource kinds
//! - [`informer`] - filtered, batched watch streams with retrying handlers
//! - [`walker`] - ownerReference resolution up to the top pod controller
//! - [`interpose`] - reversible Service selector hijacking
//! - [`bootstrap`] - the per-canary Envoy bootstrap ConfigMap
//! - [`canary`] - declaring and dismantling canaries
//! - [`reconciler`] - pod/service events into Envoy state updates
//! - [`sync`] - cross-replica convergence through snapshot ConfigMaps

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod canary;
pub mod informer;
pub mod interpose;
pub mod kinds;
pub mod reconciler;
pub mod sync;
pub mod walker;

pub use canary::{CanaryConfig, CanaryRequest, CanaryService, CanarySummary};
pub use kinds::WatchKind;
pub use reconciler::Reconciler;
pub use sync::SnapshotSync;
