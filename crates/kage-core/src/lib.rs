//! Core types shared across the kage control plane.
//!
//! This crate provides:
//! - [`Error`], the closed error taxonomy used by every component, with
//!   conversions to gRPC status codes and HTTP status codes
//! - [`StateVersion`], the UUID + timestamp version attached to every
//!   Envoy state mutation
//! - The annotation codec ([`codec`]) that maps typed records to and from
//!   flat string maps suitable for Kubernetes annotations
//! - The annotation records themselves ([`annotations`]) and the naming
//!   and label conventions ([`names`])

pub mod annotations;
pub mod codec;
pub mod error;
pub mod names;
pub mod version;

pub use error::{BatchError, Error, ErrorKind, Result};
pub use version::StateVersion;
