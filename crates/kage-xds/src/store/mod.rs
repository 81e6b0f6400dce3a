//! Durable persistence of Envoy state, keyed by node id.
//!
//! Stores hand back a [`RevertHandle`] from every save so the caller can
//! restore the previous durable record if a later step of the mutation
//! fails. A handle that is dropped without being invoked commits the
//! save.

mod configmap;
mod memory;

pub use configmap::ConfigMapStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use futures::future::BoxFuture;

use kage_core::Result;

use crate::state::EnvoyState;

type RevertFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Undo token for one [`StateStore::save`].
pub struct RevertHandle {
    revert: Option<RevertFn>,
}

impl RevertHandle {
    /// A handle whose revert restores nothing.
    pub fn noop() -> Self {
        Self { revert: None }
    }

    /// Wrap a revert closure.
    pub fn new<F>(revert: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, Result<()>> + Send + 'static,
    {
        Self {
            revert: Some(Box::new(revert)),
        }
    }

    /// Restore the durable record to its state before the save this
    /// handle came from.
    pub async fn revert(mut self) -> Result<()> {
        match self.revert.take() {
            Some(revert) => revert().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RevertHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevertHandle")
            .field("noop", &self.revert.is_none())
            .finish()
    }
}

/// Durable node-id keyed storage of [`EnvoyState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the record for one node. `NotFound` when absent.
    async fn fetch(&self, node_id: &str) -> Result<EnvoyState>;

    /// Fetch every persisted record.
    async fn fetch_all(&self) -> Result<Vec<EnvoyState>>;

    /// Create or replace the record for `state.node_id`, returning a
    /// handle that restores the prior durable record.
    async fn save(&self, state: &EnvoyState) -> Result<RevertHandle>;

    /// Remove the record for one node. Removing an absent record is not
    /// an error.
    async fn delete(&self, node_id: &str) -> Result<()>;
}
