//! Cooperative shutdown for the gRPC server task.

use tokio::sync::watch;
use tracing::info;

/// Broadcasts a one-way shutdown signal to every subscriber.
#[derive(Debug)]
pub struct ShutdownController {
    sender: watch::Sender<bool>,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// Create a controller with no signal raised.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// A signal handle that resolves once [`trigger`](Self::trigger) runs.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }

    /// Raise the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        info!("shutdown triggered");
        let _ = self.sender.send(true);
    }
}

/// One subscriber's view of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve when shutdown is triggered. Also resolves when the
    /// controller is dropped.
    pub async fn wait(mut self) {
        let _ = self.receiver.wait_for(|triggered| *triggered).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_releases_subscribers() {
        let controller = ShutdownController::new();
        let signal = controller.subscribe();

        let waiter = tokio::spawn(signal.wait());
        controller.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_controller_releases_subscribers() {
        let controller = ShutdownController::new();
        let signal = controller.subscribe();
        drop(controller);

        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .unwrap();
    }
}
