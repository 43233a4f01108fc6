use tokio::sync::watch;
use tracing::{info, warn};

/// Owner side of the cancellation flag observed by long waits.
pub struct ShutdownCoordinator {
    sender: watch::Sender<bool>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self { sender }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: Some(self.sender.subscribe()),
        }
    }

    pub fn trigger(&self) {
        // send_replace does not fail when no receiver is alive
        self.sender.send_replace(true);
    }

    /// Install a Ctrl-C handler that flips the flag.
    ///
    /// The provisioner stops before its next step; a second Ctrl-C exits
    /// the process immediately with status 130. State is never rolled back.
    pub fn install_signal_handlers(&self) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for interrupt signal: {}", e);
                return;
            }
            warn!("Interrupt received, stopping before the next step");
            sender.send_replace(true);

            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Second interrupt received, exiting");
                std::process::exit(130);
            }
        });
        info!("Installed interrupt handler");
    }
}

/// Cheap, cloneable view of the cancellation flag.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    receiver: Option<watch::Receiver<bool>>,
}

impl ShutdownSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self { receiver: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let Some(receiver) = &self.receiver else {
            return std::future::pending().await;
        };

        let mut receiver = receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                // Coordinator dropped without cancelling
                return std::future::pending().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.signal();
        assert!(!signal.is_cancelled());

        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });

        coordinator.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_signal_does_not_fire() {
        let signal = ShutdownSignal::never();
        let result = tokio::time::timeout(Duration::from_secs(60), signal.cancelled()).await;

        assert!(result.is_err());
        assert!(!signal.is_cancelled());
    }
}
