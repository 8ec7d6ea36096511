//! Process-wide shutdown signal
//!
//! The controller consults this before writing conditions so that errors
//! caused by an in-flight shutdown are not recorded as cluster health.

use tokio::sync::watch;

/// Read side, cloned into everything that needs to observe shutdown
#[derive(Clone, Debug)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Write side, held by whoever handles process signals
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl Shutdown {
    pub fn is_shutting_down(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested or the trigger is dropped
    pub async fn wait(mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_is_observed() {
        let (trigger, shutdown) = shutdown_channel();
        assert!(!shutdown.is_shutting_down());

        let waiter = tokio::spawn(shutdown.clone().wait());
        trigger.trigger();

        waiter.await.unwrap();
        assert!(shutdown.is_shutting_down());
    }

    #[tokio::test]
    async fn test_dropped_trigger_releases_waiters() {
        let (trigger, shutdown) = shutdown_channel();
        drop(trigger);
        shutdown.wait().await;
    }
}
