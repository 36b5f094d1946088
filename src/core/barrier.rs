//! # Readiness barriers between components.
//!
//! A [`ReadySignal`] is a one-shot, cloneable latch: one component fulfils it
//! after its Configure phase, others await it before their own. Waiting is
//! cancellable; a barrier that is never fulfilled (its owner failed) releases
//! its waiters only through cancellation.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::ComponentError;

/// One-shot readiness latch.
#[derive(Clone)]
pub struct ReadySignal {
    name: Arc<str>,
    tx: Arc<watch::Sender<bool>>,
}

impl ReadySignal {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            name: name.into(),
            tx: Arc::new(tx),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Marks the barrier ready and wakes every waiter. Idempotent.
    pub fn fulfill(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once fulfilled; `Canceled` if `token` fires first.
    pub async fn wait(&self, token: &CancellationToken) -> Result<(), ComponentError> {
        let mut rx = self.tx.subscribe();
        tokio::select! {
            ready = rx.wait_for(|ready| *ready) => ready.map(drop).map_err(|_| ComponentError::Canceled),
            _ = token.cancelled() => Err(ComponentError::Canceled),
        }
    }
}

impl fmt::Debug for ReadySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadySignal")
            .field("name", &self.name)
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn waiters_resume_after_fulfill() {
        let signal = ReadySignal::new("monitor");
        let token = CancellationToken::new();

        let waiter = {
            let (signal, token) = (signal.clone(), token.clone());
            tokio::spawn(async move { signal.wait(&token).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        signal.fulfill();
        waiter.await.unwrap().unwrap();
        assert!(signal.is_ready());
    }

    #[tokio::test]
    async fn already_fulfilled_resolves_immediately() {
        let signal = ReadySignal::new("monitor");
        signal.fulfill();
        signal.fulfill();
        signal.wait(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_releases_waiters() {
        let signal = ReadySignal::new("monitor");
        let token = CancellationToken::new();
        let stopper = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            stopper.cancel();
        });

        let err = signal.wait(&token).await.unwrap_err();
        assert!(err.is_canceled());
        assert!(!signal.is_ready());
    }
}
