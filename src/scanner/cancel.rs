//! Cooperative cancellation
//!
//! A token is shared by reference between a run and every sub-operation.
//! It flips from live to cancelled exactly once and never resets. Probes
//! check it before each network call and race it against anything that
//! can block.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::ProbeError;

/// Cancellation flag plus the set of tasks waiting on it
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    waiters: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token. Only the first call wakes waiters.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!("cancellation requested");
            self.inner.waiters.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Checkpoint: `Err(Cancelled)` once the token has fired
    pub fn check(&self) -> Result<(), ProbeError> {
        if self.is_cancelled() {
            Err(ProbeError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel()
            // cannot slip between the two.
            let notified = self.inner.waiters.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Run `fut` unless the token fires first. The future is dropped on
    /// cancellation, which aborts in-flight requests.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, ProbeError>
    where
        F: Future<Output = Result<T, ProbeError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ProbeError::Cancelled),
            result = fut => result,
        }
    }

    /// Cancellable sleep used for pacing between steps
    pub async fn sleep(&self, duration: Duration) -> Result<(), ProbeError> {
        self.guard(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
