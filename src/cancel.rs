// SPDX-License-Identifier: MIT
// Cooperative cancellation token.
//
// A clonable handle carrying a flag, a fires-once notification, and an
// awaitable resolved on cancellation. Long-running consumers (provider
// streams, the generation loop) poll the flag at natural suspension points
// and release their transport when it is set. There is no thread
// interruption anywhere in the engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Cooperative cancellation handle.
///
/// Cloning produces another handle to the same token. `cancel` is idempotent:
/// the flag latches and the notification fires exactly once.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    flag: AtomicBool,
    tx: watch::Sender<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                tx,
            }),
        }
    }

    /// Request cancellation. Safe to call any number of times; only the
    /// first call changes state or notifies waiters.
    pub fn cancel(&self) {
        if !self.inner.flag.swap(true, Ordering::SeqCst) {
            // send_replace never fails: the sender lives inside the token.
            self.inner.tx.send_replace(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled. Resolves immediately for
    /// subscribers arriving after the fact.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let mut rx = self.inner.tx.subscribe();
        // The sender is owned by `inner`, so `wait_for` can only fail if
        // every handle is gone — in which case nobody observes the result.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        let mut rx = token.inner.tx.subscribe();

        token.cancel();
        assert!(token.is_cancelled());
        assert!(rx.has_changed().unwrap());
        rx.mark_unchanged();

        // Second cancel must not notify again.
        token.cancel();
        assert!(token.is_cancelled());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn cancelled_resolves_for_late_subscriber() {
        let token = CancelToken::new();
        token.cancel();
        // Must resolve immediately even though cancellation already happened.
        token.cancelled().await;
    }

    #[tokio::test]
    async fn cancelled_resolves_for_pending_waiter() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        token.cancel();
        waiter.await.unwrap();
    }

    #[test]
    fn clones_share_state() {
        let a = CancelToken::new();
        let b = a.clone();
        b.cancel();
        assert!(a.is_cancelled());
    }
}
