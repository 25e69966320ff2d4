//! One-shot broadcast latch.

use parking_lot::Once;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A signal that is set at most once and can be awaited by any number of tasks.
///
/// Clones share the same underlying latch.
#[derive(Clone, Debug)]
pub struct Latch {
    token: CancellationToken,
    once: Arc<Once>,
}

impl Latch {
    /// Create a new, unset latch.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            once: Arc::new(Once::new()),
        }
    }

    /// Set the latch, waking all waiters.
    ///
    /// Returns true only for the call that actually set it.
    pub fn fire(&self) -> bool {
        let mut fired = false;
        self.once.call_once(|| {
            self.token.cancel();
            fired = true;
        });
        fired
    }

    /// Returns true once the latch has been set.
    pub fn is_set(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the latch is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        self.token.cancelled().await
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fires_once() {
        let latch = Latch::new();
        assert!(!latch.is_set());
        assert!(latch.fire());
        assert!(!latch.fire());
        assert!(latch.clone().is_set());
    }

    #[tokio::test]
    async fn test_wakes_all_waiters() {
        let latch = Latch::new();

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let latch = latch.clone();
                tokio::spawn(async move { latch.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(5)).await;
        latch.fire();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter not woken")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_wait_after_fire_returns() {
        let latch = Latch::new();
        latch.fire();
        latch.wait().await;
    }
}
