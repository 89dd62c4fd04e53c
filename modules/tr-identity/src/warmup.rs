//! Cold-start buffering gate (spec.md §4.3). Early `call_start` messages
//! lack real `(sysid, wacn)` and would otherwise create duplicate systems
//! later merged by hand — so non-identity-bearing messages are held until
//! either an identity-bearing message arrives or a bounded timeout elapses.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

type DeferredAction = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

pub struct WarmupGate {
    released: watch::Sender<bool>,
    buffer: Mutex<Vec<DeferredAction>>,
    timeout: Duration,
}

impl WarmupGate {
    /// A warm cache (non-empty at construction) starts already released —
    /// a restart with prior state skips the gate entirely.
    pub fn new(start_released: bool) -> Self {
        Self::with_timeout(start_released, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(start_released: bool, timeout: Duration) -> Self {
        let (released, _) = watch::channel(start_released);
        Self { released, buffer: Mutex::new(Vec::new()), timeout }
    }

    pub fn is_released(&self) -> bool {
        *self.released.borrow()
    }

    /// Called when an identity-bearing message (system registration,
    /// config) arrives. Idempotent.
    pub fn release(&self) {
        let _ = self.released.send(true);
    }

    /// Races the gate's release signal against the bounded timeout,
    /// whichever comes first (spec.md: "either (a)... or (b) a bounded
    /// timeout elapses").
    pub async fn wait(&self) {
        if self.is_released() {
            return;
        }
        let mut rx = self.released.subscribe();
        let deadline = Instant::now() + self.timeout;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    self.release();
                    return;
                }
                changed = rx.changed() => {
                    if changed.is_err() || *rx.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// Buffer a deferred action (processing a non-identity message) while
    /// the gate is held. Callers MUST call [`Self::wait`] first if they
    /// want to avoid buffering past release; this is the low-level
    /// primitive the pipeline's ingest loop composes around.
    pub async fn defer<F>(&self, action: impl FnOnce() -> F + Send + 'static)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.buffer.lock().await.push(Box::new(move || Box::pin(action())));
    }

    /// Drains buffered actions in the order they were deferred, preserving
    /// original ingest order as spec.md §8 invariant 7 requires. Awaited
    /// sequentially, never concurrently, so order survives even though
    /// each action does async work.
    pub async fn drain(&self) {
        let actions = {
            let mut buffer = self.buffer.lock().await;
            std::mem::take(&mut *buffer)
        };
        for action in actions {
            action().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn release_unblocks_wait_before_timeout() {
        let gate = Arc::new(WarmupGate::with_timeout(false, Duration::from_secs(30)));
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.release();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(gate.is_released());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_releases_the_gate_without_an_explicit_release() {
        let gate = WarmupGate::with_timeout(false, Duration::from_millis(100));
        gate.wait().await;
        assert!(gate.is_released());
    }

    #[tokio::test]
    async fn deferred_actions_drain_in_original_order() {
        let gate = WarmupGate::new(false);
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            gate.defer(move || async move { order.lock().unwrap().push(i) }).await;
        }
        gate.drain().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn warm_start_is_already_released() {
        let gate = WarmupGate::new(true);
        assert!(gate.is_released());
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        gate.wait().await;
        gate.defer(move || async move { c.fetch_add(1, Ordering::SeqCst); }).await;
        gate.drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
