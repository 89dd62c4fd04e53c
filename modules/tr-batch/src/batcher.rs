//! Generic linger/size-triggered batcher (spec.md §4.5, §5, §8 invariant
//! 8). The bounded channel is the backpressure mechanism: a full staging
//! buffer makes `enqueue` block rather than drop, so a stalled store's
//! drain rate becomes the ingest rate.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const FLUSH_RETRY_ATTEMPTS: u32 = 3;
const FLUSH_RETRY_BACKOFF: Duration = Duration::from_millis(200);

pub struct Batcher<T> {
    tx: mpsc::Sender<T>,
}

impl<T: Clone + Send + 'static> Batcher<T> {
    /// Spawns the background flush loop. `flush` is called with a batch
    /// whenever `max_batch_size` rows accumulate or `max_linger` elapses
    /// since the oldest buffered row, whichever comes first.
    pub fn spawn<F, Fut>(max_batch_size: usize, max_linger: Duration, channel_capacity: usize, flush: F) -> (Self, JoinHandle<()>)
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(channel_capacity);
        let handle = tokio::spawn(run_loop(rx, max_batch_size, max_linger, flush));
        (Self { tx }, handle)
    }

    /// Blocks until there is room in the staging buffer. This is the
    /// backpressure point: a stalled `flush` leaves the channel full and
    /// every caller here waits, which is how the stall reaches the
    /// transport adapter (spec.md §5).
    pub async fn enqueue(&self, item: T) -> anyhow::Result<()> {
        self.tx.send(item).await.map_err(|_| anyhow::anyhow!("batcher flush loop has stopped"))
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

async fn run_loop<T, F, Fut>(mut rx: mpsc::Receiver<T>, max_batch_size: usize, max_linger: Duration, flush: F)
where
    T: Clone,
    F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let mut buffer: Vec<T> = Vec::with_capacity(max_batch_size);
    loop {
        tokio::select! {
            biased;
            item = rx.recv() => {
                match item {
                    Some(item) => {
                        buffer.push(item);
                        if buffer.len() >= max_batch_size {
                            buffer = flush_with_retry(&flush, buffer).await;
                        }
                    }
                    None => {
                        if !buffer.is_empty() {
                            let _ = flush_with_retry(&flush, buffer).await;
                        }
                        return;
                    }
                }
            }
            _ = tokio::time::sleep(max_linger), if !buffer.is_empty() => {
                buffer = flush_with_retry(&flush, buffer).await;
            }
        }
    }
}

/// Retries a bounded number of times; on exhaustion logs and hands the
/// batch back unflushed rather than dropping it, so it stays staged and
/// is retried on the next trigger (spec.md §7: "retry with bounded
/// attempts... on exhaustion, propagate so that backpressure reaches the
/// transport"; spec.md §8 invariant 8: "no messages are lost").
async fn flush_with_retry<T, F, Fut>(flush: &F, batch: Vec<T>) -> Vec<T>
where
    T: Clone,
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match flush(batch.clone()).await {
            Ok(()) => return Vec::new(),
            Err(error) if attempt < FLUSH_RETRY_ATTEMPTS => {
                tracing::warn!(attempt, %error, "batch flush failed, retrying");
                tokio::time::sleep(FLUSH_RETRY_BACKOFF * attempt).await;
            }
            Err(error) => {
                tracing::error!(attempt, %error, "batch flush exhausted retries; keeping batch staged");
                return batch;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn flushes_on_max_batch_size() {
        let flushed = Arc::new(AtomicUsize::new(0));
        let f = flushed.clone();
        let (batcher, handle) = Batcher::spawn(3, Duration::from_secs(30), 16, move |batch: Vec<i32>| {
            let f = f.clone();
            async move {
                f.fetch_add(batch.len(), Ordering::SeqCst);
                Ok(())
            }
        });
        for i in 0..3 {
            batcher.enqueue(i).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(flushed.load(Ordering::SeqCst), 3);
        drop(batcher);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn flushes_on_linger_timeout_even_with_a_partial_batch() {
        let flushed = Arc::new(AtomicUsize::new(0));
        let f = flushed.clone();
        let (batcher, handle) = Batcher::spawn(100, Duration::from_millis(30), 16, move |batch: Vec<i32>| {
            let f = f.clone();
            async move {
                f.fetch_add(batch.len(), Ordering::SeqCst);
                Ok(())
            }
        });
        batcher.enqueue(1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(flushed.load(Ordering::SeqCst), 1);
        drop(batcher);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn drops_channel_flushes_remaining_buffer_on_shutdown() {
        let flushed = Arc::new(AtomicUsize::new(0));
        let f = flushed.clone();
        let (batcher, handle) = Batcher::spawn(100, Duration::from_secs(30), 16, move |batch: Vec<i32>| {
            let f = f.clone();
            async move {
                f.fetch_add(batch.len(), Ordering::SeqCst);
                Ok(())
            }
        });
        batcher.enqueue(1).await.unwrap();
        batcher.enqueue(2).await.unwrap();
        drop(batcher);
        handle.await.unwrap();
        assert_eq!(flushed.load(Ordering::SeqCst), 2);
    }
}
