use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

/// Bounds the number of concurrent in-flight publishes against the
/// transport, generalizing `original_source/src/bus.py::ConnectionPool`
/// (which pooled up to `max_size` NATS connections, blocking-and-retrying
/// once exhausted) to a single-swarm transport where the thing being
/// rationed is concurrent publisher slots rather than TCP connections.
///
/// `get()` waits for a free slot the same way the source's pool waits and
/// retries under `asyncio.Lock`; `release` happens automatically when the
/// returned guard drops.
pub struct ConnectionPool {
    semaphore: Arc<Semaphore>,
}

/// A held slot. Dropping it returns the slot to the pool.
pub struct PoolGuard<'a> {
    _permit: SemaphorePermit<'a>,
}

impl ConnectionPool {
    pub fn new(max_size: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(max_size)) }
    }

    /// Acquires a slot, waiting if the pool is at capacity.
    pub async fn get(&self) -> PoolGuard<'_> {
        let permit = self.semaphore.acquire().await.expect("semaphore not closed");
        PoolGuard { _permit: permit }
    }

    /// Closes the pool: any holders already granted a slot keep it until
    /// they drop it, but no further slot will ever be issued.
    pub fn close_all(&self) {
        self.semaphore.close();
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slots_are_capped_and_released() {
        let pool = ConnectionPool::new(2);
        assert_eq!(pool.available(), 2);
        let g1 = pool.get().await;
        assert_eq!(pool.available(), 1);
        let g2 = pool.get().await;
        assert_eq!(pool.available(), 0);
        drop(g1);
        assert_eq!(pool.available(), 1);
        drop(g2);
        assert_eq!(pool.available(), 2);
    }
}
