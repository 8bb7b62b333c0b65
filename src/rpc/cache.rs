use crate::types::TransactionDetail;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::OnceCell;
use tracing::debug;

type Slot = Arc<OnceCell<Arc<TransactionDetail>>>;

/// Thread-safe prior-transaction cache shared by every worker of a run.
///
/// Confirmed transactions never change, so entries are never invalidated or
/// evicted. The first value stored for a txid is the one every reader sees.
/// Concurrent misses on the same txid share a single fetch; a failed fetch
/// leaves the key empty for the next caller.
#[derive(Clone, Default)]
pub struct TransactionCache {
    inner: Arc<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: RwLock<HashMap<String, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
}

impl TransactionCache {
    /// Create a new empty transaction cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a transaction from cache if it exists
    pub fn get(&self, txid: &str) -> Option<Arc<TransactionDetail>> {
        let found = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(txid)
            .and_then(|slot| slot.get().cloned());

        match found {
            Some(detail) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for transaction: {}", txid);
                Some(detail)
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for transaction: {}", txid);
                None
            }
        }
    }

    /// Store a transaction in the cache.
    ///
    /// Returns `false` when the txid already has a value (or one is being
    /// fetched); the existing value is kept.
    pub fn put(&self, txid: String, detail: TransactionDetail) -> bool {
        let slot = self.slot(&txid);
        let stored = slot.set(Arc::new(detail)).is_ok();
        if stored {
            debug!("Cached transaction: {}", txid);
        }
        stored
    }

    /// Return the cached transaction, fetching it with `fetch` on a miss.
    ///
    /// Only one caller per txid runs `fetch` at a time; the others wait for
    /// its result. Errors are returned to the caller that ran the fetch and
    /// are not cached.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        txid: &str,
        fetch: F,
    ) -> Result<Arc<TransactionDetail>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TransactionDetail, E>>,
    {
        let slot = self.slot(txid);

        if let Some(detail) = slot.get() {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit for transaction: {}", txid);
            return Ok(Arc::clone(detail));
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss for transaction: {}", txid);

        let detail = slot
            .get_or_try_init(|| async {
                self.inner.fetches.fetch_add(1, Ordering::Relaxed);
                fetch().await.map(Arc::new)
            })
            .await?;

        Ok(Arc::clone(detail))
    }

    /// Number of populated entries
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn get_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            fetches: self.inner.fetches.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// The slot for `txid`, creating an empty one if needed
    fn slot(&self, txid: &str) -> Slot {
        if let Some(slot) = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(txid)
        {
            return Arc::clone(slot);
        }

        let mut entries = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(txid.to_string()).or_default())
    }
}

/// Cache performance statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Fetches started on behalf of the cache (successful or not)
    pub fetches: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Calculate the cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            (self.hits as f64 / (self.hits + self.misses) as f64) * 100.0
        }
    }

    /// Get total cache requests
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }
}
