use crate::{
    tiles::capabilities::{CapabilityDocument, CapabilityEndpoint},
    traits::CacheStats,
    Result,
};
use lru::LruCache;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio::sync::OnceCell;

type CacheKey = (String, String);

#[derive(Debug, Clone)]
struct CachedDocument {
    document: Arc<CapabilityDocument>,
    fetched_at: instant::Instant,
}

type Slot = Arc<OnceCell<CachedDocument>>;

/// Parsed capability documents keyed by provider/projection.
///
/// Each key owns a once-cell: concurrent first requests for the same key
/// share one fetch, and a failed fetch leaves the cell empty so the next
/// request tries again. Clones share the same storage.
#[derive(Debug, Clone)]
pub struct CapabilityCache {
    slots: Arc<Mutex<LruCache<CacheKey, Slot>>>,
    ttl: Option<Duration>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl CapabilityCache {
    /// Create a new cache holding at most `capacity` provider/projection pairs
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Arc::new(Mutex::new(LruCache::new(capacity))),
            ttl: None,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Documents older than `ttl` are fetched again on next use
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cached document for `endpoint`, running `fetch` on a miss
    pub async fn get_or_fetch<F, Fut>(
        &self,
        endpoint: &CapabilityEndpoint,
        fetch: F,
    ) -> Result<Arc<CapabilityDocument>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CapabilityDocument>>,
    {
        let slot = self.slot(endpoint);
        if slot.initialized() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        let cached = slot
            .get_or_try_init(move || async move {
                log::info!("fetching capabilities for {}", endpoint);
                let document = fetch().await?;
                Ok::<_, crate::LayerError>(CachedDocument {
                    document: Arc::new(document),
                    fetched_at: instant::Instant::now(),
                })
            })
            .await?;

        Ok(Arc::clone(&cached.document))
    }

    /// Cached document for `endpoint` without fetching
    pub fn get(&self, endpoint: &CapabilityEndpoint) -> Option<Arc<CapabilityDocument>> {
        let mut slots = self.slots.lock().ok()?;
        let cached = slots.get(&endpoint.key())?.get()?;
        if self.is_expired(cached) {
            return None;
        }
        Some(Arc::clone(&cached.document))
    }

    /// Store an already parsed document
    pub fn insert(&self, endpoint: &CapabilityEndpoint, document: CapabilityDocument) {
        let cell = OnceCell::from(CachedDocument {
            document: Arc::new(document),
            fetched_at: instant::Instant::now(),
        });
        if let Ok(mut slots) = self.slots.lock() {
            slots.put(endpoint.key(), Arc::new(cell));
        }
    }

    /// Check if a document is cached for `endpoint`
    pub fn contains(&self, endpoint: &CapabilityEndpoint) -> bool {
        self.get(endpoint).is_some()
    }

    /// Drop the document for `endpoint`
    pub fn invalidate(&self, endpoint: &CapabilityEndpoint) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.pop(&endpoint.key());
        }
    }

    /// Clear every cached document
    pub fn clear(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.clear();
        }
    }

    /// Number of populated entries
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.iter().filter(|(_, slot)| slot.initialized()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.cap().get())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.len(),
        }
    }

    fn is_expired(&self, cached: &CachedDocument) -> bool {
        self.ttl
            .map(|ttl| cached.fetched_at.elapsed() >= ttl)
            .unwrap_or(false)
    }

    /// Slot for `endpoint`, replacing an expired one
    fn slot(&self, endpoint: &CapabilityEndpoint) -> Slot {
        let Ok(mut slots) = self.slots.lock() else {
            log::warn!("capability cache lock poisoned, fetching {} uncached", endpoint);
            return Arc::new(OnceCell::new());
        };

        let key = endpoint.key();
        if let Some(slot) = slots.get(&key) {
            let expired = slot.get().map(|c| self.is_expired(c)).unwrap_or(false);
            if !expired {
                return Arc::clone(slot);
            }
            log::debug!("capabilities for {} expired", endpoint);
        }

        let slot: Slot = Arc::new(OnceCell::new());
        slots.put(key, Arc::clone(&slot));
        slot
    }
}

impl Default for CapabilityCache {
    fn default() -> Self {
        Self::new(16)
    }
}
