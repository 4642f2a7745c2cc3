//! Fetching capability documents.
//!
//! [`HttpFetch`] is the transport seam; [`CapabilitySource`] is what the
//! resolver talks to. [`LiveCapabilities`] combines the two with the
//! [`CapabilityCache`] so a provider's document is downloaded and parsed at
//! most once per cache lifetime.

use crate::{
    tiles::{
        cache::CapabilityCache,
        capabilities::{CapabilityDocument, CapabilityEndpoint},
    },
    LayerError, Result,
};
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(feature = "live-capabilities")]
use once_cell::sync::Lazy;

/// Shared async HTTP client with a custom User-Agent. Built once so TLS and
/// connection pool setup are not repeated per request.
#[cfg(feature = "live-capabilities")]
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("citysense/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
});

/// Minimal HTTP primitive: GET a URL and return its body as text
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String>;
}

/// [`HttpFetch`] backed by the shared reqwest client
#[cfg(feature = "live-capabilities")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestFetch;

#[cfg(feature = "live-capabilities")]
#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn get_text(&self, url: &str) -> Result<String> {
        log::debug!("GET {}", url);
        let resp = HTTP_CLIENT.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(LayerError::capability(url, format!("HTTP {}", resp.status())));
        }
        Ok(resp.text().await?)
    }
}

/// Provider of parsed capability documents
#[async_trait]
pub trait CapabilitySource: Send + Sync {
    async fn document(&self, endpoint: &CapabilityEndpoint) -> Result<Arc<CapabilityDocument>>;

    /// Whether lookups can succeed at all; a disabled source is never asked
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Capability lookups disabled; every layer uses its static template
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapabilities;

#[async_trait]
impl CapabilitySource for NoCapabilities {
    async fn document(&self, endpoint: &CapabilityEndpoint) -> Result<Arc<CapabilityDocument>> {
        Err(LayerError::capability(
            endpoint.to_string(),
            "capability lookups are disabled",
        ))
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Downloads capability documents through an [`HttpFetch`] and caches them
#[derive(Clone)]
pub struct LiveCapabilities {
    fetcher: Arc<dyn HttpFetch>,
    cache: CapabilityCache,
}

impl LiveCapabilities {
    pub fn new(fetcher: Arc<dyn HttpFetch>, cache: CapabilityCache) -> Self {
        Self { fetcher, cache }
    }

    /// Live source over the shared reqwest client
    #[cfg(feature = "live-capabilities")]
    pub fn reqwest(cache: CapabilityCache) -> Self {
        Self::new(Arc::new(ReqwestFetch), cache)
    }

    pub fn cache(&self) -> &CapabilityCache {
        &self.cache
    }
}

impl std::fmt::Debug for LiveCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveCapabilities")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CapabilitySource for LiveCapabilities {
    async fn document(&self, endpoint: &CapabilityEndpoint) -> Result<Arc<CapabilityDocument>> {
        let fetcher = Arc::clone(&self.fetcher);
        self.cache
            .get_or_fetch(endpoint, move || async move {
                let body = fetcher.get_text(&endpoint.url).await?;
                CapabilityDocument::parse(&body)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::capabilities::tests::SAMPLE;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticFetch {
        body: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpFetch for StaticFetch {
        async fn get_text(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.to_string())
        }
    }

    fn gibs() -> CapabilityEndpoint {
        CapabilityEndpoint::new("gibs", "epsg3857", "https://gibs.test/WMTSCapabilities.xml")
    }

    #[tokio::test]
    async fn test_live_source_parses_and_caches() {
        let fetch = Arc::new(StaticFetch {
            body: SAMPLE,
            calls: AtomicUsize::new(0),
        });
        let source = LiveCapabilities::new(fetch.clone(), CapabilityCache::default());

        let first = source.document(&gibs()).await.unwrap();
        let second = source.document(&gibs()).await.unwrap();

        assert_eq!(first.layer_count(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_cached() {
        let fetch = Arc::new(StaticFetch {
            body: "<html>maintenance</html>",
            calls: AtomicUsize::new(0),
        });
        let source = LiveCapabilities::new(fetch.clone(), CapabilityCache::default());

        assert!(source.document(&gibs()).await.is_err());
        assert!(source.document(&gibs()).await.is_err());
        assert_eq!(fetch.calls.load(Ordering::SeqCst), 2);
        assert!(source.cache().is_empty());
    }

    #[tokio::test]
    async fn test_no_capabilities() {
        let err = NoCapabilities.document(&gibs()).await.unwrap_err();
        assert!(matches!(err, LayerError::CapabilityFetch { .. }));
        assert!(!NoCapabilities.is_enabled());
    }
}
