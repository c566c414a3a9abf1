// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use moka::sync::Cache;
use reqwest::Method;
use tracing::trace;

use crate::error::Result;
use crate::fetcher::Payload;

/// Identity of a request as seen by a [`ResponseCache`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: Method,
    pub url: String,
    pub body: Option<String>,
}

/// Pluggable result cache consulted around every scheduled fetch.
///
/// Implementations either answer from their store or await `fetch`, which
/// performs the real rate-limited round trip.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get_or_fetch(
        &self,
        key: CacheKey,
        fetch: BoxFuture<'_, Result<Payload>>,
    ) -> Result<Payload>;
}

/// In-memory cache of successful GET responses.
pub struct MemoryCache {
    entries: Cache<CacheKey, Payload>,
}

impl MemoryCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::new(capacity),
        }
    }

    pub fn with_ttl(capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get_or_fetch(
        &self,
        key: CacheKey,
        fetch: BoxFuture<'_, Result<Payload>>,
    ) -> Result<Payload> {
        if key.method != Method::GET {
            return fetch.await;
        }

        if let Some(hit) = self.entries.get(&key) {
            trace!(target: "discogs", url = %key.url, "cache hit");
            return Ok(hit);
        }

        let payload = fetch.await?;
        self.entries.insert(key, payload.clone());
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiscogsError;
    use futures_util::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(method: Method) -> CacheKey {
        CacheKey {
            method,
            url: "https://api.discogs.com/releases/1".to_string(),
            body: None,
        }
    }

    #[tokio::test]
    async fn test_memory_cache_reuses_get_results() {
        let cache = MemoryCache::new(16);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let payload = cache
                .get_or_fetch(
                    key(Method::GET),
                    async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Payload::Json(json!({ "id": 1 })))
                    }
                    .boxed(),
                )
                .await
                .unwrap();
            assert_eq!(payload, Payload::Json(json!({ "id": 1 })));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_memory_cache_skips_writes() {
        let cache = MemoryCache::new(16);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_fetch(
                    key(Method::POST),
                    async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Payload::Empty)
                    }
                    .boxed(),
                )
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_memory_cache_does_not_store_errors() {
        let cache = MemoryCache::new(16);

        let failed = cache
            .get_or_fetch(
                key(Method::GET),
                async { Err(DiscogsError::Unauthorized) }.boxed(),
            )
            .await;
        assert!(matches!(failed, Err(DiscogsError::Unauthorized)));

        let recovered = cache
            .get_or_fetch(key(Method::GET), async { Ok(Payload::Empty) }.boxed())
            .await
            .unwrap();
        assert_eq!(recovered, Payload::Empty);
    }
}
