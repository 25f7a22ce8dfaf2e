//! Resolution Cache - memoized URL → asset lookups
//!
//! Content corpora repeat the same image URLs across many records, and the
//! store lookup behind `resolve_url_to_asset_id` is the most expensive call
//! in the mark phase. The cache keys on the exact URL string and remembers
//! misses as well as hits. URLs outside the local asset base are rejected by
//! a literal prefix check before the store is ever consulted.

use std::collections::HashMap;

use crate::Result;
use crate::asset::AssetId;
use crate::storage::MediaStore;

/// Anything that turns an image URL into an asset id
pub trait UrlResolver {
    fn resolve(&mut self, url: &str) -> Result<Option<AssetId>>;
}

/// Counters for cache diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Served from memory
    pub hits: usize,
    /// Forwarded to the store
    pub lookups: usize,
    /// Rejected by the local-origin prefix check
    pub non_local: usize,
}

/// Memoizing resolver over a store
pub struct ResolutionCache<'s, S: MediaStore + ?Sized> {
    store: &'s S,
    base_url: String,
    entries: HashMap<String, Option<AssetId>>,
    stats: CacheStats,
}

impl<'s, S: MediaStore + ?Sized> ResolutionCache<'s, S> {
    /// Create a cache bound to the store's asset base URL
    pub fn new(store: &'s S) -> Result<Self> {
        let base_url = store.asset_base_url()?;
        if base_url.is_empty() {
            tracing::warn!("Store has no asset base URL; every image URL is treated as local");
        }
        Ok(Self::with_base_url(store, base_url))
    }

    /// Create a cache with an explicit base URL
    pub fn with_base_url(store: &'s S, base_url: impl Into<String>) -> Self {
        Self {
            store,
            base_url: base_url.into(),
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Literal prefix check against the local origin
    pub fn is_local(&self, url: &str) -> bool {
        url.starts_with(&self.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of distinct URLs remembered
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: MediaStore + ?Sized> UrlResolver for ResolutionCache<'_, S> {
    fn resolve(&mut self, url: &str) -> Result<Option<AssetId>> {
        if !self.is_local(url) {
            self.stats.non_local += 1;
            return Ok(None);
        }

        if let Some(cached) = self.entries.get(url) {
            self.stats.hits += 1;
            return Ok(*cached);
        }

        // Store errors are not cached; only definite answers are.
        let resolved = self.store.resolve_url_to_asset_id(url)?;
        self.stats.lookups += 1;
        self.entries.insert(url.to_string(), resolved);
        Ok(resolved)
    }
}
