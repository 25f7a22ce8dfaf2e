//! In-memory store for scan tests: lookup counting and failure injection

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};

use crate::asset::{AssetId, ContentId, parse_as_asset_id};
use crate::storage::MediaStore;
use crate::{Error, Result};

#[derive(Default)]
pub struct FakeStore {
    assets: Vec<AssetId>,
    meta: Vec<(String, String)>,
    content: BTreeMap<ContentId, String>,
    urls: HashMap<String, AssetId>,
    base_url: String,
    reversed: bool,
    fail_assets: bool,
    fail_url_lookups: bool,
    fail_fetch_for: Option<ContentId>,
    url_lookups: Cell<usize>,
    fetches: Cell<usize>,
}

fn id(raw: u64) -> AssetId {
    AssetId::new(raw).expect("test ids are positive")
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assets(mut self, ids: &[u64]) -> Self {
        self.assets.extend(ids.iter().map(|&raw| id(raw)));
        self
    }

    pub fn with_meta(mut self, key: &str, value: &str) -> Self {
        self.meta.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_content(mut self, content_id: u64, body: &str) -> Self {
        self.content.insert(ContentId(content_id), body.to_string());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>, asset: u64) -> Self {
        self.urls.insert(url.into(), id(asset));
        self
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base_url = base.to_string();
        self
    }

    /// List content ids in descending order
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub fn failing_assets(mut self) -> Self {
        self.fail_assets = true;
        self
    }

    pub fn failing_url_lookups(mut self) -> Self {
        self.fail_url_lookups = true;
        self
    }

    /// Fail any batch fetch that includes this content id
    pub fn failing_fetch_for(mut self, content_id: u64) -> Self {
        self.fail_fetch_for = Some(ContentId(content_id));
        self
    }

    pub fn url_lookups(&self) -> usize {
        self.url_lookups.get()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.get()
    }
}

impl MediaStore for FakeStore {
    fn list_image_asset_ids(&self) -> Result<Vec<AssetId>> {
        if self.fail_assets {
            return Err(Error::Store("asset table unavailable".into()));
        }
        Ok(self.assets.clone())
    }

    fn list_metadata_values(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .meta
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.clone())
            .collect())
    }

    fn find_direct_integer_references(&self) -> Result<Vec<AssetId>> {
        Ok(self
            .meta
            .iter()
            // Digits only, matching the SQLite GLOB; no whitespace trimming
            .filter(|(_, v)| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
            .filter_map(|(_, v)| parse_as_asset_id(v))
            .filter(|id| self.assets.contains(id))
            .collect())
    }

    fn list_scannable_content_ids(&self) -> Result<Vec<ContentId>> {
        let mut ids: Vec<ContentId> = self.content.keys().copied().collect();
        if self.reversed {
            ids.reverse();
        }
        Ok(ids)
    }

    fn fetch_content_bodies(&self, ids: &[ContentId]) -> Result<BTreeMap<ContentId, String>> {
        self.fetches.set(self.fetches.get() + 1);
        if let Some(failing) = self.fail_fetch_for {
            if ids.contains(&failing) {
                return Err(Error::Store(format!("cannot read content {}", failing)));
            }
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.content.get(id).map(|body| (*id, body.clone())))
            .collect())
    }

    fn resolve_url_to_asset_id(&self, url: &str) -> Result<Option<AssetId>> {
        if self.fail_url_lookups {
            return Err(Error::Store("attachment lookup failed".into()));
        }
        self.url_lookups.set(self.url_lookups.get() + 1);
        Ok(self.urls.get(url).copied())
    }

    fn asset_base_url(&self) -> Result<String> {
        Ok(self.base_url.clone())
    }
}
