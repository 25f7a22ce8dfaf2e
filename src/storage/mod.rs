//! Storage Layer - the content/asset store the scan reads from
//!
//! The scan engine only talks to `MediaStore`. The shipped backend is SQLite
//! with a content-management shaped schema:
//! - posts(id, post_type, post_status, post_mime_type, post_content)
//! - postmeta(meta_id, post_id, meta_key, meta_value)
//! - options(name, value)

pub mod schema;
pub mod sqlite;

use std::collections::BTreeMap;

use crate::Result;
use crate::asset::{AssetId, ContentId};
use crate::block::{self, BlockNode};

pub use sqlite::{SqliteStore, StoreStats};

/// Read-only contract the scan needs from a content/asset store.
///
/// All calls are blocking. Implementations report store access failures as
/// errors; "nothing found" is an empty result, never an error.
pub trait MediaStore {
    /// Ids of every asset record with an `image/*` MIME type
    fn list_image_asset_ids(&self) -> Result<Vec<AssetId>>;

    /// Every non-empty metadata value stored under `key`, across all records
    fn list_metadata_values(&self, key: &str) -> Result<Vec<String>>;

    /// Metadata values that are bare unsigned integers naming an existing image asset
    fn find_direct_integer_references(&self) -> Result<Vec<AssetId>>;

    /// Ids of content records eligible for body scanning, ascending
    fn list_scannable_content_ids(&self) -> Result<Vec<ContentId>>;

    /// Bulk fetch of raw bodies for one batch. Ids that no longer exist are absent.
    fn fetch_content_bodies(&self, ids: &[ContentId]) -> Result<BTreeMap<ContentId, String>>;

    /// Store-specific URL → asset lookup
    fn resolve_url_to_asset_id(&self, url: &str) -> Result<Option<AssetId>>;

    /// Local origin prefix that asset URLs are served from
    fn asset_base_url(&self) -> Result<String>;

    /// Block tree of a body, or `None` for freeform markup
    fn parse_structured_body(&self, raw_body: &str) -> Option<Vec<BlockNode>> {
        block::parse_blocks(raw_body)
    }
}
