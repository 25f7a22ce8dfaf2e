//! Reference Extractors
//!
//! One extractor per reference modality. Inventory extractors run once over
//! the whole metadata inventory; body extractors run per content record.
//! Extraction is best-effort: malformed input yields nothing rather than an
//! error. The only errors surfaced are store access failures.
//!
//! | Source           | Input                  | Rule                                   |
//! |------------------|------------------------|----------------------------------------|
//! | FeaturedImage    | featured-image meta    | value parsed as an id                  |
//! | GalleryList      | comma-separated meta   | each numeric token is an id            |
//! | DirectMetaField  | any bare-integer meta  | joined against image assets by the store |
//! | BlockAttribute   | block tree             | image `id`, gallery `ids`              |
//! | ClassNamePattern | raw body               | `wp-image-<id>` class markers          |
//! | EmbeddedUrl      | raw body               | `<img src>` URLs via the resolver      |

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::cache::UrlResolver;
use crate::Result;
use crate::asset::{AssetId, asset_id_from_json, parse_as_asset_id};
use crate::block::{BlockKind, BlockNode, walk_blocks};
use crate::storage::MediaStore;

/// Default featured-image metadata key
pub const FEATURED_IMAGE_META_KEY: &str = "_thumbnail_id";

/// Default gallery-list metadata key
pub const GALLERY_LIST_META_KEY: &str = "_product_image_gallery";

/// Where a mark came from. Diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSource {
    FeaturedImage,
    GalleryList,
    DirectMetaField,
    BlockAttribute,
    ClassNamePattern,
    EmbeddedUrl,
}

impl ReferenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceSource::FeaturedImage => "featured_image",
            ReferenceSource::GalleryList => "gallery_list",
            ReferenceSource::DirectMetaField => "direct_meta_field",
            ReferenceSource::BlockAttribute => "block_attribute",
            ReferenceSource::ClassNamePattern => "class_name_pattern",
            ReferenceSource::EmbeddedUrl => "embedded_url",
        }
    }

    pub fn all() -> &'static [ReferenceSource] {
        &[
            ReferenceSource::FeaturedImage,
            ReferenceSource::GalleryList,
            ReferenceSource::DirectMetaField,
            ReferenceSource::BlockAttribute,
            ReferenceSource::ClassNamePattern,
            ReferenceSource::EmbeddedUrl,
        ]
    }
}

impl std::fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A content body as seen by body extractors: raw text plus its block
/// tree, parsed once per record.
#[derive(Debug, Clone, Copy)]
pub struct ContentBody<'a> {
    pub raw: &'a str,
    pub blocks: Option<&'a [BlockNode]>,
}

/// Extractor over the whole metadata inventory
pub trait InventoryExtractor {
    fn source(&self) -> ReferenceSource;
    fn extract(&self, store: &dyn MediaStore) -> Result<Vec<AssetId>>;
}

/// Extractor over a single content body
pub trait BodyExtractor {
    fn source(&self) -> ReferenceSource;
    fn extract(&self, body: &ContentBody<'_>, resolver: &mut dyn UrlResolver) -> Result<Vec<AssetId>>;
}

// ========== Inventory extractors ==========

/// Featured-image metadata: each value is a single id
pub struct FeaturedImage {
    meta_key: String,
}

impl FeaturedImage {
    pub fn new(meta_key: impl Into<String>) -> Self {
        Self { meta_key: meta_key.into() }
    }
}

impl Default for FeaturedImage {
    fn default() -> Self {
        Self::new(FEATURED_IMAGE_META_KEY)
    }
}

impl InventoryExtractor for FeaturedImage {
    fn source(&self) -> ReferenceSource {
        ReferenceSource::FeaturedImage
    }

    fn extract(&self, store: &dyn MediaStore) -> Result<Vec<AssetId>> {
        let values = store.list_metadata_values(&self.meta_key)?;
        Ok(featured_image_ids(&values))
    }
}

/// Parse featured-image values; non-numeric values are dropped
pub fn featured_image_ids(values: &[String]) -> Vec<AssetId> {
    values.iter().filter_map(|v| parse_as_asset_id(v)).collect()
}

/// Comma-separated gallery metadata
pub struct GalleryList {
    meta_key: String,
}

impl GalleryList {
    pub fn new(meta_key: impl Into<String>) -> Self {
        Self { meta_key: meta_key.into() }
    }
}

impl Default for GalleryList {
    fn default() -> Self {
        Self::new(GALLERY_LIST_META_KEY)
    }
}

impl InventoryExtractor for GalleryList {
    fn source(&self) -> ReferenceSource {
        ReferenceSource::GalleryList
    }

    fn extract(&self, store: &dyn MediaStore) -> Result<Vec<AssetId>> {
        let values = store.list_metadata_values(&self.meta_key)?;
        Ok(gallery_list_ids(&values))
    }
}

/// Split each list on commas; empty and non-numeric tokens are ignored
pub fn gallery_list_ids(values: &[String]) -> Vec<AssetId> {
    values
        .iter()
        .flat_map(|list| list.split(','))
        .filter_map(parse_as_asset_id)
        .collect()
}

/// Any metadata value that is a bare integer naming an image asset.
///
/// This catches custom fields that store a raw asset id, at the price of
/// false positives when an unrelated numeric field collides with an id.
/// It can be switched off through `ScanOptions::direct_meta_field`.
#[derive(Default)]
pub struct DirectMetaField;

impl InventoryExtractor for DirectMetaField {
    fn source(&self) -> ReferenceSource {
        ReferenceSource::DirectMetaField
    }

    fn extract(&self, store: &dyn MediaStore) -> Result<Vec<AssetId>> {
        store.find_direct_integer_references()
    }
}

// ========== Body extractors ==========

/// Image and gallery nodes of the block tree, at any depth
#[derive(Default)]
pub struct BlockAttribute;

impl BodyExtractor for BlockAttribute {
    fn source(&self) -> ReferenceSource {
        ReferenceSource::BlockAttribute
    }

    fn extract(&self, body: &ContentBody<'_>, _resolver: &mut dyn UrlResolver) -> Result<Vec<AssetId>> {
        Ok(body.blocks.map(block_attribute_ids).unwrap_or_default())
    }
}

/// Collect ids from every image/gallery node; other kinds are only descended into
pub fn block_attribute_ids(blocks: &[BlockNode]) -> Vec<AssetId> {
    let mut ids = Vec::new();
    for node in walk_blocks(blocks) {
        match node.kind {
            BlockKind::Image => {
                if let Some(id) = node.attribute("id").and_then(asset_id_from_json) {
                    ids.push(id);
                }
            }
            BlockKind::Gallery => {
                if let Some(list) = node.attribute("ids").and_then(|v| v.as_array()) {
                    ids.extend(list.iter().filter_map(asset_id_from_json));
                }
            }
            BlockKind::Other(_) => {}
        }
    }
    ids
}

fn class_marker() -> &'static Regex {
    static CLASS_MARKER: OnceLock<Regex> = OnceLock::new();
    CLASS_MARKER.get_or_init(|| Regex::new(r"(?i)wp-image-([0-9]+)").expect("class marker pattern is valid"))
}

fn image_source() -> &'static Regex {
    static IMAGE_SOURCE: OnceLock<Regex> = OnceLock::new();
    IMAGE_SOURCE.get_or_init(|| {
        Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).expect("image source pattern is valid")
    })
}

/// `wp-image-<id>` class markers in freeform markup
#[derive(Default)]
pub struct ClassNamePattern;

impl BodyExtractor for ClassNamePattern {
    fn source(&self) -> ReferenceSource {
        ReferenceSource::ClassNamePattern
    }

    fn extract(&self, body: &ContentBody<'_>, _resolver: &mut dyn UrlResolver) -> Result<Vec<AssetId>> {
        Ok(class_name_ids(body.raw))
    }
}

pub fn class_name_ids(raw: &str) -> Vec<AssetId> {
    class_marker()
        .captures_iter(raw)
        .filter_map(|caps| parse_as_asset_id(&caps[1]))
        .collect()
}

/// `<img src>` URLs, resolved through the cache
#[derive(Default)]
pub struct EmbeddedUrl;

impl BodyExtractor for EmbeddedUrl {
    fn source(&self) -> ReferenceSource {
        ReferenceSource::EmbeddedUrl
    }

    fn extract(&self, body: &ContentBody<'_>, resolver: &mut dyn UrlResolver) -> Result<Vec<AssetId>> {
        let mut ids = Vec::new();
        for url in image_source_urls(body.raw) {
            if let Some(id) = resolver.resolve(url)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

pub fn image_source_urls(raw: &str) -> impl Iterator<Item = &str> {
    image_source()
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

/// The extractors a scan runs, in execution order
pub struct ExtractorSet {
    pub inventory: Vec<Box<dyn InventoryExtractor>>,
    pub body: Vec<Box<dyn BodyExtractor>>,
}

impl ExtractorSet {
    pub fn new(inventory: Vec<Box<dyn InventoryExtractor>>, body: Vec<Box<dyn BodyExtractor>>) -> Self {
        Self { inventory, body }
    }

    /// Standard set. `direct_meta_field` toggles the bare-integer heuristic.
    pub fn standard(featured_key: &str, gallery_key: &str, direct_meta_field: bool) -> Self {
        let mut inventory: Vec<Box<dyn InventoryExtractor>> = vec![
            Box::new(FeaturedImage::new(featured_key)),
            Box::new(GalleryList::new(gallery_key)),
        ];
        if direct_meta_field {
            inventory.push(Box::new(DirectMetaField));
        }

        let body: Vec<Box<dyn BodyExtractor>> = vec![
            Box::new(BlockAttribute),
            Box::new(ClassNamePattern),
            Box::new(EmbeddedUrl),
        ];

        Self { inventory, body }
    }

    /// Reverse execution order in both groups
    pub fn reversed(mut self) -> Self {
        self.inventory.reverse();
        self.body.reverse();
        self
    }

    /// Sources this set can produce
    pub fn sources(&self) -> Vec<ReferenceSource> {
        self.inventory
            .iter()
            .map(|e| e.source())
            .chain(self.body.iter().map(|e| e.source()))
            .collect()
    }
}

impl Default for ExtractorSet {
    fn default() -> Self {
        Self::standard(FEATURED_IMAGE_META_KEY, GALLERY_LIST_META_KEY, true)
    }
}
