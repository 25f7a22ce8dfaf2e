//! Reachability scan - mark-sweep over the asset inventory
//!
//! Components, leaves first:
//! - `registry`: the universe of image assets
//! - `cache`: memoized URL → asset resolution
//! - `batch`: windowed content streaming
//! - `extract`: one extractor per reference modality
//! - `used`: the monotone `Used` accumulator
//! - `engine`: the aggregator that ties them together

pub mod batch;
pub mod cache;
pub mod engine;
pub mod extract;
pub mod registry;
pub mod used;

#[cfg(test)]
pub(crate) mod fake;

pub use batch::{ContentBatch, ContentBatches, ContentRecord, DEFAULT_BATCH_SIZE, fetch_content_batches};
pub use cache::{CacheStats, ResolutionCache, UrlResolver};
pub use engine::{
    BatchErrorPolicy, CancelToken, ScanOptions, ScanReport, ScanStats, Scanner, Summary, run_scan,
};
pub use extract::{BodyExtractor, ContentBody, ExtractorSet, InventoryExtractor, ReferenceSource};
pub use registry::AssetRegistry;
pub use used::{Marker, UsedSet};
