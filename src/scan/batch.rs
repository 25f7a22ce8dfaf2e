//! Batch Content Fetcher
//!
//! Content ids are listed up front (cheap), bodies are pulled one window at
//! a time with a single bulk query, so at most one window of bodies is held
//! in memory. The sequence is finite and not restartable; a new scan lists
//! the ids again.

use crate::asset::ContentId;
use crate::storage::MediaStore;
use crate::{Error, Result};

/// Default window size
pub const DEFAULT_BATCH_SIZE: usize = 300;

/// One content record with its raw body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub id: ContentId,
    pub raw_body: String,
}

/// One fetched window
#[derive(Debug, Clone)]
pub struct ContentBatch {
    /// Zero-based position of this window in the scan
    pub index: usize,
    pub records: Vec<ContentRecord>,
}

/// Lazy sequence of content windows
pub struct ContentBatches<'s, S: MediaStore + ?Sized> {
    store: &'s S,
    ids: Vec<ContentId>,
    batch_size: usize,
    offset: usize,
    index: usize,
}

/// List scannable content and prepare to stream it in windows of `batch_size`.
///
/// Listing the ids is a prerequisite for the scan, so a failure here is
/// returned directly. Each later window yields its own `Result`.
pub fn fetch_content_batches<S: MediaStore + ?Sized>(
    store: &S,
    batch_size: usize,
) -> Result<ContentBatches<'_, S>> {
    if batch_size == 0 {
        return Err(Error::InvalidBatchSize(batch_size));
    }

    let ids = store.list_scannable_content_ids()?;
    tracing::debug!(
        "{} content records eligible for scanning (batch size {})",
        ids.len(),
        batch_size
    );

    Ok(ContentBatches {
        store,
        ids,
        batch_size,
        offset: 0,
        index: 0,
    })
}

impl<S: MediaStore + ?Sized> ContentBatches<'_, S> {
    /// Number of records that will be visited
    pub fn total_records(&self) -> usize {
        self.ids.len()
    }

    /// Number of windows the scan will fetch
    pub fn total_batches(&self) -> usize {
        self.ids.len().div_ceil(self.batch_size)
    }
}

impl<S: MediaStore + ?Sized> Iterator for ContentBatches<'_, S> {
    type Item = Result<ContentBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.ids.len() {
            return None;
        }

        let end = (self.offset + self.batch_size).min(self.ids.len());
        let window = &self.ids[self.offset..end];
        let index = self.index;
        self.offset = end;
        self.index += 1;

        let mut bodies = match self.store.fetch_content_bodies(window) {
            Ok(bodies) => bodies,
            Err(e) => {
                return Some(Err(Error::BatchFetch {
                    batch: index,
                    source: Box::new(e),
                }));
            }
        };

        // Keep listing order; records deleted since listing simply drop out.
        let records = window
            .iter()
            .filter_map(|id| {
                bodies.remove(id).map(|raw_body| ContentRecord { id: *id, raw_body })
            })
            .collect();

        Some(Ok(ContentBatch { index, records }))
    }
}
