//! Mark-Sweep Aggregator
//!
//! Pipeline:
//! 1. Enumerate the universe `All` (fatal on failure)
//! 2. Inventory-wide marks: featured images, gallery lists, direct meta ids
//! 3. Stream content in windows; run every body extractor on every record
//! 4. Sweep: `Unused = All \ Used`, both sorted ascending, plus a summary
//!
//! Any fatal condition returns an error and no report at all: a partial
//! "unused" list would drive deletions of assets that are in fact used.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::batch::{ContentBatch, DEFAULT_BATCH_SIZE, fetch_content_batches};
use super::cache::{CacheStats, ResolutionCache};
use super::extract::{
    ContentBody, ExtractorSet, FEATURED_IMAGE_META_KEY, GALLERY_LIST_META_KEY, ReferenceSource,
};
use super::registry::AssetRegistry;
use super::used::Marker;
use crate::asset::AssetId;
use crate::storage::MediaStore;
use crate::ui::{ProgressMessage, ProgressPhase};
use crate::{Error, Result};

/// What to do when one content window cannot be scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchErrorPolicy {
    /// Fail the whole scan
    #[default]
    Abort,
    /// Log, record the window as skipped and flag the report incomplete
    Skip,
}

/// Scan configuration
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub batch_size: usize,
    /// Run the bare-integer metadata heuristic
    pub direct_meta_field: bool,
    pub batch_errors: BatchErrorPolicy,
    pub featured_meta_key: String,
    pub gallery_meta_key: String,
    /// Wall-clock budget for the whole scan, checked before every window
    pub deadline: Option<Duration>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            direct_meta_field: true,
            batch_errors: BatchErrorPolicy::Abort,
            featured_meta_key: FEATURED_IMAGE_META_KEY.to_string(),
            gallery_meta_key: GALLERY_LIST_META_KEY.to_string(),
            deadline: None,
        }
    }
}

/// Shared flag to stop a running scan between windows
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counts over the universe. `total_images == used + unused` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_images: usize,
    pub used: usize,
    pub unused: usize,
}

fn is_true(value: &bool) -> bool {
    *value
}

/// Classification handed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub used_ids: Vec<AssetId>,
    pub unused_ids: Vec<AssetId>,
    pub summary: Summary,
    /// `false` only when windows were skipped under `BatchErrorPolicy::Skip`
    #[serde(skip_serializing_if = "is_true")]
    pub complete: bool,
}

/// Diagnostics of one scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub batches: usize,
    pub skipped_batches: Vec<usize>,
    pub records: usize,
    pub structured_records: usize,
    pub marks_by_source: BTreeMap<ReferenceSource, usize>,
    pub rejected_marks: usize,
    pub cache: CacheStats,
    pub elapsed_ms: u64,
}

impl std::fmt::Display for ScanStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Scan Statistics:")?;
        writeln!(f, "  Batches: {} ({} skipped)", self.batches, self.skipped_batches.len())?;
        writeln!(f, "  Records scanned: {} ({} structured)", self.records, self.structured_records)?;
        writeln!(f, "  Marks by source:")?;
        for source in ReferenceSource::all() {
            writeln!(
                f,
                "    {}: {}",
                source,
                self.marks_by_source.get(source).copied().unwrap_or(0)
            )?;
        }
        writeln!(f, "  Rejected marks: {}", self.rejected_marks)?;
        writeln!(
            f,
            "  URL cache: {} hits, {} lookups, {} non-local",
            self.cache.hits, self.cache.lookups, self.cache.non_local
        )?;
        writeln!(f, "  Elapsed: {} ms", self.elapsed_ms)
    }
}

/// Runs one mark-sweep pass over a store
pub struct Scanner<'s> {
    store: &'s dyn MediaStore,
    options: ScanOptions,
    extractors: ExtractorSet,
    cancel: CancelToken,
    progress: Option<crossbeam::channel::Sender<ProgressMessage>>,
}

impl<'s> Scanner<'s> {
    pub fn new(store: &'s dyn MediaStore, options: ScanOptions) -> Self {
        let extractors = ExtractorSet::standard(
            &options.featured_meta_key,
            &options.gallery_meta_key,
            options.direct_meta_field,
        );
        Self {
            store,
            options,
            extractors,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Replace the extractor set
    pub fn with_extractors(mut self, extractors: ExtractorSet) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Send progress events to a UI thread
    pub fn with_progress(mut self, tx: crossbeam::channel::Sender<ProgressMessage>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    fn emit(&self, msg: ProgressMessage) {
        if let Some(tx) = &self.progress {
            // A closed receiver only means nobody is watching
            tx.send(msg).ok();
        }
    }

    fn check_interrupt(&self, deadline: Option<Instant>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run the scan and return only the report
    pub fn run(&self) -> Result<ScanReport> {
        self.run_with_stats().map(|(report, _)| report)
    }

    /// Run the scan, returning the report and its diagnostics
    pub fn run_with_stats(&self) -> Result<(ScanReport, ScanStats)> {
        let started = Instant::now();
        let deadline = self.options.deadline.map(|d| started + d);
        let mut stats = ScanStats::default();

        // Phase 1: universe
        self.emit(ProgressMessage::Started { phase: ProgressPhase::Inventory, total: 0 });
        let universe = AssetRegistry::enumerate(self.store)?;
        tracing::info!("Scanning references to {} image assets", universe.len());
        let mut marker = Marker::new(&universe);

        // Phase 2: inventory-wide sources
        for extractor in &self.extractors.inventory {
            let ids = extractor.extract(self.store)?;
            tracing::debug!("{} produced {} candidate ids", extractor.source(), ids.len());
            marker.mark_all(ids, extractor.source());
        }
        self.emit(ProgressMessage::Finished { phase: ProgressPhase::Inventory });

        // Phase 3: content bodies
        let mut cache = ResolutionCache::new(self.store)?;
        let mut batches = fetch_content_batches(self.store, self.options.batch_size)?;
        self.emit(ProgressMessage::Started {
            phase: ProgressPhase::Marking,
            total: batches.total_batches(),
        });

        let mut index = 0;
        loop {
            self.check_interrupt(deadline)?;
            let Some(next) = batches.next() else {
                break;
            };

            let outcome = next.and_then(|batch| {
                self.scan_batch(&batch, &mut cache, &mut marker, &mut stats)
                    .map_err(|e| Error::BatchFetch {
                        batch: batch.index,
                        source: Box::new(e),
                    })
            });

            match outcome {
                Ok(()) => stats.batches += 1,
                Err(e) if self.options.batch_errors == BatchErrorPolicy::Skip => {
                    tracing::warn!("Skipping content batch {}: {}", index, e);
                    stats.skipped_batches.push(index);
                }
                Err(e) => return Err(e),
            }

            index += 1;
            self.emit(ProgressMessage::Progress {
                phase: ProgressPhase::Marking,
                current: index,
                label: Some(format!("{} records", stats.records)),
            });
        }
        self.emit(ProgressMessage::Finished { phase: ProgressPhase::Marking });

        // Phase 4: sweep
        self.emit(ProgressMessage::Started { phase: ProgressPhase::Sweeping, total: 0 });
        stats.marks_by_source = marker.by_source().clone();
        stats.rejected_marks = marker.rejected();
        stats.cache = cache.stats();
        let used = marker.into_used();

        let used_ids: Vec<AssetId> = used.iter().collect();
        let unused_ids: Vec<AssetId> = universe.iter().filter(|id| !used.contains(*id)).collect();
        let summary = Summary {
            total_images: universe.len(),
            used: used_ids.len(),
            unused: unused_ids.len(),
        };
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        self.emit(ProgressMessage::Finished { phase: ProgressPhase::Sweeping });

        tracing::info!(
            "Scan finished: {} used, {} unused of {} images",
            summary.used,
            summary.unused,
            summary.total_images
        );

        let report = ScanReport {
            used_ids,
            unused_ids,
            summary,
            complete: stats.skipped_batches.is_empty(),
        };
        Ok((report, stats))
    }

    fn scan_batch(
        &self,
        batch: &ContentBatch,
        cache: &mut ResolutionCache<'_, dyn MediaStore + 's>,
        marker: &mut Marker<'_>,
        stats: &mut ScanStats,
    ) -> Result<()> {
        tracing::debug!("Scanning batch {} ({} records)", batch.index, batch.records.len());

        for record in &batch.records {
            if record.raw_body.is_empty() {
                continue;
            }
            stats.records += 1;

            let blocks = self.store.parse_structured_body(&record.raw_body);
            if blocks.is_some() {
                stats.structured_records += 1;
            }
            let body = ContentBody {
                raw: &record.raw_body,
                blocks: blocks.as_deref(),
            };

            for extractor in &self.extractors.body {
                let ids = extractor.extract(&body, &mut *cache)?;
                marker.mark_all(ids, extractor.source());
            }
        }
        Ok(())
    }
}

/// Scan `store` with default options and the given window size
pub fn run_scan(store: &dyn MediaStore, batch_size: usize) -> Result<ScanReport> {
    let options = ScanOptions {
        batch_size,
        ..ScanOptions::default()
    };
    Scanner::new(store, options).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::fake::FakeStore;
    use crate::storage::SqliteStore;
    use std::collections::BTreeSet;

    const BASE: &str = "https://shop.example.com/wp-content/uploads";

    fn ids(raw: &[u64]) -> Vec<AssetId> {
        raw.iter().map(|&id| AssetId::new(id).unwrap()).collect()
    }

    fn store_with_assets(raw: &[u64]) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_asset_base_url(BASE).unwrap();
        for &id in raw {
            store
                .insert_attachment(id, "image/jpeg", &format!("2024/05/img-{}.jpg", id))
                .unwrap();
        }
        store
    }

    /// Assets 1..=3, 1 featured, 2 in a gallery list alongside a missing 5
    fn scenario_a_store() -> SqliteStore {
        let store = store_with_assets(&[1, 2, 3]);
        store.insert_content(10, "product", "publish", "").unwrap();
        store.insert_meta(10, "_thumbnail_id", "1").unwrap();
        store.insert_meta(10, "_product_image_gallery", "2,5").unwrap();
        store
    }

    fn mixed_fake() -> FakeStore {
        FakeStore::new()
            .with_base_url(BASE)
            .with_assets(&[1, 2, 3, 4, 5, 6, 7, 8])
            .with_url(format!("{}/seven.jpg", BASE), 7)
            .with_meta("_thumbnail_id", "1")
            .with_meta("_product_image_gallery", "2,x,")
            .with_meta("hero", "8")
            .with_content(100, r#"<!-- wp:image {"id":3} /-->"#)
            .with_content(101, r#"<p><img class="wp-image-4" src="https://cdn.example.com/4.jpg"></p>"#)
            .with_content(102, &format!(r#"<img src="{}/seven.jpg">"#, BASE))
            .with_content(103, "")
            .with_content(104, "<p>no images</p>")
    }

    #[test]
    fn test_scenario_a_featured_and_gallery() {
        let store = scenario_a_store();
        let report = run_scan(&store, DEFAULT_BATCH_SIZE).unwrap();

        assert_eq!(report.used_ids, ids(&[1, 2]));
        assert_eq!(report.unused_ids, ids(&[3]));
        assert_eq!(report.summary, Summary { total_images: 3, used: 2, unused: 1 });
        assert!(report.complete);
    }

    #[test]
    fn test_scenario_b_gallery_block_reclassifies_on_rescan() {
        let store = scenario_a_store();
        let before = run_scan(&store, DEFAULT_BATCH_SIZE).unwrap();
        assert!(before.unused_ids.contains(&AssetId::new(3).unwrap()));

        store
            .insert_content(11, "post", "publish", r#"<!-- wp:gallery {"ids":[3]} /-->"#)
            .unwrap();
        let after = run_scan(&store, DEFAULT_BATCH_SIZE).unwrap();

        assert_eq!(after.used_ids, ids(&[1, 2, 3]));
        assert!(after.unused_ids.is_empty());
    }

    #[test]
    fn test_scenario_c_foreign_host_is_not_resolved() {
        let store = store_with_assets(&[1, 2, 3]);
        store
            .insert_content(
                10,
                "post",
                "publish",
                r#"<img src="https://cdn.example.com/2024/05/img-2.jpg">"#,
            )
            .unwrap();

        let (report, stats) = Scanner::new(&store, ScanOptions::default())
            .run_with_stats()
            .unwrap();

        assert!(report.used_ids.is_empty());
        assert_eq!(report.unused_ids, ids(&[1, 2, 3]));
        assert_eq!(stats.cache.non_local, 1);
        assert_eq!(stats.cache.lookups, 0);
    }

    #[test]
    fn test_local_url_is_resolved() {
        let store = store_with_assets(&[1, 2, 3]);
        let body = format!(r#"<img src="{}/2024/05/img-2.jpg?ver=1">"#, BASE);
        store.insert_content(10, "post", "publish", &body).unwrap();

        let report = run_scan(&store, DEFAULT_BATCH_SIZE).unwrap();
        assert_eq!(report.used_ids, ids(&[2]));
    }

    #[test]
    fn test_scenario_d_empty_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        let report = run_scan(&store, DEFAULT_BATCH_SIZE).unwrap();

        assert!(report.used_ids.is_empty());
        assert!(report.unused_ids.is_empty());
        assert_eq!(report.summary, Summary { total_images: 0, used: 0, unused: 0 });
    }

    #[test]
    fn test_partition_law() {
        let store = mixed_fake();
        let report = run_scan(&store, 2).unwrap();

        let used: BTreeSet<AssetId> = report.used_ids.iter().copied().collect();
        let unused: BTreeSet<AssetId> = report.unused_ids.iter().copied().collect();
        let all: BTreeSet<AssetId> = ids(&[1, 2, 3, 4, 5, 6, 7, 8]).into_iter().collect();

        assert!(used.is_disjoint(&unused));
        assert_eq!(used.union(&unused).copied().collect::<BTreeSet<_>>(), all);
        assert_eq!(
            report.summary.total_images,
            report.summary.used + report.summary.unused
        );
        assert_eq!(report.used_ids, ids(&[1, 2, 3, 4, 7, 8]));
        assert_eq!(report.unused_ids, ids(&[5, 6]));
    }

    #[test]
    fn test_idempotent_rescan() {
        let store = mixed_fake();
        let first = run_scan(&store, 3).unwrap();
        let second = run_scan(&store, 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_order_independence() {
        let forward = run_scan(&mixed_fake(), 1).unwrap();

        let reversed_store = mixed_fake().reversed();
        let options = ScanOptions { batch_size: 4, ..ScanOptions::default() };
        let extractors = ExtractorSet::default().reversed();
        let backward = Scanner::new(&reversed_store, options)
            .with_extractors(extractors)
            .run()
            .unwrap();

        assert_eq!(forward, backward);
    }

    #[test]
    fn test_monotonicity_per_modality() {
        let bodies = [
            r#"<!-- wp:image {"id":3} /-->"#.to_string(),
            r#"<p class="wp-image-3"></p>"#.to_string(),
            format!(r#"<img src="{}/2024/05/img-3.jpg">"#, BASE),
        ];

        for body in bodies {
            let store = scenario_a_store();
            let before = run_scan(&store, DEFAULT_BATCH_SIZE).unwrap();
            store.insert_content(20, "page", "draft", &body).unwrap();
            let after = run_scan(&store, DEFAULT_BATCH_SIZE).unwrap();

            assert_eq!(before.unused_ids, ids(&[3]), "body: {}", body);
            assert_eq!(after.used_ids, ids(&[1, 2, 3]), "body: {}", body);
            assert!(after.unused_ids.is_empty(), "body: {}", body);
        }
    }

    #[test]
    fn test_used_stays_within_universe() {
        let store = FakeStore::new()
            .with_base_url(BASE)
            .with_assets(&[1])
            .with_url(format!("{}/doc.pdf", BASE), 9)
            .with_meta("_thumbnail_id", "42")
            .with_content(1, &format!(r#"<img src="{}/doc.pdf"><i class="wp-image-77"></i>"#, BASE));

        let (report, stats) = Scanner::new(&store, ScanOptions::default())
            .run_with_stats()
            .unwrap();

        assert!(report.used_ids.is_empty());
        assert_eq!(report.unused_ids, ids(&[1]));
        assert_eq!(stats.rejected_marks, 3);
    }

    #[test]
    fn test_direct_meta_field_toggle() {
        let store = store_with_assets(&[1, 2, 3]);
        store.insert_meta(10, "acf_banner_image", "3").unwrap();

        let enabled = run_scan(&store, DEFAULT_BATCH_SIZE).unwrap();
        assert_eq!(enabled.used_ids, ids(&[3]));

        let options = ScanOptions { direct_meta_field: false, ..ScanOptions::default() };
        let disabled = Scanner::new(&store, options).run().unwrap();
        assert!(disabled.used_ids.is_empty());
    }

    #[test]
    fn test_direct_meta_requires_bare_digits() {
        let fake = FakeStore::new()
            .with_assets(&[8, 9])
            .with_meta("hero", " 8")
            .with_meta("banner", "9");
        let sqlite = store_with_assets(&[8, 9]);
        sqlite.insert_meta(10, "hero", " 8").unwrap();
        sqlite.insert_meta(10, "banner", "9").unwrap();

        let from_fake = run_scan(&fake, DEFAULT_BATCH_SIZE).unwrap();
        let from_sqlite = run_scan(&sqlite, DEFAULT_BATCH_SIZE).unwrap();

        assert_eq!(from_fake.used_ids, ids(&[9]));
        assert_eq!(from_fake, from_sqlite);
    }

    #[test]
    fn test_marks_by_source() {
        let (_, stats) = Scanner::new(&mixed_fake(), ScanOptions::default())
            .run_with_stats()
            .unwrap();

        let count = |s: ReferenceSource| stats.marks_by_source.get(&s).copied().unwrap_or(0);
        assert_eq!(count(ReferenceSource::FeaturedImage), 1);
        assert_eq!(count(ReferenceSource::GalleryList), 1);
        assert_eq!(count(ReferenceSource::DirectMetaField), 2);
        assert_eq!(count(ReferenceSource::BlockAttribute), 1);
        assert_eq!(count(ReferenceSource::ClassNamePattern), 1);
        assert_eq!(count(ReferenceSource::EmbeddedUrl), 1);
        assert_eq!(stats.records, 4);
        assert_eq!(stats.structured_records, 1);
    }

    #[test]
    fn test_registry_failure_is_fatal() {
        let store = mixed_fake().failing_assets();
        assert!(matches!(run_scan(&store, 2), Err(Error::Store(_))));
    }

    #[test]
    fn test_invalid_batch_size() {
        let store = mixed_fake();
        assert!(matches!(run_scan(&store, 0), Err(Error::InvalidBatchSize(0))));
    }

    #[test]
    fn test_batch_failure_aborts_by_default() {
        let store = mixed_fake().failing_fetch_for(102);
        assert!(matches!(
            run_scan(&store, 2),
            Err(Error::BatchFetch { batch: 1, .. })
        ));
    }

    #[test]
    fn test_url_lookup_failure_aborts_by_default() {
        let store = mixed_fake().failing_url_lookups();
        assert!(matches!(run_scan(&store, 2), Err(Error::BatchFetch { .. })));
    }

    #[test]
    fn test_skip_policy_flags_report_incomplete() {
        let store = mixed_fake().failing_fetch_for(102);
        let options = ScanOptions {
            batch_size: 2,
            batch_errors: BatchErrorPolicy::Skip,
            ..ScanOptions::default()
        };

        let (report, stats) = Scanner::new(&store, options).run_with_stats().unwrap();
        assert!(!report.complete);
        assert_eq!(stats.skipped_batches, vec![1]);
        assert_eq!(stats.batches, 2);
        // 102 carried the only reference to 7
        assert!(report.unused_ids.contains(&AssetId::new(7).unwrap()));
    }

    #[test]
    fn test_cancelled_scan_reports_nothing() {
        let store = mixed_fake();
        let scanner = Scanner::new(&store, ScanOptions::default());
        scanner.cancel_token().cancel();
        assert!(matches!(scanner.run(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_deadline_exceeded() {
        let store = mixed_fake();
        let options = ScanOptions { deadline: Some(Duration::ZERO), ..ScanOptions::default() };
        assert!(matches!(
            Scanner::new(&store, options).run(),
            Err(Error::DeadlineExceeded)
        ));
    }

    #[test]
    fn test_progress_events() {
        let store = mixed_fake();
        let (tx, rx) = crossbeam::channel::unbounded();
        let options = ScanOptions { batch_size: 2, ..ScanOptions::default() };
        Scanner::new(&store, options).with_progress(tx).run().unwrap();

        let events: Vec<ProgressMessage> = rx.try_iter().collect();
        assert!(matches!(
            events.first(),
            Some(ProgressMessage::Started { phase: ProgressPhase::Inventory, .. })
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            ProgressMessage::Started { phase: ProgressPhase::Marking, total: 3 }
        )));
        let batch_ticks = events
            .iter()
            .filter(|e| matches!(e, ProgressMessage::Progress { phase: ProgressPhase::Marking, .. }))
            .count();
        assert_eq!(batch_ticks, 3);
        assert!(matches!(
            events.last(),
            Some(ProgressMessage::Finished { phase: ProgressPhase::Sweeping })
        ));
    }

    #[test]
    fn test_report_json_shape() {
        let report = run_scan(&scenario_a_store(), DEFAULT_BATCH_SIZE).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["used_ids"], serde_json::json!([1, 2]));
        assert_eq!(json["unused_ids"], serde_json::json!([3]));
        assert_eq!(json["summary"]["total_images"], 3);
        assert!(json.get("complete").is_none());
    }
}
