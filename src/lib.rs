//! # Mediasweep - Media reachability scanner
//!
//! Classifies every image asset of a content store as used or unused.
//!
//! Mediasweep provides:
//! - A mark phase that discovers asset references in metadata fields,
//!   comma-separated lists, block trees, class markers and `<img>` URLs
//! - A memoizing URL → asset resolver restricted to the local origin
//! - Windowed content streaming so memory stays bounded
//! - A sweep that reports `used`/`unused` ids in ascending order
//! - A SQLite-backed store for content-management style databases
//!
//! The scan is heuristic: it finds every reference in a recognized pattern,
//! nothing more. Images referenced only from stylesheets, scripts or other
//! origins are reported as unused.

pub mod asset;
pub mod block;
pub mod storage;
pub mod scan;
pub mod output;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use asset::{AssetId, ContentId, AssetRecord};
pub use block::{BlockNode, BlockKind};
pub use scan::{ScanOptions, ScanReport, Scanner, Summary, run_scan};
pub use storage::{MediaStore, SqliteStore};

/// Result type alias for Mediasweep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Mediasweep operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid batch size: {0} (must be at least 1)")]
    InvalidBatchSize(usize),

    #[error("Content batch {batch} failed: {source}")]
    BatchFetch {
        batch: usize,
        source: Box<Error>,
    },

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Scan deadline exceeded")]
    DeadlineExceeded,
}
