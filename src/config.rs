use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scan::{BatchErrorPolicy, ScanOptions};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MediasweepConfig {
    pub database: Option<String>,
    pub batch_size: Option<usize>,
    pub direct_meta_field: Option<bool>,
    pub skip_failed_batches: Option<bool>,
    pub featured_meta_key: Option<String>,
    pub gallery_meta_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl MediasweepConfig {
    /// Scan options with every unset field left at its default
    pub fn scan_options(&self) -> Result<ScanOptions> {
        let mut options = ScanOptions::default();
        if let Some(batch_size) = self.batch_size {
            if batch_size == 0 {
                return Err(Error::Config("batch_size must be at least 1".into()));
            }
            options.batch_size = batch_size;
        }
        if let Some(direct) = self.direct_meta_field {
            options.direct_meta_field = direct;
        }
        if self.skip_failed_batches == Some(true) {
            options.batch_errors = BatchErrorPolicy::Skip;
        }
        if let Some(key) = &self.featured_meta_key {
            options.featured_meta_key = key.clone();
        }
        if let Some(key) = &self.gallery_meta_key {
            options.gallery_meta_key = key.clone();
        }
        options.deadline = self.timeout_secs.map(Duration::from_secs);
        Ok(options)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("mediasweep.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from("mediasweep.db")
}

pub fn load_config(path: Option<&Path>) -> Result<Option<MediasweepConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: MediasweepConfig = toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &MediasweepConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        )));
    }

    let contents = toml::to_string_pretty(config).map_err(|e| Error::Config(e.to_string()))?;
    std::fs::write(path, contents)?;
    Ok(())
}
