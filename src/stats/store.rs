//! Durable storage for the statistics snapshot.

use crate::{Error, ErrorContext, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub const STATS_FILE_NAME: &str = "cache_stats.json";

/// Byte-oriented read/write of a single named blob.
pub trait StatsStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Vec<u8>>>;
    /// Replace the blob. Readers must never observe a partial write.
    fn save(&self, bytes: &[u8]) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Stores the snapshot as a file, replaced atomically via a temp file and rename.
#[derive(Debug, Clone)]
pub struct FileStatsStore {
    path: PathBuf,
}

impl FileStatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<platform data dir>/<app_name>/cache_stats.json`
    pub fn in_data_dir(app_name: &str) -> Result<Self> {
        let base = dirs::data_dir().ok_or_else(|| {
            Error::configuration_with_context(
                "no platform data directory available",
                ErrorContext::new()
                    .with_field_path("stats_path")
                    .with_source("stats_store"),
            )
        })?;
        Ok(Self::new(base.join(app_name).join(STATS_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatsStore for FileStatsStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// In-memory store for testing.
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    blob: Mutex<Option<Vec<u8>>>,
    saves: Mutex<usize>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            blob: Mutex::new(Some(bytes.into())),
            saves: Mutex::new(0),
        }
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        self.blob
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StatsStore for MemoryStatsStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.contents())
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        *self.blob.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes.to_vec());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
