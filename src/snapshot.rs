//! Stats cache loading
//!
//! The stats cache is recomputed by the assistant itself; this exporter only
//! reads it. The file's on-disk modification time, not any date inside the JSON,
//! marks the boundary of what the cache already accounts for and is handed to
//! the [`SessionScanner`](crate::scanner::SessionScanner) as its cutoff.

use crate::models::StatsCache;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("stats file {} is unavailable: {source}", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("stats file {} is malformed: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A parsed stats cache and the modification time of the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub stats: StatsCache,
    pub modified: SystemTime,
}

pub struct SnapshotLoader {
    path: PathBuf,
}

impl SnapshotLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the stats cache.
    ///
    /// Metadata is taken from the same open handle the contents are read from.
    pub fn load(&self) -> Result<LoadedSnapshot, SnapshotError> {
        let unavailable = |source: io::Error| SnapshotError::Unavailable {
            path: self.path.clone(),
            source,
        };

        let mut file = File::open(&self.path).map_err(unavailable)?;
        let modified = file
            .metadata()
            .and_then(|meta| meta.modified())
            .map_err(unavailable)?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).map_err(unavailable)?;

        let stats = serde_json::from_slice(&contents).map_err(|source| SnapshotError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        Ok(LoadedSnapshot { stats, modified })
    }
}
