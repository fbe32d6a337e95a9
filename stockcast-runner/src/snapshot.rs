//! Cached ranking snapshots for fast serving.
//!
//! Layout:
//! - `{snapshot_dir}/trendingStocks.json`: `{"trendingStocks": [...]}`
//! - `{snapshot_dir}/topStocks.json`: `{"topStocks": [...]}`

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stockcast_core::store::write_atomic;
use thiserror::Error;
use tracing::info;

use crate::query::{QueryError, QueryService, RankedStock};

pub const TRENDING_FILE: &str = "trendingStocks.json";
pub const TOP_FILE: &str = "topStocks.json";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to rank stocks: {0}")]
    Query(#[from] QueryError),

    #[error("failed to write snapshot {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("snapshot {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingSnapshot {
    pub trending_stocks: Vec<RankedStock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSnapshot {
    pub top_stocks: Vec<RankedStock>,
}

/// Window and size for the two lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSettings {
    pub trending_days: i64,
    pub top_days: i64,
    pub size: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            trending_days: 7,
            top_days: 30,
            size: 10,
        }
    }
}

pub struct SnapshotWriter {
    query: Arc<QueryService>,
    dir: PathBuf,
    settings: SnapshotSettings,
}

impl SnapshotWriter {
    pub fn new(query: Arc<QueryService>, dir: impl Into<PathBuf>, settings: SnapshotSettings) -> Self {
        Self {
            query,
            dir: dir.into(),
            settings,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Recompute and write both snapshots.
    pub fn refresh(&self) -> Result<(TrendingSnapshot, TopSnapshot), SnapshotError> {
        let trending = TrendingSnapshot {
            trending_stocks: self
                .query
                .get_top_stocks(self.settings.trending_days, self.settings.size)?,
        };
        let top = TopSnapshot {
            top_stocks: self
                .query
                .get_top_stocks(self.settings.top_days, self.settings.size)?,
        };

        write_json(&self.dir.join(TRENDING_FILE), &trending)?;
        write_json(&self.dir.join(TOP_FILE), &top)?;
        info!(
            dir = %self.dir.display(),
            trending = trending.trending_stocks.len(),
            top = top.top_stocks.len(),
            "snapshots written"
        );
        Ok((trending, top))
    }

    pub fn read_trending(&self) -> Result<TrendingSnapshot, SnapshotError> {
        read_json(&self.dir.join(TRENDING_FILE))
    }

    pub fn read_top(&self) -> Result<TopSnapshot, SnapshotError> {
        read_json(&self.dir.join(TOP_FILE))
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SnapshotError> {
    let write_err = |reason: String| SnapshotError::Write {
        path: path.to_path_buf(),
        reason,
    };
    let json = serde_json::to_string_pretty(value).map_err(|e| write_err(e.to_string()))?;
    write_atomic(path, json.as_bytes()).map_err(write_err)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, SnapshotError> {
    let content = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SnapshotError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockcast_core::store::MemoryStore;

    #[test]
    fn missing_snapshot_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(
            Arc::new(QueryService::new(Arc::new(MemoryStore::new()))),
            dir.path(),
            SnapshotSettings::default(),
        );
        assert!(matches!(writer.read_top(), Err(SnapshotError::Read { .. })));
    }

    #[test]
    fn empty_universe_writes_empty_lists() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(
            Arc::new(QueryService::new(Arc::new(MemoryStore::new()))),
            dir.path().join("snapshots"),
            SnapshotSettings::default(),
        );
        writer.refresh().unwrap();

        let raw = fs::read_to_string(dir.path().join("snapshots").join(TRENDING_FILE)).unwrap();
        assert!(raw.contains("\"trendingStocks\": []"));
        assert!(writer.read_top().unwrap().top_stocks.is_empty());
        let leftovers = fs::read_dir(dir.path().join("snapshots"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
