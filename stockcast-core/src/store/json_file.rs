//! JSON document store on the local filesystem.
//!
//! Layout:
//! - `{store_dir}/tickers.json`: `{"tickers": [...]}`, the symbol universe
//! - `{store_dir}/{DOCUMENT_ID}.json`: one pretty-printed record per symbol
//!
//! Writes are atomic (write to .tmp, rename into place).

use super::{document_id, StoreError, StoreGateway, TICKERS_ID};
use crate::domain::SymbolRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TickerList {
    tickers: Vec<String>,
}

pub struct JsonFileStore {
    store_dir: PathBuf,
    /// Serializes read-modify-write of the ticker list.
    tickers_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            tickers_lock: Mutex::new(()),
        }
    }

    /// Root directory of the store.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    fn tickers_path(&self) -> PathBuf {
        self.store_dir.join(format!("{TICKERS_ID}.json"))
    }

    fn record_path(&self, symbol: &str) -> Result<PathBuf, StoreError> {
        Ok(self.store_dir.join(format!("{}.json", document_id(symbol)?)))
    }

    fn read_tickers(&self) -> Result<TickerList, StoreError> {
        let path = self.tickers_path();
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                key: "tickers".into(),
                reason: e.to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(TickerList::default()),
            Err(e) => Err(StoreError::Read {
                key: "tickers".into(),
                reason: e.to_string(),
            }),
        }
    }
}

impl StoreGateway for JsonFileStore {
    fn ticker_list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read_tickers()?.tickers)
    }

    fn get_record(&self, symbol: &str) -> Result<SymbolRecord, StoreError> {
        let path = self.record_path(symbol)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    symbol: symbol.to_string(),
                })
            }
            Err(e) => {
                return Err(StoreError::Read {
                    key: symbol.to_string(),
                    reason: e.to_string(),
                })
            }
        };
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            key: symbol.to_string(),
            reason: e.to_string(),
        })
    }

    fn put_record(&self, symbol: &str, record: &SymbolRecord) -> Result<(), StoreError> {
        let path = self.record_path(symbol)?;
        let json = serde_json::to_string_pretty(record).map_err(|e| StoreError::Write {
            key: symbol.to_string(),
            reason: format!("serialization: {e}"),
        })?;
        write_atomic(&path, json.as_bytes()).map_err(|reason| {
            StoreError::Write {
                key: symbol.to_string(),
                reason,
            }
        })
    }

    fn register_ticker(&self, symbol: &str) -> Result<bool, StoreError> {
        document_id(symbol)?;
        let _guard = self
            .tickers_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut list = self.read_tickers()?;
        if list.tickers.iter().any(|t| t == symbol) {
            return Ok(false);
        }
        list.tickers.push(symbol.to_string());
        let json = serde_json::to_string_pretty(&list).map_err(|e| StoreError::Write {
            key: "tickers".into(),
            reason: format!("serialization: {e}"),
        })?;
        write_atomic(&self.tickers_path(), json.as_bytes()).map_err(|reason| StoreError::Write {
            key: "tickers".into(),
            reason,
        })?;
        Ok(true)
    }
}

/// Write to `{path}.tmp` and rename into place.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("failed to create dir: {e}"))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents).map_err(|e| format!("write temp file: {e}"))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        format!("atomic rename failed: {e}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::NaiveDate;

    fn sample_record() -> SymbolRecord {
        let mut r = SymbolRecord::new("RELIANCE.NS", "Reliance Industries", "https://x/r.png");
        r.series.push(Bar::new(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            100.0,
            102.0,
            99.0,
            101.0,
            1000,
        ));
        r.last_data_update_date = NaiveDate::from_ymd_opt(2024, 1, 2);
        r
    }

    #[test]
    fn write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.put_record("RELIANCE.NS", &sample_record()).unwrap();
        assert!(dir.path().join("RELIANCE_NS.json").exists());

        let loaded = store.get_record("RELIANCE.NS").unwrap();
        assert_eq!(loaded, sample_record());
    }

    #[test]
    fn missing_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let err = store.get_record("NOPE").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn corrupt_record_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        fs::write(dir.path().join("BAD.json"), "{ not json").unwrap();
        assert!(matches!(
            store.get_record("BAD"),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn ticker_registration_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.ticker_list().unwrap().is_empty());

        assert!(store.register_ticker("SPY").unwrap());
        assert!(store.register_ticker("QQQ").unwrap());
        assert!(!store.register_ticker("SPY").unwrap());

        assert_eq!(store.ticker_list().unwrap(), vec!["SPY", "QQQ"]);
    }

    #[test]
    fn unsafe_symbols_never_touch_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("store"));
        store.register_ticker("SPY").unwrap();

        let err = store.put_record("tickers", &sample_record()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSymbol { .. }));
        assert_eq!(store.ticker_list().unwrap(), vec!["SPY"]);

        for symbol in ["../escape", "a/b"] {
            assert!(store.put_record(symbol, &sample_record()).is_err());
            assert!(store.register_ticker(symbol).is_err());
        }
        assert!(!dir.path().join("escape.json").exists());
        assert_eq!(store.ticker_list().unwrap(), vec!["SPY"]);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.put_record("SPY", &sample_record()).unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
