//! In-memory store with failure injection, for tests and dry runs.

use super::{document_id, StoreError, StoreGateway};
use crate::domain::SymbolRecord;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Inner {
    tickers: Vec<String>,
    records: BTreeMap<String, SymbolRecord>,
    failing_reads: BTreeSet<String>,
    failing_writes: BTreeSet<String>,
    writes: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding `records`, registered in the given order.
    pub fn with_records(records: impl IntoIterator<Item = SymbolRecord>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for record in records {
                inner.tickers.push(record.symbol.clone());
                inner.records.insert(record.symbol.clone(), record);
            }
        }
        store
    }

    /// Make every `get_record` for `symbol` fail with a read error.
    pub fn fail_reads_for(&self, symbol: &str) {
        self.lock().failing_reads.insert(symbol.to_string());
    }

    /// Make every `put_record` for `symbol` fail with a write error.
    pub fn fail_writes_for(&self, symbol: &str) {
        self.lock().failing_writes.insert(symbol.to_string());
    }

    /// Number of successful `put_record` calls.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Current record without going through the gateway.
    pub fn snapshot(&self, symbol: &str) -> Option<SymbolRecord> {
        self.lock().records.get(symbol).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StoreGateway for MemoryStore {
    fn ticker_list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock().tickers.clone())
    }

    fn get_record(&self, symbol: &str) -> Result<SymbolRecord, StoreError> {
        let inner = self.lock();
        if inner.failing_reads.contains(symbol) {
            return Err(StoreError::Read {
                key: symbol.to_string(),
                reason: "injected read failure".into(),
            });
        }
        inner
            .records
            .get(symbol)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                symbol: symbol.to_string(),
            })
    }

    fn put_record(&self, symbol: &str, record: &SymbolRecord) -> Result<(), StoreError> {
        document_id(symbol)?;
        let mut inner = self.lock();
        if inner.failing_writes.contains(symbol) {
            return Err(StoreError::Write {
                key: symbol.to_string(),
                reason: "injected write failure".into(),
            });
        }
        inner.records.insert(symbol.to_string(), record.clone());
        inner.writes += 1;
        Ok(())
    }

    fn register_ticker(&self, symbol: &str) -> Result<bool, StoreError> {
        document_id(symbol)?;
        let mut inner = self.lock();
        if inner.tickers.iter().any(|t| t == symbol) {
            return Ok(false);
        }
        inner.tickers.push(symbol.to_string());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_failures() {
        let store = MemoryStore::with_records([SymbolRecord::new("A", "", "")]);
        store.fail_reads_for("A");
        assert!(matches!(store.get_record("A"), Err(StoreError::Read { .. })));

        store.fail_writes_for("B");
        let err = store.put_record("B", &SymbolRecord::new("B", "", "")).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn registration_order_is_kept() {
        let store = MemoryStore::new();
        store.register_ticker("B").unwrap();
        store.register_ticker("A").unwrap();
        assert_eq!(store.ticker_list().unwrap(), vec!["B", "A"]);
    }
}
