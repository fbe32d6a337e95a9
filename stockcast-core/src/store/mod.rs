//! Store gateway: typed access to persisted symbol records.
//!
//! The gateway is the only way the rest of the system reads or writes records.
//! Absence is a typed [`StoreError::NotFound`], never an empty document.

pub mod json_file;
pub mod memory;

pub use json_file::{write_atomic, JsonFileStore};
pub use memory::MemoryStore;

use crate::domain::SymbolRecord;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("symbol not found: {symbol}")]
    NotFound { symbol: String },

    #[error("failed to read '{key}': {reason}")]
    Read { key: String, reason: String },

    #[error("failed to write '{key}': {reason}")]
    Write { key: String, reason: String },

    #[error("corrupt document '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("invalid symbol '{symbol}': {reason}")]
    InvalidSymbol { symbol: String, reason: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Persistent record storage.
pub trait StoreGateway: Send + Sync {
    /// The full symbol universe, in registration order.
    fn ticker_list(&self) -> Result<Vec<String>, StoreError>;

    fn get_record(&self, symbol: &str) -> Result<SymbolRecord, StoreError>;

    fn put_record(&self, symbol: &str, record: &SymbolRecord) -> Result<(), StoreError>;

    /// Add a symbol to the universe. Returns false if it was already present.
    fn register_ticker(&self, symbol: &str) -> Result<bool, StoreError>;
}

/// Document id reserved for the symbol universe.
pub const TICKERS_ID: &str = "tickers";

/// Document id for a symbol. Dots are not allowed in document ids, so
/// `RELIANCE.NS` is stored as `RELIANCE_NS`.
///
/// Symbols may only use ASCII letters, digits and `. - ^ = _` (covering
/// forms like `^GSPC`, `BRK-B`, `EURUSD=X`), and must not map onto the
/// universe document.
pub fn document_id(symbol: &str) -> Result<String, StoreError> {
    let invalid = |reason: &str| StoreError::InvalidSymbol {
        symbol: symbol.to_string(),
        reason: reason.to_string(),
    };
    if symbol.is_empty() {
        return Err(invalid("empty"));
    }
    if let Some(c) = symbol
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=' | '_')))
    {
        return Err(invalid(&format!("character {c:?} is not allowed")));
    }
    let id = symbol.replace('.', "_");
    if id.eq_ignore_ascii_case(TICKERS_ID) {
        return Err(invalid("reserved for the symbol universe"));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_replaces_dots() {
        assert_eq!(document_id("RELIANCE.NS").unwrap(), "RELIANCE_NS");
        assert_eq!(document_id("AAPL").unwrap(), "AAPL");
    }

    #[test]
    fn document_id_accepts_index_and_class_symbols() {
        for symbol in ["^GSPC", "BRK-B", "EURUSD=X"] {
            assert_eq!(document_id(symbol).unwrap(), symbol);
        }
    }

    #[test]
    fn document_id_rejects_paths_and_reserved_names() {
        for symbol in ["", "tickers", "TICKERS", "../etc", "a/b", "a\\b", "SP Y"] {
            assert!(
                matches!(document_id(symbol), Err(StoreError::InvalidSymbol { .. })),
                "{symbol:?} should be rejected"
            );
        }
    }
}
