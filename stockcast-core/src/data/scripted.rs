//! Scripted market data source for tests and offline runs.
//!
//! Each symbol answers with a fixed set of bars (filtered to the requested
//! range) or a fixed error. Every call is recorded so tests can assert on the
//! requested ranges.

use super::provider::{DataError, MarketDataSource};
use crate::domain::Bar;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
enum Script {
    Bars(Vec<Bar>),
    Fail(DataError),
}

/// One recorded `fetch_bars` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub symbol: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<FetchCall>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `symbol` with the bars of `bars` inside the range.
    pub fn with_bars(self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.set_bars(symbol, bars);
        self
    }

    /// Answer every request for `symbol` with `error`.
    pub fn with_failure(self, symbol: &str, error: DataError) -> Self {
        self.set_failure(symbol, error);
        self
    }

    pub fn set_bars(&self, symbol: &str, bars: Vec<Bar>) {
        lock(&self.scripts).insert(symbol.to_string(), Script::Bars(bars));
    }

    pub fn set_failure(&self, symbol: &str, error: DataError) {
        lock(&self.scripts).insert(symbol.to_string(), Script::Fail(error));
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<FetchCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, symbol: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.symbol == symbol).count()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MarketDataSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        lock(&self.calls).push(FetchCall {
            symbol: symbol.to_string(),
            from,
            to,
        });

        match lock(&self.scripts).get(symbol) {
            Some(Script::Bars(bars)) => Ok(bars
                .iter()
                .filter(|b| b.date >= from && b.date <= to)
                .cloned()
                .collect()),
            Some(Script::Fail(err)) => Err(err.clone()),
            None => Ok(Vec::new()),
        }
    }
}
