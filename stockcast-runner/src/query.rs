//! Read API: the queries the serving layer calls.
//!
//! Listings load every record in the universe, skip the ones that fail to
//! load (with a warning) and rank the rest. Single-symbol lookups surface a
//! missing symbol as [`QueryError::NotFound`].

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stockcast_core::domain::SymbolRecord;
use stockcast_core::ranking::growth_between;
use stockcast_core::store::{StoreError, StoreGateway};
use stockcast_core::{top_n, Clock, Ranked, RankingKey, SystemClock};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("stock not found: {symbol}")]
    NotFound { symbol: String },

    #[error("{symbol} has no price history")]
    EmptySeries { symbol: String },

    #[error("investment amount must be positive, got {0}")]
    InvalidAmount(f64),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for QueryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { symbol } => QueryError::NotFound { symbol },
            other => QueryError::Store(other),
        }
    }
}

/// A record as returned by the listing queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStock {
    #[serde(flatten)]
    pub record: SymbolRecord,
    /// Close of the last bar.
    #[serde(rename = "currPrice", default, skip_serializing_if = "Option::is_none")]
    pub curr_price: Option<f64>,
    /// Trailing growth over the query's window, when computable.
    #[serde(
        rename = "percentGrowth",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub percent_growth: Option<f64>,
}

impl RankedStock {
    fn from_ranked(ranked: Ranked<'_>, percent_growth: Option<f64>) -> Self {
        Self {
            curr_price: ranked.record.current_price(),
            record: ranked.record.clone(),
            percent_growth,
        }
    }
}

/// Compact view for a portfolio row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub display_name: String,
    pub current_price: f64,
    #[serde(rename = "iconURL")]
    pub icon_url: String,
}

pub struct QueryService {
    store: Arc<dyn StoreGateway>,
    clock: Arc<dyn Clock>,
}

impl QueryService {
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Top `n` symbols by close growth over the trailing `days`.
    pub fn get_top_stocks(&self, days: i64, n: usize) -> Result<Vec<RankedStock>, QueryError> {
        let records = self.load_universe()?;
        Ok(top_n(&records, RankingKey::TrailingGrowth { days }, n)
            .into_iter()
            .map(|r| RankedStock::from_ranked(r, Some(r.metric)))
            .collect())
    }

    /// Top `n` symbols by predicted percent increase at the horizon for `months`.
    pub fn get_future_top_stocks(
        &self,
        months: u32,
        n: usize,
    ) -> Result<Vec<RankedStock>, QueryError> {
        let records = self.load_universe()?;
        Ok(top_n(&records, RankingKey::predicted(months), n)
            .into_iter()
            .map(|r| RankedStock::from_ranked(r, None))
            .collect())
    }

    pub fn get_stock_data(&self, symbol: &str) -> Result<SymbolRecord, QueryError> {
        Ok(self.store.get_record(symbol)?)
    }

    pub fn get_stock_portfolio_summary(
        &self,
        symbol: &str,
    ) -> Result<PortfolioSummary, QueryError> {
        let record = self.store.get_record(symbol)?;
        let current_price = record.current_price().ok_or_else(|| QueryError::EmptySeries {
            symbol: symbol.to_string(),
        })?;
        Ok(PortfolioSummary {
            display_name: record.display_name,
            current_price,
            icon_url: record.icon_url,
        })
    }

    /// Symbols priced below a fifth of `amount`, ranked by predicted growth
    /// for `months`. Each carries its growth over the past `months`.
    pub fn recommend_stocks(
        &self,
        amount: f64,
        months: u32,
        n: usize,
    ) -> Result<Vec<RankedStock>, QueryError> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(QueryError::InvalidAmount(amount));
        }
        let ceiling = amount / 5.0;
        let today = self.clock.today();
        let since = today
            .checked_sub_months(Months::new(months))
            .unwrap_or(NaiveDate::MIN);

        let records = self.load_universe()?;
        let affordable = records
            .iter()
            .filter(|r| r.current_price().is_some_and(|p| p < ceiling));

        Ok(top_n(affordable, RankingKey::predicted(months), n)
            .into_iter()
            .map(|r| {
                let growth = growth_between(r.record, since, today);
                RankedStock::from_ranked(r, growth)
            })
            .collect())
    }

    /// Every loadable record in universe order.
    pub fn load_universe(&self) -> Result<Vec<SymbolRecord>, QueryError> {
        let tickers = self.store.ticker_list().map_err(QueryError::Store)?;
        let mut records = Vec::with_capacity(tickers.len());
        for symbol in &tickers {
            match self.store.get_record(symbol) {
                Ok(record) => records.push(record),
                Err(e) => warn!(symbol = %symbol, cause = %e, "skipping unreadable record"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockcast_core::domain::Bar;
    use stockcast_core::store::MemoryStore;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn store_not_found_maps_to_query_not_found() {
        let err: QueryError = StoreError::NotFound {
            symbol: "X".into(),
        }
        .into();
        assert_eq!(err, QueryError::NotFound { symbol: "X".into() });
    }

    #[test]
    fn ranked_stock_flattens_record() {
        let mut record = SymbolRecord::new("X", "X Corp", "https://x/icon.png");
        record.series = vec![Bar::new(d(1, 2), 1.0, 1.0, 1.0, 10.0, 5)];
        let stock = RankedStock {
            curr_price: record.current_price(),
            record,
            percent_growth: Some(1.5),
        };
        let json = serde_json::to_value(&stock).unwrap();
        assert_eq!(json["symbol"], "X");
        assert_eq!(json["iconURL"], "https://x/icon.png");
        assert_eq!(json["currPrice"], 10.0);
        assert_eq!(json["percentGrowth"], 1.5);

        let back: RankedStock = serde_json::from_value(json).unwrap();
        assert_eq!(back, stock);
    }

    #[test]
    fn non_positive_amount_rejected() {
        let service = QueryService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            service.recommend_stocks(0.0, 12, 5),
            Err(QueryError::InvalidAmount(_))
        ));
    }
}
