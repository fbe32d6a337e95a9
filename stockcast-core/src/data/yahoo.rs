//! Yahoo Finance market data source.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API, guarded by the circuit
//! breaker. Yahoo Finance has no official API and is subject to unannounced
//! format changes; anything unexpected surfaces as `ResponseFormatChanged`.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, MarketDataSource};
use crate::domain::Bar;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    gmtoffset: Option<i64>,
    regular_market_time: Option<i64>,
    current_trading_period: Option<TradingPeriods>,
}

impl ChartMeta {
    /// Bounds of today's regular session while it is still trading.
    fn live_session(&self) -> Option<&TradingPeriod> {
        let session = self.current_trading_period.as_ref()?.regular.as_ref()?;
        let last_trade = self.regular_market_time?;
        (last_trade < session.end).then_some(session)
    }
}

#[derive(Debug, Deserialize)]
struct TradingPeriods {
    regular: Option<TradingPeriod>,
}

#[derive(Debug, Deserialize)]
struct TradingPeriod {
    start: i64,
    end: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// HTTP settings for the Yahoo source.
#[derive(Debug, Clone)]
pub struct YahooSettings {
    pub request_timeout: Duration,
    /// Extra attempts after a transient failure. Zero means a single request.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 0,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Yahoo Finance market data source.
pub struct YahooSource {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    settings: YahooSettings,
}

impl YahooSource {
    pub fn new(
        circuit_breaker: Arc<CircuitBreaker>,
        settings: YahooSettings,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            settings,
        })
    }

    /// Build the chart API URL for a symbol and date range.
    fn chart_url(symbol: &str, from: NaiveDate, to: NaiveDate) -> String {
        let start_ts = from.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = to.and_time(chrono::NaiveTime::MIN).and_utc().timestamp() + 86_399;
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d"
        )
    }

    /// Parse the chart API response into completed-session bars within
    /// `[from, to]`. The session still trading is dropped; its close is a
    /// live price and would never be corrected once stored.
    fn parse_response(
        symbol: &str,
        resp: ChartResponse,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        let result = match (resp.chart.result, resp.chart.error) {
            (Some(result), _) => result,
            (None, Some(err)) if err.code == "Not Found" => {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                })
            }
            (None, Some(err)) => {
                return Err(DataError::ResponseFormatChanged(format!(
                    "{}: {}",
                    err.code, err.description
                )))
            }
            (None, None) => {
                return Err(DataError::ResponseFormatChanged(
                    "empty result with no error".into(),
                ))
            }
        };

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // No timestamps means no trading days in the range.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };
        let offset = data.meta.as_ref().and_then(|m| m.gmtoffset).unwrap_or(0);
        let live = data.meta.as_ref().and_then(ChartMeta::live_session);
        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

        let mut bars: Vec<Bar> = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts + offset, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
            let (Some(open), Some(high), Some(low), Some(close)) = (
                field(&quote.open),
                field(&quote.high),
                field(&quote.low),
                field(&quote.close),
            ) else {
                // Holidays come back as null rows.
                debug!(symbol, %date, "skipping incomplete quote row");
                continue;
            };

            if live.is_some_and(|s| ts >= s.start && ts < s.end) {
                debug!(symbol, %date, "skipping session still in progress");
                continue;
            }

            if date < from || date > to {
                continue;
            }
            // Yahoo occasionally repeats the last session with a live timestamp.
            if bars.last().is_some_and(|b| b.date >= date) {
                continue;
            }

            let volume = quote.volume.get(i).copied().flatten().unwrap_or(0);
            bars.push(Bar::new(date, open, high, low, close, volume));
        }

        Ok(bars)
    }

    /// Execute the HTTP request with circuit breaker and bounded retry.
    fn fetch_with_retry(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        let url = Self::chart_url(symbol, from, to);
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let delay = self.settings.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                warn!(symbol, "provider returned 403, opening circuit breaker");
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "failed to parse response for {symbol}: {e}"
                ))
            })?;

            let bars = Self::parse_response(symbol, chart, from, to)?;
            self.circuit_breaker.record_success();
            return Ok(bars);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl MarketDataSource for YahooSource {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        if from > to {
            return Ok(Vec::new());
        }
        self.fetch_with_retry(symbol, from, to)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
