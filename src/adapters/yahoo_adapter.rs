//! Remote quote service adapter for the Yahoo chart API.
//!
//! The chart endpoint serves one symbol per request, so a bulk fetch issues one request per
//! symbol and merges the results. Unknown symbols come back empty; transport failures,
//! throttling and server errors are returned as [`ProviderError`] for the caller to retry.

use crate::domain::error::FolioError;
use crate::domain::price_series::{PriceSeries, QuoteTable};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::{MarketDataPort, ProviderError};
use chrono::{DateTime, Duration as DateSpan, NaiveDate};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_TIMEOUT_SECS: i64 = 30;
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; folio)";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
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
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

pub struct YahooAdapter {
    base_url: Url,
    client: Client,
}

impl YahooAdapter {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, ProviderError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ProviderError::Config(format!("invalid base_url {base_url:?}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { base_url, client })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FolioError> {
        let base_url = config
            .get_trimmed("provider", "base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let bad_url = |reason: String| FolioError::ConfigInvalid {
            section: "provider".into(),
            key: "base_url".into(),
            reason,
        };
        let parsed = Url::parse(&base_url).map_err(|e| bad_url(format!("{base_url:?}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(bad_url(format!("{base_url:?} cannot carry a path")));
        }
        let timeout = config.get_int("provider", "timeout_secs", DEFAULT_TIMEOUT_SECS);
        let user_agent = config
            .get_trimmed("provider", "user_agent")
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        Ok(Self::new(
            &base_url,
            Duration::from_secs(timeout.max(1) as u64),
            &user_agent,
        )?)
    }

    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Config("base_url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        // period2 is exclusive upstream, so push it to the start of the following day.
        let period1 = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let period2 = end
            .checked_add_signed(DateSpan::days(1))
            .ok_or_else(|| ProviderError::Config(format!("end date {end} is out of range")))?
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        url.query_pairs_mut()
            .append_pair("interval", "1d")
            .append_pair("events", "history")
            .append_pair("period1", &period1.to_string())
            .append_pair("period2", &period2.to_string());
        Ok(url)
    }

    fn fetch_chart(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        let url = self.chart_url(symbol, start, end)?;
        debug!(%url, "requesting chart");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(PriceSeries::empty(symbol));
        }
        if !status.is_success() {
            return Err(ProviderError::Api {
                code: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }
        let body = response
            .text()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        parse_chart(symbol, &body, start, end)
    }
}

/// Decode a chart payload into the closes between `start` and `end` inclusive.
///
/// Adjusted closes are preferred when present. Bars are dated in the exchange's local time.
pub fn parse_chart(
    symbol: &str,
    body: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceSeries, ProviderError> {
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Decode(e.to_string()))?;

    if let Some(error) = response.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Ok(PriceSeries::empty(symbol));
        }
        return Err(ProviderError::Api {
            code: None,
            message: format!(
                "{}: {}",
                error.code,
                error.description.unwrap_or_default()
            ),
        });
    }

    let Some(data) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(PriceSeries::empty(symbol));
    };
    let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let timestamps = data.timestamp.unwrap_or_default();
    let closes = match data.indicators.adjclose.into_iter().next() {
        Some(adj) if !adj.adjclose.is_empty() => adj.adjclose,
        _ => data
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .unwrap_or_default(),
    };

    let points = timestamps
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            Some((date, close?))
        })
        .filter(|(date, _)| *date >= start && *date <= end);

    Ok(PriceSeries::new(symbol, points))
}

impl MarketDataPort for YahooAdapter {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch(
        &self,
        symbols: &BTreeSet<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<QuoteTable, ProviderError> {
        let mut fetched = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            fetched.push(self.fetch_chart(symbol, start, end)?);
        }
        Ok(QuoteTable::from_series(&fetched))
    }

    fn fetch_one(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        self.fetch_chart(symbol, start, end)
    }
}
