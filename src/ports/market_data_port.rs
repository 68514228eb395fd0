//! Market-data provider port.

use crate::domain::price_series::{PriceSeries, QuoteTable};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Errors a provider may return. Every variant is treated as retryable by acquisition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider api error{}: {message}", code_suffix(.code))]
    Api { code: Option<u16>, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("config error: {0}")]
    Config(String),
}

fn code_suffix(code: &Option<u16>) -> String {
    code.map(|c| format!(" code={c}")).unwrap_or_default()
}

/// End-of-day close provider. Date ranges are inclusive on both ends.
pub trait MarketDataPort {
    /// Human-readable provider name used in logs.
    fn name(&self) -> &str;

    /// Fetch closes for many symbols at once. Symbols the provider does not know are absent
    /// from the returned table rather than reported as errors.
    fn fetch(
        &self,
        symbols: &BTreeSet<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<QuoteTable, ProviderError>;

    /// Fetch the history of a single symbol.
    fn fetch_one(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError>;
}
