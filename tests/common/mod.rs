#![allow(dead_code)]

use chrono::NaiveDate;
use folio::domain::position::RawPosition;
use folio::domain::price_series::{PriceSeries, QuoteTable};
use folio::ports::clock_port::ClockPort;
use folio::ports::market_data_port::{MarketDataPort, ProviderError};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

/// One request seen by [`MockMarketData`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch {
        symbols: Vec<String>,
        start: NaiveDate,
        end: NaiveDate,
    },
    FetchOne {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// In-memory provider. Series are clipped to the requested window like a real service.
pub struct MockMarketData {
    pub data: HashMap<String, Vec<(NaiveDate, f64)>>,
    /// Symbols whose every request fails.
    pub errors: HashMap<String, ProviderError>,
    /// Symbols left out of bulk results but served by single-symbol fetches.
    pub bulk_missing: HashSet<String>,
    /// Number of upcoming bulk fetches that fail with a transport error.
    pub transient_failures: Cell<u32>,
    pub calls: RefCell<Vec<Call>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            bulk_missing: HashSet::new(),
            transient_failures: Cell::new(0),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_series(mut self, symbol: &str, points: Vec<(NaiveDate, f64)>) -> Self {
        self.data.insert(symbol.to_string(), points);
        self
    }

    pub fn with_error(mut self, symbol: &str, error: ProviderError) -> Self {
        self.errors.insert(symbol.to_string(), error);
        self
    }

    pub fn with_bulk_missing(mut self, symbol: &str) -> Self {
        self.bulk_missing.insert(symbol.to_string());
        self
    }

    pub fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.set(count);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    fn series(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        let points = self
            .data
            .get(symbol)
            .map(|pts| {
                pts.iter()
                    .filter(|(d, _)| *d >= start && *d <= end)
                    .copied()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        PriceSeries::new(symbol, points)
    }
}

impl MarketDataPort for MockMarketData {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(
        &self,
        symbols: &BTreeSet<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<QuoteTable, ProviderError> {
        self.calls.borrow_mut().push(Call::Fetch {
            symbols: symbols.iter().cloned().collect(),
            start,
            end,
        });
        let remaining = self.transient_failures.get();
        if remaining > 0 {
            self.transient_failures.set(remaining - 1);
            return Err(ProviderError::Transport("connection reset".into()));
        }
        if let Some(err) = symbols.iter().find_map(|s| self.errors.get(s)) {
            return Err(err.clone());
        }
        let series: Vec<PriceSeries> = symbols
            .iter()
            .filter(|s| !self.bulk_missing.contains(*s))
            .map(|s| self.series(s, start, end))
            .collect();
        Ok(QuoteTable::from_series(&series))
    }

    fn fetch_one(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        self.calls.borrow_mut().push(Call::FetchOne {
            symbol: symbol.to_string(),
            start,
            end,
        });
        if let Some(err) = self.errors.get(symbol) {
            return Err(err.clone());
        }
        Ok(self.series(symbol, start, end))
    }
}

/// Clock pinned to one date that records every requested wait instead of sleeping.
pub struct RecordingClock {
    pub today: NaiveDate,
    pub sleeps: RefCell<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            sleeps: RefCell::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.borrow().iter().sum()
    }
}

impl ClockPort for RecordingClock {
    fn today(&self) -> NaiveDate {
        self.today
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// `(date, close)` points on consecutive days starting at `start`.
pub fn daily(start: &str, closes: &[f64]) -> Vec<(NaiveDate, f64)> {
    let first = date(start);
    closes
        .iter()
        .enumerate()
        .map(|(i, c)| (first + chrono::Duration::days(i as i64), *c))
        .collect()
}

pub fn raw(ticker: &str, exchange: &str, units: &str, price: &str) -> RawPosition {
    RawPosition::new(ticker, exchange, units, price)
}
