//! Close-price series and the raw tables produced by acquisition.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Daily closes for one symbol, ascending by date with unique dates.
///
/// A series may skip trading days; [`crate::domain::alignment`] repairs those gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
}

impl PriceSeries {
    /// Build a series from unordered points. Later duplicates of a date replace earlier ones,
    /// and non-finite or non-positive closes are discarded.
    pub fn new(symbol: impl Into<String>, points: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        let by_date: BTreeMap<NaiveDate, f64> = points
            .into_iter()
            .filter(|(_, close)| close.is_finite() && *close > 0.0)
            .collect();
        let (dates, closes) = by_date.into_iter().unzip();
        Self {
            symbol: symbol.into(),
            dates,
            closes,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::new(symbol, std::iter::empty())
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|i| self.closes[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.closes.iter().copied())
    }
}

/// Bulk provider result: `table[date][symbol] -> close`.
///
/// Symbols the provider could not price are simply absent from every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteTable {
    rows: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}

impl QuoteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_series<'a>(series: impl IntoIterator<Item = &'a PriceSeries>) -> Self {
        let mut table = Self::new();
        for s in series {
            for (date, close) in s.iter() {
                table.insert(date, &s.symbol, close);
            }
        }
        table
    }

    pub fn insert(&mut self, date: NaiveDate, symbol: &str, close: f64) {
        self.rows
            .entry(date)
            .or_default()
            .insert(symbol.to_string(), close);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.keys().copied().collect()
    }

    pub fn symbols(&self) -> BTreeSet<String> {
        self.rows
            .values()
            .flat_map(|row| row.keys().cloned())
            .collect()
    }

    pub fn get(&self, date: NaiveDate, symbol: &str) -> Option<f64> {
        self.rows.get(&date).and_then(|row| row.get(symbol)).copied()
    }

    /// The observed closes for `symbol`; empty when the symbol never appears.
    pub fn series(&self, symbol: &str) -> PriceSeries {
        PriceSeries::new(
            symbol,
            self.rows
                .iter()
                .filter_map(|(date, row)| row.get(symbol).map(|close| (*date, *close))),
        )
    }
}

/// Per-symbol series gathered for one request, before alignment.
#[derive(Debug, Clone, Default)]
pub struct RawFrame {
    series: BTreeMap<String, PriceSeries>,
}

impl RawFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series: PriceSeries) {
        self.series.insert(series.symbol.clone(), series);
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.series.contains_key(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceSeries> {
        self.series.values()
    }
}
