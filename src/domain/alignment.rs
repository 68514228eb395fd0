//! Series alignment onto a shared calendar.
//!
//! The calendar is the ascending union of every fetched date. Gaps are repaired by forward
//! fill and then backward fill, so a symbol with at least one observation has a value on
//! every date. A symbol with no observations cannot be repaired and is dropped.

use crate::domain::price_series::{PriceSeries, RawFrame};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Dense close table: every column has exactly one value per date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl PriceTable {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.columns.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.columns.get(symbol).map(Vec::as_slice)
    }

    pub fn close_at(&self, symbol: &str, index: usize) -> Option<f64> {
        self.columns.get(symbol).and_then(|c| c.get(index)).copied()
    }

    pub fn first_close(&self, symbol: &str) -> Option<f64> {
        self.close_at(symbol, 0)
    }

    pub fn last_close(&self, symbol: &str) -> Option<f64> {
        self.columns.get(symbol).and_then(|c| c.last()).copied()
    }
}

/// Output of [`align`]: the dense table plus symbols that had nothing to fill from.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub table: PriceTable,
    pub dropped: Vec<String>,
}

pub fn build_unified_calendar<'a>(series: impl IntoIterator<Item = &'a PriceSeries>) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = series
        .into_iter()
        .flat_map(|s| s.dates().iter().copied())
        .collect();
    unique_dates.into_iter().collect()
}

/// Carry the last observed value forward over gaps.
pub fn forward_fill(values: &mut [Option<f64>]) {
    let mut last = None;
    for v in values.iter_mut() {
        match *v {
            Some(x) => last = Some(x),
            None => *v = last,
        }
    }
}

/// Fill leading gaps from the first observed value.
pub fn backward_fill(values: &mut [Option<f64>]) {
    let mut next = None;
    for v in values.iter_mut().rev() {
        match *v {
            Some(x) => next = Some(x),
            None => *v = next,
        }
    }
}

pub fn align(frame: &RawFrame) -> Alignment {
    let dates = build_unified_calendar(frame.iter());
    let mut columns = BTreeMap::new();
    let mut dropped = Vec::new();

    for series in frame.iter() {
        let mut values: Vec<Option<f64>> = dates.iter().map(|d| series.close_on(*d)).collect();
        let gaps = values.iter().filter(|v| v.is_none()).count();
        forward_fill(&mut values);
        backward_fill(&mut values);

        match values.into_iter().collect::<Option<Vec<f64>>>() {
            Some(column) if !dates.is_empty() => {
                if gaps > 0 {
                    debug!(symbol = %series.symbol, gaps, "filled gaps");
                }
                columns.insert(series.symbol.clone(), column);
            }
            _ => {
                warn!(symbol = %series.symbol, "no observations to align, dropping");
                dropped.push(series.symbol.clone());
            }
        }
    }

    Alignment {
        table: PriceTable { dates, columns },
        dropped,
    }
}
