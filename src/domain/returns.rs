//! Cumulative percentage returns for the portfolio and its benchmarks.
//!
//! The portfolio is measured against its cost basis while each benchmark is rebased to the
//! first date of the table. The two reference points differ and the comparison in
//! [`Summary`] deliberately keeps that asymmetry.

use crate::domain::alignment::PriceTable;
use crate::domain::benchmark::Benchmark;
use crate::domain::error::FolioError;
use crate::domain::position::Position;
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsPoint {
    pub portfolio_return_pct: f64,
    /// Keyed by benchmark display name. Unavailable benchmarks are absent.
    pub benchmark_return_pct: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnsSeries {
    points: BTreeMap<NaiveDate, ReturnsPoint>,
}

impl ReturnsSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&ReturnsPoint> {
        self.points.get(&date)
    }

    pub fn last(&self) -> Option<(NaiveDate, &ReturnsPoint)> {
        self.points.iter().next_back().map(|(d, p)| (*d, p))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &ReturnsPoint)> {
        self.points.iter().map(|(d, p)| (*d, p))
    }

    /// Names of benchmarks with a column in this series.
    pub fn benchmark_names(&self) -> Vec<String> {
        self.points
            .values()
            .next()
            .map(|p| p.benchmark_return_pct.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Last-date comparison. The benchmark fields are `None` unless every benchmark was available.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub portfolio_return_pct: f64,
    pub benchmark_avg_pct: Option<f64>,
    pub outperformed: Option<bool>,
}

impl Summary {
    pub fn difference_pct(&self) -> Option<f64> {
        self.benchmark_avg_pct
            .map(|avg| self.portfolio_return_pct - avg)
    }

    pub fn describe(&self) -> Option<String> {
        let diff = self.difference_pct()?;
        let verdict = if diff >= 0.0 {
            "outperformed"
        } else {
            "underperformed"
        };
        Some(format!(
            "Your portfolio {verdict} the market by {:.2}%",
            diff.abs()
        ))
    }
}

fn summarize(last: &ReturnsPoint, benchmarks: &[Benchmark]) -> Summary {
    let all_present = !benchmarks.is_empty()
        && benchmarks
            .iter()
            .all(|b| last.benchmark_return_pct.contains_key(&b.name));

    let benchmark_avg_pct = all_present.then(|| {
        benchmarks
            .iter()
            .map(|b| last.benchmark_return_pct[&b.name])
            .sum::<f64>()
            / benchmarks.len() as f64
    });

    Summary {
        portfolio_return_pct: last.portfolio_return_pct,
        benchmark_avg_pct,
        outperformed: benchmark_avg_pct.map(|avg| last.portfolio_return_pct - avg >= 0.0),
    }
}

pub fn compute_returns(
    positions: &[Position],
    table: &PriceTable,
    benchmarks: &[Benchmark],
) -> Result<(ReturnsSeries, Summary), FolioError> {
    if table.is_empty() {
        return Err(FolioError::EmptyTable);
    }
    let total_cost: f64 = positions.iter().map(Position::invested).sum();

    let mut held = Vec::with_capacity(positions.len());
    for p in positions {
        let column = table.column(p.symbol()).ok_or_else(|| FolioError::NoData {
            symbol: p.symbol().to_string(),
        })?;
        held.push((p, column));
    }

    let available: Vec<(&Benchmark, &[f64])> = benchmarks
        .iter()
        .filter_map(|b| table.column(&b.symbol).map(|c| (b, c)))
        .collect();

    let mut points = BTreeMap::new();
    for (i, date) in table.dates().iter().enumerate() {
        let value: f64 = held.iter().map(|(p, c)| p.market_value(c[i])).sum();
        let benchmark_return_pct = available
            .iter()
            .map(|(b, c)| (b.name.clone(), (c[i] / c[0] - 1.0) * 100.0))
            .collect();
        points.insert(
            *date,
            ReturnsPoint {
                portfolio_return_pct: (value / total_cost - 1.0) * 100.0,
                benchmark_return_pct,
            },
        );
    }

    let series = ReturnsSeries { points };
    let summary = match series.last() {
        Some((_, last)) => summarize(last, benchmarks),
        None => return Err(FolioError::EmptyTable),
    };
    Ok((series, summary))
}
