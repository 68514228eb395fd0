//! End-to-end valuation of one request: validate, acquire, align, value, compare.
//!
//! Validation runs before any provider call. Each call owns all of its state; nothing is
//! cached between requests.

use crate::domain::acquisition::{acquire, AcquisitionConfig, FallbackStrategy, SeriesSource};
use crate::domain::alignment::{align, PriceTable};
use crate::domain::benchmark::{default_benchmarks, Benchmark};
use crate::domain::error::FolioError;
use crate::domain::position::{validate_positions, Position, RawPosition};
use crate::domain::returns::{compute_returns, ReturnsPoint, ReturnsSeries, Summary};
use crate::domain::valuation::{totals, valuate, PortfolioTotals, ValuationRow};
use crate::ports::clock_port::ClockPort;
use crate::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub acquisition: AcquisitionConfig,
    pub benchmarks: Vec<Benchmark>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            acquisition: AcquisitionConfig::default(),
            benchmarks: default_benchmarks(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub positions: Vec<RawPosition>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Non-fatal conditions reported next to the result.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    BenchmarkUnavailable {
        name: String,
        symbol: String,
        reason: String,
    },
    FallbackUsed {
        symbol: String,
        strategy: FallbackStrategy,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::BenchmarkUnavailable {
                name,
                symbol,
                reason,
            } => write!(f, "benchmark {name} ({symbol}) unavailable: {reason}"),
            Warning::FallbackUsed { symbol, strategy } => {
                write!(f, "{symbol} priced from {strategy} fallback")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub positions: Vec<Position>,
    pub table: PriceTable,
    pub valuation: Vec<ValuationRow>,
    pub totals: PortfolioTotals,
    pub returns: ReturnsSeries,
    pub summary: Summary,
    pub sources: BTreeMap<String, SeriesSource>,
    pub warnings: Vec<Warning>,
}

impl Analysis {
    /// Last row of the returns series.
    pub fn final_returns(&self) -> Option<(NaiveDate, &ReturnsPoint)> {
        self.returns.last()
    }

    pub fn benchmark_omitted(&self, name: &str) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, Warning::BenchmarkUnavailable { name: n, .. } if n == name))
    }
}

pub fn analyze(
    provider: &dyn MarketDataPort,
    clock: &dyn ClockPort,
    config: &EngineConfig,
    request: &AnalysisRequest,
) -> Result<Analysis, FolioError> {
    let positions = validate_positions(&request.positions)?;
    info!(positions = positions.len(), "positions validated");

    let symbols: BTreeSet<String> = positions.iter().map(|p| p.symbol().to_string()).collect();
    let acquisition = acquire(
        provider,
        clock,
        &config.acquisition,
        &symbols,
        &config.benchmarks,
        request.start,
        request.end,
    )?;

    let mut warnings: Vec<Warning> = acquisition
        .sources
        .iter()
        .filter_map(|(symbol, source)| match source {
            SeriesSource::Fallback(strategy) => Some(Warning::FallbackUsed {
                symbol: symbol.clone(),
                strategy: *strategy,
            }),
            SeriesSource::Bulk => None,
        })
        .collect();
    warnings.extend(acquisition.unavailable_benchmarks.iter().map(|u| {
        Warning::BenchmarkUnavailable {
            name: u.benchmark.name.clone(),
            symbol: u.benchmark.symbol.clone(),
            reason: u.reason.clone(),
        }
    }));

    let aligned = align(&acquisition.frame);
    for symbol in &aligned.dropped {
        if symbols.contains(symbol) {
            return Err(FolioError::NoData {
                symbol: symbol.clone(),
            });
        }
        if let Some(b) = config.benchmarks.iter().find(|b| &b.symbol == symbol) {
            warnings.push(Warning::BenchmarkUnavailable {
                name: b.name.clone(),
                symbol: b.symbol.clone(),
                reason: "no observations to align".to_string(),
            });
        }
    }
    let table = aligned.table;
    info!(dates = table.len(), symbols = table.symbols().count(), "price table aligned");

    let valuation = valuate(&positions, &table)?;
    let totals = totals(&valuation);
    let (returns, summary) = compute_returns(&positions, &table, &config.benchmarks)?;

    Ok(Analysis {
        positions,
        table,
        valuation,
        totals,
        returns,
        summary,
        sources: acquisition.sources,
        warnings,
    })
}
