//! Close-price acquisition: bulk fetch with exponential backoff, then an ordered per-symbol
//! fallback chain for anything the bulk fetch did not price.
//!
//! Positions are mandatory: a position symbol that no strategy can price fails the request.
//! Benchmarks are optional: a benchmark that cannot be priced is reported and left out.

use crate::domain::benchmark::Benchmark;
use crate::domain::error::FolioError;
use crate::domain::price_series::{PriceSeries, RawFrame};
use crate::ports::clock_port::ClockPort;
use crate::ports::market_data_port::{MarketDataPort, ProviderError};
use chrono::{Duration as DateSpan, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_RECENT_WINDOW_DAYS: u32 = 30;
/// Ten years of calendar days.
pub const MAX_RECENT_WINDOW_DAYS: u32 = 3650;

/// Bounded retry with `base_delay * 2^attempt` waits between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Wait after the failed 0-based `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Sum of every wait taken when all attempts fail.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_attempts.max(1) - 1)
            .map(|a| self.delay_for(a))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed, sleeping on
/// `clock` between attempts. The last error is returned unchanged.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    clock: &dyn ClockPort,
    what: &str,
    mut op: impl FnMut() -> Result<T, ProviderError>,
) -> Result<T, ProviderError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= attempts => {
                warn!(what, attempt = attempt + 1, error = %e, "giving up after final attempt");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    what,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "fetch failed, backing off"
                );
                clock.sleep(delay);
                attempt += 1;
            }
        }
    }
}

/// One way of obtaining a single symbol's history once the bulk fetch came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStrategy {
    /// Single-symbol fetch over the requested range.
    FullRange,
    /// Single-symbol fetch over the last `days` days ending today.
    RecentWindow { days: u32 },
}

impl fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackStrategy::FullRange => write!(f, "full-range history"),
            FallbackStrategy::RecentWindow { days } => write!(f, "recent {days}-day window"),
        }
    }
}

impl FallbackStrategy {
    /// True when the strategy only ever asks for dates inside the requested range.
    pub fn stays_in_range(&self) -> bool {
        matches!(self, FallbackStrategy::FullRange)
    }

    /// `None` when the window start falls outside the representable calendar.
    fn window(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            FallbackStrategy::FullRange => Some((start, end)),
            FallbackStrategy::RecentWindow { days } => today
                .checked_sub_signed(DateSpan::days(i64::from(*days)))
                .map(|from| (from, today)),
        }
    }

    fn attempt(
        &self,
        provider: &dyn MarketDataPort,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> StrategyOutcome {
        let Some((from, to)) = self.window(start, end, today) else {
            return StrategyOutcome::Failed(format!("{self} reaches past the supported calendar"));
        };
        match provider.fetch_one(symbol, from, to) {
            Ok(series) if series.is_empty() => StrategyOutcome::Empty,
            Ok(series) => StrategyOutcome::Fetched(series),
            Err(e) => StrategyOutcome::Failed(e.to_string()),
        }
    }
}

pub fn default_fallback_chain() -> Vec<FallbackStrategy> {
    vec![
        FallbackStrategy::FullRange,
        FallbackStrategy::RecentWindow {
            days: DEFAULT_RECENT_WINDOW_DAYS,
        },
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Fetched(PriceSeries),
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackAttempt {
    pub strategy: FallbackStrategy,
    pub outcome: StrategyOutcome,
}

/// Every strategy tried for one symbol, in order, ending at the first success.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackReport {
    pub symbol: String,
    pub attempts: Vec<FallbackAttempt>,
}

impl FallbackReport {
    pub fn succeeded_with(&self) -> Option<(FallbackStrategy, &PriceSeries)> {
        self.attempts.iter().find_map(|a| match &a.outcome {
            StrategyOutcome::Fetched(series) => Some((a.strategy, series)),
            _ => None,
        })
    }

    /// Why the chain failed, one clause per strategy.
    pub fn failure_summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no fallback strategies configured".to_string();
        }
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                StrategyOutcome::Fetched(_) => format!("{}: ok", a.strategy),
                StrategyOutcome::Empty => format!("{}: empty", a.strategy),
                StrategyOutcome::Failed(reason) => format!("{}: {reason}", a.strategy),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Try each strategy in order and stop at the first non-empty series.
pub fn run_fallback_chain(
    provider: &dyn MarketDataPort,
    chain: &[FallbackStrategy],
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> FallbackReport {
    let mut attempts = Vec::with_capacity(chain.len());
    for strategy in chain {
        let outcome = strategy.attempt(provider, symbol, start, end, today);
        debug!(symbol, strategy = %strategy, ?outcome, "fallback attempt");
        let done = matches!(outcome, StrategyOutcome::Fetched(_));
        attempts.push(FallbackAttempt {
            strategy: *strategy,
            outcome,
        });
        if done {
            break;
        }
    }
    FallbackReport {
        symbol: symbol.to_string(),
        attempts,
    }
}

#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    pub retry: RetryPolicy,
    pub fallback_chain: Vec<FallbackStrategy>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            fallback_chain: default_fallback_chain(),
        }
    }
}

/// Where a symbol's series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesSource {
    Bulk,
    Fallback(FallbackStrategy),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnavailableBenchmark {
    pub benchmark: Benchmark,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Acquisition {
    pub frame: RawFrame,
    pub sources: BTreeMap<String, SeriesSource>,
    pub fallback_reports: Vec<FallbackReport>,
    pub unavailable_benchmarks: Vec<UnavailableBenchmark>,
}

impl Acquisition {
    pub fn benchmark_available(&self, benchmark: &Benchmark) -> bool {
        self.frame.contains(&benchmark.symbol)
    }
}

/// Fetch every position symbol (mandatory) and every benchmark (optional).
pub fn acquire(
    provider: &dyn MarketDataPort,
    clock: &dyn ClockPort,
    config: &AcquisitionConfig,
    symbols: &BTreeSet<String>,
    benchmarks: &[Benchmark],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Acquisition, FolioError> {
    info!(
        provider = provider.name(),
        symbols = symbols.len(),
        %start,
        %end,
        "fetching position prices"
    );
    let bulk = with_retry(&config.retry, clock, "bulk fetch", || {
        provider.fetch(symbols, start, end)
    })?;

    let today = clock.today();
    let mut acquisition = Acquisition {
        frame: RawFrame::new(),
        sources: BTreeMap::new(),
        fallback_reports: Vec::new(),
        unavailable_benchmarks: Vec::new(),
    };

    for symbol in symbols {
        let series = bulk.series(symbol);
        if !series.is_empty() {
            acquisition.record(series, SeriesSource::Bulk);
            continue;
        }
        warn!(symbol = %symbol, "missing from bulk fetch, trying fallbacks");
        let report = run_fallback_chain(provider, &config.fallback_chain, symbol, start, end, today);
        if let Err(reason) = acquisition.accept_fallback(report) {
            warn!(symbol = %symbol, %reason, "no data after fallbacks");
            return Err(FolioError::NoData {
                symbol: symbol.clone(),
            });
        }
    }

    for benchmark in benchmarks {
        let fetched =
            acquisition.acquire_benchmark(provider, clock, config, benchmark, start, end, today);
        if let Err(reason) = fetched {
            warn!(benchmark = %benchmark.name, %reason, "benchmark unavailable, omitting");
            acquisition.unavailable_benchmarks.push(UnavailableBenchmark {
                benchmark: benchmark.clone(),
                reason,
            });
        }
    }

    info!(
        series = acquisition.frame.len(),
        fallbacks = acquisition.fallback_reports.len(),
        "acquisition complete"
    );
    Ok(acquisition)
}

impl Acquisition {
    fn record(&mut self, series: PriceSeries, source: SeriesSource) {
        self.sources.insert(series.symbol.clone(), source);
        self.frame.insert(series);
    }

    fn accept_fallback(&mut self, report: FallbackReport) -> Result<(), String> {
        let found = report
            .succeeded_with()
            .map(|(strategy, series)| (strategy, series.clone()));
        let result = match found {
            Some((strategy, series)) => {
                info!(symbol = %report.symbol, %strategy, points = series.len(), "fallback succeeded");
                self.record(series, SeriesSource::Fallback(strategy));
                Ok(())
            }
            None => Err(report.failure_summary()),
        };
        self.fallback_reports.push(report);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn acquire_benchmark(
        &mut self,
        provider: &dyn MarketDataPort,
        clock: &dyn ClockPort,
        config: &AcquisitionConfig,
        benchmark: &Benchmark,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> Result<(), String> {
        let wanted = BTreeSet::from([benchmark.symbol.clone()]);
        let table = with_retry(&config.retry, clock, &benchmark.name, || {
            provider.fetch(&wanted, start, end)
        })
        .map_err(|e| e.to_string())?;

        let series = table.series(&benchmark.symbol);
        if !series.is_empty() {
            self.record(series, SeriesSource::Bulk);
            return Ok(());
        }
        // Out-of-range history would be rebased over a different period than the portfolio.
        let in_range: Vec<FallbackStrategy> = config
            .fallback_chain
            .iter()
            .copied()
            .filter(FallbackStrategy::stays_in_range)
            .collect();
        let report = run_fallback_chain(
            provider,
            &in_range,
            &benchmark.symbol,
            start,
            end,
            today,
        );
        self.accept_fallback(report)
    }
}
