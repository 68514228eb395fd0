//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

use crate::adapters::csv_adapter::{read_positions, CsvAdapter};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::system_clock::SystemClock;
use crate::domain::acquisition::{
    AcquisitionConfig, FallbackStrategy, RetryPolicy, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_RECENT_WINDOW_DAYS, MAX_RECENT_WINDOW_DAYS,
};
use crate::domain::analysis::{analyze, Analysis, AnalysisRequest, EngineConfig};
use crate::domain::benchmark::{default_benchmarks, parse_benchmarks};
use crate::domain::config_validation::{
    parse_bounded_int_key, parse_date_key, parse_int_key, validate_analysis_config,
};
use crate::domain::error::FolioError;
use crate::domain::position::{validate_positions, RawPosition};
use crate::domain::ticker::normalize;
use crate::ports::clock_port::ClockPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

/// Analysis start used when neither the command line nor the config names one.
pub const DEFAULT_START_DATE: &str = "2024-01-01";
const DEFAULT_BASE_DELAY_MS: i64 = 1000;

#[derive(Parser, Debug)]
#[command(
    name = "folio",
    about = "Portfolio valuation against cost basis and market benchmarks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Value a portfolio and compare it with its benchmarks
    Analyze {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        positions: Option<PathBuf>,
        /// First date of the analysis range (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Last date of the analysis range, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Directory for valuation.csv and returns.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a positions file without fetching prices
    Validate {
        #[arg(short, long)]
        positions: PathBuf,
    },
    /// Print the provider symbol for a ticker
    Normalize {
        ticker: String,
        #[arg(short, long, default_value = "")]
        exchange: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Analyze {
            config,
            positions,
            start,
            end,
            output,
            dry_run,
        } => {
            let args = AnalyzeArgs {
                config,
                positions,
                start,
                end,
                output,
            };
            if dry_run {
                run_dry_run(&args, &SystemClock)
            } else {
                run_analyze(&args)
            }
        }
        Command::Validate { positions } => run_validate(&positions),
        Command::Normalize { ticker, exchange } => run_normalize(&ticker, &exchange),
    }
}

/// Command-line overrides for an analysis run.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeArgs {
    pub config: Option<PathBuf>,
    pub positions: Option<PathBuf>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub output: Option<PathBuf>,
}

fn fail(err: &FolioError) -> ExitCode {
    eprintln!("error: {err}");
    for issue in err.position_issues() {
        eprintln!("  {issue}");
    }
    err.into()
}

pub fn load_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, FolioError> {
    match path {
        Some(p) => {
            info!(path = %p.display(), "loading config");
            FileConfigAdapter::from_file(p)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, FolioError> {
    let max_attempts = parse_int_key(config, "retry", "max_attempts", 1)?
        .unwrap_or(i64::from(DEFAULT_MAX_ATTEMPTS));
    let base_delay_ms =
        parse_int_key(config, "retry", "base_delay_ms", 0)?.unwrap_or(DEFAULT_BASE_DELAY_MS);
    let recent_window_days = parse_bounded_int_key(
        config,
        "fallback",
        "recent_window_days",
        1,
        i64::from(MAX_RECENT_WINDOW_DAYS),
    )?
    .unwrap_or(i64::from(DEFAULT_RECENT_WINDOW_DAYS));

    let benchmarks = match config.get_trimmed("analysis", "benchmarks") {
        Some(list) => parse_benchmarks(&list).map_err(|e| FolioError::ConfigInvalid {
            section: "analysis".into(),
            key: "benchmarks".into(),
            reason: e.to_string(),
        })?,
        None => default_benchmarks(),
    };

    Ok(EngineConfig {
        acquisition: AcquisitionConfig {
            retry: RetryPolicy {
                max_attempts: u32::try_from(max_attempts).unwrap_or(u32::MAX),
                base_delay: Duration::from_millis(base_delay_ms.unsigned_abs()),
            },
            fallback_chain: vec![
                FallbackStrategy::FullRange,
                FallbackStrategy::RecentWindow {
                    days: u32::try_from(recent_window_days).unwrap_or(DEFAULT_RECENT_WINDOW_DAYS),
                },
            ],
        },
        benchmarks,
    })
}

fn parse_cli_date(value: &str, key: &str) -> Result<NaiveDate, FolioError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| FolioError::ConfigInvalid {
        section: "analysis".into(),
        key: key.into(),
        reason: format!("invalid {key} format, expected YYYY-MM-DD"),
    })
}

/// Command line first, then `[analysis]`, then the defaults: `DEFAULT_START_DATE` and today.
pub fn resolve_dates(
    config: &dyn ConfigPort,
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), FolioError> {
    let start = match start {
        Some(s) => parse_cli_date(s, "start_date")?,
        None => match parse_date_key(config, "analysis", "start_date")? {
            Some(d) => d,
            None => parse_cli_date(DEFAULT_START_DATE, "start_date")?,
        },
    };
    let end = match end {
        Some(s) => parse_cli_date(s, "end_date")?,
        None => parse_date_key(config, "analysis", "end_date")?.unwrap_or(today),
    };
    Ok((start, end))
}

pub fn resolve_positions_path(
    config: &dyn ConfigPort,
    positions: Option<&PathBuf>,
) -> Result<PathBuf, FolioError> {
    match positions {
        Some(p) => Ok(p.clone()),
        None => config
            .get_trimmed("analysis", "positions")
            .map(PathBuf::from)
            .ok_or_else(|| FolioError::ConfigMissing {
                section: "analysis".into(),
                key: "positions".into(),
            }),
    }
}

pub fn resolve_output_dir(config: &dyn ConfigPort, output: Option<&PathBuf>) -> Option<PathBuf> {
    output
        .cloned()
        .or_else(|| config.get_trimmed("report", "output_dir").map(PathBuf::from))
}

pub fn build_provider(config: &dyn ConfigPort) -> Result<Box<dyn MarketDataPort>, FolioError> {
    let kind = config
        .get_trimmed("provider", "kind")
        .unwrap_or_else(|| "yahoo".to_string())
        .to_lowercase();
    match kind.as_str() {
        "csv" => {
            let dir = config
                .get_trimmed("provider", "data_dir")
                .ok_or_else(|| FolioError::ConfigMissing {
                    section: "provider".into(),
                    key: "data_dir".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        #[cfg(feature = "yahoo")]
        "yahoo" => Ok(Box::new(
            crate::adapters::yahoo_adapter::YahooAdapter::from_config(config)?,
        )),
        other => Err(FolioError::ConfigInvalid {
            section: "provider".into(),
            key: "kind".into(),
            reason: format!("provider {other:?} is not available in this build"),
        }),
    }
}

/// Everything an analysis run needs before the provider is contacted.
struct Prepared {
    config: FileConfigAdapter,
    engine: EngineConfig,
    request: AnalysisRequest,
    output: Option<PathBuf>,
}

fn prepare(args: &AnalyzeArgs, clock: &dyn ClockPort) -> Result<Prepared, FolioError> {
    // Stage 1: Load and validate config
    let config = load_config(args.config.as_ref())?;
    validate_analysis_config(&config)?;
    let engine = build_engine_config(&config)?;

    // Stage 2: Resolve range and positions
    let (start, end) = resolve_dates(
        &config,
        args.start.as_deref(),
        args.end.as_deref(),
        clock.today(),
    )?;
    let positions_path = resolve_positions_path(&config, args.positions.as_ref())?;
    info!(path = %positions_path.display(), "reading positions");
    let positions = read_positions(&positions_path)?;
    let output = resolve_output_dir(&config, args.output.as_ref());

    Ok(Prepared {
        config,
        engine,
        request: AnalysisRequest {
            positions,
            start,
            end,
        },
        output,
    })
}

fn run_analyze(args: &AnalyzeArgs) -> ExitCode {
    let clock = SystemClock;
    let prepared = match prepare(args, &clock) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    let provider = match build_provider(&prepared.config) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    run_analysis_pipeline(
        provider.as_ref(),
        &clock,
        &prepared.engine,
        &prepared.request,
        prepared.output.as_deref(),
        &CsvReportAdapter,
    )
}

/// Analyze, print the result to stdout and optionally write the CSV reports.
pub fn run_analysis_pipeline(
    provider: &dyn MarketDataPort,
    clock: &dyn ClockPort,
    engine: &EngineConfig,
    request: &AnalysisRequest,
    output_dir: Option<&Path>,
    reporter: &dyn ReportPort,
) -> ExitCode {
    info!(
        provider = provider.name(),
        start = %request.start,
        end = %request.end,
        "running analysis"
    );
    let analysis = match analyze(provider, clock, engine, request) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };

    print!("{}", AnalysisView(&analysis));
    for warning in &analysis.warnings {
        warn!("{warning}");
    }

    if let Some(dir) = output_dir {
        match reporter.write(&analysis, dir) {
            Ok(paths) => {
                for path in paths {
                    info!(path = %path.display(), "report written");
                }
            }
            Err(e) => return fail(&e),
        }
    }
    ExitCode::SUCCESS
}

/// Plain-text rendering of an [`Analysis`] for the terminal.
pub struct AnalysisView<'a>(pub &'a Analysis);

impl fmt::Display for AnalysisView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.0;
        writeln!(f, "=== Valuation ===")?;
        writeln!(
            f,
            "{:<16} {:>14} {:>14} {:>14}",
            "Symbol", "Invested", "Current", "P/L"
        )?;
        for row in &a.valuation {
            writeln!(
                f,
                "{:<16} {:>14.2} {:>14.2} {:>14.2}",
                row.symbol, row.invested, row.current, row.profit_loss
            )?;
        }
        writeln!(
            f,
            "{:<16} {:>14.2} {:>14.2} {:>14.2}",
            "TOTAL", a.totals.invested, a.totals.current, a.totals.profit_loss
        )?;

        if let Some((date, point)) = a.final_returns() {
            writeln!(f, "\n=== Cumulative Returns ({date}) ===")?;
            writeln!(f, "{:<16} {:>9.2}%", "Portfolio", point.portfolio_return_pct)?;
            for (name, pct) in &point.benchmark_return_pct {
                writeln!(f, "{name:<16} {pct:>9.2}%")?;
            }
        }

        match a.summary.describe() {
            Some(line) => writeln!(f, "\n{line}")?,
            None => writeln!(f, "\nBenchmark comparison unavailable")?,
        }

        if !a.warnings.is_empty() {
            writeln!(f, "\n=== Warnings ===")?;
            for w in &a.warnings {
                writeln!(f, "  {w}")?;
            }
        }
        Ok(())
    }
}

pub fn run_dry_run(args: &AnalyzeArgs, clock: &dyn ClockPort) -> ExitCode {
    let prepared = match prepare(args, clock) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    let positions = match validate_positions(&prepared.request.positions) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    println!("Configuration valid.");
    println!(
        "  Range:       {} to {}",
        prepared.request.start, prepared.request.end
    );
    println!("  Positions:   {}", positions.len());
    for p in &positions {
        println!("    {} x{} @ {:.2}", p.symbol(), p.units(), p.avg_price());
    }
    let names: Vec<String> = prepared
        .engine
        .benchmarks
        .iter()
        .map(|b| format!("{} ({})", b.name, b.symbol))
        .collect();
    println!("  Benchmarks:  {}", names.join(", "));
    let retry = &prepared.engine.acquisition.retry;
    println!(
        "  Retry:       {} attempts, {}ms base delay",
        retry.max_attempts,
        retry.base_delay.as_millis()
    );
    if let Some(dir) = &prepared.output {
        println!("  Reports:     {}", dir.display());
    }
    ExitCode::SUCCESS
}

fn run_validate(positions_path: &Path) -> ExitCode {
    let rows: Vec<RawPosition> = match read_positions(positions_path) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    match validate_positions(&rows) {
        Ok(positions) => {
            println!("{} position(s) valid:", positions.len());
            for p in &positions {
                println!("  {} x{} @ {:.2}", p.symbol(), p.units(), p.avg_price());
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_normalize(ticker: &str, exchange: &str) -> ExitCode {
    match normalize(ticker, exchange) {
        Ok(symbol) => {
            println!("{symbol}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_analyze_command() {
        let cli = Cli::try_parse_from([
            "folio",
            "analyze",
            "--positions",
            "p.csv",
            "--start",
            "2024-02-01",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Command::Analyze {
                positions,
                start,
                dry_run,
                config,
                ..
            } => {
                assert_eq!(positions, Some(PathBuf::from("p.csv")));
                assert_eq!(start.as_deref(), Some("2024-02-01"));
                assert!(dry_run);
                assert!(config.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn normalize_exchange_defaults_to_empty() {
        let cli = Cli::try_parse_from(["folio", "normalize", "tcs"]).unwrap();
        match cli.command {
            Command::Normalize { ticker, exchange } => {
                assert_eq!(ticker, "tcs");
                assert_eq!(exchange, "");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn engine_config_defaults() {
        let engine = build_engine_config(&FileConfigAdapter::empty()).unwrap();
        assert_eq!(engine.acquisition.retry, RetryPolicy::default());
        assert_eq!(engine.benchmarks, default_benchmarks());
        assert_eq!(
            engine.acquisition.fallback_chain,
            vec![
                FallbackStrategy::FullRange,
                FallbackStrategy::RecentWindow { days: 30 }
            ]
        );
    }

    #[test]
    fn engine_config_from_ini() {
        let config = FileConfigAdapter::from_string(
            "[analysis]\nbenchmarks = ^GSPC:S&P 500\n\
             [retry]\nmax_attempts = 5\nbase_delay_ms = 10\n\
             [fallback]\nrecent_window_days = 7\n",
        )
        .unwrap();
        let engine = build_engine_config(&config).unwrap();
        assert_eq!(engine.acquisition.retry.max_attempts, 5);
        assert_eq!(
            engine.acquisition.retry.base_delay,
            Duration::from_millis(10)
        );
        assert_eq!(
            engine.acquisition.fallback_chain[1],
            FallbackStrategy::RecentWindow { days: 7 }
        );
        assert_eq!(engine.benchmarks.len(), 1);
        assert_eq!(engine.benchmarks[0].name, "S&P 500");
    }

    #[test]
    fn engine_config_rejects_oversized_recent_window() {
        let config =
            FileConfigAdapter::from_string("[fallback]\nrecent_window_days = 100000000\n").unwrap();
        let err = build_engine_config(&config).unwrap_err();
        assert!(matches!(
            &err,
            FolioError::ConfigInvalid { key, .. } if key == "recent_window_days"
        ));
        assert_eq!(
            format!("{:?}", ExitCode::from(&err)),
            format!("{:?}", ExitCode::from(2))
        );
    }

    #[test]
    fn dates_default_to_fixed_start_and_today() {
        let (start, end) =
            resolve_dates(&FileConfigAdapter::empty(), None, None, d(2024, 6, 30)).unwrap();
        assert_eq!(start, d(2024, 1, 1));
        assert_eq!(end, d(2024, 6, 30));
    }

    #[test]
    fn command_line_dates_override_config() {
        let config = FileConfigAdapter::from_string(
            "[analysis]\nstart_date = 2023-01-01\nend_date = 2023-12-31\n",
        )
        .unwrap();
        let (start, end) = resolve_dates(&config, Some("2024-03-01"), None, d(2024, 6, 30)).unwrap();
        assert_eq!(start, d(2024, 3, 1));
        assert_eq!(end, d(2023, 12, 31));

        assert!(matches!(
            resolve_dates(&config, None, Some("31-12-2024"), d(2024, 6, 30)),
            Err(FolioError::ConfigInvalid { key, .. }) if key == "end_date"
        ));
    }

    #[test]
    fn positions_path_required() {
        let empty = FileConfigAdapter::empty();
        assert!(matches!(
            resolve_positions_path(&empty, None),
            Err(FolioError::ConfigMissing { key, .. }) if key == "positions"
        ));
        let config = FileConfigAdapter::from_string("[analysis]\npositions = p.csv\n").unwrap();
        assert_eq!(
            resolve_positions_path(&config, None).unwrap(),
            PathBuf::from("p.csv")
        );
        assert_eq!(
            resolve_positions_path(&config, Some(&PathBuf::from("q.csv"))).unwrap(),
            PathBuf::from("q.csv")
        );
    }

    #[test]
    fn csv_provider_from_config() {
        let config =
            FileConfigAdapter::from_string("[provider]\nkind = CSV\ndata_dir = /tmp/prices\n")
                .unwrap();
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "csv");
    }

    #[test]
    fn unknown_provider_is_config_error() {
        let config = FileConfigAdapter::from_string("[provider]\nkind = telnet\n").unwrap();
        assert!(matches!(
            build_provider(&config),
            Err(FolioError::ConfigInvalid { key, .. }) if key == "kind"
        ));
    }
}
