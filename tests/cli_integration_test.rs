//! CLI integration tests for the analyze command orchestration.
//!
//! Tests cover:
//! - Config parsing (build_engine_config, resolve_dates) from INI files on disk
//! - Dry-run mode with real config and positions files
//! - Full pipeline with MockMarketData, including CSV report output
//! - End-to-end through the CSV price provider

mod common;

use clap::Parser;
use common::*;
use folio::adapters::csv_report_adapter::{CsvReportAdapter, RETURNS_FILE, VALUATION_FILE};
use folio::adapters::file_config_adapter::FileConfigAdapter;
use folio::cli::{self, AnalyzeArgs, Cli};
use folio::domain::acquisition::FallbackStrategy;
use folio::domain::analysis::{AnalysisRequest, EngineConfig};
use folio::domain::error::FolioError;
use folio::ports::market_data_port::ProviderError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ExitCode has no PartialEq on every toolchain, so compare the Debug form.
fn assert_exit(actual: ExitCode, expected: u8) {
    assert_eq!(
        format!("{actual:?}"),
        format!("{:?}", ExitCode::from(expected)),
        "expected exit code {expected}"
    );
}

fn write_positions(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("positions.csv");
    fs::write(&path, content).unwrap();
    path
}

const VALID_INI: &str = r#"
[analysis]
start_date = 2024-01-01
end_date = 2024-01-03
benchmarks = ^NSEI:NIFTY 50, ^BSESN:SENSEX

[provider]
kind = yahoo
timeout_secs = 10

[retry]
max_attempts = 4
base_delay_ms = 0

[fallback]
recent_window_days = 14
"#;

mod config_loading {
    use super::*;

    #[test]
    fn engine_config_from_file() {
        let file = write_temp_ini(VALID_INI);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        let engine = cli::build_engine_config(&adapter).unwrap();

        assert_eq!(engine.acquisition.retry.max_attempts, 4);
        assert!(engine.acquisition.retry.base_delay.is_zero());
        assert_eq!(
            engine.acquisition.fallback_chain.last(),
            Some(&FallbackStrategy::RecentWindow { days: 14 })
        );
        let names: Vec<&str> = engine.benchmarks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["NIFTY 50", "SENSEX"]);
    }

    #[test]
    fn dates_from_file() {
        let file = write_temp_ini(VALID_INI);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        let (start, end) = cli::resolve_dates(&adapter, None, None, date("2030-01-01")).unwrap();
        assert_eq!(start, date("2024-01-01"));
        assert_eq!(end, date("2024-01-03"));
    }

    #[test]
    fn load_config_without_path_is_empty() {
        let adapter = cli::load_config(None).unwrap();
        let engine = cli::build_engine_config(&adapter).unwrap();
        assert_eq!(engine.benchmarks.len(), 2);
    }

    #[test]
    fn load_config_missing_file() {
        let path = PathBuf::from("/nonexistent/path/folio.ini");
        assert!(matches!(
            cli::load_config(Some(&path)),
            Err(FolioError::ConfigParse { .. })
        ));
    }

    #[test]
    fn invalid_retry_rejected() {
        let adapter = FileConfigAdapter::from_string("[retry]\nmax_attempts = 0\n").unwrap();
        assert!(matches!(
            cli::build_engine_config(&adapter),
            Err(FolioError::ConfigInvalid { key, .. }) if key == "max_attempts"
        ));
    }
}

mod dry_run {
    use super::*;

    #[test]
    fn valid_config_and_positions_succeed() {
        let dir = TempDir::new().unwrap();
        let positions = write_positions(
            dir.path(),
            "ticker,exchange,units,avg_price\nTCS,NS,10,3000\nINFY,NS,5,1500\n",
        );
        let file = write_temp_ini(VALID_INI);
        let args = AnalyzeArgs {
            config: Some(file.path().to_path_buf()),
            positions: Some(positions),
            ..AnalyzeArgs::default()
        };
        assert_exit(cli::run_dry_run(&args, &RecordingClock::new(date("2024-06-30"))), 0);
    }

    #[test]
    fn invalid_position_fails_with_validation_code() {
        let dir = TempDir::new().unwrap();
        let positions = write_positions(
            dir.path(),
            "ticker,exchange,units,avg_price\nTCS,NS,10,3000\nINFY,NS,-5,1500\n",
        );
        let args = AnalyzeArgs {
            positions: Some(positions),
            ..AnalyzeArgs::default()
        };
        assert_exit(cli::run_dry_run(&args, &RecordingClock::new(date("2024-06-30"))), 3);
    }

    #[test]
    fn missing_positions_file_fails_with_io_code() {
        let args = AnalyzeArgs {
            positions: Some(PathBuf::from("/nonexistent/positions.csv")),
            ..AnalyzeArgs::default()
        };
        assert_exit(cli::run_dry_run(&args, &RecordingClock::new(date("2024-06-30"))), 1);
    }

    #[test]
    fn bad_config_fails_with_config_code() {
        let file = write_temp_ini("[analysis]\nstart_date = yesterday\npositions = p.csv\n");
        let args = AnalyzeArgs {
            config: Some(file.path().to_path_buf()),
            ..AnalyzeArgs::default()
        };
        assert_exit(cli::run_dry_run(&args, &RecordingClock::new(date("2024-06-30"))), 2);
    }

    #[test]
    fn positions_required() {
        assert_exit(
            cli::run_dry_run(&AnalyzeArgs::default(), &RecordingClock::new(date("2024-06-30"))),
            2,
        );
    }
}

mod pipeline_mock {
    use super::*;

    fn mock() -> MockMarketData {
        MockMarketData::new()
            .with_series("TCS.NS", daily("2024-01-01", &[3000.0, 3100.0, 3200.0]))
            .with_series("^NSEI", daily("2024-01-01", &[100.0, 101.0, 102.0]))
            .with_series("^BSESN", daily("2024-01-01", &[200.0, 201.0, 202.0]))
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            positions: vec![raw("TCS", "NS", "10", "3000")],
            start: date("2024-01-01"),
            end: date("2024-01-03"),
        }
    }

    #[test]
    fn writes_reports() {
        let out = TempDir::new().unwrap();
        let report_dir = out.path().join("reports");
        let clock = RecordingClock::new(date("2024-06-30"));

        let code = cli::run_analysis_pipeline(
            &mock(),
            &clock,
            &EngineConfig::default(),
            &request(),
            Some(report_dir.as_path()),
            &CsvReportAdapter,
        );
        assert_exit(code, 0);

        let valuation = fs::read_to_string(report_dir.join(VALUATION_FILE)).unwrap();
        let lines: Vec<&str> = valuation.lines().collect();
        assert_eq!(lines[0], "symbol,invested,current,profit_loss");
        assert_eq!(lines[1], "TCS.NS,30000,32000,2000");
        assert_eq!(lines[2], "TOTAL,30000,32000,2000");

        let returns = fs::read_to_string(report_dir.join(RETURNS_FILE)).unwrap();
        let lines: Vec<&str> = returns.lines().collect();
        assert_eq!(lines[0], "date,Portfolio,NIFTY 50,SENSEX");
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("2024-01-01,0,0,0"));
    }

    #[test]
    fn no_output_dir_writes_nothing() {
        let out = TempDir::new().unwrap();
        let clock = RecordingClock::new(date("2024-06-30"));
        let code = cli::run_analysis_pipeline(
            &mock(),
            &clock,
            &EngineConfig::default(),
            &request(),
            None,
            &CsvReportAdapter,
        );
        assert_exit(code, 0);
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn provider_failure_maps_to_provider_code() {
        let failing = mock().with_error("TCS.NS", ProviderError::Api {
            code: Some(503),
            message: "Service Unavailable".into(),
        });
        let mut engine = EngineConfig::default();
        engine.acquisition.retry.base_delay = std::time::Duration::ZERO;
        let code = cli::run_analysis_pipeline(
            &failing,
            &RecordingClock::new(date("2024-06-30")),
            &engine,
            &request(),
            None,
            &CsvReportAdapter,
        );
        assert_exit(code, 4);
    }

    #[test]
    fn missing_symbol_maps_to_no_data_code() {
        let mut req = request();
        req.positions.push(raw("NOPE", "NS", "1", "10"));
        let code = cli::run_analysis_pipeline(
            &mock(),
            &RecordingClock::new(date("2024-06-30")),
            &EngineConfig::default(),
            &req,
            None,
            &CsvReportAdapter,
        );
        assert_exit(code, 5);
    }

    #[test]
    fn unwritable_output_maps_to_report_code() {
        let out = TempDir::new().unwrap();
        let blocker = out.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();
        let code = cli::run_analysis_pipeline(
            &mock(),
            &RecordingClock::new(date("2024-06-30")),
            &EngineConfig::default(),
            &request(),
            Some(blocker.as_path()),
            &CsvReportAdapter,
        );
        assert_exit(code, 6);
    }
}

mod end_to_end {
    use super::*;

    fn seed_prices(dir: &Path) {
        fs::write(
            dir.join("TCS.NS.csv"),
            "date,close\n2024-01-01,3000\n2024-01-02,3100\n2024-01-03,3200\n",
        )
        .unwrap();
        fs::write(
            dir.join("^NSEI.csv"),
            "date,close\n2024-01-01,20000\n2024-01-03,21000\n",
        )
        .unwrap();
        fs::write(
            dir.join("^BSESN.csv"),
            "date,close\n2024-01-02,70000\n2024-01-03,71000\n",
        )
        .unwrap();
    }

    #[test]
    fn analyze_with_csv_provider() {
        let dir = TempDir::new().unwrap();
        let prices = dir.path().join("prices");
        fs::create_dir(&prices).unwrap();
        seed_prices(&prices);
        let positions = write_positions(
            dir.path(),
            "ticker,exchange,units,avg_price\ntcs,NS,10,3000\n",
        );
        let out = dir.path().join("out");
        let ini = format!(
            "[analysis]\nstart_date = 2024-01-01\nend_date = 2024-01-03\npositions = {}\n\
             [provider]\nkind = csv\ndata_dir = {}\n\
             [report]\noutput_dir = {}\n",
            positions.display(),
            prices.display(),
            out.display(),
        );
        let config = write_temp_ini(&ini);

        let parsed = Cli::try_parse_from([
            "folio",
            "analyze",
            "--config",
            config.path().to_str().unwrap(),
        ])
        .unwrap();
        assert_exit(cli::run(parsed), 0);

        let valuation = fs::read_to_string(out.join(VALUATION_FILE)).unwrap();
        assert!(valuation.contains("TCS.NS,30000,32000,2000"));
        let returns = fs::read_to_string(out.join(RETURNS_FILE)).unwrap();
        assert_eq!(returns.lines().count(), 4);
    }

    #[test]
    fn validate_command() {
        let dir = TempDir::new().unwrap();
        let good = write_positions(dir.path(), "ticker,exchange,units,avg_price\nTCS,NS,1,1\n");
        let parsed = Cli::try_parse_from(["folio", "validate", "-p", good.to_str().unwrap()]).unwrap();
        assert_exit(cli::run(parsed), 0);

        let bad = dir.path().join("bad.csv");
        fs::write(&bad, "ticker,exchange,units,avg_price\nTCS,NS,1.5,1\n").unwrap();
        let parsed = Cli::try_parse_from(["folio", "validate", "-p", bad.to_str().unwrap()]).unwrap();
        assert_exit(cli::run(parsed), 3);
    }

    #[test]
    fn normalize_command() {
        let parsed = Cli::try_parse_from(["folio", "normalize", " tcs.bo ", "-e", "ns"]).unwrap();
        assert_exit(cli::run(parsed), 0);
        let parsed = Cli::try_parse_from(["folio", "normalize", "  "]).unwrap();
        assert_exit(cli::run(parsed), 3);
    }
}
