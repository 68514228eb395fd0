//! CSV report adapter: `valuation.csv` and `returns.csv`.

use crate::domain::analysis::Analysis;
use crate::domain::error::FolioError;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::{Path, PathBuf};

pub const VALUATION_FILE: &str = "valuation.csv";
pub const RETURNS_FILE: &str = "returns.csv";

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReportAdapter;

fn report_err(path: &Path, e: impl std::fmt::Display) -> FolioError {
    FolioError::Report {
        reason: format!("{}: {}", path.display(), e),
    }
}

impl CsvReportAdapter {
    fn write_valuation(&self, analysis: &Analysis, path: &Path) -> Result<(), FolioError> {
        let mut wtr = csv::Writer::from_path(path).map_err(|e| report_err(path, e))?;
        wtr.write_record(["symbol", "invested", "current", "profit_loss"])
            .map_err(|e| report_err(path, e))?;
        for row in &analysis.valuation {
            wtr.write_record([
                row.symbol.clone(),
                row.invested.to_string(),
                row.current.to_string(),
                row.profit_loss.to_string(),
            ])
            .map_err(|e| report_err(path, e))?;
        }
        let t = &analysis.totals;
        wtr.write_record([
            "TOTAL".to_string(),
            t.invested.to_string(),
            t.current.to_string(),
            t.profit_loss.to_string(),
        ])
        .map_err(|e| report_err(path, e))?;
        wtr.flush().map_err(|e| report_err(path, e))
    }

    fn write_returns(&self, analysis: &Analysis, path: &Path) -> Result<(), FolioError> {
        let names = analysis.returns.benchmark_names();
        let mut wtr = csv::Writer::from_path(path).map_err(|e| report_err(path, e))?;

        let mut header = vec!["date".to_string(), "Portfolio".to_string()];
        header.extend(names.iter().cloned());
        wtr.write_record(&header).map_err(|e| report_err(path, e))?;

        for (date, point) in analysis.returns.iter() {
            let mut record = vec![date.to_string(), point.portfolio_return_pct.to_string()];
            record.extend(names.iter().map(|n| {
                point
                    .benchmark_return_pct
                    .get(n)
                    .map(f64::to_string)
                    .unwrap_or_default()
            }));
            wtr.write_record(&record).map_err(|e| report_err(path, e))?;
        }
        wtr.flush().map_err(|e| report_err(path, e))
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, analysis: &Analysis, output_dir: &Path) -> Result<Vec<PathBuf>, FolioError> {
        fs::create_dir_all(output_dir).map_err(|e| report_err(output_dir, e))?;
        let valuation = output_dir.join(VALUATION_FILE);
        let returns = output_dir.join(RETURNS_FILE);
        self.write_valuation(analysis, &valuation)?;
        self.write_returns(analysis, &returns)?;
        Ok(vec![valuation, returns])
    }
}
