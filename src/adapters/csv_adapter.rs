//! CSV file adapters: an offline close-price provider and the positions file reader.

use crate::domain::error::FolioError;
use crate::domain::position::RawPosition;
use crate::domain::price_series::{PriceSeries, QuoteTable};
use crate::ports::market_data_port::{MarketDataPort, ProviderError};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Reads `<base_path>/<SYMBOL>.csv` files with a `date,close` header.
pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    fn read_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        let path = self.csv_path(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PriceSeries::empty(symbol)),
            Err(e) => {
                return Err(ProviderError::Transport(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut points = Vec::new();

        for result in rdr.records() {
            let record =
                result.map_err(|e| ProviderError::Decode(format!("CSV parse error: {e}")))?;

            let date_str = record
                .get(0)
                .ok_or_else(|| ProviderError::Decode("missing date column".into()))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| ProviderError::Decode(format!("invalid date {date_str:?}: {e}")))?;

            if date < start || date > end {
                continue;
            }

            let close_str = record
                .get(1)
                .ok_or_else(|| ProviderError::Decode("missing close column".into()))?
                .trim();
            // Blank closes are gaps, not errors.
            if close_str.is_empty() {
                continue;
            }
            let close: f64 = close_str
                .parse()
                .map_err(|e| ProviderError::Decode(format!("invalid close {close_str:?}: {e}")))?;

            points.push((date, close));
        }

        Ok(PriceSeries::new(symbol, points))
    }
}

impl MarketDataPort for CsvAdapter {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        symbols: &BTreeSet<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<QuoteTable, ProviderError> {
        let series = symbols
            .iter()
            .map(|s| self.read_series(s, start, end))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(QuoteTable::from_series(&series))
    }

    fn fetch_one(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        self.read_series(symbol, start, end)
    }
}

/// Read a positions file with the header `ticker,exchange,units,avg_price`.
///
/// Values are returned as text; validation happens in the domain.
pub fn read_positions(path: &Path) -> Result<Vec<RawPosition>, FolioError> {
    let content = fs::read_to_string(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| FolioError::ConfigInvalid {
            section: "analysis".into(),
            key: "positions".into(),
            reason: format!("{}: {}", path.display(), e),
        })?;
        let field = |i: usize| record.get(i).unwrap_or_default();
        rows.push(RawPosition::new(field(0), field(1), field(2), field(3)));
    }
    Ok(rows)
}
