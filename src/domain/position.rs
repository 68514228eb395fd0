//! Held positions and exhaustive validation of raw position input.

use crate::domain::error::{FolioError, PositionIssue};
use crate::domain::ticker;
use std::collections::HashSet;

const NOT_POSITIVE: &str = "units and price must be positive";
const UNPARSABLE: &str = "invalid units or price";

/// A validated holding. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    symbol: String,
    units: u64,
    avg_price: f64,
}

impl Position {
    pub fn new(symbol: impl Into<String>, units: u64, avg_price: f64) -> Result<Self, FolioError> {
        let symbol = symbol.into();
        if units == 0 || !avg_price.is_finite() || avg_price <= 0.0 {
            return Err(FolioError::InvalidAmount {
                symbol,
                reason: NOT_POSITIVE.to_string(),
            });
        }
        Ok(Self {
            symbol,
            units,
            avg_price,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn units(&self) -> u64 {
        self.units
    }

    pub fn avg_price(&self) -> f64 {
        self.avg_price
    }

    /// units * avg_price
    pub fn invested(&self) -> f64 {
        self.units as f64 * self.avg_price
    }

    /// units * price
    pub fn market_value(&self, price: f64) -> f64 {
        self.units as f64 * price
    }
}

/// One row of user input, all fields still text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPosition {
    pub ticker: String,
    pub exchange: String,
    pub units: String,
    pub avg_price: String,
}

impl RawPosition {
    pub fn new(ticker: &str, exchange: &str, units: &str, avg_price: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            exchange: exchange.to_string(),
            units: units.to_string(),
            avg_price: avg_price.to_string(),
        }
    }

    fn is_blank(&self) -> bool {
        self.ticker.trim().is_empty()
            && self.units.trim().is_empty()
            && self.avg_price.trim().is_empty()
    }
}

fn parse_amounts(raw: &RawPosition) -> Result<(u64, f64), &'static str> {
    let units: i64 = raw.units.trim().parse().map_err(|_| UNPARSABLE)?;
    let price: f64 = raw.avg_price.trim().parse().map_err(|_| UNPARSABLE)?;
    if !price.is_finite() {
        return Err(UNPARSABLE);
    }
    if units <= 0 || price <= 0.0 {
        return Err(NOT_POSITIVE);
    }
    Ok((units as u64, price))
}

/// Validate every row and return positions in input order.
///
/// Fully blank rows are skipped. All problems are collected before failing: a single bad row
/// yields [`FolioError::InvalidPosition`], several yield [`FolioError::InvalidPositions`].
pub fn validate_positions(rows: &[RawPosition]) -> Result<Vec<Position>, FolioError> {
    let mut positions = Vec::new();
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for (i, raw) in rows.iter().enumerate() {
        if raw.is_blank() {
            continue;
        }
        let row = i + 1;
        let mut issue = |reason: String| {
            issues.push(PositionIssue {
                row,
                entry: raw.ticker.trim().to_string(),
                reason,
            })
        };

        let symbol = match ticker::normalize(&raw.ticker, &raw.exchange) {
            Ok(s) => s,
            Err(e) => {
                issue(e.to_string());
                continue;
            }
        };
        let (units, avg_price) = match parse_amounts(raw) {
            Ok(v) => v,
            Err(reason) => {
                issue(reason.to_string());
                continue;
            }
        };
        if !seen.insert(symbol.clone()) {
            issue(format!("duplicate symbol {symbol}"));
            continue;
        }

        positions.push(Position {
            symbol,
            units,
            avg_price,
        });
    }

    match issues.len() {
        0 if positions.is_empty() => Err(FolioError::NoPositions),
        0 => Ok(positions),
        1 => {
            let PositionIssue { row, entry, reason } = issues.remove(0);
            Err(FolioError::InvalidPosition { row, entry, reason })
        }
        _ => Err(FolioError::InvalidPositions(issues)),
    }
}
