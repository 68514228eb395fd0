//! Per-position valuation against the latest aligned close.

use crate::domain::alignment::PriceTable;
use crate::domain::error::FolioError;
use crate::domain::position::Position;

/// Invested vs current value of one position. Values are unrounded.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationRow {
    pub symbol: String,
    pub invested: f64,
    pub current: f64,
    pub profit_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioTotals {
    pub invested: f64,
    pub current: f64,
    pub profit_loss: f64,
}

/// Value each position at the table's last date.
pub fn valuate(positions: &[Position], table: &PriceTable) -> Result<Vec<ValuationRow>, FolioError> {
    if table.is_empty() {
        return Err(FolioError::EmptyTable);
    }
    positions
        .iter()
        .map(|p| {
            let last = table.last_close(p.symbol()).ok_or_else(|| FolioError::NoData {
                symbol: p.symbol().to_string(),
            })?;
            let invested = p.invested();
            let current = p.market_value(last);
            Ok(ValuationRow {
                symbol: p.symbol().to_string(),
                invested,
                current,
                profit_loss: current - invested,
            })
        })
        .collect()
}

pub fn totals(rows: &[ValuationRow]) -> PortfolioTotals {
    let invested: f64 = rows.iter().map(|r| r.invested).sum();
    let current: f64 = rows.iter().map(|r| r.current).sum();
    PortfolioTotals {
        invested,
        current,
        profit_loss: current - invested,
    }
}
