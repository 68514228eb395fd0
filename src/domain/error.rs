//! Domain error types.

use crate::ports::market_data_port::ProviderError;

/// One rejected input row, reported alongside every other rejected row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("row {row} ({entry}): {reason}")]
pub struct PositionIssue {
    /// 1-based row number in the submitted position list.
    pub row: usize,
    /// The raw ticker text as entered.
    pub entry: String,
    pub reason: String,
}

/// Top-level error type for folio.
#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    #[error("invalid ticker {raw:?}: ticker text is empty")]
    InvalidTicker { raw: String },

    #[error("invalid position at row {row} ({entry}): {reason}")]
    InvalidPosition {
        row: usize,
        entry: String,
        reason: String,
    },

    /// A position built directly rather than from a numbered input row.
    #[error("invalid position {symbol}: {reason}")]
    InvalidAmount { symbol: String, reason: String },

    #[error("{} invalid position(s): {}", .0.len(), join_issues(.0))]
    InvalidPositions(Vec<PositionIssue>),

    #[error("please enter at least one valid ticker")]
    NoPositions,

    #[error("error fetching data: {0}")]
    Provider(#[from] ProviderError),

    #[error("no data available for {symbol}")]
    NoData { symbol: String },

    #[error("price table has no rows")]
    EmptyTable,

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FolioError {
    /// Every rejected row carried by this error, empty for non-validation errors.
    pub fn position_issues(&self) -> Vec<PositionIssue> {
        match self {
            FolioError::InvalidPositions(issues) => issues.clone(),
            FolioError::InvalidPosition { row, entry, reason } => vec![PositionIssue {
                row: *row,
                entry: entry.clone(),
                reason: reason.clone(),
            }],
            _ => Vec::new(),
        }
    }
}

fn join_issues(issues: &[PositionIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<&FolioError> for std::process::ExitCode {
    fn from(err: &FolioError) -> Self {
        let code: u8 = match err {
            FolioError::Io(_) => 1,
            FolioError::ConfigParse { .. }
            | FolioError::ConfigMissing { .. }
            | FolioError::ConfigInvalid { .. } => 2,
            FolioError::InvalidTicker { .. }
            | FolioError::InvalidPosition { .. }
            | FolioError::InvalidAmount { .. }
            | FolioError::InvalidPositions(_)
            | FolioError::NoPositions => 3,
            FolioError::Provider(_) => 4,
            FolioError::NoData { .. } | FolioError::EmptyTable => 5,
            FolioError::Report { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
