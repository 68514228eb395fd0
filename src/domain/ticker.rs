//! Ticker normalization into provider symbols such as `TCS.NS`.

use crate::domain::error::FolioError;

/// Ticker text and exchange code as entered, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTicker {
    pub text: String,
    pub exchange_suffix: String,
}

impl RawTicker {
    pub fn new(text: impl Into<String>, exchange_suffix: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exchange_suffix: exchange_suffix.into(),
        }
    }

    pub fn normalize(&self) -> Result<String, FolioError> {
        normalize(&self.text, &self.exchange_suffix)
    }
}

/// Canonicalize `raw_text` for `exchange_code`.
///
/// The text is trimmed and upper-cased, anything from the first `.` onwards is dropped, and
/// `.{EXCHANGE}` is appended. An empty exchange code yields the bare base symbol.
pub fn normalize(raw_text: &str, exchange_code: &str) -> Result<String, FolioError> {
    let upper = raw_text.trim().to_uppercase();
    let base = upper.split('.').next().unwrap_or_default();
    if base.is_empty() {
        return Err(FolioError::InvalidTicker {
            raw: raw_text.to_string(),
        });
    }

    let exchange = exchange_code.trim().trim_start_matches('.').to_uppercase();
    if exchange.is_empty() {
        return Ok(base.to_string());
    }

    let suffix = format!(".{exchange}");
    if base.ends_with(&suffix) {
        Ok(base.to_string())
    } else {
        Ok(format!("{base}{suffix}"))
    }
}
