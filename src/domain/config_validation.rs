//! Configuration validation.
//!
//! Checks every key before any file or network I/O and reports the first violation.

use crate::domain::acquisition::MAX_RECENT_WINDOW_DAYS;
use crate::domain::benchmark::parse_benchmarks;
use crate::domain::error::FolioError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const PROVIDER_KINDS: [&str; 2] = ["yahoo", "csv"];

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), FolioError> {
    validate_dates(config)?;
    validate_benchmarks(config)?;
    validate_provider(config)?;
    validate_retry(config)?;
    validate_fallback(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> FolioError {
    FolioError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parse an optional `YYYY-MM-DD` key.
pub fn parse_date_key(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, FolioError> {
    match config.get_trimmed(section, key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| invalid(section, key, format!("invalid {key} format, expected YYYY-MM-DD"))),
    }
}

/// Parse an optional integer key, rejecting values below `min`.
pub fn parse_int_key(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    min: i64,
) -> Result<Option<i64>, FolioError> {
    parse_bounded_int_key(config, section, key, min, i64::MAX)
}

/// Parse an optional integer key that must lie in `min..=max`.
pub fn parse_bounded_int_key(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    min: i64,
    max: i64,
) -> Result<Option<i64>, FolioError> {
    let Some(raw) = config.get_trimmed(section, key) else {
        return Ok(None);
    };
    let value: i64 = raw
        .parse()
        .map_err(|_| invalid(section, key, format!("{key} must be an integer")))?;
    if value < min {
        return Err(invalid(section, key, format!("{key} must be at least {min}")));
    }
    if value > max {
        return Err(invalid(section, key, format!("{key} must be at most {max}")));
    }
    Ok(Some(value))
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), FolioError> {
    parse_date_key(config, "analysis", "start_date")?;
    parse_date_key(config, "analysis", "end_date")?;
    Ok(())
}

fn validate_benchmarks(config: &dyn ConfigPort) -> Result<(), FolioError> {
    if let Some(list) = config.get_trimmed("analysis", "benchmarks") {
        parse_benchmarks(&list).map_err(|e| invalid("analysis", "benchmarks", e.to_string()))?;
    }
    Ok(())
}

fn validate_provider(config: &dyn ConfigPort) -> Result<(), FolioError> {
    let kind = config
        .get_trimmed("provider", "kind")
        .unwrap_or_else(|| PROVIDER_KINDS[0].to_string())
        .to_lowercase();
    if !PROVIDER_KINDS.contains(&kind.as_str()) {
        return Err(invalid(
            "provider",
            "kind",
            format!("unknown provider {kind:?}, expected one of {}", PROVIDER_KINDS.join(", ")),
        ));
    }
    if kind == "csv" && config.get_trimmed("provider", "data_dir").is_none() {
        return Err(FolioError::ConfigMissing {
            section: "provider".to_string(),
            key: "data_dir".to_string(),
        });
    }
    parse_int_key(config, "provider", "timeout_secs", 1)?;
    Ok(())
}

fn validate_retry(config: &dyn ConfigPort) -> Result<(), FolioError> {
    parse_int_key(config, "retry", "max_attempts", 1)?;
    parse_int_key(config, "retry", "base_delay_ms", 0)?;
    Ok(())
}

fn validate_fallback(config: &dyn ConfigPort) -> Result<(), FolioError> {
    parse_bounded_int_key(
        config,
        "fallback",
        "recent_window_days",
        1,
        i64::from(MAX_RECENT_WINDOW_DAYS),
    )?;
    Ok(())
}
