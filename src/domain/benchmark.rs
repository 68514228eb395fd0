//! Market benchmarks used as comparison baselines.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Benchmark {
    /// Provider symbol, e.g. `^NSEI`.
    pub symbol: String,
    /// Display name, e.g. `NIFTY 50`.
    pub name: String,
}

impl Benchmark {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }
}

pub fn default_benchmarks() -> Vec<Benchmark> {
    vec![
        Benchmark::new("^NSEI", "NIFTY 50"),
        Benchmark::new("^BSESN", "SENSEX"),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BenchmarkParseError {
    #[error("empty token in benchmark list")]
    EmptyToken,

    #[error("expected SYMBOL:Name, got {0:?}")]
    MissingName(String),

    #[error("duplicate benchmark: {0}")]
    Duplicate(String),
}

/// Parse `SYMBOL:Name, SYMBOL:Name`. Symbols are upper-cased, names kept as written.
pub fn parse_benchmarks(input: &str) -> Result<Vec<Benchmark>, BenchmarkParseError> {
    let mut benchmarks = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(BenchmarkParseError::EmptyToken);
        }
        let (symbol, name) = trimmed
            .split_once(':')
            .map(|(s, n)| (s.trim().to_uppercase(), n.trim()))
            .filter(|(s, n)| !s.is_empty() && !n.is_empty())
            .ok_or_else(|| BenchmarkParseError::MissingName(trimmed.to_string()))?;
        if !seen.insert(name.to_string()) || !seen.insert(symbol.clone()) {
            return Err(BenchmarkParseError::Duplicate(trimmed.to_string()));
        }
        benchmarks.push(Benchmark::new(symbol, name));
    }

    Ok(benchmarks)
}
