//! Core domain types and logic.

pub mod acquisition;
pub mod alignment;
pub mod analysis;
pub mod benchmark;
pub mod config_validation;
pub mod error;
pub mod position;
pub mod price_series;
pub mod returns;
pub mod ticker;
pub mod valuation;
