//! Port traits at the I/O boundary.

pub mod clock_port;
pub mod config_port;
pub mod market_data_port;
pub mod report_port;
