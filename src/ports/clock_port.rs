//! Time port: the current date and blocking waits between retries.

use chrono::NaiveDate;
use std::time::Duration;

pub trait ClockPort {
    fn today(&self) -> NaiveDate;
    fn sleep(&self, duration: Duration);
}
