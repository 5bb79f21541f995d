//! Error types crossing the analytics boundary
//!
//! Only caller mistakes surface as errors. Empty datasets, degraded snapshot
//! series and cancelled matrix runs are ordinary result states carried as
//! fields on the returned structures.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised synchronously by the analytics entry points
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyticsError {
    /// Range bounds were supplied in reverse order
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// A membership end date may only be recorded once
    #[error("membership {0} already has an end date")]
    AlreadyEnded(u64),

    /// Granularity name not recognised
    #[error("unsupported granularity \"{0}\"")]
    UnsupportedGranularity(String),
}

impl AnalyticsError {
    /// Reversed year bounds, reported as the dates they span
    pub fn reversed_years(start_year: i32, end_year: i32) -> Self {
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap_or(NaiveDate::MIN);
        let end = NaiveDate::from_ymd_opt(end_year, 12, 31).unwrap_or(NaiveDate::MAX);
        AnalyticsError::InvalidRange { start, end }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
