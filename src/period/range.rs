//! Inclusive date ranges

use chrono::NaiveDate;
use serde::Serialize;

use super::granularity::{first_of_month, last_of_month, shift_months};
use super::key::{period_sequence, PeriodKey};
use super::Granularity;
use crate::error::{AnalyticsError, Result};

/// Inclusive `start..=end` date range; start never after end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(AnalyticsError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Trailing window of `months` calendar months ending at `now`
    ///
    /// The window opens on the first day of the month `months - 1` months
    /// before the month of `now`, so a 12-month window ending mid-October
    /// starts on the first of the previous November.
    pub fn trailing_months(now: NaiveDate, months: u32) -> Self {
        let back = months.max(1) as i32 - 1;
        Self {
            start: shift_months(now, -back),
            end: now,
        }
    }

    /// Whole calendar years `start_year..=end_year`
    pub fn years(start_year: i32, end_year: i32) -> Result<Self> {
        if start_year > end_year {
            return Err(AnalyticsError::reversed_years(start_year, end_year));
        }
        Ok(Self {
            start: first_of_month(start_year, 1),
            end: last_of_month(first_of_month(end_year, 12)),
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Whether `[from, to]` overlaps the range; an open `to` runs forever
    pub fn overlaps(&self, from: NaiveDate, to: Option<NaiveDate>) -> bool {
        from <= self.end && to.map_or(true, |to| to >= self.start)
    }

    /// Whether `other` lies entirely inside this range
    pub fn covers(&self, other: &DateRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Smallest range covering both
    pub fn union(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn periods(&self, granularity: Granularity) -> Vec<PeriodKey> {
        // Bounds are validated at construction.
        period_sequence(self.start, self.end, granularity).unwrap_or_default()
    }
}
