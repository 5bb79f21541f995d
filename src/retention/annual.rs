//! Annual cohort retention with annualized survival rates
//!
//! Cohorts of different ages are made comparable by converting the observed
//! retained fraction into an implied per-year rate:
//!
//! ```text
//! age_years  = max(1, now.year - cohort_year)
//! annualized = 100 * (active / joined) ^ (1 / age_years)
//! ```
//!
//! An 80%-retained one-year cohort and a 33%-retained five-year cohort both
//! come out near 80% per year.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::members::{MemberRecord, SegmentFilter};

/// Retention figures for one join-year cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionRow {
    pub year: i32,
    pub joined: u64,
    pub active: u64,
    pub inactive: u64,

    /// Raw retained share, 0-100
    pub retention_percent: f64,

    /// Implied per-year retention, 0-100; exactly 0 for an empty cohort
    pub annualized_retention_percent: f64,
}

/// Configuration for retention tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Earliest cohort year reported
    pub first_cohort_year: i32,

    /// Number of segment values surfaced by segmented tables
    pub segment_limit: usize,

    /// Month cohorts (and elapsed-month columns) in the cohort matrix
    pub matrix_months: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            first_cohort_year: 2012,
            segment_limit: 5,
            matrix_months: 24,
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Years a cohort has had to churn, never less than one
pub fn cohort_age_years(cohort_year: i32, now: NaiveDate) -> u32 {
    (now.year() - cohort_year).max(1) as u32
}

/// `round(100 * (active / joined) ^ (1 / age_years), 2)`, 0 when nobody joined
pub fn annualized_retention_percent(joined: u64, active: u64, age_years: u32) -> f64 {
    if joined == 0 {
        return 0.0;
    }
    let fraction = (active.min(joined) as f64) / (joined as f64);
    round2(100.0 * fraction.powf(1.0 / age_years.max(1) as f64))
}

/// One row per year in `start_year..=end_year`, optionally restricted to a segment
///
/// Years without joins still produce a row (all zero) so the series stays
/// continuous.
pub fn annual_retention(
    members: &[MemberRecord],
    start_year: i32,
    end_year: i32,
    now: NaiveDate,
    segment: Option<&SegmentFilter>,
) -> Result<Vec<RetentionRow>> {
    if start_year > end_year {
        return Err(AnalyticsError::reversed_years(start_year, end_year));
    }

    let span = (end_year - start_year + 1) as usize;
    let mut joined = vec![0u64; span];
    let mut active = vec![0u64; span];

    for member in members {
        if segment.map_or(false, |s| !s.matches(member)) {
            continue;
        }
        let year = member.join_date().year();
        if year < start_year || year > end_year {
            continue;
        }
        let idx = (year - start_year) as usize;
        joined[idx] += 1;
        if member.is_active_at(now) {
            active[idx] += 1;
        }
    }

    let rows = (start_year..=end_year)
        .zip(joined.into_iter().zip(active))
        .map(|(year, (joined, active))| {
            let retention_percent = if joined > 0 {
                round2(100.0 * active as f64 / joined as f64)
            } else {
                0.0
            };
            RetentionRow {
                year,
                joined,
                active,
                inactive: joined - active,
                retention_percent,
                annualized_retention_percent: annualized_retention_percent(
                    joined,
                    active,
                    cohort_age_years(year, now),
                ),
            }
        })
        .collect();

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_annualization_normalizes_cohort_age() {
        assert_relative_eq!(annualized_retention_percent(10, 8, 1), 80.0);
        // 0.8^5 = 0.32768, so a five-year cohort at ~33% implies ~80%/year
        assert_relative_eq!(annualized_retention_percent(100_000, 32_768, 5), 80.0);
        assert_eq!(annualized_retention_percent(0, 0, 3), 0.0);
        assert_eq!(annualized_retention_percent(12, 0, 3), 0.0);
        assert_eq!(annualized_retention_percent(12, 12, 3), 100.0);
    }

    #[test]
    fn test_cohort_age_floor() {
        let now = date(2026, 10, 19);
        assert_eq!(cohort_age_years(2026, now), 1);
        assert_eq!(cohort_age_years(2025, now), 1);
        assert_eq!(cohort_age_years(2023, now), 3);
    }

    #[test]
    fn test_rows_cover_every_year() {
        let now = date(2026, 10, 19);
        let members = vec![
            MemberRecord::new(1, date(2022, 2, 1), "Individual"),
            MemberRecord::new(2, date(2022, 5, 1), "Individual")
                .ended(date(2023, 1, 1), None)
                .unwrap(),
            MemberRecord::new(3, date(2024, 7, 1), "Family"),
        ];

        let rows = annual_retention(&members, 2021, 2024, now, None).unwrap();
        assert_eq!(rows.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2021, 2022, 2023, 2024]);

        assert_eq!(rows[0].joined, 0);
        assert_eq!(rows[0].annualized_retention_percent, 0.0);

        assert_eq!(rows[1].joined, 2);
        assert_eq!(rows[1].active, 1);
        assert_eq!(rows[1].inactive, 1);
        assert_relative_eq!(rows[1].retention_percent, 50.0);
        assert_relative_eq!(rows[1].annualized_retention_percent, round2(100.0 * 0.5f64.powf(0.25)));

        for row in &rows {
            assert!((0.0..=100.0).contains(&row.annualized_retention_percent));
        }
    }

    #[test]
    fn test_future_end_counts_as_active() {
        let now = date(2026, 10, 19);
        let members = vec![MemberRecord::new(1, date(2026, 1, 1), "Individual")
            .ended(date(2026, 10, 19), Some("scheduled"))
            .unwrap()];
        let rows = annual_retention(&members, 2026, 2026, now, None).unwrap();
        assert_eq!(rows[0].active, 1);
    }

    #[test]
    fn test_rejoin_is_a_new_cohort_membership() {
        let now = date(2026, 10, 19);
        // Same person: first spell churned, second spell still open
        let members = vec![
            MemberRecord::new(10, date(2022, 4, 1), "Individual")
                .ended(date(2023, 2, 1), Some("cost"))
                .unwrap(),
            MemberRecord::new(11, date(2024, 6, 1), "Individual"),
        ];
        let rows = annual_retention(&members, 2022, 2024, now, None).unwrap();
        assert_eq!((rows[0].joined, rows[0].active), (1, 0));
        assert_eq!((rows[2].joined, rows[2].active), (1, 1));
    }

    #[test]
    fn test_segment_predicate_restricts_members() {
        let now = date(2026, 10, 19);
        let members = vec![
            MemberRecord::new(1, date(2024, 2, 1), "Individual").with_tag("gender", "female"),
            MemberRecord::new(2, date(2024, 3, 1), "Individual")
                .with_tag("gender", "male")
                .ended(date(2024, 9, 1), None)
                .unwrap(),
        ];
        let female = SegmentFilter::new("gender", "female");
        let rows = annual_retention(&members, 2024, 2024, now, Some(&female)).unwrap();
        assert_eq!(rows[0].joined, 1);
        assert_eq!(rows[0].active, 1);
    }

    #[test]
    fn test_reversed_years_rejected() {
        let err = annual_retention(&[], 2025, 2020, date(2026, 1, 1), None).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidRange { .. }));
    }
}
