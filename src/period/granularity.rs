//! Bucketing granularity for period keys

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;

/// Size of the bucket a date is collapsed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    /// First day of the bucket containing `date`
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Month => first_of_month(date.year(), date.month()),
            Granularity::Quarter => {
                let quarter_month = (date.month0() / 3) * 3 + 1;
                first_of_month(date.year(), quarter_month)
            }
            Granularity::Year => first_of_month(date.year(), 1),
        }
    }

    /// Start of the bucket following the one that starts at `start`
    pub fn next_start(&self, start: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => start.succ_opt().unwrap_or(NaiveDate::MAX),
            Granularity::Month => shift_months(start, 1),
            Granularity::Quarter => shift_months(start, 3),
            Granularity::Year => shift_months(start, 12),
        }
    }

    /// Next coarser granularity; day snapshot series degrade to it
    pub fn coarser(&self) -> Option<Granularity> {
        match self {
            Granularity::Day => Some(Granularity::Month),
            Granularity::Month => Some(Granularity::Quarter),
            Granularity::Quarter => Some(Granularity::Year),
            Granularity::Year => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "month" | "monthly" => Ok(Granularity::Month),
            "quarter" | "quarterly" => Ok(Granularity::Quarter),
            "year" | "yearly" | "annual" => Ok(Granularity::Year),
            other => Err(AnalyticsError::UnsupportedGranularity(other.to_string())),
        }
    }
}

/// First day of the given month; saturates outside chrono's supported years
pub(crate) fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(if year < 0 {
        NaiveDate::MIN
    } else {
        NaiveDate::MAX
    })
}

/// Move a date by whole months, landing on the first of the target month
pub(crate) fn shift_months(date: NaiveDate, delta: i32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + delta;
    first_of_month(total.div_euclid(12), total.rem_euclid(12) as u32 + 1)
}

/// Whole calendar months from the month of `from` to the month of `to`
pub(crate) fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month0() as i32 - from.month0() as i32
}

/// Last day of the month containing `date`
pub(crate) fn last_of_month(date: NaiveDate) -> NaiveDate {
    shift_months(date, 1).pred_opt().unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_start() {
        let d = date(2023, 8, 17);
        assert_eq!(Granularity::Day.period_start(d), d);
        assert_eq!(Granularity::Month.period_start(d), date(2023, 8, 1));
        assert_eq!(Granularity::Quarter.period_start(d), date(2023, 7, 1));
        assert_eq!(Granularity::Year.period_start(d), date(2023, 1, 1));
    }

    #[test]
    fn test_shift_months_crosses_years() {
        assert_eq!(shift_months(date(2023, 11, 20), 3), date(2024, 2, 1));
        assert_eq!(shift_months(date(2024, 1, 5), -1), date(2023, 12, 1));
        assert_eq!(shift_months(date(2024, 1, 5), -23), date(2022, 2, 1));
    }

    #[test]
    fn test_months_between_and_month_end() {
        assert_eq!(months_between(date(2023, 3, 31), date(2024, 2, 1)), 11);
        assert_eq!(months_between(date(2024, 2, 1), date(2023, 3, 31)), -11);
        assert_eq!(last_of_month(date(2024, 2, 10)), date(2024, 2, 29));
        assert_eq!(last_of_month(date(2023, 12, 1)), date(2023, 12, 31));
    }

    #[test]
    fn test_parse_granularity() {
        assert_eq!("Month".parse::<Granularity>(), Ok(Granularity::Month));
        assert_eq!(" daily ".parse::<Granularity>(), Ok(Granularity::Day));
        assert_eq!(
            "fortnight".parse::<Granularity>(),
            Err(AnalyticsError::UnsupportedGranularity("fortnight".to_string()))
        );
    }

    #[test]
    fn test_coarser_chain_ends_at_year() {
        let mut chain = vec![Granularity::Day];
        while let Some(next) = chain.last().and_then(Granularity::coarser) {
            chain.push(next);
        }
        assert_eq!(
            chain,
            vec![Granularity::Day, Granularity::Month, Granularity::Quarter, Granularity::Year]
        );
    }
}
