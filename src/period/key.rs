//! Canonical period keys and gap-free period sequences

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::granularity::{first_of_month, Granularity};
use crate::error::{AnalyticsError, Result};

/// A canonical period: the granularity plus the first day of the bucket
///
/// Keys order chronologically within one granularity. They serialize as their
/// canonical string (`2023-03`, `2023-Q1`, ...) so they can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodKey {
    granularity: Granularity,
    start: NaiveDate,
}

impl PeriodKey {
    /// Resolve the period containing `date`
    pub fn resolve(date: NaiveDate, granularity: Granularity) -> Self {
        Self {
            granularity,
            start: granularity.period_start(date),
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Representative date of the period (its first day)
    pub fn representative_date(&self) -> NaiveDate {
        self.start
    }

    /// Last day covered by the period
    pub fn end_date(&self) -> NaiveDate {
        self.granularity
            .next_start(self.start)
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn next(&self) -> Self {
        Self {
            granularity: self.granularity,
            start: self.granularity.next_start(self.start),
        }
    }

    /// Canonical string key
    pub fn key(&self) -> String {
        match self.granularity {
            Granularity::Day => self.start.format("%Y-%m-%d").to_string(),
            Granularity::Month => self.start.format("%Y-%m").to_string(),
            Granularity::Quarter => {
                format!("{}-Q{}", self.start.year(), self.start.month0() / 3 + 1)
            }
            Granularity::Year => self.start.format("%Y").to_string(),
        }
    }

    /// Human display label
    pub fn label(&self) -> String {
        match self.granularity {
            Granularity::Day => self.start.format("%b %-d, %Y").to_string(),
            Granularity::Month => self.start.format("%b %Y").to_string(),
            Granularity::Quarter => {
                format!("Q{} {}", self.start.month0() / 3 + 1, self.start.year())
            }
            Granularity::Year => self.start.format("%Y").to_string(),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for PeriodKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || format!("invalid period key \"{}\"", s);

        if let Some((year, quarter)) = s.split_once("-Q") {
            let year: i32 = year.parse().map_err(|_| invalid())?;
            let quarter: u32 = quarter.parse().map_err(|_| invalid())?;
            if !(1..=4).contains(&quarter) {
                return Err(invalid());
            }
            let start = NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1).ok_or_else(invalid)?;
            return Ok(Self { granularity: Granularity::Quarter, start });
        }

        match s.split('-').count() {
            1 => {
                let year: i32 = s.parse().map_err(|_| invalid())?;
                let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
                Ok(Self { granularity: Granularity::Year, start })
            }
            2 => {
                let start = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
                    .map_err(|_| invalid())?;
                Ok(Self { granularity: Granularity::Month, start })
            }
            3 => {
                let start = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| invalid())?;
                Ok(Self { granularity: Granularity::Day, start })
            }
            _ => Err(invalid()),
        }
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl<'de> Deserialize<'de> for PeriodKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Ordered, gap-free sequence of periods covering `start..=end`
///
/// Periods with no underlying data are included so downstream series stay
/// continuous.
pub fn period_sequence(start: NaiveDate, end: NaiveDate, granularity: Granularity) -> Result<Vec<PeriodKey>> {
    if start > end {
        return Err(AnalyticsError::InvalidRange { start, end });
    }

    let last = PeriodKey::resolve(end, granularity);
    let mut current = PeriodKey::resolve(start, granularity);
    let mut keys = Vec::new();
    while current <= last {
        keys.push(current);
        let next = current.next();
        if next == current {
            break;
        }
        current = next;
    }
    Ok(keys)
}

/// Year-granularity key for a calendar year
pub fn year_key(year: i32) -> PeriodKey {
    PeriodKey::resolve(first_of_month(year, 1), Granularity::Year)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_resolve_keys_and_labels() {
        let d = date(2023, 3, 9);
        let month = PeriodKey::resolve(d, Granularity::Month);
        assert_eq!(month.key(), "2023-03");
        assert_eq!(month.label(), "Mar 2023");
        assert_eq!(month.representative_date(), date(2023, 3, 1));
        assert_eq!(month.end_date(), date(2023, 3, 31));

        let quarter = PeriodKey::resolve(d, Granularity::Quarter);
        assert_eq!(quarter.key(), "2023-Q1");
        assert_eq!(quarter.label(), "Q1 2023");

        assert_eq!(PeriodKey::resolve(d, Granularity::Year).key(), "2023");
        assert_eq!(PeriodKey::resolve(d, Granularity::Day).label(), "Mar 9, 2023");
    }

    #[test]
    fn test_sequence_is_gap_free() {
        let keys = period_sequence(date(2023, 11, 15), date(2024, 2, 3), Granularity::Month).unwrap();
        let rendered: Vec<String> = keys.iter().map(|k| k.key()).collect();
        assert_eq!(rendered, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);

        let years = period_sequence(date(2020, 6, 1), date(2023, 1, 1), Granularity::Year).unwrap();
        assert_eq!(years.len(), 4);
    }

    #[test]
    fn test_single_day_range() {
        let keys = period_sequence(date(2024, 2, 29), date(2024, 2, 29), Granularity::Month).unwrap();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let err = period_sequence(date(2024, 5, 1), date(2024, 1, 1), Granularity::Month).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidRange { .. }));
    }

    #[test]
    fn test_representative_dates_resolve_back() {
        for granularity in [Granularity::Day, Granularity::Month, Granularity::Quarter, Granularity::Year] {
            let keys = period_sequence(date(2022, 12, 20), date(2024, 3, 2), granularity).unwrap();
            for key in &keys {
                assert_eq!(PeriodKey::resolve(key.representative_date(), granularity), *key);
            }
            for pair in keys.windows(2) {
                assert!(pair[0] < pair[1]);
            }
        }
    }

    #[test]
    fn test_parse_key_strings() {
        assert_eq!("2023-03".parse::<PeriodKey>().unwrap(), PeriodKey::resolve(date(2023, 3, 1), Granularity::Month));
        assert_eq!("2023-Q4".parse::<PeriodKey>().unwrap(), PeriodKey::resolve(date(2023, 11, 1), Granularity::Quarter));
        assert_eq!("2023".parse::<PeriodKey>().unwrap(), year_key(2023));
        assert_eq!("2023-03-09".parse::<PeriodKey>().unwrap().granularity(), Granularity::Day);
        assert!("2023-Q5".parse::<PeriodKey>().is_err());
        assert!("March".parse::<PeriodKey>().is_err());
    }

    #[test]
    fn test_serializes_as_key_string() {
        let key = PeriodKey::resolve(date(2024, 7, 4), Granularity::Month);
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2024-07\"");
        let back: PeriodKey = serde_json::from_str("\"2024-07\"").unwrap();
        assert_eq!(back, key);
    }
}
