//! Days-to-first-milestone distribution

use serde::Serialize;

use super::funnel::round1;
use crate::members::MemberRecord;

/// Label for members with no qualifying milestone in the activation window
pub const NO_MILESTONE_LABEL: &str = "No milestone yet";

/// Upper bound (inclusive) and label of each elapsed-days bucket
const DAY_BUCKETS: [(i64, &str); 5] = [
    (3, "0-3 days"),
    (7, "4-7 days"),
    (14, "8-14 days"),
    (30, "15-30 days"),
    (60, "31-60 days"),
];
const OVERFLOW_BUCKET: &str = "60+ days";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VelocityBucket {
    pub label: String,
    pub count: u64,
}

/// How quickly a cohort reached its first milestone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VelocityDistribution {
    pub milestone: String,
    pub activation_window_days: i64,
    /// Elapsed-days buckets followed by the "No milestone yet" bucket
    pub buckets: Vec<VelocityBucket>,
    pub median_days: Option<f64>,
    pub reached_within_window: u64,
    /// Share of the cohort reaching the milestone in the window, one decimal
    pub cohort_percent: f64,
}

fn bucket_index(days: i64) -> usize {
    DAY_BUCKETS
        .iter()
        .position(|(upper, _)| days <= *upper)
        .unwrap_or(DAY_BUCKETS.len())
}

fn empty_buckets() -> Vec<VelocityBucket> {
    DAY_BUCKETS
        .iter()
        .map(|(_, label)| *label)
        .chain(std::iter::once(OVERFLOW_BUCKET))
        .map(|label| VelocityBucket {
            label: label.to_string(),
            count: 0,
        })
        .collect()
}

/// Median of the values; the mean of the middle pair for even counts
pub fn median(values: &mut [i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) as f64 / 2.0)
    } else {
        Some(values[mid] as f64)
    }
}

/// Days from joining to the first `milestone`, bucketed
///
/// Only milestones within `activation_window_days` of joining count; later
/// ones land in the "No milestone yet" bucket. An empty cohort yields no
/// buckets and no median.
pub fn velocity_distribution(
    cohort: &[&MemberRecord],
    milestone: &str,
    activation_window_days: i64,
) -> VelocityDistribution {
    let mut result = VelocityDistribution {
        milestone: milestone.to_string(),
        activation_window_days,
        buckets: Vec::new(),
        median_days: None,
        reached_within_window: 0,
        cohort_percent: 0.0,
    };
    if cohort.is_empty() {
        return result;
    }

    let mut buckets = empty_buckets();
    let mut elapsed: Vec<i64> = Vec::new();
    let mut not_reached = 0u64;

    for member in cohort {
        let days = member
            .first_milestone_after_join(milestone)
            .map(|on| (on - member.join_date()).num_days())
            .filter(|days| *days <= activation_window_days);
        match days {
            Some(days) => {
                buckets[bucket_index(days)].count += 1;
                elapsed.push(days);
            }
            None => not_reached += 1,
        }
    }

    buckets.push(VelocityBucket {
        label: NO_MILESTONE_LABEL.to_string(),
        count: not_reached,
    });

    result.reached_within_window = elapsed.len() as u64;
    result.cohort_percent = round1(100.0 * elapsed.len() as f64 / cohort.len() as f64);
    result.median_days = median(&mut elapsed);
    result.buckets = buckets;
    result
}

/// Every milestone of any kind achieved within the activation window,
/// bucketed by days since joining
pub fn milestone_volume(cohort: &[&MemberRecord], activation_window_days: i64) -> Vec<VelocityBucket> {
    if cohort.is_empty() {
        return Vec::new();
    }

    let mut buckets = empty_buckets();
    for member in cohort {
        for achieved in &member.milestones {
            let days = (achieved.achieved_on - member.join_date()).num_days();
            if (0..=activation_window_days).contains(&days) {
                buckets[bucket_index(days)].count += 1;
            }
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn member_after(id: u64, days: Option<i64>) -> MemberRecord {
        let joined = date(2026, 1, 1);
        let member = MemberRecord::new(id, joined, "Individual");
        match days {
            Some(days) => member.with_milestone("orientation", joined + Duration::days(days)),
            None => member,
        }
    }

    #[test]
    fn test_bucket_edges() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(3), 0);
        assert_eq!(bucket_index(4), 1);
        assert_eq!(bucket_index(14), 2);
        assert_eq!(bucket_index(15), 3);
        assert_eq!(bucket_index(60), 4);
        assert_eq!(bucket_index(61), 5);
    }

    #[test]
    fn test_distribution() {
        let members = vec![
            member_after(1, Some(0)),
            member_after(2, Some(5)),
            member_after(3, Some(20)),
            member_after(4, Some(75)),
            member_after(5, Some(200)),
            member_after(6, None),
        ];
        let cohort: Vec<&MemberRecord> = members.iter().collect();

        let velocity = velocity_distribution(&cohort, "orientation", 90);
        let counts: Vec<u64> = velocity.buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 1, 0, 1, 0, 1, 2]);
        assert_eq!(velocity.buckets.last().unwrap().label, NO_MILESTONE_LABEL);
        assert_eq!(velocity.reached_within_window, 4);
        assert_eq!(velocity.cohort_percent, 66.7);
        // 0, 5, 20, 75
        assert_eq!(velocity.median_days, Some(12.5));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [9, 1, 4]), Some(4.0));
        assert_eq!(median(&mut [4, 1]), Some(2.5));
    }

    #[test]
    fn test_milestone_volume_counts_every_kind() {
        let joined = date(2026, 1, 1);
        let members = vec![MemberRecord::new(1, joined, "Individual")
            .with_milestone("orientation", joined + Duration::days(2))
            .with_milestone("first_badge", joined + Duration::days(9))
            .with_milestone("first_badge", joined + Duration::days(120))
            .with_milestone("first_badge", joined - Duration::days(3))];
        let cohort: Vec<&MemberRecord> = members.iter().collect();

        let volume = milestone_volume(&cohort, 90);
        assert_eq!(volume.len(), 6);
        assert_eq!(volume.iter().map(|b| b.count).sum::<u64>(), 2);
        assert_eq!(volume[0].count, 1);
        assert_eq!(volume[2].count, 1);
    }

    #[test]
    fn test_empty_cohort() {
        let velocity = velocity_distribution(&[], "orientation", 90);
        assert!(velocity.buckets.is_empty());
        assert_eq!(velocity.median_days, None);
        assert_eq!(velocity.cohort_percent, 0.0);
        assert!(milestone_volume(&[], 90).is_empty());
    }
}
