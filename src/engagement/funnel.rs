//! Ordered milestone funnel

use serde::Serialize;

use crate::members::MemberRecord;

/// Label of the implicit first stage
pub const JOINED_STAGE: &str = "joined";

/// Members that reached one funnel stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub label: String,
    pub count: u64,
    /// Share of the whole cohort, 0-100 rounded to one decimal
    pub percent_of_cohort: f64,
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Funnel counts for `joined` followed by each of `stages`
///
/// A member reaches stage k only when they also reached stage k-1, so counts
/// never increase down the funnel. Milestones before the join date are
/// ignored.
pub fn milestone_funnel(cohort: &[&MemberRecord], stages: &[String]) -> Vec<FunnelStage> {
    let size = cohort.len() as u64;
    if size == 0 {
        return Vec::new();
    }

    // Deepest stage reached by each member, 0 meaning joined only
    let depths: Vec<usize> = cohort
        .iter()
        .map(|member| {
            stages
                .iter()
                .take_while(|stage| member.first_milestone_after_join(stage).is_some())
                .count()
        })
        .collect();

    std::iter::once(JOINED_STAGE)
        .chain(stages.iter().map(String::as_str))
        .enumerate()
        .map(|(level, label)| {
            let count = depths.iter().filter(|&&depth| depth >= level).count() as u64;
            FunnelStage {
                label: label.to_string(),
                count,
                percent_of_cohort: round1(100.0 * count as f64 / size as f64),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stages() -> Vec<String> {
        vec!["orientation".into(), "first_badge".into(), "tool_enabled_badge".into()]
    }

    #[test]
    fn test_funnel_is_non_increasing() {
        let members = vec![
            MemberRecord::new(1, date(2026, 3, 1), "Individual")
                .with_milestone("orientation", date(2026, 3, 2))
                .with_milestone("first_badge", date(2026, 3, 10))
                .with_milestone("tool_enabled_badge", date(2026, 4, 1)),
            // Badge without orientation does not count past the first gap
            MemberRecord::new(2, date(2026, 3, 5), "Individual").with_milestone("first_badge", date(2026, 3, 6)),
            MemberRecord::new(3, date(2026, 3, 8), "Family").with_milestone("orientation", date(2026, 3, 8)),
            // Orientation before joining is ignored
            MemberRecord::new(4, date(2026, 3, 9), "Family").with_milestone("orientation", date(2026, 2, 1)),
        ];
        let cohort: Vec<&MemberRecord> = members.iter().collect();

        let funnel = milestone_funnel(&cohort, &stages());
        let counts: Vec<u64> = funnel.iter().map(|s| s.count).collect();
        assert_eq!(counts, vec![4, 2, 1, 1]);
        assert_eq!(funnel[0].label, JOINED_STAGE);
        assert_eq!(funnel[0].percent_of_cohort, 100.0);
        assert_eq!(funnel[1].percent_of_cohort, 50.0);
        assert!(counts.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_empty_cohort_has_no_stages() {
        assert!(milestone_funnel(&[], &stages()).is_empty());
    }

    #[test]
    fn test_rounding_to_one_decimal() {
        assert_eq!(round1(100.0 / 3.0), 33.3);
        assert_eq!(round1(200.0 / 3.0), 66.7);
    }
}
