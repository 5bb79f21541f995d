//! Single-pass join/end aggregation with trailing-window fallback

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::window::{FlowSegment, FlowWindow};
use crate::members::MemberRecord;
use crate::period::{DateRange, Granularity, PeriodKey};

/// Configuration for trailing flow windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Months in the default trailing window
    pub window_months: u32,

    /// Months to widen to when the default window holds no events
    pub fallback_months: u32,

    /// Bucket size for the series
    pub granularity: Granularity,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            window_months: 12,
            fallback_months: 24,
            granularity: Granularity::Month,
        }
    }
}

impl FlowConfig {
    /// Widest range the trailing window can reach, for prefetching members
    pub fn widest_range(&self, now: NaiveDate) -> DateRange {
        DateRange::trailing_months(now, self.window_months.max(self.fallback_months))
    }
}

/// Count joins and endings per period over `range`
///
/// A record contributes to the incoming side at its join period when the join
/// date is in range, and to the ending side at its end period when the end
/// date is in range. Endings without a reason are filed under "unspecified".
pub fn aggregate_flow(
    members: &[MemberRecord],
    range: DateRange,
    granularity: Granularity,
    segment: Option<FlowSegment>,
) -> FlowWindow {
    let mut window = FlowWindow::empty(range, granularity, segment);

    for member in members {
        let joined = member.join_date();
        if range.contains(joined) {
            window.record_incoming(PeriodKey::resolve(joined, granularity), &member.membership_type);
        }

        if let Some(ended) = member.end_date() {
            if range.contains(ended) {
                window.record_ending(
                    PeriodKey::resolve(ended, granularity),
                    &member.membership_type,
                    member.end_reason_label(),
                );
            }
        }
    }

    window
}

/// Flow for the trailing window ending at `now`, widened once if empty
///
/// An all-zero result after widening is a valid "no data" answer.
pub fn trailing_flow_window(
    members: &[MemberRecord],
    now: NaiveDate,
    config: &FlowConfig,
    segment: Option<FlowSegment>,
) -> FlowWindow {
    let range = DateRange::trailing_months(now, config.window_months);
    let window = aggregate_flow(members, range, config.granularity, segment);
    if !window.is_empty() || config.fallback_months <= config.window_months {
        return window;
    }

    log::debug!(
        "No joins or endings in trailing {} months before {}; widening to {} months",
        config.window_months,
        now,
        config.fallback_months
    );

    let wide_range = DateRange::trailing_months(now, config.fallback_months);
    let mut widened = aggregate_flow(members, wide_range, config.granularity, segment);
    widened.window_expanded = true;
    widened
}
