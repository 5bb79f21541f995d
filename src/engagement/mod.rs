//! Engagement funnel and milestone velocity for a recent join cohort

mod funnel;
mod velocity;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::members::MemberRecord;
use crate::period::DateRange;

pub use funnel::{milestone_funnel, FunnelStage, JOINED_STAGE};
pub use velocity::{
    median, milestone_volume, velocity_distribution, VelocityBucket, VelocityDistribution, NO_MILESTONE_LABEL,
};

/// Configuration for engagement analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    /// Trailing months of joins that form the cohort
    pub cohort_window_months: u32,

    /// Days after joining during which milestones count toward velocity
    pub activation_window_days: i64,

    /// Funnel stages after "joined", in order
    pub stages: Vec<String>,

    /// Milestone timed by the velocity distribution; the first stage when unset
    ///
    /// Defaults to `first_badge`: orientation alone is not activation.
    pub velocity_milestone: Option<String>,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            cohort_window_months: 12,
            activation_window_days: 90,
            stages: vec![
                "orientation".to_string(),
                "first_badge".to_string(),
                "tool_enabled_badge".to_string(),
            ],
            velocity_milestone: Some("first_badge".to_string()),
        }
    }
}

impl EngagementConfig {
    pub fn velocity_milestone(&self) -> Option<&str> {
        self.velocity_milestone
            .as_deref()
            .or_else(|| self.stages.first().map(String::as_str))
    }
}

/// Funnel and velocity for one cohort
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementResult {
    pub cohort_range: DateRange,
    pub cohort_size: u64,
    /// Joined first, then each configured stage; empty for an empty cohort
    pub stages: Vec<FunnelStage>,
    /// Stage counts keyed by label
    pub stage_totals: BTreeMap<String, u64>,
    pub velocity: VelocityDistribution,
    pub milestone_volume: Vec<VelocityBucket>,
}

impl EngagementResult {
    pub fn is_empty(&self) -> bool {
        self.cohort_size == 0
    }
}

/// Engagement for members who joined in the trailing cohort window before `now`
pub fn engagement_summary(members: &[MemberRecord], now: NaiveDate, config: &EngagementConfig) -> EngagementResult {
    let cohort_range = DateRange::trailing_months(now, config.cohort_window_months);
    let cohort: Vec<&MemberRecord> = members
        .iter()
        .filter(|m| cohort_range.contains(m.join_date()))
        .collect();

    if cohort.is_empty() {
        log::debug!("Engagement cohort {} to {} is empty", cohort_range.start(), cohort_range.end());
    }

    let stages = milestone_funnel(&cohort, &config.stages);
    let stage_totals = stages.iter().map(|s| (s.label.clone(), s.count)).collect();
    let velocity = match config.velocity_milestone() {
        Some(milestone) => velocity_distribution(&cohort, milestone, config.activation_window_days),
        None => velocity_distribution(&[], "", config.activation_window_days),
    };

    EngagementResult {
        cohort_range,
        cohort_size: cohort.len() as u64,
        stages,
        stage_totals,
        velocity,
        milestone_volume: milestone_volume(&cohort, config.activation_window_days),
    }
}
