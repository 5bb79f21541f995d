//! Flow window output: joined vs ended counts per period

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::period::{DateRange, Granularity, PeriodKey};

/// Breakdown used to rank flow series before charting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowSegment {
    /// Membership type of the joining/ending member
    Type,
    /// Ending reason
    Reason,
}

impl FromStr for FlowSegment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "type" | "membership_type" => Ok(FlowSegment::Type),
            "reason" | "end_reason" => Ok(FlowSegment::Reason),
            other => Err(format!("Unknown flow segment: {}", other)),
        }
    }
}

/// Per-label counts keyed by period
pub type PeriodCounts = BTreeMap<PeriodKey, u64>;

/// Membership inflow/outflow over a bounded range
///
/// Totals and breakdowns are filled in the same pass, so for every period the
/// totals equal the sum over each breakdown. Totals carry every period of the
/// range (zero-filled); breakdowns are sparse.
#[derive(Debug, Clone, Serialize)]
pub struct FlowWindow {
    /// Effective range after any fallback widening
    pub range: DateRange,

    pub granularity: Granularity,

    /// Breakdown selected for ranking
    pub segment: Option<FlowSegment>,

    /// Set when the trailing window was empty and had to be widened
    pub window_expanded: bool,

    /// Every period of the range, in order
    pub period_keys: Vec<PeriodKey>,

    pub incoming_totals: PeriodCounts,
    pub ending_totals: PeriodCounts,

    pub incoming_by_type: BTreeMap<String, PeriodCounts>,
    pub ending_by_type: BTreeMap<String, PeriodCounts>,
    pub ending_by_reason: BTreeMap<String, PeriodCounts>,

    /// Window-wide totals for ranking series
    pub incoming_type_totals: BTreeMap<String, u64>,
    pub ending_type_totals: BTreeMap<String, u64>,
    pub ending_reason_totals: BTreeMap<String, u64>,
}

impl FlowWindow {
    /// Empty window with every period of `range` present at zero
    pub fn empty(range: DateRange, granularity: Granularity, segment: Option<FlowSegment>) -> Self {
        let period_keys = range.periods(granularity);
        let zeroes: PeriodCounts = period_keys.iter().map(|k| (*k, 0)).collect();
        Self {
            range,
            granularity,
            segment,
            window_expanded: false,
            period_keys,
            incoming_totals: zeroes.clone(),
            ending_totals: zeroes,
            incoming_by_type: BTreeMap::new(),
            ending_by_type: BTreeMap::new(),
            ending_by_reason: BTreeMap::new(),
            incoming_type_totals: BTreeMap::new(),
            ending_type_totals: BTreeMap::new(),
            ending_reason_totals: BTreeMap::new(),
        }
    }

    pub(crate) fn record_incoming(&mut self, period: PeriodKey, membership_type: &str) {
        *self.incoming_totals.entry(period).or_insert(0) += 1;
        *self
            .incoming_by_type
            .entry(membership_type.to_string())
            .or_default()
            .entry(period)
            .or_insert(0) += 1;
        *self.incoming_type_totals.entry(membership_type.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn record_ending(&mut self, period: PeriodKey, membership_type: &str, reason: &str) {
        *self.ending_totals.entry(period).or_insert(0) += 1;
        *self
            .ending_by_type
            .entry(membership_type.to_string())
            .or_default()
            .entry(period)
            .or_insert(0) += 1;
        *self
            .ending_by_reason
            .entry(reason.to_string())
            .or_default()
            .entry(period)
            .or_insert(0) += 1;
        *self.ending_type_totals.entry(membership_type.to_string()).or_insert(0) += 1;
        *self.ending_reason_totals.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn total_incoming(&self) -> u64 {
        self.incoming_totals.values().sum()
    }

    pub fn total_ending(&self) -> u64 {
        self.ending_totals.values().sum()
    }

    /// No joins and no endings anywhere in the window
    pub fn is_empty(&self) -> bool {
        self.total_incoming() == 0 && self.total_ending() == 0
    }

    /// Incoming minus ending for every period
    pub fn net_change(&self) -> Vec<(PeriodKey, i64)> {
        self.period_keys
            .iter()
            .map(|k| {
                let joined = self.incoming_totals.get(k).copied().unwrap_or(0) as i64;
                let ended = self.ending_totals.get(k).copied().unwrap_or(0) as i64;
                (*k, joined - ended)
            })
            .collect()
    }

    /// Dense series for one breakdown label, aligned with `period_keys`
    pub fn aligned(&self, counts: &PeriodCounts) -> Vec<u64> {
        self.period_keys
            .iter()
            .map(|k| counts.get(k).copied().unwrap_or(0))
            .collect()
    }

    /// Membership types ranked by window-wide joins
    pub fn ranked_types(&self) -> Vec<(String, u64)> {
        rank(&self.incoming_type_totals)
    }

    /// Ending reasons ranked by window-wide endings
    pub fn ranked_reasons(&self) -> Vec<(String, u64)> {
        rank(&self.ending_reason_totals)
    }

    /// Ranking for the selected segment; types when none was selected
    pub fn segment_ranking(&self) -> Vec<(String, u64)> {
        match self.segment {
            Some(FlowSegment::Reason) => self.ranked_reasons(),
            Some(FlowSegment::Type) | None => self.ranked_types(),
        }
    }
}

/// Largest first; equal totals fall back to label order
fn rank(totals: &BTreeMap<String, u64>) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = totals.iter().map(|(k, v)| (k.clone(), *v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}
