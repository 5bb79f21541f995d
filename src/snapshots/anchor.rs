//! Collapse irregular snapshots into one anchor value per period

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::data::Snapshot;
use crate::period::{Granularity, PeriodKey};
use crate::store::SnapshotStore;

/// Configuration for snapshot series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Periods kept for type-segmented series
    pub type_period_limit: usize,

    /// Periods kept for totals series; `None` keeps everything
    pub totals_period_limit: Option<usize>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            type_period_limit: 18,
            totals_period_limit: None,
        }
    }
}

/// Parameters for one snapshot series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub granularity: Granularity,
    pub type_segmented: bool,
    /// Keep only the most recent N periods
    pub limit: Option<usize>,
}

impl SnapshotRequest {
    pub fn totals(granularity: Granularity) -> Self {
        Self {
            granularity,
            type_segmented: false,
            limit: None,
        }
    }

    pub fn by_type(granularity: Granularity, limit: Option<usize>) -> Self {
        Self {
            granularity,
            type_segmented: true,
            limit,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Anchor snapshot for one period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub period: PeriodKey,
    /// Representative date of the period
    pub period_date: NaiveDate,
    pub snapshot_id: u64,
    pub captured_at: NaiveDateTime,
    /// The anchor's own grand total, used as the share denominator
    pub total: u64,
    pub types: Option<BTreeMap<String, u64>>,
}

impl SnapshotRow {
    /// Share of the anchor's grand total held by `membership_type`, 0-100
    ///
    /// Type counts need not sum to the total, so shares need not sum to 100.
    pub fn type_share_percent(&self, membership_type: &str) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let count = self.types.as_ref()?.get(membership_type).copied().unwrap_or(0);
        Some(count as f64 * 100.0 / self.total as f64)
    }
}

/// Span of the anchors that made it into a series
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub first_anchor: Option<NaiveDate>,
    pub last_anchor: Option<NaiveDate>,
    pub anchor_count: usize,
}

impl Coverage {
    fn from_rows(rows: &[SnapshotRow]) -> Self {
        Self {
            first_anchor: rows.first().map(|r| r.captured_at.date()),
            last_anchor: rows.last().map(|r| r.captured_at.date()),
            anchor_count: rows.len(),
        }
    }

    /// Human-readable coverage line, `None` for an empty series
    pub fn note(&self) -> Option<String> {
        let first = self.first_anchor?;
        let last = self.last_anchor?;
        Some(format!(
            "Based on {} snapshot{} from {} to {}",
            self.anchor_count,
            if self.anchor_count == 1 { "" } else { "s" },
            first.format("%b %-d, %Y"),
            last.format("%b %-d, %Y")
        ))
    }
}

/// One representative snapshot per period, oldest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSeries {
    pub requested_granularity: Granularity,
    /// Granularity actually used after any fallback
    pub granularity: Granularity,
    pub type_segmented: bool,
    /// Set when a day series was requested but only coarser snapshots exist
    pub degraded: bool,
    pub rows: Vec<SnapshotRow>,
    pub coverage: Coverage,
}

impl SnapshotSeries {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Membership types ordered by their summed counts across the series
    pub fn type_order(&self) -> Vec<String> {
        let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
        for types in self.rows.iter().filter_map(|r| r.types.as_ref()) {
            for (label, count) in types {
                *totals.entry(label.as_str()).or_insert(0) += count;
            }
        }
        let mut ordered: Vec<(&str, u64)> = totals.into_iter().collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ordered.into_iter().map(|(label, _)| label.to_string()).collect()
    }
}

fn usable(snapshot: &Snapshot, type_segmented: bool) -> bool {
    !snapshot.is_test && (!type_segmented || snapshot.has_type_breakdown())
}

fn has_daily(snapshots: &[Snapshot], type_segmented: bool) -> bool {
    snapshots
        .iter()
        .any(|s| usable(s, type_segmented) && s.serves(Granularity::Day))
}

/// Coarser granularity for a day request that has no daily captures to use
fn day_fallback(snapshots: &[Snapshot], request: &SnapshotRequest) -> Option<Granularity> {
    if request.granularity != Granularity::Day || has_daily(snapshots, request.type_segmented) {
        return None;
    }
    request.granularity.coarser()
}

/// Resolve a series from an already-fetched snapshot collection
pub fn resolve_anchors(snapshots: &[Snapshot], request: &SnapshotRequest) -> SnapshotSeries {
    match day_fallback(snapshots, request) {
        Some(fallback) => {
            log::info!("No daily snapshots available; falling back to {} anchors", fallback);
            collapse(snapshots, request, fallback, true)
        }
        None => collapse(snapshots, request, request.granularity, false),
    }
}

/// Fetch from `store` and resolve, degrading day requests to months when needed
pub fn snapshot_series<S: SnapshotStore + ?Sized>(store: &S, request: &SnapshotRequest) -> SnapshotSeries {
    let fetched = store.query(request.granularity, request.type_segmented, request.limit);
    match day_fallback(&fetched, request) {
        Some(fallback) => {
            log::info!("Snapshot store returned no daily snapshots; falling back to {} anchors", fallback);
            let coarser = store.query(fallback, request.type_segmented, request.limit);
            collapse(&coarser, request, fallback, true)
        }
        None => collapse(&fetched, request, request.granularity, false),
    }
}

fn collapse(
    snapshots: &[Snapshot],
    request: &SnapshotRequest,
    granularity: Granularity,
    degraded: bool,
) -> SnapshotSeries {
    let mut anchors: BTreeMap<PeriodKey, &Snapshot> = BTreeMap::new();
    for snapshot in snapshots
        .iter()
        .filter(|s| usable(s, request.type_segmented) && s.serves(granularity))
    {
        let period = PeriodKey::resolve(snapshot.captured_at.date(), granularity);
        anchors
            .entry(period)
            .and_modify(|current| {
                if (snapshot.captured_at, snapshot.id) > (current.captured_at, current.id) {
                    *current = snapshot;
                }
            })
            .or_insert(snapshot);
    }

    let mut rows: Vec<SnapshotRow> = anchors
        .into_iter()
        .map(|(period, anchor)| SnapshotRow {
            period,
            period_date: period.representative_date(),
            snapshot_id: anchor.id,
            captured_at: anchor.captured_at,
            total: anchor.total,
            types: if request.type_segmented {
                anchor.by_type.clone()
            } else {
                None
            },
        })
        .collect();

    if let Some(limit) = request.limit {
        if rows.len() > limit {
            rows.drain(..rows.len() - limit);
        }
    }

    SnapshotSeries {
        requested_granularity: request.granularity,
        granularity,
        type_segmented: request.type_segmented,
        degraded,
        coverage: Coverage::from_rows(&rows),
        rows,
    }
}
