//! Single entry point for every membership computation
//!
//! Holds the two stores and the configuration, then hands out a
//! [`RequestScope`] per logical request. A scope pins "now" and fetches
//! members at most once, so several charts built for one page share the same
//! dataset.
//!
//! # Example
//! ```ignore
//! let analytics = MembershipAnalytics::new(member_store, snapshot_store, AnalyticsConfig::default());
//! let scope = analytics.scope(today);
//! let flow = scope.flow(Some(FlowSegment::Reason));
//! let retention = scope.annual_retention(2012, 2026)?;
//! ```

use std::borrow::Cow;
use std::cell::OnceCell;

use chrono::{Datelike, NaiveDate};

use crate::cancel::Cancellation;
use crate::config::AnalyticsConfig;
use crate::engagement::{engagement_summary, EngagementResult};
use crate::error::Result;
use crate::flow::{aggregate_flow, trailing_flow_window, FlowSegment, FlowWindow};
use crate::members::MemberRecord;
use crate::period::{DateRange, Granularity};
use crate::retention::{
    annual_retention, cohort_matrix, segment_options, segmented_retention, CohortMatrix, RetentionRow,
    SegmentOption, SegmentRetention,
};
use crate::snapshots::{snapshot_series, SnapshotRequest, SnapshotSeries};
use crate::store::{MembershipEventStore, SnapshotStore};

/// Membership analytics over a pair of stores
#[derive(Debug, Clone)]
pub struct MembershipAnalytics<M, S> {
    members: M,
    snapshots: S,
    config: AnalyticsConfig,
}

impl<M: MembershipEventStore, S: SnapshotStore> MembershipAnalytics<M, S> {
    pub fn new(members: M, snapshots: S, config: AnalyticsConfig) -> Self {
        Self {
            members,
            snapshots,
            config,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Start a request evaluated as of `now`
    pub fn scope(&self, now: NaiveDate) -> RequestScope<'_, M, S> {
        RequestScope {
            analytics: self,
            now,
            fetch_range: default_fetch_range(&self.config, now),
            members: OnceCell::new(),
            cancel: None,
        }
    }
}

/// Range covering every default computation: cohort years, flow fallback,
/// matrix and engagement windows
fn default_fetch_range(config: &AnalyticsConfig, now: NaiveDate) -> DateRange {
    let recent = config
        .flow
        .widest_range(now)
        .union(&DateRange::trailing_months(now, config.retention.matrix_months))
        .union(&DateRange::trailing_months(now, config.engagement.cohort_window_months));

    match DateRange::years(config.retention.first_cohort_year, now.year()) {
        Ok(years) => recent.union(&years),
        Err(_) => recent,
    }
}

/// One logical request: a fixed "now" and a memoized member fetch
pub struct RequestScope<'a, M, S> {
    analytics: &'a MembershipAnalytics<M, S>,
    now: NaiveDate,
    fetch_range: DateRange,
    members: OnceCell<Vec<MemberRecord>>,
    cancel: Option<Cancellation>,
}

impl<'a, M: MembershipEventStore, S: SnapshotStore> RequestScope<'a, M, S> {
    /// Attach a cancellation token for long computations
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn now(&self) -> NaiveDate {
        self.now
    }

    /// Members overlapping the default fetch range, fetched on first use
    pub fn members(&self) -> &[MemberRecord] {
        self.members.get_or_init(|| {
            let members = self.analytics.members.query(&self.fetch_range, None, None);
            log::debug!(
                "Fetched {} member records for {} to {}",
                members.len(),
                self.fetch_range.start(),
                self.fetch_range.end()
            );
            members
        })
    }

    /// Members for `range`; reuses the memoized fetch whenever it covers the range
    fn members_for(&self, range: &DateRange) -> Cow<'_, [MemberRecord]> {
        if self.fetch_range.covers(range) {
            return Cow::Borrowed(self.members());
        }
        log::debug!("Range {} to {} is outside the request fetch; querying store", range.start(), range.end());
        Cow::Owned(self.analytics.members.query(range, None, None))
    }

    /// Trailing flow window with fallback widening
    pub fn flow(&self, segment: Option<FlowSegment>) -> FlowWindow {
        trailing_flow_window(self.members(), self.now, &self.analytics.config.flow, segment)
    }

    /// Flow over an explicit range
    pub fn flow_between(&self, range: DateRange, granularity: Granularity, segment: Option<FlowSegment>) -> FlowWindow {
        aggregate_flow(&self.members_for(&range), range, granularity, segment)
    }

    pub fn annual_retention(&self, start_year: i32, end_year: i32) -> Result<Vec<RetentionRow>> {
        let range = DateRange::years(start_year, end_year)?;
        annual_retention(&self.members_for(&range), start_year, end_year, self.now, None)
    }

    /// Annual retention from the configured first cohort year through now
    pub fn default_annual_retention(&self) -> Result<Vec<RetentionRow>> {
        self.annual_retention(self.analytics.config.retention.first_cohort_year, self.now.year())
    }

    /// Top values of `dimension` by cohort size over the default cohort years
    pub fn segment_options(&self, dimension: &str) -> Result<Vec<SegmentOption>> {
        let config = &self.analytics.config.retention;
        let range = DateRange::years(config.first_cohort_year, self.now.year())?;
        segment_options(
            &self.members_for(&range),
            dimension,
            config.first_cohort_year,
            self.now.year(),
            config.segment_limit,
        )
    }

    pub fn segmented_retention(&self, dimension: &str, start_year: i32, end_year: i32) -> Result<Vec<SegmentRetention>> {
        let range = DateRange::years(start_year, end_year)?;
        segmented_retention(
            &self.members_for(&range),
            dimension,
            start_year,
            end_year,
            self.now,
            self.analytics.config.retention.segment_limit,
        )
    }

    /// Monthly cohort matrix; partial when the scope's cancellation fires
    pub fn cohort_matrix(&self) -> CohortMatrix {
        cohort_matrix(
            self.members(),
            self.now,
            self.analytics.config.retention.matrix_months,
            self.cancel.as_ref(),
        )
    }

    pub fn snapshot_series(&self, request: &SnapshotRequest) -> SnapshotSeries {
        snapshot_series(&self.analytics.snapshots, request)
    }

    /// Grand-total series, limited by the configured totals period limit
    pub fn totals_snapshot_series(&self, granularity: Granularity) -> SnapshotSeries {
        let request = SnapshotRequest {
            limit: self.analytics.config.snapshots.totals_period_limit,
            ..SnapshotRequest::totals(granularity)
        };
        self.snapshot_series(&request)
    }

    /// Type-segmented series, limited to the configured number of periods
    pub fn type_snapshot_series(&self, granularity: Granularity) -> SnapshotSeries {
        let limit = self.analytics.config.snapshots.type_period_limit;
        self.snapshot_series(&SnapshotRequest::by_type(granularity, Some(limit)))
    }

    pub fn engagement(&self) -> EngagementResult {
        engagement_summary(self.members(), self.now, &self.analytics.config.engagement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::PeriodKey;
    use crate::snapshots::{Snapshot, SnapshotCadence};
    use crate::store::{InMemoryMemberStore, InMemorySnapshotStore};
    use crate::members::SegmentFilter;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> NaiveDate {
        date(2026, 10, 19)
    }

    struct CountingStore {
        inner: InMemoryMemberStore,
        queries: AtomicUsize,
    }

    impl MembershipEventStore for CountingStore {
        fn query(&self, range: &DateRange, membership_type: Option<&str>, segment: Option<&SegmentFilter>) -> Vec<MemberRecord> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.query(range, membership_type, segment)
        }
    }

    fn analytics(members: Vec<MemberRecord>, snapshots: Vec<Snapshot>) -> MembershipAnalytics<InMemoryMemberStore, InMemorySnapshotStore> {
        MembershipAnalytics::new(
            InMemoryMemberStore::new(members),
            InMemorySnapshotStore::new(snapshots),
            AnalyticsConfig::default(),
        )
    }

    #[test]
    fn test_scenario_a_annual_retention() {
        let members: Vec<MemberRecord> = (1..=10u64)
            .map(|id| {
                let member = MemberRecord::new(id, date(2023, 3, id as u32), "Individual");
                if id <= 2 {
                    member.ended(date(2023, 6, 15), Some("moved")).unwrap()
                } else {
                    member
                }
            })
            .collect();
        let analytics = analytics(members, Vec::new());
        let scope = analytics.scope(now());

        let rows = scope.default_annual_retention().unwrap();
        assert_eq!(rows.first().map(|r| r.year), Some(2012));
        assert_eq!(rows.last().map(|r| r.year), Some(2026));

        let row = rows.iter().find(|r| r.year == 2023).unwrap();
        assert_eq!(row.joined, 10);
        assert_eq!(row.active, 8);
        let expected = (100.0 * 0.8f64.powf(1.0 / 3.0) * 100.0).round() / 100.0;
        assert_relative_eq!(row.annualized_retention_percent, expected);
        assert_relative_eq!(row.annualized_retention_percent, 92.83);

        let flow = scope.flow_between(
            DateRange::years(2023, 2023).unwrap(),
            Granularity::Month,
            Some(FlowSegment::Reason),
        );
        assert_eq!(flow.ending_by_reason["moved"][&PeriodKey::resolve(date(2023, 6, 1), Granularity::Month)], 2);
    }

    #[test]
    fn test_scenario_b_flow_widens() {
        let members: Vec<MemberRecord> = (1..=5u64)
            .map(|id| MemberRecord::new(id, date(2025, 4, 2 + id as u32), "Family"))
            .collect();
        let analytics = analytics(members, Vec::new());

        let flow = analytics.scope(now()).flow(None);
        assert!(flow.window_expanded);
        assert_eq!(flow.period_keys.len(), 24);
        assert_eq!(flow.incoming_totals[&PeriodKey::resolve(date(2025, 4, 1), Granularity::Month)], 5);
    }

    #[test]
    fn test_scenario_c_degraded_snapshots() {
        let snapshots = vec![
            Snapshot::totals(1, date(2026, 8, 31).and_hms_opt(23, 0, 0).unwrap(), SnapshotCadence::Monthly, 400),
            Snapshot::totals(2, date(2026, 9, 30).and_hms_opt(23, 0, 0).unwrap(), SnapshotCadence::Monthly, 410),
        ];
        let analytics = analytics(Vec::new(), snapshots);

        let series = analytics.scope(now()).totals_snapshot_series(Granularity::Day);
        assert!(series.degraded);
        assert_eq!(series.granularity, Granularity::Month);
        assert_eq!(series.rows.len(), 2);
        assert_eq!(series.coverage.anchor_count, 2);
    }

    #[test]
    fn test_scenario_d_empty_engagement() {
        let members = vec![MemberRecord::new(1, date(2020, 1, 1), "Individual").with_milestone("orientation", date(2020, 1, 2))];
        let analytics = analytics(members, Vec::new());

        let result = analytics.scope(now()).engagement();
        assert_eq!(result.cohort_size, 0);
        assert!(result.stages.is_empty());
        assert!(result.velocity.buckets.is_empty());
        assert_eq!(result.velocity.median_days, None);
    }

    #[test]
    fn test_scope_fetches_members_once() {
        let store = CountingStore {
            inner: InMemoryMemberStore::new(vec![MemberRecord::new(1, date(2026, 9, 1), "Individual")]),
            queries: AtomicUsize::new(0),
        };
        let analytics = MembershipAnalytics::new(store, InMemorySnapshotStore::default(), AnalyticsConfig::default());
        let scope = analytics.scope(now());

        scope.flow(None);
        scope.cohort_matrix();
        scope.engagement();
        scope.default_annual_retention().unwrap();
        assert_eq!(analytics.members.queries.load(Ordering::SeqCst), 1);

        // Years before the configured first cohort need their own fetch
        scope.annual_retention(2005, 2006).unwrap();
        assert_eq!(analytics.members.queries.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancelled_scope_returns_partial_matrix() {
        let analytics = analytics(vec![MemberRecord::new(1, date(2026, 9, 1), "Individual")], Vec::new());
        let token = Cancellation::new();
        token.cancel();

        let matrix = analytics.scope(now()).with_cancellation(token).cohort_matrix();
        assert!(matrix.partial);
    }

    #[test]
    fn test_reversed_years_propagate() {
        let analytics = analytics(Vec::new(), Vec::new());
        assert!(analytics.scope(now()).annual_retention(2026, 2020).is_err());
        assert!(analytics.scope(now()).segmented_retention("gender", 2026, 2020).is_err());
    }
}
