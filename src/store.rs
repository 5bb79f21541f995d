//! Read-only data sources consumed by the engine
//!
//! Both stores are blocking fetches that hand back complete in-memory
//! collections. The in-memory implementations back the CLI and the tests; a
//! host application plugs its own database-backed implementations in.

use crate::members::{MemberRecord, SegmentFilter};
use crate::period::{DateRange, Granularity};
use crate::snapshots::Snapshot;

/// Source of membership records
pub trait MembershipEventStore: Send + Sync {
    /// Records whose membership spell overlaps `range`, optionally restricted to
    /// one membership type and/or one segment
    fn query(
        &self,
        range: &DateRange,
        membership_type: Option<&str>,
        segment: Option<&SegmentFilter>,
    ) -> Vec<MemberRecord>;
}

/// Source of population snapshots
pub trait SnapshotStore: Send + Sync {
    /// Snapshots usable for a series at `granularity`
    ///
    /// `period_limit` is a hint; the anchor resolver enforces the limit itself.
    fn query(&self, granularity: Granularity, type_segmented: bool, period_limit: Option<usize>) -> Vec<Snapshot>;
}

/// Membership store over a preloaded vector
#[derive(Debug, Clone, Default)]
pub struct InMemoryMemberStore {
    members: Vec<MemberRecord>,
}

impl InMemoryMemberStore {
    pub fn new(members: Vec<MemberRecord>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl MembershipEventStore for InMemoryMemberStore {
    fn query(
        &self,
        range: &DateRange,
        membership_type: Option<&str>,
        segment: Option<&SegmentFilter>,
    ) -> Vec<MemberRecord> {
        self.members
            .iter()
            .filter(|m| range.overlaps(m.join_date(), m.end_date()))
            .filter(|m| membership_type.map_or(true, |t| m.membership_type == t))
            .filter(|m| segment.map_or(true, |s| s.matches(m)))
            .cloned()
            .collect()
    }
}

/// Snapshot store over a preloaded vector
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Vec<Snapshot>,
}

impl InMemorySnapshotStore {
    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        Self { snapshots }
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn query(&self, granularity: Granularity, type_segmented: bool, _period_limit: Option<usize>) -> Vec<Snapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.serves(granularity))
            .filter(|s| !type_segmented || s.has_type_breakdown())
            .cloned()
            .collect()
    }
}
