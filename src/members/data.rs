//! Membership records as delivered by the membership event store

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{AnalyticsError, Result};

/// Dimension name that addresses the record's membership type rather than a tag
pub const MEMBERSHIP_TYPE_DIMENSION: &str = "membership_type";

/// Reason reported for endings recorded without one
pub const UNSPECIFIED_REASON: &str = "unspecified";

/// A completed engagement milestone (orientation, first badge, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Milestone {
    /// Milestone kind, matched against the configured funnel stages
    pub kind: String,

    /// Date the milestone was achieved
    pub achieved_on: NaiveDate,
}

/// One membership spell
///
/// A person who ends and later rejoins is represented by two records; each
/// spell belongs to the cohort of its own join date.
#[derive(Debug, Clone, Serialize)]
pub struct MemberRecord {
    /// Membership identifier
    pub id: u64,

    /// Join date (immutable once recorded)
    join_date: NaiveDate,

    /// End date, set at most once and never before the join date
    end_date: Option<NaiveDate>,

    /// Free-text ending reason
    pub end_reason: Option<String>,

    /// Membership type label
    pub membership_type: String,

    /// Demographic tags keyed by dimension (gender, ethnicity, ...)
    pub tags: BTreeMap<String, String>,

    /// Milestones completed by the member
    pub milestones: Vec<Milestone>,
}

impl MemberRecord {
    /// Create an open membership
    pub fn new(id: u64, join_date: NaiveDate, membership_type: impl Into<String>) -> Self {
        Self {
            id,
            join_date,
            end_date: None,
            end_reason: None,
            membership_type: membership_type.into(),
            tags: BTreeMap::new(),
            milestones: Vec::new(),
        }
    }

    /// Add a demographic tag
    pub fn with_tag(mut self, dimension: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(dimension.into(), value.into());
        self
    }

    /// Add a completed milestone
    pub fn with_milestone(mut self, kind: impl Into<String>, achieved_on: NaiveDate) -> Self {
        self.milestones.push(Milestone {
            kind: kind.into(),
            achieved_on,
        });
        self
    }

    /// Builder form of [`MemberRecord::end`]
    pub fn ended(mut self, end_date: NaiveDate, reason: Option<&str>) -> Result<Self> {
        self.end(end_date, reason.map(str::to_string))?;
        Ok(self)
    }

    /// Record the end of the membership
    pub fn end(&mut self, end_date: NaiveDate, reason: Option<String>) -> Result<()> {
        if self.end_date.is_some() {
            return Err(AnalyticsError::AlreadyEnded(self.id));
        }
        if end_date < self.join_date {
            return Err(AnalyticsError::InvalidRange {
                start: self.join_date,
                end: end_date,
            });
        }
        self.end_date = Some(end_date);
        self.end_reason = reason;
        Ok(())
    }

    pub fn join_date(&self) -> NaiveDate {
        self.join_date
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    /// Active as of `now`: no end date, or an end date not yet passed
    pub fn is_active_at(&self, now: NaiveDate) -> bool {
        self.end_date.map_or(true, |end| end >= now)
    }

    /// Ending reason with blanks folded into [`UNSPECIFIED_REASON`]
    pub fn end_reason_label(&self) -> &str {
        match self.end_reason.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => reason,
            _ => UNSPECIFIED_REASON,
        }
    }

    /// Value of a segmentation dimension for this member
    pub fn dimension_value(&self, dimension: &str) -> Option<&str> {
        if dimension == MEMBERSHIP_TYPE_DIMENSION {
            Some(self.membership_type.as_str())
        } else {
            self.tags.get(dimension).map(String::as_str)
        }
    }

    /// Earliest milestone of `kind` achieved on or after the join date
    pub fn first_milestone_after_join(&self, kind: &str) -> Option<NaiveDate> {
        self.milestones
            .iter()
            .filter(|m| m.kind == kind && m.achieved_on >= self.join_date)
            .map(|m| m.achieved_on)
            .min()
    }
}

/// Predicate selecting members whose `dimension` equals `value`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SegmentFilter {
    pub dimension: String,
    pub value: String,
}

impl SegmentFilter {
    pub fn new(dimension: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            dimension: dimension.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, member: &MemberRecord) -> bool {
        member.dimension_value(&self.dimension) == Some(self.value.as_str())
    }
}
