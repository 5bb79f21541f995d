//! Point-in-time membership population snapshots

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::period::Granularity;

/// Schedule that produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotCadence {
    Daily,
    Monthly,
    Quarterly,
    Annually,
    Manual,
}

impl FromStr for SnapshotCadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(SnapshotCadence::Daily),
            "monthly" | "month" => Ok(SnapshotCadence::Monthly),
            "quarterly" | "quarter" => Ok(SnapshotCadence::Quarterly),
            "annually" | "annual" | "yearly" => Ok(SnapshotCadence::Annually),
            "manual" => Ok(SnapshotCadence::Manual),
            other => Err(format!("Unknown snapshot cadence: {}", other)),
        }
    }
}

/// What a snapshot counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotScope {
    /// Grand total only
    Totals,
    /// Grand total plus a per-membership-type breakdown
    ByType,
}

impl FromStr for SnapshotScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "totals" | "total" => Ok(SnapshotScope::Totals),
            "by_type" | "bytype" | "type" => Ok(SnapshotScope::ByType),
            other => Err(format!("Unknown snapshot scope: {}", other)),
        }
    }
}

/// A captured membership population count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: u64,
    pub captured_at: NaiveDateTime,
    pub cadence: SnapshotCadence,
    pub scope: SnapshotScope,

    /// Test captures never feed a series
    #[serde(default)]
    pub is_test: bool,

    /// Grand total reported by the capture itself
    pub total: u64,

    /// Per-type counts; may legitimately sum to something other than `total`
    #[serde(default)]
    pub by_type: Option<BTreeMap<String, u64>>,
}

impl Snapshot {
    /// Totals-scope snapshot
    pub fn totals(id: u64, captured_at: NaiveDateTime, cadence: SnapshotCadence, total: u64) -> Self {
        Self {
            id,
            captured_at,
            cadence,
            scope: SnapshotScope::Totals,
            is_test: false,
            total,
            by_type: None,
        }
    }

    /// Type-segmented snapshot
    pub fn by_type(
        id: u64,
        captured_at: NaiveDateTime,
        cadence: SnapshotCadence,
        total: u64,
        counts: BTreeMap<String, u64>,
    ) -> Self {
        Self {
            id,
            captured_at,
            cadence,
            scope: SnapshotScope::ByType,
            is_test: false,
            total,
            by_type: Some(counts),
        }
    }

    /// Mark as a test capture
    pub fn as_test(mut self) -> Self {
        self.is_test = true;
        self
    }

    /// Daily captures feed only day series; every other cadence feeds the rest
    pub fn serves(&self, granularity: Granularity) -> bool {
        (self.cadence == SnapshotCadence::Daily) == (granularity == Granularity::Day)
    }

    pub fn has_type_breakdown(&self) -> bool {
        self.scope == SnapshotScope::ByType && self.by_type.is_some()
    }
}
