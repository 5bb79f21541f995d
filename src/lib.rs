//! Membership Analytics - lifecycle analytics engine for membership organizations
//!
//! This library provides:
//! - Canonical period keys and gap-free period sequences
//! - Joined-vs-ended flow windows with fallback widening
//! - Annual, segmented and monthly-matrix cohort retention
//! - Snapshot anchor series collapsed to one value per period
//! - Engagement funnels and days-to-first-milestone velocity

pub mod analytics;
pub mod cancel;
pub mod config;
pub mod engagement;
pub mod error;
pub mod flow;
pub mod members;
pub mod period;
pub mod retention;
pub mod snapshots;
pub mod store;

// Re-export commonly used types
pub use analytics::{MembershipAnalytics, RequestScope};
pub use cancel::Cancellation;
pub use config::AnalyticsConfig;
pub use engagement::{EngagementConfig, EngagementResult};
pub use error::{AnalyticsError, Result};
pub use flow::{FlowConfig, FlowSegment, FlowWindow};
pub use members::{MemberRecord, SegmentFilter};
pub use period::{DateRange, Granularity, PeriodKey};
pub use retention::{CohortMatrix, RetentionConfig, RetentionRow};
pub use snapshots::{Snapshot, SnapshotConfig, SnapshotRequest, SnapshotSeries};
pub use store::{InMemoryMemberStore, InMemorySnapshotStore, MembershipEventStore, SnapshotStore};
