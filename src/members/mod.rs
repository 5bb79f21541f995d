//! Membership records and CSV loading

mod data;
pub mod loader;

pub use data::{MemberRecord, Milestone, SegmentFilter, MEMBERSHIP_TYPE_DIMENSION, UNSPECIFIED_REASON};
pub use loader::{attach_milestones, load_members, load_members_from_reader};
