//! Population snapshots and their per-period anchors

mod anchor;
mod data;
pub mod loader;

pub use anchor::{
    resolve_anchors, snapshot_series, Coverage, SnapshotConfig, SnapshotRequest, SnapshotRow, SnapshotSeries,
};
pub use data::{Snapshot, SnapshotCadence, SnapshotScope};
pub use loader::load_snapshots;
