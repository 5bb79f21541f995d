//! Cohort retention: annual tables, segmented tables and the monthly matrix

mod annual;
mod matrix;
mod segment;

pub use annual::{
    annual_retention, annualized_retention_percent, cohort_age_years, RetentionConfig, RetentionRow,
};
pub use matrix::{cohort_matrix, CohortMatrix, CohortMatrixRow};
pub use segment::{segment_options, segmented_retention, SegmentOption, SegmentRetention};
