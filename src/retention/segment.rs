//! Demographic segmentation of annual retention

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::Serialize;

use super::annual::{annual_retention, RetentionRow};
use crate::error::{AnalyticsError, Result};
use crate::members::{MemberRecord, SegmentFilter};

/// A segment value with the number of members who joined under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentOption {
    pub value: String,
    pub cohort_size: u64,
}

/// Annual retention table for one segment value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRetention {
    pub segment: SegmentFilter,
    pub cohort_size: u64,
    pub rows: Vec<RetentionRow>,
}

/// Top `limit` values of `dimension` among members who joined in the year range
///
/// Largest cohorts first, ties by value. Members without the dimension are
/// not counted.
pub fn segment_options(
    members: &[MemberRecord],
    dimension: &str,
    start_year: i32,
    end_year: i32,
    limit: usize,
) -> Result<Vec<SegmentOption>> {
    if start_year > end_year {
        return Err(AnalyticsError::reversed_years(start_year, end_year));
    }

    let mut sizes: HashMap<&str, u64> = HashMap::new();
    for member in members {
        let year = member.join_date().year();
        if year < start_year || year > end_year {
            continue;
        }
        if let Some(value) = member.dimension_value(dimension) {
            *sizes.entry(value).or_insert(0) += 1;
        }
    }

    let mut options: Vec<SegmentOption> = sizes
        .into_iter()
        .map(|(value, cohort_size)| SegmentOption {
            value: value.to_string(),
            cohort_size,
        })
        .collect();
    options.sort_by(|a, b| b.cohort_size.cmp(&a.cohort_size).then_with(|| a.value.cmp(&b.value)));
    options.truncate(limit);
    Ok(options)
}

/// Annual retention for each of the top `limit` values of `dimension`
///
/// Segments are evaluated in parallel; output order follows
/// [`segment_options`].
pub fn segmented_retention(
    members: &[MemberRecord],
    dimension: &str,
    start_year: i32,
    end_year: i32,
    now: NaiveDate,
    limit: usize,
) -> Result<Vec<SegmentRetention>> {
    let options = segment_options(members, dimension, start_year, end_year, limit)?;
    log::debug!(
        "Evaluating {} segment(s) of '{}' for {}-{}",
        options.len(),
        dimension,
        start_year,
        end_year
    );

    options
        .into_par_iter()
        .map(|option| {
            let segment = SegmentFilter::new(dimension, option.value);
            let rows = annual_retention(members, start_year, end_year, now, Some(&segment))?;
            Ok(SegmentRetention {
                segment,
                cohort_size: option.cohort_size,
                rows,
            })
        })
        .collect()
}
