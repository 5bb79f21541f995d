//! Monthly cohort retention matrix
//!
//! Rows are join-month cohorts, columns are elapsed months since joining. A
//! cell holds the share of the cohort still a member at the end of that
//! elapsed month, or `None` when the cohort has not lived that long yet.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::annual::round2;
use crate::cancel::Cancellation;
use crate::members::MemberRecord;
use crate::period::{last_of_month, months_between, shift_months, Granularity, PeriodKey};

/// One join-month cohort and its retention curve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortMatrixRow {
    pub cohort: PeriodKey,
    pub label: String,
    /// Members who joined in the cohort month
    pub size: u64,
    /// Retention percentage by elapsed month, starting at offset 0
    pub cells: Vec<Option<f64>>,
}

impl CohortMatrixRow {
    /// Last observed retention value
    pub fn latest(&self) -> Option<f64> {
        self.cells.iter().rev().find_map(|c| *c)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortMatrix {
    pub as_of: NaiveDate,
    /// Elapsed-month column indices
    pub offsets: Vec<u32>,
    /// Oldest cohort first
    pub rows: Vec<CohortMatrixRow>,
    /// Set when cancellation stopped the computation early
    pub partial: bool,
}

/// Retained through a checkpoint month: not ended, or ended in a later month
///
/// A member ending in month `c+m` is churned at offset `m`, including in the
/// current month.
fn retained_through(member: &MemberRecord, month_end: NaiveDate) -> bool {
    member.end_date().map_or(true, |end| end > month_end)
}

/// Retention matrix for the last `months` join-month cohorts up to `now`
///
/// Offsets run from 0 through `months`. Cohorts are processed oldest first;
/// when `cancel` fires, the completed rows are returned flagged `partial`.
pub fn cohort_matrix(
    members: &[MemberRecord],
    now: NaiveDate,
    months: u32,
    cancel: Option<&Cancellation>,
) -> CohortMatrix {
    build_matrix(members, now, months, |_| cancel.map_or(false, Cancellation::is_cancelled))
}

/// `should_stop` is asked before each cohort with the number of rows completed
fn build_matrix(
    members: &[MemberRecord],
    now: NaiveDate,
    months: u32,
    mut should_stop: impl FnMut(usize) -> bool,
) -> CohortMatrix {
    let first_month = shift_months(now, 1 - months as i32);

    let mut cohorts: HashMap<PeriodKey, Vec<&MemberRecord>> = HashMap::new();
    for member in members {
        let joined = member.join_date();
        if joined >= first_month && joined <= now {
            cohorts
                .entry(PeriodKey::resolve(joined, Granularity::Month))
                .or_default()
                .push(member);
        }
    }

    let mut matrix = CohortMatrix {
        as_of: now,
        offsets: (0..=months).collect(),
        rows: Vec::with_capacity(months as usize),
        partial: false,
    };

    let mut cohort = PeriodKey::resolve(first_month, Granularity::Month);
    for _ in 0..months {
        if should_stop(matrix.rows.len()) {
            log::info!(
                "Cohort matrix cancelled after {} of {} cohorts",
                matrix.rows.len(),
                months
            );
            matrix.partial = true;
            break;
        }

        let group = cohorts.get(&cohort).map(Vec::as_slice).unwrap_or(&[]);
        let size = group.len() as u64;
        let age = months_between(cohort.representative_date(), now);
        let cells = matrix
            .offsets
            .iter()
            .map(|&offset| {
                if size == 0 || offset as i32 > age {
                    return None;
                }
                let month_end = last_of_month(shift_months(cohort.representative_date(), offset as i32));
                let retained = group
                    .iter()
                    .filter(|m| retained_through(m, month_end))
                    .count() as u64;
                Some(round2(100.0 * retained as f64 / size as f64))
            })
            .collect();

        matrix.rows.push(CohortMatrixRow {
            cohort,
            label: cohort.label(),
            size,
            cells,
        });
        cohort = cohort.next();
    }

    matrix
}
