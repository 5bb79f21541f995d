//! Period key resolution: canonical day/month/quarter/year buckets
//!
//! Every other component buckets dates through this module so that keys,
//! labels and gap-free sequences agree across flow, retention, snapshot and
//! engagement series.

mod granularity;
mod key;
mod range;

pub use granularity::Granularity;
pub use key::{period_sequence, year_key, PeriodKey};
pub use range::DateRange;

pub(crate) use granularity::{last_of_month, months_between, shift_months};
