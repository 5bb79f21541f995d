//! Membership flow: joins vs endings per period

mod aggregator;
mod window;

pub use aggregator::{aggregate_flow, trailing_flow_window, FlowConfig};
pub use window::{FlowSegment, FlowWindow, PeriodCounts};
