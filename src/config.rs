//! Engine configuration
//!
//! Every field has a default, so a JSON file only needs to name what it
//! overrides:
//!
//! ```json
//! { "flow": { "window_months": 6 }, "engagement": { "activation_window_days": 60 } }
//! ```

use std::error::Error;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engagement::EngagementConfig;
use crate::flow::FlowConfig;
use crate::retention::RetentionConfig;
use crate::snapshots::SnapshotConfig;

/// Container for all component configurations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub flow: FlowConfig,
    pub retention: RetentionConfig,
    pub snapshots: SnapshotConfig,
    pub engagement: EngagementConfig,
}

impl AnalyticsConfig {
    pub fn from_json_str(json: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config {}: {}", path.as_ref().display(), e))?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Granularity;

    #[test]
    fn test_defaults() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.flow.window_months, 12);
        assert_eq!(config.flow.fallback_months, 24);
        assert_eq!(config.retention.first_cohort_year, 2012);
        assert_eq!(config.retention.segment_limit, 5);
        assert_eq!(config.retention.matrix_months, 24);
        assert_eq!(config.snapshots.type_period_limit, 18);
        assert_eq!(config.engagement.cohort_window_months, 12);
        assert_eq!(config.engagement.activation_window_days, 90);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AnalyticsConfig::from_json_str(
            r#"{ "flow": { "window_months": 6, "granularity": "quarter" }, "engagement": { "stages": ["orientation"] } }"#,
        )
        .unwrap();
        assert_eq!(config.flow.window_months, 6);
        assert_eq!(config.flow.fallback_months, 24);
        assert_eq!(config.flow.granularity, Granularity::Quarter);
        assert_eq!(config.engagement.stages, vec!["orientation"]);
        assert_eq!(config.engagement.activation_window_days, 90);
        assert_eq!(config.retention, RetentionConfig::default());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(AnalyticsConfig::from_json_str("{ \"flow\": 3 }").is_err());
    }
}
