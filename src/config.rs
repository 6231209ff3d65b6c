use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{MonitorError, MonitorResult};
use crate::types::{IaqAccuracy, STANDARD_SEA_LEVEL_HPA};
use crate::voc_estimator::{EstimatorTiming, BASELINE_DELAY_MS, WINDOW_UPDATE_INTERVAL_MS};

/// Largest calibration blob the fusion library hands out
pub const MAX_STATE_BLOB_SIZE: usize = 221;

/// Monitor configuration. Every field is optional in the JSON file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Minimum spacing between published cycles
    pub update_interval_ms: u64,
    /// Minimum spacing between calibration-state saves
    pub state_save_interval_ms: u64,
    pub baseline_delay_ms: u64,
    pub window_update_interval_ms: u64,
    pub sea_level_pressure_hpa: f64,
    /// Vendor IAQ is shown at or above this accuracy, fallback index below it
    pub trusted_iaq_accuracy: IaqAccuracy,
    pub state_namespace: String,
    pub state_key: String,
    pub max_state_blob_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 5_000,
            state_save_interval_ms: 5 * 60 * 1000,
            baseline_delay_ms: BASELINE_DELAY_MS,
            window_update_interval_ms: WINDOW_UPDATE_INTERVAL_MS,
            sea_level_pressure_hpa: STANDARD_SEA_LEVEL_HPA,
            trusted_iaq_accuracy: IaqAccuracy::High,
            state_namespace: "bsec2".to_string(),
            state_key: "state".to_string(),
            max_state_blob_size: MAX_STATE_BLOB_SIZE,
        }
    }
}

impl MonitorConfig {
    pub fn load(path: &Path) -> MonitorResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| MonitorError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> MonitorResult<Self> {
        let config: MonitorConfig =
            serde_json::from_str(text).map_err(|e| MonitorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if !(self.sea_level_pressure_hpa.is_finite() && self.sea_level_pressure_hpa > 0.0) {
            return Err(MonitorError::Config(format!(
                "sea_level_pressure_hpa must be positive, got {}",
                self.sea_level_pressure_hpa
            )));
        }
        if self.state_namespace.is_empty() || self.state_key.is_empty() {
            return Err(MonitorError::Config(
                "state_namespace and state_key must not be empty".to_string(),
            ));
        }
        let path_like = |s: &str| s == "." || s == ".." || s.contains(['/', '\\']);
        if path_like(&self.state_namespace) || path_like(&self.state_key) {
            return Err(MonitorError::Config(
                "state_namespace and state_key must be plain names".to_string(),
            ));
        }
        if self.max_state_blob_size == 0 {
            return Err(MonitorError::Config(
                "max_state_blob_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn estimator_timing(&self) -> EstimatorTiming {
        EstimatorTiming {
            baseline_delay_ms: self.baseline_delay_ms,
            window_update_interval_ms: self.window_update_interval_ms,
        }
    }
}
