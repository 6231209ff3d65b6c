use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::monitor::CycleReport;
use crate::types::nan_as_null;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    #[serde(with = "nan_as_null")]
    pub timestamp: f64,
    pub uptime_seconds: u64,
    pub cycles: u64,
    // Environment
    #[serde(with = "nan_as_null")]
    pub temperature_c: f64,
    #[serde(with = "nan_as_null")]
    pub humidity_pct: f64,
    #[serde(with = "nan_as_null")]
    pub pressure_hpa: f64,
    #[serde(with = "nan_as_null")]
    pub altitude_m: f64,
    #[serde(with = "nan_as_null")]
    pub gas_kohm: f64,
    // Vendor fusion
    #[serde(with = "nan_as_null")]
    pub iaq: f64,
    pub iaq_accuracy: u8,
    #[serde(with = "nan_as_null")]
    pub co2_eq_ppm: f64,
    #[serde(with = "nan_as_null")]
    pub voc_eq_ppm: f64,
    // Fallback estimator
    pub baseline_established: bool,
    pub gas_baseline_kohm: Option<f64>,
    pub gas_window_min_kohm: Option<f64>,
    pub voc_index: Option<f64>,
    pub voc_category: String,
    pub showing_fallback: bool,
    pub indicator: String,
    pub state_saves: u64,
}

impl LiveStatus {
    pub fn new() -> Self {
        Self {
            timestamp: current_timestamp(),
            uptime_seconds: 0,
            cycles: 0,
            temperature_c: f64::NAN,
            humidity_pct: f64::NAN,
            pressure_hpa: f64::NAN,
            altitude_m: f64::NAN,
            gas_kohm: f64::NAN,
            iaq: f64::NAN,
            iaq_accuracy: 0,
            co2_eq_ppm: f64::NAN,
            voc_eq_ppm: f64::NAN,
            baseline_established: false,
            gas_baseline_kohm: None,
            gas_window_min_kohm: None,
            voc_index: None,
            voc_category: "establishing".to_string(),
            showing_fallback: true,
            indicator: String::new(),
            state_saves: 0,
        }
    }

    pub fn update(&mut self, report: &CycleReport, uptime_seconds: u64) {
        let r = &report.reading;
        self.timestamp = current_timestamp();
        self.uptime_seconds = uptime_seconds;
        self.cycles = report.cycle;
        self.temperature_c = r.temperature_c;
        self.humidity_pct = r.humidity_pct;
        self.pressure_hpa = r.pressure_hpa;
        self.altitude_m = r.altitude_m;
        self.gas_kohm = r.gas_kohm;
        self.iaq = r.iaq;
        self.iaq_accuracy = r.iaq_accuracy.level();
        self.co2_eq_ppm = r.co2_eq_ppm;
        self.voc_eq_ppm = r.voc_eq_ppm;
        self.baseline_established = report.estimator.baseline_established;
        self.gas_baseline_kohm = report.estimator.baseline_kohm;
        self.gas_window_min_kohm = report.estimator.window_min_kohm;
        self.voc_index = report.fallback_index;
        self.voc_category = report.category.label().to_string();
        self.showing_fallback = report.indicator.is_fallback();
        self.indicator = report.indicator.summary();
        if report.state_saved {
            self.state_saves += 1;
        }
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::air_quality::AirQualityIndicator;
    use crate::sensors::test_output;
    use crate::types::EnvReading;
    use crate::voc_estimator::{GasBaselineEstimator, VocCategory};

    #[test]
    fn test_update_from_report() {
        let report = CycleReport {
            cycle: 3,
            reading: EnvReading::from_fusion(&test_output(1_000, 45_000.0, 2), 1013.25, 0),
            fallback_index: None,
            category: VocCategory::Establishing,
            estimator: GasBaselineEstimator::new(0).snapshot(),
            indicator: AirQualityIndicator::Fallback {
                index: None,
                category: VocCategory::Establishing,
            },
            state_saved: true,
        };

        let mut status = LiveStatus::new();
        status.update(&report, 42);
        assert_eq!(status.cycles, 3);
        assert_eq!(status.iaq_accuracy, 2);
        assert_eq!(status.gas_kohm, 45.0);
        assert_eq!(status.voc_category, "establishing");
        assert!(status.showing_fallback);
        assert_eq!(status.state_saves, 1);

        let dir = crate::state_store::scratch_dir("live_status");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("live_status.json");
        status.save(path.to_str().unwrap()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"voc_category\": \"establishing\""));
        let reloaded: LiveStatus = serde_json::from_str(&text).unwrap();
        assert_eq!(reloaded.cycles, 3);
        assert_eq!(reloaded.gas_kohm, 45.0);

        // A fresh status still holds NaN placeholders; they come back as NaN
        LiveStatus::new().save(path.to_str().unwrap()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"temperature_c\": null"));
        let reloaded: LiveStatus = serde_json::from_str(&text).unwrap();
        assert!(reloaded.temperature_c.is_nan());
        assert!(reloaded.iaq.is_nan());

        let _ = fs::remove_dir_all(dir);
    }
}
