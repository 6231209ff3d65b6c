use serde::{Deserialize, Serialize};
use std::fmt;

/// Uptime that must pass before the first sample is locked in as clean-air baseline
pub const BASELINE_DELAY_MS: u64 = 120_000;
/// Lifetime of one rolling-minimum window
pub const WINDOW_UPDATE_INTERVAL_MS: u64 = 30_000;

/// One gas-resistance reading handed to the estimator
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GasSample {
    pub resistance_kohm: f64,
    pub timestamp_ms: u64,
}

impl GasSample {
    pub fn new(resistance_kohm: f64, timestamp_ms: u64) -> Self {
        Self {
            resistance_kohm,
            timestamp_ms,
        }
    }
}

/// Coarse air-quality band for the fallback index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocCategory {
    Establishing,
    Excellent,
    Normal,
    Degraded,
    Poor,
    Severe,
}

impl VocCategory {
    /// Threshold table, ascending, first match wins.
    /// Lower bounds are closed: 2.0 is Normal, 50.0 is Severe.
    pub fn classify(index: Option<f64>) -> Self {
        let index = match index {
            Some(v) if !v.is_nan() => v,
            _ => return VocCategory::Establishing,
        };

        if index < 2.0 {
            VocCategory::Excellent
        } else if index < 10.0 {
            VocCategory::Normal
        } else if index < 25.0 {
            VocCategory::Degraded
        } else if index < 50.0 {
            VocCategory::Poor
        } else {
            VocCategory::Severe
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VocCategory::Establishing => "establishing",
            VocCategory::Excellent => "excellent",
            VocCategory::Normal => "normal",
            VocCategory::Degraded => "degraded",
            VocCategory::Poor => "poor",
            VocCategory::Severe => "severe",
        }
    }
}

impl fmt::Display for VocCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Timing knobs; defaults are the constants above
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatorTiming {
    pub baseline_delay_ms: u64,
    pub window_update_interval_ms: u64,
}

impl Default for EstimatorTiming {
    fn default() -> Self {
        Self {
            baseline_delay_ms: BASELINE_DELAY_MS,
            window_update_interval_ms: WINDOW_UPDATE_INTERVAL_MS,
        }
    }
}

/// What a single `ingest` call did to the estimator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestEvent {
    /// Still inside the warm-up delay, nothing recorded
    Warming,
    /// This sample became the baseline
    BaselineCaptured,
    /// Window expired and restarted at this sample
    WindowReset,
    /// Running minimum updated (or left alone)
    Tracking,
}

/// Serializable view of the estimator for console and status output
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimatorSnapshot {
    pub baseline_established: bool,
    pub baseline_kohm: Option<f64>,
    pub window_min_kohm: Option<f64>,
    pub window_started_at_ms: u64,
    pub process_start_ms: u64,
}

/// Zero-calibration VOC estimator based on gas-resistance drop from a one-shot baseline.
///
/// The baseline is the first sample seen after the warm-up delay. The index is the
/// percentage the current resistance has fallen below it, clamped at zero. A rolling
/// minimum is tracked alongside and hard-reset every window interval so a past
/// contamination event ages out.
///
/// Time is always supplied by the caller; the estimator never reads a clock.
#[derive(Clone, Debug)]
pub struct GasBaselineEstimator {
    baseline_kohm: Option<f64>,
    window_min_kohm: Option<f64>,
    window_started_at_ms: u64,
    process_start_ms: u64,
    timing: EstimatorTiming,
}

impl GasBaselineEstimator {
    pub fn new(process_start_ms: u64) -> Self {
        Self::with_timing(process_start_ms, EstimatorTiming::default())
    }

    pub fn with_timing(process_start_ms: u64, timing: EstimatorTiming) -> Self {
        Self {
            baseline_kohm: None,
            window_min_kohm: None,
            window_started_at_ms: process_start_ms,
            process_start_ms,
            timing,
        }
    }

    /// Feed one sample observed at `now_ms`.
    ///
    /// Timestamps are expected to be non-decreasing. An earlier `now_ms` counts as
    /// zero elapsed time, which can delay a window reset but never panics.
    pub fn ingest(&mut self, sample: GasSample, now_ms: u64) -> IngestEvent {
        let resistance = sample.resistance_kohm;

        if self.baseline_kohm.is_none() {
            let uptime = now_ms.saturating_sub(self.process_start_ms);
            if uptime <= self.timing.baseline_delay_ms {
                return IngestEvent::Warming;
            }
            // No outlier rejection: whatever arrives first is locked in.
            self.baseline_kohm = Some(resistance);
            self.window_min_kohm = Some(resistance);
            self.window_started_at_ms = now_ms;
            return IngestEvent::BaselineCaptured;
        }

        let window_age = now_ms.saturating_sub(self.window_started_at_ms);
        if window_age > self.timing.window_update_interval_ms {
            self.window_min_kohm = Some(resistance);
            self.window_started_at_ms = now_ms;
            return IngestEvent::WindowReset;
        }

        match self.window_min_kohm {
            Some(min) if resistance < min => self.window_min_kohm = Some(resistance),
            None => self.window_min_kohm = Some(resistance),
            _ => {}
        }
        IngestEvent::Tracking
    }

    /// Percentage drop of `resistance_kohm` below the baseline, never negative.
    /// `None` until a usable baseline exists or when the reading is not finite.
    pub fn compute_index(&self, resistance_kohm: f64) -> Option<f64> {
        let baseline = self.baseline_kohm?;
        if !baseline.is_finite() || baseline <= 0.0 || !resistance_kohm.is_finite() {
            return None;
        }

        let delta = baseline - resistance_kohm;
        Some(((delta / baseline) * 100.0).max(0.0))
    }

    pub fn classify(&self, index: Option<f64>) -> VocCategory {
        VocCategory::classify(index)
    }

    /// Forget everything and restart the warm-up clock at `now_ms`
    pub fn reset(&mut self, now_ms: u64) {
        *self = Self::with_timing(now_ms, self.timing);
    }

    pub fn baseline_established(&self) -> bool {
        self.baseline_kohm.is_some()
    }

    pub fn baseline_kohm(&self) -> Option<f64> {
        self.baseline_kohm
    }

    pub fn window_min_kohm(&self) -> Option<f64> {
        self.window_min_kohm
    }

    pub fn window_started_at_ms(&self) -> u64 {
        self.window_started_at_ms
    }

    pub fn process_start_ms(&self) -> u64 {
        self.process_start_ms
    }

    pub fn timing(&self) -> EstimatorTiming {
        self.timing
    }

    pub fn snapshot(&self) -> EstimatorSnapshot {
        EstimatorSnapshot {
            baseline_established: self.baseline_established(),
            baseline_kohm: self.baseline_kohm,
            window_min_kohm: self.window_min_kohm,
            window_started_at_ms: self.window_started_at_ms,
            process_start_ms: self.process_start_ms,
        }
    }
}
