//! BME688 air-quality monitor.
//!
//! Polls a sensor-fusion source, publishes derived environmental readings, and
//! runs a zero-calibration gas-baseline estimator as the air-quality fallback
//! while the fused IAQ is still calibrating.

pub mod air_quality;
pub mod config;
pub mod console;
pub mod error;
pub mod live_status;
pub mod monitor;
pub mod sensors;
pub mod state_store;
pub mod types;
pub mod voc_estimator;

pub use air_quality::{select_indicator, AirQualityIndicator};
pub use config::MonitorConfig;
pub use error::{MonitorError, MonitorResult};
pub use monitor::{AirMonitor, CycleReport};
pub use sensors::{FusionSource, ReplaySource, SimulatedSource};
pub use voc_estimator::{GasBaselineEstimator, GasSample, VocCategory};
