use serde::{Deserialize, Serialize};

use crate::air_quality::{select_indicator, AirQualityIndicator};
use crate::config::MonitorConfig;
use crate::error::MonitorResult;
use crate::sensors::FusionSource;
use crate::state_store::StateStore;
use crate::types::{EnvReading, IaqAccuracy};
use crate::voc_estimator::{
    EstimatorSnapshot, GasBaselineEstimator, GasSample, IngestEvent, VocCategory,
};

/// Everything produced by one published monitor cycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub reading: EnvReading,
    pub fallback_index: Option<f64>,
    pub category: VocCategory,
    pub estimator: EstimatorSnapshot,
    pub indicator: AirQualityIndicator,
    pub state_saved: bool,
}

/// The polling loop around the fusion source and the fallback estimator.
///
/// `poll` is meant to be called at high frequency. A report is published at most
/// once per `update_interval_ms` unless a refresh was forced.
pub struct AirMonitor<S: FusionSource> {
    source: S,
    config: MonitorConfig,
    store: Option<StateStore>,
    estimator: GasBaselineEstimator,
    last_publish_ms: Option<u64>,
    last_state_save_ms: Option<u64>,
    refresh_requested: bool,
    warned_no_data: bool,
    cycles: u64,
}

impl<S: FusionSource> AirMonitor<S> {
    pub fn new(source: S, config: MonitorConfig, store: Option<StateStore>, now_ms: u64) -> Self {
        let estimator = GasBaselineEstimator::with_timing(now_ms, config.estimator_timing());
        let mut monitor = Self {
            source,
            config,
            store,
            estimator,
            last_publish_ms: None,
            last_state_save_ms: None,
            refresh_requested: false,
            warned_no_data: false,
            cycles: 0,
        };
        monitor.load_state();
        monitor
    }

    fn load_state(&mut self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        match store.load(&self.config.state_key) {
            Ok(Some(blob)) => {
                if self.source.set_state(&blob) {
                    log::info!("Loaded fusion state ({} bytes)", blob.len());
                } else {
                    log::warn!("Fusion library rejected stored state ({} bytes)", blob.len());
                }
            }
            Ok(None) => log::debug!("No stored fusion state"),
            Err(e) => log::warn!("Failed to load fusion state: {}", e),
        }
    }

    fn maybe_save_state(&mut self, reading: &EnvReading, now_ms: u64) -> bool {
        if reading.iaq_accuracy != IaqAccuracy::High {
            return false;
        }
        let due = self
            .last_state_save_ms
            .map(|last| now_ms.saturating_sub(last) >= self.config.state_save_interval_ms)
            .unwrap_or(true);
        if !due {
            return false;
        }
        let Some(store) = self.store.as_ref() else {
            return false;
        };

        self.last_state_save_ms = Some(now_ms);
        let Some(blob) = self.source.get_state() else {
            return false;
        };
        match store.save(&self.config.state_key, &blob) {
            Ok(()) => {
                log::info!("Saved fusion state ({} bytes)", blob.len());
                true
            }
            Err(e) => {
                log::warn!("Failed to save fusion state: {}", e);
                false
            }
        }
    }

    /// Run the fusion source once and publish a report if one is due
    pub fn poll(&mut self, now_ms: u64) -> MonitorResult<Option<CycleReport>> {
        let output = match self.source.run(now_ms)? {
            Some(output) => output,
            None => {
                if !self.warned_no_data {
                    let status = self.source.status();
                    log::warn!(
                        "No fusion output yet (fusion status={}, sensor status={}), waiting",
                        status.fusion_code,
                        status.sensor_code
                    );
                    self.warned_no_data = true;
                }
                return Ok(None);
            }
        };

        let due = self.refresh_requested
            || self
                .last_publish_ms
                .map(|last| now_ms.saturating_sub(last) >= self.config.update_interval_ms)
                .unwrap_or(true);
        if !due {
            return Ok(None);
        }
        self.refresh_requested = false;
        self.last_publish_ms = Some(now_ms);

        let read_ms = now_ms.saturating_sub(output.timestamp_ms);
        let reading =
            EnvReading::from_fusion(&output, self.config.sea_level_pressure_hpa, read_ms);

        let sample = GasSample::new(reading.gas_kohm, reading.timestamp_ms);
        match self.estimator.ingest(sample, now_ms) {
            IngestEvent::BaselineCaptured => {
                log::info!("Gas baseline established: {:.2} kOhm", reading.gas_kohm)
            }
            IngestEvent::WindowReset => {
                log::debug!("Gas window reset at {:.2} kOhm", reading.gas_kohm)
            }
            IngestEvent::Warming | IngestEvent::Tracking => {}
        }

        let fallback_index = self.estimator.compute_index(reading.gas_kohm);
        let category = self.estimator.classify(fallback_index);
        let indicator =
            select_indicator(&reading, fallback_index, self.config.trusted_iaq_accuracy);
        let state_saved = self.maybe_save_state(&reading, now_ms);
        self.cycles += 1;

        Ok(Some(CycleReport {
            cycle: self.cycles,
            reading,
            fallback_index,
            category,
            estimator: self.estimator.snapshot(),
            indicator,
            state_saved,
        }))
    }

    /// Publish the next available output regardless of the update interval
    pub fn force_refresh(&mut self) {
        self.refresh_requested = true;
    }

    /// Re-run sensor initialization: reload state and restart the estimator warm-up
    pub fn reinitialize(&mut self, now_ms: u64) -> MonitorResult<()> {
        self.source.reinit()?;
        self.load_state();
        self.estimator.reset(now_ms);
        self.last_publish_ms = None;
        self.warned_no_data = false;
        log::info!("Sensor re-initialized at {} ms", now_ms);
        Ok(())
    }

    pub fn estimator(&self) -> &GasBaselineEstimator {
        &self.estimator
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
