use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{MonitorError, MonitorResult};
use crate::types::{FusionOutput, PressureUnit};

/// Last status codes reported by the fusion library and the sensor driver
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionStatus {
    pub fusion_code: i32,
    pub sensor_code: i32,
}

/// Boundary to the vendor sensor-fusion library.
///
/// `run` is called far more often than outputs appear; the library decides
/// internally when a fresh output exists.
pub trait FusionSource {
    fn run(&mut self, now_ms: u64) -> MonitorResult<Option<FusionOutput>>;

    fn status(&self) -> FusionStatus;

    /// Opaque calibration blob, if the library has one to hand out
    fn get_state(&self) -> Option<Vec<u8>>;

    /// Returns false if the library rejected the blob
    fn set_state(&mut self, blob: &[u8]) -> bool;

    fn reinit(&mut self) -> MonitorResult<()>;
}

/// Window of reduced gas resistance in simulated air
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContaminationEvent {
    pub start_ms: u64,
    pub duration_ms: u64,
    /// Fraction of clean-air resistance lost while active (0..1)
    pub drop_fraction: f64,
}

impl ContaminationEvent {
    fn active_at(&self, t: u64) -> bool {
        t >= self.start_ms && t < self.start_ms.saturating_add(self.duration_ms)
    }
}

// Accuracy ramp of the simulated library, in outputs since (re)start
const ACCURACY_STEPS: [u64; 3] = [60, 180, 360];
const STATE_BLOB_LEN: usize = 9;

/// Deterministic stand-in for a BME688 behind the fusion library
pub struct SimulatedSource {
    period_ms: u64,
    next_output_ms: Option<u64>,
    clean_air_ohm: f64,
    events: Vec<ContaminationEvent>,
    outputs: u64,
    restored_level: u8,
    status: FusionStatus,
}

impl SimulatedSource {
    pub fn new(period_ms: u64, clean_air_ohm: f64) -> Self {
        Self {
            period_ms: period_ms.max(1),
            next_output_ms: None,
            clean_air_ohm,
            events: Vec::new(),
            outputs: 0,
            restored_level: 0,
            status: FusionStatus::default(),
        }
    }

    pub fn with_event(mut self, event: ContaminationEvent) -> Self {
        self.events.push(event);
        self
    }

    fn accuracy_level(&self) -> u8 {
        let ramp = ACCURACY_STEPS
            .iter()
            .filter(|&&step| self.outputs >= step)
            .count() as u8;
        ramp.max(self.restored_level)
    }

    fn gas_ohm_at(&self, t: u64) -> f64 {
        let drop = self
            .events
            .iter()
            .filter(|e| e.active_at(t))
            .map(|e| e.drop_fraction.clamp(0.0, 1.0))
            .fold(0.0_f64, f64::max);
        // Slow +-2% drift so the window minimum has something to track
        let drift = 1.0 + 0.02 * (t as f64 / 600_000.0 * std::f64::consts::TAU).sin();
        self.clean_air_ohm * drift * (1.0 - drop)
    }

    fn make_output(&self, t: u64) -> FusionOutput {
        let gas = self.gas_ohm_at(t);
        let pollution = (1.0 - gas / self.clean_air_ohm).max(0.0);
        let phase = t as f64 / 3_600_000.0 * std::f64::consts::TAU;

        FusionOutput {
            timestamp_ms: t,
            raw_temperature_c: 22.0 + 0.5 * phase.sin(),
            raw_humidity_pct: 45.0 - 2.0 * phase.sin(),
            raw_pressure: 101_325.0 + 50.0 * phase.cos(),
            pressure_unit: PressureUnit::Pascal,
            raw_gas_ohm: gas,
            iaq: 25.0 + 400.0 * pollution,
            iaq_accuracy: self.accuracy_level(),
            co2_eq_ppm: 500.0 + 2_000.0 * pollution,
            breath_voc_eq_ppm: 0.5 + 10.0 * pollution,
        }
    }
}

impl FusionSource for SimulatedSource {
    fn run(&mut self, now_ms: u64) -> MonitorResult<Option<FusionOutput>> {
        let due = *self.next_output_ms.get_or_insert(now_ms);
        if now_ms < due {
            return Ok(None);
        }

        let output = self.make_output(now_ms);
        self.outputs += 1;
        self.next_output_ms = Some(due + self.period_ms * ((now_ms - due) / self.period_ms + 1));
        Ok(Some(output))
    }

    fn status(&self) -> FusionStatus {
        self.status
    }

    fn get_state(&self) -> Option<Vec<u8>> {
        if self.outputs == 0 {
            return None;
        }
        let mut blob = Vec::with_capacity(STATE_BLOB_LEN);
        blob.push(self.accuracy_level());
        blob.extend_from_slice(&self.clean_air_ohm.to_le_bytes());
        Some(blob)
    }

    fn set_state(&mut self, blob: &[u8]) -> bool {
        if blob.len() != STATE_BLOB_LEN || blob[0] > 3 {
            return false;
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&blob[1..]);
        let clean_air = f64::from_le_bytes(raw);
        if !(clean_air.is_finite() && clean_air > 0.0) {
            return false;
        }
        self.restored_level = blob[0];
        self.clean_air_ohm = clean_air;
        true
    }

    fn reinit(&mut self) -> MonitorResult<()> {
        self.next_output_ms = None;
        self.outputs = 0;
        self.restored_level = 0;
        Ok(())
    }
}

/// Recorded fusion outputs, as written by the live binary
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FusionLog {
    pub records: Vec<FusionOutput>,
}

pub fn load_log(path: &Path) -> MonitorResult<FusionLog> {
    let file = File::open(path)
        .map_err(|e| MonitorError::Source(format!("{}: {}", path.display(), e)))?;
    let parsed = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        serde_json::from_reader(BufReader::new(GzDecoder::new(file)))
    } else {
        serde_json::from_reader(BufReader::new(file))
    };
    parsed.map_err(|e| MonitorError::Source(format!("{}: {}", path.display(), e)))
}

pub fn save_log(path: &Path, log: &FusionLog) -> MonitorResult<()> {
    let file = File::create(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let mut gz = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut gz, log)?;
        gz.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, log)?;
        writer.flush()?;
    }
    Ok(())
}

/// Tees every output of the wrapped source into a `FusionLog`
pub struct RecordingSource<S> {
    inner: S,
    log: FusionLog,
}

impl<S: FusionSource> RecordingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            log: FusionLog::default(),
        }
    }

    pub fn log(&self) -> &FusionLog {
        &self.log
    }
}

impl<S: FusionSource> FusionSource for RecordingSource<S> {
    fn run(&mut self, now_ms: u64) -> MonitorResult<Option<FusionOutput>> {
        let output = self.inner.run(now_ms)?;
        if let Some(o) = output.as_ref() {
            self.log.records.push(o.clone());
        }
        Ok(output)
    }

    fn status(&self) -> FusionStatus {
        self.inner.status()
    }

    fn get_state(&self) -> Option<Vec<u8>> {
        self.inner.get_state()
    }

    fn set_state(&mut self, blob: &[u8]) -> bool {
        self.inner.set_state(blob)
    }

    fn reinit(&mut self) -> MonitorResult<()> {
        self.inner.reinit()
    }
}

/// Plays a recorded log back in timestamp order
pub struct ReplaySource {
    pending: VecDeque<FusionOutput>,
    emitted: usize,
}

impl ReplaySource {
    pub fn new(mut log: FusionLog) -> Self {
        log.records.sort_by_key(|r| r.timestamp_ms);
        Self {
            pending: log.records.into(),
            emitted: 0,
        }
    }

    pub fn from_path(path: &Path) -> MonitorResult<Self> {
        Ok(Self::new(load_log(path)?))
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_timestamp(&self) -> Option<u64> {
        self.pending.front().map(|r| r.timestamp_ms)
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

impl FusionSource for ReplaySource {
    fn run(&mut self, now_ms: u64) -> MonitorResult<Option<FusionOutput>> {
        match self.pending.front() {
            Some(r) if r.timestamp_ms <= now_ms => {
                self.emitted += 1;
                Ok(self.pending.pop_front())
            }
            _ => Ok(None),
        }
    }

    fn status(&self) -> FusionStatus {
        FusionStatus::default()
    }

    fn get_state(&self) -> Option<Vec<u8>> {
        None
    }

    fn set_state(&mut self, _blob: &[u8]) -> bool {
        false
    }

    fn reinit(&mut self) -> MonitorResult<()> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_output(timestamp_ms: u64, gas_ohm: f64, iaq_accuracy: u8) -> FusionOutput {
    FusionOutput {
        timestamp_ms,
        raw_temperature_c: 21.0,
        raw_humidity_pct: 40.0,
        raw_pressure: 1013.25,
        pressure_unit: PressureUnit::Hectopascal,
        raw_gas_ohm: gas_ohm,
        iaq: 50.0,
        iaq_accuracy,
        co2_eq_ppm: 600.0,
        breath_voc_eq_ppm: 0.7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_cadence() {
        let mut source = SimulatedSource::new(3_000, 50_000.0);
        assert!(source.run(0).unwrap().is_some());
        assert!(source.run(1_000).unwrap().is_none());
        assert!(source.run(2_999).unwrap().is_none());
        assert!(source.run(3_000).unwrap().is_some());
        // A long gap yields one output, not a burst
        assert!(source.run(20_000).unwrap().is_some());
        assert!(source.run(20_500).unwrap().is_none());
        assert!(source.run(21_000).unwrap().is_some());
    }

    #[test]
    fn test_simulated_contamination_lowers_resistance() {
        let mut source = SimulatedSource::new(1_000, 50_000.0).with_event(ContaminationEvent {
            start_ms: 10_000,
            duration_ms: 5_000,
            drop_fraction: 0.4,
        });
        let clean = source.run(5_000).unwrap().unwrap();
        let dirty = source.run(12_000).unwrap().unwrap();
        let after = source.run(16_000).unwrap().unwrap();

        assert!(dirty.raw_gas_ohm < clean.raw_gas_ohm * 0.7);
        assert!(after.raw_gas_ohm > clean.raw_gas_ohm * 0.9);
        assert!(dirty.iaq > clean.iaq);
    }

    #[test]
    fn test_simulated_accuracy_ramp_and_state() {
        let mut source = SimulatedSource::new(1, 50_000.0);
        assert!(source.get_state().is_none());
        let mut last = None;
        for t in 0..400 {
            last = source.run(t).unwrap();
        }
        assert_eq!(last.unwrap().iaq_accuracy, 3);

        let blob = source.get_state().unwrap();
        let mut fresh = SimulatedSource::new(1, 1.0);
        assert!(fresh.set_state(&blob));
        assert_eq!(fresh.run(0).unwrap().unwrap().iaq_accuracy, 3);
        assert!(!fresh.set_state(&[1, 2, 3]));

        fresh.reinit().unwrap();
        assert_eq!(fresh.run(0).unwrap().unwrap().iaq_accuracy, 0);
    }

    #[test]
    fn test_replay_order_and_timing() {
        let log = FusionLog {
            records: vec![test_output(2_000, 1.0, 0), test_output(1_000, 2.0, 0)],
        };
        let mut source = ReplaySource::new(log);
        assert_eq!(source.next_timestamp(), Some(1_000));
        assert!(source.run(500).unwrap().is_none());
        assert_eq!(source.run(1_500).unwrap().unwrap().timestamp_ms, 1_000);
        assert!(source.run(1_500).unwrap().is_none());
        assert_eq!(source.run(5_000).unwrap().unwrap().timestamp_ms, 2_000);
        assert!(source.is_exhausted());
        assert_eq!(source.emitted(), 2);
    }

    #[test]
    fn test_warming_up_signals_survive_reload() {
        let dir = crate::state_store::scratch_dir("replay_nan");
        std::fs::create_dir_all(&dir).unwrap();

        let mut warming = test_output(1_000, f64::NAN, 0);
        warming.iaq = f64::NAN;
        let log = FusionLog {
            records: vec![warming, test_output(2_000, 40_000.0, 1)],
        };

        for name in ["session_warmup.json", "session_warmup.json.gz"] {
            let path = dir.join(name);
            save_log(&path, &log).unwrap();
            let loaded = load_log(&path).unwrap();
            assert_eq!(loaded.records.len(), 2);
            assert!(loaded.records[0].iaq.is_nan());
            assert!(loaded.records[0].raw_gas_ohm.is_nan());
            assert_eq!(loaded.records[0].raw_temperature_c, 21.0);
            assert_eq!(loaded.records[1].raw_gas_ohm, 40_000.0);
            assert_eq!(loaded.records[1].iaq, 50.0);
        }

        let text = std::fs::read_to_string(dir.join("session_warmup.json")).unwrap();
        assert!(text.contains("\"iaq\": null"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_record_and_reload() {
        let dir = crate::state_store::scratch_dir("replay_gz");
        std::fs::create_dir_all(&dir).unwrap();

        let mut recorder = RecordingSource::new(SimulatedSource::new(1_000, 40_000.0));
        for t in (0..5_000).step_by(250) {
            recorder.run(t).unwrap();
        }
        assert_eq!(recorder.log().records.len(), 5);

        for name in ["session.json", "session.json.gz"] {
            let path = dir.join(name);
            save_log(&path, recorder.log()).unwrap();
            let loaded = load_log(&path).unwrap();
            assert_eq!(loaded.records.len(), 5);
            for (a, b) in loaded.records.iter().zip(recorder.log().records.iter()) {
                assert_eq!(a.timestamp_ms, b.timestamp_ms);
                assert_eq!(a.iaq_accuracy, b.iaq_accuracy);
                assert!((a.raw_gas_ohm - b.raw_gas_ohm).abs() < 1e-6);
            }
        }

        // Hand-compressed input is read the same way
        let path = dir.join("manual.json.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(serde_json::to_string(recorder.log()).unwrap().as_bytes())
            .unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();
        assert_eq!(load_log(&path).unwrap().records.len(), 5);

        assert!(load_log(&dir.join("missing.json")).is_err());

        let _ = std::fs::remove_dir_all(dir);
    }
}
