pub mod units;

pub use units::*;

use serde::{Deserialize, Serialize};

/// Vendor signals use NaN for "no value yet". JSON has no NaN, so it is written
/// as `null` and read back as NaN.
pub mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// Calibration confidence reported alongside the fused IAQ
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IaqAccuracy {
    #[default]
    Unreliable,
    Low,
    Medium,
    High,
}

impl IaqAccuracy {
    /// Raw vendor level; anything above 3 saturates to High
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => IaqAccuracy::Unreliable,
            1 => IaqAccuracy::Low,
            2 => IaqAccuracy::Medium,
            _ => IaqAccuracy::High,
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            IaqAccuracy::Unreliable => 0,
            IaqAccuracy::Low => 1,
            IaqAccuracy::Medium => 2,
            IaqAccuracy::High => 3,
        }
    }
}

/// One fresh output of the vendor fusion library, in the units it reports
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusionOutput {
    pub timestamp_ms: u64,
    #[serde(with = "nan_as_null")]
    pub raw_temperature_c: f64,
    #[serde(with = "nan_as_null")]
    pub raw_humidity_pct: f64,
    #[serde(with = "nan_as_null")]
    pub raw_pressure: f64,
    #[serde(default)]
    pub pressure_unit: PressureUnit,
    #[serde(with = "nan_as_null")]
    pub raw_gas_ohm: f64,
    #[serde(with = "nan_as_null")]
    pub iaq: f64,
    pub iaq_accuracy: u8,
    #[serde(with = "nan_as_null")]
    pub co2_eq_ppm: f64,
    #[serde(with = "nan_as_null")]
    pub breath_voc_eq_ppm: f64,
}

/// Derived values published once per monitor cycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvReading {
    pub timestamp_ms: u64,
    #[serde(with = "nan_as_null")]
    pub temperature_c: f64,
    #[serde(with = "nan_as_null")]
    pub humidity_pct: f64,
    #[serde(with = "nan_as_null")]
    pub pressure_hpa: f64,
    #[serde(with = "nan_as_null")]
    pub gas_kohm: f64,
    #[serde(with = "nan_as_null")]
    pub altitude_m: f64,
    #[serde(with = "nan_as_null")]
    pub iaq: f64,
    pub iaq_accuracy: IaqAccuracy,
    #[serde(with = "nan_as_null")]
    pub co2_eq_ppm: f64,
    #[serde(with = "nan_as_null")]
    pub voc_eq_ppm: f64,
    pub read_ms: u64,
}

impl EnvReading {
    pub fn from_fusion(output: &FusionOutput, sea_level_hpa: f64, read_ms: u64) -> Self {
        let pressure_hpa = to_hpa(output.raw_pressure, output.pressure_unit);
        Self {
            timestamp_ms: output.timestamp_ms,
            temperature_c: output.raw_temperature_c,
            humidity_pct: output.raw_humidity_pct,
            pressure_hpa,
            gas_kohm: ohm_to_kohm(output.raw_gas_ohm),
            altitude_m: altitude_m(pressure_hpa, sea_level_hpa),
            iaq: output.iaq,
            iaq_accuracy: IaqAccuracy::from_level(output.iaq_accuracy),
            co2_eq_ppm: output.co2_eq_ppm,
            voc_eq_ppm: output.breath_voc_eq_ppm,
            read_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_accuracy_levels() {
        assert_eq!(IaqAccuracy::from_level(0), IaqAccuracy::Unreliable);
        assert_eq!(IaqAccuracy::from_level(2), IaqAccuracy::Medium);
        assert_eq!(IaqAccuracy::from_level(7), IaqAccuracy::High);
        assert!(IaqAccuracy::Low < IaqAccuracy::High);
        assert_eq!(IaqAccuracy::High.level(), 3);
    }

    #[test]
    fn test_reading_from_fusion() {
        let output = FusionOutput {
            timestamp_ms: 10_000,
            raw_temperature_c: 22.5,
            raw_humidity_pct: 41.0,
            raw_pressure: 101_325.0,
            pressure_unit: PressureUnit::Pascal,
            raw_gas_ohm: 52_000.0,
            iaq: 48.0,
            iaq_accuracy: 1,
            co2_eq_ppm: 600.0,
            breath_voc_eq_ppm: 0.6,
        };

        let reading = EnvReading::from_fusion(&output, STANDARD_SEA_LEVEL_HPA, 3);
        assert_relative_eq!(reading.pressure_hpa, 1013.25);
        assert_relative_eq!(reading.gas_kohm, 52.0);
        assert_relative_eq!(reading.altitude_m, 0.0, epsilon = 1e-9);
        assert_eq!(reading.iaq_accuracy, IaqAccuracy::Low);
        assert_eq!(reading.read_ms, 3);
    }
}
