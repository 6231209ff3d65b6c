use serde::{Deserialize, Serialize};

/// Standard sea-level pressure used when no local reference is configured
pub const STANDARD_SEA_LEVEL_HPA: f64 = 1013.25;

/// Unit the fusion source reports pressure in. Declared by the source, never guessed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureUnit {
    #[default]
    Pascal,
    Hectopascal,
}

pub fn to_hpa(value: f64, unit: PressureUnit) -> f64 {
    match unit {
        PressureUnit::Pascal => value / 100.0,
        PressureUnit::Hectopascal => value,
    }
}

pub fn ohm_to_kohm(ohm: f64) -> f64 {
    ohm / 1000.0
}

/// International barometric formula: 44330 * (1 - (p / p0)^0.1903)
pub fn altitude_m(pressure_hpa: f64, sea_level_hpa: f64) -> f64 {
    44330.0 * (1.0 - (pressure_hpa / sea_level_hpa).powf(0.1903))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pressure_conversion() {
        assert_relative_eq!(to_hpa(101_325.0, PressureUnit::Pascal), 1013.25);
        assert_relative_eq!(to_hpa(1013.25, PressureUnit::Hectopascal), 1013.25);
    }

    #[test]
    fn test_gas_conversion() {
        assert_relative_eq!(ohm_to_kohm(45_600.0), 45.6);
    }

    #[test]
    fn test_altitude() {
        assert_relative_eq!(altitude_m(1013.25, STANDARD_SEA_LEVEL_HPA), 0.0);
        // ~111 m per 13 hPa near sea level
        let alt = altitude_m(1000.0, STANDARD_SEA_LEVEL_HPA);
        assert!(alt > 100.0 && alt < 120.0);
        assert!(altitude_m(f64::NAN, STANDARD_SEA_LEVEL_HPA).is_nan());
    }
}
