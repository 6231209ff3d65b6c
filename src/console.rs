use chrono::Utc;

use crate::monitor::CycleReport;

pub fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

pub fn ts_now_clean() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn opt_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:6.2}", v),
        _ => "  --.-".to_string(),
    }
}

/// Serial-console block for one published cycle
pub fn format_report(report: &CycleReport) -> String {
    let r = &report.reading;
    let est = &report.estimator;
    let mut out = String::new();

    out.push_str("+--------------------------------------------+\n");
    out.push_str(&format!("| BME688 environment  cycle {:>6}          |\n", report.cycle));
    out.push_str("+--------------------------------------------+\n");
    out.push_str(&format!("| Temperature: {:7.2} C                     |\n", r.temperature_c));
    out.push_str(&format!("| Humidity:    {:7.2} %                     |\n", r.humidity_pct));
    out.push_str(&format!("| Pressure:    {:7.2} hPa                   |\n", r.pressure_hpa));
    out.push_str(&format!("| Gas:         {:7.2} kOhm                  |\n", r.gas_kohm));
    out.push_str(&format!("| Altitude:    {:7.2} m                     |\n", r.altitude_m));
    out.push_str(&format!(
        "| IAQ:         {:7.2} (accuracy {})          |\n",
        r.iaq,
        r.iaq_accuracy.level()
    ));
    out.push_str(&format!("| CO2eq:       {:7.2} ppm                   |\n", r.co2_eq_ppm));
    out.push_str(&format!("| VOCeq:       {:7.2} ppm                   |\n", r.voc_eq_ppm));
    out.push_str(&format!(
        "| VOC index:    {} ({})\n",
        opt_value(report.fallback_index),
        report.category
    ));
    out.push_str(&format!(
        "| Baseline:     {} kOhm  window min {} kOhm\n",
        opt_value(est.baseline_kohm),
        opt_value(est.window_min_kohm)
    ));
    out.push_str(&format!("| Showing:      {}\n", report.indicator.summary()));
    out.push_str(&format!("| Read time:    {:3} ms\n", r.read_ms));
    out.push_str("+--------------------------------------------+");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::air_quality::select_indicator;
    use crate::sensors::test_output;
    use crate::types::{EnvReading, IaqAccuracy};
    use crate::voc_estimator::{GasBaselineEstimator, GasSample, VocCategory};

    #[test]
    fn test_report_block() {
        let mut est = GasBaselineEstimator::new(0);
        est.ingest(GasSample::new(40.0, 130_000), 130_000);
        let reading = EnvReading::from_fusion(&test_output(140_000, 30_000.0, 1), 1013.25, 2);
        let index = est.compute_index(reading.gas_kohm);

        let report = CycleReport {
            cycle: 7,
            indicator: select_indicator(&reading, index, IaqAccuracy::High),
            reading,
            fallback_index: index,
            category: VocCategory::classify(index),
            estimator: est.snapshot(),
            state_saved: false,
        };

        let block = format_report(&report);
        assert!(block.contains("cycle      7"));
        assert!(block.contains(" 25.00 (poor)"));
        assert!(block.contains("Baseline:      40.00 kOhm"));
        assert!(block.contains("VOC fallback 25.0 (poor)"));
    }

    #[test]
    fn test_missing_values_render_as_dashes() {
        assert_eq!(opt_value(None), "  --.-");
        assert_eq!(opt_value(Some(f64::NAN)), "  --.-");
        assert_eq!(opt_value(Some(1.23456)), "  1.23");
    }
}
