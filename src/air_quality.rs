use serde::{Deserialize, Serialize};

use crate::types::{EnvReading, IaqAccuracy};
use crate::voc_estimator::VocCategory;

/// Air-quality figure shown to the user for one cycle
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AirQualityIndicator {
    /// Vendor IAQ, trusted at this accuracy
    Fused { iaq: f64, accuracy: IaqAccuracy },
    /// Baseline estimator output while the vendor IAQ is still calibrating
    Fallback {
        index: Option<f64>,
        category: VocCategory,
    },
}

impl AirQualityIndicator {
    pub fn is_fallback(&self) -> bool {
        matches!(self, AirQualityIndicator::Fallback { .. })
    }

    /// Short one-line form used in the console and status output
    pub fn summary(&self) -> String {
        match self {
            AirQualityIndicator::Fused { iaq, accuracy } => {
                format!("IAQ {:.0} (accuracy {})", iaq, accuracy.level())
            }
            AirQualityIndicator::Fallback { index, category } => match index {
                Some(v) => format!("VOC fallback {:.1} ({})", v, category),
                None => format!("VOC fallback --.- ({})", category),
            },
        }
    }
}

/// Prefer the vendor IAQ once it reaches `trusted`, otherwise fall back.
pub fn select_indicator(
    reading: &EnvReading,
    fallback_index: Option<f64>,
    trusted: IaqAccuracy,
) -> AirQualityIndicator {
    if reading.iaq_accuracy >= trusted && reading.iaq.is_finite() {
        AirQualityIndicator::Fused {
            iaq: reading.iaq,
            accuracy: reading.iaq_accuracy,
        }
    } else {
        AirQualityIndicator::Fallback {
            index: fallback_index,
            category: VocCategory::classify(fallback_index),
        }
    }
}
