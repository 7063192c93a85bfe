use thiserror::Error;
use tracing::info;

use crate::config::DetectorConfig;
use crate::detectors::{MultiTimeframeConfirm, PivotReversal, ThresholdCross};
use crate::hysteresis::Hysteresis;
use crate::SignalDetector;

/// Detector configuration problems are operator errors and abort startup.
#[derive(Debug, Error)]
pub enum DetectorBuildError {
    #[error("threshold_cross long_level ({long}) must be below short_level ({short})")]
    LevelsInverted { long: f64, short: f64 },
    #[error("threshold_cross value name must not be empty")]
    EmptyValueName,
    #[error("pivot_reversal wing is 0 (must be >= 1)")]
    WingZero,
    #[error("pivot_reversal min_deviation_points is {0} (must be >= 0)")]
    NegativeDeviation(f64),
    #[error("confirmation band value name must not be empty")]
    EmptyConfirmValue,
}

/// Build a detector from config, wrapping it in the multi-timeframe
/// confirmation layer when bands are configured and always in the
/// hysteresis latch.
pub fn build_detector(
    name: &str,
    config: &DetectorConfig,
) -> Result<Box<dyn SignalDetector>, DetectorBuildError> {
    let (core, confirm): (Box<dyn SignalDetector>, _) = match config {
        DetectorConfig::ThresholdCross {
            value,
            long_level,
            short_level,
            exit_long_level,
            exit_short_level,
            signal_bar,
            confirm,
        } => {
            if value.is_empty() {
                return Err(DetectorBuildError::EmptyValueName);
            }
            if long_level >= short_level {
                return Err(DetectorBuildError::LevelsInverted {
                    long: *long_level,
                    short: *short_level,
                });
            }
            let det = ThresholdCross::new(
                name,
                value.clone(),
                *long_level,
                *short_level,
                *exit_long_level,
                *exit_short_level,
                *signal_bar,
            );
            (Box::new(det), confirm)
        }
        DetectorConfig::PivotReversal { wing, min_deviation_points, confirm } => {
            if *wing == 0 {
                return Err(DetectorBuildError::WingZero);
            }
            if *min_deviation_points < 0.0 {
                return Err(DetectorBuildError::NegativeDeviation(*min_deviation_points));
            }
            let det = PivotReversal::new(name, *wing, *min_deviation_points);
            (Box::new(det), confirm)
        }
    };

    if confirm.iter().any(|band| band.value.is_empty()) {
        return Err(DetectorBuildError::EmptyConfirmValue);
    }

    let confirmed: Box<dyn SignalDetector> = if confirm.is_empty() {
        core
    } else {
        Box::new(MultiTimeframeConfirm::new(core, confirm.clone()))
    };

    info!(name, confirmations = confirm.len(), "detector built");
    Ok(Box::new(Hysteresis::new(confirmed)))
}
