use serde::{Deserialize, Serialize};

pub use crate::detectors::multi_tf::ConfirmBand;

/// Detector selection for one strategy, from the `[strategy.detector]`
/// table of the TOML config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectorConfig {
    /// Oscillator/histogram threshold crossover on a named indicator value.
    ThresholdCross {
        /// Name of the indicator value in the snapshot (e.g. "rsi").
        value: String,
        /// Upward cross through this level enters long.
        long_level: f64,
        /// Downward cross through this level enters short.
        short_level: f64,
        #[serde(default)]
        exit_long_level: Option<f64>,
        #[serde(default)]
        exit_short_level: Option<f64>,
        /// Evaluate at `now - signal_bar` instead of the live bar.
        #[serde(default)]
        signal_bar: usize,
        /// Higher-timeframe confirmation bands; empty means no confirmation.
        #[serde(default)]
        confirm: Vec<ConfirmBand>,
    },
    /// Fractal/ZigZag structural pivot reversal.
    PivotReversal {
        /// Bars required on each side of the pivot extreme.
        wing: usize,
        /// Minimum excursion in points for the pivot to count.
        min_deviation_points: f64,
        #[serde(default)]
        confirm: Vec<ConfirmBand>,
    },
}
