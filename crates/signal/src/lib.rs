//! Signal Detector: converts bar + indicator history into discrete trade
//! signals, with no look-ahead. All detector implementations satisfy
//! `SignalDetector`; concrete variants are selected per strategy from the
//! TOML config via `build_detector`.

pub mod builder;
pub mod config;
pub mod context;
pub mod detectors;
pub mod hysteresis;

pub use builder::{build_detector, DetectorBuildError};
pub use config::{ConfirmBand, DetectorConfig};
pub use context::{DetectorContext, HigherTfCache};
pub use hysteresis::Hysteresis;

use common::Signal;

/// All detector implementations must satisfy this trait.
///
/// `evaluate` must be deterministic and idempotent for the same finite
/// prefix of history: no hidden lookahead, no state mutation beyond the
/// hysteresis latch. Returns `None` whenever any required indicator
/// snapshot reports `formed == false`.
pub trait SignalDetector: Send {
    /// Human-readable name of this detector, shown in logs.
    fn name(&self) -> &str;

    /// Evaluate the history visible at a primary-timeframe bar close.
    fn evaluate(&mut self, ctx: &DetectorContext) -> Option<Signal>;

    /// Clear any emission state. Called by the controller when the position
    /// closes, so a fresh trade can re-trigger the same condition.
    fn reset(&mut self) {}
}
