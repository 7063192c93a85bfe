use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{Signal, Timeframe};

use crate::context::DetectorContext;
use crate::SignalDetector;

/// Directional confirmation band on one higher timeframe.
///
/// A long entry is confirmed when the cached value is strictly below
/// `long_below` (e.g. stochastic %K under the oversold band); a short entry
/// when strictly above `short_above`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmBand {
    pub timeframe: Timeframe,
    pub value: String,
    pub long_below: f64,
    pub short_above: f64,
}

/// Multi-timeframe confirmation wrapper: passes the inner detector's entry
/// signal through only when every configured timeframe confirms the same
/// direction. Stale or missing higher-timeframe data suppresses the signal
/// rather than using a default. Exit signals pass through untouched.
pub struct MultiTimeframeConfirm {
    inner: Box<dyn SignalDetector>,
    bands: Vec<ConfirmBand>,
}

impl MultiTimeframeConfirm {
    pub fn new(inner: Box<dyn SignalDetector>, bands: Vec<ConfirmBand>) -> Self {
        Self { inner, bands }
    }

    fn confirms(&self, signal: Signal, ctx: &DetectorContext) -> bool {
        self.bands.iter().all(|band| {
            let Some(snapshot) = ctx.higher_tf.fresh(band.timeframe, ctx.now) else {
                debug!(
                    timeframe = %band.timeframe,
                    "higher-timeframe snapshot missing or stale, suppressing signal"
                );
                return false;
            };
            let Some(value) = snapshot.value(&band.value) else {
                return false;
            };
            match signal {
                Signal::EnterLong => value < band.long_below,
                Signal::EnterShort => value > band.short_above,
                _ => true,
            }
        })
    }
}

impl SignalDetector for MultiTimeframeConfirm {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn evaluate(&mut self, ctx: &DetectorContext) -> Option<Signal> {
        let signal = self.inner.evaluate(ctx)?;
        if !signal.is_entry() {
            return Some(signal);
        }
        if self.confirms(signal, ctx) {
            Some(signal)
        } else {
            None
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}
