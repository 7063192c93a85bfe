use common::Signal;

use crate::context::DetectorContext;
use crate::SignalDetector;

/// Threshold crossover on a named indicator value.
///
/// `prev <= level && current > level` enters long (oscillator leaving the
/// oversold band, MACD histogram zero-cross); the symmetric downward cross
/// enters short. Optional exit levels close an open trade when the value
/// crosses back through the profit band.
#[derive(Debug, Clone)]
pub struct ThresholdCross {
    name: String,
    value: String,
    long_level: f64,
    short_level: f64,
    exit_long_level: Option<f64>,
    exit_short_level: Option<f64>,
    signal_bar: usize,
}

impl ThresholdCross {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        long_level: f64,
        short_level: f64,
        exit_long_level: Option<f64>,
        exit_short_level: Option<f64>,
        signal_bar: usize,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            long_level,
            short_level,
            exit_long_level,
            exit_short_level,
            signal_bar,
        }
    }

    fn crossed_up(prev: f64, cur: f64, level: f64) -> bool {
        prev <= level && cur > level
    }

    fn crossed_down(prev: f64, cur: f64, level: f64) -> bool {
        prev >= level && cur < level
    }
}

impl SignalDetector for ThresholdCross {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&mut self, ctx: &DetectorContext) -> Option<Signal> {
        let idx = ctx.decision_index(self.signal_bar)?;
        if idx == 0 {
            return None; // no previous bar to cross from
        }
        let cur_snap = ctx.indicators.get(idx)?;
        let prev_snap = ctx.indicators.get(idx - 1)?;
        if !cur_snap.formed || !prev_snap.formed {
            return None;
        }
        let cur = cur_snap.value(&self.value)?;
        let prev = prev_snap.value(&self.value)?;

        if let Some(level) = self.exit_long_level {
            if Self::crossed_up(prev, cur, level) {
                return Some(Signal::ExitLong);
            }
        }
        if let Some(level) = self.exit_short_level {
            if Self::crossed_down(prev, cur, level) {
                return Some(Signal::ExitShort);
            }
        }
        if Self::crossed_up(prev, cur, self.long_level) {
            return Some(Signal::EnterLong);
        }
        if Self::crossed_down(prev, cur, self.short_level) {
            return Some(Signal::EnterShort);
        }
        None
    }
}
