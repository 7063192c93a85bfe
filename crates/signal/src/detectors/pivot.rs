use common::Signal;

use crate::context::DetectorContext;
use crate::SignalDetector;

/// Structural pivot reversal (fractal with a ZigZag-style deviation filter).
///
/// A bar is a confirmed low pivot when the `wing` bars on each side all have
/// strictly higher lows; symmetric for high pivots. A pivot cannot be
/// confirmed until its trailing wing exists, so the most recent `wing` bars
/// never produce a signal — each bar close examines exactly the one bar that
/// just became confirmable, keeping evaluation idempotent per prefix.
///
/// Shallow pivots are filtered out: the excursion from the pivot extreme to
/// the opposite extreme of the surrounding window must reach
/// `min_deviation_points` pips.
#[derive(Debug, Clone)]
pub struct PivotReversal {
    name: String,
    wing: usize,
    min_deviation_points: f64,
}

impl PivotReversal {
    pub fn new(name: impl Into<String>, wing: usize, min_deviation_points: f64) -> Self {
        Self { name: name.into(), wing, min_deviation_points }
    }

    fn is_low_pivot(&self, ctx: &DetectorContext, idx: usize) -> bool {
        let pivot_low = ctx.bars[idx].low;
        (idx - self.wing..=idx + self.wing)
            .filter(|&j| j != idx)
            .all(|j| ctx.bars[j].low > pivot_low)
    }

    fn is_high_pivot(&self, ctx: &DetectorContext, idx: usize) -> bool {
        let pivot_high = ctx.bars[idx].high;
        (idx - self.wing..=idx + self.wing)
            .filter(|&j| j != idx)
            .all(|j| ctx.bars[j].high < pivot_high)
    }

    fn deviation_ok(&self, ctx: &DetectorContext, idx: usize, low_pivot: bool) -> bool {
        let window = &ctx.bars[idx - self.wing..=idx + self.wing];
        let excursion = if low_pivot {
            let window_high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            window_high - ctx.bars[idx].low
        } else {
            let window_low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            ctx.bars[idx].high - window_low
        };
        excursion >= self.min_deviation_points * ctx.pip
    }
}

impl SignalDetector for PivotReversal {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&mut self, ctx: &DetectorContext) -> Option<Signal> {
        // The candidate is the bar whose trailing wing just completed.
        let idx = ctx.bars.len().checked_sub(1 + self.wing)?;
        if idx < self.wing {
            return None;
        }

        if self.is_low_pivot(ctx, idx) && self.deviation_ok(ctx, idx, true) {
            return Some(Signal::EnterLong);
        }
        if self.is_high_pivot(ctx, idx) && self.deviation_ok(ctx, idx, false) {
            return Some(Signal::EnterShort);
        }
        None
    }
}
