use tracing::debug;

use common::{Direction, Signal};

use crate::context::DetectorContext;
use crate::SignalDetector;

/// Hysteresis latch around any detector: never emits two consecutive
/// identical directional entry signals without an intervening opposite or
/// exit signal, so a held threshold cannot re-trigger every bar.
///
/// The latch is the only mutable state a detector carries; it is cleared by
/// `reset` when the controller closes the position.
pub struct Hysteresis {
    inner: Box<dyn SignalDetector>,
    last_entry: Option<Direction>,
}

impl Hysteresis {
    pub fn new(inner: Box<dyn SignalDetector>) -> Self {
        Self { inner, last_entry: None }
    }
}

impl SignalDetector for Hysteresis {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn evaluate(&mut self, ctx: &DetectorContext) -> Option<Signal> {
        let signal = self.inner.evaluate(ctx)?;
        match signal {
            Signal::EnterLong | Signal::EnterShort => {
                let direction = signal.direction();
                if self.last_entry == Some(direction) {
                    debug!(name = self.inner.name(), ?signal, "suppressed repeated entry signal");
                    return None;
                }
                self.last_entry = Some(direction);
                Some(signal)
            }
            Signal::ExitLong | Signal::ExitShort => {
                self.last_entry = None;
                Some(signal)
            }
        }
    }

    fn reset(&mut self) {
        self.last_entry = None;
        self.inner.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HigherTfCache;

    /// Scripted detector for exercising the latch.
    struct Scripted {
        signals: Vec<Option<Signal>>,
        cursor: usize,
    }

    impl SignalDetector for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn evaluate(&mut self, _ctx: &DetectorContext) -> Option<Signal> {
            let signal = self.signals.get(self.cursor).copied().flatten();
            self.cursor += 1;
            signal
        }
    }

    fn gate(signals: Vec<Option<Signal>>) -> Hysteresis {
        Hysteresis::new(Box::new(Scripted { signals, cursor: 0 }))
    }

    fn empty_ctx(cache: &HigherTfCache) -> DetectorContext<'_> {
        DetectorContext {
            bars: &[],
            indicators: &[],
            higher_tf: cache,
            now: chrono::Utc::now(),
            pip: 0.0001,
        }
    }

    #[test]
    fn repeated_entry_suppressed() {
        let cache = HigherTfCache::new();
        let ctx = empty_ctx(&cache);
        let mut gate = gate(vec![
            Some(Signal::EnterLong),
            Some(Signal::EnterLong),
            Some(Signal::EnterLong),
        ]);
        assert_eq!(gate.evaluate(&ctx), Some(Signal::EnterLong));
        assert_eq!(gate.evaluate(&ctx), None);
        assert_eq!(gate.evaluate(&ctx), None);
    }

    #[test]
    fn opposite_entry_passes_and_relatches() {
        let cache = HigherTfCache::new();
        let ctx = empty_ctx(&cache);
        let mut gate = gate(vec![
            Some(Signal::EnterLong),
            Some(Signal::EnterShort),
            Some(Signal::EnterShort),
        ]);
        assert_eq!(gate.evaluate(&ctx), Some(Signal::EnterLong));
        assert_eq!(gate.evaluate(&ctx), Some(Signal::EnterShort));
        assert_eq!(gate.evaluate(&ctx), None);
    }

    #[test]
    fn exit_clears_the_latch() {
        let cache = HigherTfCache::new();
        let ctx = empty_ctx(&cache);
        let mut gate = gate(vec![
            Some(Signal::EnterLong),
            Some(Signal::ExitLong),
            Some(Signal::EnterLong),
        ]);
        assert_eq!(gate.evaluate(&ctx), Some(Signal::EnterLong));
        assert_eq!(gate.evaluate(&ctx), Some(Signal::ExitLong));
        assert_eq!(gate.evaluate(&ctx), Some(Signal::EnterLong));
    }

    #[test]
    fn reset_clears_the_latch() {
        let cache = HigherTfCache::new();
        let ctx = empty_ctx(&cache);
        let mut gate = gate(vec![Some(Signal::EnterLong), Some(Signal::EnterLong)]);
        assert_eq!(gate.evaluate(&ctx), Some(Signal::EnterLong));
        gate.reset();
        assert_eq!(gate.evaluate(&ctx), Some(Signal::EnterLong));
    }
}
