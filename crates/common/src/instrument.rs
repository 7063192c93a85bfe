use serde::{Deserialize, Serialize};
use tracing::warn;

/// Instrument metadata supplied by the external metadata provider.
/// Drives pip conversion and volume normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub pair: String,
    /// Minimal price increment.
    pub price_tick: f64,
    /// Minimal volume increment.
    pub volume_step: f64,
    pub min_volume: f64,
    pub max_volume: f64,
    /// Quote decimal places, used for pip sizing.
    pub decimal_places: u32,
}

impl InstrumentInfo {
    /// Pip size for risk-distance configuration: brokers quoting 3 or 5
    /// decimal places use `tick * 10`, everything else uses the tick itself.
    pub fn pip_size(&self) -> f64 {
        match self.decimal_places {
            3 | 5 => self.price_tick * 10.0,
            _ => self.price_tick,
        }
    }

    /// True when the tick size is usable for price arithmetic.
    pub fn has_valid_tick(&self) -> bool {
        self.price_tick > 0.0
    }

    /// Normalize a raw order volume: round down to the volume step, clamp to
    /// the maximum. Returns `None` when the result falls below the minimum or
    /// is non-positive — a filtered-out opportunity, not an error.
    pub fn normalize_volume(&self, raw: f64) -> Option<f64> {
        if raw <= 0.0 || !raw.is_finite() {
            return None;
        }
        if self.volume_step <= 0.0 {
            warn!(pair = %self.pair, step = self.volume_step, "invalid volume step, skipping normalization");
            return None;
        }
        let stepped = (raw / self.volume_step).floor() * self.volume_step;
        let clamped = stepped.min(self.max_volume);
        if clamped < self.min_volume || clamped <= 0.0 {
            return None;
        }
        Some(clamped)
    }

    /// Round a price to the nearest tick.
    pub fn round_price(&self, price: f64) -> f64 {
        if self.price_tick <= 0.0 {
            return price;
        }
        (price / self.price_tick).round() * self.price_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forex_5dp() -> InstrumentInfo {
        InstrumentInfo {
            pair: "EURUSD".into(),
            price_tick: 0.00001,
            volume_step: 0.01,
            min_volume: 0.01,
            max_volume: 100.0,
            decimal_places: 5,
        }
    }

    fn futures_2dp() -> InstrumentInfo {
        InstrumentInfo {
            pair: "ES".into(),
            price_tick: 0.25,
            volume_step: 1.0,
            min_volume: 1.0,
            max_volume: 500.0,
            decimal_places: 2,
        }
    }

    #[test]
    fn pip_is_ten_ticks_for_five_decimals() {
        let inst = forex_5dp();
        assert!((inst.pip_size() - 0.0001).abs() < 1e-12);
    }

    #[test]
    fn pip_is_one_tick_for_two_decimals() {
        let inst = futures_2dp();
        assert_eq!(inst.pip_size(), 0.25);
    }

    #[test]
    fn pip_is_ten_ticks_for_three_decimals() {
        let mut inst = futures_2dp();
        inst.price_tick = 0.001;
        inst.decimal_places = 3;
        assert!((inst.pip_size() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn volume_rounds_down_to_step() {
        let inst = forex_5dp();
        assert_eq!(inst.normalize_volume(0.119), Some(0.11));
    }

    #[test]
    fn volume_below_minimum_is_filtered() {
        let inst = forex_5dp();
        assert_eq!(inst.normalize_volume(0.004), None);
        assert_eq!(inst.normalize_volume(0.0), None);
        assert_eq!(inst.normalize_volume(-1.0), None);
    }

    #[test]
    fn volume_clamps_to_maximum() {
        let inst = forex_5dp();
        assert_eq!(inst.normalize_volume(250.0), Some(100.0));
    }

    #[test]
    fn price_rounds_to_tick() {
        let inst = futures_2dp();
        assert_eq!(inst.round_price(4500.10), 4500.0);
        assert_eq!(inst.round_price(4500.15), 4500.25);
    }
}
