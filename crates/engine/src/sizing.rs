use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// How an entry order's raw volume is derived from account equity.
/// Selected per strategy from the `[strategy.sizing]` table; the result is
/// normalized against the instrument's volume constraints afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SizingPolicy {
    /// Always the same lot count, regardless of equity.
    FixedLot { lots: f64 },
    /// A fixed fraction of equity converted to volume at the current price.
    FixedFraction { fraction: f64 },
    /// `base_lots * sqrt(equity / divisor)`: grows with equity, but slower
    /// than linearly.
    EquityProportional { base_lots: f64, divisor: f64 },
    /// Size so the configured stop distance risks `percent`% of equity.
    /// Requires an enabled stop; sizes nothing without one.
    RiskPercent { percent: f64 },
}

#[derive(Debug, Error)]
pub enum SizingError {
    #[error("fixed_lot lots is {0} (must be > 0)")]
    NonPositiveLots(f64),
    #[error("fixed_fraction fraction is {0} (must be in (0, 1])")]
    FractionOutOfRange(f64),
    #[error("equity_proportional base_lots is {0} (must be > 0)")]
    NonPositiveBaseLots(f64),
    #[error("equity_proportional divisor is {0} (must be > 0)")]
    NonPositiveDivisor(f64),
    #[error("risk_percent percent is {0} (must be in (0, 100])")]
    PercentOutOfRange(f64),
}

impl SizingPolicy {
    pub fn validate(&self) -> Result<(), SizingError> {
        match *self {
            SizingPolicy::FixedLot { lots } if lots <= 0.0 => {
                Err(SizingError::NonPositiveLots(lots))
            }
            SizingPolicy::FixedFraction { fraction } if !(fraction > 0.0 && fraction <= 1.0) => {
                Err(SizingError::FractionOutOfRange(fraction))
            }
            SizingPolicy::EquityProportional { base_lots, .. } if base_lots <= 0.0 => {
                Err(SizingError::NonPositiveBaseLots(base_lots))
            }
            SizingPolicy::EquityProportional { divisor, .. } if divisor <= 0.0 => {
                Err(SizingError::NonPositiveDivisor(divisor))
            }
            SizingPolicy::RiskPercent { percent } if !(percent > 0.0 && percent <= 100.0) => {
                Err(SizingError::PercentOutOfRange(percent))
            }
            _ => Ok(()),
        }
    }

    /// Raw (un-normalized) entry volume. `stop_distance` is the configured
    /// stop distance in price units, when a stop is enabled. Returns `None`
    /// when the policy cannot produce a positive volume for these inputs.
    pub fn raw_volume(&self, equity: f64, price: f64, stop_distance: Option<f64>) -> Option<f64> {
        let raw = match *self {
            SizingPolicy::FixedLot { lots } => lots,
            SizingPolicy::FixedFraction { fraction } => {
                if price <= 0.0 {
                    return None;
                }
                equity * fraction / price
            }
            SizingPolicy::EquityProportional { base_lots, divisor } => {
                if equity <= 0.0 {
                    return None;
                }
                base_lots * (equity / divisor).sqrt()
            }
            SizingPolicy::RiskPercent { percent } => {
                let Some(distance) = stop_distance.filter(|d| *d > 0.0) else {
                    debug!("risk_percent sizing without an enabled stop, skipping entry");
                    return None;
                };
                equity * percent / 100.0 / distance
            }
        };
        (raw > 0.0 && raw.is_finite()).then_some(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_lot_ignores_equity() {
        let policy = SizingPolicy::FixedLot { lots: 0.1 };
        assert_eq!(policy.raw_volume(10_000.0, 1.1, None), Some(0.1));
        assert_eq!(policy.raw_volume(5.0, 1.1, None), Some(0.1));
    }

    #[test]
    fn fixed_fraction_scales_with_equity_and_price() {
        let policy = SizingPolicy::FixedFraction { fraction: 0.02 };
        let vol = policy.raw_volume(10_000.0, 2.0, None).unwrap();
        assert!((vol - 100.0).abs() < 1e-9);
        assert_eq!(policy.raw_volume(10_000.0, 0.0, None), None);
    }

    #[test]
    fn equity_proportional_is_square_root() {
        let policy = SizingPolicy::EquityProportional { base_lots: 0.1, divisor: 10_000.0 };
        let at_base = policy.raw_volume(10_000.0, 1.0, None).unwrap();
        assert!((at_base - 0.1).abs() < 1e-9);
        // Quadrupled equity only doubles the size.
        let at_4x = policy.raw_volume(40_000.0, 1.0, None).unwrap();
        assert!((at_4x - 0.2).abs() < 1e-9);
    }

    #[test]
    fn risk_percent_needs_a_stop() {
        let policy = SizingPolicy::RiskPercent { percent: 1.0 };
        assert_eq!(policy.raw_volume(10_000.0, 1.1, None), None);
        // 1% of 10k = 100 currency units at risk over a 0.0050 stop distance.
        let vol = policy.raw_volume(10_000.0, 1.1, Some(0.0050)).unwrap();
        assert!((vol - 20_000.0).abs() < 1e-6);
    }

    #[test]
    fn validation_rejects_degenerate_parameters() {
        assert!(SizingPolicy::FixedLot { lots: 0.0 }.validate().is_err());
        assert!(SizingPolicy::FixedFraction { fraction: 1.5 }.validate().is_err());
        assert!(SizingPolicy::EquityProportional { base_lots: 0.1, divisor: 0.0 }
            .validate()
            .is_err());
        assert!(SizingPolicy::RiskPercent { percent: 0.0 }.validate().is_err());
        assert!(SizingPolicy::FixedLot { lots: 0.1 }.validate().is_ok());
    }

    #[test]
    fn parses_from_toml() {
        let policy: SizingPolicy =
            toml::from_str("type = \"equity_proportional\"\nbase_lots = 0.1\ndivisor = 10000.0")
                .unwrap();
        assert!(matches!(policy, SizingPolicy::EquityProportional { .. }));
    }
}
