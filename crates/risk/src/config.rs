use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User-configurable risk parameters for one strategy instance.
///
/// Distances are expressed in points (pips); conversion to absolute price
/// uses the instrument's pip size. A distance <= 0 disables that level —
/// absence means "feature disabled", never "zero distance".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Initial stop-loss distance in points. <= 0 disables the stop.
    pub stop_points: f64,
    /// Initial take-profit distance in points. <= 0 disables the take.
    pub take_points: f64,
    #[serde(default)]
    pub trailing: Option<TrailingConfig>,
    #[serde(default)]
    pub break_even: Option<BreakEvenConfig>,
    #[serde(default)]
    pub martingale: Option<MartingaleConfig>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_points: 50.0,
            take_points: 100.0,
            trailing: None,
            break_even: None,
            martingale: None,
        }
    }
}

/// Trailing stop: follows the most favorable price, tightening only, and
/// only by at least `min_step_points` at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailingConfig {
    pub distance_points: f64,
    pub min_step_points: f64,
}

/// Break-even arming: once profit reaches `trigger_points`, clamp the stop
/// to entry +/- `offset_points` exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakEvenConfig {
    pub trigger_points: f64,
    pub offset_points: f64,
}

/// How the adverse-excursion step grows as legs accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    /// Constant step between legs.
    Fixed,
    /// Step widens linearly with the current leg count.
    PerLeg,
}

/// Martingale/averaging cluster parameters. All legs share one take-profit
/// anchored at the last leg's price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MartingaleConfig {
    /// Base adverse excursion between legs, in points.
    pub step_points: f64,
    #[serde(default = "default_step_mode")]
    pub step_mode: StepMode,
    /// Each new leg is sized `last_leg_volume * volume_multiplier`.
    pub volume_multiplier: f64,
    /// Cumulative cluster volume never exceeds this.
    pub max_total_volume: f64,
    /// Cluster take = last leg price +/- `profit_factor * pip * leg_count`.
    pub profit_factor: f64,
    /// Hard cap on the number of legs.
    pub max_legs: usize,
}

fn default_step_mode() -> StepMode {
    StepMode::Fixed
}

/// Invalid configuration is a programmer/operator error surfaced at startup,
/// never a runtime condition to recover from.
#[derive(Debug, Error)]
pub enum RiskConfigError {
    #[error("trailing stop enabled but distance_points is {0} (must be > 0)")]
    TrailingDistanceNotPositive(f64),
    #[error("trailing stop enabled but min_step_points is {0} (must be > 0)")]
    TrailingStepNotPositive(f64),
    #[error("break-even trigger_points is {0} (must be > 0)")]
    BreakEvenTriggerNotPositive(f64),
    #[error("break-even offset_points ({offset}) must be less than trigger_points ({trigger})")]
    BreakEvenOffsetTooLarge { offset: f64, trigger: f64 },
    #[error("martingale step_points is {0} (must be > 0)")]
    MartingaleStepNotPositive(f64),
    #[error("martingale volume_multiplier is {0} (must be >= 1)")]
    MartingaleMultiplierBelowOne(f64),
    #[error("martingale max_total_volume is {0} (must be > 0)")]
    MartingaleMaxVolumeNotPositive(f64),
    #[error("martingale profit_factor is {0} (must be > 0)")]
    MartingaleProfitFactorNotPositive(f64),
    #[error("martingale max_legs is 0 (must be >= 1)")]
    MartingaleMaxLegsZero,
}

impl RiskConfig {
    /// Fail-fast validation, run before any engine task is spawned.
    pub fn validate(&self) -> Result<(), RiskConfigError> {
        if let Some(t) = &self.trailing {
            if t.distance_points <= 0.0 {
                return Err(RiskConfigError::TrailingDistanceNotPositive(t.distance_points));
            }
            if t.min_step_points <= 0.0 {
                return Err(RiskConfigError::TrailingStepNotPositive(t.min_step_points));
            }
        }
        if let Some(b) = &self.break_even {
            if b.trigger_points <= 0.0 {
                return Err(RiskConfigError::BreakEvenTriggerNotPositive(b.trigger_points));
            }
            if b.offset_points >= b.trigger_points {
                return Err(RiskConfigError::BreakEvenOffsetTooLarge {
                    offset: b.offset_points,
                    trigger: b.trigger_points,
                });
            }
        }
        if let Some(m) = &self.martingale {
            if m.step_points <= 0.0 {
                return Err(RiskConfigError::MartingaleStepNotPositive(m.step_points));
            }
            if m.volume_multiplier < 1.0 {
                return Err(RiskConfigError::MartingaleMultiplierBelowOne(m.volume_multiplier));
            }
            if m.max_total_volume <= 0.0 {
                return Err(RiskConfigError::MartingaleMaxVolumeNotPositive(m.max_total_volume));
            }
            if m.profit_factor <= 0.0 {
                return Err(RiskConfigError::MartingaleProfitFactorNotPositive(m.profit_factor));
            }
            if m.max_legs == 0 {
                return Err(RiskConfigError::MartingaleMaxLegsZero);
            }
        }
        Ok(())
    }
}
