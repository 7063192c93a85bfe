use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::{Candle, Direction, InstrumentInfo};
use ledger::{Position, PositionLedger};

use crate::config::{RiskConfig, RiskConfigError, StepMode};

/// Protective levels for the current position, keyed by its direction.
/// One value object replaces per-direction mutable fields; the opposite
/// side never needs manual clearing on transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectiveLevels {
    pub stop: Option<f64>,
    pub take: Option<f64>,
    /// Most favorable price reached since entry (high for long, low for short).
    pub watermark: f64,
    pub break_even_armed: bool,
}

/// Why the Risk Manager demands a full-position exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    ClusterTake,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop-loss"),
            ExitReason::TakeProfit => write!(f, "take-profit"),
            ExitReason::ClusterTake => write!(f, "cluster take-profit"),
        }
    }
}

/// Decision produced by the per-bar risk check, consumed by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskAction {
    /// Close the whole position at market before any new-entry logic runs.
    ForcedExit { reason: ExitReason },
    /// Open another averaging leg of this (un-normalized) volume.
    AddLeg { volume: f64 },
}

/// Owns the protective levels of one instrument's position and decides when
/// a forced exit is due. Pure per-event evaluator: the strategy controller
/// drives it and is the only caller of the order gateway.
#[derive(Debug)]
pub struct RiskManager {
    config: RiskConfig,
    levels: Option<ProtectiveLevels>,
}

impl RiskManager {
    /// Construction validates the configuration and fails fast on operator
    /// error.
    pub fn new(config: RiskConfig) -> Result<Self, RiskConfigError> {
        config.validate()?;
        Ok(Self { config, levels: None })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn levels(&self) -> Option<&ProtectiveLevels> {
        self.levels.as_ref()
    }

    /// Compute initial levels on position open (or re-anchor after an
    /// averaging/flip fill — the explicit reset point of the monotonic stop).
    /// Skipped with a warning when the tick size is unusable; retried on the
    /// next fill or bar event.
    pub fn initialize(&mut self, position: &Position, instrument: &InstrumentInfo) {
        if position.is_flat() {
            self.levels = None;
            return;
        }
        if !instrument.has_valid_tick() {
            warn!(
                pair = %instrument.pair,
                tick = instrument.price_tick,
                "tick size unavailable, skipping risk level computation"
            );
            return;
        }

        let pip = instrument.pip_size();
        let sign = position.direction.sign();
        let entry = position.avg_entry_price;

        // Levels go out as order prices eventually, so snap them to the
        // instrument's tick grid.
        let stop = (self.config.stop_points > 0.0)
            .then(|| instrument.round_price(entry - sign * self.config.stop_points * pip));
        let take = (self.config.take_points > 0.0)
            .then(|| instrument.round_price(entry + sign * self.config.take_points * pip));

        // Arming state survives re-anchoring while the position is open.
        let was_armed = self.levels.as_ref().is_some_and(|l| l.break_even_armed);

        self.levels = Some(ProtectiveLevels {
            stop,
            take,
            watermark: entry,
            break_even_armed: was_armed,
        });
        info!(
            pair = %instrument.pair,
            direction = %position.direction,
            entry,
            stop = ?stop,
            take = ?take,
            "protective levels set"
        );
    }

    /// Clear all levels. Called when the position closes.
    pub fn reset(&mut self) {
        self.levels = None;
    }

    /// Per-bar risk evaluation, run before any new-entry logic.
    ///
    /// Exit checks use the levels as they stood at the bar's open (worst-case
    /// extreme-touch semantics); trailing/break-even tightening from this
    /// bar's extremes applies only to later bars, so an update never tests
    /// against the move that produced it.
    pub fn on_bar(
        &mut self,
        candle: &Candle,
        ledger: &PositionLedger,
        instrument: &InstrumentInfo,
    ) -> Vec<RiskAction> {
        let position = ledger.position();
        if position.is_flat() {
            return Vec::new();
        }
        if self.levels.is_none() {
            // Entry data not valid yet (e.g. tick size was missing at fill
            // time) — retry the initialization before doing anything else.
            self.initialize(position, instrument);
        }
        let Some(mut levels) = self.levels.clone() else {
            return Vec::new();
        };
        if !instrument.has_valid_tick() {
            warn!(pair = %instrument.pair, "tick size unavailable, skipping risk checks");
            return Vec::new();
        }

        let pip = instrument.pip_size();
        let direction = position.direction;

        if let Some(reason) = self.forced_exit(candle, position, ledger, &levels, pip) {
            info!(pair = %instrument.pair, %reason, "forced exit due");
            return vec![RiskAction::ForcedExit { reason }];
        }

        self.update_watermark(candle, direction, &mut levels);
        self.apply_trailing(direction, &mut levels, pip, instrument);
        self.apply_break_even(position, &mut levels, pip, instrument);
        self.levels = Some(levels);

        let mut actions = Vec::new();
        if let Some(volume) = self.martingale_leg(candle, ledger, pip) {
            actions.push(RiskAction::AddLeg { volume });
        }
        actions
    }

    /// Worst-case touch check: stop against the adverse extreme, take (and
    /// cluster take) against the favorable extreme.
    fn forced_exit(
        &self,
        candle: &Candle,
        position: &Position,
        ledger: &PositionLedger,
        levels: &ProtectiveLevels,
        pip: f64,
    ) -> Option<ExitReason> {
        let (adverse, favorable) = match position.direction {
            Direction::Long => (candle.low, candle.high),
            Direction::Short => (candle.high, candle.low),
            Direction::Flat => return None,
        };
        let sign = position.direction.sign();

        if let Some(stop) = levels.stop {
            // long: low <= stop, short: high >= stop
            if sign * (adverse - stop) <= 0.0 {
                return Some(ExitReason::StopLoss);
            }
        }
        if let Some(take) = levels.take {
            // long: high >= take, short: low <= take
            if sign * (favorable - take) >= 0.0 {
                return Some(ExitReason::TakeProfit);
            }
        }
        if let Some(m) = &self.config.martingale {
            if let Some(last) = ledger.last_leg() {
                let leg_count = ledger.legs().len() as f64;
                let cluster_take = last.price + sign * m.profit_factor * pip * leg_count;
                let touched = sign * (favorable - cluster_take) >= 0.0;
                // Guard: the whole cluster must be strictly profitable at the
                // trigger price, judged from the volume-weighted average. A
                // very recent disadvantageous leg can put the trigger below
                // water even though it is beyond the last leg's price.
                let pnl_at_take = position.unrealized_pnl(cluster_take);
                if touched && pnl_at_take > 0.0 {
                    return Some(ExitReason::ClusterTake);
                }
                if touched {
                    debug!(
                        cluster_take,
                        pnl_at_take, "cluster take touched but not profitable, holding"
                    );
                }
            }
        }
        None
    }

    fn update_watermark(&self, candle: &Candle, direction: Direction, levels: &mut ProtectiveLevels) {
        levels.watermark = match direction {
            Direction::Long => levels.watermark.max(candle.high),
            Direction::Short => levels.watermark.min(candle.low),
            Direction::Flat => levels.watermark,
        };
    }

    fn apply_trailing(
        &self,
        direction: Direction,
        levels: &mut ProtectiveLevels,
        pip: f64,
        instrument: &InstrumentInfo,
    ) {
        let Some(t) = &self.config.trailing else { return };
        let sign = direction.sign();
        let candidate = instrument.round_price(levels.watermark - sign * t.distance_points * pip);
        let min_step = t.min_step_points * pip;

        let improves = match levels.stop {
            // Replace only when strictly more favorable by at least the
            // minimum step; prevents order-churn on tiny moves.
            Some(stop) => sign * (candidate - stop) >= min_step,
            None => true,
        };
        if improves {
            debug!(pair = %instrument.pair, from = ?levels.stop, to = candidate, "trailing stop tightened");
            levels.stop = Some(candidate);
        }
    }

    fn apply_break_even(
        &self,
        position: &Position,
        levels: &mut ProtectiveLevels,
        pip: f64,
        instrument: &InstrumentInfo,
    ) {
        let Some(b) = &self.config.break_even else { return };
        if levels.break_even_armed {
            return;
        }
        let sign = position.direction.sign();
        // Direction-adjusted favorable excursion in price terms.
        let excursion = sign * (levels.watermark - position.avg_entry_price);
        if excursion < b.trigger_points * pip {
            return;
        }
        let candidate =
            instrument.round_price(position.avg_entry_price + sign * b.offset_points * pip);
        // Arm exactly once; clamp only ever tightens the stop.
        if levels.stop.map_or(true, |stop| sign * (candidate - stop) > 0.0) {
            levels.stop = Some(candidate);
        }
        levels.break_even_armed = true;
        info!(pair = %instrument.pair, stop = ?levels.stop, "break-even armed");
    }

    /// Adverse excursion beyond the configured step from the last leg opens
    /// another leg, multiplier-sized, capped by max volume and leg count.
    fn martingale_leg(&self, candle: &Candle, ledger: &PositionLedger, pip: f64) -> Option<f64> {
        let m = self.config.martingale.as_ref()?;
        let position = ledger.position();
        let last = ledger.last_leg()?;
        let leg_count = ledger.legs().len();
        if leg_count >= m.max_legs {
            return None;
        }

        let step = match m.step_mode {
            StepMode::Fixed => m.step_points * pip,
            StepMode::PerLeg => m.step_points * pip * leg_count as f64,
        };
        let sign = position.direction.sign();
        let adverse = match position.direction {
            Direction::Long => candle.low,
            Direction::Short => candle.high,
            Direction::Flat => return None,
        };
        // long: last.price - low >= step, short: high - last.price >= step
        if sign * (last.price - adverse) < step {
            return None;
        }

        let raw = last.volume * m.volume_multiplier;
        let remaining = m.max_total_volume - position.volume;
        if remaining <= 0.0 {
            return None;
        }
        let volume = raw.min(remaining);
        debug!(leg = leg_count + 1, volume, "averaging leg due");
        Some(volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BreakEvenConfig, MartingaleConfig, TrailingConfig};
    use chrono::Utc;
    use common::OrderSide;

    fn instrument() -> InstrumentInfo {
        // 5-decimal forex quote: pip = 10 * tick = 0.0001
        InstrumentInfo {
            pair: "EURUSD".into(),
            price_tick: 0.00001,
            volume_step: 0.01,
            min_volume: 0.01,
            max_volume: 100.0,
            decimal_places: 5,
        }
    }

    fn bar(low: f64, high: f64) -> Candle {
        Candle {
            open: (low + high) / 2.0,
            high,
            low,
            close: (low + high) / 2.0,
            volume: 100.0,
            open_time: Utc::now(),
            close_time: Utc::now(),
            finished: true,
        }
    }

    fn long_ledger(entry: f64, volume: f64) -> PositionLedger {
        let mut ledger = PositionLedger::new();
        ledger.apply_fill(OrderSide::Buy, entry, volume, "t-entry", Utc::now());
        ledger
    }

    fn short_ledger(entry: f64, volume: f64) -> PositionLedger {
        let mut ledger = PositionLedger::new();
        ledger.apply_fill(OrderSide::Sell, entry, volume, "t-entry", Utc::now());
        ledger
    }

    #[test]
    fn initial_levels_use_pip_distances() {
        let mut rm = RiskManager::new(RiskConfig {
            stop_points: 50.0,
            take_points: 100.0,
            ..RiskConfig::default()
        })
        .unwrap();
        let ledger = long_ledger(1.10000, 1.0);
        rm.initialize(ledger.position(), &instrument());

        let levels = rm.levels().unwrap();
        assert!((levels.stop.unwrap() - 1.09500).abs() < 1e-9);
        assert!((levels.take.unwrap() - 1.11000).abs() < 1e-9);
        assert!(!levels.break_even_armed);
    }

    #[test]
    fn levels_snap_to_the_tick_grid() {
        let mut rm = RiskManager::new(RiskConfig {
            stop_points: 3.0,
            take_points: 4.0,
            ..RiskConfig::default()
        })
        .unwrap();
        // Coarse-tick instrument, off-grid average entry.
        let inst = InstrumentInfo {
            pair: "ES".into(),
            price_tick: 0.25,
            volume_step: 1.0,
            min_volume: 1.0,
            max_volume: 500.0,
            decimal_places: 2,
        };
        let ledger = long_ledger(4500.10, 1.0);
        rm.initialize(ledger.position(), &inst);

        let levels = rm.levels().unwrap();
        // Raw 4499.35 and 4501.10 land on the nearest 0.25 increments.
        assert!((levels.stop.unwrap() - 4499.25).abs() < 1e-9);
        assert!((levels.take.unwrap() - 4501.00).abs() < 1e-9);
    }

    #[test]
    fn disabled_distances_yield_no_levels() {
        let mut rm = RiskManager::new(RiskConfig {
            stop_points: 0.0,
            take_points: -1.0,
            ..RiskConfig::default()
        })
        .unwrap();
        let ledger = long_ledger(1.10000, 1.0);
        rm.initialize(ledger.position(), &instrument());

        let levels = rm.levels().unwrap();
        assert!(levels.stop.is_none());
        assert!(levels.take.is_none());
    }

    #[test]
    fn short_levels_are_mirrored() {
        let mut rm = RiskManager::new(RiskConfig {
            stop_points: 50.0,
            take_points: 100.0,
            ..RiskConfig::default()
        })
        .unwrap();
        let ledger = short_ledger(1.10000, 1.0);
        rm.initialize(ledger.position(), &instrument());

        let levels = rm.levels().unwrap();
        assert!((levels.stop.unwrap() - 1.10500).abs() < 1e-9);
        assert!((levels.take.unwrap() - 1.09000).abs() < 1e-9);
    }

    #[test]
    fn stop_checked_against_adverse_extreme() {
        let mut rm = RiskManager::new(RiskConfig::default()).unwrap();
        let ledger = long_ledger(1.10000, 1.0);
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        // Low touches the stop even though the close is back above it.
        let mut candle = bar(1.09490, 1.10100);
        candle.close = 1.10050;
        let actions = rm.on_bar(&candle, &ledger, &inst);
        assert_eq!(
            actions,
            vec![RiskAction::ForcedExit { reason: ExitReason::StopLoss }]
        );
    }

    #[test]
    fn take_checked_against_favorable_extreme() {
        let mut rm = RiskManager::new(RiskConfig::default()).unwrap();
        let ledger = long_ledger(1.10000, 1.0);
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        let actions = rm.on_bar(&bar(1.09900, 1.11050), &ledger, &inst);
        assert_eq!(
            actions,
            vec![RiskAction::ForcedExit { reason: ExitReason::TakeProfit }]
        );
    }

    #[test]
    fn no_exit_when_extremes_stay_inside_levels() {
        let mut rm = RiskManager::new(RiskConfig::default()).unwrap();
        let ledger = long_ledger(1.10000, 1.0);
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        let actions = rm.on_bar(&bar(1.09600, 1.10400), &ledger, &inst);
        assert!(actions.is_empty());
    }

    #[test]
    fn trailing_stop_only_tightens_and_respects_min_step() {
        let mut rm = RiskManager::new(RiskConfig {
            stop_points: 50.0,
            take_points: 0.0,
            trailing: Some(TrailingConfig { distance_points: 30.0, min_step_points: 5.0 }),
            ..RiskConfig::default()
        })
        .unwrap();
        let ledger = long_ledger(1.10000, 1.0);
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        // Rally: watermark 1.10600 → candidate 1.10300, well above 1.09500.
        rm.on_bar(&bar(1.10100, 1.10600), &ledger, &inst);
        let stop1 = rm.levels().unwrap().stop.unwrap();
        assert!((stop1 - 1.10300).abs() < 1e-9);

        // Tiny further move: candidate improves by < min step → unchanged.
        rm.on_bar(&bar(1.10200, 1.10620), &ledger, &inst);
        let stop2 = rm.levels().unwrap().stop.unwrap();
        assert_eq!(stop1, stop2);

        // Pullback: watermark unchanged, stop never loosens.
        rm.on_bar(&bar(1.10310, 1.10500), &ledger, &inst);
        let stop3 = rm.levels().unwrap().stop.unwrap();
        assert_eq!(stop2, stop3);
    }

    #[test]
    fn trailing_stop_tightens_for_short() {
        let mut rm = RiskManager::new(RiskConfig {
            stop_points: 50.0,
            take_points: 0.0,
            trailing: Some(TrailingConfig { distance_points: 30.0, min_step_points: 5.0 }),
            ..RiskConfig::default()
        })
        .unwrap();
        let ledger = short_ledger(1.10000, 1.0);
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        rm.on_bar(&bar(1.09400, 1.09900), &ledger, &inst);
        let stop = rm.levels().unwrap().stop.unwrap();
        // watermark 1.09400 + 30 pips
        assert!((stop - 1.09700).abs() < 1e-9);
        assert!(stop < 1.10500);
    }

    #[test]
    fn break_even_arms_once_and_stays_armed() {
        let mut rm = RiskManager::new(RiskConfig {
            stop_points: 50.0,
            take_points: 0.0,
            break_even: Some(BreakEvenConfig { trigger_points: 25.0, offset_points: 2.0 }),
            ..RiskConfig::default()
        })
        .unwrap();
        let ledger = long_ledger(1.10000, 1.0);
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        // +30 pips favorable: arms, stop clamped to entry + 2 pips.
        rm.on_bar(&bar(1.09950, 1.10300), &ledger, &inst);
        let levels = rm.levels().unwrap();
        assert!(levels.break_even_armed);
        assert!((levels.stop.unwrap() - 1.10020).abs() < 1e-9);

        // Stays armed on later bars; stop never loosens back.
        rm.on_bar(&bar(1.10050, 1.10100), &ledger, &inst);
        let levels = rm.levels().unwrap();
        assert!(levels.break_even_armed);
        assert!((levels.stop.unwrap() - 1.10020).abs() < 1e-9);
    }

    #[test]
    fn break_even_does_not_loosen_a_tighter_stop() {
        let mut rm = RiskManager::new(RiskConfig {
            stop_points: 0.0,
            take_points: 0.0,
            trailing: Some(TrailingConfig { distance_points: 10.0, min_step_points: 1.0 }),
            break_even: Some(BreakEvenConfig { trigger_points: 25.0, offset_points: 2.0 }),
            ..RiskConfig::default()
        })
        .unwrap();
        let ledger = long_ledger(1.10000, 1.0);
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        // Trailing already put the stop at watermark − 10 pips = 1.10300,
        // far above the break-even candidate of 1.10020.
        rm.on_bar(&bar(1.10000, 1.10400), &ledger, &inst);
        let levels = rm.levels().unwrap();
        assert!(levels.break_even_armed);
        assert!((levels.stop.unwrap() - 1.10300).abs() < 1e-9);
    }

    fn martingale_config() -> RiskConfig {
        RiskConfig {
            stop_points: 0.0,
            take_points: 0.0,
            martingale: Some(MartingaleConfig {
                step_points: 20.0,
                step_mode: StepMode::Fixed,
                volume_multiplier: 2.0,
                max_total_volume: 10.0,
                profit_factor: 10.0,
                max_legs: 4,
            }),
            ..RiskConfig::default()
        }
    }

    #[test]
    fn adverse_excursion_adds_multiplied_leg() {
        let mut rm = RiskManager::new(martingale_config()).unwrap();
        let ledger = long_ledger(1.10000, 1.0);
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        // 21 pips below the last (only) leg, past the 20-pip step.
        let actions = rm.on_bar(&bar(1.09790, 1.09950), &ledger, &inst);
        assert_eq!(actions, vec![RiskAction::AddLeg { volume: 2.0 }]);
    }

    #[test]
    fn leg_volume_capped_at_max_total() {
        let mut rm = RiskManager::new(martingale_config()).unwrap();
        let mut ledger = long_ledger(1.10000, 4.0);
        ledger.apply_fill(OrderSide::Buy, 1.09800, 5.0, "t2", Utc::now());
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        // Raw next leg would be 10.0; only 1.0 of headroom remains.
        let actions = rm.on_bar(&bar(1.09590, 1.09750), &ledger, &inst);
        assert_eq!(actions, vec![RiskAction::AddLeg { volume: 1.0 }]);
    }

    #[test]
    fn no_leg_beyond_max_legs() {
        let mut cfg = martingale_config();
        cfg.martingale.as_mut().unwrap().max_legs = 2;
        let mut rm = RiskManager::new(cfg).unwrap();
        let mut ledger = long_ledger(1.10000, 1.0);
        ledger.apply_fill(OrderSide::Buy, 1.09800, 2.0, "t2", Utc::now());
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        let actions = rm.on_bar(&bar(1.09500, 1.09700), &ledger, &inst);
        assert!(actions.is_empty());
    }

    #[test]
    fn per_leg_step_mode_widens_the_step() {
        let mut cfg = martingale_config();
        cfg.martingale.as_mut().unwrap().step_mode = StepMode::PerLeg;
        let mut rm = RiskManager::new(cfg).unwrap();
        let mut ledger = long_ledger(1.10000, 1.0);
        ledger.apply_fill(OrderSide::Buy, 1.09800, 2.0, "t2", Utc::now());
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        // Two legs → step = 20 pips * 2 = 40 pips from 1.09800. A 25-pip
        // excursion is not enough.
        let actions = rm.on_bar(&bar(1.09550, 1.09700), &ledger, &inst);
        assert!(actions.is_empty());

        let actions = rm.on_bar(&bar(1.09390, 1.09700), &ledger, &inst);
        assert_eq!(actions, vec![RiskAction::AddLeg { volume: 4.0 }]);
    }

    #[test]
    fn cluster_exit_requires_strictly_positive_pnl() {
        let mut rm = RiskManager::new(martingale_config()).unwrap();
        // Two legs: 1@1.10000 and 2@1.09000 → avg 1.09333.
        let mut ledger = long_ledger(1.10000, 1.0);
        ledger.apply_fill(OrderSide::Buy, 1.09000, 2.0, "t2", Utc::now());
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        // Cluster take = 1.09000 + 10 pips * 2 legs = 1.09200, which is BELOW
        // the weighted average entry — touching it must not exit.
        let actions = rm.on_bar(&bar(1.09100, 1.09250), &ledger, &inst);
        assert!(actions.is_empty());

        // Price recovers above the average: bar whose favorable extreme
        // passes the take while the cluster is profitable there... the take
        // itself is still below water, so the guard keeps holding.
        let actions = rm.on_bar(&bar(1.09200, 1.09400), &ledger, &inst);
        assert!(actions.is_empty());
    }

    #[test]
    fn cluster_exit_fires_when_take_is_above_water() {
        let mut cfg = martingale_config();
        cfg.martingale.as_mut().unwrap().profit_factor = 30.0;
        let mut rm = RiskManager::new(cfg).unwrap();
        let mut ledger = long_ledger(1.10000, 1.0);
        ledger.apply_fill(OrderSide::Buy, 1.09000, 2.0, "t2", Utc::now());
        let inst = instrument();
        rm.initialize(ledger.position(), &inst);

        // Cluster take = 1.09000 + 30 pips * 2 = 1.09600 > avg 1.09333.
        let actions = rm.on_bar(&bar(1.09300, 1.09650), &ledger, &inst);
        assert_eq!(
            actions,
            vec![RiskAction::ForcedExit { reason: ExitReason::ClusterTake }]
        );
    }

    #[test]
    fn flat_ledger_produces_no_actions() {
        let mut rm = RiskManager::new(RiskConfig::default()).unwrap();
        let ledger = PositionLedger::new();
        let actions = rm.on_bar(&bar(1.0, 2.0), &ledger, &instrument());
        assert!(actions.is_empty());
        assert!(rm.levels().is_none());
    }

    #[test]
    fn invalid_tick_skips_level_computation() {
        let mut rm = RiskManager::new(RiskConfig::default()).unwrap();
        let ledger = long_ledger(1.10000, 1.0);
        let mut inst = instrument();
        inst.price_tick = 0.0;
        rm.initialize(ledger.position(), &inst);
        assert!(rm.levels().is_none());

        // Metadata recovers → levels computed on the next bar event.
        inst.price_tick = 0.00001;
        rm.on_bar(&bar(1.09900, 1.10100), &ledger, &inst);
        assert!(rm.levels().is_some());
    }
}
