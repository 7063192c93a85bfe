use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use common::{
    Candle, Direction, EngineEvent, ExecutionEvent, IndicatorSnapshot, InstrumentInfo,
    OrderGateway, OrderIntent, OrderSide, Signal, Timeframe,
};
use ledger::{FillOutcome, PositionLedger, VOLUME_EPS};
use risk::{ExitReason, RiskAction, RiskManager};
use signal::{DetectorContext, HigherTfCache, SignalDetector};

use crate::config::{ConfigError, StrategyConfig};
use crate::portfolio::PortfolioHandle;
use crate::sizing::SizingPolicy;

/// Bars of primary-timeframe history retained for detector evaluation.
const MAX_HISTORY: usize = 512;

/// Trade lifecycle of the single position this controller manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TradeState {
    Flat,
    EntryPending,
    Open,
    ExitPending,
}

/// What an in-flight order is for, so fills and terminal events can be
/// routed to the right state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderPurpose {
    Entry,
    Exit,
    AddLeg,
}

/// One submitted intent awaiting its terminal execution event. Partial
/// fills accumulate in `filled`; the pending flag stays up until the full
/// intent volume is done.
#[derive(Debug)]
struct InFlight {
    purpose: OrderPurpose,
    volume: f64,
    filled: f64,
}

/// Per-direction pending-order flags, keyed by intent id. At most one order
/// per side is ever in flight.
#[derive(Debug, Default)]
struct PendingOrders {
    buy: Option<String>,
    sell: Option<String>,
}

impl PendingOrders {
    fn slot(&mut self, side: OrderSide) -> &mut Option<String> {
        match side {
            OrderSide::Buy => &mut self.buy,
            OrderSide::Sell => &mut self.sell,
        }
    }

    fn is_pending(&self, side: OrderSide) -> bool {
        match side {
            OrderSide::Buy => self.buy.is_some(),
            OrderSide::Sell => self.sell.is_some(),
        }
    }

    fn any(&self) -> bool {
        self.buy.is_some() || self.sell.is_some()
    }

    /// Clear whichever slot holds this intent id.
    fn clear(&mut self, order_id: &str) {
        if self.buy.as_deref() == Some(order_id) {
            self.buy = None;
        }
        if self.sell.as_deref() == Some(order_id) {
            self.sell = None;
        }
    }
}

/// Orchestrates one instrument end to end: consumes the merged event stream,
/// drives the detector, ledger, and risk manager, and is the only component
/// that talks to the order gateway.
///
/// Events arrive on a single channel and each is processed to completion
/// before the next, so no state here needs interior locking.
pub struct StrategyController {
    name: String,
    pair: String,
    primary_timeframe: Timeframe,
    instrument: InstrumentInfo,
    detector: Box<dyn SignalDetector>,
    ledger: PositionLedger,
    risk: RiskManager,
    sizing: SizingPolicy,
    gateway: Arc<dyn OrderGateway>,
    portfolio: PortfolioHandle,

    state: TradeState,
    pending: PendingOrders,
    in_flight: HashMap<String, InFlight>,
    /// Forced exit waiting for a cancel/reject ack of an in-flight entry.
    deferred_exit: Option<ExitReason>,

    bars: Vec<Candle>,
    indicators: Vec<IndicatorSnapshot>,
    higher_tf: HigherTfCache,
}

impl StrategyController {
    pub fn new(
        config: StrategyConfig,
        gateway: Arc<dyn OrderGateway>,
        portfolio: PortfolioHandle,
    ) -> Result<Self, ConfigError> {
        let detector = signal::build_detector(&config.name, &config.detector)
            .map_err(|source| ConfigError::Detector { name: config.name.clone(), source })?;
        let risk = RiskManager::new(config.risk)
            .map_err(|source| ConfigError::Risk { name: config.name.clone(), source })?;
        Ok(Self {
            name: config.name,
            pair: config.pair,
            primary_timeframe: config.primary_timeframe,
            instrument: config.instrument,
            detector,
            ledger: PositionLedger::new(),
            risk,
            sizing: config.sizing,
            gateway,
            portfolio,
            state: TradeState::Flat,
            pending: PendingOrders::default(),
            in_flight: HashMap::new(),
            deferred_exit: None,
            bars: Vec::new(),
            indicators: Vec::new(),
            higher_tf: HigherTfCache::new(),
        })
    }

    /// Consume the event stream until the sender side closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<EngineEvent>) {
        info!(
            strategy = %self.name,
            pair = %self.pair,
            timeframe = %self.primary_timeframe,
            "strategy controller started"
        );
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::BarClosed { timeframe, candle, indicators } => {
                    if timeframe == self.primary_timeframe {
                        self.on_primary_bar(candle, indicators).await;
                    } else {
                        self.on_confirming_bar(timeframe, &candle, indicators);
                    }
                }
                EngineEvent::Execution(execution) => self.on_execution(execution).await,
            }
        }
        info!(strategy = %self.name, "event stream closed, strategy controller stopping");
    }

    // ── bar handling ─────────────────────────────────────────────────────

    /// A confirming-timeframe close only refreshes the snapshot cache.
    fn on_confirming_bar(
        &mut self,
        timeframe: Timeframe,
        candle: &Candle,
        indicators: Vec<IndicatorSnapshot>,
    ) {
        if !candle.finished {
            return;
        }
        let merged = merge_snapshots(indicators);
        self.higher_tf.update(timeframe, merged, candle.close_time);
    }

    async fn on_primary_bar(&mut self, candle: Candle, indicators: Vec<IndicatorSnapshot>) {
        if !candle.finished {
            debug!(strategy = %self.name, "ignoring unfinished bar");
            return;
        }
        let now = candle.close_time;
        self.bars.push(candle.clone());
        self.indicators.push(merge_snapshots(indicators));
        if self.bars.len() > MAX_HISTORY {
            let excess = self.bars.len() - MAX_HISTORY;
            self.bars.drain(..excess);
            self.indicators.drain(..excess);
        }

        // Risk first: a due forced exit pre-empts all other order flow on
        // this bar.
        if !self.ledger.position().is_flat() && self.state != TradeState::ExitPending {
            let actions = self.risk.on_bar(&candle, &self.ledger, &self.instrument);
            for action in actions {
                match action {
                    RiskAction::ForcedExit { reason } => {
                        self.start_forced_exit(reason).await;
                        return;
                    }
                    RiskAction::AddLeg { volume } => {
                        self.submit_add_leg(volume).await;
                    }
                }
            }
        }

        match self.state {
            TradeState::Flat if !self.pending.any() => {
                if let Some(signal) = self.evaluate_detector(now) {
                    if signal.is_entry() {
                        self.submit_entry(signal, &candle).await;
                    }
                }
            }
            TradeState::Open if !self.pending.any() => {
                let direction = self.ledger.position().direction;
                if let Some(signal) = self.evaluate_detector(now) {
                    let wants_exit = matches!(
                        (signal, direction),
                        (Signal::ExitLong, Direction::Long) | (Signal::ExitShort, Direction::Short)
                    );
                    if wants_exit {
                        info!(strategy = %self.name, ?signal, "detector exit signal");
                        self.submit_exit().await;
                    }
                }
            }
            _ => {
                // An order is in flight; no new decisions until it resolves.
            }
        }
    }

    fn evaluate_detector(&mut self, now: chrono::DateTime<chrono::Utc>) -> Option<Signal> {
        let ctx = DetectorContext {
            bars: &self.bars,
            indicators: &self.indicators,
            higher_tf: &self.higher_tf,
            now,
            pip: self.instrument.pip_size(),
        };
        self.detector.evaluate(&ctx)
    }

    // ── order submission ─────────────────────────────────────────────────

    async fn submit_entry(&mut self, signal: Signal, candle: &Candle) {
        let direction = signal.direction();
        let Some(side) = direction.entry_side() else {
            return;
        };
        let equity = self.portfolio.snapshot().await.equity;
        let stop_points = self.risk.config().stop_points;
        let stop_distance =
            (stop_points > 0.0).then(|| stop_points * self.instrument.pip_size());
        let Some(raw) = self.sizing.raw_volume(equity, candle.close, stop_distance) else {
            debug!(strategy = %self.name, equity, "sizing produced no volume, skipping entry");
            return;
        };
        let Some(volume) = self.instrument.normalize_volume(raw) else {
            debug!(strategy = %self.name, raw, "entry volume below instrument minimum, skipping");
            return;
        };

        info!(strategy = %self.name, %direction, volume, price = candle.close, "submitting entry");
        if self.submit_market(side, volume, OrderPurpose::Entry).await {
            self.state = TradeState::EntryPending;
        }
    }

    async fn submit_add_leg(&mut self, raw_volume: f64) {
        let direction = self.ledger.position().direction;
        let Some(side) = direction.entry_side() else {
            return;
        };
        if self.pending.is_pending(side) {
            debug!(strategy = %self.name, "averaging order already pending, skipping leg");
            return;
        }
        let Some(volume) = self.instrument.normalize_volume(raw_volume) else {
            debug!(strategy = %self.name, raw_volume, "averaging volume below minimum, skipping leg");
            return;
        };
        info!(strategy = %self.name, %direction, volume, legs = self.ledger.legs().len(), "submitting averaging leg");
        self.submit_market(side, volume, OrderPurpose::AddLeg).await;
    }

    /// Begin a forced exit. An in-flight same-position order is cancelled
    /// first; the exit itself goes out once the cancel is acknowledged.
    async fn start_forced_exit(&mut self, reason: ExitReason) {
        if let Some((order_id, entry)) = self
            .in_flight
            .iter()
            .find(|(_, e)| e.purpose != OrderPurpose::Exit)
            .map(|(id, e)| (id.clone(), e.purpose))
        {
            info!(
                strategy = %self.name,
                %reason,
                order_id = %order_id,
                purpose = ?entry,
                "forced exit due, cancelling in-flight order first"
            );
            self.deferred_exit = Some(reason);
            if let Err(e) = self.gateway.cancel(&order_id).await {
                warn!(strategy = %self.name, error = %e, "cancel request failed");
            }
            return;
        }
        info!(strategy = %self.name, %reason, "forced exit");
        self.submit_exit().await;
    }

    /// Submit a market order closing the whole current position.
    async fn submit_exit(&mut self) {
        let position = self.ledger.position();
        let Some(side) = position.direction.exit_side() else {
            return;
        };
        let volume = position.volume;
        if volume <= VOLUME_EPS {
            return;
        }
        if self.submit_market(side, volume, OrderPurpose::Exit).await {
            self.state = TradeState::ExitPending;
        }
    }

    /// Fire-and-forget submission; returns false when the gateway refused
    /// to accept the intent at all.
    async fn submit_market(&mut self, side: OrderSide, volume: f64, purpose: OrderPurpose) -> bool {
        let intent = OrderIntent::market(self.pair.clone(), side, volume);
        let order_id = intent.id.clone();
        if let Err(e) = self.gateway.submit(&intent).await {
            warn!(strategy = %self.name, error = %e, %side, volume, "order submission failed");
            return false;
        }
        *self.pending.slot(side) = Some(order_id.clone());
        self.in_flight.insert(order_id, InFlight { purpose, volume, filled: 0.0 });
        true
    }

    // ── execution handling ───────────────────────────────────────────────

    async fn on_execution(&mut self, event: ExecutionEvent) {
        match event {
            ExecutionEvent::Filled { order_id, trade_id, side, price, volume, timestamp }
            | ExecutionEvent::PartiallyFilled { order_id, trade_id, side, price, volume, timestamp } => {
                self.on_fill(&order_id, &trade_id, side, price, volume, timestamp).await;
            }
            ExecutionEvent::Rejected { order_id, reason } => {
                warn!(strategy = %self.name, order_id = %order_id, reason = %reason, "order rejected");
                self.finish_order(&order_id);
                self.after_order_resolved().await;
            }
            ExecutionEvent::Cancelled { order_id } => {
                info!(strategy = %self.name, order_id = %order_id, "order cancelled");
                self.finish_order(&order_id);
                self.after_order_resolved().await;
            }
        }
    }

    async fn on_fill(
        &mut self,
        order_id: &str,
        trade_id: &str,
        side: OrderSide,
        price: f64,
        volume: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) {
        let outcome = self.ledger.apply_fill(side, price, volume, trade_id, timestamp);
        debug!(
            strategy = %self.name,
            order_id,
            trade_id,
            %side,
            price,
            volume,
            ?outcome,
            "fill applied"
        );

        match &outcome {
            FillOutcome::Opened | FillOutcome::Added => {
                self.risk.initialize(self.ledger.position(), &self.instrument);
            }
            FillOutcome::Flipped { realized_pnl } => {
                // The previous trade is gone: fresh detector state, fresh
                // levels for the surplus position.
                self.portfolio.report_realized(&self.pair, *realized_pnl).await;
                self.detector.reset();
                self.risk.initialize(self.ledger.position(), &self.instrument);
            }
            FillOutcome::Closed { realized_pnl } => {
                self.portfolio.report_realized(&self.pair, *realized_pnl).await;
                self.detector.reset();
                self.risk.reset();
                info!(strategy = %self.name, realized_pnl, "position closed");
            }
            FillOutcome::Reduced { realized_pnl } => {
                self.portfolio.report_realized(&self.pair, *realized_pnl).await;
            }
            FillOutcome::DuplicateIgnored | FillOutcome::RejectedNonPositiveVolume => {
                // State untouched; intent progress unaffected.
                return;
            }
        }

        // Track intent completion; partial fills keep the pending flag up.
        let done = match self.in_flight.get_mut(order_id) {
            Some(entry) => {
                entry.filled += volume;
                entry.filled + VOLUME_EPS >= entry.volume
            }
            None => {
                warn!(strategy = %self.name, order_id, "fill for unknown order intent");
                false
            }
        };
        if done {
            self.finish_order(order_id);
            self.after_order_resolved().await;
        }
    }

    /// Drop an intent from the in-flight table and clear its pending flag.
    fn finish_order(&mut self, order_id: &str) {
        self.in_flight.remove(order_id);
        self.pending.clear(order_id);
    }

    /// Settle the trade state after an intent reached a terminal event, and
    /// fire any forced exit that was waiting on it.
    async fn after_order_resolved(&mut self) {
        if self.in_flight.is_empty() {
            self.state = if self.ledger.position().is_flat() {
                // No trade came of it (rejected/cancelled entry, or the
                // position just closed): clear the emission latch so the
                // next bar re-attempts if the condition still holds.
                self.detector.reset();
                TradeState::Flat
            } else {
                TradeState::Open
            };
        }
        if let Some(reason) = self.deferred_exit.take() {
            if self.ledger.position().is_flat() {
                debug!(strategy = %self.name, %reason, "deferred exit no longer needed, position flat");
            } else {
                info!(strategy = %self.name, %reason, "submitting deferred forced exit");
                self.submit_exit().await;
            }
        }
    }
}

/// Collapse the per-bar snapshot list into one lookup table. Formed only
/// when every contributing indicator has warmed up.
fn merge_snapshots(snapshots: Vec<IndicatorSnapshot>) -> IndicatorSnapshot {
    let formed = !snapshots.is_empty() && snapshots.iter().all(|s| s.formed);
    let mut values = std::collections::BTreeMap::new();
    for snapshot in snapshots {
        values.extend(snapshot.values);
    }
    IndicatorSnapshot::new(values, formed)
}
