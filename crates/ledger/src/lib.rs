//! Position Ledger: pure state container for net exposure, weighted-average
//! entry price, and per-leg history for averaging strategies.
//!
//! Mutated only through `apply_fill`; the controller owns the instance and
//! the single-threaded event model guarantees no concurrent access.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use common::{Direction, OrderSide};

/// Volumes within this epsilon of zero are treated as exactly zero, to
/// absorb float residue from repeated partial closes.
pub const VOLUME_EPS: f64 = 1e-9;

/// Duplicate fill deliveries beyond this count escalate the warning.
const DUPLICATE_WARN_THRESHOLD: u32 = 3;

/// Current net position. Invariant: `direction == Flat ⇔ volume == 0`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub volume: f64,
    pub avg_entry_price: f64,
    pub opened_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.direction == Direction::Flat
    }

    /// Direction-adjusted unrealized PnL in account terms at `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.avg_entry_price) * self.volume
    }
}

/// One partial entry in an averaging cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AveragingLeg {
    pub price: f64,
    pub volume: f64,
    pub filled_at: DateTime<Utc>,
}

/// Tagged outcome of applying one fill, replacing ad hoc branching on the
/// sign of the position delta.
#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    /// A flat ledger opened a fresh position.
    Opened,
    /// A same-direction fill increased the position (avg price recomputed).
    Added,
    /// An opposing fill closed part of the position; avg price unchanged.
    Reduced { realized_pnl: f64 },
    /// An opposing fill closed the position exactly.
    Closed { realized_pnl: f64 },
    /// An opposing fill exceeded the position: the surplus opened a new
    /// position in the opposite direction at the fill price.
    Flipped { realized_pnl: f64 },
    /// Re-delivery of an already-applied trade id; state untouched.
    DuplicateIgnored,
    /// Fill volume <= 0 — an upstream data fault, logged and ignored.
    RejectedNonPositiveVolume,
}

impl FillOutcome {
    /// Realized PnL carried by this outcome, zero for non-closing variants.
    pub fn realized_pnl(&self) -> f64 {
        match self {
            FillOutcome::Reduced { realized_pnl }
            | FillOutcome::Closed { realized_pnl }
            | FillOutcome::Flipped { realized_pnl } => *realized_pnl,
            _ => 0.0,
        }
    }

    /// True when this fill left the ledger without the previous position
    /// (full close or flip) — the controller resets detector/risk state.
    pub fn closed_previous(&self) -> bool {
        matches!(self, FillOutcome::Closed { .. } | FillOutcome::Flipped { .. })
    }
}

/// The ledger itself: position, averaging legs, duplicate-fill guard, and
/// cumulative realized PnL.
#[derive(Debug, Default)]
pub struct PositionLedger {
    position: Position,
    legs: Vec<AveragingLeg>,
    seen_trade_ids: HashSet<String>,
    duplicate_count: u32,
    realized_pnl: f64,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn legs(&self) -> &[AveragingLeg] {
        &self.legs
    }

    pub fn last_leg(&self) -> Option<&AveragingLeg> {
        self.legs.last()
    }

    /// Cumulative realized PnL across all closed portions.
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Apply one fill confirmation. Idempotent per `trade_id`: re-delivery
    /// of the same fill never double-updates the position.
    pub fn apply_fill(
        &mut self,
        side: OrderSide,
        price: f64,
        volume: f64,
        trade_id: &str,
        timestamp: DateTime<Utc>,
    ) -> FillOutcome {
        if volume <= 0.0 || !volume.is_finite() {
            warn!(trade_id, volume, "rejecting fill with non-positive volume");
            return FillOutcome::RejectedNonPositiveVolume;
        }
        if !self.seen_trade_ids.insert(trade_id.to_string()) {
            self.duplicate_count += 1;
            if self.duplicate_count > DUPLICATE_WARN_THRESHOLD {
                warn!(
                    trade_id,
                    duplicates = self.duplicate_count,
                    "duplicate fill re-delivered excessively, possible upstream bug"
                );
            } else {
                warn!(trade_id, "duplicate fill delivery ignored");
            }
            return FillOutcome::DuplicateIgnored;
        }

        let fill_dir = side.direction();

        if self.position.is_flat() {
            self.open(fill_dir, price, volume, timestamp);
            return FillOutcome::Opened;
        }

        if fill_dir == self.position.direction {
            self.add(price, volume, timestamp);
            return FillOutcome::Added;
        }

        // Opposing fill: close up to the existing volume at the existing
        // avg price, then flip with any surplus.
        let closing = self.position.volume.min(volume);
        let pnl = self.position.direction.sign() * (price - self.position.avg_entry_price) * closing;
        self.realized_pnl += pnl;

        let surplus = volume - closing;
        if surplus > VOLUME_EPS {
            let new_dir = self.position.direction.opposite();
            self.reset();
            self.open(new_dir, price, surplus, timestamp);
            return FillOutcome::Flipped { realized_pnl: pnl };
        }

        self.position.volume -= closing;
        if self.position.volume <= VOLUME_EPS {
            self.reset();
            return FillOutcome::Closed { realized_pnl: pnl };
        }
        // Partial close: remaining volume keeps the existing avg price.
        FillOutcome::Reduced { realized_pnl: pnl }
    }

    fn open(&mut self, direction: Direction, price: f64, volume: f64, timestamp: DateTime<Utc>) {
        self.position = Position {
            direction,
            volume,
            avg_entry_price: price,
            opened_at: Some(timestamp),
        };
        self.legs.push(AveragingLeg { price, volume, filled_at: timestamp });
    }

    fn add(&mut self, price: f64, volume: f64, timestamp: DateTime<Utc>) {
        let old = self.position.volume;
        self.position.avg_entry_price =
            (self.position.avg_entry_price * old + price * volume) / (old + volume);
        self.position.volume = old + volume;
        self.legs.push(AveragingLeg { price, volume, filled_at: timestamp });
    }

    /// Clear to flat. Only reachable when volume is exactly zero (full close
    /// or full flip absorption).
    fn reset(&mut self) {
        self.position = Position::default();
        self.legs.clear();
    }
}
