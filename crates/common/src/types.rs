use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A finished or in-progress price bar for one (pair, timeframe).
/// Immutable once `finished == true`; the engine acts only on finished bars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    /// True when the bar has closed (finalized).
    pub finished: bool,
}

/// Sampling timeframe for candles and indicator snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    D1,
}

impl Timeframe {
    /// Nominal bar duration, used to bound the staleness of cached
    /// higher-timeframe snapshots.
    pub fn duration(&self) -> chrono::Duration {
        match self {
            Timeframe::M1 => chrono::Duration::minutes(1),
            Timeframe::M5 => chrono::Duration::minutes(5),
            Timeframe::M15 => chrono::Duration::minutes(15),
            Timeframe::H1 => chrono::Duration::hours(1),
            Timeframe::D1 => chrono::Duration::days(1),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeframe::M1 => write!(f, "1m"),
            Timeframe::M5 => write!(f, "5m"),
            Timeframe::M15 => write!(f, "15m"),
            Timeframe::H1 => write!(f, "1h"),
            Timeframe::D1 => write!(f, "1d"),
        }
    }
}

/// One bar's worth of named indicator outputs, produced by the external
/// indicator pipeline. `formed == false` during the indicator's warm-up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub values: BTreeMap<String, f64>,
    pub formed: bool,
}

impl IndicatorSnapshot {
    pub fn new(values: BTreeMap<String, f64>, formed: bool) -> Self {
        Self { values, formed }
    }

    /// Single-value snapshot, convenient for oscillators.
    pub fn single(name: impl Into<String>, value: f64, formed: bool) -> Self {
        let mut values = BTreeMap::new();
        values.insert(name.into(), value);
        Self { values, formed }
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// Discrete trade signal emitted by a detector. Absence of a signal is
/// `Option::<Signal>::None` rather than a dedicated variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    EnterLong,
    EnterShort,
    ExitLong,
    ExitShort,
}

impl Signal {
    pub fn is_entry(&self) -> bool {
        matches!(self, Signal::EnterLong | Signal::EnterShort)
    }

    pub fn direction(&self) -> Direction {
        match self {
            Signal::EnterLong | Signal::ExitLong => Direction::Long,
            Signal::EnterShort | Signal::ExitShort => Direction::Short,
        }
    }
}

/// Net exposure direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Flat,
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short, 0 for flat. Used in direction-adjusted
    /// price arithmetic (PnL, stop/take offsets).
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Flat => 0.0,
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Side of the order that opens or adds to a position in this direction.
    pub fn entry_side(&self) -> Option<OrderSide> {
        match self {
            Direction::Flat => None,
            Direction::Long => Some(OrderSide::Buy),
            Direction::Short => Some(OrderSide::Sell),
        }
    }

    /// Side of the order that closes a position in this direction.
    pub fn exit_side(&self) -> Option<OrderSide> {
        match self {
            Direction::Flat => None,
            Direction::Long => Some(OrderSide::Sell),
            Direction::Short => Some(OrderSide::Buy),
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Flat => Direction::Flat,
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Flat => write!(f, "flat"),
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Direction a fill on this side pushes the position toward.
    pub fn direction(&self) -> Direction {
        match self {
            OrderSide::Buy => Direction::Long,
            OrderSide::Sell => Direction::Short,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Price parameters of an order intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit { price: f64 },
    Stop { trigger: f64 },
}

/// An order intent submitted to the gateway. Results arrive later as
/// `ExecutionEvent`s keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    pub id: String,
    pub pair: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub volume: f64,
}

impl OrderIntent {
    pub fn market(pair: impl Into<String>, side: OrderSide, volume: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            pair: pair.into(),
            side,
            kind: OrderKind::Market,
            volume,
        }
    }
}

/// Asynchronous confirmation from the order gateway, keyed by the
/// originating intent id. Fills carry a broker trade id used for
/// duplicate-delivery detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionEvent {
    Filled {
        order_id: String,
        trade_id: String,
        side: OrderSide,
        price: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    },
    PartiallyFilled {
        order_id: String,
        trade_id: String,
        side: OrderSide,
        price: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    },
    Rejected {
        order_id: String,
        reason: String,
    },
    Cancelled {
        order_id: String,
    },
}

impl ExecutionEvent {
    pub fn order_id(&self) -> &str {
        match self {
            ExecutionEvent::Filled { order_id, .. }
            | ExecutionEvent::PartiallyFilled { order_id, .. }
            | ExecutionEvent::Rejected { order_id, .. }
            | ExecutionEvent::Cancelled { order_id } => order_id,
        }
    }
}

/// Merged per-instrument event stream consumed by a strategy controller.
/// The hosting runtime delivers these sequentially; each is processed to
/// completion before the next.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    BarClosed {
        timeframe: Timeframe,
        candle: Candle,
        indicators: Vec<IndicatorSnapshot>,
    },
    Execution(ExecutionEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_sign_and_sides() {
        assert_eq!(Direction::Long.sign(), 1.0);
        assert_eq!(Direction::Short.sign(), -1.0);
        assert_eq!(Direction::Flat.sign(), 0.0);
        assert_eq!(Direction::Long.exit_side(), Some(OrderSide::Sell));
        assert_eq!(Direction::Short.entry_side(), Some(OrderSide::Sell));
        assert_eq!(Direction::Flat.entry_side(), None);
    }

    #[test]
    fn signal_direction_mapping() {
        assert_eq!(Signal::EnterLong.direction(), Direction::Long);
        assert_eq!(Signal::ExitShort.direction(), Direction::Short);
        assert!(Signal::EnterShort.is_entry());
        assert!(!Signal::ExitLong.is_entry());
    }

    #[test]
    fn snapshot_value_lookup() {
        let snap = IndicatorSnapshot::single("rsi", 31.0, true);
        assert_eq!(snap.value("rsi"), Some(31.0));
        assert_eq!(snap.value("macd"), None);
    }

    #[test]
    fn order_intent_serialization_roundtrip() {
        let intent = OrderIntent::market("EURUSD", OrderSide::Buy, 0.1);
        let json = serde_json::to_string(&intent).unwrap();
        let back: OrderIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, intent.id);
        assert_eq!(back.side, OrderSide::Buy);
        assert_eq!(back.kind, OrderKind::Market);
    }
}
