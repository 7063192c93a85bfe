use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use common::{
    EngineEvent, Error, ExecutionEvent, OrderGateway, OrderIntent, OrderKind, OrderSide, Result,
};

/// Simulated order gateway for paper trading.
///
/// Fills are simulated at the latest known price with configurable slippage
/// and delivered asynchronously as `ExecutionEvent`s on the controller's
/// event channel, exactly like a live gateway would. No real orders are ever
/// sent anywhere.
pub struct PaperGateway {
    /// Latest known price per pair, updated via `update_price`.
    prices: Arc<RwLock<HashMap<String, f64>>>,
    /// Slippage in basis points applied to all market fills.
    slippage_bps: f64,
    /// Execution events flow back through the same channel as bar events.
    events: mpsc::Sender<EngineEvent>,
    /// Test scripting: behavior override for the next submitted order.
    next_behavior: RwLock<Behavior>,
}

#[derive(Debug, Default)]
enum Behavior {
    #[default]
    Fill,
    Reject(String),
    /// Deliver the next fill in these volume tranches (last one is the
    /// terminal `Filled`).
    PartialFills(Vec<f64>),
}

impl PaperGateway {
    pub fn new(slippage_bps: f64, events: mpsc::Sender<EngineEvent>) -> Self {
        info!(slippage_bps, "paper gateway initialized");
        Self {
            prices: Arc::new(RwLock::new(HashMap::new())),
            slippage_bps,
            events,
            next_behavior: RwLock::new(Behavior::Fill),
        }
    }

    /// Update the latest price for a pair (called by the market event loop).
    pub async fn update_price(&self, pair: &str, price: f64) {
        self.prices.write().await.insert(pair.to_string(), price);
    }

    /// Script the next order to be rejected with this reason.
    pub async fn reject_next(&self, reason: impl Into<String>) {
        *self.next_behavior.write().await = Behavior::Reject(reason.into());
    }

    /// Script the next order to fill in these volume tranches.
    pub async fn fill_next_in_parts(&self, tranches: Vec<f64>) {
        *self.next_behavior.write().await = Behavior::PartialFills(tranches);
    }

    fn fill_price(&self, side: OrderSide, mid: f64) -> f64 {
        // Buys pay more, sells receive less.
        match side {
            OrderSide::Buy => mid * (1.0 + self.slippage_bps / 10_000.0),
            OrderSide::Sell => mid * (1.0 - self.slippage_bps / 10_000.0),
        }
    }

    async fn emit(&self, event: ExecutionEvent) -> Result<()> {
        self.events
            .send(EngineEvent::Execution(event))
            .await
            .map_err(|_| Error::Gateway("execution event channel closed".into()))
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn submit(&self, intent: &OrderIntent) -> Result<()> {
        let behavior = match std::mem::take(&mut *self.next_behavior.write().await) {
            Behavior::Reject(reason) => {
                debug!(order_id = %intent.id, reason = %reason, "paper rejection scripted");
                return self
                    .emit(ExecutionEvent::Rejected { order_id: intent.id.clone(), reason })
                    .await;
            }
            other => other,
        };

        let mid = match intent.kind {
            // Resting orders are simplified: they fill immediately at their
            // own price.
            OrderKind::Limit { price } => price,
            OrderKind::Stop { trigger } => trigger,
            OrderKind::Market => {
                self.prices.read().await.get(&intent.pair).copied().ok_or_else(|| {
                    Error::Gateway(format!(
                        "no price for pair '{}', ensure market events are flowing",
                        intent.pair
                    ))
                })?
            }
        };
        let price = self.fill_price(intent.side, mid);
        debug!(
            pair = %intent.pair,
            side = %intent.side,
            mid,
            fill = price,
            volume = intent.volume,
            "paper fill simulated"
        );

        match behavior {
            Behavior::PartialFills(tranches) => {
                let count = tranches.len();
                for (i, volume) in tranches.into_iter().enumerate() {
                    let event = if i + 1 == count {
                        ExecutionEvent::Filled {
                            order_id: intent.id.clone(),
                            trade_id: uuid::Uuid::new_v4().to_string(),
                            side: intent.side,
                            price,
                            volume,
                            timestamp: Utc::now(),
                        }
                    } else {
                        ExecutionEvent::PartiallyFilled {
                            order_id: intent.id.clone(),
                            trade_id: uuid::Uuid::new_v4().to_string(),
                            side: intent.side,
                            price,
                            volume,
                            timestamp: Utc::now(),
                        }
                    };
                    self.emit(event).await?;
                }
                Ok(())
            }
            _ => {
                self.emit(ExecutionEvent::Filled {
                    order_id: intent.id.clone(),
                    trade_id: uuid::Uuid::new_v4().to_string(),
                    side: intent.side,
                    price,
                    volume: intent.volume,
                    timestamp: Utc::now(),
                })
                .await
            }
        }
    }

    async fn cancel(&self, order_id: &str) -> Result<()> {
        debug!(order_id, "paper cancel acknowledged");
        self.emit(ExecutionEvent::Cancelled { order_id: order_id.to_string() }).await
    }
}
