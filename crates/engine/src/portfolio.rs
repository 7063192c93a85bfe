use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

/// Account-level equity tracking shared by all strategy controllers.
///
/// The portfolio is the single owner of equity state; controllers hold
/// cloneable handles and report realized PnL through them. Equity here is
/// closed-trade equity: initial deposit plus cumulative realized PnL.
#[derive(Debug)]
pub struct Portfolio {
    shared: Arc<RwLock<State>>,
}

#[derive(Debug)]
struct State {
    initial_equity: f64,
    realized_pnl: f64,
    per_pair: HashMap<String, f64>,
}

/// Read/report handle held by each strategy controller.
#[derive(Debug, Clone)]
pub struct PortfolioHandle {
    shared: Arc<RwLock<State>>,
}

/// Point-in-time view used for sizing decisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioSnapshot {
    pub equity: f64,
    pub realized_pnl: f64,
}

impl Portfolio {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            shared: Arc::new(RwLock::new(State {
                initial_equity,
                realized_pnl: 0.0,
                per_pair: HashMap::new(),
            })),
        }
    }

    pub fn handle(&self) -> PortfolioHandle {
        PortfolioHandle { shared: Arc::clone(&self.shared) }
    }

    pub async fn snapshot(&self) -> PortfolioSnapshot {
        snapshot(&self.shared).await
    }
}

impl PortfolioHandle {
    pub async fn snapshot(&self) -> PortfolioSnapshot {
        snapshot(&self.shared).await
    }

    /// Record realized PnL from a closed (or partially closed) position.
    pub async fn report_realized(&self, pair: &str, pnl: f64) {
        let mut state = self.shared.write().await;
        state.realized_pnl += pnl;
        *state.per_pair.entry(pair.to_string()).or_insert(0.0) += pnl;
        info!(
            pair,
            pnl,
            total = state.realized_pnl,
            equity = state.initial_equity + state.realized_pnl,
            "realized pnl booked"
        );
    }
}

async fn snapshot(shared: &Arc<RwLock<State>>) -> PortfolioSnapshot {
    let state = shared.read().await;
    PortfolioSnapshot {
        equity: state.initial_equity + state.realized_pnl,
        realized_pnl: state.realized_pnl,
    }
}
