use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{Config, EngineEvent};
use engine::{Portfolio, StrategyController, StrategyFileConfig};
use paper::PaperGateway;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(strategy_file = %cfg.strategy_config_path, "StratBot starting");

    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)
        .unwrap_or_else(|e| panic!("Failed to load strategy config: {e}"));
    strategy_file
        .validate()
        .unwrap_or_else(|e| panic!("Invalid strategy config: {e}"));

    // ── Shared portfolio ──────────────────────────────────────────────────────
    let portfolio = Portfolio::new(cfg.initial_equity);

    // ── Per-strategy controllers ──────────────────────────────────────────────
    // Each strategy gets its own single-consumer event channel; the hosting
    // feed pushes bar closes into `event_tx` and the paper gateway pushes
    // execution confirmations into the same channel.
    let mut feeds: Vec<(String, mpsc::Sender<EngineEvent>, Arc<PaperGateway>)> = Vec::new();
    for strategy in strategy_file.strategies {
        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(256);
        let gateway = Arc::new(PaperGateway::new(cfg.paper_slippage_bps, event_tx.clone()));
        let controller =
            StrategyController::new(strategy.clone(), gateway.clone(), portfolio.handle())
                .unwrap_or_else(|e| panic!("Failed to build strategy {}: {e}", strategy.name));
        info!(strategy = %strategy.name, pair = %strategy.pair, "spawning controller");
        tokio::spawn(controller.run(event_rx));
        feeds.push((strategy.pair, event_tx, gateway));
    }
    info!(strategies = feeds.len(), "all controllers started, waiting for shutdown signal");

    // Keep the event senders alive until shutdown so idle controllers do not
    // see their channels close.
    tokio::signal::ctrl_c().await.expect("ctrl-c handler");
    info!("Shutdown signal received. Exiting.");
    drop(feeds);
}
