//! Strategy Controller: per-instrument orchestration of the signal
//! detector, position ledger, and risk manager, plus the shared portfolio
//! and the TOML strategy configuration it is all wired from.

pub mod config;
pub mod controller;
pub mod portfolio;
pub mod sizing;

pub use config::{ConfigError, StrategyConfig, StrategyFileConfig};
pub use controller::StrategyController;
pub use portfolio::{Portfolio, PortfolioHandle, PortfolioSnapshot};
pub use sizing::{SizingError, SizingPolicy};
