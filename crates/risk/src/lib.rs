pub mod config;
pub mod manager;

pub use config::{
    BreakEvenConfig, MartingaleConfig, RiskConfig, RiskConfigError, StepMode, TrailingConfig,
};
pub use manager::{ExitReason, ProtectiveLevels, RiskAction, RiskManager};
