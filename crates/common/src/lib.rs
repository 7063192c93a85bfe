pub mod config;
pub mod error;
pub mod gateway;
pub mod instrument;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use gateway::OrderGateway;
pub use instrument::InstrumentInfo;
pub use types::*;
