use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use common::{Error, InstrumentInfo, Result, Timeframe};
use risk::{RiskConfig, RiskConfigError};
use signal::{build_detector, DetectorBuildError, DetectorConfig};

use crate::sizing::{SizingError, SizingPolicy};

/// Top-level strategy file: one `[[strategy]]` table per instrument.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

/// Everything one strategy controller needs, parsed from TOML at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub pair: String,
    pub primary_timeframe: Timeframe,
    pub instrument: InstrumentInfo,
    pub detector: DetectorConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    pub sizing: SizingPolicy,
}

/// Startup-time configuration faults. All of them abort the process before
/// any order can be placed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no strategies configured")]
    Empty,
    #[error("duplicate strategy name {0:?}")]
    DuplicateName(String),
    #[error("strategy {name:?}: pair must not be empty")]
    EmptyPair { name: String },
    #[error("strategy {name:?}: instrument pair {instrument:?} does not match strategy pair {pair:?}")]
    PairMismatch { name: String, pair: String, instrument: String },
    #[error("strategy {name:?}: detector: {source}")]
    Detector {
        name: String,
        #[source]
        source: DetectorBuildError,
    },
    #[error("strategy {name:?}: risk: {source}")]
    Risk {
        name: String,
        #[source]
        source: RiskConfigError,
    },
    #[error("strategy {name:?}: sizing: {source}")]
    Sizing {
        name: String,
        #[source]
        source: SizingError,
    },
}

impl StrategyFileConfig {
    /// Read and parse the strategy file. Validation is a separate step so
    /// the caller can report all faults at one place.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read strategy file {}: {e}", path.display()))
        })?;
        let config: StrategyFileConfig = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("strategy file {}: {e}", path.display())))?;
        info!(path = %path.display(), strategies = config.strategies.len(), "strategy file loaded");
        Ok(config)
    }

    /// Fail-fast validation of every strategy: detector parameters, risk
    /// distances, sizing parameters, and basic instrument sanity.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.strategies.is_empty() {
            return Err(ConfigError::Empty);
        }
        let mut names = HashSet::new();
        for strategy in &self.strategies {
            if !names.insert(strategy.name.as_str()) {
                return Err(ConfigError::DuplicateName(strategy.name.clone()));
            }
            strategy.validate()?;
        }
        Ok(())
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let name = self.name.clone();
        if self.pair.is_empty() {
            return Err(ConfigError::EmptyPair { name });
        }
        if self.instrument.pair != self.pair {
            return Err(ConfigError::PairMismatch {
                name,
                pair: self.pair.clone(),
                instrument: self.instrument.pair.clone(),
            });
        }
        // Dry-run the detector build; the controller repeats it at spawn.
        build_detector(&self.name, &self.detector)
            .map_err(|source| ConfigError::Detector { name: name.clone(), source })?;
        self.risk
            .validate()
            .map_err(|source| ConfigError::Risk { name: name.clone(), source })?;
        self.sizing
            .validate()
            .map_err(|source| ConfigError::Sizing { name, source })?;
        Ok(())
    }
}
