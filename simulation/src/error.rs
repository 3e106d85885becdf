//! Simulation errors

use thiserror::Error;

use vanet_strategy::StrategyError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid simulation config: {0:?}")]
    InvalidConfig(Vec<String>),

    #[error("strategy construction failed: {0}")]
    Strategy(#[from] StrategyError),

    #[error("invalid name: {0}")]
    Name(#[from] vanet_core::CoreError),
}

pub type SimResult<T> = Result<T, SimError>;
