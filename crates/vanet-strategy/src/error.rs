//! Strategy construction errors
//!
//! Per-packet decisions never fail; they resolve to forward, defer, drop or
//! a fallback route. Only building a strategy instance can go wrong.

use thiserror::Error;

use crate::config::ConfigWarning;

/// Errors raised while instantiating a strategy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    /// Strategy name does not follow `/localhost/nfd/strategy/<KIND>`
    #[error("Invalid strategy name: {0}")]
    InvalidName(String),

    /// No strategy registered under this kind
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Requested version is not implemented
    #[error("{strategy} does not support version {version}")]
    UnsupportedVersion { strategy: String, version: u64 },

    /// Instance name carried parameters
    #[error("{0} does not accept parameters")]
    ParametersNotAccepted(String),

    /// Configuration failed validation
    #[error("Invalid strategy configuration: {}", join_warnings(.0))]
    InvalidConfig(Vec<ConfigWarning>),
}

fn join_warnings(warnings: &[ConfigWarning]) -> String {
    warnings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for strategy construction
pub type StrategyResult<T> = Result<T, StrategyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StrategyError::UnsupportedVersion {
            strategy: "DASB".to_string(),
            version: 2,
        };
        assert_eq!(err.to_string(), "DASB does not support version 2");

        let err = StrategyError::InvalidConfig(vec![
            ConfigWarning::NonPositiveRadioRange,
            ConfigWarning::ZeroMeasurementTtl,
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid strategy configuration: radio_range must be positive, measurement ttl is zero"
        );
    }
}
