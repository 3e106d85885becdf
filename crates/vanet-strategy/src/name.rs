//! Strategy names and the registry of known variants
//!
//! Instance names follow the forwarder convention
//! `/localhost/nfd/strategy/<KIND>/%FD%01`, where the last component is a
//! version marker (`%FD` followed by the big-endian version bytes).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{StrategyError, StrategyResult};

/// Namespace every strategy name lives under
pub const STRATEGY_PREFIX: &str = "/localhost/nfd/strategy";

/// The only version implemented for every variant
pub const STRATEGY_VERSION: u64 = 1;

/// Registered strategy variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Distance- and angle-based suppression broadcast
    Dasb,
    /// Distance-deferred broadcast
    Vndn,
    /// LET-scaled deferred broadcast
    Lisic,
    /// Receiver-side TOPSIS forwarder election
    Difs,
    /// Link-stability Interest forwarding
    Lsif,
    /// Road-direction relay designation
    Prfs,
    /// Content-aware TOPSIS next-hop selection
    Ccaf,
    /// Discovery plus greedy path building
    Mine,
    /// Discovery with fallback routes and measurement-driven selection
    Mine2,
    /// Discovery with unit-cost path building
    Mupf,
}

impl StrategyKind {
    /// All registered variants
    pub const ALL: [StrategyKind; 10] = [
        StrategyKind::Dasb,
        StrategyKind::Vndn,
        StrategyKind::Lisic,
        StrategyKind::Difs,
        StrategyKind::Lsif,
        StrategyKind::Prfs,
        StrategyKind::Ccaf,
        StrategyKind::Mine,
        StrategyKind::Mine2,
        StrategyKind::Mupf,
    ];

    /// Name component used in the strategy name
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Dasb => "DASB",
            StrategyKind::Vndn => "VNDN",
            StrategyKind::Lisic => "LISIC",
            StrategyKind::Difs => "DIFS",
            StrategyKind::Lsif => "LSIF",
            StrategyKind::Prfs => "PRFS",
            StrategyKind::Ccaf => "CCAF",
            StrategyKind::Mine => "MINE",
            StrategyKind::Mine2 => "MINE2",
            StrategyKind::Mupf => "MUPF",
        }
    }

    /// Canonical instance name, e.g. `/localhost/nfd/strategy/DASB/%FD%01`
    pub fn canonical_name(&self) -> String {
        format!(
            "{}/{}/{}",
            STRATEGY_PREFIX,
            self.as_str(),
            encode_version(STRATEGY_VERSION)
        )
    }

    /// Check if this variant floods to discover content before building paths
    pub fn uses_discovery(&self) -> bool {
        matches!(
            self,
            StrategyKind::Mine | StrategyKind::Mine2 | StrategyKind::Mupf
        )
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| StrategyError::UnknownStrategy(s.to_string()))
    }
}

/// A parsed strategy instance name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyName {
    pub kind: StrategyKind,
    pub version: Option<u64>,
    pub parameters: Vec<String>,
}

impl StrategyName {
    /// Parse an instance name into kind, optional version and parameters
    pub fn parse(name: &str) -> StrategyResult<Self> {
        let rest = name
            .strip_prefix(STRATEGY_PREFIX)
            .ok_or_else(|| StrategyError::InvalidName(name.to_string()))?;
        let mut components = rest.split('/').filter(|c| !c.is_empty());

        let kind: StrategyKind = components
            .next()
            .ok_or_else(|| StrategyError::InvalidName(name.to_string()))?
            .parse()?;

        let mut version = None;
        let mut parameters = Vec::new();
        for (i, component) in components.enumerate() {
            if i == 0
                && let Some(v) = decode_version(component)
            {
                version = Some(v);
                continue;
            }
            parameters.push(component.to_string());
        }

        Ok(Self {
            kind,
            version,
            parameters,
        })
    }

    /// Check the instance name against what the variant implements
    ///
    /// Parameters are never accepted and the only known version is 1.
    pub fn validate(&self) -> StrategyResult<StrategyKind> {
        if !self.parameters.is_empty() {
            return Err(StrategyError::ParametersNotAccepted(
                self.kind.as_str().to_string(),
            ));
        }
        if let Some(version) = self.version
            && version != STRATEGY_VERSION
        {
            return Err(StrategyError::UnsupportedVersion {
                strategy: self.kind.as_str().to_string(),
                version,
            });
        }
        Ok(self.kind)
    }
}

/// Encode a version as a `%FD`-marked name component
pub fn encode_version(version: u64) -> String {
    let bytes = version.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut out = String::from("%FD");
    for b in &bytes[first..] {
        out.push_str(&format!("%{:02X}", b));
    }
    out
}

/// Decode a `%FD`-marked version component
pub fn decode_version(component: &str) -> Option<u64> {
    let hex = component.strip_prefix("%FD")?;
    if hex.is_empty() || hex.len() % 3 != 0 || hex.len() > 24 {
        return None;
    }
    let mut value: u64 = 0;
    for chunk in hex.as_bytes().chunks(3) {
        if chunk[0] != b'%' {
            return None;
        }
        let byte = std::str::from_utf8(&chunk[1..]).ok()?;
        value = (value << 8) | u64::from(u8::from_str_radix(byte, 16).ok()?);
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names() {
        assert_eq!(
            StrategyKind::Dasb.canonical_name(),
            "/localhost/nfd/strategy/DASB/%FD%01"
        );
        assert_eq!(
            StrategyKind::Mine2.canonical_name(),
            "/localhost/nfd/strategy/MINE2/%FD%01"
        );
    }

    #[test]
    fn test_parse_canonical_round_trips_kind() {
        for kind in StrategyKind::ALL {
            let parsed = StrategyName::parse(&kind.canonical_name()).unwrap();
            assert_eq!(parsed.kind, kind);
            assert_eq!(parsed.version, Some(1));
            assert_eq!(parsed.validate(), Ok(kind));
        }
    }

    #[test]
    fn test_parse_without_version() {
        let parsed = StrategyName::parse("/localhost/nfd/strategy/LSIF").unwrap();
        assert_eq!(parsed.version, None);
        assert_eq!(parsed.validate(), Ok(StrategyKind::Lsif));
    }

    #[test]
    fn test_rejects_unknown_kind() {
        assert_eq!(
            StrategyName::parse("/localhost/nfd/strategy/BEST/%FD%01"),
            Err(StrategyError::UnknownStrategy("BEST".to_string()))
        );
    }

    #[test]
    fn test_rejects_bad_prefix() {
        assert!(matches!(
            StrategyName::parse("/ustc/strategy/DASB"),
            Err(StrategyError::InvalidName(_))
        ));
    }

    #[test]
    fn test_rejects_other_versions() {
        let parsed = StrategyName::parse("/localhost/nfd/strategy/DIFS/%FD%02").unwrap();
        assert_eq!(
            parsed.validate(),
            Err(StrategyError::UnsupportedVersion {
                strategy: "DIFS".to_string(),
                version: 2
            })
        );
    }

    #[test]
    fn test_rejects_parameters() {
        let parsed =
            StrategyName::parse("/localhost/nfd/strategy/CCAF/%FD%01/fast").unwrap();
        assert_eq!(parsed.parameters, vec!["fast".to_string()]);
        assert_eq!(
            parsed.validate(),
            Err(StrategyError::ParametersNotAccepted("CCAF".to_string()))
        );
    }

    #[test]
    fn test_version_codec() {
        assert_eq!(encode_version(1), "%FD%01");
        assert_eq!(encode_version(0x0102), "%FD%01%02");
        assert_eq!(decode_version("%FD%01%02"), Some(0x0102));
        assert_eq!(decode_version("%FD"), None);
        assert_eq!(decode_version("fast"), None);
    }
}
