//! # Vanet Strategy
//!
//! NDN forwarding strategies for vehicular ad-hoc networks.
//!
//! Every strategy variant is one [`StrategyConfig`] preset driving the same
//! [`StrategyEngine`]. The engine plugs into a host forwarder through the
//! [`vanet_core::ForwardingStrategy`] trait.
//!
//! ## Features
//!
//! - **Link-quality model**: Link expiration time, availability probability,
//!   road alignment and local density from node kinematics.
//!
//! - **Multi-criteria selection**: TOPSIS ranking plus weighted and
//!   normalized-sum policies over per-hop metrics.
//!
//! - **Deferred-broadcast suppression**: Listen before retransmitting and
//!   cancel when an overheard copy already covers the area.
//!
//! - **Content discovery**: Flood once, then build and maintain a unicast
//!   path from requester to provider.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vanet_core::NodeId;
//! use vanet_strategy::{StrategyConfig, StrategyEngine};
//!
//! // By preset
//! let engine = StrategyEngine::new(NodeId(0), StrategyConfig::dasb())?;
//!
//! // By instance name
//! let engine = StrategyEngine::from_name(NodeId(1), "/localhost/nfd/strategy/MINE2/%FD%01")?;
//! ```
//!
//! ## Architecture
//!
//! - [`link_model`]: LET, LAP, alignment and density
//! - [`addressing`]: Legacy affine face numbering
//! - [`selector`]: TOPSIS and linear-sum rankings
//! - [`measurements`]: Per-prefix, per-face RTT and satisfaction ratio
//! - [`suppression`]: Wait tables, defer formulas, suppression tests
//! - [`discovery`]: Provider table, path record and path building
//! - [`policy`]: Next-hop choice for each selection policy
//! - [`config`]: Presets and validation
//! - [`engine`]: The strategy itself
//! - [`name`]: Strategy instance names and versions

pub mod addressing;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod link_model;
pub mod measurements;
pub mod name;
pub mod policy;
pub mod selector;
pub mod suppression;

// Re-export main types
pub use addressing::LegacyAddressing;
pub use config::{
    ConfigWarning, DataForwarding, DiscoveryConfig, LinkSettings, MeasurementConfig,
    SelectionPolicy, StrategyConfig, SuppressionConfig,
};
pub use discovery::{
    PathBuilder, PathOutcome, PathRecord, ProviderPruning, ProviderRecord, ProviderTable,
    RouteCost, ScoreWeights, build_path, refresh_routes,
};
pub use engine::{StrategyEngine, StrategyStats, TimerAction};
pub use error::{StrategyError, StrategyResult};
pub use link_model::{DensityMode, LetMode, LinkModel};
pub use measurements::{FaceInfo, LinkMetrics, MeasurementTable, RttEstimator};
pub use name::{StrategyKind, StrategyName};
pub use selector::{Candidate, Criterion, Topsis};
pub use suppression::{DeferFormula, SuppressionTest, WaitEntry, WaitKey, WaitState, WaitTable};
