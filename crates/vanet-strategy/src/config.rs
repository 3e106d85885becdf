//! Strategy configuration
//!
//! Every variant is one [`StrategyConfig`] preset; the engine reads only the
//! config, never the kind, when deciding what to do.

use std::f64::consts::{FRAC_PI_4, PI};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::{PathBuilder, ProviderPruning, RouteCost, ScoreWeights};
use crate::link_model::{DEFAULT_LAP_LAMBDA, DensityMode, LetMode, LinkModel, UNBOUNDED_LET};
use crate::measurements::DEFAULT_MEASUREMENT_TTL;
use crate::name::StrategyKind;
use crate::suppression::{DeferFormula, SuppressionTest};

/// Link-model settings other than the radio range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkSettings {
    pub let_mode: LetMode,
    /// Upper clamp for LET
    pub let_max: f64,
    pub lap_lambda: f64,
    /// Horizon `Δt` the availability probability is asked about
    pub lap_horizon: f64,
    pub density: DensityMode,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            let_mode: LetMode::Guarded,
            let_max: UNBOUNDED_LET,
            lap_lambda: DEFAULT_LAP_LAMBDA,
            lap_horizon: 2.0,
            density: DensityMode::Ratio,
        }
    }
}

/// How an Interest's next hop is chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SelectionPolicy {
    /// First FIB next hop that is eligible for the ingress face
    FirstEligible,
    /// Each receiver ranks the sender's forward neighbors and sends only if
    /// it ranks itself first
    ReceiverTopsis,
    /// Send only if the link to the sender lives at least `min_let` seconds
    LetThreshold { min_let: f64 },
    /// The consumer designates the farthest stable neighbor in each road
    /// direction and only designated nodes relay
    RoadDesignation { min_let: f64 },
    /// TOPSIS over along-road distance and measurements towards known
    /// content sources
    ContentAwareTopsis,
    /// Highest `α·LET + β·LAP`
    WeightedLinkSum { alpha: f64, beta: f64 },
    /// Highest sum of normalized LET, LAP, SRTT and SISR
    NormalizedSum,
}

/// Deferred-broadcast behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuppressionConfig {
    /// Delay formula; `None` sends without waiting
    pub defer: Option<DeferFormula>,
    pub test: SuppressionTest,
    /// Force-expire the PIT entry when a waiting send is cancelled
    pub expire_pending_on_suppress: bool,
    /// Return a NACK when no next hop is eligible
    pub nack_on_no_route: bool,
    /// Defer Data retransmissions as well as Interests
    pub defer_data: bool,
}

impl SuppressionConfig {
    /// Send immediately, never suppress
    pub fn immediate() -> Self {
        Self {
            defer: None,
            test: SuppressionTest::Always,
            expire_pending_on_suppress: false,
            nack_on_no_route: false,
            defer_data: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.defer.is_some()
    }
}

/// Content-discovery and path-building behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub weights: ScoreWeights,
    pub relay_cost: RouteCost,
    pub final_cost: RouteCost,
    /// Cost of the reverse route each hop installs as discovery Data passes
    pub fallback_cost: Option<u64>,
    /// Remember relays used towards each provider
    pub use_path_record: bool,
    /// Scale for improving routes from known providers on every Interest
    pub refresh_scale: Option<f64>,
    /// Every node learns every discovered provider
    pub global_provider_knowledge: bool,
    /// Keep the discovery PIT entry alive to collect more answers
    pub pending_extension: Option<Duration>,
    pub pruning: ProviderPruning,
}

impl DiscoveryConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            weights: ScoreWeights::default(),
            relay_cost: RouteCost::Fixed(1),
            final_cost: RouteCost::Fixed(1),
            fallback_cost: None,
            use_path_record: false,
            refresh_scale: None,
            global_provider_knowledge: false,
            pending_extension: None,
            pruning: ProviderPruning::Never,
        }
    }
}

/// Link measurement behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementConfig {
    pub enabled: bool,
    /// Sliding lifetime of face records
    pub ttl: Duration,
    /// Period of folding counters into SISR
    pub isr_refresh: Option<Duration>,
    /// Fold counters into SISR on every satisfied Interest
    pub isr_on_satisfy: bool,
}

impl MeasurementConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ttl: DEFAULT_MEASUREMENT_TTL,
            isr_refresh: None,
            isr_on_satisfy: false,
        }
    }

    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::disabled()
        }
    }
}

/// Where returning Data goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataForwarding {
    /// Oldest downstream face only
    FirstDownstream,
    /// Oldest downstream face, only if this node sent the Interest upstream
    FirstDownstreamIfForwarded,
    /// Every downstream face except the one the Data came from
    AllDownstream,
}

/// Full configuration of one strategy instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    /// Radio range `Rth` in metres
    pub radio_range: f64,
    pub link: LinkSettings,
    pub selection: SelectionPolicy,
    pub suppression: SuppressionConfig,
    pub discovery: DiscoveryConfig,
    pub measurements: MeasurementConfig,
    pub data_forwarding: DataForwarding,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::dasb()
    }
}

impl StrategyConfig {
    /// Preset for `kind`
    pub fn for_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Dasb => Self::dasb(),
            StrategyKind::Vndn => Self::vndn(),
            StrategyKind::Lisic => Self::lisic(),
            StrategyKind::Difs => Self::difs(),
            StrategyKind::Lsif => Self::lsif(),
            StrategyKind::Prfs => Self::prfs(),
            StrategyKind::Ccaf => Self::ccaf(),
            StrategyKind::Mine => Self::mine(),
            StrategyKind::Mine2 => Self::mine2(),
            StrategyKind::Mupf => Self::mupf(),
        }
    }

    fn base(kind: StrategyKind, radio_range: f64) -> Self {
        Self {
            kind,
            radio_range,
            link: LinkSettings::default(),
            selection: SelectionPolicy::FirstEligible,
            suppression: SuppressionConfig::immediate(),
            discovery: DiscoveryConfig::disabled(),
            measurements: MeasurementConfig::disabled(),
            data_forwarding: DataForwarding::FirstDownstream,
        }
    }

    /// Distance- and angle-based suppression broadcast
    pub fn dasb() -> Self {
        Self {
            suppression: SuppressionConfig {
                defer: Some(DeferFormula::DistanceScaled {
                    max_defer: Duration::from_millis(2),
                }),
                test: SuppressionTest::Angular {
                    threshold: FRAC_PI_4,
                },
                expire_pending_on_suppress: false,
                nack_on_no_route: true,
                defer_data: true,
            },
            ..Self::base(StrategyKind::Dasb, 500.0)
        }
    }

    /// Distance-deferred broadcast
    pub fn vndn() -> Self {
        Self {
            suppression: SuppressionConfig {
                defer: Some(DeferFormula::InverseDistance),
                ..SuppressionConfig::immediate()
            },
            ..Self::base(StrategyKind::Vndn, 500.0)
        }
    }

    /// LET-scaled deferred broadcast
    pub fn lisic() -> Self {
        Self {
            suppression: SuppressionConfig {
                defer: Some(DeferFormula::LinkLifetime {
                    alpha: 1e9,
                    propagation_speed: 1e8,
                    jitter: 0.1,
                }),
                expire_pending_on_suppress: true,
                ..SuppressionConfig::immediate()
            },
            data_forwarding: DataForwarding::FirstDownstreamIfForwarded,
            ..Self::base(StrategyKind::Lisic, 200.0)
        }
    }

    /// Receiver-side TOPSIS election
    pub fn difs() -> Self {
        Self {
            selection: SelectionPolicy::ReceiverTopsis,
            ..Self::base(StrategyKind::Difs, 200.0)
        }
    }

    /// Link-stability threshold forwarding
    pub fn lsif() -> Self {
        Self {
            selection: SelectionPolicy::LetThreshold { min_let: 10.0 },
            ..Self::base(StrategyKind::Lsif, 200.0)
        }
    }

    /// Road-direction relay designation
    pub fn prfs() -> Self {
        Self {
            selection: SelectionPolicy::RoadDesignation { min_let: 1.0 },
            ..Self::base(StrategyKind::Prfs, 200.0)
        }
    }

    /// Content-aware TOPSIS selection
    pub fn ccaf() -> Self {
        Self {
            selection: SelectionPolicy::ContentAwareTopsis,
            measurements: MeasurementConfig {
                isr_on_satisfy: true,
                ..MeasurementConfig::enabled()
            },
            data_forwarding: DataForwarding::AllDownstream,
            ..Self::base(StrategyKind::Ccaf, 200.0)
        }
    }

    /// Discovery with greedy path building
    pub fn mine() -> Self {
        Self {
            link: LinkSettings {
                let_mode: LetMode::Perturbed,
                ..LinkSettings::default()
            },
            selection: SelectionPolicy::WeightedLinkSum {
                alpha: 0.5,
                beta: 0.5,
            },
            discovery: DiscoveryConfig {
                enabled: true,
                relay_cost: RouteCost::Scaled { scale: 1000.0 },
                final_cost: RouteCost::Fixed(i32::MAX as u64),
                refresh_scale: Some(1000.0),
                global_provider_knowledge: true,
                pending_extension: Some(Duration::from_secs(5)),
                ..DiscoveryConfig::disabled()
            },
            data_forwarding: DataForwarding::AllDownstream,
            ..Self::base(StrategyKind::Mine, 100.0)
        }
    }

    /// Discovery with fallback routes and measurement-driven selection
    pub fn mine2() -> Self {
        Self {
            link: LinkSettings {
                let_max: 50.0,
                ..LinkSettings::default()
            },
            selection: SelectionPolicy::NormalizedSum,
            discovery: DiscoveryConfig {
                enabled: true,
                relay_cost: RouteCost::Scaled { scale: 1e6 },
                final_cost: RouteCost::Fixed(1_000_000),
                fallback_cost: Some(1_000_000),
                use_path_record: true,
                refresh_scale: Some(1e6),
                global_provider_knowledge: true,
                ..DiscoveryConfig::disabled()
            },
            measurements: MeasurementConfig {
                isr_refresh: Some(Duration::from_secs(1)),
                ..MeasurementConfig::enabled()
            },
            data_forwarding: DataForwarding::AllDownstream,
            ..Self::base(StrategyKind::Mine2, 200.0)
        }
    }

    /// Discovery with unit-cost path building
    pub fn mupf() -> Self {
        Self {
            link: LinkSettings {
                let_mode: LetMode::Perturbed,
                density: DensityMode::Count,
                ..LinkSettings::default()
            },
            selection: SelectionPolicy::WeightedLinkSum {
                alpha: 0.5,
                beta: 0.5,
            },
            discovery: DiscoveryConfig {
                enabled: true,
                pending_extension: Some(Duration::from_secs(5)),
                ..DiscoveryConfig::disabled()
            },
            data_forwarding: DataForwarding::AllDownstream,
            ..Self::base(StrategyKind::Mupf, 100.0)
        }
    }

    /// Override the radio range
    pub fn with_radio_range(mut self, radio_range: f64) -> Self {
        self.radio_range = radio_range;
        self
    }

    /// Override how an overheard duplicate is judged
    pub fn with_suppression_test(mut self, test: SuppressionTest) -> Self {
        self.suppression.test = test;
        self
    }

    /// Link model built from these settings
    pub fn link_model(&self) -> LinkModel {
        LinkModel {
            radio_range: self.radio_range,
            let_mode: self.link.let_mode,
            let_max: self.link.let_max,
            lap_lambda: self.link.lap_lambda,
            density: self.link.density,
        }
    }

    /// Path-building parameters built from these settings
    pub fn path_builder(&self) -> PathBuilder {
        PathBuilder {
            model: self.link_model(),
            weights: self.discovery.weights,
            relay_cost: self.discovery.relay_cost,
            final_cost: self.discovery.final_cost,
        }
    }

    /// Validate the configuration and return any warnings
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.radio_range.is_nan() || self.radio_range <= 0.0 {
            warnings.push(ConfigWarning::NonPositiveRadioRange);
        }

        if self.measurements.enabled && self.measurements.ttl.is_zero() {
            warnings.push(ConfigWarning::ZeroMeasurementTtl);
        }

        if let SuppressionTest::Angular { threshold } = self.suppression.test
            && !(0.0 < threshold && threshold <= PI)
        {
            warnings.push(ConfigWarning::SuppressionAngleOutOfRange);
        }

        if self.discovery.enabled && (self.discovery.weights.sum() - 1.0).abs() > 0.02 {
            warnings.push(ConfigWarning::ScoreWeightsNotNormalized);
        }

        if let SelectionPolicy::WeightedLinkSum { alpha, beta } = self.selection
            && (alpha + beta - 1.0).abs() > 0.02
        {
            warnings.push(ConfigWarning::SelectionWeightsNotNormalized);
        }

        if let SelectionPolicy::LetThreshold { min_let } | SelectionPolicy::RoadDesignation { min_let } =
            self.selection
            && min_let > self.link.let_max
        {
            warnings.push(ConfigWarning::LetThresholdAboveMax);
        }

        let non_positive = |scale: f64| scale.is_nan() || scale <= 0.0;
        let bad_scale = [self.discovery.relay_cost, self.discovery.final_cost]
            .iter()
            .any(|c| matches!(c, RouteCost::Scaled { scale } if non_positive(*scale)))
            || self.discovery.refresh_scale.is_some_and(non_positive);
        if self.discovery.enabled && bad_scale {
            warnings.push(ConfigWarning::NonPositiveCostScale);
        }

        warnings
    }

    /// Check if the configuration is valid
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Configuration warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigWarning {
    /// Radio range is zero, negative or NaN
    NonPositiveRadioRange,
    /// Measurement records would expire immediately
    ZeroMeasurementTtl,
    /// Angular threshold outside `(0, π]`
    SuppressionAngleOutOfRange,
    /// `μ + φ + ω` is not close to 1
    ScoreWeightsNotNormalized,
    /// `α + β` is not close to 1
    SelectionWeightsNotNormalized,
    /// LET threshold can never be met under the LET clamp
    LetThresholdAboveMax,
    /// A route-cost scale is zero or negative
    NonPositiveCostScale,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::NonPositiveRadioRange => write!(f, "radio_range must be positive"),
            ConfigWarning::ZeroMeasurementTtl => write!(f, "measurement ttl is zero"),
            ConfigWarning::SuppressionAngleOutOfRange => {
                write!(f, "suppression angle must be in (0, pi]")
            }
            ConfigWarning::ScoreWeightsNotNormalized => {
                write!(f, "path score weights should sum to 1")
            }
            ConfigWarning::SelectionWeightsNotNormalized => {
                write!(f, "selection weights should sum to 1")
            }
            ConfigWarning::LetThresholdAboveMax => {
                write!(f, "LET threshold exceeds the LET clamp")
            }
            ConfigWarning::NonPositiveCostScale => write!(f, "route cost scale must be positive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_valid() {
        for kind in StrategyKind::ALL {
            let config = StrategyConfig::for_kind(kind);
            assert_eq!(config.kind, kind);
            assert!(config.is_valid(), "{kind} preset: {:?}", config.validate());
        }
    }

    #[test]
    fn test_preset_constants() {
        assert_eq!(StrategyConfig::dasb().radio_range, 500.0);
        assert_eq!(StrategyConfig::vndn().radio_range, 500.0);
        assert_eq!(StrategyConfig::lisic().radio_range, 200.0);
        assert_eq!(StrategyConfig::mine().radio_range, 100.0);
        assert_eq!(StrategyConfig::mine2().link.let_max, 50.0);
        assert_eq!(StrategyConfig::mupf().link.density, DensityMode::Count);
        assert!(StrategyConfig::mupf().discovery.enabled);
        assert_eq!(
            StrategyConfig::mine2().measurements.isr_refresh,
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_discovery_only_on_discovery_kinds() {
        for kind in StrategyKind::ALL {
            assert_eq!(
                StrategyConfig::for_kind(kind).discovery.enabled,
                kind.uses_discovery()
            );
        }
    }

    #[test]
    fn test_validation_warnings() {
        let mut config = StrategyConfig::dasb();
        config.radio_range = 0.0;
        config.suppression.test = SuppressionTest::Angular { threshold: 4.0 };
        let warnings = config.validate();
        assert!(warnings.contains(&ConfigWarning::NonPositiveRadioRange));
        assert!(warnings.contains(&ConfigWarning::SuppressionAngleOutOfRange));
        assert!(!config.is_valid());
    }

    #[test]
    fn test_validation_nan_range() {
        let config = StrategyConfig::vndn().with_radio_range(f64::NAN);
        assert_eq!(config.validate(), vec![ConfigWarning::NonPositiveRadioRange]);
    }

    #[test]
    fn test_validation_weights_and_thresholds() {
        let mut config = StrategyConfig::mine();
        config.discovery.weights.mu = 0.9;
        config.selection = SelectionPolicy::WeightedLinkSum {
            alpha: 0.9,
            beta: 0.9,
        };
        let warnings = config.validate();
        assert!(warnings.contains(&ConfigWarning::ScoreWeightsNotNormalized));
        assert!(warnings.contains(&ConfigWarning::SelectionWeightsNotNormalized));

        let mut config = StrategyConfig::lsif();
        config.link.let_max = 5.0;
        assert_eq!(config.validate(), vec![ConfigWarning::LetThresholdAboveMax]);

        let mut config = StrategyConfig::ccaf();
        config.measurements.ttl = Duration::ZERO;
        assert_eq!(config.validate(), vec![ConfigWarning::ZeroMeasurementTtl]);
    }

    #[test]
    fn test_link_model_follows_settings() {
        let model = StrategyConfig::mine2().with_radio_range(100.0).link_model();
        assert_eq!(model.radio_range, 100.0);
        assert_eq!(model.let_max, 50.0);
        assert_eq!(model.let_mode, LetMode::Guarded);
    }
}
