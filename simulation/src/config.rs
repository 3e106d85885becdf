//! Simulation configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use vanet_core::{Kinematics, NodeId, Vec3};
use vanet_strategy::{StrategyConfig, StrategyKind};

/// How FIBs are populated before the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteSetup {
    /// Every node routes the content prefix one hop toward the producer
    Chain,
    /// Every node routes `/` to all relay faces and discovers providers
    Root,
}

/// Configuration for the simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub strategy: StrategyKind,
    /// Overrides the preset radio range for the strategy and the radio
    pub radio_range: Option<f64>,
    pub node_count: usize,
    /// Initial gap between neighbors on the road, in metres
    pub spacing: f64,
    /// Mean speed along the road, in m/s
    pub speed: f64,
    /// Speed difference between neighboring vehicles, in m/s
    pub speed_spread: f64,
    pub duration: Duration,
    /// One-hop transmission delay
    pub link_delay: Duration,
    /// A broadcast face reaches every node in range
    pub broadcast_faces: bool,
    pub routes: RouteSetup,
    pub consumer: NodeId,
    pub producer: NodeId,
    pub prefix: String,
    /// Interests per second sent by the consumer
    pub request_rate: f64,
    /// Stop the consumer after this many requests
    pub max_requests: Option<u64>,
    pub interest_lifetime: Duration,
    pub payload_size: usize,
    pub content_store: bool,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Dasb,
            radio_range: None,
            node_count: 5,
            spacing: 80.0,
            speed: 20.0,
            speed_spread: 1.0,
            duration: Duration::from_secs(10),
            link_delay: Duration::from_micros(100),
            broadcast_faces: true,
            routes: RouteSetup::Chain,
            consumer: NodeId(0),
            producer: NodeId(4),
            prefix: "/ustc".to_string(),
            request_rate: 2.0,
            max_requests: None,
            interest_lifetime: Duration::from_secs(2),
            payload_size: 1024,
            content_store: false,
            seed: 1,
        }
    }
}

impl SimConfig {
    /// A road of `node_count` vehicles running `strategy`, consumer at the
    /// head and producer at the tail
    pub fn highway(strategy: StrategyKind, node_count: usize) -> Self {
        let last = node_count.saturating_sub(1) as u32;
        Self {
            strategy,
            node_count,
            producer: NodeId(last),
            routes: if strategy.uses_discovery() {
                RouteSetup::Root
            } else {
                RouteSetup::Chain
            },
            broadcast_faces: !strategy.uses_discovery(),
            ..Default::default()
        }
    }

    /// Scenario A: three parked nodes, static one-hop routes
    pub fn scenario_a() -> Self {
        Self {
            strategy: StrategyKind::Dasb,
            radio_range: Some(100.0),
            node_count: 3,
            spacing: 80.0,
            speed: 0.0,
            speed_spread: 0.0,
            duration: Duration::from_secs(1),
            broadcast_faces: false,
            routes: RouteSetup::Chain,
            producer: NodeId(2),
            max_requests: Some(1),
            ..Default::default()
        }
    }

    /// Scenario B: discovery over a four-node chain
    pub fn scenario_b() -> Self {
        Self {
            strategy: StrategyKind::Mine2,
            radio_range: Some(100.0),
            node_count: 4,
            spacing: 80.0,
            speed: 0.0,
            speed_spread: 0.0,
            duration: Duration::from_secs(3),
            broadcast_faces: false,
            routes: RouteSetup::Root,
            producer: NodeId(3),
            max_requests: Some(3),
            ..Default::default()
        }
    }

    /// Scenario C: one deferred rebroadcast at 150 m with `Rth = 200`
    pub fn scenario_c() -> Self {
        Self {
            strategy: StrategyKind::Dasb,
            radio_range: Some(200.0),
            node_count: 3,
            spacing: 150.0,
            speed: 0.0,
            speed_spread: 0.0,
            duration: Duration::from_secs(1),
            broadcast_faces: true,
            routes: RouteSetup::Chain,
            producer: NodeId(2),
            max_requests: Some(1),
            ..Default::default()
        }
    }

    /// Strategy preset with the radio range override applied
    pub fn strategy_config(&self) -> StrategyConfig {
        let config = StrategyConfig::for_kind(self.strategy);
        match self.radio_range {
            Some(range) => config.with_radio_range(range),
            None => config,
        }
    }

    /// Radio range used for delivery
    pub fn effective_range(&self) -> f64 {
        self.strategy_config().radio_range
    }

    /// Starting kinematics of `node`
    pub fn initial_kinematics(&self, node: NodeId) -> Kinematics {
        let i = node.0 as f64;
        let offset = (node.0 % 3) as f64 - 1.0;
        let speed = self.speed + offset * self.speed_spread;
        Kinematics::new(Vec3::planar(i * self.spacing, 0.0), Vec3::planar(speed, 0.0))
    }

    /// Check the configuration for problems
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.node_count < 2 {
            warnings.push(format!("node_count {} leaves nobody to talk to", self.node_count));
        }
        if self.consumer.index() >= self.node_count {
            warnings.push(format!("consumer {} is not a node", self.consumer));
        }
        if self.producer.index() >= self.node_count {
            warnings.push(format!("producer {} is not a node", self.producer));
        }
        if self.consumer == self.producer {
            warnings.push("consumer and producer are the same node".to_string());
        }
        if !(self.spacing > 0.0) {
            warnings.push(format!("spacing {} must be positive", self.spacing));
        }
        if !(self.request_rate > 0.0) {
            warnings.push(format!("request_rate {} must be positive", self.request_rate));
        }
        if self.prefix.parse::<vanet_core::Name>().is_err() {
            warnings.push(format!("prefix {} is not a name", self.prefix));
        }
        for warning in self.strategy_config().validate() {
            warnings.push(format!("strategy: {warning:?}"));
        }

        warnings
    }

    /// Returns true if the configuration has no warnings
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SimConfig::default().is_valid());
        assert!(SimConfig::scenario_a().is_valid());
        assert!(SimConfig::scenario_b().is_valid());
        assert!(SimConfig::scenario_c().is_valid());
    }

    #[test]
    fn test_highway_picks_routes() {
        let config = SimConfig::highway(StrategyKind::Mine2, 6);
        assert_eq!(config.routes, RouteSetup::Root);
        assert!(!config.broadcast_faces);
        assert_eq!(config.producer, NodeId(5));

        let config = SimConfig::highway(StrategyKind::Lisic, 6);
        assert_eq!(config.routes, RouteSetup::Chain);
        assert!(config.broadcast_faces);
    }

    #[test]
    fn test_radio_range_override() {
        let config = SimConfig::scenario_c();
        assert_eq!(config.effective_range(), 200.0);
        assert_eq!(config.strategy_config().radio_range, 200.0);
    }

    #[test]
    fn test_validate_catches_bad_nodes() {
        let config = SimConfig {
            node_count: 2,
            producer: NodeId(7),
            ..Default::default()
        };
        assert!(!config.is_valid());

        let config = SimConfig {
            producer: NodeId(0),
            ..Default::default()
        };
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn test_initial_kinematics() {
        let config = SimConfig {
            speed: 20.0,
            speed_spread: 2.0,
            ..Default::default()
        };
        let k = config.initial_kinematics(NodeId(2));
        assert_eq!(k.position.x, 160.0);
        assert_eq!(k.velocity.x, 22.0);
    }
}
