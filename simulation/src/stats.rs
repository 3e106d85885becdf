//! Run statistics and the serializable report

use std::time::Duration;

use serde::Serialize;

use vanet_core::{NodeId, RouteInstall};
use vanet_strategy::StrategyStats;

/// Counters collected by the world
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimStats {
    /// Interests put on the air
    pub interests_sent: u64,
    /// Interests heard by some node
    pub interests_received: u64,
    pub data_sent: u64,
    pub data_received: u64,
    /// Data handed to a consumer application
    pub data_delivered: u64,
    pub nacks_sent: u64,
    pub requests_expressed: u64,
    pub requests_satisfied: u64,
    pub requests_timed_out: u64,
    pub interests_deferred: u64,
    pub interests_suppressed: u64,
    pub interests_dropped: u64,
    /// Duplicate nonces seen by a node that already handled them
    pub loops_detected: u64,
    /// Data that matched no pending Interest
    pub unsolicited_data: u64,
    pub content_store_hits: u64,
    pub routes_installed: u64,
    /// Sum of request-to-Data delays, in seconds
    pub total_delay: f64,
}

impl SimStats {
    /// Mean request-to-Data delay
    pub fn mean_delay(&self) -> Option<Duration> {
        if self.requests_satisfied == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            self.total_delay / self.requests_satisfied as f64,
        ))
    }

    /// Fraction of expressed requests that were satisfied
    pub fn satisfaction_ratio(&self) -> f64 {
        if self.requests_expressed == 0 {
            return 0.0;
        }
        self.requests_satisfied as f64 / self.requests_expressed as f64
    }
}

/// One packet handed to the radio or an application
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transmission {
    /// Simulated time in seconds
    pub time: f64,
    pub node: NodeId,
    pub kind: PacketKind,
    pub name: String,
    /// Node the face points at; `None` for the application face
    pub toward: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PacketKind {
    Interest,
    Data,
    Nack,
}

/// Providers known to one node at the end of the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderKnowledge {
    pub node: NodeId,
    pub providers: Vec<NodeId>,
}

/// Everything a run produced, ready for printing or JSON
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub scenario: String,
    pub strategy: String,
    pub node_count: usize,
    pub duration_secs: f64,
    pub generated_at: String,
    pub stats: SimStats,
    pub mean_delay_secs: Option<f64>,
    pub strategy_stats: StrategyStats,
    pub routes: Vec<RouteInstall>,
    pub providers: Vec<ProviderKnowledge>,
    pub transmissions: Vec<Transmission>,
}

impl SimReport {
    /// Human-readable summary
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} | {} | {} nodes | {:.1} s\n",
            self.scenario, self.strategy, self.node_count, self.duration_secs
        ));
        out.push_str(&format!(
            "  requests: {} expressed, {} satisfied ({:.0}%), {} timed out\n",
            self.stats.requests_expressed,
            self.stats.requests_satisfied,
            self.stats.satisfaction_ratio() * 100.0,
            self.stats.requests_timed_out
        ));
        if let Some(delay) = self.mean_delay_secs {
            out.push_str(&format!("  mean delay: {:.3} ms\n", delay * 1000.0));
        }
        out.push_str(&format!(
            "  interests: {} sent, {} deferred, {} suppressed, {} dropped\n",
            self.stats.interests_sent,
            self.stats.interests_deferred,
            self.stats.interests_suppressed,
            self.stats.interests_dropped
        ));
        out.push_str(&format!(
            "  data: {} sent, {} delivered, {} unsolicited\n",
            self.stats.data_sent, self.stats.data_delivered, self.stats.unsolicited_data
        ));
        if !self.routes.is_empty() {
            out.push_str(&format!("  routes installed: {}\n", self.routes.len()));
            for route in &self.routes {
                out.push_str(&format!(
                    "    node {} {} -> face {} cost {}\n",
                    route.node, route.prefix, route.face, route.cost
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_delay() {
        let stats = SimStats {
            requests_satisfied: 4,
            total_delay: 0.02,
            ..Default::default()
        };
        let delay = stats.mean_delay().unwrap();
        assert!((delay.as_secs_f64() - 0.005).abs() < 1e-12);
        assert!(SimStats::default().mean_delay().is_none());
    }

    #[test]
    fn test_satisfaction_ratio() {
        let stats = SimStats {
            requests_expressed: 4,
            requests_satisfied: 3,
            ..Default::default()
        };
        assert_eq!(stats.satisfaction_ratio(), 0.75);
        assert_eq!(SimStats::default().satisfaction_ratio(), 0.0);
    }
}
