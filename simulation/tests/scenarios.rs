//! End-to-end runs of the reference scenarios

use std::str::FromStr;

use vanet_core::{Name, NodeId};
use vanet_simulation::{PacketKind, SimConfig, SimReport, World, scenarios};
use vanet_strategy::{LegacyAddressing, StrategyKind};

fn hops(report: &SimReport, kind: PacketKind) -> Vec<(u32, u32)> {
    report
        .transmissions
        .iter()
        .filter(|t| t.kind == kind)
        .filter_map(|t| t.toward.map(|peer| (t.node.0, peer.0)))
        .collect()
}

#[test]
fn test_scenario_a_static_chain() {
    let report = scenarios::run_scenario_a().unwrap();

    assert_eq!(hops(&report, PacketKind::Interest), vec![(0, 1), (1, 2)]);
    assert_eq!(hops(&report, PacketKind::Data), vec![(2, 1), (1, 0)]);
    assert_eq!(report.stats.requests_expressed, 1);
    assert_eq!(report.stats.requests_satisfied, 1);
    assert_eq!(report.stats.interests_deferred, 0);
    assert!(report.mean_delay_secs.is_some());
}

#[test]
fn test_scenario_b_discovery_and_path() {
    let report = scenarios::run_scenario_b().unwrap();
    let addressing = LegacyAddressing::new(4);
    let prefix = Name::from_str("/ustc").unwrap();

    for (node, peer) in [(2, 3), (1, 2), (0, 1)] {
        let face = addressing.face_toward(NodeId(node), NodeId(peer));
        assert!(
            report.routes.iter().any(|r| r.node == NodeId(node)
                && r.prefix == prefix
                && r.face == face
                && r.cost == 1_000_000),
            "missing fallback route on node {node}"
        );
    }

    // Path building from the requester: 0 -> 1 -> 2, then the final hop 2 -> 3
    let config = SimConfig::scenario_b();
    let builder = config.strategy_config().path_builder();
    let nodes: Vec<_> = (0..4).map(|i| config.initial_kinematics(NodeId(i))).collect();
    for (node, next) in [(0, 1), (1, 2)] {
        let face = addressing.face_toward(NodeId(node), NodeId(next));
        let score = builder.score(&nodes, NodeId(next), NodeId(node), NodeId(3));
        let cost = builder.relay_cost.cost(score);
        assert!(cost > 0);
        assert!(
            report.routes.iter().any(|r| r.node == NodeId(node)
                && r.prefix == prefix
                && r.face == face
                && r.cost == cost),
            "missing relay route on node {node} with cost {cost}"
        );
    }

    assert_eq!(report.providers.len(), 4);
    for known in &report.providers {
        assert!(
            known.providers.contains(&NodeId(3)),
            "node {} never learned the provider",
            known.node
        );
    }

    assert!(report.stats.requests_satisfied >= 1);
    assert!(report.strategy_stats.discoveries_completed >= 1);
}

#[test]
fn test_scenario_c_distance_scaled_deferral() {
    let report = scenarios::run_scenario_c().unwrap();
    let link_delay = SimConfig::scenario_c().link_delay;

    let measured =
        scenarios::interest_deferral(&report, NodeId(0), NodeId(1), link_delay).unwrap();
    let expected = scenarios::scenario_c_expected_delay().as_secs_f64();
    assert!(
        (measured - expected).abs() < 1e-6,
        "deferral {measured} != {expected}"
    );
    assert!((measured - 0.0005).abs() < 1e-6);

    assert_eq!(report.stats.interests_deferred, 1);
    assert_eq!(report.stats.requests_satisfied, 1);
}

#[test]
fn test_highway_runs_for_every_family() {
    for kind in [
        StrategyKind::Dasb,
        StrategyKind::Lisic,
        StrategyKind::Mine2,
    ] {
        let config = SimConfig {
            duration: std::time::Duration::from_secs(3),
            ..SimConfig::highway(kind, 6)
        };
        let mut world = World::new(config).unwrap();
        world.run();

        let report = world.report("highway");
        assert_eq!(report.node_count, 6);
        assert!(report.stats.requests_expressed > 0);
        assert!(report.stats.interests_sent > 0);
    }
}

#[test]
fn test_report_serializes_to_json() {
    let report = scenarios::run_scenario_a().unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["scenario"], "A");
    assert_eq!(json["stats"]["requests_satisfied"], 1);
    assert!(json["transmissions"].as_array().is_some_and(|t| !t.is_empty()));
}
