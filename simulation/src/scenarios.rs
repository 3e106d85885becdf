//! Pre-defined simulation scenarios
//!
//! - **A**: three parked nodes, static routes, point-to-point faces
//! - **B**: discovery and path building over a four-node chain
//! - **C**: a single distance-scaled deferral on a broadcast medium

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use vanet_core::NodeId;
use vanet_strategy::DeferFormula;

use crate::config::SimConfig;
use crate::error::SimResult;
use crate::stats::{PacketKind, SimReport};
use crate::world::World;

/// Build a world from `config`, run it to completion and report
pub fn run(label: &str, config: SimConfig) -> SimResult<SimReport> {
    info!(scenario = label, strategy = %config.strategy, "=== Running scenario ===");
    let mut world = World::new(config)?;
    world.run();
    Ok(world.report(label))
}

/// Scenario A: node 0 fetches from node 2 through node 1
///
/// ```text
/// [0] --80m-- [1] --80m-- [2]
/// consumer    relay       producer
/// ```
pub fn run_scenario_a() -> SimResult<SimReport> {
    run("A", SimConfig::scenario_a())
}

/// Scenario B: the consumer discovers the producer across a chain
///
/// ```text
/// [0] --80m-- [1] --80m-- [2] --80m-- [3]
/// requester                           provider
/// ```
///
/// Discovery Data installs fallback routes at 2, 1 and 0 on its way back.
/// The requester then builds a path toward 3 and every node learns the
/// provider.
pub fn run_scenario_b() -> SimResult<SimReport> {
    run("B", SimConfig::scenario_b())
}

/// Scenario C: the relay 150 m from the sender waits before rebroadcasting
///
/// ```text
/// [0] --150m-- [1] --150m-- [2]      Rth = 200 m, Tmax = 2 ms
/// ```
pub fn run_scenario_c() -> SimResult<SimReport> {
    run("C", SimConfig::scenario_c())
}

/// Deferral the distance-scaled formula gives for scenario C
pub fn scenario_c_expected_delay() -> Duration {
    let config = SimConfig::scenario_c();
    let formula = DeferFormula::DistanceScaled {
        max_defer: Duration::from_millis(2),
    };
    // The formula draws no jitter
    let mut rng = StdRng::seed_from_u64(0);
    formula.delay(config.spacing, 0.0, config.effective_range(), &mut rng)
}

/// Time `relay` held the first Interest `upstream` sent, in seconds
pub fn interest_deferral(
    report: &SimReport,
    upstream: NodeId,
    relay: NodeId,
    link_delay: Duration,
) -> Option<f64> {
    let first_send = |node: NodeId| {
        report
            .transmissions
            .iter()
            .find(|t| t.node == node && t.kind == PacketKind::Interest && t.toward.is_some())
            .map(|t| t.time)
    };
    let sent = first_send(upstream)?;
    let relayed = first_send(relay)?;
    Some(relayed - sent - link_delay.as_secs_f64())
}
