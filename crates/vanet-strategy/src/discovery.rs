//! Content discovery and unicast path building
//!
//! After a discovery flood returns, the requester knows which node provides
//! the content. [`build_path`] then walks greedily from the requester towards
//! the provider, at each step picking the best-scoring intermediate node and
//! installing a FIB route towards it, until the provider is in direct range.
//!
//! Scores combine three factors with weights `μ, φ, ω`:
//!
//! - log distance progress towards the provider
//! - alignment of the candidate's heading with the path axis
//! - local density around the candidate
//!
//! [`refresh_routes`] reuses the same score to improve routes whenever a
//! request for an already-routed prefix passes through.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use vanet_core::{FibMatch, ForwardingContext, Kinematics, Name, NodeId};

use crate::link_model::{LinkModel, distance_progress, is_intermediate, road_alignment};

/// Weights of the path-building score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Distance progress
    pub mu: f64,
    /// Road alignment
    pub phi: f64,
    /// Density
    pub omega: f64,
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.mu + self.phi + self.omega
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            mu: 0.33,
            phi: 0.33,
            omega: 0.33,
        }
    }
}

/// How a route cost is derived from a relay score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RouteCost {
    /// `score · scale`, negative scores clamped to zero
    Scaled { scale: f64 },
    /// Same cost whatever the score
    Fixed(u64),
}

impl RouteCost {
    pub fn cost(&self, score: f64) -> u64 {
        match *self {
            RouteCost::Scaled { scale } => {
                let cost = score * scale;
                if cost.is_nan() || cost <= 0.0 {
                    0
                } else {
                    // Saturating float-to-int cast
                    cost as u64
                }
            }
            RouteCost::Fixed(cost) => cost,
        }
    }
}

/// Expiry policy for provider and path knowledge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProviderPruning {
    /// Knowledge persists for the whole run
    #[default]
    Never,
    /// Forget records older than the given age
    MaxAge(Duration),
}

impl ProviderPruning {
    fn keeps(&self, recorded_at: Duration, now: Duration) -> bool {
        match self {
            ProviderPruning::Never => true,
            ProviderPruning::MaxAge(age) => now.saturating_sub(recorded_at) <= *age,
        }
    }
}

/// A node known to provide content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub node: NodeId,
    /// When discovery last reported this provider
    pub discovered_at: Duration,
    /// Number of discovery rounds that reported it
    pub reports: u32,
}

/// Content-provider table
///
/// Shared behind an `Arc` when every node learns every provider, otherwise
/// owned by one engine.
#[derive(Debug, Default)]
pub struct ProviderTable {
    providers: DashMap<NodeId, ProviderRecord>,
}

impl ProviderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a provider reported by a finished discovery
    ///
    /// Returns true if the provider was not known before.
    pub fn record(&self, node: NodeId, now: Duration) -> bool {
        let mut is_new = false;
        self.providers
            .entry(node)
            .and_modify(|r| {
                r.discovered_at = now;
                r.reports += 1;
            })
            .or_insert_with(|| {
                is_new = true;
                ProviderRecord {
                    node,
                    discovered_at: now,
                    reports: 1,
                }
            });
        is_new
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.providers.contains_key(&node)
    }

    pub fn get(&self, node: NodeId) -> Option<ProviderRecord> {
        self.providers.get(&node).map(|r| *r)
    }

    /// Known providers in ascending node order
    pub fn providers(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.providers.iter().map(|r| *r.key()).collect();
        nodes.sort();
        nodes
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Drop providers the policy no longer keeps
    ///
    /// Returns the number of providers removed.
    pub fn prune(&self, policy: ProviderPruning, now: Duration) -> usize {
        let before = self.providers.len();
        self.providers
            .retain(|_, record| policy.keeps(record.discovered_at, now));
        let removed = before - self.providers.len();

        if removed > 0 {
            tracing::debug!(
                removed,
                remaining = self.providers.len(),
                "Pruned stale providers"
            );
        }

        removed
    }
}

/// Relays already used on the path towards each provider
#[derive(Debug, Clone, Default)]
pub struct PathRecord {
    paths: HashMap<NodeId, (Duration, BTreeSet<NodeId>)>,
}

impl PathRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `relay` as used towards `provider`
    pub fn mark(&mut self, provider: NodeId, relay: NodeId, now: Duration) {
        let (updated, used) = self
            .paths
            .entry(provider)
            .or_insert_with(|| (now, BTreeSet::new()));
        *updated = now;
        used.insert(relay);
    }

    pub fn is_used(&self, provider: NodeId, relay: NodeId) -> bool {
        self.paths
            .get(&provider)
            .is_some_and(|(_, used)| used.contains(&relay))
    }

    /// Relays used towards `provider`, ascending
    pub fn used(&self, provider: NodeId) -> Vec<NodeId> {
        self.paths
            .get(&provider)
            .map(|(_, used)| used.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Drop paths the policy no longer keeps
    pub fn prune(&mut self, policy: ProviderPruning, now: Duration) -> usize {
        let before = self.paths.len();
        self.paths
            .retain(|_, (updated, _)| policy.keeps(*updated, now));
        before - self.paths.len()
    }
}

/// Parameters of one path-building run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathBuilder {
    pub model: LinkModel,
    pub weights: ScoreWeights,
    /// Cost of routes towards intermediate relays
    pub relay_cost: RouteCost,
    /// Cost of the last route into the provider
    pub final_cost: RouteCost,
}

/// How a path-building run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathOutcome {
    /// The provider was reached; `relays` lists intermediate nodes in order
    Complete { relays: Vec<NodeId> },
    /// No intermediate node was found after `relays`
    DeadEnd { relays: Vec<NodeId> },
}

impl PathOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, PathOutcome::Complete { .. })
    }

    pub fn relays(&self) -> &[NodeId] {
        match self {
            PathOutcome::Complete { relays } | PathOutcome::DeadEnd { relays } => relays,
        }
    }
}

/// A scored intermediate node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRelay {
    pub node: NodeId,
    pub score: f64,
}

/// Snapshot of every node's kinematics, indexed by node id
pub fn snapshot(ctx: &dyn ForwardingContext) -> Vec<Kinematics> {
    (0..ctx.node_count())
        .map(|i| {
            u32::try_from(i)
                .ok()
                .and_then(|id| ctx.kinematics(NodeId(id)))
                .unwrap_or_default()
        })
        .collect()
}

impl PathBuilder {
    /// Score of `candidate` as the next relay from `relay` towards `provider`
    pub fn score(&self, nodes: &[Kinematics], candidate: NodeId, relay: NodeId, provider: NodeId) -> f64 {
        let (Some(j), Some(s), Some(d)) = (
            nodes.get(candidate.index()),
            nodes.get(relay.index()),
            nodes.get(provider.index()),
        ) else {
            return 0.0;
        };
        self.weights.mu * distance_progress(j, s, d)
            + self.weights.phi * road_alignment(j, s, d)
            + self.weights.omega * self.model.density(candidate.index(), nodes)
    }

    /// Intermediate nodes between `relay` and `provider`, with scores
    ///
    /// The relay and provider themselves never qualify, nor does any node
    /// for which `exclude` returns true.
    pub fn candidates(
        &self,
        nodes: &[Kinematics],
        relay: NodeId,
        provider: NodeId,
        exclude: impl Fn(NodeId) -> bool,
    ) -> Vec<ScoredRelay> {
        let (Some(s), Some(d)) = (nodes.get(relay.index()), nodes.get(provider.index())) else {
            return Vec::new();
        };
        nodes
            .iter()
            .enumerate()
            .filter_map(|(i, k)| u32::try_from(i).ok().map(|id| (NodeId(id), k)))
            .filter(|(node, _)| *node != relay && *node != provider && !exclude(*node))
            .filter(|(_, k)| is_intermediate(k, s, d, self.model.radio_range))
            .map(|(node, _)| ScoredRelay {
                node,
                score: self.score(nodes, node, relay, provider),
            })
            .collect()
    }
}

/// Highest-scoring relay, first on ties
fn best(candidates: &[ScoredRelay]) -> Option<ScoredRelay> {
    candidates.iter().fold(None, |best: Option<ScoredRelay>, c| match best {
        Some(b) if c.score <= b.score => Some(b),
        _ => Some(*c),
    })
}

/// Build a unicast path from `requester` to `provider` for `prefix`
///
/// Each step installs one route on the current relay. The walk is bounded
/// by the node count, so a walk that revisits nodes still terminates. When
/// `path` is given, relays it already holds are skipped and every chosen
/// relay is added to it.
pub fn build_path(
    ctx: &mut dyn ForwardingContext,
    builder: &PathBuilder,
    prefix: &Name,
    requester: NodeId,
    provider: NodeId,
    mut path: Option<&mut PathRecord>,
) -> PathOutcome {
    let nodes = snapshot(ctx);
    let now = ctx.now();
    let mut relays = Vec::new();
    let mut current = requester;

    if let Some(path) = path.as_deref_mut() {
        path.mark(provider, requester, now);
    }

    for _ in 0..nodes.len().max(1) {
        let (Some(here), Some(target)) = (nodes.get(current.index()), nodes.get(provider.index()))
        else {
            break;
        };

        if builder.model.in_range(here, target) {
            match ctx.face_between(current, provider) {
                Some(face) => {
                    let cost = builder.final_cost.cost(0.0);
                    ctx.install_route(current, prefix, face, cost);
                    tracing::debug!(
                        node = %current,
                        %prefix,
                        face = %face,
                        cost,
                        "Installed final route to provider"
                    );
                    return PathOutcome::Complete { relays };
                }
                None => break,
            }
        }

        let record = path.as_deref();
        let candidates = builder.candidates(&nodes, current, provider, |n| {
            relays.contains(&n) || n == requester || record.is_some_and(|p| p.is_used(provider, n))
        });
        let Some(next) = best(&candidates) else {
            break;
        };
        let Some(face) = ctx.face_between(current, next.node) else {
            break;
        };

        let cost = builder.relay_cost.cost(next.score);
        ctx.install_route(current, prefix, face, cost);
        tracing::debug!(
            node = %current,
            next = %next.node,
            %prefix,
            face = %face,
            score = next.score,
            cost,
            "Installed relay route"
        );

        if let Some(path) = path.as_deref_mut() {
            path.mark(provider, next.node, now);
        }
        relays.push(next.node);
        current = next.node;
    }

    tracing::warn!(
        requester = %requester,
        provider = %provider,
        stuck_at = %current,
        hops = relays.len(),
        "Path building reached a dead end"
    );
    PathOutcome::DeadEnd { relays }
}

/// Improve routes for `prefix` on `local` towards every known provider
///
/// A candidate whose score beats the cheapest installed cost (scaled back
/// to a score) gets a route at `score · scale`. Returns the number of
/// routes installed.
pub fn refresh_routes(
    ctx: &mut dyn ForwardingContext,
    builder: &PathBuilder,
    local: NodeId,
    fib: &FibMatch,
    providers: &[NodeId],
    scale: f64,
) -> usize {
    let Some(min_cost) = fib.min_cost() else {
        return 0;
    };
    let min_score = min_cost as f64 / scale;
    let nodes = snapshot(ctx);
    let cost = RouteCost::Scaled { scale };
    let mut installed = 0;

    for &provider in providers {
        for candidate in builder.candidates(&nodes, local, provider, |_| false) {
            if candidate.score <= min_score {
                continue;
            }
            let Some(face) = ctx.face_between(local, candidate.node) else {
                continue;
            };
            ctx.install_route(local, &fib.prefix, face, cost.cost(candidate.score));
            installed += 1;
            tracing::trace!(
                node = %local,
                provider = %provider,
                via = %candidate.node,
                score = candidate.score,
                "Refreshed route"
            );
        }
    }

    installed
}
