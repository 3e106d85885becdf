//! Configurable forwarding strategy engine
//!
//! The [`StrategyEngine`] implements every strategy variant. Which variant
//! it behaves as is decided entirely by its [`StrategyConfig`].
//!
//! ## Interest Handling
//!
//! 1. **NO ROUTE**: No FIB match, or no eligible next hop. NACK or drop
//! 2. **DISCOVER**: Only the root route matched. Stamp and flood in range
//! 3. **SELECT**: Pick a next hop with the configured selection policy
//! 4. **DEFER**: On a broadcast medium, wait before sending and cancel if a
//!    duplicate is overheard first
//!
//! ## Data Handling
//!
//! Discovery Data installs fallback routes on its way back and triggers
//! path building at the requester. Other Data updates link measurements and
//! then follows the configured downstream policy, possibly deferred.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, trace, warn};

use vanet_core::{
    Data, Decision, DropReason, FaceId, FibMatch, ForwardingContext, ForwardingStrategy, Interest,
    Kinematics, NackReason, Name, NodeId, PendingView, PitToken, StrategyTimer, TimerId,
};

use crate::config::{DataForwarding, SelectionPolicy, StrategyConfig};
use crate::discovery::{PathBuilder, PathRecord, ProviderTable, build_path, refresh_routes};
use crate::error::{StrategyError, StrategyResult};
use crate::link_model::{LinkModel, distance};
use crate::measurements::MeasurementTable;
use crate::name::StrategyName;
use crate::policy::{
    ContentChoice, HopView, collect_hops, content_aware, designate, first_eligible,
    normalized_sum, receiver_election, refresh_neighbors, weighted_link_sum,
};
use crate::suppression::{WaitEntry, WaitKey, WaitTable};

/// Data keeps no nonce, so deferred Data is keyed on the name alone
const DATA_NONCE: u32 = 0;

/// What a strategy timer does when it fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerAction {
    /// Send a deferred Interest
    SendInterest(WaitKey),
    /// Send deferred Data
    SendData(WaitKey),
    /// Fold measurement counters into SISR
    RefreshIsr,
}

/// Decision counters for one engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrategyStats {
    pub interests_forwarded: u64,
    pub interests_deferred: u64,
    pub interests_suppressed: u64,
    pub interests_dropped: u64,
    pub nacks_sent: u64,
    pub data_forwarded: u64,
    pub data_deferred: u64,
    pub data_suppressed: u64,
    pub discoveries_started: u64,
    pub discoveries_completed: u64,
    pub routes_refreshed: u64,
    pub path_dead_ends: u64,
}

impl StrategyStats {
    /// Fold another engine's counters into these
    pub fn merge(&mut self, other: &StrategyStats) {
        self.interests_forwarded += other.interests_forwarded;
        self.interests_deferred += other.interests_deferred;
        self.interests_suppressed += other.interests_suppressed;
        self.interests_dropped += other.interests_dropped;
        self.nacks_sent += other.nacks_sent;
        self.data_forwarded += other.data_forwarded;
        self.data_deferred += other.data_deferred;
        self.data_suppressed += other.data_suppressed;
        self.discoveries_started += other.discoveries_started;
        self.discoveries_completed += other.discoveries_completed;
        self.routes_refreshed += other.routes_refreshed;
        self.path_dead_ends += other.path_dead_ends;
    }
}

/// Forwarding strategy for one node
///
/// Owns the node's wait tables, link measurements, neighbor cache and path
/// record. The provider table may be shared with other engines.
pub struct StrategyEngine {
    /// Node this engine decides for
    node: NodeId,
    config: StrategyConfig,
    model: LinkModel,
    builder: PathBuilder,
    instance_name: String,
    interest_waits: WaitTable<Interest>,
    data_waits: WaitTable<Data>,
    /// Pending timer tokens and what they do
    timers: HashMap<StrategyTimer, TimerAction>,
    next_timer: u64,
    measurements: MeasurementTable,
    providers: Arc<ProviderTable>,
    path_record: PathRecord,
    /// Neighbor cache for receiver-side election
    neighbors: Vec<(NodeId, Kinematics)>,
    rng: StdRng,
    stats: StrategyStats,
}

impl StrategyEngine {
    /// Create an engine for `node`
    ///
    /// Fails if the configuration produces any validation warning.
    pub fn new(node: NodeId, config: StrategyConfig) -> StrategyResult<Self> {
        let warnings = config.validate();
        if !warnings.is_empty() {
            return Err(StrategyError::InvalidConfig(warnings));
        }

        Ok(Self {
            node,
            model: config.link_model(),
            builder: config.path_builder(),
            instance_name: config.kind.canonical_name(),
            interest_waits: WaitTable::new(),
            data_waits: WaitTable::new(),
            timers: HashMap::new(),
            next_timer: 0,
            measurements: MeasurementTable::new(config.measurements.ttl),
            providers: Arc::new(ProviderTable::new()),
            path_record: PathRecord::new(),
            neighbors: Vec::new(),
            rng: StdRng::seed_from_u64(u64::from(node.0)),
            stats: StrategyStats::default(),
            config,
        })
    }

    /// Create an engine from a strategy instance name
    ///
    /// The name picks the preset; versions other than 1 and any parameters
    /// are rejected.
    pub fn from_name(node: NodeId, name: &str) -> StrategyResult<Self> {
        let kind = StrategyName::parse(name)?.validate()?;
        Self::new(node, StrategyConfig::for_kind(kind))
    }

    /// Use `providers` instead of a private provider table
    pub fn with_provider_table(mut self, providers: Arc<ProviderTable>) -> Self {
        self.providers = providers;
        self
    }

    /// Reseed the jitter source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn stats(&self) -> &StrategyStats {
        &self.stats
    }

    pub fn providers(&self) -> &Arc<ProviderTable> {
        &self.providers
    }

    pub fn measurements(&self) -> &MeasurementTable {
        &self.measurements
    }

    pub fn path_record(&self) -> &PathRecord {
        &self.path_record
    }

    pub fn interest_waits(&self) -> &WaitTable<Interest> {
        &self.interest_waits
    }

    pub fn data_waits(&self) -> &WaitTable<Data> {
        &self.data_waits
    }

    /// Schedule `action` after `delay`
    fn arm(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        delay: Duration,
        action: TimerAction,
    ) -> (StrategyTimer, TimerId) {
        let token = StrategyTimer(self.next_timer);
        self.next_timer += 1;
        let id = ctx.schedule(delay, token);
        self.timers.insert(token, action);
        (token, id)
    }

    /// Node and kinematics at the far end of `face`
    fn peer_of(&self, ctx: &dyn ForwardingContext, face: FaceId) -> Option<(NodeId, Kinematics)> {
        let peer = ctx.face(face)?.peer?;
        ctx.kinematics(peer).map(|k| (peer, k))
    }

    fn is_application(&self, ctx: &dyn ForwardingContext, face: FaceId) -> bool {
        ctx.face(face).is_some_and(|f| f.is_application())
    }

    fn is_broadcast(&self, ctx: &dyn ForwardingContext, face: FaceId) -> bool {
        ctx.face(face).is_some_and(|f| f.is_broadcast())
    }

    /// Every relay face whose peer position is known
    fn neighbor_hops(&self, ctx: &dyn ForwardingContext) -> Vec<HopView> {
        ctx.faces()
            .into_iter()
            .filter(|f| !f.is_application())
            .map(|face| HopView {
                face,
                cost: 0,
                peer: face.peer.and_then(|p| ctx.kinematics(p).map(|k| (p, k))),
            })
            .collect()
    }

    fn send_interest(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        pit: PitToken,
        egress: FaceId,
        interest: &Interest,
    ) -> Decision {
        ctx.forward_interest(pit, egress, interest);
        self.stats.interests_forwarded += 1;
        trace!(
            node = %self.node,
            face = %egress,
            name = %interest.name,
            nonce = interest.nonce,
            "Forwarded interest"
        );
        Decision::forwarded(egress)
    }

    /// Resolve an Interest that has nowhere to go
    fn no_route(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        interest: &Interest,
        pit: PitToken,
    ) -> Decision {
        debug!(
            node = %self.node,
            face = %ingress,
            name = %interest.name,
            nonce = interest.nonce,
            "No eligible next hop"
        );
        if self.config.suppression.nack_on_no_route {
            ctx.send_nack(pit, ingress, NackReason::NoRoute);
            ctx.reject_pending(pit);
            self.stats.nacks_sent += 1;
            return Decision::Nacked {
                reason: NackReason::NoRoute,
            };
        }
        ctx.reject_pending(pit);
        self.stats.interests_dropped += 1;
        Decision::dropped(DropReason::NoEligibleHop)
    }

    /// Drop an Interest and expire its PIT entry at once
    fn expire(&mut self, ctx: &mut dyn ForwardingContext, pit: PitToken, reason: DropReason) -> Decision {
        ctx.set_pending_expiry(pit, Duration::ZERO);
        self.stats.interests_dropped += 1;
        Decision::dropped(reason)
    }

    /// Flood a discovery Interest to every in-range neighbor but the ingress
    fn flood(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        from_app: bool,
        interest: &Interest,
        pit: PitToken,
    ) -> Decision {
        let mut out = interest.clone();
        if from_app {
            out.tags.discovery = true;
            out.tags.requester = Some(self.node);
            self.stats.discoveries_started += 1;
            debug!(
                node = %self.node,
                name = %interest.name,
                nonce = interest.nonce,
                "Starting content discovery"
            );
        }

        let Some(local) = ctx.kinematics(self.node) else {
            return self.no_route(ctx, ingress, interest, pit);
        };
        let faces: Vec<FaceId> = self
            .neighbor_hops(ctx)
            .iter()
            .filter(|h| h.face.id != ingress)
            .filter(|h| h.peer.is_some_and(|(_, k)| self.model.in_range(&local, &k)))
            .map(|h| h.face.id)
            .collect();

        if faces.is_empty() {
            return self.no_route(ctx, ingress, interest, pit);
        }
        for &face in &faces {
            ctx.forward_interest(pit, face, &out);
        }
        self.stats.interests_forwarded += faces.len() as u64;
        trace!(
            node = %self.node,
            name = %interest.name,
            nonce = interest.nonce,
            fanout = faces.len(),
            "Flooded discovery interest"
        );
        Decision::Forwarded { faces }
    }

    /// Improve routes from known providers, returning the updated FIB match
    fn refresh(&mut self, ctx: &mut dyn ForwardingContext, fib: FibMatch, name: &Name) -> FibMatch {
        let discovery = self.config.discovery;
        let now = ctx.now();
        self.providers.prune(discovery.pruning, now);
        self.path_record.prune(discovery.pruning, now);

        let Some(scale) = discovery.refresh_scale else {
            return fib;
        };
        let first_is_app = collect_hops(ctx, &fib)
            .first()
            .is_some_and(|h| h.is_application());
        if first_is_app || self.providers.is_empty() {
            return fib;
        }

        let providers = self.providers.providers();
        let installed = refresh_routes(ctx, &self.builder, self.node, &fib, &providers, scale);
        if installed == 0 {
            return fib;
        }
        self.stats.routes_refreshed += installed as u64;
        ctx.lookup_routes(name).unwrap_or(fib)
    }

    /// Defer an Interest heard over a broadcast medium
    fn defer_interest(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        egress: FaceId,
        interest: &Interest,
        pit: PitToken,
    ) -> Decision {
        let key = WaitKey::new(interest.name.clone(), interest.nonce);
        if self.interest_waits.contains(&key) {
            return self.overheard_interest(ctx, ingress, interest);
        }

        let (Some(formula), Some((sender, sender_kin)), Some(local)) = (
            self.config.suppression.defer,
            self.peer_of(ctx, ingress),
            ctx.kinematics(self.node),
        ) else {
            return self.send_interest(ctx, pit, egress, interest);
        };

        let let_secs = self.model.link_expiration(&sender_kin, &local);
        let delay = formula.delay(
            distance(&sender_kin, &local),
            let_secs,
            self.model.radio_range,
            &mut self.rng,
        );
        let fire_at = ctx.now() + delay;
        let (token, timer) = self.arm(ctx, delay, TimerAction::SendInterest(key.clone()));
        let entry = WaitEntry {
            previous_hop: Some(sender),
            token,
            timer,
            fire_at,
            egress,
            pit,
            payload: interest.clone(),
        };
        if let Err(entry) = self.interest_waits.insert(key, entry) {
            ctx.cancel(entry.timer);
            self.timers.remove(&entry.token);
            return Decision::Deferred { face: egress };
        }

        self.stats.interests_deferred += 1;
        debug!(
            node = %self.node,
            face = %egress,
            name = %interest.name,
            nonce = interest.nonce,
            delay_us = delay.as_micros() as u64,
            "Deferred interest"
        );
        Decision::Deferred { face: egress }
    }

    /// A copy of a waiting Interest was heard on `ingress`
    fn overheard_interest(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        interest: &Interest,
    ) -> Decision {
        let key = WaitKey::new(interest.name.clone(), interest.nonce);
        let Some(entry) = self.interest_waits.get(&key) else {
            return Decision::dropped(DropReason::Duplicate);
        };
        let egress = entry.egress;
        let previous = entry.previous_hop.and_then(|n| ctx.kinematics(n));

        let suppress = match (self.peer_of(ctx, ingress), ctx.kinematics(self.node)) {
            (Some((_, new_sender)), Some(local)) => {
                self.config
                    .suppression
                    .test
                    .should_suppress(previous.as_ref(), &new_sender, &local)
            }
            _ => true,
        };
        if !suppress {
            trace!(
                node = %self.node,
                face = %ingress,
                name = %interest.name,
                nonce = interest.nonce,
                "Overheard copy does not cover this node"
            );
            return Decision::Deferred { face: egress };
        }

        self.suppress_interest(ctx, ingress, interest)
    }

    /// Cancel the waiting send for `interest` without any coverage test
    fn suppress_interest(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        interest: &Interest,
    ) -> Decision {
        let key = WaitKey::new(interest.name.clone(), interest.nonce);
        let Some(entry) = self.interest_waits.cancel(ctx, &key) else {
            return Decision::dropped(DropReason::Duplicate);
        };
        self.timers.remove(&entry.token);
        if self.config.suppression.expire_pending_on_suppress {
            ctx.set_pending_expiry(entry.pit, Duration::ZERO);
        }
        self.stats.interests_suppressed += 1;
        debug!(
            node = %self.node,
            face = %ingress,
            name = %interest.name,
            nonce = interest.nonce,
            "Suppressed interest"
        );
        Decision::Suppressed
    }

    /// First eligible hop, deferred when heard over a broadcast medium
    fn broadcast(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        from_app: bool,
        hops: &[HopView],
        interest: &Interest,
        pit: PitToken,
    ) -> Decision {
        let Some(hop) = first_eligible(hops, ingress).copied() else {
            return self.no_route(ctx, ingress, interest, pit);
        };
        let immediate = from_app
            || hop.is_application()
            || !self.config.suppression.is_enabled()
            || !self.is_broadcast(ctx, ingress);
        if immediate {
            return self.send_interest(ctx, pit, hop.face.id, interest);
        }
        self.defer_interest(ctx, ingress, hop.face.id, interest, pit)
    }

    /// Forward only if this node wins the election among the sender's
    /// receivers
    fn receiver_topsis(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        egress: FaceId,
        interest: &Interest,
        pit: PitToken,
    ) -> Decision {
        let (Some((sender, sender_kin)), Some(local)) =
            (self.peer_of(ctx, ingress), ctx.kinematics(self.node))
        else {
            return self.send_interest(ctx, pit, egress, interest);
        };

        let nodes = crate::discovery::snapshot(ctx);
        refresh_neighbors(&mut self.neighbors, &nodes, &local, self.model.radio_range);

        match receiver_election(&self.model, &self.neighbors, &sender_kin, &local) {
            Some(winner) if winner == self.node => self.send_interest(ctx, pit, egress, interest),
            Some(winner) => {
                trace!(
                    node = %self.node,
                    sender = %sender,
                    winner = %winner,
                    name = %interest.name,
                    "Another receiver is better placed"
                );
                self.expire(ctx, pit, DropReason::NotSelected)
            }
            None => {
                self.stats.interests_dropped += 1;
                Decision::dropped(DropReason::NoEligibleHop)
            }
        }
    }

    /// Forward only if the link to the sender is expected to last
    fn let_threshold(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        egress: FaceId,
        min_let: f64,
        interest: &Interest,
        pit: PitToken,
    ) -> Decision {
        let (Some((_, sender)), Some(local)) = (self.peer_of(ctx, ingress), ctx.kinematics(self.node))
        else {
            return self.send_interest(ctx, pit, egress, interest);
        };
        let let_secs = self.model.link_expiration(&sender, &local);
        if let_secs < min_let {
            debug!(
                node = %self.node,
                face = %ingress,
                name = %interest.name,
                let_secs,
                "Link to sender too short-lived"
            );
            return self.expire(ctx, pit, DropReason::ShortLinkLifetime);
        }
        self.send_interest(ctx, pit, egress, interest)
    }

    /// Designate relays at the consumer, relay only when designated
    fn road_designation(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        from_app: bool,
        egress: FaceId,
        min_let: f64,
        interest: &Interest,
        pit: PitToken,
    ) -> Decision {
        let designated = interest.tags.is_designated(self.node);
        if !from_app && !designated {
            trace!(
                node = %self.node,
                name = %interest.name,
                nonce = interest.nonce,
                "Not designated as relay"
            );
            return self.expire(ctx, pit, DropReason::NotSelected);
        }

        let Some(local) = ctx.kinematics(self.node) else {
            return self.send_interest(ctx, pit, egress, interest);
        };
        let neighbors = self.neighbor_hops(ctx);
        let mut out = interest.clone();
        if from_app {
            out.tags.designated_ahead = designate(&self.model, &local, &neighbors, true, min_let);
            out.tags.designated_behind = designate(&self.model, &local, &neighbors, false, min_let);
        } else if interest.tags.designated_ahead == Some(self.node) {
            out.tags.designated_ahead = designate(&self.model, &local, &neighbors, true, min_let);
            out.tags.designated_behind = None;
        } else {
            out.tags.designated_ahead = None;
            out.tags.designated_behind = designate(&self.model, &local, &neighbors, false, min_let);
        }
        debug!(
            node = %self.node,
            name = %interest.name,
            ahead = ?out.tags.designated_ahead,
            behind = ?out.tags.designated_behind,
            "Designated relays"
        );
        self.send_interest(ctx, pit, egress, &out)
    }

    /// Count an Interest sent on `face` under `prefix`
    fn count_out(&self, prefix: &Name, face: FaceId, now: Duration) {
        if self.config.measurements.enabled {
            self.measurements
                .update(prefix, face, now, |info| info.counters.n_out_interests += 1);
        }
    }

    /// Content sources: discovered providers plus known producers
    fn content_sources(&self, ctx: &dyn ForwardingContext, name: &Name) -> Vec<(NodeId, Kinematics)> {
        let mut nodes = self.providers.providers();
        for producer in ctx.producers(name) {
            if !nodes.contains(&producer) {
                nodes.push(producer);
            }
        }
        nodes
            .into_iter()
            .filter(|n| *n != self.node)
            .filter_map(|n| ctx.kinematics(n).map(|k| (n, k)))
            .collect()
    }

    fn select(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        from_app: bool,
        fib: &FibMatch,
        interest: &Interest,
        pit: PitToken,
    ) -> Decision {
        let hops = collect_hops(ctx, fib);
        let now = ctx.now();
        let horizon = self.config.link.lap_horizon;

        match self.config.selection {
            SelectionPolicy::FirstEligible => {
                self.broadcast(ctx, ingress, from_app, &hops, interest, pit)
            }
            SelectionPolicy::ReceiverTopsis
            | SelectionPolicy::LetThreshold { .. }
            | SelectionPolicy::RoadDesignation { .. } => {
                let Some(hop) = first_eligible(&hops, ingress).copied() else {
                    return self.no_route(ctx, ingress, interest, pit);
                };
                if hop.is_application() {
                    return self.send_interest(ctx, pit, hop.face.id, interest);
                }
                match self.config.selection {
                    SelectionPolicy::ReceiverTopsis
                        if !from_app && self.is_broadcast(ctx, ingress) =>
                    {
                        self.receiver_topsis(ctx, ingress, hop.face.id, interest, pit)
                    }
                    SelectionPolicy::LetThreshold { min_let } if !from_app => {
                        self.let_threshold(ctx, ingress, hop.face.id, min_let, interest, pit)
                    }
                    SelectionPolicy::RoadDesignation { min_let } => {
                        self.road_designation(ctx, from_app, hop.face.id, min_let, interest, pit)
                    }
                    _ => self.send_interest(ctx, pit, hop.face.id, interest),
                }
            }
            SelectionPolicy::ContentAwareTopsis => {
                let Some(local) = ctx.kinematics(self.node) else {
                    return self.no_route(ctx, ingress, interest, pit);
                };
                let eligible: Vec<HopView> =
                    hops.into_iter().filter(|h| h.is_eligible(ingress)).collect();
                let sources = self.content_sources(ctx, &interest.name);
                self.measurements.cleanup(now);
                match content_aware(
                    &self.model,
                    &self.measurements,
                    &fib.prefix,
                    now,
                    &local,
                    &eligible,
                    &sources,
                ) {
                    ContentChoice::Application(face) => self.send_interest(ctx, pit, face, interest),
                    ContentChoice::Relay(face) => {
                        self.count_out(&fib.prefix, face, now);
                        self.send_interest(ctx, pit, face, interest)
                    }
                    ContentChoice::NoCandidate => self.no_route(ctx, ingress, interest, pit),
                }
            }
            SelectionPolicy::WeightedLinkSum { alpha, beta } => {
                let Some(local) = ctx.kinematics(self.node) else {
                    return self.no_route(ctx, ingress, interest, pit);
                };
                match weighted_link_sum(&self.model, horizon, alpha, beta, &local, &hops) {
                    Some(face) => self.send_interest(ctx, pit, face, interest),
                    None => self.no_route(ctx, ingress, interest, pit),
                }
            }
            SelectionPolicy::NormalizedSum => {
                let Some(local) = ctx.kinematics(self.node) else {
                    return self.no_route(ctx, ingress, interest, pit);
                };
                let choice = normalized_sum(
                    &self.model,
                    horizon,
                    &self.measurements,
                    &fib.prefix,
                    now,
                    &local,
                    &hops,
                    ingress,
                );
                match choice {
                    Some(face) => {
                        if !self.is_application(ctx, face) {
                            self.count_out(&fib.prefix, face, now);
                        }
                        self.send_interest(ctx, pit, face, interest)
                    }
                    None => self.no_route(ctx, ingress, interest, pit),
                }
            }
        }
    }

    /// Send Data downstream according to the configured policy
    fn send_data(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        pit: PitToken,
        ingress: FaceId,
        data: &Data,
        view: &PendingView,
    ) {
        let first = view.in_faces.first().copied();
        match self.config.data_forwarding {
            DataForwarding::FirstDownstream => {
                if let Some(face) = first {
                    ctx.forward_data(pit, face, data);
                    self.stats.data_forwarded += 1;
                }
            }
            DataForwarding::FirstDownstreamIfForwarded => match first {
                Some(face) if !view.out_records.is_empty() => {
                    ctx.forward_data(pit, face, data);
                    self.stats.data_forwarded += 1;
                }
                _ => trace!(
                    node = %self.node,
                    name = %data.name,
                    "Interest was never forwarded here, holding data"
                ),
            },
            DataForwarding::AllDownstream => {
                ctx.forward_data_to_all_pending(pit, ingress, data);
                self.stats.data_forwarded += 1;
            }
        }
    }

    /// Discovery Data on its way back to the requester
    fn collect_discovery(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        pit: PitToken,
        ingress: FaceId,
        from_app: bool,
        data: &Data,
        view: &PendingView,
    ) {
        let discovery = self.config.discovery;
        let prefix = data.name.prefix(1);
        if let Some(extension) = discovery.pending_extension {
            ctx.set_pending_expiry(pit, extension);
        }

        let mut data = data.clone();
        if from_app {
            data.tags.discovery = true;
            data.tags.provider = Some(self.node);
            data.tags.requester = view.interest_tags.requester;
            debug!(node = %self.node, name = %data.name, "Answering discovery as provider");
        } else if let Some(cost) = discovery.fallback_cost {
            ctx.install_route(self.node, &prefix, ingress, cost);
            trace!(
                node = %self.node,
                %prefix,
                face = %ingress,
                cost,
                "Installed fallback route"
            );
        }

        if view.interest_tags.requester == Some(self.node)
            && let Some(provider) = data.tags.provider
        {
            let now = ctx.now();
            let is_new = self.providers.record(provider, now);
            self.stats.discoveries_completed += 1;
            debug!(
                node = %self.node,
                provider = %provider,
                %prefix,
                is_new,
                "Discovery complete"
            );

            let record = discovery.use_path_record.then_some(&mut self.path_record);
            let outcome = build_path(ctx, &self.builder, &prefix, self.node, provider, record);
            if !outcome.is_complete() {
                self.stats.path_dead_ends += 1;
            }
        }

        self.send_data(ctx, pit, ingress, &data, view);
    }

    /// Feed RTT and satisfaction counters for the face Data came in on
    fn record_satisfaction(
        &mut self,
        ctx: &dyn ForwardingContext,
        ingress: FaceId,
        data: &Data,
        view: &PendingView,
    ) {
        let now = ctx.now();
        let rtt = view
            .out_record(ingress)
            .map(|r| now.saturating_sub(r.last_sent));
        let isr_on_satisfy = self.config.measurements.isr_on_satisfy;
        let updated = self.measurements.update_existing(&data.name, ingress, now, |info| {
            if let Some(rtt) = rtt {
                info.record_rtt(rtt);
            }
            info.counters.n_satisfied_interests += 1;
            if isr_on_satisfy {
                let isr = info.counters.ratio();
                info.record_isr(isr);
            }
        });
        if updated.is_none() {
            trace!(node = %self.node, face = %ingress, name = %data.name, "No measurements to update");
        }
    }

    /// Defer Data heard over the air, or suppress it if a copy covers us
    fn defer_data(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        pit: PitToken,
        ingress: FaceId,
        data: &Data,
        view: &PendingView,
    ) {
        let key = WaitKey::new(data.name.clone(), DATA_NONCE);
        let local = ctx.kinematics(self.node);
        let sender = self.peer_of(ctx, ingress);

        if let Some(entry) = self.data_waits.get(&key) {
            let previous = entry.previous_hop.and_then(|n| ctx.kinematics(n));
            let suppress = match (sender, local) {
                (Some((_, new_sender)), Some(local)) => self
                    .config
                    .suppression
                    .test
                    .should_suppress(previous.as_ref(), &new_sender, &local),
                _ => true,
            };
            if suppress && let Some(entry) = self.data_waits.cancel(ctx, &key) {
                self.timers.remove(&entry.token);
                self.stats.data_suppressed += 1;
                debug!(node = %self.node, face = %ingress, name = %data.name, "Suppressed data");
            }
            return;
        }

        let (Some(formula), Some((sender, sender_kin)), Some(local), Some(&egress)) = (
            self.config.suppression.defer,
            sender,
            local,
            view.in_faces.first(),
        ) else {
            self.send_data(ctx, pit, ingress, data, view);
            return;
        };

        let delay = formula.delay(
            distance(&sender_kin, &local),
            self.model.link_expiration(&sender_kin, &local),
            self.model.radio_range,
            &mut self.rng,
        );
        let fire_at = ctx.now() + delay;
        let (token, timer) = self.arm(ctx, delay, TimerAction::SendData(key.clone()));
        let entry = WaitEntry {
            previous_hop: Some(sender),
            token,
            timer,
            fire_at,
            egress,
            pit,
            payload: data.clone(),
        };
        if let Err(entry) = self.data_waits.insert(key, entry) {
            ctx.cancel(entry.timer);
            self.timers.remove(&entry.token);
            return;
        }
        self.stats.data_deferred += 1;
        debug!(
            node = %self.node,
            face = %egress,
            name = %data.name,
            delay_us = delay.as_micros() as u64,
            "Deferred data"
        );
    }
}

impl ForwardingStrategy for StrategyEngine {
    fn instance_name(&self) -> &str {
        &self.instance_name
    }

    fn on_start(&mut self, ctx: &mut dyn ForwardingContext) {
        if self.config.measurements.enabled
            && let Some(period) = self.config.measurements.isr_refresh
        {
            self.arm(ctx, period, TimerAction::RefreshIsr);
        }
    }

    fn on_interest(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        interest: &Interest,
        pit: PitToken,
    ) -> Decision {
        let Some(mut fib) = ctx.lookup_routes(&interest.name) else {
            return self.no_route(ctx, ingress, interest, pit);
        };
        let from_app = self.is_application(ctx, ingress);

        if self.config.suppression.is_enabled()
            && self
                .interest_waits
                .contains(&WaitKey::new(interest.name.clone(), interest.nonce))
        {
            return self.overheard_interest(ctx, ingress, interest);
        }

        if self.config.discovery.enabled {
            let first_is_app = collect_hops(ctx, &fib)
                .first()
                .is_some_and(|h| h.is_application());
            if fib.is_root() && !first_is_app {
                return self.flood(ctx, ingress, from_app, interest, pit);
            }
            fib = self.refresh(ctx, fib, &interest.name);
        }

        self.select(ctx, ingress, from_app, &fib, interest, pit)
    }

    fn on_data(&mut self, ctx: &mut dyn ForwardingContext, pit: PitToken, ingress: FaceId, data: &Data) {
        let Some(view) = ctx.pending(pit) else {
            trace!(node = %self.node, name = %data.name, "Data for a finished entry");
            return;
        };
        let from_app = self.is_application(ctx, ingress);

        if self.config.discovery.enabled && view.interest_tags.discovery {
            self.collect_discovery(ctx, pit, ingress, from_app, data, &view);
            return;
        }

        // A copy of Data already waiting to be relayed satisfies nothing new
        let duplicate = self
            .data_waits
            .contains(&WaitKey::new(data.name.clone(), DATA_NONCE));
        if self.config.measurements.enabled && !from_app && !duplicate {
            self.record_satisfaction(ctx, ingress, data, &view);
        }

        let suppression = self.config.suppression;
        let to_consumer = view
            .in_faces
            .iter()
            .any(|&f| self.is_application(ctx, f));
        if suppression.defer_data
            && suppression.is_enabled()
            && !from_app
            && !to_consumer
            && self.is_broadcast(ctx, ingress)
        {
            self.defer_data(ctx, pit, ingress, data, &view);
            return;
        }

        self.send_data(ctx, pit, ingress, data, &view);
    }

    fn on_looped_interest(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        interest: &Interest,
        _pit: PitToken,
    ) {
        let key = WaitKey::new(interest.name.clone(), interest.nonce);
        if !self.config.suppression.is_enabled() || !self.interest_waits.contains(&key) {
            trace!(
                node = %self.node,
                face = %ingress,
                name = %interest.name,
                nonce = interest.nonce,
                "Looped interest ignored"
            );
            return;
        }
        self.suppress_interest(ctx, ingress, interest);
    }

    fn on_content_store_hit(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        pit: PitToken,
        ingress: FaceId,
        data: &Data,
    ) {
        ctx.forward_data(pit, ingress, data);
        self.stats.data_forwarded += 1;
    }

    fn on_timer(&mut self, ctx: &mut dyn ForwardingContext, timer: StrategyTimer) {
        let Some(action) = self.timers.remove(&timer) else {
            trace!(node = %self.node, timer = timer.0, "Stale timer");
            return;
        };

        match action {
            TimerAction::SendInterest(key) => {
                if let Some(entry) = self.interest_waits.take(&key) {
                    debug!(
                        node = %self.node,
                        face = %entry.egress,
                        name = %key.name,
                        nonce = key.nonce,
                        "Sending deferred interest"
                    );
                    ctx.forward_interest(entry.pit, entry.egress, &entry.payload);
                    self.stats.interests_forwarded += 1;
                }
            }
            TimerAction::SendData(key) => {
                if let Some(entry) = self.data_waits.take(&key) {
                    debug!(
                        node = %self.node,
                        face = %entry.egress,
                        name = %key.name,
                        "Sending deferred data"
                    );
                    ctx.forward_data(entry.pit, entry.egress, &entry.payload);
                    self.stats.data_forwarded += 1;
                }
            }
            TimerAction::RefreshIsr => {
                self.measurements.refresh_isr();
                self.measurements.cleanup(ctx.now());
                match self.config.measurements.isr_refresh {
                    Some(period) => {
                        self.arm(ctx, period, TimerAction::RefreshIsr);
                    }
                    None => warn!(node = %self.node, "ISR refresh fired without a period"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::StrategyKind;

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = StrategyConfig::dasb().with_radio_range(-1.0);
        let err = StrategyEngine::new(NodeId(0), config).err();
        assert!(matches!(err, Some(StrategyError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_name() {
        let engine = StrategyEngine::from_name(NodeId(3), "/localhost/nfd/strategy/MINE2/%FD%01")
            .unwrap();
        assert_eq!(engine.config().kind, StrategyKind::Mine2);
        assert_eq!(engine.instance_name(), "/localhost/nfd/strategy/MINE2/%FD%01");
        assert_eq!(engine.node(), NodeId(3));

        let unversioned = StrategyEngine::from_name(NodeId(0), "/localhost/nfd/strategy/DASB");
        assert!(unversioned.is_ok());
    }

    #[test]
    fn test_from_name_rejects() {
        assert!(matches!(
            StrategyEngine::from_name(NodeId(0), "/localhost/nfd/strategy/DASB/%FD%02").err(),
            Some(StrategyError::UnsupportedVersion { version: 2, .. })
        ));
        assert!(matches!(
            StrategyEngine::from_name(NodeId(0), "/localhost/nfd/strategy/LISIC/%FD%01/x").err(),
            Some(StrategyError::ParametersNotAccepted(_))
        ));
        assert!(matches!(
            StrategyEngine::from_name(NodeId(0), "/localhost/nfd/strategy/FOO").err(),
            Some(StrategyError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_shared_provider_table() {
        let table = Arc::new(ProviderTable::new());
        let a = StrategyEngine::new(NodeId(0), StrategyConfig::mine())
            .unwrap()
            .with_provider_table(table.clone());
        let b = StrategyEngine::new(NodeId(1), StrategyConfig::mine())
            .unwrap()
            .with_provider_table(table.clone());
        table.record(NodeId(7), Duration::ZERO);
        assert!(a.providers().contains(NodeId(7)));
        assert!(b.providers().contains(NodeId(7)));
    }

    #[test]
    fn test_stats_merge() {
        let mut total = StrategyStats::default();
        let one = StrategyStats {
            interests_forwarded: 2,
            data_suppressed: 1,
            ..Default::default()
        };
        total.merge(&one);
        total.merge(&one);
        assert_eq!(total.interests_forwarded, 4);
        assert_eq!(total.data_suppressed, 2);
    }
}
