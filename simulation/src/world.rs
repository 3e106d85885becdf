//! Simulated vehicular NDN network
//!
//! The [`World`] hosts one [`StrategyEngine`] per node and plays the
//! forwarder around it: FIB, PIT, optional content store, consumer and
//! producer applications, and a radio that reaches every node in range.
//!
//! ## Event Processing
//!
//! 1. **Consumer tick**: The consumer expresses the next Interest on its
//!    application face
//! 2. **Interest arrival**: Loop check, content store, PIT insert, then the
//!    strategy decides
//! 3. **Data arrival**: PIT match, then the strategy sends it downstream
//! 4. **Strategy timer**: Deferred sends and periodic measurement upkeep
//! 5. **Expiry**: PIT entries and unanswered requests time out
//!
//! After every strategy callback, PIT entries with no downstream face left
//! are erased unless the strategy extended their lifetime.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace, warn};

use vanet_core::{
    Data, Decision, Face, FaceId, FibMatch, ForwardingContext, ForwardingStrategy, Interest,
    Kinematics, NackReason, Name, NextHop, NodeId, OutRecord, PendingView, PitToken, RouteInstall,
    StrategyTimer, Tags, TimerId,
};
use vanet_logging::NodeContextGuard;
use vanet_strategy::{LegacyAddressing, ProviderTable, StrategyEngine, StrategyStats};

use crate::config::{RouteSetup, SimConfig};
use crate::error::{SimError, SimResult};
use crate::scheduler::{EventId, Scheduler};
use crate::stats::{PacketKind, ProviderKnowledge, SimReport, SimStats, Transmission};

/// Something that happens at one simulated instant
#[derive(Debug, Clone)]
pub enum Event {
    ConsumerTick { node: NodeId },
    InterestArrival { node: NodeId, face: FaceId, interest: Interest },
    DataArrival { node: NodeId, face: FaceId, data: Data },
    ProducerRequest { node: NodeId, interest: Interest },
    PitExpiry { node: NodeId, pit: PitToken },
    RequestTimeout { node: NodeId, name: Name },
    StrategyTimer { node: NodeId, timer: StrategyTimer },
}

#[derive(Debug, Clone)]
struct PitEntry {
    name: Name,
    in_faces: Vec<FaceId>,
    out_records: Vec<OutRecord>,
    nonces: Vec<u32>,
    tags: Tags,
    expiry: Option<EventId>,
    /// Lifetime set by the strategy; the entry outlives its downstreams
    extended: bool,
}

#[derive(Debug)]
struct Consumer {
    prefix: Name,
    next_seq: u64,
    /// Request name to the time it was expressed
    outstanding: HashMap<Name, Duration>,
}

#[derive(Debug)]
struct Producer {
    prefix: Name,
}

struct NodeState {
    start: Kinematics,
    fib: BTreeMap<Name, Vec<NextHop>>,
    pit: BTreeMap<PitToken, PitEntry>,
    /// Every (name, nonce) this node has accepted
    seen_nonces: HashSet<(Name, u32)>,
    content_store: Option<HashMap<Name, Data>>,
    consumer: Option<Consumer>,
    producer: Option<Producer>,
    /// Taken out while one of its callbacks runs
    strategy: Option<StrategyEngine>,
}

/// The simulated network
pub struct World {
    config: SimConfig,
    addressing: LegacyAddressing,
    radio_range: f64,
    scheduler: Scheduler<Event>,
    nodes: Vec<NodeState>,
    next_pit: u64,
    rng: StdRng,
    stats: SimStats,
    routes: Vec<RouteInstall>,
    transmissions: Vec<Transmission>,
    started: bool,
}

impl World {
    /// Build the network described by `config`
    pub fn new(config: SimConfig) -> SimResult<Self> {
        let warnings = config.validate();
        if !warnings.is_empty() {
            return Err(SimError::InvalidConfig(warnings));
        }

        let strategy_config = config.strategy_config();
        let addressing = LegacyAddressing::new(config.node_count);
        let prefix: Name = config.prefix.parse()?;
        let shared = strategy_config
            .discovery
            .global_provider_knowledge
            .then(|| Arc::new(ProviderTable::new()));

        let mut nodes = Vec::with_capacity(config.node_count);
        for i in 0..config.node_count {
            let id = NodeId(i as u32);
            let mut engine = StrategyEngine::new(id, strategy_config)?
                .with_seed(config.seed.wrapping_add(u64::from(id.0)));
            if let Some(table) = &shared {
                engine = engine.with_provider_table(table.clone());
            }

            nodes.push(NodeState {
                start: config.initial_kinematics(id),
                fib: BTreeMap::new(),
                pit: BTreeMap::new(),
                seen_nonces: HashSet::new(),
                content_store: config.content_store.then(HashMap::new),
                consumer: (id == config.consumer).then(|| Consumer {
                    prefix: prefix.clone(),
                    next_seq: 0,
                    outstanding: HashMap::new(),
                }),
                producer: (id == config.producer).then(|| Producer {
                    prefix: prefix.clone(),
                }),
                strategy: Some(engine),
            });
        }

        let mut world = Self {
            radio_range: strategy_config.radio_range,
            addressing,
            scheduler: Scheduler::new(),
            nodes,
            next_pit: 0,
            rng: StdRng::seed_from_u64(config.seed),
            stats: SimStats::default(),
            routes: Vec::new(),
            transmissions: Vec::new(),
            started: false,
            config,
        };
        world.populate_fibs(&prefix);
        Ok(world)
    }

    fn populate_fibs(&mut self, prefix: &Name) {
        let producer = self.config.producer;
        let app = self.addressing.application_face();

        for i in 0..self.nodes.len() {
            let node = NodeId(i as u32);
            match self.config.routes {
                RouteSetup::Chain if node != producer => {
                    let next = if producer.0 > node.0 {
                        NodeId(node.0 + 1)
                    } else {
                        NodeId(node.0 - 1)
                    };
                    let face = self.addressing.face_toward(node, next);
                    self.nodes[i].fib.insert(prefix.clone(), vec![NextHop::new(face, 0)]);
                }
                RouteSetup::Chain => {}
                RouteSetup::Root => {
                    let hops: Vec<NextHop> = self
                        .relay_faces(node)
                        .into_iter()
                        .map(|f| NextHop::new(f.id, 0))
                        .collect();
                    self.nodes[i].fib.insert(Name::root(), hops);
                }
            }
        }

        if let Some(state) = self.nodes.get_mut(producer.index()) {
            state.fib.insert(prefix.clone(), vec![NextHop::new(app, 0)]);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Every route installed by a strategy, in order
    pub fn routes(&self) -> &[RouteInstall] {
        &self.routes
    }

    pub fn transmissions(&self) -> &[Transmission] {
        &self.transmissions
    }

    pub fn engine(&self, node: NodeId) -> Option<&StrategyEngine> {
        self.nodes.get(node.index())?.strategy.as_ref()
    }

    /// Next hops for exactly `prefix` on `node`
    pub fn fib_entry(&self, node: NodeId, prefix: &Name) -> Option<&[NextHop]> {
        self.nodes.get(node.index())?.fib.get(prefix).map(Vec::as_slice)
    }

    /// Number of live PIT entries on `node`
    pub fn pending_count(&self, node: NodeId) -> usize {
        self.nodes.get(node.index()).map_or(0, |s| s.pit.len())
    }

    pub fn addressing(&self) -> LegacyAddressing {
        self.addressing
    }

    /// Decision counters summed over every engine
    pub fn strategy_stats(&self) -> StrategyStats {
        let mut total = StrategyStats::default();
        for engine in self.nodes.iter().filter_map(|s| s.strategy.as_ref()) {
            total.merge(engine.stats());
        }
        total
    }

    /// Kinematics of `node` at the current time
    pub fn kinematics(&self, node: NodeId) -> Option<Kinematics> {
        let state = self.nodes.get(node.index())?;
        Some(state.start.advanced(self.now().as_secs_f64()))
    }

    fn in_range(&self, a: NodeId, b: NodeId) -> bool {
        match (self.kinematics(a), self.kinematics(b)) {
            (Some(a), Some(b)) => a.position.distance_to(&b.position) <= self.radio_range,
            _ => false,
        }
    }

    fn face(&self, node: NodeId, id: FaceId) -> Option<Face> {
        if self.addressing.is_application(id) {
            return Some(Face::application(id));
        }
        let peer = self.addressing.resolve_peer(id, node)?;
        Some(Face::relay(id, peer, self.config.broadcast_faces))
    }

    fn relay_faces(&self, node: NodeId) -> Vec<Face> {
        (0..self.nodes.len() as u32)
            .map(NodeId)
            .filter(|&peer| peer != node)
            .map(|peer| {
                Face::relay(
                    self.addressing.face_toward(node, peer),
                    peer,
                    self.config.broadcast_faces,
                )
            })
            .collect()
    }

    /// Nodes that hear a transmission from `node` on the face toward `peer`
    fn receivers(&self, node: NodeId, peer: NodeId) -> Vec<NodeId> {
        if self.config.broadcast_faces {
            (0..self.nodes.len() as u32)
                .map(NodeId)
                .filter(|&other| other != node && self.in_range(node, other))
                .collect()
        } else if self.in_range(node, peer) {
            vec![peer]
        } else {
            vec![]
        }
    }

    fn log(&mut self, node: NodeId, kind: PacketKind, name: &Name, toward: Option<NodeId>) {
        self.transmissions.push(Transmission {
            time: self.now().as_secs_f64(),
            node,
            kind,
            name: name.to_string(),
            toward,
        });
    }

    // ========================================================================
    // Running
    // ========================================================================

    /// Start every strategy and the consumer
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        for i in 0..self.nodes.len() {
            let node = NodeId(i as u32);
            self.with_strategy(node, |engine, ctx| engine.on_start(ctx));
        }
        self.scheduler.schedule(
            Duration::ZERO,
            Event::ConsumerTick {
                node: self.config.consumer,
            },
        );
        info!(
            strategy = %self.config.strategy,
            nodes = self.nodes.len(),
            range = self.radio_range,
            "Simulation started"
        );
    }

    /// Run until the configured duration
    pub fn run(&mut self) {
        let until = self.config.duration;
        self.run_until(until);
        info!(
            satisfied = self.stats.requests_satisfied,
            expressed = self.stats.requests_expressed,
            "Simulation complete"
        );
    }

    /// Process every event up to and including `until`
    pub fn run_until(&mut self, until: Duration) {
        self.start();
        while let Some(at) = self.scheduler.peek_time() {
            if at > until {
                break;
            }
            let Some((_, _, event)) = self.scheduler.pop() else {
                break;
            };
            self.handle(event);
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::ConsumerTick { node } => self.consumer_tick(node),
            Event::InterestArrival {
                node,
                face,
                interest,
            } => self.receive_interest(node, face, interest),
            Event::DataArrival { node, face, data } => self.receive_data(node, face, data),
            Event::ProducerRequest { node, interest } => self.produce(node, &interest),
            Event::PitExpiry { node, pit } => {
                if let Some(state) = self.nodes.get_mut(node.index())
                    && let Some(entry) = state.pit.remove(&pit)
                {
                    trace!(node = %node, name = %entry.name, "PIT entry expired");
                }
            }
            Event::RequestTimeout { node, name } => {
                let Some(consumer) = self
                    .nodes
                    .get_mut(node.index())
                    .and_then(|s| s.consumer.as_mut())
                else {
                    return;
                };
                if consumer.outstanding.remove(&name).is_some() {
                    self.stats.requests_timed_out += 1;
                    debug!(node = %node, name = %name, "Request timed out");
                }
            }
            Event::StrategyTimer { node, timer } => {
                self.with_strategy(node, |engine, ctx| engine.on_timer(ctx, timer));
                self.sweep(node);
            }
        }
    }

    /// Run one strategy callback with the engine taken out of its node
    fn with_strategy<R>(
        &mut self,
        node: NodeId,
        f: impl FnOnce(&mut StrategyEngine, &mut NodeContext<'_>) -> R,
    ) -> Option<R> {
        let mut engine = self.nodes.get_mut(node.index())?.strategy.take()?;
        let _guard = NodeContextGuard::enter(node, self.now());
        let result = {
            let mut ctx = NodeContext { world: self, node };
            f(&mut engine, &mut ctx)
        };
        if let Some(state) = self.nodes.get_mut(node.index()) {
            state.strategy = Some(engine);
        }
        Some(result)
    }

    /// Erase PIT entries with no downstream face left
    fn sweep(&mut self, node: NodeId) {
        let Some(state) = self.nodes.get_mut(node.index()) else {
            return;
        };
        let done: Vec<PitToken> = state
            .pit
            .iter()
            .filter(|(_, e)| e.in_faces.is_empty() && !e.extended)
            .map(|(&pit, _)| pit)
            .collect();
        for pit in done {
            self.erase_pending(node, pit);
        }
    }

    fn erase_pending(&mut self, node: NodeId, pit: PitToken) {
        let Some(entry) = self
            .nodes
            .get_mut(node.index())
            .and_then(|s| s.pit.remove(&pit))
        else {
            return;
        };
        if let Some(expiry) = entry.expiry {
            self.scheduler.cancel(expiry);
        }
    }

    // ========================================================================
    // Applications
    // ========================================================================

    fn consumer_tick(&mut self, node: NodeId) {
        let lifetime = self.config.interest_lifetime;
        let max_requests = self.config.max_requests;
        let Some(consumer) = self
            .nodes
            .get_mut(node.index())
            .and_then(|s| s.consumer.as_mut())
        else {
            return;
        };
        if max_requests.is_some_and(|max| consumer.next_seq >= max) {
            return;
        }

        let seq = consumer.next_seq;
        consumer.next_seq += 1;
        let name = match consumer.prefix.append(seq.to_string()) {
            Ok(name) => name,
            Err(e) => {
                warn!(node = %node, error = %e, "Cannot name request");
                return;
            }
        };
        let now = self.scheduler.now();
        consumer.outstanding.insert(name.clone(), now);
        self.stats.requests_expressed += 1;

        let nonce: u32 = self.rng.random();
        let interest = Interest::new(name.clone(), nonce).with_lifetime(lifetime);
        debug!(node = %node, name = %name, nonce, "Expressing interest");

        self.scheduler
            .schedule(lifetime, Event::RequestTimeout { node, name });
        let period = Duration::from_secs_f64(1.0 / self.config.request_rate);
        self.scheduler.schedule(period, Event::ConsumerTick { node });

        let app = self.addressing.application_face();
        self.receive_interest(node, app, interest);
    }

    fn produce(&mut self, node: NodeId, interest: &Interest) {
        let serves = self
            .nodes
            .get(node.index())
            .and_then(|s| s.producer.as_ref())
            .is_some_and(|p| p.prefix.is_prefix_of(&interest.name));
        if !serves {
            trace!(node = %node, name = %interest.name, "No producer for interest");
            return;
        }
        let data = Data::new(interest.name.clone(), self.config.payload_size);
        let app = self.addressing.application_face();
        self.receive_data(node, app, data);
    }

    fn deliver_to_consumer(&mut self, node: NodeId, data: &Data) {
        self.stats.data_delivered += 1;
        let now = self.now();
        let Some(consumer) = self
            .nodes
            .get_mut(node.index())
            .and_then(|s| s.consumer.as_mut())
        else {
            return;
        };
        let Some(name) = consumer
            .outstanding
            .keys()
            .find(|n| data.satisfies(n))
            .cloned()
        else {
            return;
        };
        if let Some(sent) = consumer.outstanding.remove(&name) {
            self.stats.requests_satisfied += 1;
            self.stats.total_delay += now.saturating_sub(sent).as_secs_f64();
            debug!(
                node = %node,
                name = %name,
                delay_us = now.saturating_sub(sent).as_micros() as u64,
                "Request satisfied"
            );
        }
    }

    // ========================================================================
    // Forwarder
    // ========================================================================

    fn receive_interest(&mut self, node: NodeId, face: FaceId, interest: Interest) {
        if !self.addressing.is_application(face) {
            self.stats.interests_received += 1;
        }
        let Some(state) = self.nodes.get_mut(node.index()) else {
            return;
        };

        let key = (interest.name.clone(), interest.nonce);
        let existing = state
            .pit
            .iter()
            .find(|(_, e)| e.name == interest.name)
            .map(|(&pit, e)| (pit, e.nonces.contains(&interest.nonce)));

        match existing {
            Some((pit, true)) => {
                self.stats.loops_detected += 1;
                self.with_strategy(node, |engine, ctx| {
                    engine.on_looped_interest(ctx, face, &interest, pit)
                });
                self.sweep(node);
                return;
            }
            None if state.seen_nonces.contains(&key) => {
                self.stats.loops_detected += 1;
                trace!(node = %node, name = %interest.name, nonce = interest.nonce, "Dead nonce");
                return;
            }
            _ => {}
        }
        state.seen_nonces.insert(key);

        let cached = state
            .content_store
            .as_ref()
            .and_then(|cs| cs.values().find(|d| d.satisfies(&interest.name)).cloned());

        let pit = match existing {
            Some((pit, _)) => {
                if let Some(entry) = state.pit.get_mut(&pit) {
                    entry.nonces.push(interest.nonce);
                    if !entry.in_faces.contains(&face) {
                        entry.in_faces.push(face);
                    }
                    entry.tags = interest.tags.clone();
                }
                pit
            }
            None => {
                let pit = PitToken(self.next_pit);
                self.next_pit += 1;
                let expiry = self
                    .scheduler
                    .schedule(interest.lifetime, Event::PitExpiry { node, pit });
                state.pit.insert(
                    pit,
                    PitEntry {
                        name: interest.name.clone(),
                        in_faces: vec![face],
                        out_records: Vec::new(),
                        nonces: vec![interest.nonce],
                        tags: interest.tags.clone(),
                        expiry: Some(expiry),
                        extended: false,
                    },
                );
                pit
            }
        };

        if let Some(data) = cached {
            self.stats.content_store_hits += 1;
            trace!(node = %node, name = %interest.name, "Content store hit");
            self.with_strategy(node, |engine, ctx| {
                engine.on_content_store_hit(ctx, pit, face, &data)
            });
            self.sweep(node);
            return;
        }

        let decision = self
            .with_strategy(node, |engine, ctx| engine.on_interest(ctx, face, &interest, pit));
        match decision {
            Some(Decision::Deferred { .. }) => self.stats.interests_deferred += 1,
            Some(Decision::Suppressed) => self.stats.interests_suppressed += 1,
            Some(Decision::Dropped { reason }) => {
                self.stats.interests_dropped += 1;
                trace!(node = %node, name = %interest.name, ?reason, "Interest dropped");
            }
            _ => {}
        }
        self.sweep(node);
    }

    fn receive_data(&mut self, node: NodeId, face: FaceId, data: Data) {
        if !self.addressing.is_application(face) {
            self.stats.data_received += 1;
        }
        let Some(state) = self.nodes.get_mut(node.index()) else {
            return;
        };
        let Some(pit) = state
            .pit
            .iter()
            .find(|(_, e)| data.satisfies(&e.name))
            .map(|(&pit, _)| pit)
        else {
            self.stats.unsolicited_data += 1;
            trace!(node = %node, name = %data.name, "Unsolicited data");
            return;
        };
        if let Some(cs) = state.content_store.as_mut() {
            cs.insert(data.name.clone(), data.clone());
        }

        self.with_strategy(node, |engine, ctx| engine.on_data(ctx, pit, face, &data));
        self.sweep(node);
    }

    fn send_interest(&mut self, node: NodeId, pit: PitToken, egress: FaceId, interest: &Interest) {
        let now = self.now();
        let Some(entry) = self
            .nodes
            .get_mut(node.index())
            .and_then(|s| s.pit.get_mut(&pit))
        else {
            trace!(node = %node, name = %interest.name, "Interest for a finished entry");
            return;
        };
        match entry.out_records.iter_mut().find(|r| r.face == egress) {
            Some(record) => record.last_sent = now,
            None => entry.out_records.push(OutRecord {
                face: egress,
                last_sent: now,
            }),
        }
        entry.tags = interest.tags.clone();

        if self.addressing.is_application(egress) {
            self.log(node, PacketKind::Interest, &interest.name, None);
            self.scheduler.schedule(
                Duration::ZERO,
                Event::ProducerRequest {
                    node,
                    interest: interest.clone(),
                },
            );
            return;
        }

        let Some(peer) = self.addressing.resolve_peer(egress, node) else {
            warn!(node = %node, face = %egress, "Interest sent on unknown face");
            return;
        };
        self.stats.interests_sent += 1;
        self.log(node, PacketKind::Interest, &interest.name, Some(peer));
        for receiver in self.receivers(node, peer) {
            let face = self.addressing.face_toward(receiver, node);
            self.scheduler.schedule(
                self.config.link_delay,
                Event::InterestArrival {
                    node: receiver,
                    face,
                    interest: interest.clone(),
                },
            );
        }
    }

    fn send_data(&mut self, node: NodeId, pit: PitToken, egress: FaceId, data: &Data) {
        let Some(entry) = self
            .nodes
            .get_mut(node.index())
            .and_then(|s| s.pit.get_mut(&pit))
        else {
            trace!(node = %node, name = %data.name, "Data for a finished entry");
            return;
        };
        if !entry.extended {
            entry.in_faces.retain(|&f| f != egress);
        }

        if self.addressing.is_application(egress) {
            self.log(node, PacketKind::Data, &data.name, None);
            self.deliver_to_consumer(node, data);
            return;
        }

        let Some(peer) = self.addressing.resolve_peer(egress, node) else {
            warn!(node = %node, face = %egress, "Data sent on unknown face");
            return;
        };
        self.stats.data_sent += 1;
        self.log(node, PacketKind::Data, &data.name, Some(peer));
        for receiver in self.receivers(node, peer) {
            let face = self.addressing.face_toward(receiver, node);
            self.scheduler.schedule(
                self.config.link_delay,
                Event::DataArrival {
                    node: receiver,
                    face,
                    data: data.clone(),
                },
            );
        }
    }

    fn set_pending_expiry(&mut self, node: NodeId, pit: PitToken, after: Duration) {
        if after.is_zero() {
            self.erase_pending(node, pit);
            return;
        }
        let Some(old) = self
            .nodes
            .get(node.index())
            .and_then(|s| s.pit.get(&pit))
            .map(|e| e.expiry)
        else {
            return;
        };
        if let Some(old) = old {
            self.scheduler.cancel(old);
        }
        let expiry = self.scheduler.schedule(after, Event::PitExpiry { node, pit });
        if let Some(entry) = self
            .nodes
            .get_mut(node.index())
            .and_then(|s| s.pit.get_mut(&pit))
        {
            entry.expiry = Some(expiry);
            entry.extended = true;
        }
    }

    fn install_route(&mut self, node: NodeId, prefix: &Name, face: FaceId, cost: u64) {
        let Some(state) = self.nodes.get_mut(node.index()) else {
            warn!(node = %node, %prefix, "Route for unknown node");
            return;
        };
        let hops = state.fib.entry(prefix.clone()).or_default();
        match hops.iter_mut().find(|h| h.face == face) {
            Some(hop) => hop.cost = cost,
            None => hops.push(NextHop::new(face, cost)),
        }
        hops.sort_by_key(|h| h.cost);

        self.stats.routes_installed += 1;
        self.routes.push(RouteInstall {
            node,
            prefix: prefix.clone(),
            face,
            cost,
        });
        debug!(node = %node, %prefix, face = %face, cost, "Route installed");
    }

    fn lookup_routes(&self, node: NodeId, name: &Name) -> Option<FibMatch> {
        let state = self.nodes.get(node.index())?;
        state
            .fib
            .iter()
            .filter(|(prefix, hops)| !hops.is_empty() && prefix.is_prefix_of(name))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, hops)| FibMatch {
                prefix: prefix.clone(),
                next_hops: hops.clone(),
            })
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    /// Snapshot of the run so far
    pub fn report(&self, scenario: impl Into<String>) -> SimReport {
        let providers = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.strategy.as_ref().map(|engine| ProviderKnowledge {
                    node: NodeId(i as u32),
                    providers: engine.providers().providers(),
                })
            })
            .collect();

        SimReport {
            scenario: scenario.into(),
            strategy: self.config.strategy.to_string(),
            node_count: self.nodes.len(),
            duration_secs: self.now().as_secs_f64(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            mean_delay_secs: self.stats.mean_delay().map(|d| d.as_secs_f64()),
            stats: self.stats.clone(),
            strategy_stats: self.strategy_stats(),
            routes: self.routes.clone(),
            providers,
            transmissions: self.transmissions.clone(),
        }
    }
}

/// A node's view of the world during one strategy callback
pub struct NodeContext<'a> {
    world: &'a mut World,
    node: NodeId,
}

impl ForwardingContext for NodeContext<'_> {
    fn now(&self) -> Duration {
        self.world.now()
    }

    fn node_count(&self) -> usize {
        self.world.nodes.len()
    }

    fn kinematics(&self, node: NodeId) -> Option<Kinematics> {
        self.world.kinematics(node)
    }

    fn face(&self, id: FaceId) -> Option<Face> {
        self.world.face(self.node, id)
    }

    fn faces(&self) -> Vec<Face> {
        let mut faces = vec![Face::application(self.world.addressing.application_face())];
        faces.extend(self.world.relay_faces(self.node));
        faces
    }

    fn face_between(&self, from: NodeId, to: NodeId) -> Option<FaceId> {
        let count = self.world.nodes.len();
        (from != to && from.index() < count && to.index() < count)
            .then(|| self.world.addressing.face_toward(from, to))
    }

    fn producers(&self, name: &Name) -> Vec<NodeId> {
        self.world
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.producer.as_ref().is_some_and(|p| p.prefix.is_prefix_of(name)))
            .map(|(i, _)| NodeId(i as u32))
            .collect()
    }

    fn pending(&self, pit: PitToken) -> Option<PendingView> {
        let entry = self.world.nodes.get(self.node.index())?.pit.get(&pit)?;
        Some(PendingView {
            name: entry.name.clone(),
            in_faces: entry.in_faces.clone(),
            out_records: entry.out_records.clone(),
            interest_tags: entry.tags.clone(),
        })
    }

    fn forward_interest(&mut self, pit: PitToken, egress: FaceId, interest: &Interest) {
        self.world.send_interest(self.node, pit, egress, interest);
    }

    fn forward_data(&mut self, pit: PitToken, egress: FaceId, data: &Data) {
        self.world.send_data(self.node, pit, egress, data);
    }

    fn forward_data_to_all_pending(&mut self, pit: PitToken, ingress: FaceId, data: &Data) {
        let Some(view) = self.pending(pit) else {
            return;
        };
        for face in view.in_faces.into_iter().filter(|&f| f != ingress) {
            self.world.send_data(self.node, pit, face, data);
        }
    }

    fn send_nack(&mut self, pit: PitToken, face: FaceId, reason: NackReason) {
        let Some(name) = self.pending(pit).map(|v| v.name) else {
            return;
        };
        let toward = self.world.addressing.resolve_peer(face, self.node);
        self.world.stats.nacks_sent += 1;
        self.world.log(self.node, PacketKind::Nack, &name, toward);
        debug!(node = %self.node, face = %face, name = %name, ?reason, "Nack sent");
    }

    fn reject_pending(&mut self, pit: PitToken) {
        self.world.erase_pending(self.node, pit);
    }

    fn set_pending_expiry(&mut self, pit: PitToken, after: Duration) {
        self.world.set_pending_expiry(self.node, pit, after);
    }

    fn lookup_routes(&self, name: &Name) -> Option<FibMatch> {
        self.world.lookup_routes(self.node, name)
    }

    fn install_route(&mut self, node: NodeId, prefix: &Name, face: FaceId, cost: u64) {
        self.world.install_route(node, prefix, face, cost);
    }

    fn schedule(&mut self, delay: Duration, timer: StrategyTimer) -> TimerId {
        let id = self.world.scheduler.schedule(
            delay,
            Event::StrategyTimer {
                node: self.node,
                timer,
            },
        );
        TimerId(id.0)
    }

    fn cancel(&mut self, id: TimerId) {
        self.world.scheduler.cancel(EventId(id.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanet_strategy::StrategyKind;

    fn make_world(config: SimConfig) -> World {
        World::new(config).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = SimConfig {
            node_count: 1,
            ..Default::default()
        };
        assert!(matches!(World::new(config), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_chain_routes() {
        let world = make_world(SimConfig::scenario_a());
        let prefix: Name = "/ustc".parse().unwrap();
        let a = world.addressing();

        let hops = world.fib_entry(NodeId(0), &prefix).unwrap();
        assert_eq!(hops, &[NextHop::new(a.face_toward(NodeId(0), NodeId(1)), 0)]);
        let hops = world.fib_entry(NodeId(2), &prefix).unwrap();
        assert_eq!(hops, &[NextHop::new(a.application_face(), 0)]);
    }

    #[test]
    fn test_root_routes_cover_every_relay_face() {
        let world = make_world(SimConfig::scenario_b());
        let hops = world.fib_entry(NodeId(1), &Name::root()).unwrap();
        assert_eq!(hops.len(), 3);
        assert!(world.fib_entry(NodeId(3), &"/ustc".parse().unwrap()).is_some());
    }

    #[test]
    fn test_longest_prefix_match() {
        let world = make_world(SimConfig::scenario_b());
        let m = world
            .lookup_routes(NodeId(3), &"/ustc/7".parse().unwrap())
            .unwrap();
        assert_eq!(m.prefix, "/ustc".parse().unwrap());
        let m = world
            .lookup_routes(NodeId(0), &"/ustc/7".parse().unwrap())
            .unwrap();
        assert!(m.is_root());
    }

    #[test]
    fn test_point_to_point_needs_range() {
        let world = make_world(SimConfig::scenario_b());
        assert_eq!(world.receivers(NodeId(1), NodeId(2)), vec![NodeId(2)]);
        assert!(world.receivers(NodeId(0), NodeId(2)).is_empty());
    }

    #[test]
    fn test_broadcast_reaches_all_in_range() {
        let world = make_world(SimConfig {
            strategy: StrategyKind::Dasb,
            radio_range: Some(200.0),
            node_count: 4,
            spacing: 100.0,
            speed: 0.0,
            speed_spread: 0.0,
            producer: NodeId(3),
            broadcast_faces: true,
            ..Default::default()
        });
        assert_eq!(world.receivers(NodeId(1), NodeId(0)), vec![NodeId(0), NodeId(2), NodeId(3)]);
        assert_eq!(world.receivers(NodeId(0), NodeId(1)), vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn test_mobility() {
        // Periodic measurement refresh keeps the clock moving
        let mut world = make_world(SimConfig {
            speed: 10.0,
            speed_spread: 0.0,
            max_requests: Some(0),
            ..SimConfig::highway(StrategyKind::Mine2, 5)
        });
        world.run_until(Duration::from_secs(2));
        assert_eq!(world.now(), Duration::from_secs(2));
        let k = world.kinematics(NodeId(1)).unwrap();
        assert_eq!(k.position.x, 100.0);
        assert_eq!(k.velocity.x, 10.0);
    }

    #[test]
    fn test_duplicate_nonce_is_a_loop() {
        let mut world = make_world(SimConfig::scenario_a());
        let app = world.addressing().application_face();
        let interest = Interest::new("/other/1".parse().unwrap(), 42);
        world.receive_interest(NodeId(1), app, interest.clone());
        world.receive_interest(NodeId(1), app, interest);
        assert_eq!(world.stats().loops_detected, 1);
    }

    #[test]
    fn test_unsolicited_data_dropped() {
        let mut world = make_world(SimConfig::scenario_a());
        let face = world.addressing().face_toward(NodeId(1), NodeId(0));
        world.receive_data(NodeId(1), face, Data::new("/ustc/9".parse().unwrap(), 10));
        assert_eq!(world.stats().unsolicited_data, 1);
    }

    #[test]
    fn test_content_store_answers() {
        let mut world = make_world(SimConfig {
            content_store: true,
            ..SimConfig::scenario_a()
        });
        world.run();
        assert_eq!(world.stats().requests_satisfied, 1);

        // The relay cached the Data on its way back
        let face = world.addressing().face_toward(NodeId(1), NodeId(0));
        let interest = Interest::new("/ustc/0".parse().unwrap(), 7);
        world.receive_interest(NodeId(1), face, interest);
        assert_eq!(world.stats().content_store_hits, 1);
    }
}
