//! Contract between forwarding strategies and their host
//!
//! ## Key Traits
//!
//! - [`ForwardingStrategy`]: Event callbacks invoked by the host forwarder
//! - [`ForwardingContext`]: Primitives the host exposes to a strategy
//!
//! All callbacks run to completion on a single thread. A strategy that
//! wants to act later schedules a [`StrategyTimer`] and returns.

use std::time::Duration;

use crate::identity::{Face, FaceId, NodeId};
use crate::kinematics::Kinematics;
use crate::packet::{Data, Interest, Name, Tags};
use crate::routing::{Decision, FibMatch, NackReason, PitToken, StrategyTimer, TimerId};

/// Outgoing record of a pending Interest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutRecord {
    pub face: FaceId,
    /// Simulated time the Interest was last sent on `face`
    pub last_sent: Duration,
}

/// Read-only view of a PIT entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingView {
    pub name: Name,
    /// Downstream faces, oldest first
    pub in_faces: Vec<FaceId>,
    pub out_records: Vec<OutRecord>,
    /// Tags of the most recently forwarded copy of the Interest
    pub interest_tags: Tags,
}

impl PendingView {
    /// Out-record for `face`, if the Interest was sent there
    pub fn out_record(&self, face: FaceId) -> Option<&OutRecord> {
        self.out_records.iter().find(|r| r.face == face)
    }
}

/// Primitives the host forwarder exposes to a strategy
pub trait ForwardingContext {
    /// Simulated time since start
    fn now(&self) -> Duration;

    /// Number of nodes in the network
    fn node_count(&self) -> usize;

    /// Current position and velocity of `node`
    fn kinematics(&self, node: NodeId) -> Option<Kinematics>;

    /// Look up a face on the local node
    fn face(&self, id: FaceId) -> Option<Face>;

    /// All faces on the local node
    fn faces(&self) -> Vec<Face>;

    /// Face on `from` that reaches `to`
    fn face_between(&self, from: NodeId, to: NodeId) -> Option<FaceId>;

    /// Nodes whose applications produce content under `name`
    fn producers(&self, name: &Name) -> Vec<NodeId>;

    /// Inspect a pending Interest
    fn pending(&self, pit: PitToken) -> Option<PendingView>;

    /// Send an Interest upstream
    fn forward_interest(&mut self, pit: PitToken, egress: FaceId, interest: &Interest);

    /// Send Data downstream on one face
    fn forward_data(&mut self, pit: PitToken, egress: FaceId, data: &Data);

    /// Send Data to every downstream face except `ingress`
    fn forward_data_to_all_pending(&mut self, pit: PitToken, ingress: FaceId, data: &Data);

    /// Return a negative acknowledgment downstream
    fn send_nack(&mut self, pit: PitToken, face: FaceId, reason: NackReason);

    /// Mark the PIT entry rejected so it is erased
    fn reject_pending(&mut self, pit: PitToken);

    /// Reset the PIT entry's expiry timer; zero expires it immediately
    fn set_pending_expiry(&mut self, pit: PitToken, after: Duration);

    /// Longest-prefix FIB lookup on the local node
    fn lookup_routes(&self, name: &Name) -> Option<FibMatch>;

    /// Add or update a FIB next hop on `node`
    fn install_route(&mut self, node: NodeId, prefix: &Name, face: FaceId, cost: u64);

    /// Schedule a one-shot timer
    fn schedule(&mut self, delay: Duration, timer: StrategyTimer) -> TimerId;

    /// Cancel a timer; cancelling a fired or cancelled timer does nothing
    fn cancel(&mut self, id: TimerId);
}

/// Per-node forwarding strategy
pub trait ForwardingStrategy {
    /// Instance name, e.g. `/localhost/nfd/strategy/DASB/%FD%01`
    fn instance_name(&self) -> &str;

    /// Called once before any packet arrives
    fn on_start(&mut self, _ctx: &mut dyn ForwardingContext) {}

    /// A new Interest needs a forwarding decision
    fn on_interest(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        interest: &Interest,
        pit: PitToken,
    ) -> Decision;

    /// Data matched a pending Interest
    fn on_data(&mut self, ctx: &mut dyn ForwardingContext, pit: PitToken, ingress: FaceId, data: &Data);

    /// An Interest with an already-seen nonce arrived
    fn on_looped_interest(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        ingress: FaceId,
        interest: &Interest,
        pit: PitToken,
    );

    /// The content store answered the Interest
    fn on_content_store_hit(
        &mut self,
        ctx: &mut dyn ForwardingContext,
        pit: PitToken,
        ingress: FaceId,
        data: &Data,
    ) {
        ctx.forward_data(pit, ingress, data);
    }

    /// A timer scheduled by this strategy fired
    fn on_timer(&mut self, ctx: &mut dyn ForwardingContext, timer: StrategyTimer);
}
