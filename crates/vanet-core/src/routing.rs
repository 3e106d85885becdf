//! Forwarding-table records and decision outcomes

use serde::{Deserialize, Serialize};

use crate::identity::{FaceId, NodeId};
use crate::packet::Name;

/// A FIB next hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHop {
    pub face: FaceId,
    pub cost: u64,
}

impl NextHop {
    pub fn new(face: FaceId, cost: u64) -> Self {
        Self { face, cost }
    }
}

/// Result of a longest-prefix FIB lookup
///
/// Next hops are ordered by ascending cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibMatch {
    pub prefix: Name,
    pub next_hops: Vec<NextHop>,
}

impl FibMatch {
    /// Check if only the catch-all root route matched
    pub fn is_root(&self) -> bool {
        self.prefix.is_root()
    }

    /// Lowest installed cost, if any
    pub fn min_cost(&self) -> Option<u64> {
        self.next_hops.iter().map(|h| h.cost).min()
    }
}

/// A route installed by a strategy, as recorded by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInstall {
    pub node: NodeId,
    pub prefix: Name,
    pub face: FaceId,
    pub cost: u64,
}

/// Handle to a pending-Interest (PIT) entry owned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PitToken(pub u64);

/// Handle to a scheduled host timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u64);

/// Strategy-chosen payload handed back when a timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrategyTimer(pub u64);

/// Reason carried by a negative acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NackReason {
    NoRoute,
    Duplicate,
    Congestion,
}

/// Why a strategy declined to forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// No candidate next hop survived eligibility filtering
    NoEligibleHop,
    /// Another node is better placed to forward
    NotSelected,
    /// Link expected to break before the exchange completes
    ShortLinkLifetime,
    /// Interest was already handled
    Duplicate,
}

/// Outcome of an Interest forwarding decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Sent immediately on the listed faces
    Forwarded { faces: Vec<FaceId> },
    /// Scheduled for a deferred send
    Deferred { face: FaceId },
    /// A pending deferred send was cancelled
    Suppressed,
    /// Not forwarded
    Dropped { reason: DropReason },
    /// Negative acknowledgment returned downstream
    Nacked { reason: NackReason },
}

impl Decision {
    pub fn forwarded(face: FaceId) -> Self {
        Decision::Forwarded { faces: vec![face] }
    }

    pub fn dropped(reason: DropReason) -> Self {
        Decision::Dropped { reason }
    }

    /// Check if the Interest left this node
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Decision::Forwarded { faces } if !faces.is_empty())
    }

    /// Check if a send was scheduled
    pub fn is_deferred(&self) -> bool {
        matches!(self, Decision::Deferred { .. })
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Decision::Suppressed)
    }

    /// Get the drop reason if this is a drop decision
    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            Decision::Dropped { reason } => Some(*reason),
            _ => None,
        }
    }

    /// Faces the Interest was sent on
    pub fn faces(&self) -> Vec<FaceId> {
        match self {
            Decision::Forwarded { faces } => faces.clone(),
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fib_match_min_cost() {
        let m = FibMatch {
            prefix: "/ustc".parse().unwrap(),
            next_hops: vec![NextHop::new(FaceId(257), 10), NextHop::new(FaceId(258), 3)],
        };
        assert_eq!(m.min_cost(), Some(3));
        assert!(!m.is_root());
    }

    #[test]
    fn test_decision_helpers() {
        let d = Decision::forwarded(FaceId(257));
        assert!(d.is_forwarded());
        assert_eq!(d.faces(), vec![FaceId(257)]);

        let d = Decision::dropped(DropReason::NotSelected);
        assert!(!d.is_forwarded());
        assert_eq!(d.drop_reason(), Some(DropReason::NotSelected));
        assert!(Decision::Forwarded { faces: vec![] }.faces().is_empty());
        assert!(!Decision::Forwarded { faces: vec![] }.is_forwarded());
    }
}
