//! Node and face identities
//!
//! Nodes are numbered densely from zero. Faces carry their peer explicitly,
//! so a strategy never has to recover the node at the other end of a link
//! from the face number alone.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Identity of a mobile node
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From,
)]
#[display("{_0}")]
pub struct NodeId(pub u32);

impl NodeId {
    /// Index into dense per-node storage
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Identity of a face on one node
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From,
)]
#[display("{_0}")]
pub struct FaceId(pub u64);

/// What sits at the far end of a face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceKind {
    /// Local consumer or producer application
    Application,
    /// Another node reached over the radio
    Relay,
}

/// A communication endpoint on one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Face {
    pub id: FaceId,
    pub kind: FaceKind,
    /// Node at the other end, `None` for application faces
    pub peer: Option<NodeId>,
    /// Whether a send on this face is heard by every node in range
    pub broadcast: bool,
}

impl Face {
    /// Create an application face
    pub fn application(id: FaceId) -> Self {
        Self {
            id,
            kind: FaceKind::Application,
            peer: None,
            broadcast: false,
        }
    }

    /// Create a relay face towards `peer`
    pub fn relay(id: FaceId, peer: NodeId, broadcast: bool) -> Self {
        Self {
            id,
            kind: FaceKind::Relay,
            peer: Some(peer),
            broadcast,
        }
    }

    /// Check if this face leads to the local application layer
    pub fn is_application(&self) -> bool {
        self.kind == FaceKind::Application
    }

    /// Check if this face uses a shared broadcast medium
    pub fn is_broadcast(&self) -> bool {
        self.broadcast
    }
}
