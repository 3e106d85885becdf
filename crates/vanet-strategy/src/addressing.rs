//! Legacy affine face numbering
//!
//! Faces carry their peer explicitly, so strategies never need this. The
//! harness still numbers faces this way so identifiers line up with traces
//! produced under the old convention:
//!
//! - the application face on every node is `node_count + 256`
//! - the face on `local` that reaches `peer` is `peer + 256 + (peer < local)`

use vanet_core::{FaceId, NodeId};

/// Offset separating face ids from node ids
pub const APPLICATION_OFFSET: u64 = 256;

/// Smallest relay face id
pub const RELAY_BASE: u64 = 257;

/// Face numbering for a network of `node_count` nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyAddressing {
    node_count: usize,
}

impl LegacyAddressing {
    pub fn new(node_count: usize) -> Self {
        Self { node_count }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Id of the application face
    pub fn application_face(&self) -> FaceId {
        FaceId(self.node_count as u64 + APPLICATION_OFFSET)
    }

    /// Check if `face` is the application face
    pub fn is_application(&self, face: FaceId) -> bool {
        face == self.application_face()
    }

    /// Face on `local` that reaches `peer`
    pub fn face_toward(&self, local: NodeId, peer: NodeId) -> FaceId {
        let below = u64::from(peer.0 < local.0);
        FaceId(u64::from(peer.0) + APPLICATION_OFFSET + below)
    }

    /// Node at the far end of a relay face on `local`
    ///
    /// Returns `None` for the application face and for ids that do not map
    /// to another node in the network.
    pub fn resolve_peer(&self, face: FaceId, local: NodeId) -> Option<NodeId> {
        if face.0 < RELAY_BASE || self.is_application(face) {
            return None;
        }
        let above = u64::from(u64::from(local.0) + RELAY_BASE <= face.0);
        let peer = (face.0 - RELAY_BASE) + above;
        if peer >= self.node_count as u64 || peer == u64::from(local.0) {
            return None;
        }
        u32::try_from(peer).ok().map(NodeId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_face() {
        let addressing = LegacyAddressing::new(4);
        assert_eq!(addressing.application_face(), FaceId(260));
        assert!(addressing.is_application(FaceId(260)));
        assert!(!addressing.is_application(FaceId(259)));
        assert_eq!(addressing.resolve_peer(FaceId(260), NodeId(0)), None);
    }

    #[test]
    fn test_face_numbers() {
        let addressing = LegacyAddressing::new(4);
        // From node 2: peers 0 and 1 sit below, peer 3 above
        assert_eq!(addressing.face_toward(NodeId(2), NodeId(0)), FaceId(257));
        assert_eq!(addressing.face_toward(NodeId(2), NodeId(1)), FaceId(258));
        assert_eq!(addressing.face_toward(NodeId(2), NodeId(3)), FaceId(259));
        assert_eq!(addressing.face_toward(NodeId(0), NodeId(1)), FaceId(257));
    }

    #[test]
    fn test_resolve_inverts_face_toward() {
        let addressing = LegacyAddressing::new(6);
        for local in 0..6u32 {
            for peer in 0..6u32 {
                if local == peer {
                    continue;
                }
                let face = addressing.face_toward(NodeId(local), NodeId(peer));
                assert_ne!(face, addressing.application_face());
                assert_eq!(
                    addressing.resolve_peer(face, NodeId(local)),
                    Some(NodeId(peer))
                );
            }
        }
    }

    #[test]
    fn test_resolve_rejects_foreign_ids() {
        let addressing = LegacyAddressing::new(3);
        assert_eq!(addressing.resolve_peer(FaceId(1), NodeId(0)), None);
        assert_eq!(addressing.resolve_peer(FaceId(300), NodeId(0)), None);
    }
}
