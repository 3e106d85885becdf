//! Next-hop choice for each selection policy
//!
//! These functions only rank; sending, deferring and dropping stay with the
//! engine. Every ranking works on [`HopView`]s, FIB next hops joined with
//! their face and the current kinematics of the peer.

use std::time::Duration;

use vanet_core::{Face, FaceId, FibMatch, ForwardingContext, Kinematics, Name, NodeId};

use crate::link_model::{
    EPSILON, LinkModel, along_road_distance, distance, is_road_direction, relative_speed,
};
use crate::measurements::MeasurementTable;
use crate::selector::{
    Candidate, Criterion, Topsis, select_normalized_sum, select_weighted_sum,
};

/// Column guard used by the receiver-side election
const ELECTION_EPSILON: f64 = 0.001;

/// A FIB next hop with its face and peer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HopView {
    pub face: Face,
    pub cost: u64,
    pub peer: Option<(NodeId, Kinematics)>,
}

impl HopView {
    /// A hop is eligible unless it leads back out the ingress face over a
    /// point-to-point link
    pub fn is_eligible(&self, ingress: FaceId) -> bool {
        self.face.id != ingress || self.face.is_broadcast()
    }

    pub fn is_application(&self) -> bool {
        self.face.is_application()
    }
}

/// Join the FIB next hops with faces and peer kinematics, keeping order
pub fn collect_hops(ctx: &dyn ForwardingContext, fib: &FibMatch) -> Vec<HopView> {
    fib.next_hops
        .iter()
        .filter_map(|hop| {
            let face = ctx.face(hop.face)?;
            let peer = face
                .peer
                .and_then(|p| ctx.kinematics(p).map(|k| (p, k)));
            Some(HopView {
                face,
                cost: hop.cost,
                peer,
            })
        })
        .collect()
}

/// First hop that is eligible for `ingress`
pub fn first_eligible(hops: &[HopView], ingress: FaceId) -> Option<&HopView> {
    hops.iter().find(|h| h.is_eligible(ingress))
}

/// Update the neighbor cache in place
///
/// Nodes farther than the radio range are dropped, known nodes keep their
/// slot and new nodes are appended.
pub fn refresh_neighbors(
    cache: &mut Vec<(NodeId, Kinematics)>,
    nodes: &[Kinematics],
    local: &Kinematics,
    range: f64,
) {
    for (i, k) in nodes.iter().enumerate() {
        let Ok(id) = u32::try_from(i) else {
            continue;
        };
        let id = NodeId(id);
        let slot = cache.iter().position(|(n, _)| *n == id);
        match (distance(k, local) > range, slot) {
            (true, Some(slot)) => {
                cache.remove(slot);
            }
            (true, None) => {}
            (false, Some(slot)) => cache[slot].1 = *k,
            (false, None) => cache.push((id, *k)),
        }
    }
}

/// Rank the sender's neighbors on the receiver's side and return the winner
///
/// Only neighbors lying beyond the sender in the receiver's direction along
/// x, and strictly within range of the sender, take part. They are ranked
/// by distance from the sender, relative speed (lower is better) and link
/// lifetime to the sender.
pub fn receiver_election(
    model: &LinkModel,
    neighbors: &[(NodeId, Kinematics)],
    sender: &Kinematics,
    receiver: &Kinematics,
) -> Option<NodeId> {
    let x_c = sender.position.x;
    let x_r = receiver.position.x;

    let candidates: Vec<Candidate<NodeId>> = neighbors
        .iter()
        .filter(|(_, k)| {
            let x = k.position.x;
            (x_r > x_c && x > x_c) || (x_r < x_c && x < x_c)
        })
        .filter(|(_, k)| distance(sender, k) < model.radio_range)
        .map(|(id, k)| {
            Candidate::new(
                *id,
                vec![
                    distance(sender, k),
                    relative_speed(sender, k),
                    model.link_expiration(sender, k),
                ],
            )
        })
        .collect();

    Topsis::new(vec![Criterion::Benefit, Criterion::Cost, Criterion::Benefit])
        .with_epsilon(ELECTION_EPSILON)
        .select(&candidates)
        .map(|c| c.item)
}

/// Farthest stable peer on one side of `local` along the road
///
/// Peers must be in range with a link lifetime of at least `min_let` and
/// strictly ahead of (or behind) the local node.
pub fn designate(
    model: &LinkModel,
    local: &Kinematics,
    hops: &[HopView],
    ahead: bool,
    min_let: f64,
) -> Option<NodeId> {
    let mut best: Option<(NodeId, f64)> = None;
    for (peer, k) in hops.iter().filter_map(|h| h.peer) {
        if !model.in_range(local, &k)
            || model.link_expiration(local, &k) < min_let
            || is_road_direction(local, &k) != ahead
        {
            continue;
        }
        let along = along_road_distance(local, &k, 0.0);
        if along > best.map(|(_, d)| d).unwrap_or(0.0) {
            best = Some((peer, along));
        }
    }
    best.map(|(peer, _)| peer)
}

/// Outcome of the content-aware ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentChoice {
    /// Content is served locally
    Application(FaceId),
    Relay(FaceId),
    NoCandidate,
}

/// TOPSIS over hops that make progress towards a content source
///
/// A hop whose peer is itself an in-range source beats every other hop.
/// Otherwise a hop qualifies if its peer is in range and no farther from
/// some source than the local node is.
pub fn content_aware(
    model: &LinkModel,
    measurements: &MeasurementTable,
    prefix: &Name,
    now: Duration,
    local: &Kinematics,
    hops: &[HopView],
    sources: &[(NodeId, Kinematics)],
) -> ContentChoice {
    if let Some(app) = hops.iter().find(|h| h.is_application()) {
        return ContentChoice::Application(app.face.id);
    }

    let range = model.radio_range;
    let mut in_region = Vec::new();
    let mut forward = Vec::new();

    for (source, source_kin) in sources {
        let d_sd = distance(local, source_kin);
        for hop in hops {
            let Some((peer, peer_kin)) = hop.peer else {
                continue;
            };
            if d_sd < range && peer == *source {
                in_region.push((hop.face.id, peer_kin));
            } else if distance(local, &peer_kin) < range && distance(&peer_kin, source_kin) <= d_sd {
                forward.push((hop.face.id, peer_kin));
            }
        }
    }

    let pool = if in_region.is_empty() { forward } else { in_region };
    let candidates: Vec<Candidate<FaceId>> = pool
        .into_iter()
        .map(|(face, k)| {
            let metrics = measurements.link_metrics(prefix, face, now);
            Candidate::new(
                face,
                vec![
                    along_road_distance(local, &k, EPSILON),
                    metrics.sisr,
                    metrics.positive_srtt,
                ],
            )
        })
        .collect();

    match Topsis::new(vec![Criterion::Benefit; 3]).select(&candidates) {
        Some(c) => ContentChoice::Relay(c.item),
        None => ContentChoice::NoCandidate,
    }
}

/// Highest `α·LET + β·LAP`, falling back to the first hop
///
/// The first hop wins outright if it leads to the application.
pub fn weighted_link_sum(
    model: &LinkModel,
    horizon: f64,
    alpha: f64,
    beta: f64,
    local: &Kinematics,
    hops: &[HopView],
) -> Option<FaceId> {
    let first = hops.first()?;
    if first.is_application() {
        return Some(first.face.id);
    }

    let candidates: Vec<Candidate<FaceId>> = hops
        .iter()
        .filter_map(|h| h.peer.map(|(_, k)| (h.face.id, k)))
        .map(|(face, k)| {
            let let_secs = model.link_expiration(local, &k);
            Candidate::new(face, vec![let_secs, model.availability(let_secs, horizon)])
        })
        .collect();

    Some(
        select_weighted_sum(&candidates, &[alpha, beta])
            .map(|c| c.item)
            .unwrap_or(first.face.id),
    )
}

/// Highest sum of normalized LET, LAP, SRTT and SISR
///
/// The ingress face and links with no remaining lifetime are skipped. The
/// first hop wins outright if it leads to the application.
pub fn normalized_sum(
    model: &LinkModel,
    horizon: f64,
    measurements: &MeasurementTable,
    prefix: &Name,
    now: Duration,
    local: &Kinematics,
    hops: &[HopView],
    ingress: FaceId,
) -> Option<FaceId> {
    let first = hops.first()?;
    if first.is_application() {
        return Some(first.face.id);
    }

    let candidates: Vec<Candidate<FaceId>> = hops
        .iter()
        .filter(|h| h.face.id != ingress)
        .filter_map(|h| h.peer.map(|(_, k)| (h.face.id, k)))
        .filter_map(|(face, k)| {
            let let_secs = model.link_expiration(local, &k);
            if let_secs == 0.0 {
                return None;
            }
            let metrics = measurements.link_metrics(prefix, face, now);
            Some(Candidate::new(
                face,
                vec![
                    let_secs,
                    model.availability(let_secs, horizon),
                    metrics.positive_srtt,
                    metrics.sisr,
                ],
            ))
        })
        .collect();

    select_normalized_sum(&candidates).map(|c| c.item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanet_core::Vec3;

    fn make_kin(x: f64, vx: f64) -> Kinematics {
        Kinematics::new(Vec3::planar(x, 0.0), Vec3::planar(vx, 0.0))
    }

    fn make_hop(face: u64, peer: u32, x: f64) -> HopView {
        HopView {
            face: Face::relay(FaceId(face), NodeId(peer), false),
            cost: 0,
            peer: Some((NodeId(peer), make_kin(x, 0.0))),
        }
    }

    #[test]
    fn test_eligibility() {
        let p2p = make_hop(257, 1, 80.0);
        assert!(!p2p.is_eligible(FaceId(257)));
        assert!(p2p.is_eligible(FaceId(258)));

        let mut broadcast = p2p;
        broadcast.face.broadcast = true;
        assert!(broadcast.is_eligible(FaceId(257)));
    }

    #[test]
    fn test_refresh_neighbors() {
        let local = make_kin(0.0, 0.0);
        let mut cache = Vec::new();
        let nodes = vec![local, make_kin(50.0, 0.0), make_kin(300.0, 0.0)];
        refresh_neighbors(&mut cache, &nodes, &local, 200.0);
        assert_eq!(cache.iter().map(|(n, _)| n.0).collect::<Vec<_>>(), vec![0, 1]);

        let moved = vec![local, make_kin(250.0, 0.0), make_kin(150.0, 0.0)];
        refresh_neighbors(&mut cache, &moved, &local, 200.0);
        assert_eq!(cache.iter().map(|(n, _)| n.0).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(cache[1].1.position.x, 150.0);
    }

    #[test]
    fn test_receiver_election_prefers_far_stable_node() {
        let model = LinkModel::new(200.0);
        let sender = make_kin(0.0, 10.0);
        let neighbors = vec![
            (NodeId(1), make_kin(50.0, 10.0)),
            (NodeId(2), make_kin(150.0, 10.0)),
            (NodeId(3), make_kin(-100.0, 10.0)),
        ];
        let winner = receiver_election(&model, &neighbors, &sender, &make_kin(50.0, 10.0));
        assert_eq!(winner, Some(NodeId(2)));

        // Receiver level with the sender has no side to elect on
        let none = receiver_election(&model, &neighbors, &sender, &make_kin(0.0, 0.0));
        assert_eq!(none, None);
    }

    #[test]
    fn test_designate_both_directions() {
        let model = LinkModel::new(200.0);
        let local = make_kin(100.0, 0.0);
        let hops = vec![
            make_hop(257, 0, 0.0),
            make_hop(258, 1, 50.0),
            make_hop(259, 3, 250.0),
            make_hop(260, 4, 400.0),
        ];
        assert_eq!(designate(&model, &local, &hops, true, 1.0), Some(NodeId(3)));
        assert_eq!(designate(&model, &local, &hops, false, 1.0), Some(NodeId(0)));
        // Threshold above any lifetime leaves nobody
        assert_eq!(designate(&model, &local, &hops, true, 2e6), None);
    }

    #[test]
    fn test_content_aware_in_region_wins() {
        let model = LinkModel::new(200.0);
        let measurements = MeasurementTable::default();
        let prefix: Name = "/ustc".parse().unwrap();
        let local = make_kin(0.0, 0.0);
        let hops = vec![make_hop(257, 1, 100.0), make_hop(258, 2, 150.0)];
        let sources = vec![(NodeId(1), make_kin(100.0, 0.0))];
        assert_eq!(
            content_aware(&model, &measurements, &prefix, Duration::ZERO, &local, &hops, &sources),
            ContentChoice::Relay(FaceId(257))
        );
    }

    #[test]
    fn test_content_aware_progress_and_app() {
        let model = LinkModel::new(200.0);
        let measurements = MeasurementTable::default();
        let prefix: Name = "/ustc".parse().unwrap();
        let local = make_kin(0.0, 0.0);
        let hops = vec![make_hop(257, 1, -100.0), make_hop(258, 2, 150.0)];
        let sources = vec![(NodeId(5), make_kin(600.0, 0.0))];
        assert_eq!(
            content_aware(&model, &measurements, &prefix, Duration::ZERO, &local, &hops, &sources),
            ContentChoice::Relay(FaceId(258))
        );
        assert_eq!(
            content_aware(&model, &measurements, &prefix, Duration::ZERO, &local, &hops, &[]),
            ContentChoice::NoCandidate
        );

        let mut with_app = hops.clone();
        with_app.push(HopView {
            face: Face::application(FaceId(262)),
            cost: 0,
            peer: None,
        });
        assert_eq!(
            content_aware(&model, &measurements, &prefix, Duration::ZERO, &local, &with_app, &sources),
            ContentChoice::Application(FaceId(262))
        );
    }

    #[test]
    fn test_content_aware_ignores_lapsed_measurements() {
        let model = LinkModel::new(200.0);
        let measurements = MeasurementTable::new(Duration::from_secs(10));
        let prefix: Name = "/ustc".parse().unwrap();
        let local = make_kin(0.0, 0.0);
        let hops = vec![make_hop(257, 1, 100.0), make_hop(258, 2, 150.0)];
        let sources = vec![(NodeId(5), make_kin(600.0, 0.0))];

        // Unmeasured, the farther hop wins on progress alone
        assert_eq!(
            content_aware(&model, &measurements, &prefix, Duration::ZERO, &local, &hops, &sources),
            ContentChoice::Relay(FaceId(258))
        );

        measurements.update(&prefix, FaceId(257), Duration::ZERO, |info| {
            info.record_isr(1.0);
            info.record_rtt(Duration::from_millis(100));
        });
        let at = |secs| {
            content_aware(
                &model,
                &measurements,
                &prefix,
                Duration::from_secs(secs),
                &local,
                &hops,
                &sources,
            )
        };
        assert_eq!(at(5), ContentChoice::Relay(FaceId(257)));
        assert_eq!(at(20), ContentChoice::Relay(FaceId(258)));
    }

    #[test]
    fn test_weighted_link_sum_prefers_longer_link() {
        let model = LinkModel::new(100.0);
        let local = make_kin(0.0, 10.0);
        let hops = vec![
            HopView {
                peer: Some((NodeId(1), make_kin(50.0, -10.0))),
                ..make_hop(257, 1, 0.0)
            },
            HopView {
                peer: Some((NodeId(2), make_kin(50.0, 9.0))),
                ..make_hop(258, 2, 0.0)
            },
        ];
        assert_eq!(
            weighted_link_sum(&model, 2.0, 0.5, 0.5, &local, &hops),
            Some(FaceId(258))
        );
        assert_eq!(weighted_link_sum(&model, 2.0, 0.5, 0.5, &local, &[]), None);
    }

    #[test]
    fn test_normalized_sum_skips_ingress() {
        let mut model = LinkModel::new(100.0);
        model.let_max = 50.0;
        let measurements = MeasurementTable::default();
        let prefix: Name = "/ustc".parse().unwrap();
        let local = make_kin(0.0, 0.0);
        let hops = vec![make_hop(257, 1, 50.0), make_hop(258, 2, 80.0)];
        assert_eq!(
            normalized_sum(&model, 2.0, &measurements, &prefix, Duration::ZERO, &local, &hops, FaceId(257)),
            Some(FaceId(258))
        );
        // Out-of-range peer has no lifetime left
        let far = vec![make_hop(257, 1, 50.0), make_hop(258, 2, 500.0)];
        assert_eq!(
            normalized_sum(&model, 2.0, &measurements, &prefix, Duration::ZERO, &local, &far, FaceId(257)),
            None
        );
    }
}
