//! Deferred-broadcast suppression
//!
//! A node that hears a broadcast it could retransmit does not send at once.
//! It records a [`WaitEntry`] keyed by `(name, nonce)`, schedules a timer
//! after a geometry-derived delay and sends only if nothing better is heard
//! before the timer fires.
//!
//! ```text
//! Idle ──hear──▶ Waiting ──timer──▶ Sent
//!                   │
//!                   └──overhear / loop──▶ Suppressed
//! ```
//!
//! Interest and Data use separate [`WaitTable`]s. A table never holds more
//! than one entry per key: a duplicate arriving while `Waiting` consults the
//! existing entry instead of scheduling a second timer.

use std::collections::HashMap;
use std::f64::consts::FRAC_PI_4;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use vanet_core::{
    FaceId, ForwardingContext, Kinematics, Name, NodeId, PitToken, StrategyTimer, TimerId,
};

use crate::link_model::{EPSILON, distance, is_road_direction};

/// Key of a deferred send
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaitKey {
    pub name: Name,
    pub nonce: u32,
}

impl WaitKey {
    pub fn new(name: Name, nonce: u32) -> Self {
        Self { name, nonce }
    }
}

/// Lifecycle position of one key in one table
///
/// `Sent` and `Suppressed` are terminal transitions rather than stored states:
/// [`WaitTable::take`] (timer fired) and [`WaitTable::cancel`] both remove the
/// entry, after which the key reads `Idle` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// No send is scheduled
    Idle,
    /// A send is scheduled to fire at the given time
    Waiting { fire_at: Duration },
}

/// A scheduled retransmission
#[derive(Debug, Clone, PartialEq)]
pub struct WaitEntry<P> {
    /// Node whose transmission started the wait
    pub previous_hop: Option<NodeId>,
    /// Token the strategy handed to the host
    pub token: StrategyTimer,
    pub timer: TimerId,
    pub fire_at: Duration,
    pub egress: FaceId,
    pub pit: PitToken,
    /// Packet to send when the timer fires
    pub payload: P,
}

/// Deferred sends of one packet type
#[derive(Debug)]
pub struct WaitTable<P> {
    entries: HashMap<WaitKey, WaitEntry<P>>,
}

impl<P> WaitTable<P> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn state(&self, key: &WaitKey) -> WaitState {
        match self.entries.get(key) {
            Some(entry) => WaitState::Waiting {
                fire_at: entry.fire_at,
            },
            None => WaitState::Idle,
        }
    }

    pub fn get(&self, key: &WaitKey) -> Option<&WaitEntry<P>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &WaitKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Record a scheduled send
    ///
    /// Returns the entry back if the key is already waiting; the existing
    /// entry is left untouched.
    pub fn insert(&mut self, key: WaitKey, entry: WaitEntry<P>) -> Result<(), WaitEntry<P>> {
        if self.entries.contains_key(&key) {
            return Err(entry);
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Remove the entry whose timer just fired
    pub fn take(&mut self, key: &WaitKey) -> Option<WaitEntry<P>> {
        self.entries.remove(key)
    }

    /// Cancel the scheduled send and discard the entry
    pub fn cancel(&mut self, ctx: &mut dyn ForwardingContext, key: &WaitKey) -> Option<WaitEntry<P>> {
        let entry = self.entries.remove(key)?;
        ctx.cancel(entry.timer);
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P> Default for WaitTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// How long a node waits before retransmitting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DeferFormula {
    /// `|Rth - d| · max_defer / Rth`: the farthest receiver waits least
    DistanceScaled { max_defer: Duration },
    /// `1 / (d + ε)` seconds
    InverseDistance,
    /// `α·(2Rth/3c)² / LET · (1 + U(0, jitter)) + Rth/3c`
    LinkLifetime {
        alpha: f64,
        propagation_speed: f64,
        jitter: f64,
    },
}

impl DeferFormula {
    /// Delay before retransmitting
    ///
    /// `distance` is measured to the node the packet was heard from and
    /// `let_secs` is the lifetime of that link. A non-positive lifetime is
    /// floored at [`EPSILON`].
    pub fn delay<R: Rng + ?Sized>(
        &self,
        distance: f64,
        let_secs: f64,
        radio_range: f64,
        rng: &mut R,
    ) -> Duration {
        let secs = match *self {
            DeferFormula::DistanceScaled { max_defer } => {
                (radio_range - distance).abs() * max_defer.as_secs_f64() / radio_range
            }
            DeferFormula::InverseDistance => 1.0 / (distance + EPSILON),
            DeferFormula::LinkLifetime {
                alpha,
                propagation_speed,
                jitter,
            } => {
                let hop = radio_range / 3.0 / propagation_speed;
                let jitter = if jitter > 0.0 {
                    rng.random_range(0.0..jitter)
                } else {
                    0.0
                };
                alpha * (2.0 * hop).powi(2) / let_secs.max(EPSILON) * (1.0 + jitter) + hop
            }
        };
        secs_to_duration(secs)
    }
}

/// Convert seconds to a duration, mapping negative or NaN to zero
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// When an overheard duplicate cancels a waiting send
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SuppressionTest {
    /// Suppress when the angle at the original sender between the new
    /// sender and the local node is below `threshold` radians
    Angular { threshold: f64 },
    /// Suppress when the new sender already sits past the local node in
    /// the direction the packet is travelling along the road
    RoadDirection,
    /// Any duplicate suppresses
    Always,
}

impl SuppressionTest {
    /// Default angular threshold
    pub const DEFAULT_ANGLE: f64 = FRAC_PI_4;

    /// Decide whether the waiting send should be cancelled
    ///
    /// A missing original sender always suppresses.
    pub fn should_suppress(
        &self,
        previous: Option<&Kinematics>,
        new_sender: &Kinematics,
        local: &Kinematics,
    ) -> bool {
        match self {
            SuppressionTest::Always => true,
            SuppressionTest::Angular { threshold } => match previous {
                Some(previous) => suppression_angle(previous, new_sender, local) < *threshold,
                None => true,
            },
            SuppressionTest::RoadDirection => match previous {
                Some(previous) => {
                    is_road_direction(previous, local) == is_road_direction(local, new_sender)
                }
                None => true,
            },
        }
    }
}

/// Angle at the original sender `a` between the new sender `b` and local `c`
///
/// Law of cosines with a small guard on the denominator. The cosine is
/// clamped so rounding never yields NaN.
pub fn suppression_angle(a: &Kinematics, b: &Kinematics, c: &Kinematics) -> f64 {
    let d_ab = distance(a, b);
    let d_ac = distance(a, c);
    let d_bc = distance(b, c);
    let cos = (d_ab * d_ab + d_ac * d_ac - d_bc * d_bc) / (2.0 * d_ab * d_ac + EPSILON);
    cos.clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use vanet_core::Vec3;

    fn make_node(x: f64, y: f64) -> Kinematics {
        Kinematics::stationary(Vec3::planar(x, y))
    }

    fn make_entry(timer: u64) -> WaitEntry<&'static str> {
        WaitEntry {
            previous_hop: Some(NodeId(0)),
            token: StrategyTimer(timer),
            timer: TimerId(timer),
            fire_at: Duration::from_millis(timer),
            egress: FaceId(257),
            pit: PitToken(1),
            payload: "interest",
        }
    }

    fn make_key() -> WaitKey {
        WaitKey::new("/ustc/1".parse().unwrap(), 7)
    }

    #[test]
    fn test_distance_scaled_defer() {
        let mut rng = StdRng::seed_from_u64(1);
        let formula = DeferFormula::DistanceScaled {
            max_defer: Duration::from_millis(2),
        };
        let delay = formula.delay(150.0, 0.0, 200.0, &mut rng);
        assert!((delay.as_secs_f64() - 0.0005).abs() < 1e-12);
        // Farthest receiver waits least
        let near = formula.delay(50.0, 0.0, 200.0, &mut rng);
        assert!(near > delay);
    }

    #[test]
    fn test_inverse_distance_defer() {
        let mut rng = StdRng::seed_from_u64(1);
        let delay = DeferFormula::InverseDistance.delay(80.0, 0.0, 500.0, &mut rng);
        assert!((delay.as_secs_f64() - 1.0 / 80.0001).abs() < 1e-9);
    }

    #[test]
    fn test_link_lifetime_defer_jitter_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let formula = DeferFormula::LinkLifetime {
            alpha: 1e9,
            propagation_speed: 1e8,
            jitter: 0.1,
        };
        let hop: f64 = 200.0 / 3.0 / 1e8;
        let base = 1e9 * (2.0 * hop).powi(2) / 10.0;
        for _ in 0..50 {
            let secs = formula.delay(100.0, 10.0, 200.0, &mut rng).as_secs_f64();
            assert!(secs >= base + hop - 1e-12);
            assert!(secs <= base * 1.1 + hop + 1e-12);
        }
    }

    #[test]
    fn test_link_lifetime_zero_let_is_finite() {
        let mut rng = StdRng::seed_from_u64(3);
        let formula = DeferFormula::LinkLifetime {
            alpha: 1e9,
            propagation_speed: 1e8,
            jitter: 0.0,
        };
        assert!(formula.delay(100.0, 0.0, 200.0, &mut rng) < Duration::from_secs(60));
    }

    #[test]
    fn test_secs_to_duration_guards() {
        assert_eq!(secs_to_duration(-1.0), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::INFINITY), Duration::MAX);
    }

    #[test]
    fn test_angular_suppression() {
        let test = SuppressionTest::Angular {
            threshold: SuppressionTest::DEFAULT_ANGLE,
        };
        let original = make_node(0.0, 0.0);
        let local = make_node(100.0, 0.0);
        // New sender nearly in line with the local node covers the same area
        let ahead = make_node(150.0, 10.0);
        assert!(test.should_suppress(Some(&original), &ahead, &local));
        // New sender off to the side does not
        let side = make_node(0.0, 100.0);
        assert!(!test.should_suppress(Some(&original), &side, &local));
        assert!(test.should_suppress(None, &side, &local));
    }

    #[test]
    fn test_road_direction_suppression() {
        let test = SuppressionTest::RoadDirection;
        let previous = make_node(0.0, 0.0);
        let local = make_node(100.0, 0.0);
        // Travelling +x: a sender further along already covers us
        let beyond = make_node(160.0, 5.0);
        assert!(test.should_suppress(Some(&previous), &beyond, &local));
        // A sender still behind us does not
        let behind = make_node(40.0, -5.0);
        assert!(!test.should_suppress(Some(&previous), &behind, &local));

        // Travelling -x flips both cases
        let previous = make_node(200.0, 0.0);
        assert!(test.should_suppress(Some(&previous), &behind, &local));
        assert!(!test.should_suppress(Some(&previous), &beyond, &local));

        assert!(test.should_suppress(None, &behind, &local));
    }

    #[test]
    fn test_angle_never_nan() {
        let a = make_node(0.0, 0.0);
        assert!(!suppression_angle(&a, &a, &a).is_nan());
        let b = make_node(10.0, 0.0);
        let c = make_node(20.0, 0.0);
        assert!(suppression_angle(&a, &b, &c).abs() < 1e-3);
    }

    #[test]
    fn test_single_entry_per_key() {
        let mut table = WaitTable::new();
        let key = make_key();
        assert_eq!(table.state(&key), WaitState::Idle);

        assert!(table.insert(key.clone(), make_entry(5)).is_ok());
        let rejected = table.insert(key.clone(), make_entry(9));
        assert_eq!(rejected.unwrap_err().timer, TimerId(9));
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.state(&key),
            WaitState::Waiting {
                fire_at: Duration::from_millis(5)
            }
        );

        assert_eq!(table.take(&key).map(|e| e.timer), Some(TimerId(5)));
        assert_eq!(table.state(&key), WaitState::Idle);
        assert!(table.take(&key).is_none());
    }
}
