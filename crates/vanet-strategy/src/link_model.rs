//! Link-quality model
//!
//! Pure functions over node kinematics:
//!
//! - **LET**: time until two nodes under constant velocity drift out of range
//! - **LAP**: probability a link that has lasted `t` survives another `Δt`
//! - **Road alignment**: cosine between a node's heading and a source/destination axis
//! - **Density**: a node's neighbor count relative to the network average
//! - **Along-road distance**: progress projected on the road direction

use serde::{Deserialize, Serialize};

use vanet_core::{Kinematics, Vec3};

/// LET reported for a pair with no relative motion
pub const UNBOUNDED_LET: f64 = 1e6;

/// Small additive guard used against zero-length vectors and distances
pub const EPSILON: f64 = 1e-4;

/// Decay rate of the link availability model
pub const DEFAULT_LAP_LAMBDA: f64 = 10.0;

/// Fixed road direction for the along-road measures
pub const ROAD_DIRECTION: Vec3 = Vec3 {
    x: 1.0,
    y: 0.0,
    z: 0.0,
};

/// How the link expiration time is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LetMode {
    /// Out-of-range pairs get 0, motionless pairs get the maximum
    Guarded,
    /// A small offset is added to the relative velocity instead of branching
    Perturbed,
}

/// How local density is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DensityMode {
    /// Neighbor count over the network-wide average, capped at 1
    Ratio,
    /// Raw count of nodes in range, the node itself included
    Count,
}

/// Parameters shared by every link-quality computation of one strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkModel {
    /// Radio range `Rth` in metres
    pub radio_range: f64,
    pub let_mode: LetMode,
    /// Upper clamp for LET
    pub let_max: f64,
    /// Rate `λ` of the availability model
    pub lap_lambda: f64,
    pub density: DensityMode,
}

impl LinkModel {
    pub fn new(radio_range: f64) -> Self {
        Self {
            radio_range,
            let_mode: LetMode::Guarded,
            let_max: UNBOUNDED_LET,
            lap_lambda: DEFAULT_LAP_LAMBDA,
            density: DensityMode::Ratio,
        }
    }

    /// Check if two nodes can hear each other
    pub fn in_range(&self, a: &Kinematics, b: &Kinematics) -> bool {
        distance(a, b) <= self.radio_range
    }

    /// Link expiration time between `a` and `b` in seconds
    pub fn link_expiration(&self, a: &Kinematics, b: &Kinematics) -> f64 {
        link_expiration_time(a, b, self.radio_range, self.let_mode, self.let_max)
    }

    /// Probability the link survives another `delta_t` seconds
    pub fn availability(&self, let_secs: f64, delta_t: f64) -> f64 {
        link_availability(let_secs, delta_t, self.lap_lambda)
    }

    /// Density of node `index` within `nodes`
    pub fn density(&self, index: usize, nodes: &[Kinematics]) -> f64 {
        local_density(index, nodes, self.radio_range, self.density)
    }
}

/// Euclidean distance between current positions
pub fn distance(a: &Kinematics, b: &Kinematics) -> f64 {
    a.position.distance_to(&b.position)
}

/// Magnitude of the planar velocity difference
pub fn relative_speed(a: &Kinematics, b: &Kinematics) -> f64 {
    let dv = a.velocity - b.velocity;
    (dv.x * dv.x + dv.y * dv.y).sqrt()
}

/// Time until `|Δpos + t·Δvel|` first exceeds `range`
///
/// The result is always within `[0, max]`. A negative discriminant (the
/// pair never comes within range on its current course) is clamped to 0
/// rather than producing NaN.
pub fn link_expiration_time(
    a: &Kinematics,
    b: &Kinematics,
    range: f64,
    mode: LetMode,
    max: f64,
) -> f64 {
    let m = a.position.x - b.position.x;
    let n = a.position.y - b.position.y;
    let mut p = a.velocity.x - b.velocity.x;
    let mut q = a.velocity.y - b.velocity.y;

    match mode {
        LetMode::Guarded => {
            if distance(a, b) > range {
                return 0.0;
            }
            if p == 0.0 && q == 0.0 {
                return max;
            }
        }
        LetMode::Perturbed => {
            p += EPSILON;
            q += EPSILON;
        }
    }

    let speed_sq = p * p + q * q;
    let discriminant = (speed_sq * range * range - (n * p - m * q).powi(2)).max(0.0);
    let let_secs = (-(m * p + n * q) + discriminant.sqrt()) / speed_sq;

    if let_secs.is_nan() {
        return 0.0;
    }
    let_secs.clamp(0.0, max)
}

/// Link availability probability
///
/// `L = (1 - e^{-2λt})/(2λt) + ½λt·e^{-2λt}`; the result is
/// `1 - (1-L)/t·Δt` when `Δt ≤ t`, otherwise `L / (ln(Δt - t + 1) + 1)`.
pub fn link_availability(t: f64, delta_t: f64, lambda: f64) -> f64 {
    if t <= 0.0 || !t.is_finite() {
        return 0.0;
    }
    let decay = (-2.0 * lambda * t).exp();
    let l = (1.0 - decay) / (2.0 * lambda * t) + 0.5 * lambda * t * decay;
    if delta_t <= t {
        1.0 - (1.0 - l) / t * delta_t
    } else {
        l / ((delta_t - t + 1.0).ln() + 1.0)
    }
}

/// Cosine between `node`'s velocity and the vector `src - dst`
pub fn road_alignment(node: &Kinematics, src: &Kinematics, dst: &Kinematics) -> f64 {
    let heading = node.velocity;
    let axis = src.position - dst.position;
    heading.dot_planar(&axis) / ((heading.length() + EPSILON) * (axis.length() + EPSILON))
}

/// Neighbor density of `nodes[index]`
///
/// Neighbors are nodes strictly closer than `range`. Returns 0 for an
/// out-of-bounds index or a network with no links at all.
pub fn local_density(index: usize, nodes: &[Kinematics], range: f64, mode: DensityMode) -> f64 {
    let Some(node) = nodes.get(index) else {
        return 0.0;
    };
    let in_range = |k: &Kinematics| nodes.iter().filter(|o| distance(k, o) < range).count();

    match mode {
        DensityMode::Count => in_range(node) as f64,
        DensityMode::Ratio => {
            let own = in_range(node).saturating_sub(1) as f64;
            let total: usize = nodes.iter().map(|k| in_range(k).saturating_sub(1)).sum();
            let average = total as f64 / nodes.len() as f64;
            if average <= 0.0 {
                return 0.0;
            }
            (own / average).min(1.0)
        }
    }
}

/// Log distance progress of `candidate` towards `dst`, measured from `src`
///
/// `max(ln(d(src,dst) / (d(candidate,dst) + ε) + ε), 0.1)`
pub fn distance_progress(candidate: &Kinematics, src: &Kinematics, dst: &Kinematics) -> f64 {
    let d_jd = distance(candidate, dst) + EPSILON;
    let d_sd = distance(src, dst);
    (d_sd / d_jd + EPSILON).ln().max(0.1)
}

/// Check if `candidate` lies between `src` and `dst`
///
/// The candidate must be within range of `src` and inside the radius
/// `1.5·d(src,dst) - range` around `dst`.
pub fn is_intermediate(candidate: &Kinematics, src: &Kinematics, dst: &Kinematics, range: f64) -> bool {
    let d_sd = distance(src, dst);
    let d_sj = distance(src, candidate);
    let d_jd = distance(candidate, dst);
    d_sj <= range && d_jd <= 1.5 * d_sd - range
}

/// Distance from `from` to `to` projected on the road direction
///
/// `offset` is added to the Euclidean distance before projecting.
pub fn along_road_distance(from: &Kinematics, to: &Kinematics, offset: f64) -> f64 {
    let euclid = distance(from, to) + offset;
    let delta = to.position - from.position;
    let angle = ROAD_DIRECTION.x.atan2(ROAD_DIRECTION.y) - delta.x.atan2(delta.y);
    (euclid * angle.cos()).abs()
}

/// Check if `to` is ahead of `from` along the road direction
pub fn is_road_direction(from: &Kinematics, to: &Kinematics) -> bool {
    (to.position - from.position).dot_planar(&ROAD_DIRECTION) >= 0.0
}
