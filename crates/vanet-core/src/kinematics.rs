//! Position and velocity vectors
//!
//! Mobility is owned by the host. Strategies only read snapshots of it
//! through [`Kinematics`].

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A 3D vector in metres (positions) or metres per second (velocities)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Vector in the road plane
    pub fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Dot product restricted to the x/y plane
    pub fn dot_planar(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance_to(&self, other: &Vec3) -> f64 {
        (*self - *other).length()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Snapshot of a node's motion at one simulated instant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl Kinematics {
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self { position, velocity }
    }

    /// A node that does not move
    pub fn stationary(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
        }
    }

    /// Where this node will be after `seconds` of constant-velocity motion
    pub fn advanced(&self, seconds: f64) -> Self {
        Self {
            position: self.position + self.velocity * seconds,
            velocity: self.velocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Vec3::planar(0.0, 0.0);
        let b = Vec3::planar(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
    }

    #[test]
    fn test_advanced_moves_along_velocity() {
        let k = Kinematics::new(Vec3::planar(10.0, 0.0), Vec3::planar(2.0, -1.0));
        let later = k.advanced(3.0);
        assert_eq!(later.position, Vec3::planar(16.0, -3.0));
        assert_eq!(later.velocity, k.velocity);
    }
}
