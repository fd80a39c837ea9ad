//! Kinematic state of a body in an inertial frame.
//!
//! The vector algebra itself is delegated to [`nalgebra`]; positions are
//! displacements from the frame origin in metres, velocities are in m/s.
use std::ops::Sub;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::{Position, Velocity};

/// Position and velocity of a body at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DegreesOfFreedom {
    pub position: Position,
    pub velocity: Velocity,
}

impl DegreesOfFreedom {
    pub fn new(position: Position, velocity: Velocity) -> Self {
        DegreesOfFreedom { position, velocity }
    }
}

/// Relative state of two bodies, `self` as seen from `rhs`.
impl Sub for DegreesOfFreedom {
    type Output = DegreesOfFreedom;

    fn sub(self, rhs: DegreesOfFreedom) -> DegreesOfFreedom {
        DegreesOfFreedom {
            position: self.position - rhs.position,
            velocity: self.velocity - rhs.velocity,
        }
    }
}

/// Serialized form of a [`DegreesOfFreedom`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegreesOfFreedomMessage {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

impl From<&DegreesOfFreedom> for DegreesOfFreedomMessage {
    fn from(dof: &DegreesOfFreedom) -> Self {
        DegreesOfFreedomMessage {
            position: dof.position.into(),
            velocity: dof.velocity.into(),
        }
    }
}

impl From<&DegreesOfFreedomMessage> for DegreesOfFreedom {
    fn from(message: &DegreesOfFreedomMessage) -> Self {
        DegreesOfFreedom {
            position: Vector3::from(message.position),
            velocity: Vector3::from(message.velocity),
        }
    }
}
