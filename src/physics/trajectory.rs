//! Raw trajectories of massless bodies.
//!
//! A [`Trajectory`] is the append-only history of a body that feels gravity
//! but does not exert any, typically a spacecraft. It may carry an intrinsic
//! acceleration, e.g. thrust, which is added to the gravitational one when
//! the trajectory is integrated by the
//! [`Ephemeris`](crate::physics::ephemeris::Ephemeris).
use std::fmt;

use nalgebra::Vector3;

use crate::{constants::Acceleration, geometry::DegreesOfFreedom, time::Instant};

/// Acceleration not due to gravity, as a function of time.
pub type IntrinsicAcceleration = Box<dyn Fn(Instant) -> Acceleration + Send + Sync>;

#[derive(Default)]
pub struct Trajectory {
    points: Vec<(Instant, DegreesOfFreedom)>,
    intrinsic_acceleration: Option<IntrinsicAcceleration>,
}

impl fmt::Debug for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trajectory")
            .field("points", &self.points)
            .field(
                "intrinsic_acceleration",
                &self.intrinsic_acceleration.as_ref().map(|_| "<fn>"),
            )
            .finish()
    }
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Panics
    /// ----------
    /// * If `time` is not after the last point.
    pub fn append(&mut self, time: Instant, degrees_of_freedom: DegreesOfFreedom) {
        if let Some((last_time, _)) = self.points.last() {
            assert!(
                *last_time < time,
                "Append at {time:?} which is not after the last time {last_time:?}"
            );
        }
        self.points.push((time, degrees_of_freedom));
    }

    pub fn last(&self) -> Option<&(Instant, DegreesOfFreedom)> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(Instant, DegreesOfFreedom)] {
        &self.points
    }

    pub fn set_intrinsic_acceleration(&mut self, acceleration: IntrinsicAcceleration) {
        self.intrinsic_acceleration = Some(acceleration);
    }

    pub fn clear_intrinsic_acceleration(&mut self) {
        self.intrinsic_acceleration = None;
    }

    pub fn has_intrinsic_acceleration(&self) -> bool {
        self.intrinsic_acceleration.is_some()
    }

    /// The intrinsic acceleration at `time`, zero if there is none.
    pub fn evaluate_intrinsic_acceleration(&self, time: Instant) -> Acceleration {
        self.intrinsic_acceleration
            .as_ref()
            .map_or_else(Vector3::zeros, |acceleration| acceleration(time))
    }

    /// A new trajectory with the history of this one up to and including
    /// `time`, without its intrinsic acceleration.
    pub fn fork(&self, time: Instant) -> Trajectory {
        let end = self.points.partition_point(|(t, _)| *t <= time);
        Trajectory {
            points: self.points[..end].to_vec(),
            intrinsic_acceleration: None,
        }
    }
}

#[cfg(test)]
mod trajectory_test {
    use super::*;

    fn dof(x: f64) -> DegreesOfFreedom {
        DegreesOfFreedom::new(Vector3::new(x, 0.0, 0.0), Vector3::new(0.0, x, 0.0))
    }

    #[test]
    fn test_append_and_fork() {
        let mut trajectory = Trajectory::new();
        assert!(trajectory.is_empty());
        for i in 0..5 {
            trajectory.append(Instant::from_seconds_since_j2000(i as f64), dof(i as f64));
        }
        assert_eq!(trajectory.len(), 5);
        assert_eq!(trajectory.last().unwrap().1, dof(4.0));

        trajectory.set_intrinsic_acceleration(Box::new(|_: Instant| Vector3::x()));
        let fork = trajectory.fork(Instant::from_seconds_since_j2000(2.5));
        assert_eq!(fork.len(), 3);
        assert!(!fork.has_intrinsic_acceleration());
        assert_eq!(fork.points()[2].1, dof(2.0));
    }

    #[test]
    fn test_intrinsic_acceleration() {
        let mut trajectory = Trajectory::new();
        let t = Instant::from_seconds_since_j2000(3.0);
        assert_eq!(trajectory.evaluate_intrinsic_acceleration(t), Vector3::zeros());
        trajectory.set_intrinsic_acceleration(Box::new(|t: Instant| {
            Vector3::new(0.0, 0.0, t.seconds_since_j2000())
        }));
        assert_eq!(
            trajectory.evaluate_intrinsic_acceleration(t),
            Vector3::new(0.0, 0.0, 3.0)
        );
        trajectory.clear_intrinsic_acceleration();
        assert!(!trajectory.has_intrinsic_acceleration());
    }

    #[test]
    #[should_panic(expected = "not after the last time")]
    fn test_append_out_of_order() {
        let mut trajectory = Trajectory::new();
        trajectory.append(Instant::from_seconds_since_j2000(1.0), dof(0.0));
        trajectory.append(Instant::from_seconds_since_j2000(1.0), dof(1.0));
    }
}
