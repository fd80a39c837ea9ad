#![allow(dead_code)]

use approx::assert_relative_eq;
use gravis::{geometry::DegreesOfFreedom, integrators::SystemState};
use nalgebra::Vector3;

/// Gravitational parameter of the Earth, m³/s².
pub const EARTH_MU: f64 = 3.986004418e14;
/// Equatorial radius of the Earth, m.
pub const EARTH_RADIUS: f64 = 6.378137e6;
/// J2 of the Earth.
pub const EARTH_J2: f64 = 1.08263e-3;

/// Acceleration of a test particle around a unit point mass at the origin.
pub fn kepler_acceleration(_t: f64, q: &[f64], a: &mut [f64]) {
    for (q, a) in q.chunks_exact(3).zip(a.chunks_exact_mut(3)) {
        let r2 = q[0] * q[0] + q[1] * q[1] + q[2] * q[2];
        let one_over_r3 = 1.0 / (r2 * r2.sqrt());
        for k in 0..3 {
            a[k] = -q[k] * one_over_r3;
        }
    }
}

/// Specific orbital energy of a particle around a unit point mass.
pub fn kepler_energy(q: &[f64], v: &[f64]) -> f64 {
    let r = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2]).sqrt();
    let v2 = v[0] * v[0] + v[1] * v[1] + v[2] * v[2];
    0.5 * v2 - 1.0 / r
}

pub fn state_energy(state: &SystemState) -> f64 {
    let q: Vec<f64> = state.positions.iter().map(|q| q.value).collect();
    let v: Vec<f64> = state.velocities.iter().map(|v| v.value).collect();
    kepler_energy(&q, &v)
}

/// Classical fourth-order Runge–Kutta on `(q, v)`, a non-symplectic
/// reference. Returns the energy every `sampling_period` steps.
pub fn runge_kutta_4_energies(
    q0: [f64; 3],
    v0: [f64; 3],
    step: f64,
    steps: usize,
    sampling_period: usize,
) -> Vec<f64> {
    let mut q = q0;
    let mut v = v0;
    let mut energies = vec![];
    let acceleration = |q: &[f64; 3]| {
        let mut a = [0.0; 3];
        kepler_acceleration(0.0, q, &mut a);
        a
    };
    let axpy = |x: &[f64; 3], a: f64, y: &[f64; 3]| [x[0] + a * y[0], x[1] + a * y[1], x[2] + a * y[2]];
    for n in 1..=steps {
        let k1q = v;
        let k1v = acceleration(&q);
        let k2q = axpy(&v, 0.5 * step, &k1v);
        let k2v = acceleration(&axpy(&q, 0.5 * step, &k1q));
        let k3q = axpy(&v, 0.5 * step, &k2v);
        let k3v = acceleration(&axpy(&q, 0.5 * step, &k2q));
        let k4q = axpy(&v, step, &k3v);
        let k4v = acceleration(&axpy(&q, step, &k3q));
        for k in 0..3 {
            q[k] += step / 6.0 * (k1q[k] + 2.0 * k2q[k] + 2.0 * k3q[k] + k4q[k]);
            v[k] += step / 6.0 * (k1v[k] + 2.0 * k2v[k] + 2.0 * k3v[k] + k4v[k]);
        }
        if n % sampling_period == 0 {
            energies.push(kepler_energy(&q, &v));
        }
    }
    energies
}

/// Longitude of the ascending node of the osculating orbit.
pub fn ascending_node(dof: &DegreesOfFreedom) -> f64 {
    let h = dof.position.cross(&dof.velocity);
    h.x.atan2(-h.y)
}

pub fn assert_dof_close(actual: &DegreesOfFreedom, expected: &DegreesOfFreedom, epsilon: f64) {
    assert_relative_eq!(actual.position, expected.position, epsilon = epsilon);
    assert_relative_eq!(actual.velocity, expected.velocity, epsilon = epsilon);
}

/// A circular orbit of radius `r` in the plane inclined by `inclination`
/// about the x axis, starting on the x axis.
pub fn inclined_circular_orbit(mu: f64, r: f64, inclination: f64) -> DegreesOfFreedom {
    let speed = (mu / r).sqrt();
    DegreesOfFreedom::new(
        Vector3::new(r, 0.0, 0.0),
        Vector3::new(0.0, speed * inclination.cos(), speed * inclination.sin()),
    )
}
