//! # Gravitational accelerations
//!
//! Pairwise Newtonian attraction plus the J2 zonal term of oblate bodies,
//! over flattened position and acceleration slices (three scalars per body,
//! see [`crate::integrators`]).
//!
//! ## Zonal term
//!
//! For an oblate source of axis `k`, coefficient `J2` and reference radius
//! `R`, and `r` the displacement from the source to the target, the
//! geometric part of the J2 acceleration is
//!
//! ```text
//! g(r) = J2 R² / |r|⁵ · ( (7.5 (r·k)² / |r|² − 1.5) r − 3 (r·k) k )
//! ```
//!
//! The target receives `μ_source · g`, the unit field scaled by
//! [`MassiveBody::zonal_coefficient`], and a massive target pushes back on
//! the source with `−μ_target · g`, so that the total momentum `Σ μᵢ aᵢ` is
//! conserved.
//!
//! ## Ordering
//!
//! Massive bodies are expected in the order oblate first, then spherical.
//! Pairs are visited in a fixed order (`b1` ascending, then `b2 > b1`, then
//! the massless bodies), so that the floating-point summation order does not
//! depend on anything but the inputs.
use nalgebra::Vector3;

use crate::{
    constants::{Acceleration, GravitationalParameter, Position},
    physics::massive_body::MassiveBody,
};

#[inline]
fn position_of(positions: &[f64], body: usize) -> Position {
    Vector3::new(
        positions[3 * body],
        positions[3 * body + 1],
        positions[3 * body + 2],
    )
}

#[inline]
fn add_to(accelerations: &mut [f64], body: usize, acceleration: Acceleration) {
    accelerations[3 * body] += acceleration.x;
    accelerations[3 * body + 1] += acceleration.y;
    accelerations[3 * body + 2] += acceleration.z;
}

/// Unit-coefficient zonal field of an oblate source of axis `axis` at
/// displacement `r` from it.
#[inline]
fn zonal_shape(axis: &Vector3<f64>, r: &Vector3<f64>) -> Vector3<f64> {
    let r2 = r.norm_squared();
    let one_over_r5 = 1.0 / (r2 * r2 * r2.sqrt());
    let r_axis = r.dot(axis);
    let radial = 7.5 * r_axis * r_axis / r2 - 1.5;
    (r * radial - axis * (3.0 * r_axis)) * one_over_r5
}

/// Geometric part of the zonal acceleration exerted by `source` at
/// displacement `r` from it, i.e. without the factor `μ_source`. Zero for a
/// spherical source.
pub fn zonal_geometric_acceleration(source: &MassiveBody, r: &Vector3<f64>) -> Vector3<f64> {
    let Some(oblateness) = source.oblateness() else {
        return Vector3::zeros();
    };
    let j2_r2 = oblateness.j2() * oblateness.reference_radius() * oblateness.reference_radius();
    zonal_shape(&oblateness.axis(), r) * j2_r2
}

/// Adds the zonal acceleration of the oblate `source` to `target`, and its
/// reaction to `source` when the target has a mass.
#[inline]
fn add_zonal_pair(
    accelerations: &mut [f64],
    source: (usize, &MassiveBody),
    target: (usize, &MassiveBody),
    r: &Vector3<f64>,
) {
    let (s, source_body) = source;
    let (t, target_body) = target;
    let Some(oblateness) = source_body.oblateness() else {
        return;
    };
    let shape = zonal_shape(&oblateness.axis(), r);
    add_to(accelerations, t, shape * source_body.zonal_coefficient());
    let j2_r2 = oblateness.j2() * oblateness.reference_radius() * oblateness.reference_radius();
    add_to(
        accelerations,
        s,
        shape * (-target_body.gravitational_parameter() * j2_r2),
    );
}

/// Newtonian and zonal accelerations of the massive bodies on one another.
///
/// Arguments
/// -----------------
/// * `bodies`: The massive bodies, oblate ones first.
/// * `positions`: Their flattened positions, `3 · bodies.len()` scalars.
/// * `accelerations`: Overwritten with their accelerations.
pub fn compute_massive_body_accelerations(
    bodies: &[MassiveBody],
    positions: &[f64],
    accelerations: &mut [f64],
) {
    debug_assert_eq!(positions.len(), 3 * bodies.len());
    accelerations.fill(0.0);

    for (b1, body1) in bodies.iter().enumerate() {
        let q1 = position_of(positions, b1);
        let mu1: GravitationalParameter = body1.gravitational_parameter();
        for (b2, body2) in bodies.iter().enumerate().skip(b1 + 1) {
            let q2 = position_of(positions, b2);
            let mu2 = body2.gravitational_parameter();

            let dq = q1 - q2;
            let r2 = dq.norm_squared();
            let one_over_r3 = 1.0 / (r2 * r2.sqrt());
            add_to(accelerations, b1, dq * (-mu2 * one_over_r3));
            add_to(accelerations, b2, dq * (mu1 * one_over_r3));

            // Displacements are taken from the source to the target.
            add_zonal_pair(accelerations, (b1, body1), (b2, body2), &(-dq));
            add_zonal_pair(accelerations, (b2, body2), (b1, body1), &dq);
        }
    }
}

/// Gravitational accelerations of massless bodies in the field of the
/// massive ones. The massless bodies exert nothing.
///
/// Arguments
/// -----------------
/// * `bodies`: The massive bodies.
/// * `massive_positions`: Their positions at the time of interest.
/// * `massless_positions`: Flattened positions of the massless bodies.
/// * `accelerations`: Overwritten with the accelerations of the massless
///   bodies.
pub fn compute_massless_body_accelerations(
    bodies: &[MassiveBody],
    massive_positions: &[Position],
    massless_positions: &[f64],
    accelerations: &mut [f64],
) {
    debug_assert_eq!(bodies.len(), massive_positions.len());
    debug_assert_eq!(massless_positions.len(), accelerations.len());
    accelerations.fill(0.0);
    let massless_count = massless_positions.len() / 3;

    for (body1, q1) in bodies.iter().zip(massive_positions) {
        let mu1 = body1.gravitational_parameter();
        for b2 in 0..massless_count {
            let q2 = position_of(massless_positions, b2);
            let dq = q1 - q2;
            let r2 = dq.norm_squared();
            let one_over_r3 = 1.0 / (r2 * r2.sqrt());
            add_to(accelerations, b2, dq * (mu1 * one_over_r3));
            if let Some(oblateness) = body1.oblateness() {
                add_to(
                    accelerations,
                    b2,
                    zonal_shape(&oblateness.axis(), &(-dq)) * body1.zonal_coefficient(),
                );
            }
        }
    }
}
