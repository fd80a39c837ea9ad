//! # Ephemeris of the massive bodies
//!
//! An [`Ephemeris`] owns a set of [`MassiveBody`] and one
//! [`ContinuousTrajectory`] per body. It integrates the N-body problem of the
//! massive bodies with a fixed-step symplectic integrator, compressing the
//! resulting samples as it goes, and it flows massless [`Trajectory`] objects
//! in the field of the massive bodies interpolated from those trajectories.
//!
//! ## Body order
//!
//! Internally the oblate bodies precede the spherical ones (the relative
//! order within each group is preserved), which is the order expected by
//! [`crate::physics::gravity`]. Callers address bodies by [`BodyId`], the
//! index in construction order, and never see the internal order.
//!
//! ## Time extent
//!
//! The ephemeris covers `[t_min, t_max]`, the intersection of the domains of
//! its trajectories. [`Ephemeris::prolong`] extends it forward,
//! [`Ephemeris::forget_before`] shrinks it from the past.
//!
//! See also
//! ------------
//! * [`crate::integrators`] – The integrators driven here.
//! * [`crate::config::EphemerisConfig`] – Declarative construction of the
//!   [`EphemerisParameters`].
use std::fmt;

use nalgebra::Vector3;
use tracing::debug;

use crate::{
    constants::{
        Meter, MeterPerSecond, Position, Second, ADAPTIVE_MAX_STEP_GROWTH, ADAPTIVE_SAFETY_FACTOR,
    },
    geometry::DegreesOfFreedom,
    integrators::{
        embedded_runge_kutta_nystrom::collect_states, AdaptiveStepSize,
        AdaptiveStepSizeIntegrator, FixedStepParameters, FixedStepSizeIntegrator, SystemState,
        SystemStateError,
    },
    physics::{
        continuous_trajectory::{ContinuousTrajectory, Hint},
        gravity::{compute_massive_body_accelerations, compute_massless_body_accelerations},
        massive_body::MassiveBody,
        trajectory::Trajectory,
    },
    time::Instant,
};

/// Identifies a body of an [`Ephemeris`] by its index in construction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(usize);

impl BodyId {
    pub fn new(index: usize) -> Self {
        BodyId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// How an [`Ephemeris`] integrates and compresses its massive bodies.
pub struct EphemerisParameters {
    integrator: Box<dyn FixedStepSizeIntegrator + Send + Sync>,
    step: Second,
    low_fitting_tolerance: Meter,
    high_fitting_tolerance: Meter,
}

impl fmt::Debug for EphemerisParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemerisParameters")
            .field("integrator_order", &self.integrator.order())
            .field("step", &self.step)
            .field("low_fitting_tolerance", &self.low_fitting_tolerance)
            .field("high_fitting_tolerance", &self.high_fitting_tolerance)
            .finish()
    }
}

impl EphemerisParameters {
    /// Arguments
    /// -----------------
    /// * `integrator`: The fixed-step integrator of the massive bodies.
    /// * `step`: Its step, also the spacing of the samples of the
    ///   continuous trajectories.
    /// * `low_fitting_tolerance`, `high_fitting_tolerance`: The fitting
    ///   tolerances of the continuous trajectories.
    ///
    /// Panics
    /// ----------
    /// * Unless `step > 0` and `0 < low_fitting_tolerance < high_fitting_tolerance`.
    pub fn new(
        integrator: impl FixedStepSizeIntegrator + Send + Sync + 'static,
        step: Second,
        low_fitting_tolerance: Meter,
        high_fitting_tolerance: Meter,
    ) -> Self {
        assert!(step > 0.0, "Step must be positive, got {step}");
        assert!(
            0.0 < low_fitting_tolerance && low_fitting_tolerance < high_fitting_tolerance,
            "Fitting tolerances must satisfy 0 < low < high, got low = {low_fitting_tolerance}, high = {high_fitting_tolerance}"
        );
        EphemerisParameters {
            integrator: Box::new(integrator),
            step,
            low_fitting_tolerance,
            high_fitting_tolerance,
        }
    }

    pub fn step(&self) -> Second {
        self.step
    }

    pub fn low_fitting_tolerance(&self) -> Meter {
        self.low_fitting_tolerance
    }

    pub fn high_fitting_tolerance(&self) -> Meter {
        self.high_fitting_tolerance
    }
}

pub struct Ephemeris {
    /// Internal order: oblate bodies first.
    bodies: Vec<MassiveBody>,
    /// Maps a `BodyId` to the internal index of the body.
    internal_index: Vec<usize>,
    trajectories: Vec<ContinuousTrajectory>,
    /// Last state of the massive bodies, in internal order.
    last_state: SystemState,
    parameters: EphemerisParameters,
}

impl fmt::Debug for Ephemeris {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ephemeris")
            .field("bodies", &self.bodies)
            .field("internal_index", &self.internal_index)
            .field("trajectories", &self.trajectories)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl Ephemeris {
    /// Build an ephemeris whose bodies start from `initial_state` at
    /// `initial_time`. Nothing is integrated yet, so the ephemeris is
    /// [`empty`](Self::empty) until the first [`prolong`](Self::prolong).
    ///
    /// Arguments
    /// -----------------
    /// * `bodies`: The massive bodies; their index is their [`BodyId`].
    /// * `initial_state`: Their degrees of freedom, index-aligned with `bodies`.
    /// * `initial_time`: The time of `initial_state`.
    /// * `parameters`: Integrator, step and fitting tolerances.
    ///
    /// Panics
    /// ----------
    /// * If there are no bodies or if `initial_state` is not index-aligned
    ///   with `bodies`.
    pub fn new(
        bodies: Vec<MassiveBody>,
        initial_state: Vec<DegreesOfFreedom>,
        initial_time: Instant,
        parameters: EphemerisParameters,
    ) -> Self {
        assert!(!bodies.is_empty(), "An ephemeris needs at least one body");
        assert_eq!(
            bodies.len(),
            initial_state.len(),
            "Mismatched bodies ({}) and initial state ({})",
            bodies.len(),
            initial_state.len()
        );

        // Stable partition, oblate bodies first.
        let mut order: Vec<usize> = (0..bodies.len()).collect();
        order.sort_by_key(|&id| !bodies[id].is_oblate());

        let mut internal_index = vec![0; bodies.len()];
        for (internal, &id) in order.iter().enumerate() {
            internal_index[id] = internal;
        }

        let mut positions = Vec::with_capacity(3 * bodies.len());
        let mut velocities = Vec::with_capacity(3 * bodies.len());
        let mut trajectories = Vec::with_capacity(bodies.len());
        for &id in &order {
            let dof = initial_state[id];
            positions.extend(dof.position.iter());
            velocities.extend(dof.velocity.iter());
            let mut trajectory = ContinuousTrajectory::new(
                parameters.step,
                parameters.low_fitting_tolerance,
                parameters.high_fitting_tolerance,
            );
            trajectory.append(initial_time, dof);
            trajectories.push(trajectory);
        }
        let bodies = order.iter().map(|&id| bodies[id]).collect();

        Ephemeris {
            bodies,
            internal_index,
            trajectories,
            last_state: SystemState::new(
                initial_time.seconds_since_j2000(),
                &positions,
                &velocities,
            ),
            parameters,
        }
    }

    /// The bodies with their ids, in construction order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &MassiveBody)> + '_ {
        self.internal_index
            .iter()
            .enumerate()
            .map(|(id, &internal)| (BodyId(id), &self.bodies[internal]))
    }

    pub fn number_of_bodies(&self) -> usize {
        self.bodies.len()
    }

    /// Panics
    /// ----------
    /// * If `id` is not a body of this ephemeris.
    pub fn body(&self, id: BodyId) -> &MassiveBody {
        &self.bodies[self.internal(id)]
    }

    /// Panics
    /// ----------
    /// * If `id` is not a body of this ephemeris.
    pub fn trajectory(&self, id: BodyId) -> &ContinuousTrajectory {
        &self.trajectories[self.internal(id)]
    }

    pub fn parameters(&self) -> &EphemerisParameters {
        &self.parameters
    }

    /// Whether some trajectory has no segment yet.
    pub fn empty(&self) -> bool {
        self.trajectories.iter().any(ContinuousTrajectory::empty)
    }

    /// Start of the interval covered by all the trajectories.
    ///
    /// Panics
    /// ----------
    /// * If the ephemeris is empty.
    pub fn t_min(&self) -> Instant {
        self.trajectories
            .iter()
            .map(ContinuousTrajectory::t_min)
            .reduce(|a, b| if b > a { b } else { a })
            .expect("An ephemeris has at least one trajectory")
    }

    /// End of the interval covered by all the trajectories.
    ///
    /// Panics
    /// ----------
    /// * If the ephemeris is empty.
    pub fn t_max(&self) -> Instant {
        self.trajectories
            .iter()
            .map(ContinuousTrajectory::t_max)
            .reduce(|a, b| if b < a { b } else { a })
            .expect("An ephemeris has at least one trajectory")
    }

    /// Drop the history of every trajectory before `time`.
    pub fn forget_before(&mut self, time: Instant) {
        for trajectory in &mut self.trajectories {
            trajectory.forget_before(time);
        }
    }

    /// Integrate the massive bodies until `t_max() >= t`. Nothing happens if
    /// `t` is already covered; otherwise each integration goes at least one
    /// step past the last state.
    pub fn prolong(&mut self, t: Instant) {
        let step = self.parameters.step;
        let mut t_final = t
            .seconds_since_j2000()
            .max(self.last_state.time.value + step);

        let bodies = &self.bodies;
        let mut compute_acceleration = |_t: f64, positions: &[f64], accelerations: &mut [f64]| {
            compute_massive_body_accelerations(bodies, positions, accelerations)
        };

        let mut steps = 0;
        while self.empty() || self.t_max() < t {
            let parameters = FixedStepParameters {
                initial: self.last_state.clone(),
                t_final,
                step,
                sampling_period: 1,
                t_final_is_exact: false,
            };
            let states = self
                .parameters
                .integrator
                .solve(&mut compute_acceleration, &parameters);
            steps += states.len();
            for state in &states {
                append_massive_bodies_state(&mut self.trajectories, state);
            }
            if let Some(last) = states.into_iter().last() {
                self.last_state = last;
            }
            t_final += step;
        }
        debug!(
            requested = %t,
            t_max = %self.t_max(),
            steps,
            "Prolonged the ephemeris"
        );
    }

    /// Integrate the massless `trajectories` with the fixed-step integrator
    /// of the ephemeris until `t`, appending a point every `step`. The last
    /// step lands exactly on `t`.
    ///
    /// Arguments
    /// -----------------
    /// * `trajectories`: The massless trajectories. They must all end at the
    ///   same time.
    /// * `step`: The integration step.
    /// * `t`: The final time.
    ///
    /// Panics
    /// ----------
    /// * If a trajectory is empty, if the trajectories do not end at the same
    ///   time or if `t` is before that time.
    pub fn flow_with_fixed_step(
        &mut self,
        trajectories: &mut [&mut Trajectory],
        step: Second,
        t: Instant,
    ) {
        let Some(initial_state) = massless_initial_state(trajectories.iter().map(|trajectory| &**trajectory), t)
        else {
            return;
        };
        if self.empty() || t > self.t_max() {
            self.prolong(t);
        }

        let parameters = FixedStepParameters {
            initial: initial_state,
            t_final: t.seconds_since_j2000(),
            step,
            sampling_period: 1,
            t_final_is_exact: true,
        };
        let states = {
            let massless: Vec<&Trajectory> = trajectories.iter().map(|trajectory| &**trajectory).collect();
            let mut evaluator = MasslessAccelerations::new(self, &massless);
            let mut compute_acceleration =
                |time: f64, positions: &[f64], accelerations: &mut [f64]| {
                    evaluator.compute(time, positions, accelerations)
                };
            self.parameters
                .integrator
                .solve(&mut compute_acceleration, &parameters)
        };
        for state in &states {
            append_massless_bodies_state(trajectories, state);
        }
    }

    /// Integrate the massless `trajectory` until exactly `t` with an
    /// adaptive-step integrator, appending every accepted step.
    ///
    /// Arguments
    /// -----------------
    /// * `trajectory`: The massless trajectory, not empty.
    /// * `length_integration_tolerance`: Largest position error of a step.
    /// * `speed_integration_tolerance`: Largest velocity error of a step.
    /// * `integrator`: The adaptive-step integrator.
    /// * `t`: The final time.
    ///
    /// Panics
    /// ----------
    /// * If the trajectory is empty or if `t` is before its last time.
    pub fn flow_with_adaptive_step(
        &mut self,
        trajectory: &mut Trajectory,
        length_integration_tolerance: Meter,
        speed_integration_tolerance: MeterPerSecond,
        integrator: &dyn AdaptiveStepSizeIntegrator,
        t: Instant,
    ) {
        let Some(initial_state) = massless_initial_state(std::iter::once(&*trajectory), t) else {
            return;
        };
        if self.empty() || t > self.t_max() {
            self.prolong(t);
        }

        let t_final = t.seconds_since_j2000();
        let first_time_step = t_final - initial_state.time.value;
        let states = {
            let massless = [&*trajectory];
            let mut evaluator = MasslessAccelerations::new(self, &massless);
            let mut compute_acceleration =
                |time: f64, positions: &[f64], accelerations: &mut [f64]| {
                    evaluator.compute(time, positions, accelerations)
                };
            let mut ratio = |_h: Second, error: &SystemStateError| {
                tolerance_to_error_ratio(
                    length_integration_tolerance,
                    speed_integration_tolerance,
                    error,
                )
            };
            collect_states(
                integrator,
                &mut compute_acceleration,
                initial_state,
                t_final,
                AdaptiveStepSize {
                    first_time_step,
                    safety_factor: ADAPTIVE_SAFETY_FACTOR,
                    max_step_growth: ADAPTIVE_MAX_STEP_GROWTH,
                    tolerance_to_error_ratio: &mut ratio,
                },
            )
        };
        debug!(
            accepted = states.len(),
            t_final = %t,
            "Flowed a massless trajectory with adaptive steps"
        );
        for state in &states {
            append_massless_bodies_state(&mut [&mut *trajectory], state);
        }
    }

    fn internal(&self, id: BodyId) -> usize {
        *self
            .internal_index
            .get(id.0)
            .unwrap_or_else(|| panic!("No body with id {} in this ephemeris", id.0))
    }
}

/// Ratio of the tolerances to the largest per-body position and velocity
/// errors of a step.
///
/// Arguments
/// -----------------
/// * `length_integration_tolerance`: Tolerance on the position error.
/// * `speed_integration_tolerance`: Tolerance on the velocity error.
/// * `error`: Estimated error of a step, three scalars per body.
///
/// Return
/// ----------
/// * `min(length_tol / max‖δq‖, speed_tol / max‖δv‖)`, infinite when the
///   error vanishes.
pub fn tolerance_to_error_ratio(
    length_integration_tolerance: Meter,
    speed_integration_tolerance: MeterPerSecond,
    error: &SystemStateError,
) -> f64 {
    let max_norm = |values: &[f64]| {
        values
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]).norm())
            .fold(0.0, f64::max)
    };
    let max_length_error = max_norm(&error.position_error);
    let max_speed_error = max_norm(&error.velocity_error);
    (length_integration_tolerance / max_length_error)
        .min(speed_integration_tolerance / max_speed_error)
}

/// Force evaluation for massless bodies: gravity of the massive bodies,
/// interpolated from their continuous trajectories, plus the intrinsic
/// accelerations.
struct MasslessAccelerations<'a> {
    bodies: &'a [MassiveBody],
    massive_trajectories: &'a [ContinuousTrajectory],
    massless_trajectories: &'a [&'a Trajectory],
    hints: Vec<Hint>,
    massive_positions: Vec<Position>,
}

impl<'a> MasslessAccelerations<'a> {
    fn new(ephemeris: &'a Ephemeris, massless_trajectories: &'a [&'a Trajectory]) -> Self {
        let n = ephemeris.bodies.len();
        MasslessAccelerations {
            bodies: &ephemeris.bodies,
            massive_trajectories: &ephemeris.trajectories,
            massless_trajectories,
            hints: vec![Hint::new(); n],
            massive_positions: vec![Vector3::zeros(); n],
        }
    }

    fn compute(&mut self, time: f64, positions: &[f64], accelerations: &mut [f64]) {
        let instant = Instant::from_seconds_since_j2000(time);
        for ((trajectory, hint), position) in self
            .massive_trajectories
            .iter()
            .zip(&mut self.hints)
            .zip(&mut self.massive_positions)
        {
            *position = trajectory.evaluate_position(instant, Some(hint));
        }
        compute_massless_body_accelerations(
            self.bodies,
            &self.massive_positions,
            positions,
            accelerations,
        );
        for (trajectory, a) in self
            .massless_trajectories
            .iter()
            .zip(accelerations.chunks_exact_mut(3))
        {
            if trajectory.has_intrinsic_acceleration() {
                let intrinsic = trajectory.evaluate_intrinsic_acceleration(instant);
                a[0] += intrinsic.x;
                a[1] += intrinsic.y;
                a[2] += intrinsic.z;
            }
        }
    }
}

fn degrees_of_freedom_of(state: &SystemState, body: usize) -> DegreesOfFreedom {
    let q = &state.positions[3 * body..3 * body + 3];
    let v = &state.velocities[3 * body..3 * body + 3];
    DegreesOfFreedom::new(
        Vector3::new(q[0].value, q[1].value, q[2].value),
        Vector3::new(v[0].value, v[1].value, v[2].value),
    )
}

fn append_massive_bodies_state(trajectories: &mut [ContinuousTrajectory], state: &SystemState) {
    let time = Instant::from_seconds_since_j2000(state.time.value);
    for (body, trajectory) in trajectories.iter_mut().enumerate() {
        trajectory.append(time, degrees_of_freedom_of(state, body));
    }
}

fn append_massless_bodies_state(trajectories: &mut [&mut Trajectory], state: &SystemState) {
    let time = Instant::from_seconds_since_j2000(state.time.value);
    for (body, trajectory) in trajectories.iter_mut().enumerate() {
        trajectory.append(time, degrees_of_freedom_of(state, body));
    }
}

/// The state the massless `trajectories` start from, or `None` if they
/// already end at `t`.
///
/// Panics
/// ----------
/// * If there is no trajectory, if one is empty, if they do not end at the
///   same time or if they end after `t`.
fn massless_initial_state<'a>(
    trajectories: impl Iterator<Item = &'a Trajectory>,
    t: Instant,
) -> Option<SystemState> {
    let mut last_time: Option<Instant> = None;
    let mut positions = vec![];
    let mut velocities = vec![];
    for trajectory in trajectories {
        let (time, dof) = trajectory
            .last()
            .expect("Cannot flow an empty trajectory");
        match last_time {
            None => last_time = Some(*time),
            Some(last) => assert!(
                last == *time,
                "Trajectories end at different times: {last} and {time}"
            ),
        }
        positions.extend(dof.position.iter());
        velocities.extend(dof.velocity.iter());
    }
    let last_time = last_time.expect("No trajectory to flow");
    assert!(
        last_time <= t,
        "Cannot flow backward from {last_time} to {t}"
    );
    if last_time == t {
        return None;
    }
    Some(SystemState::new(
        last_time.seconds_since_j2000(),
        &positions,
        &velocities,
    ))
}
