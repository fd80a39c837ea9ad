//! # Integrators for `q″ = f(q, t)`
//!
//! This module gathers the solvers for special second-order differential
//! equations, where the acceleration depends on the positions and the time
//! but not on the velocities. Gravitational N-body problems are of this form.
//!
//! ## Overview
//!
//! - [`symplectic_runge_kutta_nystrom`]: fixed-step symplectic
//!   Runge–Kutta–Nyström methods (leapfrog, position Verlet,
//!   McLachlan–Atela), implementing [`FixedStepSizeIntegrator`].
//! - [`embedded_runge_kutta_nystrom`]: embedded explicit Runge–Kutta–Nyström
//!   pairs with step-size control, implementing
//!   [`AdaptiveStepSizeIntegrator`].
//!
//! ## State layout
//!
//! Both families work on flattened degrees of freedom: a [`SystemState`] for
//! `n` bodies holds `3n` scalar positions and `3n` scalar velocities, body
//! `i` occupying indices `3i..3i + 3`. Positions, velocities and time are
//! accumulated with compensated summation.
//!
//! ## Force callback
//!
//! The acceleration is supplied as a [`RightHandSide`]: `(t, q, a)` fills `a`
//! with the accelerations at time `t` for positions `q`, index-aligned with
//! the state. It is called once per stage.
pub mod embedded_runge_kutta_nystrom;
pub mod symplectic_runge_kutta_nystrom;

use crate::numerics::double_precision::DoublePrecision;

/// Force evaluation callback: `(t, positions, accelerations)`.
pub type RightHandSide<'a> = dyn FnMut(f64, &[f64], &mut [f64]) + 'a;

/// Time, positions and velocities of a system at the end of a step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemState {
    pub time: DoublePrecision<f64>,
    pub positions: Vec<DoublePrecision<f64>>,
    pub velocities: Vec<DoublePrecision<f64>>,
}

impl SystemState {
    /// A synchronized state with no accumulated rounding error.
    pub fn new(time: f64, positions: &[f64], velocities: &[f64]) -> Self {
        assert_eq!(
            positions.len(),
            velocities.len(),
            "Positions and velocities must have the same dimension"
        );
        SystemState {
            time: DoublePrecision::new(time),
            positions: positions.iter().copied().map(DoublePrecision::new).collect(),
            velocities: velocities.iter().copied().map(DoublePrecision::new).collect(),
        }
    }

    /// Number of scalar degrees of freedom.
    pub fn dimension(&self) -> usize {
        self.positions.len()
    }
}

/// Estimated local error of one step of an embedded method, per scalar
/// degree of freedom.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemStateError {
    pub position_error: Vec<f64>,
    pub velocity_error: Vec<f64>,
}

/// Parameters of a fixed-step integration.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedStepParameters {
    pub initial: SystemState,
    /// Time at which to stop.
    pub t_final: f64,
    /// Nominal step, positive.
    pub step: f64,
    /// Emit every `sampling_period`-th step; 0 emits only the final state.
    pub sampling_period: usize,
    /// Whether the last step must land exactly on `t_final`. Otherwise the
    /// integration stops at the last step not exceeding it.
    pub t_final_is_exact: bool,
}

/// A fixed-step solver for `q″ = f(q, t)`.
pub trait FixedStepSizeIntegrator {
    /// Order of convergence of the method.
    fn order(&self) -> usize;

    /// Number of force evaluations per step, FSAL stages excluded.
    fn evaluations(&self) -> usize;

    /// Integrate from `parameters.initial` and return the sampled states.
    fn solve(
        &self,
        compute_acceleration: &mut RightHandSide<'_>,
        parameters: &FixedStepParameters,
    ) -> Vec<SystemState>;
}

/// Step-size control of an adaptive integration.
pub struct AdaptiveStepSize<'a> {
    /// Length of the first attempted step.
    pub first_time_step: f64,
    /// Factor below 1 applied to the optimal step estimate.
    pub safety_factor: f64,
    /// Largest factor by which a step may grow after an accepted step.
    pub max_step_growth: f64,
    /// Ratio of the tolerance to the estimated error for a step of the given
    /// length; the step is accepted when it is at least 1.
    pub tolerance_to_error_ratio: &'a mut dyn FnMut(f64, &SystemStateError) -> f64,
}

/// The equation and boundary of an adaptive integration.
pub struct IntegrationProblem<'a> {
    pub compute_acceleration: &'a mut RightHandSide<'a>,
    pub initial_state: SystemState,
    pub t_final: f64,
    /// Called with every accepted state.
    pub append_state: &'a mut dyn FnMut(&SystemState),
}

/// An adaptive-step solver for `q″ = f(q, t)`.
pub trait AdaptiveStepSizeIntegrator {
    fn higher_order(&self) -> usize;

    fn lower_order(&self) -> usize;

    /// Integrate until `problem.t_final`, which the last step reaches
    /// exactly.
    fn solve(&self, problem: IntegrationProblem<'_>, adaptive_step_size: AdaptiveStepSize<'_>);
}
