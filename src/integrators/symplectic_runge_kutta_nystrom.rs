//! # Symplectic Runge–Kutta–Nyström integrators
//!
//! Fixed-step symplectic partitioned methods for `q″ = f(q, t)`, described by
//! a pair of weight vectors `(a, b)`: each stage kicks the velocities by
//! `bᵢ h f(q)` and then drifts the positions by `aᵢ h v`.
//!
//! ## First same as last
//!
//! When `b₀ = 0` (the first kick vanishes) or `a_last = 0` (the last drift
//! vanishes), the last operation of a step and the first operation of the
//! next one are of the same kind and are merged. Positions and velocities are
//! then desynchronized between steps, and resynchronized only when a state
//! must be emitted, at the end of the integration, or before a step of a
//! different length. The merge saves one force evaluation per step for
//! methods such as leapfrog.
//!
//! ## Accumulation
//!
//! Within a step the position and velocity increments are accumulated in two
//! pairs of scratch buffers that are swapped at every stage, then added to
//! the state with compensated summation (Kahan). Time is accumulated the same
//! way, which avoids drift over millions of steps.
//!
//! ## References
//!
//! * McLachlan & Atela (1992), *The accuracy of symplectic integrators*.
//! * Wolfram, *"SymplecticPartitionedRungeKutta" Method for NDSolve*,
//!   algorithms 2 and 3.
use tracing::trace;

use crate::{
    integrators::{FixedStepParameters, FixedStepSizeIntegrator, RightHandSide, SystemState},
    numerics::double_precision::DoublePrecision,
};

/// Structure of the coefficients, determined at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VanishingCoefficients {
    None,
    FirstBVanishes,
    LastAVanishes,
}

/// The merged operation of a first-same-as-last method: the weight of the
/// first and of the last operation of a step.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FirstSameAsLast {
    first: f64,
    last: f64,
}

/// A symplectic Runge–Kutta–Nyström method.
#[derive(Debug, Clone, PartialEq)]
pub struct SymplecticRungeKuttaNystromIntegrator {
    order: usize,
    vanishing_coefficients: VanishingCoefficients,
    first_same_as_last: Option<FirstSameAsLast>,
    // Coefficients once the FSAL stage, if any, has been folded.
    a: Vec<f64>,
    b: Vec<f64>,
    // Time nodes of the kicks.
    c: Vec<f64>,
}

impl SymplecticRungeKuttaNystromIntegrator {
    /// Build a method from its drift weights `a` and kick weights `b`.
    ///
    /// Arguments
    /// -----------------
    /// * `order`: Order of convergence, reported by [`FixedStepSizeIntegrator::order`].
    /// * `a`: Position weights, summing to 1.
    /// * `b`: Velocity weights, summing to 1, same length as `a`.
    ///
    /// Panics
    /// ----------
    /// * If `a` and `b` are empty or of different lengths.
    pub fn new(order: usize, a: &[f64], b: &[f64]) -> Self {
        assert!(!a.is_empty(), "A symplectic method needs at least one stage");
        assert_eq!(
            a.len(),
            b.len(),
            "Position and velocity weights must have the same number of stages"
        );

        let (vanishing_coefficients, first_same_as_last, a_folded, b_folded) =
            if b[0] == 0.0 {
                let fsal = FirstSameAsLast {
                    first: a[0],
                    last: a[a.len() - 1],
                };
                let mut a_folded = a[1..].to_vec();
                let b_folded = b[1..].to_vec();
                if let Some(back) = a_folded.last_mut() {
                    *back += fsal.first;
                }
                (
                    VanishingCoefficients::FirstBVanishes,
                    Some(fsal),
                    a_folded,
                    b_folded,
                )
            } else if a[a.len() - 1] == 0.0 {
                let fsal = FirstSameAsLast {
                    first: b[0],
                    last: b[b.len() - 1],
                };
                let a_folded = a[..a.len() - 1].to_vec();
                let mut b_folded = b[..b.len() - 1].to_vec();
                if let Some(front) = b_folded.first_mut() {
                    *front += fsal.last;
                }
                (
                    VanishingCoefficients::LastAVanishes,
                    Some(fsal),
                    a_folded,
                    b_folded,
                )
            } else {
                (VanishingCoefficients::None, None, a.to_vec(), b.to_vec())
            };
        assert!(
            !b_folded.is_empty(),
            "A first-same-as-last method needs at least two stages"
        );

        let mut c = Vec::with_capacity(b_folded.len());
        c.push(match (vanishing_coefficients, first_same_as_last) {
            (VanishingCoefficients::FirstBVanishes, Some(fsal)) => fsal.first,
            _ => 0.0,
        });
        for j in 1..b_folded.len() {
            c.push(c[j - 1] + a_folded[j - 1]);
        }

        SymplecticRungeKuttaNystromIntegrator {
            order,
            vanishing_coefficients,
            first_same_as_last,
            a: a_folded,
            b: b_folded,
            c,
        }
    }

    pub fn vanishing_coefficients(&self) -> VanishingCoefficients {
        self.vanishing_coefficients
    }

    /// Number of stages after folding.
    pub fn stages(&self) -> usize {
        self.b.len()
    }

    fn fsal(&self) -> FirstSameAsLast {
        match self.first_same_as_last {
            Some(fsal) => fsal,
            None => unreachable!("first-same-as-last weights requested for a method without them"),
        }
    }
}

/// Kick-drift-kick Störmer–Verlet. Second order, one evaluation per step.
pub fn leapfrog() -> SymplecticRungeKuttaNystromIntegrator {
    SymplecticRungeKuttaNystromIntegrator::new(2, &[1.0, 0.0], &[0.5, 0.5])
}

/// Drift-kick-drift Störmer–Verlet. Second order, one evaluation per step.
pub fn position_verlet() -> SymplecticRungeKuttaNystromIntegrator {
    SymplecticRungeKuttaNystromIntegrator::new(2, &[0.5, 0.5], &[0.0, 1.0])
}

/// McLachlan & Atela (1992), optimal fourth-order method, 4 stages.
pub fn mclachlan_atela_1992_order_4_optimal() -> SymplecticRungeKuttaNystromIntegrator {
    SymplecticRungeKuttaNystromIntegrator::new(
        4,
        &[
            0.5153528374311229364,
            -0.085782019412973646,
            0.4415830236164665242,
            0.1288461583653841854,
        ],
        &[
            0.1344961992774310892,
            -0.2248198030794208058,
            0.7563200005156682911,
            0.3340036032863214255,
        ],
    )
}

/// McLachlan & Atela (1992), optimal fifth-order method, 6 stages.
pub fn mclachlan_atela_1992_order_5_optimal() -> SymplecticRungeKuttaNystromIntegrator {
    SymplecticRungeKuttaNystromIntegrator::new(
        5,
        &[
            0.339839625839110000,
            -0.088601336903027329,
            0.5858564768259621188,
            -0.603039356536491888,
            0.3235807965546976394,
            0.4423637942197494587,
        ],
        &[
            0.1193900292875672758,
            0.6989273703824752308,
            -0.1713123582716007754,
            0.4012695022513534480,
            0.0107050818482359840,
            -0.0589796254980311632,
        ],
    )
}

/// Scratch space of one integration: the double-buffered stage increments
/// and the stage state.
struct Scratch {
    dq_current: Vec<f64>,
    dq_previous: Vec<f64>,
    dv_current: Vec<f64>,
    dv_previous: Vec<f64>,
    q_stage: Vec<f64>,
    v_stage: Vec<f64>,
    acceleration: Vec<f64>,
}

impl Scratch {
    fn new(dimension: usize) -> Self {
        Scratch {
            dq_current: vec![0.0; dimension],
            dq_previous: vec![0.0; dimension],
            dv_current: vec![0.0; dimension],
            dv_previous: vec![0.0; dimension],
            q_stage: vec![0.0; dimension],
            v_stage: vec![0.0; dimension],
            acceleration: vec![0.0; dimension],
        }
    }

    fn swap_dq(&mut self) {
        std::mem::swap(&mut self.dq_current, &mut self.dq_previous);
    }

    fn swap_dv(&mut self) {
        std::mem::swap(&mut self.dv_current, &mut self.dv_previous);
    }

    /// Drift by `step`, on top of the previous position increment.
    fn advance_dq(&mut self, step: f64, q_last: &[DoublePrecision<f64>]) {
        for k in 0..q_last.len() {
            let dq = self.dq_previous[k] + step * self.v_stage[k];
            self.q_stage[k] = q_last[k].value + dq;
            self.dq_current[k] = dq;
        }
    }

    /// Kick by `step` with the accelerations at `q_stage` and `time`, on top
    /// of the previous velocity increment.
    fn advance_dv(
        &mut self,
        step: f64,
        time: f64,
        v_last: &[DoublePrecision<f64>],
        compute_acceleration: &mut RightHandSide<'_>,
    ) {
        compute_acceleration(time, &self.q_stage, &mut self.acceleration);
        for k in 0..v_last.len() {
            let dv = self.dv_previous[k] + step * self.acceleration[k];
            self.v_stage[k] = v_last[k].value + dv;
            self.dv_current[k] = dv;
        }
    }
}

fn emit(
    time: DoublePrecision<f64>,
    q_last: &[DoublePrecision<f64>],
    v_last: &[DoublePrecision<f64>],
) -> SystemState {
    SystemState {
        time,
        positions: q_last.to_vec(),
        velocities: v_last.to_vec(),
    }
}

impl FixedStepSizeIntegrator for SymplecticRungeKuttaNystromIntegrator {
    fn order(&self) -> usize {
        self.order
    }

    fn evaluations(&self) -> usize {
        self.stages()
    }

    /// Integrate with steps of `parameters.step`.
    ///
    /// Arguments
    /// -----------------
    /// * `compute_acceleration`: The force callback, called once per stage.
    /// * `parameters`: Initial state, end time, step, sampling period and
    ///   whether `t_final` must be hit exactly.
    ///
    /// Return
    /// ----------
    /// * Every `sampling_period`-th state after the initial one, or only the
    ///   final state if the period is 0. States are always synchronized.
    fn solve(
        &self,
        compute_acceleration: &mut RightHandSide<'_>,
        parameters: &FixedStepParameters,
    ) -> Vec<SystemState> {
        assert!(
            parameters.step > 0.0,
            "The integration step must be positive, got {}",
            parameters.step
        );
        let dimension = parameters.initial.dimension();
        assert_eq!(
            parameters.initial.velocities.len(),
            dimension,
            "Positions and velocities must have the same dimension"
        );
        let period = parameters.sampling_period;
        let t_final = parameters.t_final;
        let mut tn = parameters.initial.time;

        let capacity = if period == 0 {
            1
        } else {
            let steps = (t_final - tn.value) / parameters.step + 1.0;
            (steps / period as f64).ceil().max(0.0) as usize + 1
        };
        let mut solution = Vec::with_capacity(capacity);

        let mut scratch = Scratch::new(dimension);
        let mut q_last = parameters.initial.positions.clone();
        let mut v_last = parameters.initial.velocities.clone();
        for k in 0..dimension {
            scratch.v_stage[k] = v_last[k].value;
        }
        let mut sampling_phase: usize = 0;

        // Length of the current step; only the last one may differ.
        let mut h = parameters.step;

        let fsal = self.vanishing_coefficients != VanishingCoefficients::None;
        let mut q_and_v_are_synchronized = true;
        let mut should_synchronize = false;

        let mut at_end = !parameters.t_final_is_exact && t_final < tn.value + h;
        while !at_end {
            if parameters.t_final_is_exact {
                // The last interval is between 0.5 and 1.5 steps long, unless
                // it is also the first one.
                if t_final <= tn.value + 1.5 * h {
                    at_end = true;
                    h = (t_final - tn.value) - tn.error;
                }
            } else if t_final < tn.value + 2.0 * h {
                at_end = true;
            }

            for k in 0..dimension {
                scratch.dq_current[k] = 0.0;
                scratch.dv_current[k] = 0.0;
                scratch.q_stage[k] = q_last[k].value;
            }

            if fsal {
                // The folded operation assumes that consecutive steps have the
                // same length, so we also synchronize before a shortened or
                // lengthened last step.
                let next_step_is_last =
                    parameters.t_final_is_exact && t_final <= tn.value + 2.5 * h;
                should_synchronize = at_end
                    || next_step_is_last
                    || (period != 0 && sampling_phase % period == 0);
            }

            if self.vanishing_coefficients == VanishingCoefficients::FirstBVanishes
                && q_and_v_are_synchronized
            {
                // Desynchronize.
                scratch.swap_dq();
                for k in 0..dimension {
                    scratch.v_stage[k] = v_last[k].value;
                }
                scratch.advance_dq(self.fsal().first * h, &q_last);
                q_and_v_are_synchronized = false;
            }

            let stages = self.stages();
            for i in 0..stages {
                scratch.swap_dq();
                scratch.swap_dv();

                // The kick must come before the drift, the two depend on one another.
                if self.vanishing_coefficients == VanishingCoefficients::LastAVanishes
                    && q_and_v_are_synchronized
                    && i == 0
                {
                    scratch.advance_dv(
                        self.fsal().first * h,
                        tn.value,
                        &v_last,
                        compute_acceleration,
                    );
                    q_and_v_are_synchronized = false;
                } else {
                    scratch.advance_dv(
                        self.b[i] * h,
                        tn.value + (tn.error + self.c[i] * h),
                        &v_last,
                        compute_acceleration,
                    );
                }

                if self.vanishing_coefficients == VanishingCoefficients::FirstBVanishes
                    && should_synchronize
                    && i == stages - 1
                {
                    scratch.advance_dq(self.fsal().last * h, &q_last);
                    q_and_v_are_synchronized = true;
                } else {
                    scratch.advance_dq(self.a[i] * h, &q_last);
                }
            }

            if self.vanishing_coefficients == VanishingCoefficients::LastAVanishes
                && should_synchronize
            {
                scratch.swap_dv();
                scratch.advance_dv(
                    self.fsal().last * h,
                    tn.value + h,
                    &v_last,
                    compute_acceleration,
                );
                q_and_v_are_synchronized = true;
            }

            for k in 0..dimension {
                q_last[k].increment(scratch.dq_current[k]);
                v_last[k].increment(scratch.dv_current[k]);
                scratch.q_stage[k] = q_last[k].value;
                scratch.v_stage[k] = v_last[k].value;
            }
            tn.increment(h);

            if period != 0 {
                if sampling_phase % period == 0 {
                    solution.push(emit(tn, &q_last, &v_last));
                }
                sampling_phase += 1;
            }
        }

        if period == 0 {
            solution.push(emit(tn, &q_last, &v_last));
        }
        trace!(
            states = solution.len(),
            t = tn.value,
            "symplectic integration completed"
        );
        solution
    }
}

#[cfg(test)]
mod symplectic_runge_kutta_nystrom_test {
    use super::*;
    use approx::assert_relative_eq;

    // q″ = -q, q(0) = 1, v(0) = 0.
    fn harmonic_oscillator(_t: f64, q: &[f64], a: &mut [f64]) {
        for (a, q) in a.iter_mut().zip(q) {
            *a = -q;
        }
    }

    fn parameters(t_final: f64, step: f64, period: usize, exact: bool) -> FixedStepParameters {
        FixedStepParameters {
            initial: SystemState::new(0.0, &[1.0], &[0.0]),
            t_final,
            step,
            sampling_period: period,
            t_final_is_exact: exact,
        }
    }

    fn all_methods() -> Vec<SymplecticRungeKuttaNystromIntegrator> {
        vec![
            leapfrog(),
            position_verlet(),
            mclachlan_atela_1992_order_4_optimal(),
            mclachlan_atela_1992_order_5_optimal(),
        ]
    }

    #[test]
    fn test_coefficient_classification() {
        let kdk = leapfrog();
        assert_eq!(kdk.vanishing_coefficients(), VanishingCoefficients::LastAVanishes);
        assert_eq!(kdk.stages(), 1);
        assert_eq!(kdk.b, vec![1.0]);
        assert_eq!(kdk.a, vec![1.0]);
        assert_eq!(kdk.c, vec![0.0]);

        let dkd = position_verlet();
        assert_eq!(dkd.vanishing_coefficients(), VanishingCoefficients::FirstBVanishes);
        assert_eq!(dkd.stages(), 1);
        assert_eq!(dkd.a, vec![1.0]);
        assert_eq!(dkd.b, vec![1.0]);
        assert_eq!(dkd.c, vec![0.5]);

        let ma4 = mclachlan_atela_1992_order_4_optimal();
        assert_eq!(ma4.vanishing_coefficients(), VanishingCoefficients::None);
        assert_eq!(ma4.evaluations(), 4);
        assert_eq!(ma4.order(), 4);
        assert_eq!(mclachlan_atela_1992_order_5_optimal().evaluations(), 6);
    }

    #[test]
    fn test_weights_are_consistent() {
        for method in all_methods() {
            // Folding preserves the sums of the weights.
            let sum_a: f64 = method.a.iter().sum();
            let sum_b: f64 = method.b.iter().sum();
            assert_relative_eq!(sum_a, 1.0, epsilon = 1e-15);
            assert_relative_eq!(sum_b, 1.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_one_period_of_harmonic_oscillator() {
        let tau = 2.0 * std::f64::consts::PI;
        for method in all_methods() {
            let step = tau / 1000.0;
            let solution = method.solve(&mut harmonic_oscillator, &parameters(tau, step, 0, true));
            assert_eq!(solution.len(), 1);
            let last = &solution[0];
            assert_relative_eq!(last.time.value, tau, epsilon = 1e-12);
            // Second order methods: error ~ h²/24 per unit time.
            assert_relative_eq!(last.positions[0].value, 1.0, epsilon = 1e-4);
            assert_relative_eq!(last.velocities[0].value, 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_convergence_order() {
        let tau = 2.0 * std::f64::consts::PI;
        for method in all_methods() {
            let error = |steps: f64| {
                let solution = method.solve(
                    &mut harmonic_oscillator,
                    &parameters(tau, tau / steps, 0, true),
                );
                (solution[0].positions[0].value - 1.0)
                    .abs()
                    .max(solution[0].velocities[0].value.abs())
            };
            let ratio = error(50.0) / error(100.0);
            let expected = 2f64.powi(method.order() as i32);
            assert!(
                ratio > 0.7 * expected,
                "order {}: error ratio {ratio}",
                method.order()
            );
        }
    }

    #[test]
    fn test_sampling() {
        for method in all_methods() {
            let solution = method.solve(&mut harmonic_oscillator, &parameters(1.0, 0.1, 1, true));
            assert_eq!(solution.len(), 10);
            for (i, state) in solution.iter().enumerate() {
                assert_relative_eq!(state.time.value, 0.1 * (i + 1) as f64, epsilon = 1e-14);
                assert_relative_eq!(
                    state.positions[0].value,
                    state.time.value.cos(),
                    epsilon = 1e-2
                );
                assert_relative_eq!(
                    state.velocities[0].value,
                    -state.time.value.sin(),
                    epsilon = 1e-2
                );
            }

            let every_third = method.solve(&mut harmonic_oscillator, &parameters(1.0, 0.1, 3, true));
            let times: Vec<f64> = every_third.iter().map(|s| s.time.value).collect();
            assert_eq!(times.len(), 4);
            assert_relative_eq!(times[1], 0.4, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_inexact_end_stops_before_t_final() {
        for method in all_methods() {
            let solution = method.solve(&mut harmonic_oscillator, &parameters(1.05, 0.1, 0, false));
            assert_eq!(solution.len(), 1);
            assert_relative_eq!(solution[0].time.value, 1.0, epsilon = 1e-14);

            // Less than one step: the initial state is returned.
            let solution = method.solve(&mut harmonic_oscillator, &parameters(0.05, 0.1, 0, false));
            assert_eq!(solution[0].time.value, 0.0);
            assert_eq!(solution[0].positions[0].value, 1.0);
        }
    }

    #[test]
    fn test_exact_end_absorbs_remainder() {
        for method in all_methods() {
            // 10.3 steps: the last step is 1.3 steps long.
            let solution = method.solve(&mut harmonic_oscillator, &parameters(1.03, 0.1, 1, true));
            assert_eq!(solution.len(), 10);
            let last = solution.last().unwrap();
            assert_relative_eq!(last.time.value, 1.03, epsilon = 1e-14);
            assert_relative_eq!(last.positions[0].value, 1.03f64.cos(), epsilon = 1e-2);

            // 10.7 steps: the last step is 0.7 step long.
            let solution = method.solve(&mut harmonic_oscillator, &parameters(1.07, 0.1, 1, true));
            assert_eq!(solution.len(), 11);
        }
    }

    #[test]
    fn test_force_evaluations() {
        for method in all_methods() {
            let mut evaluations = 0;
            let mut counting = |t: f64, q: &[f64], a: &mut [f64]| {
                evaluations += 1;
                harmonic_oscillator(t, q, a);
            };
            method.solve(&mut counting, &parameters(100.05, 0.1, 0, false));
            // One evaluation per stage, plus at most one for the final
            // synchronization of a first-same-as-last method.
            let steps = 1000;
            assert!(evaluations >= steps * method.evaluations());
            assert!(evaluations <= steps * method.evaluations() + 2);
        }
    }
}
