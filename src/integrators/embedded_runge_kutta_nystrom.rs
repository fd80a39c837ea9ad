//! # Embedded explicit Runge–Kutta–Nyström integrators
//!
//! Adaptive-step solvers for `q″ = f(q, t)` built on a pair of
//! Runge–Kutta–Nyström formulae sharing their stages. We follow the
//! conventions of Dormand, El-Mikkawy & Prince (1986), *Families of
//! Runge–Kutta–Nyström formulae*:
//!
//! * `c`: the nodes;
//! * `a`: the strictly lower triangular Runge–Kutta matrix;
//! * `b̂`, `b̂′`: position and velocity weights of the higher-order method;
//! * `b`, `b′`: position and velocity weights of the lower-order method.
//!
//! The stage accelerations are called `gᵢ`. The higher-order result advances
//! the state, the difference with the lower-order one estimates the local
//! error.
//!
//! ## Step-size control
//!
//! After each attempt the caller's `tolerance_to_error_ratio` is evaluated.
//! A ratio of at least 1 accepts the step and lets the next one grow by
//! `min(max_step_growth, safety · ratio^(1/(p+1)))`, `p` being the lower
//! order; a smaller ratio rejects it and retries from the same state with
//! the step scaled by `safety · ratio^(1/(p+1))`. The last step is shortened
//! to end exactly at `t_final`.
//!
//! For methods with the first-same-as-last property the last stage of an
//! accepted step is the first stage of the next one and is not recomputed.
use tracing::trace;

use crate::integrators::{
    AdaptiveStepSize, AdaptiveStepSizeIntegrator, IntegrationProblem, SystemState,
    SystemStateError,
};

/// An embedded pair of explicit Runge–Kutta–Nyström methods.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedExplicitRungeKuttaNystromIntegrator {
    higher_order: usize,
    lower_order: usize,
    first_same_as_last: bool,
    c: Vec<f64>,
    /// Row `i` holds `aᵢ₀ … aᵢ,ᵢ₋₁`.
    a: Vec<Vec<f64>>,
    b_hat: Vec<f64>,
    b_prime_hat: Vec<f64>,
    b: Vec<f64>,
    b_prime: Vec<f64>,
}

impl EmbeddedExplicitRungeKuttaNystromIntegrator {
    /// Build an embedded pair.
    ///
    /// Arguments
    /// -----------------
    /// * `higher_order`, `lower_order`: Orders of the two methods.
    /// * `first_same_as_last`: Whether the last stage is evaluated at the
    ///   higher-order result, so that it can serve as the next first stage.
    /// * `c`, `a`, `b_hat`, `b_prime_hat`, `b`, `b_prime`: The tableau, with
    ///   `a` given as its strictly lower triangular rows.
    ///
    /// Panics
    /// ----------
    /// * If the tableau is inconsistent with the number of stages.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        higher_order: usize,
        lower_order: usize,
        first_same_as_last: bool,
        c: Vec<f64>,
        a: Vec<Vec<f64>>,
        b_hat: Vec<f64>,
        b_prime_hat: Vec<f64>,
        b: Vec<f64>,
        b_prime: Vec<f64>,
    ) -> Self {
        let stages = c.len();
        assert!(stages >= 2, "An embedded method needs at least two stages");
        assert_eq!(a.len(), stages, "Runge–Kutta matrix must have one row per stage");
        for (i, row) in a.iter().enumerate() {
            assert_eq!(row.len(), i, "Row {i} of the Runge–Kutta matrix has the wrong length");
        }
        for weights in [&b_hat, &b_prime_hat, &b, &b_prime] {
            assert_eq!(weights.len(), stages, "Weights must have one entry per stage");
        }
        assert!(
            lower_order < higher_order,
            "The error estimator must be of lower order"
        );
        EmbeddedExplicitRungeKuttaNystromIntegrator {
            higher_order,
            lower_order,
            first_same_as_last,
            c,
            a,
            b_hat,
            b_prime_hat,
            b,
            b_prime,
        }
    }

    pub fn stages(&self) -> usize {
        self.c.len()
    }

    pub fn first_same_as_last(&self) -> bool {
        self.first_same_as_last
    }
}

/// Dormand, El-Mikkawy & Prince (1986), RKN4(3)4FM, table 3: fourth order
/// with a third-order error estimator, four stages, first same as last.
pub fn dormand_el_mikkawy_prince_1986_rkn_434fm() -> EmbeddedExplicitRungeKuttaNystromIntegrator {
    EmbeddedExplicitRungeKuttaNystromIntegrator::new(
        4,
        3,
        true,
        vec![0.0, 1.0 / 4.0, 7.0 / 10.0, 1.0],
        vec![
            vec![],
            vec![1.0 / 32.0],
            vec![7.0 / 1000.0, 119.0 / 500.0],
            vec![1.0 / 14.0, 8.0 / 27.0, 25.0 / 189.0],
        ],
        vec![1.0 / 14.0, 8.0 / 27.0, 25.0 / 189.0, 0.0],
        vec![1.0 / 14.0, 32.0 / 81.0, 250.0 / 567.0, 5.0 / 54.0],
        vec![-7.0 / 150.0, 67.0 / 150.0, 3.0 / 20.0, -1.0 / 20.0],
        vec![13.0 / 21.0, -20.0 / 27.0, 275.0 / 189.0, -1.0 / 3.0],
    )
}

impl AdaptiveStepSizeIntegrator for EmbeddedExplicitRungeKuttaNystromIntegrator {
    fn higher_order(&self) -> usize {
        self.higher_order
    }

    fn lower_order(&self) -> usize {
        self.lower_order
    }

    /// Integrate `problem` until its `t_final`, appending every accepted
    /// state through `problem.append_state`.
    ///
    /// Panics
    /// ----------
    /// * If the tolerance-to-error ratio is NaN.
    /// * If the step underflows to zero.
    fn solve(&self, problem: IntegrationProblem<'_>, adaptive_step_size: AdaptiveStepSize<'_>) {
        let IntegrationProblem {
            compute_acceleration,
            initial_state,
            t_final,
            append_state,
        } = problem;
        let AdaptiveStepSize {
            first_time_step,
            safety_factor,
            max_step_growth,
            tolerance_to_error_ratio,
        } = adaptive_step_size;
        assert!(
            first_time_step > 0.0,
            "The first time step must be positive, got {first_time_step}"
        );

        let dimension = initial_state.dimension();
        let stages = self.stages();
        let exponent = 1.0 / (self.lower_order as f64 + 1.0);

        let mut q = initial_state.positions;
        let mut v = initial_state.velocities;
        let mut t = initial_state.time;

        // Stage accelerations, and the stage positions.
        let mut g = vec![vec![0.0; dimension]; stages];
        let mut q_stage = vec![0.0; dimension];

        let mut dq_hat = vec![0.0; dimension];
        let mut dv_hat = vec![0.0; dimension];
        let mut error = SystemStateError {
            position_error: vec![0.0; dimension],
            velocity_error: vec![0.0; dimension],
        };

        let mut h = first_time_step;
        let mut first_stage_is_valid = false;

        let mut at_end = false;
        while !at_end && (t_final - t.value) - t.error > 0.0 {
            let mut tolerance_to_error_ratio_value;
            loop {
                let remaining = (t_final - t.value) - t.error;
                at_end = remaining <= h;
                if at_end {
                    h = remaining;
                }
                assert!(h > 0.0, "Step size underflow at t = {} (h = {h})", t.value);

                for i in 0..stages {
                    if i == 0 && self.first_same_as_last && first_stage_is_valid {
                        continue;
                    }
                    for k in 0..dimension {
                        let mut weighted = 0.0;
                        for (j, a_ij) in self.a[i].iter().enumerate() {
                            weighted += a_ij * g[j][k];
                        }
                        q_stage[k] = q[k].value + h * (self.c[i] * v[k].value + h * weighted);
                    }
                    compute_acceleration(t.value + (t.error + self.c[i] * h), &q_stage, &mut g[i]);
                }
                first_stage_is_valid = true;

                for k in 0..dimension {
                    let (mut q_hat, mut v_hat, mut q_low, mut v_low) = (0.0, 0.0, 0.0, 0.0);
                    for i in 0..stages {
                        q_hat += self.b_hat[i] * g[i][k];
                        v_hat += self.b_prime_hat[i] * g[i][k];
                        q_low += self.b[i] * g[i][k];
                        v_low += self.b_prime[i] * g[i][k];
                    }
                    dq_hat[k] = h * (v[k].value + h * q_hat);
                    dv_hat[k] = h * v_hat;
                    error.position_error[k] = h * h * (q_hat - q_low);
                    error.velocity_error[k] = h * (v_hat - v_low);
                }

                tolerance_to_error_ratio_value = tolerance_to_error_ratio(h, &error);
                assert!(
                    !tolerance_to_error_ratio_value.is_nan(),
                    "NaN tolerance to error ratio at t = {} (h = {h})",
                    t.value
                );
                if tolerance_to_error_ratio_value >= 1.0 {
                    break;
                }
                trace!(
                    t = t.value,
                    h,
                    ratio = tolerance_to_error_ratio_value,
                    "rejected step"
                );
                h *= safety_factor * tolerance_to_error_ratio_value.powf(exponent);
            }

            for k in 0..dimension {
                q[k].increment(dq_hat[k]);
                v[k].increment(dv_hat[k]);
            }
            t.increment(h);
            append_state(&SystemState {
                time: t,
                positions: q.clone(),
                velocities: v.clone(),
            });

            if self.first_same_as_last {
                g.swap(0, stages - 1);
            }
            h *= (safety_factor * tolerance_to_error_ratio_value.powf(exponent))
                .min(max_step_growth);
        }
    }
}

/// Convenience for callers that only need the accepted states.
pub fn collect_states(
    integrator: &dyn AdaptiveStepSizeIntegrator,
    compute_acceleration: &mut dyn FnMut(f64, &[f64], &mut [f64]),
    initial_state: SystemState,
    t_final: f64,
    adaptive_step_size: AdaptiveStepSize<'_>,
) -> Vec<SystemState> {
    let mut states = vec![];
    let mut append_state = |state: &SystemState| states.push(state.clone());
    integrator.solve(
        IntegrationProblem {
            compute_acceleration,
            initial_state,
            t_final,
            append_state: &mut append_state,
        },
        adaptive_step_size,
    );
    states
}

#[cfg(test)]
mod embedded_runge_kutta_nystrom_test {
    use super::*;
    use approx::assert_relative_eq;

    fn harmonic_oscillator(_t: f64, q: &[f64], a: &mut [f64]) {
        for (a, q) in a.iter_mut().zip(q) {
            *a = -q;
        }
    }

    fn max_abs(values: &[f64]) -> f64 {
        values.iter().fold(0.0, |m, x| m.max(x.abs()))
    }

    #[test]
    fn test_tableau_consistency() {
        let method = dormand_el_mikkawy_prince_1986_rkn_434fm();
        assert_eq!(method.stages(), 4);
        assert!(method.first_same_as_last());
        // Row sums: Σⱼ aᵢⱼ = cᵢ² / 2.
        for (row, c) in method.a.iter().zip(&method.c) {
            let sum: f64 = row.iter().sum();
            assert_relative_eq!(sum, c * c / 2.0, epsilon = 1e-15);
        }
        // Quadrature conditions for both methods.
        let sum = |w: &[f64]| w.iter().sum::<f64>();
        assert_relative_eq!(sum(&method.b_hat), 0.5, epsilon = 1e-15);
        assert_relative_eq!(sum(&method.b), 0.5, epsilon = 1e-15);
        assert_relative_eq!(sum(&method.b_prime_hat), 1.0, epsilon = 1e-15);
        assert_relative_eq!(sum(&method.b_prime), 1.0, epsilon = 1e-15);
        // First same as last: the last row of a is b̂ and the last node is 1.
        assert_eq!(method.a[3][..], method.b_hat[..3]);
        assert_eq!(method.c[3], 1.0);
    }

    #[test]
    fn test_harmonic_oscillator_lands_on_t_final() {
        let method = dormand_el_mikkawy_prince_1986_rkn_434fm();
        let tolerance: f64 = 1e-10;
        let mut ratio = |_h: f64, error: &SystemStateError| {
            (tolerance / max_abs(&error.position_error))
                .min(tolerance / max_abs(&error.velocity_error))
        };
        let t_final = 10.0;
        let states = collect_states(
            &method,
            &mut harmonic_oscillator,
            SystemState::new(0.0, &[1.0, 0.0], &[0.0, 1.0]),
            t_final,
            AdaptiveStepSize {
                first_time_step: 0.1,
                safety_factor: 0.9,
                max_step_growth: 5.0,
                tolerance_to_error_ratio: &mut ratio,
            },
        );

        assert!(states.len() > 10);
        let last = states.last().unwrap();
        assert_relative_eq!(last.time.value + last.time.error, t_final, epsilon = 1e-14);
        assert_relative_eq!(last.positions[0].value, t_final.cos(), epsilon = 1e-6);
        assert_relative_eq!(last.positions[1].value, t_final.sin(), epsilon = 1e-6);
        assert_relative_eq!(last.velocities[0].value, -t_final.sin(), epsilon = 1e-6);

        // Times are strictly increasing.
        for pair in states.windows(2) {
            assert!(pair[0].time.value < pair[1].time.value);
        }
    }

    #[test]
    fn test_tighter_tolerance_means_more_steps() {
        let method = dormand_el_mikkawy_prince_1986_rkn_434fm();
        let steps = |tolerance: f64| {
            let mut ratio = |_h: f64, error: &SystemStateError| {
                tolerance / max_abs(&error.position_error).max(f64::MIN_POSITIVE)
            };
            collect_states(
                &method,
                &mut harmonic_oscillator,
                SystemState::new(0.0, &[1.0], &[0.0]),
                20.0,
                AdaptiveStepSize {
                    first_time_step: 1.0,
                    safety_factor: 0.9,
                    max_step_growth: 5.0,
                    tolerance_to_error_ratio: &mut ratio,
                },
            )
            .len()
        };
        let coarse = steps(1e-6);
        let fine = steps(1e-10);
        assert!(fine > 5 * coarse, "{fine} vs {coarse}");
    }

    #[test]
    fn test_first_same_as_last_saves_evaluations() {
        let method = dormand_el_mikkawy_prince_1986_rkn_434fm();
        let mut evaluations = 0;
        let mut accepted = 0;
        let mut rejected = 0;
        {
            let mut counting = |t: f64, q: &[f64], a: &mut [f64]| {
                evaluations += 1;
                harmonic_oscillator(t, q, a);
            };
            let mut ratio = |_h: f64, error: &SystemStateError| {
                let r = 1e-8 / max_abs(&error.position_error).max(f64::MIN_POSITIVE);
                if r < 1.0 {
                    rejected += 1;
                }
                r
            };
            let mut append = |_: &SystemState| accepted += 1;
            method.solve(
                IntegrationProblem {
                    compute_acceleration: &mut counting,
                    initial_state: SystemState::new(0.0, &[1.0], &[0.0]),
                    t_final: 5.0,
                    append_state: &mut append,
                },
                AdaptiveStepSize {
                    first_time_step: 0.01,
                    safety_factor: 0.9,
                    max_step_growth: 5.0,
                    tolerance_to_error_ratio: &mut ratio,
                },
            );
        }
        assert!(accepted > 0);
        // One initial evaluation, then three per attempt.
        assert_eq!(evaluations, 1 + 3 * (accepted + rejected));
    }

    #[test]
    #[should_panic(expected = "NaN tolerance to error ratio")]
    fn test_nan_ratio_is_fatal() {
        let method = dormand_el_mikkawy_prince_1986_rkn_434fm();
        let mut ratio = |_h: f64, _error: &SystemStateError| f64::NAN;
        collect_states(
            &method,
            &mut harmonic_oscillator,
            SystemState::new(0.0, &[1.0], &[0.0]),
            1.0,
            AdaptiveStepSize {
                first_time_step: 0.1,
                safety_factor: 0.9,
                max_step_growth: 5.0,
                tolerance_to_error_ratio: &mut ratio,
            },
        );
    }
}
