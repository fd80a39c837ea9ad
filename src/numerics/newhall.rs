//! # Newhall fitting matrices
//!
//! Newhall (1989) approximates a function over `[t_min, t_max]` from equally
//! spaced samples of its value and derivative. The coefficients of the
//! degree-`n` Chebyshev series are the solution of a weighted least-squares
//! problem on all the samples, constrained to reproduce the values and
//! derivatives at both ends exactly.
//!
//! Working in the rescaled variable `x ∈ [-1, 1]`, the sample `i` of `N + 1`
//! sits at `xᵢ = -1 + 2i/N` and the data vector is ordered
//! `[q₀, q'₀, q₁, q'₁, …, q_N, q'_N]`, derivatives being taken with respect to
//! `x`. The solution is linear in the data, `c = M · d`, and `M` depends only
//! on `(n, N)`: this module builds and caches it.
//!
//! ## Construction
//!
//! With `A` the `2(N+1) × (n+1)` matrix of the `Tₖ(xᵢ)` and `T'ₖ(xᵢ)`, `W` the
//! diagonal weights (1 for values, `w²` for derivatives) and `E` the 4 rows of
//! `A` at the endpoints, the KKT system
//!
//! ```text
//! [ 2 AᵀWA  Eᵀ ] [ c ]   [ 2 AᵀW ]
//! [   E     0  ] [ λ ] = [   S   ] d
//! ```
//!
//! is solved once per `(n, N)` (`S` selects the endpoint data from `d`), and
//! the first `n + 1` rows of the solution form `M`.
use std::borrow::Cow;

use nalgebra::DMatrix;
use once_cell::sync::Lazy;

use crate::constants::{DIVISIONS, MAX_DEGREE, MIN_DEGREE, NEWHALL_VELOCITY_WEIGHT};

/// Matrices for `DIVISIONS` intervals, indexed by `degree - MIN_DEGREE`.
static NEWHALL_MATRICES: Lazy<Vec<DMatrix<f64>>> = Lazy::new(|| {
    (MIN_DEGREE..=MAX_DEGREE)
        .map(|degree| compute_newhall_matrix(degree, DIVISIONS))
        .collect()
});

/// Values and derivatives of `T₀ … T_degree` at `x`.
fn chebyshev_basis(degree: usize, x: f64) -> (Vec<f64>, Vec<f64>) {
    let mut t = vec![0.0; degree + 1];
    let mut u = vec![0.0; degree + 1];
    let mut dt = vec![0.0; degree + 1];
    t[0] = 1.0;
    u[0] = 1.0;
    if degree >= 1 {
        t[1] = x;
        u[1] = 2.0 * x;
    }
    for k in 2..=degree {
        t[k] = 2.0 * x * t[k - 1] - t[k - 2];
        u[k] = 2.0 * x * u[k - 1] - u[k - 2];
    }
    // T'ₖ = k Uₖ₋₁
    for k in 1..=degree {
        dt[k] = k as f64 * u[k - 1];
    }
    (t, dt)
}

fn compute_newhall_matrix(degree: usize, divisions: usize) -> DMatrix<f64> {
    let samples = divisions + 1;
    let unknowns = degree + 1;
    let data = 2 * samples;
    let w2 = NEWHALL_VELOCITY_WEIGHT * NEWHALL_VELOCITY_WEIGHT;

    let mut a = DMatrix::<f64>::zeros(data, unknowns);
    let mut weights = Vec::with_capacity(data);
    for i in 0..samples {
        let x = -1.0 + 2.0 * i as f64 / divisions as f64;
        let (t, dt) = chebyshev_basis(degree, x);
        for k in 0..unknowns {
            a[(2 * i, k)] = t[k];
            a[(2 * i + 1, k)] = dt[k];
        }
        weights.push(1.0);
        weights.push(w2);
    }

    // Constrained rows: value and derivative at x = -1 and x = +1.
    let constrained = [0, 1, data - 2, data - 1];

    let mut atw = a.transpose();
    for (j, w) in weights.iter().enumerate() {
        atw.column_mut(j).scale_mut(*w);
    }
    let normal = &atw * &a * 2.0;

    let size = unknowns + constrained.len();
    let mut kkt = DMatrix::<f64>::zeros(size, size);
    kkt.view_mut((0, 0), (unknowns, unknowns)).copy_from(&normal);
    for (r, &row) in constrained.iter().enumerate() {
        for k in 0..unknowns {
            kkt[(unknowns + r, k)] = a[(row, k)];
            kkt[(k, unknowns + r)] = a[(row, k)];
        }
    }

    let mut rhs = DMatrix::<f64>::zeros(size, data);
    rhs.view_mut((0, 0), (unknowns, data))
        .copy_from(&(&atw * 2.0));
    for (r, &row) in constrained.iter().enumerate() {
        rhs[(unknowns + r, row)] = 1.0;
    }

    let solution = kkt
        .lu()
        .solve(&rhs)
        .expect("Singular Newhall system: degree too high for the number of samples");
    solution.rows(0, unknowns).into_owned()
}

/// The matrix mapping the data vector `[q₀, q'₀, …, q_N, q'_N]` to the
/// Chebyshev coefficients of the Newhall approximation.
///
/// Arguments
/// -----------------
/// * `degree`: Degree `n` of the fitted polynomial.
/// * `divisions`: Number `N` of intervals between the `N + 1` samples.
///
/// Return
/// ----------
/// * An `(n + 1) × 2(N + 1)` matrix, borrowed from the process-wide cache
///   for `N = DIVISIONS` and `MIN_DEGREE <= n <= MAX_DEGREE`, computed
///   otherwise.
///
/// Panics
/// ----------
/// * If `degree < 3` or `degree + 1 > 2 (N + 1)`.
pub fn newhall_matrix(degree: usize, divisions: usize) -> Cow<'static, DMatrix<f64>> {
    assert!(
        degree >= MIN_DEGREE,
        "Newhall approximation needs a degree of at least {MIN_DEGREE}, got {degree}"
    );
    assert!(divisions >= 1, "Newhall approximation needs at least two samples");
    assert!(
        degree < 2 * (divisions + 1),
        "Degree {degree} too high for {} samples",
        divisions + 1
    );
    if divisions == DIVISIONS && degree <= MAX_DEGREE {
        Cow::Borrowed(&NEWHALL_MATRICES[degree - MIN_DEGREE])
    } else {
        Cow::Owned(compute_newhall_matrix(degree, divisions))
    }
}
