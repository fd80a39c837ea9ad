//! Chebyshev series over a bounded time interval.
//!
//! A [`ChebyshevSeries`] represents `p(t) = Σ cₖ Tₖ(x)` where
//! `x = (2t − t_min − t_max) / (t_max − t_min)` maps `[t_min, t_max]` onto
//! `[-1, 1]`. The coefficients may be plain `f64` or `Vector3<f64>`
//! displacements, see [`SeriesElement`].
//!
//! ## Evaluation
//! Values are computed with the Clenshaw recurrence on the `Tₖ`. Derivatives
//! use `T'ₖ = k Uₖ₋₁` and a Clenshaw recurrence on the Chebyshev polynomials of
//! the second kind, scaled by `dx/dt = 2 / (t_max − t_min)`.
//!
//! Evaluating at a time whose rescaled variable lies outside
//! `[-1.1, 1.1]` is a programming error and panics: round-off is tolerated,
//! extrapolation is not.
//!
//! ## Fitting
//! [`ChebyshevSeries::newhall_approximation`] builds a series from equally
//! spaced position and velocity samples, see [`crate::numerics::newhall`].
//!
//! ## Serialization
//! [`ChebyshevSeries::write_to_message`] and
//! [`ChebyshevSeries::read_from_message`] convert to and from the serde
//! structure [`ChebyshevSeriesMessage`]. Each coefficient records whether it
//! is a plain double or a vector quantity, and reading checks the tag.
use std::{
    fmt::Debug,
    ops::{Add, Mul, Sub},
};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    constants::CHEBYSHEV_DOMAIN_SLACK, gravis_errors::GravisError, numerics::newhall,
    time::Instant,
};

/// Element type of a Chebyshev series: anything forming a real vector space
/// with a norm, and a serialized representation.
pub trait SeriesElement:
    Copy
    + Debug
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
{
    /// Name of the serialized element kind, reported on mismatches.
    const KIND: &'static str;

    fn zero() -> Self;

    fn norm(&self) -> f64;

    fn write_to_message(&self) -> CoefficientMessage;

    fn read_from_message(message: &CoefficientMessage) -> Result<Self, GravisError>;
}

impl SeriesElement for f64 {
    const KIND: &'static str = "double";

    fn zero() -> Self {
        0.0
    }

    fn norm(&self) -> f64 {
        self.abs()
    }

    fn write_to_message(&self) -> CoefficientMessage {
        CoefficientMessage::Double(*self)
    }

    fn read_from_message(message: &CoefficientMessage) -> Result<Self, GravisError> {
        match message {
            CoefficientMessage::Double(d) => Ok(*d),
            other => Err(GravisError::SerializationMismatch {
                expected: Self::KIND,
                found: other.kind(),
            }),
        }
    }
}

impl SeriesElement for Vector3<f64> {
    const KIND: &'static str = "vector";

    fn zero() -> Self {
        Vector3::zeros()
    }

    fn norm(&self) -> f64 {
        Vector3::norm(self)
    }

    fn write_to_message(&self) -> CoefficientMessage {
        CoefficientMessage::Vector([self.x, self.y, self.z])
    }

    fn read_from_message(message: &CoefficientMessage) -> Result<Self, GravisError> {
        match message {
            CoefficientMessage::Vector(v) => Ok(Vector3::from(*v)),
            other => Err(GravisError::SerializationMismatch {
                expected: Self::KIND,
                found: other.kind(),
            }),
        }
    }
}

/// Serialized coefficient, tagged with its element kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoefficientMessage {
    Double(f64),
    Vector([f64; 3]),
}

impl CoefficientMessage {
    fn kind(&self) -> &'static str {
        match self {
            CoefficientMessage::Double(_) => <f64 as SeriesElement>::KIND,
            CoefficientMessage::Vector(_) => <Vector3<f64> as SeriesElement>::KIND,
        }
    }
}

/// Serialized form of a [`ChebyshevSeries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChebyshevSeriesMessage {
    pub coefficients: Vec<CoefficientMessage>,
    pub t_min: Instant,
    pub t_max: Instant,
}

/// A polynomial approximant over `[t_min, t_max]` in the Chebyshev basis.
#[derive(Debug, Clone, PartialEq)]
pub struct ChebyshevSeries<V> {
    coefficients: Vec<V>,
    t_min: Instant,
    t_max: Instant,
    // Precomputed affine map t ↦ x.
    t_mean: f64,
    two_over_duration: f64,
}

impl<V: SeriesElement> ChebyshevSeries<V> {
    /// Construct a series from explicit coefficients.
    ///
    /// Arguments
    /// -----------------
    /// * `coefficients`: Chebyshev coefficients `c₀ … cₙ`, at least one.
    /// * `t_min`, `t_max`: Domain of the series, `t_min < t_max`.
    ///
    /// Return
    /// ----------
    /// * The series, or [`GravisError::InvalidArgument`] if the coefficient
    ///   list is empty or the domain is empty or inverted.
    pub fn try_new(
        coefficients: Vec<V>,
        t_min: Instant,
        t_max: Instant,
    ) -> Result<Self, GravisError> {
        if coefficients.is_empty() {
            return Err(GravisError::InvalidArgument(
                "Chebyshev series must have at least one coefficient".into(),
            ));
        }
        if !(t_min < t_max) {
            return Err(GravisError::InvalidArgument(format!(
                "Chebyshev series domain is empty: t_min = {t_min:?}, t_max = {t_max:?}"
            )));
        }
        let duration = t_max - t_min;
        Ok(ChebyshevSeries {
            coefficients,
            t_min,
            t_max,
            t_mean: 0.5 * (t_min.seconds_since_j2000() + t_max.seconds_since_j2000()),
            two_over_duration: 2.0 / duration,
        })
    }

    /// Panicking counterpart of [`ChebyshevSeries::try_new`], for arguments
    /// that are under the control of the caller.
    ///
    /// Panics
    /// ----------
    /// * If the coefficient list is empty or `t_min >= t_max`.
    pub fn new(coefficients: Vec<V>, t_min: Instant, t_max: Instant) -> Self {
        match Self::try_new(coefficients, t_min, t_max) {
            Ok(series) => series,
            Err(e) => panic!("{e}"),
        }
    }

    /// Fit a series of the given degree to equally spaced samples of a
    /// function and its derivative.
    ///
    /// Arguments
    /// -----------------
    /// * `degree`: Degree of the resulting polynomial, `3 <= degree < 2 · samples`.
    /// * `positions`: Samples of the function at `t_min + i (t_max − t_min) / N`.
    /// * `velocities`: Samples of its time derivative at the same times.
    /// * `t_min`, `t_max`: Times of the first and last samples.
    ///
    /// Return
    /// ----------
    /// * A series matching the samples and derivatives exactly at both ends
    ///   and in the least-squares sense in between.
    ///
    /// See also
    /// ------------
    /// * [`newhall::newhall_matrix`] – The linear map from samples to coefficients.
    pub fn newhall_approximation(
        degree: usize,
        positions: &[V],
        velocities: &[V],
        t_min: Instant,
        t_max: Instant,
    ) -> Self {
        assert_eq!(
            positions.len(),
            velocities.len(),
            "Mismatched numbers of position and velocity samples"
        );
        assert!(t_min < t_max, "Empty fitting interval");

        // Velocities are fitted in the rescaled variable x, where dx/dt = 2 / Δt.
        let half_duration = 0.5 * (t_max - t_min);
        let matrix = newhall::newhall_matrix(degree, positions.len() - 1);

        let coefficients = (0..=degree)
            .map(|k| {
                positions
                    .iter()
                    .zip(velocities)
                    .enumerate()
                    .fold(V::zero(), |acc, (i, (q, v))| {
                        acc + *q * matrix[(k, 2 * i)]
                            + *v * (half_duration * matrix[(k, 2 * i + 1)])
                    })
            })
            .collect();

        ChebyshevSeries::new(coefficients, t_min, t_max)
    }

    pub fn t_min(&self) -> Instant {
        self.t_min
    }

    pub fn t_max(&self) -> Instant {
        self.t_max
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[V] {
        &self.coefficients
    }

    /// The highest-order coefficient, whose norm is used as an estimate of
    /// the truncation error.
    pub fn last_coefficient(&self) -> V {
        self.coefficients[self.coefficients.len() - 1]
    }

    fn rescaled(&self, time: Instant) -> f64 {
        let x = (time.seconds_since_j2000() - self.t_mean) * self.two_over_duration;
        assert!(
            (-CHEBYSHEV_DOMAIN_SLACK..=CHEBYSHEV_DOMAIN_SLACK).contains(&x),
            "Evaluation at {time:?} outside of [{:?}, {:?}] (rescaled variable {x} not in [-1.1, 1.1])",
            self.t_min,
            self.t_max
        );
        x
    }

    /// Value of the series at `time`.
    ///
    /// Panics
    /// ----------
    /// * If `time` is outside the domain by more than the round-off slack.
    pub fn evaluate(&self, time: Instant) -> V {
        let x = self.rescaled(time);
        let two_x = x + x;
        let mut b_k_plus_1 = V::zero();
        let mut b_k_plus_2 = V::zero();
        for c in self.coefficients[1..].iter().rev() {
            let b_k = *c + b_k_plus_1 * two_x - b_k_plus_2;
            b_k_plus_2 = b_k_plus_1;
            b_k_plus_1 = b_k;
        }
        self.coefficients[0] + b_k_plus_1 * x - b_k_plus_2
    }

    /// Time derivative of the series at `time`.
    ///
    /// Panics
    /// ----------
    /// * If `time` is outside the domain by more than the round-off slack.
    pub fn evaluate_derivative(&self, time: Instant) -> V {
        let x = self.rescaled(time);
        let two_x = x + x;
        // p'(x) = Σₖ₌₁ k cₖ Uₖ₋₁(x), summed with Clenshaw on the Uₖ.
        let mut b_k_plus_1 = V::zero();
        let mut b_k_plus_2 = V::zero();
        for (k, c) in self.coefficients.iter().enumerate().skip(1).rev() {
            let b_k = *c * (k as f64) + b_k_plus_1 * two_x - b_k_plus_2;
            b_k_plus_2 = b_k_plus_1;
            b_k_plus_1 = b_k;
        }
        b_k_plus_1 * self.two_over_duration
    }

    pub fn write_to_message(&self) -> ChebyshevSeriesMessage {
        ChebyshevSeriesMessage {
            coefficients: self
                .coefficients
                .iter()
                .map(SeriesElement::write_to_message)
                .collect(),
            t_min: self.t_min,
            t_max: self.t_max,
        }
    }

    /// Rebuild a series from its serialized form.
    ///
    /// Return
    /// ----------
    /// * [`GravisError::SerializationMismatch`] if the message holds elements
    ///   of another kind, [`GravisError::InvalidArgument`] if it is malformed.
    pub fn read_from_message(message: &ChebyshevSeriesMessage) -> Result<Self, GravisError> {
        let coefficients = message
            .coefficients
            .iter()
            .map(V::read_from_message)
            .collect::<Result<Vec<_>, _>>()?;
        Self::try_new(coefficients, message.t_min, message.t_max)
    }
}
