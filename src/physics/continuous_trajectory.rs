//! # Continuous trajectories
//!
//! A [`ContinuousTrajectory`] compresses a stream of equally spaced
//! `(time, position, velocity)` samples into a sequence of Chebyshev series
//! that can be evaluated at any time of the covered interval.
//!
//! ## Fitting
//!
//! Samples are buffered until [`DIVISIONS`] intervals are available; the
//! block is then fitted with a Newhall approximation and the last sample of
//! the block becomes the first sample of the next one, so that consecutive
//! segments touch. The degree of the fit adapts to the data:
//!
//! * while the error estimate (the norm of the highest coefficient) exceeds
//!   the high tolerance, the degree is increased;
//! * while it is below the low tolerance, a fit one degree lower is tried and
//!   kept if its own estimate does not exceed the high tolerance.
//!
//! The degree reached is used as the starting point of the next block.
//!
//! ## Lookup
//!
//! Evaluation finds the segment covering the requested time by binary search.
//! A caller-owned [`Hint`] remembers the last segment used, which makes
//! monotone sequences of queries constant-time.
//!
//! See also
//! ------------
//! * [`ChebyshevSeries::newhall_approximation`] – The fit of a block.
//! * [`crate::physics::ephemeris::Ephemeris`] – The main producer and consumer.
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    constants::{Meter, Position, Second, Velocity, DIVISIONS, MAX_DEGREE, MIN_DEGREE},
    geometry::{DegreesOfFreedom, DegreesOfFreedomMessage},
    gravis_errors::GravisError,
    numerics::chebyshev_series::{ChebyshevSeries, ChebyshevSeriesMessage},
    time::{ulp_distance, Instant},
};

/// Cache of the segment used by the last evaluation.
///
/// A hint may be used with any trajectory: an index that does not cover the
/// requested time simply falls back to the binary search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hint {
    index: usize,
}

impl Default for Hint {
    fn default() -> Self {
        Hint { index: usize::MAX }
    }
}

impl Hint {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousTrajectory {
    step: Second,
    low_tolerance: Meter,
    high_tolerance: Meter,
    /// Degree used to start the next fit.
    degree: usize,
    series: Vec<ChebyshevSeries<Position>>,
    /// Time of the first sample, or the time passed to the last
    /// `forget_before`. `None` iff nothing was ever appended.
    first_time: Option<Instant>,
    /// Samples not yet fitted. Never more than `DIVISIONS`.
    last_points: Vec<(Instant, DegreesOfFreedom)>,
}

impl ContinuousTrajectory {
    /// Create an empty trajectory.
    ///
    /// Arguments
    /// -----------------
    /// * `step`: Spacing of the samples that will be appended.
    /// * `low_tolerance`: Below this error estimate, lower degrees are tried.
    /// * `high_tolerance`: The error estimate of a segment never exceeds it.
    ///
    /// Panics
    /// ----------
    /// * Unless `step > 0` and `0 < low_tolerance < high_tolerance`.
    pub fn new(step: Second, low_tolerance: Meter, high_tolerance: Meter) -> Self {
        assert!(step > 0.0, "Step must be positive, got {step}");
        assert!(
            0.0 < low_tolerance && low_tolerance < high_tolerance,
            "Tolerances must satisfy 0 < low < high, got low = {low_tolerance}, high = {high_tolerance}"
        );
        ContinuousTrajectory {
            step,
            low_tolerance,
            high_tolerance,
            degree: (MIN_DEGREE + MAX_DEGREE) / 2,
            series: Vec::new(),
            first_time: None,
            last_points: Vec::with_capacity(DIVISIONS),
        }
    }

    /// Whether no segment has been fitted yet.
    pub fn empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Panics
    /// ----------
    /// * If the trajectory is empty.
    pub fn t_min(&self) -> Instant {
        assert!(!self.empty(), "Empty trajectory");
        match self.first_time {
            Some(time) => time,
            None => unreachable!("a trajectory with segments has a first time"),
        }
    }

    /// Panics
    /// ----------
    /// * If the trajectory is empty.
    pub fn t_max(&self) -> Instant {
        match self.series.last() {
            Some(series) => series.t_max(),
            None => panic!("Empty trajectory"),
        }
    }

    pub fn step(&self) -> Second {
        self.step
    }

    /// Degree that will be tried first for the next segment.
    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn number_of_segments(&self) -> usize {
        self.series.len()
    }

    /// Time of the last sample appended, fitted or not.
    pub fn last_point_time(&self) -> Option<Instant> {
        self.last_points.last().map(|(time, _)| *time)
    }

    /// Add a sample.
    ///
    /// Arguments
    /// -----------------
    /// * `time`: Must be `step` after the previous sample, to 1 ULP.
    /// * `degrees_of_freedom`: Position and velocity at `time`.
    ///
    /// Panics
    /// ----------
    /// * If the samples are not equally spaced.
    /// * If no degree up to [`MAX_DEGREE`] meets the high tolerance.
    pub fn append(&mut self, time: Instant, degrees_of_freedom: DegreesOfFreedom) {
        if let Some((last_time, _)) = self.last_points.last() {
            let expected = (*last_time + self.step).seconds_since_j2000();
            assert!(
                ulp_distance(expected, time.seconds_since_j2000()) <= 1,
                "Append at times that are not equally spaced: expected {expected}, got {}",
                time.seconds_since_j2000()
            );
        }
        if self.first_time.is_none() {
            self.first_time = Some(time);
        }

        if self.last_points.len() == DIVISIONS {
            self.fit_block(time, degrees_of_freedom);
            self.last_points.clear();
        }
        self.last_points.push((time, degrees_of_freedom));
    }

    fn fit_block(&mut self, time: Instant, degrees_of_freedom: DegreesOfFreedom) {
        let (q, v): (Vec<Position>, Vec<Velocity>) = self
            .last_points
            .iter()
            .map(|(_, dof)| (dof.position, dof.velocity))
            .chain(std::iter::once((
                degrees_of_freedom.position,
                degrees_of_freedom.velocity,
            )))
            .unzip();
        let t_min = self.last_points[0].0;
        let fit = |degree| ChebyshevSeries::newhall_approximation(degree, &q, &v, t_min, time);

        let mut series = fit(self.degree);
        let mut error_estimate = series.last_coefficient().norm();

        // Increase the degree until the high tolerance is met.
        while error_estimate > self.high_tolerance {
            assert!(
                self.degree < MAX_DEGREE,
                "Unable to meet tolerance {} m between {t_min:?} and {time:?}: error estimate \
                 {error_estimate} m at degree {MAX_DEGREE}",
                self.high_tolerance
            );
            self.degree += 1;
            debug!(
                degree = self.degree,
                error_estimate, "increasing degree of continuous trajectory"
            );
            series = fit(self.degree);
            error_estimate = series.last_coefficient().norm();
        }

        // Decrease the degree while the fit is too good, without going above
        // the high tolerance.
        while error_estimate < self.low_tolerance && self.degree > MIN_DEGREE {
            let tentative_degree = self.degree - 1;
            let tentative_series = fit(tentative_degree);
            let tentative_error_estimate = tentative_series.last_coefficient().norm();
            if tentative_error_estimate > self.high_tolerance {
                break;
            }
            debug!(
                degree = tentative_degree,
                error_estimate = tentative_error_estimate,
                "decreasing degree of continuous trajectory"
            );
            self.degree = tentative_degree;
            error_estimate = tentative_error_estimate;
            series = tentative_series;
        }
        trace!(degree = self.degree, error_estimate, "fitted segment");

        self.series.push(series);
    }

    /// Index of the first segment whose `t_max` is not before `time`.
    fn find_series_for_instant(&self, time: Instant) -> usize {
        self.series.partition_point(|series| series.t_max() < time)
    }

    /// Drop the segments that end at or before `time`.
    ///
    /// If nothing remains the trajectory is reset to its freshly constructed
    /// state; otherwise `t_min()` becomes `time`. A `time` at or before
    /// `t_min()` leaves the trajectory unchanged.
    pub fn forget_before(&mut self, time: Instant) {
        if self.empty() || time <= self.t_min() {
            return;
        }
        let first_kept = self.series.partition_point(|series| series.t_max() <= time);
        self.series.drain(..first_kept);
        if self.series.is_empty() {
            *self = ContinuousTrajectory::new(self.step, self.low_tolerance, self.high_tolerance);
        } else {
            self.first_time = Some(time);
        }
    }

    fn may_use_hint(&self, time: Instant, hint: &mut Hint) -> bool {
        let index = hint.index;
        if index < self.series.len() && self.series[index].t_min() <= time {
            if time <= self.series[index].t_max() {
                return true;
            } else if index + 1 < self.series.len() && time <= self.series[index + 1].t_max() {
                hint.index += 1;
                return true;
            }
        }
        false
    }

    fn series_for(&self, time: Instant, hint: Option<&mut Hint>) -> &ChebyshevSeries<Position> {
        assert!(
            self.t_min() <= time && time <= self.t_max(),
            "Evaluation at {time:?} outside of [{:?}, {:?}]",
            self.t_min(),
            self.t_max()
        );
        match hint {
            Some(hint) => {
                if !self.may_use_hint(time, hint) {
                    hint.index = self.find_series_for_instant(time);
                }
                &self.series[hint.index]
            }
            None => &self.series[self.find_series_for_instant(time)],
        }
    }

    /// Panics
    /// ----------
    /// * If `time` is outside `[t_min(), t_max()]`.
    pub fn evaluate_position(&self, time: Instant, hint: Option<&mut Hint>) -> Position {
        self.series_for(time, hint).evaluate(time)
    }

    /// Panics
    /// ----------
    /// * If `time` is outside `[t_min(), t_max()]`.
    pub fn evaluate_velocity(&self, time: Instant, hint: Option<&mut Hint>) -> Velocity {
        self.series_for(time, hint).evaluate_derivative(time)
    }

    /// Panics
    /// ----------
    /// * If `time` is outside `[t_min(), t_max()]`.
    pub fn evaluate_degrees_of_freedom(
        &self,
        time: Instant,
        hint: Option<&mut Hint>,
    ) -> DegreesOfFreedom {
        let series = self.series_for(time, hint);
        DegreesOfFreedom::new(series.evaluate(time), series.evaluate_derivative(time))
    }

    pub fn write_to_message(&self) -> ContinuousTrajectoryMessage {
        ContinuousTrajectoryMessage {
            step: self.step,
            low_tolerance: self.low_tolerance,
            high_tolerance: self.high_tolerance,
            degree: self.degree,
            series: self.series.iter().map(ChebyshevSeries::write_to_message).collect(),
            first_time: self.first_time,
            last_points: self
                .last_points
                .iter()
                .map(|(time, dof)| InstantaneousDegreesOfFreedomMessage {
                    time: *time,
                    degrees_of_freedom: dof.into(),
                })
                .collect(),
        }
    }

    /// Rebuild a trajectory from its serialized form.
    ///
    /// Return
    /// ----------
    /// * [`GravisError::InconsistentMessage`] if the parameters are invalid,
    ///   the segments do not touch, or the pending samples are too many,
    ///   unequally spaced or detached from the last segment.
    /// * Any error of [`ChebyshevSeries::read_from_message`].
    pub fn read_from_message(message: &ContinuousTrajectoryMessage) -> Result<Self, GravisError> {
        let inconsistent = |reason: String| Err(GravisError::InconsistentMessage(reason));
        if !(message.step > 0.0
            && 0.0 < message.low_tolerance
            && message.low_tolerance < message.high_tolerance)
        {
            return inconsistent(format!(
                "invalid step {} or tolerances [{}, {}]",
                message.step, message.low_tolerance, message.high_tolerance
            ));
        }
        if !(MIN_DEGREE..=MAX_DEGREE).contains(&message.degree) {
            return inconsistent(format!("degree {} out of range", message.degree));
        }
        if message.last_points.len() > DIVISIONS {
            return inconsistent(format!(
                "{} pending samples, at most {DIVISIONS} expected",
                message.last_points.len()
            ));
        }

        let series = message
            .series
            .iter()
            .map(ChebyshevSeries::<Position>::read_from_message)
            .collect::<Result<Vec<_>, _>>()?;
        for (previous, next) in series.iter().tuple_windows() {
            if previous.t_max() != next.t_min() {
                return inconsistent(format!(
                    "segments do not touch: {:?} then {:?}",
                    previous.t_max(),
                    next.t_min()
                ));
            }
        }
        match (series.first(), message.first_time) {
            (Some(_), None) => return inconsistent("segments without a first time".into()),
            (Some(first), Some(first_time))
                if first_time < first.t_min() || first_time > first.t_max() =>
            {
                return inconsistent(format!(
                    "first time {first_time:?} outside of the first segment"
                ));
            }
            _ => {}
        }

        let last_points: Vec<(Instant, DegreesOfFreedom)> = message
            .last_points
            .iter()
            .map(|point| (point.time, (&point.degrees_of_freedom).into()))
            .collect();
        for ((previous, _), (next, _)) in last_points.iter().tuple_windows() {
            let expected = (*previous + message.step).seconds_since_j2000();
            if ulp_distance(expected, next.seconds_since_j2000()) > 1 {
                return inconsistent(format!(
                    "pending samples not spaced by {}: {previous:?} then {next:?}",
                    message.step
                ));
            }
        }
        if let Some(last) = series.last() {
            match last_points.first() {
                Some((first_pending, _)) if *first_pending == last.t_max() => {}
                Some((first_pending, _)) => {
                    return inconsistent(format!(
                        "first pending sample at {first_pending:?} does not start at the end \
                         of the last segment {:?}",
                        last.t_max()
                    ))
                }
                None => return inconsistent("segments without pending samples".into()),
            }
        }

        Ok(ContinuousTrajectory {
            step: message.step,
            low_tolerance: message.low_tolerance,
            high_tolerance: message.high_tolerance,
            degree: message.degree,
            series,
            first_time: message.first_time,
            last_points,
        })
    }
}

/// A sample of a trajectory, serialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstantaneousDegreesOfFreedomMessage {
    pub time: Instant,
    pub degrees_of_freedom: DegreesOfFreedomMessage,
}

/// Serialized form of a [`ContinuousTrajectory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousTrajectoryMessage {
    pub step: f64,
    pub low_tolerance: f64,
    pub high_tolerance: f64,
    pub degree: usize,
    pub series: Vec<ChebyshevSeriesMessage>,
    pub first_time: Option<Instant>,
    pub last_points: Vec<InstantaneousDegreesOfFreedomMessage>,
}
