//! Compensated (Kahan–Møller) summation.
//!
//! A [`DoublePrecision`] carries a value together with the rounding error
//! accumulated while incrementing it. Used for the integrator clocks and for
//! the integrated positions and velocities, where millions of small
//! increments would otherwise drift.
use std::ops::{Add, Sub};

/// Anything we can accumulate with error compensation: `f64` and vectors of
/// `f64` alike.
pub trait Compensable: Copy + Default + Add<Output = Self> + Sub<Output = Self> {}

impl<T> Compensable for T where T: Copy + Default + Add<Output = T> + Sub<Output = T> {}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DoublePrecision<T> {
    pub value: T,
    pub error: T,
}

impl<T: Compensable> DoublePrecision<T> {
    pub fn new(value: T) -> Self {
        DoublePrecision {
            value,
            error: T::default(),
        }
    }

    /// Add `increment` to the value, folding the rounding error of the
    /// addition into `error`.
    pub fn increment(&mut self, increment: T) {
        let temp = self.value;
        let y = self.error + increment;
        self.value = temp + y;
        self.error = (temp - self.value) + y;
    }
}

impl<T: Compensable> From<T> for DoublePrecision<T> {
    fn from(value: T) -> Self {
        DoublePrecision::new(value)
    }
}

#[cfg(test)]
mod double_precision_test {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_compensated_sum_beats_naive_sum() {
        let increment: f64 = 0.1;
        let mut naive: f64 = 1e6;
        let mut compensated = DoublePrecision::new(1e6);
        for _ in 0..1_000_000 {
            naive += increment;
            compensated.increment(increment);
        }
        let expected: f64 = 1e6 + 1e5;
        let naive_error = (naive - expected).abs();
        let compensated_error = (compensated.value - expected).abs();
        assert!(compensated_error < naive_error);
        assert!(compensated_error <= 1e-9);
    }

    #[test]
    fn test_vector_increment() {
        let mut q = DoublePrecision::new(Vector3::new(1.0, 2.0, 3.0));
        q.increment(Vector3::new(0.5, -1.0, 0.0));
        assert_eq!(q.value, Vector3::new(1.5, 1.0, 3.0));
        assert_eq!(q.error, Vector3::zeros());
    }
}
