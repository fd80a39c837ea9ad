//! # Constants and type definitions for gravis
//!
//! This module centralizes the **physical constants**, **fitting constants**, and
//! **type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Unit conversions (days ↔ seconds)
//! - Degree bounds and block size of the continuous-trajectory fitter
//! - Scalar and vector type aliases for the SI quantities we manipulate
//!
//! All quantities are SI: metres, seconds, m³/s² for gravitational parameters.

use nalgebra::Vector3;

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for orbital periods and angles
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

// -------------------------------------------------------------------------------------------------
// Continuous trajectory fitting
// -------------------------------------------------------------------------------------------------

/// Lowest polynomial degree used when fitting a segment
pub const MIN_DEGREE: usize = 3;

/// Highest polynomial degree used when fitting a segment
pub const MAX_DEGREE: usize = 17;

/// Number of intervals per fitted segment; a segment is built from
/// `DIVISIONS + 1` equally spaced samples.
pub const DIVISIONS: usize = 8;

/// Maximal excursion of the rescaled Chebyshev variable outside of `[-1, 1]`
/// tolerated by evaluation; anything beyond is a caller bug, not round-off.
pub const CHEBYSHEV_DOMAIN_SLACK: f64 = 1.1;

/// Weight of the velocity residuals (in the rescaled variable) relative to
/// the position residuals in the Newhall fit.
pub const NEWHALL_VELOCITY_WEIGHT: f64 = 0.4;

// -------------------------------------------------------------------------------------------------
// Adaptive flow of massless bodies
// -------------------------------------------------------------------------------------------------

/// Factor applied to the optimal step estimate of the adaptive integrator
pub const ADAPTIVE_SAFETY_FACTOR: f64 = 0.9;

/// Largest growth of the step after an accepted adaptive step
pub const ADAPTIVE_MAX_STEP_GROWTH: f64 = 5.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Duration in seconds
pub type Second = f64;
/// Length in metres
pub type Meter = f64;
/// Speed in metres per second
pub type MeterPerSecond = f64;
/// Gravitational parameter in m³/s²
pub type GravitationalParameter = f64;

/// Displacement from the frame origin, in metres
pub type Position = Vector3<f64>;
/// Velocity in m/s
pub type Velocity = Vector3<f64>;
/// Acceleration in m/s²
pub type Acceleration = Vector3<f64>;
