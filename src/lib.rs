//! # gravis
//!
//! Numerical core of an N-body gravitational simulator: symplectic and
//! embedded Runge–Kutta–Nyström integrators, piecewise-Chebyshev continuous
//! trajectories, and an [`Ephemeris`](physics::ephemeris::Ephemeris) that
//! integrates massive bodies (with J2 oblateness) and flows massless ones in
//! their field.
//!
//! ## Typical usage
//!
//! ```rust, no_run
//! use gravis::config::EphemerisConfig;
//! use gravis::geometry::DegreesOfFreedom;
//! use gravis::physics::{ephemeris::{BodyId, Ephemeris}, massive_body::MassiveBody};
//! use gravis::time::Instant;
//! use nalgebra::Vector3;
//!
//! let parameters = EphemerisConfig::default().to_parameters().unwrap();
//! let mut ephemeris = Ephemeris::new(
//!     vec![MassiveBody::new(3.986004418e14), MassiveBody::new(4.9028e12)],
//!     vec![
//!         DegreesOfFreedom::default(),
//!         DegreesOfFreedom::new(Vector3::new(3.844e8, 0.0, 0.0), Vector3::new(0.0, 1.022e3, 0.0)),
//!     ],
//!     Instant::J2000,
//!     parameters,
//! );
//! let t = Instant::from_days_since_j2000(1.0);
//! ephemeris.prolong(t);
//! let moon = ephemeris.trajectory(BodyId::new(1)).evaluate_position(t, None);
//! ```
pub mod config;
pub mod constants;
pub mod geometry;
pub mod gravis_errors;
pub mod integrators;
pub mod numerics;
pub mod physics;
pub mod time;
