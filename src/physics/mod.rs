//! # Physics of the N-body problem
//!
//! - [`massive_body`]: bodies whose gravity acts on the others, with their
//!   optional J2 oblateness.
//! - [`gravity`]: pairwise Newtonian and zonal accelerations.
//! - [`continuous_trajectory`]: piecewise-Chebyshev compression of the
//!   trajectories of the massive bodies.
//! - [`trajectory`]: raw trajectories of massless bodies.
//! - [`ephemeris`]: the orchestrator integrating the massive bodies and
//!   flowing the massless ones in their field.
pub mod continuous_trajectory;
pub mod ephemeris;
pub mod gravity;
pub mod massive_body;
pub mod trajectory;
