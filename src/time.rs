//! Time points used by the integrators and trajectories.
//!
//! An [`Instant`] is a count of TDB seconds since J2000, stored as an `f64`.
//! It is the time type of every trajectory in the crate; the integrators work
//! on the raw seconds and accumulate them with compensated summation (see
//! [`DoublePrecision`](crate::numerics::double_precision::DoublePrecision)).
//!
//! Conversions to and from [`hifitime::Epoch`] go through the ephemeris-time
//! seconds of `hifitime`, which are also TDB seconds past J2000.
use std::{
    fmt,
    ops::{Add, AddAssign, Sub},
};

use hifitime::Epoch;
use serde::{Deserialize, Serialize};

use crate::constants::{Second, SECONDS_PER_DAY};

/// A point in time, in TDB seconds since J2000.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Instant(Second);

impl Instant {
    /// The J2000 reference epoch itself.
    pub const J2000: Instant = Instant(0.0);

    pub const fn from_seconds_since_j2000(seconds: Second) -> Self {
        Instant(seconds)
    }

    pub fn from_days_since_j2000(days: f64) -> Self {
        Instant(days * SECONDS_PER_DAY)
    }

    pub const fn seconds_since_j2000(&self) -> Second {
        self.0
    }

    /// Convert a `hifitime` epoch (any time scale) into an [`Instant`].
    pub fn from_epoch(epoch: Epoch) -> Self {
        Instant(epoch.to_et_seconds())
    }

    /// Convert back into a `hifitime` epoch, expressed in the ET time scale.
    pub fn to_epoch(&self) -> Epoch {
        Epoch::from_et_seconds(self.0)
    }
}

impl From<Epoch> for Instant {
    fn from(epoch: Epoch) -> Self {
        Instant::from_epoch(epoch)
    }
}

impl Add<Second> for Instant {
    type Output = Instant;

    fn add(self, rhs: Second) -> Instant {
        Instant(self.0 + rhs)
    }
}

impl AddAssign<Second> for Instant {
    fn add_assign(&mut self, rhs: Second) {
        self.0 += rhs;
    }
}

impl Sub<Second> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Second) -> Instant {
        Instant(self.0 - rhs)
    }
}

impl Sub<Instant> for Instant {
    type Output = Second;

    fn sub(self, rhs: Instant) -> Second {
        self.0 - rhs.0
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_epoch())
    }
}

/// Number of units in the last place separating two doubles.
///
/// Both values must have the same sign; this is always the case for the
/// instants we compare (consecutive sample times).
pub fn ulp_distance(a: f64, b: f64) -> u64 {
    if a == b {
        return 0;
    }
    let to_ordered = |x: f64| -> i64 {
        let bits = x.to_bits() as i64;
        if bits < 0 {
            i64::MIN - bits
        } else {
            bits
        }
    };
    to_ordered(a).abs_diff(to_ordered(b))
}
