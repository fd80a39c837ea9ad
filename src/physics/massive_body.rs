//! Massive bodies and their oblateness.
//!
//! A [`MassiveBody`] is immutable: a gravitational parameter and, for oblate
//! bodies, the [`Oblateness`] used to compute the J2 zonal perturbation.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{GravitationalParameter, Meter},
    gravis_errors::GravisError,
};

/// Second zonal harmonic of a body rotating about `axis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oblateness {
    axis: Vector3<f64>,
    j2: f64,
    reference_radius: Meter,
}

impl Oblateness {
    /// Arguments
    /// -----------------
    /// * `axis`: Rotation axis, normalized here.
    /// * `j2`: Dimensionless second zonal coefficient.
    /// * `reference_radius`: Radius the coefficient is normalized with.
    ///
    /// Return
    /// ----------
    /// * [`GravisError::InvalidArgument`] on a null axis or a non-positive radius.
    pub fn new(axis: Vector3<f64>, j2: f64, reference_radius: Meter) -> Result<Self, GravisError> {
        let norm = axis.norm();
        if !(norm > 0.0) || !norm.is_finite() {
            return Err(GravisError::InvalidArgument(format!(
                "Oblateness axis must be a nonzero finite vector, got {axis:?}"
            )));
        }
        if !(reference_radius > 0.0) {
            return Err(GravisError::InvalidArgument(format!(
                "Reference radius must be positive, got {reference_radius}"
            )));
        }
        Ok(Oblateness {
            axis: axis / norm,
            j2,
            reference_radius,
        })
    }

    pub fn axis(&self) -> Vector3<f64> {
        self.axis
    }

    pub fn j2(&self) -> f64 {
        self.j2
    }

    pub fn reference_radius(&self) -> Meter {
        self.reference_radius
    }
}

/// A body whose gravity acts on the others.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassiveBody {
    gravitational_parameter: GravitationalParameter,
    oblateness: Option<Oblateness>,
}

impl MassiveBody {
    /// A spherically symmetric body. A null gravitational parameter makes a
    /// test particle that is integrated along with the massive bodies.
    ///
    /// Panics
    /// ----------
    /// * If `gravitational_parameter` is negative or not finite.
    pub fn new(gravitational_parameter: GravitationalParameter) -> Self {
        assert!(
            gravitational_parameter >= 0.0 && gravitational_parameter.is_finite(),
            "Gravitational parameter must be non-negative, got {gravitational_parameter}"
        );
        MassiveBody {
            gravitational_parameter,
            oblateness: None,
        }
    }

    /// An oblate body.
    pub fn oblate(gravitational_parameter: GravitationalParameter, oblateness: Oblateness) -> Self {
        MassiveBody {
            oblateness: Some(oblateness),
            ..MassiveBody::new(gravitational_parameter)
        }
    }

    pub fn gravitational_parameter(&self) -> GravitationalParameter {
        self.gravitational_parameter
    }

    pub fn oblateness(&self) -> Option<&Oblateness> {
        self.oblateness.as_ref()
    }

    pub fn is_oblate(&self) -> bool {
        self.oblateness.is_some()
    }

    /// `J2 · μ · R²`, the coefficient of the zonal acceleration, zero for a
    /// spherical body.
    pub fn zonal_coefficient(&self) -> f64 {
        self.oblateness.map_or(0.0, |o| {
            o.j2 * self.gravitational_parameter * o.reference_radius * o.reference_radius
        })
    }
}

/// Serialized form of a [`MassiveBody`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassiveBodyMessage {
    pub gravitational_parameter: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oblateness: Option<OblatenessMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OblatenessMessage {
    pub axis: [f64; 3],
    pub j2: f64,
    pub reference_radius: f64,
}

impl MassiveBody {
    pub fn write_to_message(&self) -> MassiveBodyMessage {
        MassiveBodyMessage {
            gravitational_parameter: self.gravitational_parameter,
            oblateness: self.oblateness.map(|o| OblatenessMessage {
                axis: o.axis.into(),
                j2: o.j2,
                reference_radius: o.reference_radius,
            }),
        }
    }

    pub fn read_from_message(message: &MassiveBodyMessage) -> Result<Self, GravisError> {
        let mu = message.gravitational_parameter;
        if !(mu >= 0.0 && mu.is_finite()) {
            return Err(GravisError::InvalidArgument(format!(
                "Gravitational parameter must be non-negative, got {}",
                message.gravitational_parameter
            )));
        }
        match &message.oblateness {
            None => Ok(MassiveBody::new(message.gravitational_parameter)),
            Some(o) => Ok(MassiveBody::oblate(
                message.gravitational_parameter,
                Oblateness::new(Vector3::from(o.axis), o.j2, o.reference_radius)?,
            )),
        }
    }
}
