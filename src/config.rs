//! # Declarative ephemeris configuration
//!
//! An [`EphemerisConfig`] names the fixed-step integrator, the step and the
//! fitting tolerances of an [`Ephemeris`](crate::physics::ephemeris::Ephemeris).
//! It is usually read from TOML:
//!
//! ```toml
//! integrator = "mclachlan_atela_1992_order_5_optimal"
//! step = 600.0
//! low_fitting_tolerance = 1.0
//! high_fitting_tolerance = 10.0
//! ```
//!
//! and validated into [`EphemerisParameters`] with
//! [`EphemerisConfig::to_parameters`]. Invalid values are reported as
//! [`GravisError::InvalidConfiguration`] rather than panicking.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    constants::{Meter, Second},
    gravis_errors::GravisError,
    integrators::symplectic_runge_kutta_nystrom::{
        leapfrog, mclachlan_atela_1992_order_4_optimal, mclachlan_atela_1992_order_5_optimal,
        position_verlet, SymplecticRungeKuttaNystromIntegrator,
    },
    physics::ephemeris::EphemerisParameters,
};

/// The symplectic integrators available to an ephemeris.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedStepIntegratorKind {
    Leapfrog,
    PositionVerlet,
    #[serde(rename = "mclachlan_atela_1992_order_4_optimal")]
    McLachlanAtela1992Order4Optimal,
    #[serde(rename = "mclachlan_atela_1992_order_5_optimal")]
    McLachlanAtela1992Order5Optimal,
}

impl FixedStepIntegratorKind {
    pub fn integrator(&self) -> SymplecticRungeKuttaNystromIntegrator {
        match self {
            FixedStepIntegratorKind::Leapfrog => leapfrog(),
            FixedStepIntegratorKind::PositionVerlet => position_verlet(),
            FixedStepIntegratorKind::McLachlanAtela1992Order4Optimal => {
                mclachlan_atela_1992_order_4_optimal()
            }
            FixedStepIntegratorKind::McLachlanAtela1992Order5Optimal => {
                mclachlan_atela_1992_order_5_optimal()
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FixedStepIntegratorKind::Leapfrog => "leapfrog",
            FixedStepIntegratorKind::PositionVerlet => "position_verlet",
            FixedStepIntegratorKind::McLachlanAtela1992Order4Optimal => {
                "mclachlan_atela_1992_order_4_optimal"
            }
            FixedStepIntegratorKind::McLachlanAtela1992Order5Optimal => {
                "mclachlan_atela_1992_order_5_optimal"
            }
        }
    }
}

impl fmt::Display for FixedStepIntegratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FixedStepIntegratorKind {
    type Err = GravisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "leapfrog" => Ok(FixedStepIntegratorKind::Leapfrog),
            "position_verlet" => Ok(FixedStepIntegratorKind::PositionVerlet),
            "mclachlan_atela_1992_order_4_optimal" => {
                Ok(FixedStepIntegratorKind::McLachlanAtela1992Order4Optimal)
            }
            "mclachlan_atela_1992_order_5_optimal" => {
                Ok(FixedStepIntegratorKind::McLachlanAtela1992Order5Optimal)
            }
            _ => Err(GravisError::InvalidConfiguration(format!(
                "Unknown fixed-step integrator: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EphemerisConfig {
    pub integrator: FixedStepIntegratorKind,
    /// Integration step, also the spacing of the fitted samples.
    pub step: Second,
    pub low_fitting_tolerance: Meter,
    pub high_fitting_tolerance: Meter,
}

impl Default for EphemerisConfig {
    fn default() -> Self {
        EphemerisConfig {
            integrator: FixedStepIntegratorKind::McLachlanAtela1992Order5Optimal,
            step: 600.0,
            low_fitting_tolerance: 1.0,
            high_fitting_tolerance: 10.0,
        }
    }
}

impl EphemerisConfig {
    /// Parse and validate a TOML document.
    ///
    /// Return
    /// ----------
    /// * [`GravisError::ConfigurationParse`] if the document is malformed.
    /// * [`GravisError::InvalidConfiguration`] if a value is out of range.
    pub fn from_toml_str(document: &str) -> Result<Self, GravisError> {
        let config: EphemerisConfig = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the step is positive and that `0 < low < high`.
    pub fn validate(&self) -> Result<(), GravisError> {
        if !(self.step > 0.0) || !self.step.is_finite() {
            return Err(GravisError::InvalidConfiguration(format!(
                "step must be positive and finite, got {}",
                self.step
            )));
        }
        if !(0.0 < self.low_fitting_tolerance
            && self.low_fitting_tolerance < self.high_fitting_tolerance
            && self.high_fitting_tolerance.is_finite())
        {
            return Err(GravisError::InvalidConfiguration(format!(
                "fitting tolerances must satisfy 0 < low < high, got low = {}, high = {}",
                self.low_fitting_tolerance, self.high_fitting_tolerance
            )));
        }
        Ok(())
    }

    pub fn to_parameters(&self) -> Result<EphemerisParameters, GravisError> {
        self.validate()?;
        Ok(EphemerisParameters::new(
            self.integrator.integrator(),
            self.step,
            self.low_fitting_tolerance,
            self.high_fitting_tolerance,
        ))
    }
}

#[cfg(test)]
mod config_test {
    use super::*;
    use crate::integrators::FixedStepSizeIntegrator;

    #[test]
    fn test_parse_toml() {
        let config = EphemerisConfig::from_toml_str(
            r#"
            integrator = "mclachlan_atela_1992_order_4_optimal"
            step = 300.0
            low_fitting_tolerance = 0.5
            high_fitting_tolerance = 5.0
            "#,
        )
        .unwrap();
        assert_eq!(
            config.integrator,
            FixedStepIntegratorKind::McLachlanAtela1992Order4Optimal
        );
        let parameters = config.to_parameters().unwrap();
        assert_eq!(parameters.step(), 300.0);
        assert_eq!(parameters.low_fitting_tolerance(), 0.5);
        assert_eq!(parameters.high_fitting_tolerance(), 5.0);
    }

    #[test]
    fn test_invalid_tolerances() {
        let err = EphemerisConfig::from_toml_str(
            r#"
            integrator = "leapfrog"
            step = 300.0
            low_fitting_tolerance = 5.0
            high_fitting_tolerance = 5.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, GravisError::InvalidConfiguration(_)));

        let config = EphemerisConfig {
            step: -1.0,
            ..EphemerisConfig::default()
        };
        assert!(matches!(
            config.to_parameters(),
            Err(GravisError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_malformed_toml() {
        let err = EphemerisConfig::from_toml_str("integrator = \"runge_kutta\"\nstep = 1.0")
            .unwrap_err();
        assert!(matches!(err, GravisError::ConfigurationParse(_)));
    }

    #[test]
    fn test_integrator_kinds() {
        for kind in [
            FixedStepIntegratorKind::Leapfrog,
            FixedStepIntegratorKind::PositionVerlet,
            FixedStepIntegratorKind::McLachlanAtela1992Order4Optimal,
            FixedStepIntegratorKind::McLachlanAtela1992Order5Optimal,
        ] {
            assert_eq!(kind.to_string().parse::<FixedStepIntegratorKind>().unwrap(), kind);
        }
        assert_eq!(FixedStepIntegratorKind::Leapfrog.integrator().order(), 2);
        assert_eq!(
            FixedStepIntegratorKind::McLachlanAtela1992Order5Optimal
                .integrator()
                .order(),
            5
        );
        assert!("rk4".parse::<FixedStepIntegratorKind>().is_err());
    }

    #[test]
    fn test_integrator_kind_serde_names() {
        for kind in [
            FixedStepIntegratorKind::Leapfrog,
            FixedStepIntegratorKind::PositionVerlet,
            FixedStepIntegratorKind::McLachlanAtela1992Order4Optimal,
            FixedStepIntegratorKind::McLachlanAtela1992Order5Optimal,
        ] {
            let config = EphemerisConfig {
                integrator: kind,
                ..EphemerisConfig::default()
            };
            let document = toml::to_string(&config).unwrap();
            assert!(document.contains(&format!("integrator = \"{kind}\"")), "{document}");
            assert_eq!(EphemerisConfig::from_toml_str(&document).unwrap(), config);
        }
    }

    #[test]
    fn test_documented_configuration() {
        let config = EphemerisConfig::from_toml_str(
            r#"
            integrator = "mclachlan_atela_1992_order_5_optimal"
            step = 600.0
            low_fitting_tolerance = 1.0
            high_fitting_tolerance = 10.0
            "#,
        )
        .unwrap();
        assert_eq!(config, EphemerisConfig::default());
    }
}
