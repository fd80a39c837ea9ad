use thiserror::Error;

#[derive(Error, Debug)]
pub enum GravisError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialized element kind mismatch: expected {expected}, found {found}")]
    SerializationMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Inconsistent serialized trajectory: {0}")]
    InconsistentMessage(String),

    #[error("Invalid ephemeris configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unable to parse the ephemeris configuration: {0}")]
    ConfigurationParse(#[from] toml::de::Error),
}

impl PartialEq for GravisError {
    fn eq(&self, other: &Self) -> bool {
        use GravisError::*;
        match (self, other) {
            (InvalidArgument(a), InvalidArgument(b)) => a == b,
            (
                SerializationMismatch {
                    expected: e1,
                    found: f1,
                },
                SerializationMismatch {
                    expected: e2,
                    found: f2,
                },
            ) => e1 == e2 && f1 == f2,
            (InconsistentMessage(a), InconsistentMessage(b)) => a == b,
            (InvalidConfiguration(a), InvalidConfiguration(b)) => a == b,

            // Parser errors are not comparable: same variant is enough
            (ConfigurationParse(_), ConfigurationParse(_)) => true,

            _ => false,
        }
    }
}
