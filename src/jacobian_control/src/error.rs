//! Error types for the controller.
//!
//! Only contract violations are errors. Everything the controller can observe
//! about the robot itself (joint limits, singularities, contacts, running out
//! of steps) is reported as an [`Outcome`](crate::Outcome) instead.

use thiserror::Error;

/// Errors that abort a controller run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("invalid part identifier {0:?}")]
    InvalidPartId(String),

    #[error("{what} has length {actual}, expected {expected} (degrees of freedom)")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("non-finite {0}")]
    NonFinite(&'static str),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("collision detector failed: {0}")]
    Detector(String),
}

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Check that a vector has one entry per joint.
pub(crate) fn check_dimension(
    what: &'static str,
    expected: usize,
    actual: usize,
) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ControlError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension("configuration", 3, 3).is_ok());
        assert_eq!(
            check_dimension("configuration", 3, 2),
            Err(ControlError::DimensionMismatch {
                what: "configuration",
                expected: 3,
                actual: 2,
            })
        );
    }

    #[test]
    fn test_error_messages() {
        let err = ControlError::NonFinite("jacobian");
        assert_eq!(err.to_string(), "non-finite jacobian");

        let err = ControlError::InvalidPartId("".to_string());
        assert_eq!(err.to_string(), "invalid part identifier \"\"");
    }
}
