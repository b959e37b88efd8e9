//! Error types for reward evaluation.

use thiserror::Error;

/// Errors that can occur while validating state or configuration.
///
/// Two families share this enum: snapshot validation failures, raised per
/// step before any term is evaluated, and configuration failures, raised
/// once when an evaluator is constructed. Numeric edge cases inside term
/// formulas (zero timestep, zero tracking sigma) are epsilon-guarded and
/// never raise; out-of-range raw values are silently clipped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RewardError {
    /// A snapshot field contains `NaN` or `Inf`.
    #[error("non-finite value in {field}")]
    NonFiniteInput {
        /// The offending snapshot field.
        field: &'static str,
    },

    /// A snapshot vector does not match the morphology layout.
    #[error("{field} has wrong length: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The offending snapshot field.
        field: &'static str,
        /// Length required by the layout.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// Base orientation quaternion is not unit length within tolerance.
    #[error("quaternion norm {norm} deviates from 1 beyond tolerance")]
    NonUnitQuaternion {
        /// Norm of the rejected quaternion.
        norm: f64,
    },

    /// Control timestep is negative or non-finite.
    #[error("invalid timestep: {0} (must be non-negative and finite)")]
    InvalidTimestep(f64),

    /// A snapshot body id has no entry in the velocity array.
    #[error("invalid body id: {0}")]
    InvalidBodyId(u64),

    /// A configured scale key names no catalog term.
    #[error("unknown reward term key: {key}")]
    UnknownTerm {
        /// The unrecognized key.
        key: String,
    },

    /// A configured scale is `NaN` or `Inf`.
    #[error("scale for {key} is not finite: {value}")]
    NonFiniteScale {
        /// Term the scale was configured for.
        key: String,
        /// The rejected value.
        value: f64,
    },

    /// Tracking sigma is zero, negative, or non-finite.
    #[error("invalid tracking sigma: {0} (must be strictly positive and finite)")]
    InvalidTrackingSigma(f64),

    /// Term parameters are inconsistent with the layout or non-finite.
    #[error("invalid term parameters: {reason}")]
    InvalidParams {
        /// Description of what's wrong.
        reason: String,
    },
}

impl RewardError {
    /// Create a non-finite input error for a snapshot field.
    #[must_use]
    pub fn non_finite(field: &'static str) -> Self {
        Self::NonFiniteInput { field }
    }

    /// Create an invalid term parameters error.
    #[must_use]
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            reason: reason.into(),
        }
    }

    /// Check if this error came from snapshot validation.
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::NonFiniteInput { .. }
                | Self::DimensionMismatch { .. }
                | Self::NonUnitQuaternion { .. }
                | Self::InvalidTimestep(_)
                | Self::InvalidBodyId(_)
        )
    }

    /// Check if this error came from configuration validation.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        !self.is_state_error()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RewardError::non_finite("base_twist.linear");
        assert!(err.to_string().contains("base_twist.linear"));

        let err = RewardError::DimensionMismatch {
            field: "joints.angles",
            expected: 12,
            actual: 4,
        };
        assert!(err.to_string().contains("12"));
        assert!(err.to_string().contains("4"));

        let err = RewardError::UnknownTerm {
            key: "wheel_slip".to_string(),
        };
        assert!(err.to_string().contains("wheel_slip"));
    }

    #[test]
    fn test_error_families() {
        let err = RewardError::NonUnitQuaternion { norm: 0.5 };
        assert!(err.is_state_error());
        assert!(!err.is_config_error());

        let err = RewardError::InvalidTrackingSigma(-0.25);
        assert!(err.is_config_error());
        assert!(!err.is_state_error());

        let err = RewardError::invalid_params("default pose is shorter than the layout");
        assert!(err.is_config_error());
    }
}
