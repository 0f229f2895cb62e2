use thiserror::Error;

/// Every failure the simulator can report.
///
/// Variants carry the step index or offending values so a batch caller can
/// tell what went wrong without re-running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid configuration for `{field}`: {reason}")]
    Configuration { field: String, reason: String },

    #[error("fuzzy set {index} has unordered or non-finite vertices {vertices:?}")]
    InvalidFuzzySet { index: usize, vertices: [f64; 6] },

    #[error("sliding surface diverged at step {step} (|s| = {surface:.3e})")]
    ControllerDivergence { step: usize, surface: f64 },

    #[error("non-finite {quantity} at step {step}: {value}")]
    NumericalInstability {
        step: usize,
        quantity: &'static str,
        value: f64,
    },

    #[error("wheel {wheel} at {speed:.3} rad/s exceeds the {limit:.3} rad/s limit at step {step}")]
    WheelSaturation {
        step: usize,
        wheel: usize,
        speed: f64,
        limit: f64,
    },

    #[error("metrics need at least 2 trace samples, got {len}")]
    InsufficientTrace { len: usize },

    #[error("run cancelled")]
    Cancelled,
}

impl SimError {
    /// Shorthand for a [`SimError::Configuration`].
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SimError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;

/// Fails with a configuration error unless `value` is finite and strictly positive.
pub fn require_positive(field: &str, value: f64) -> SimResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimError::configuration(
            field,
            format!("must be finite and > 0, got {value}"),
        ))
    }
}

/// Fails with a configuration error unless `value` is finite and not negative.
pub fn require_non_negative(field: &str, value: f64) -> SimResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimError::configuration(
            field,
            format!("must be finite and >= 0, got {value}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_positive_rejects_zero_and_nan() {
        assert!(require_positive("mass", 1.8).is_ok());
        assert!(matches!(
            require_positive("mass", 0.0),
            Err(SimError::Configuration { .. })
        ));
        assert!(require_positive("mass", f64::NAN).is_err());
        assert!(require_non_negative("tau", 0.0).is_ok());
        assert!(require_non_negative("tau", -1e-3).is_err());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = SimError::WheelSaturation {
            step: 12,
            wheel: 2,
            speed: 91.0,
            limit: 80.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("wheel 2"));
        assert!(msg.contains("step 12"));
    }
}
