//! Error types for the fatal failure classes of an optimisation run.
//!
//! Everything fallible in this crate returns [`anyhow::Result`]. The errors defined here are the
//! root causes callers may want to tell apart, which they can do with
//! [`anyhow::Error::downcast_ref`].
use std::error::Error;
use std::fmt;

/// The configuration for a run is invalid. Raised before any solve is attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationError {
    message: String,
}

impl ConfigurationError {
    /// Create a new [`ConfigurationError`]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid configuration: {}", self.message)
    }
}

impl Error for ConfigurationError {}

/// The solver did not return a usable solution
#[derive(Debug, Clone, PartialEq)]
pub struct SolveError {
    status: String,
}

impl SolveError {
    /// Create a new [`SolveError`] from the solver's reported status
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }

    /// The status reported by the solver
    pub fn status(&self) -> &str {
        &self.status
    }
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Could not solve: {}", self.status)
    }
}

impl Error for SolveError {}

/// Return early with a [`ConfigurationError`] built from a format string
macro_rules! config_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::ConfigurationError::new(format!($($arg)*)).into())
    };
}
pub(crate) use config_bail;

/// Return early with a [`ConfigurationError`] if the condition does not hold
macro_rules! config_ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::error::config_bail!($($arg)*);
        }
    };
}
pub(crate) use config_ensure;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn check_positive(value: f64) -> Result<()> {
        config_ensure!(value > 0.0, "value must be positive, got {value}");
        Ok(())
    }

    #[test]
    fn test_config_ensure() {
        assert!(check_positive(1.0).is_ok());
        let err = check_positive(-1.0).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigurationError>(),
            Some(&ConfigurationError::new("value must be positive, got -1"))
        );
        assert_eq!(
            err.to_string(),
            "Invalid configuration: value must be positive, got -1"
        );
    }

    #[test]
    fn test_solve_error_display() {
        let err = SolveError::new("Infeasible");
        assert_eq!(err.status(), "Infeasible");
        assert_eq!(err.to_string(), "Could not solve: Infeasible");
    }
}
