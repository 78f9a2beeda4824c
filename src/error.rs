//! Error types for the circuit solver.
//!
//! This module provides a unified error type [`CircuitError`] covering the
//! error kinds a linear-circuit phasor analysis can raise: malformed
//! component composition, characteristics evaluated outside their domain,
//! and solver non-convergence.

use thiserror::Error;

/// Result type alias using [`CircuitError`].
pub type Result<T> = std::result::Result<T, CircuitError>;

/// Unified error type for all phasorsolve operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CircuitError {
    /// Inconsistent or illegal component/branch configuration: a loop of
    /// voltage sources that contradicts itself, two singular sources in
    /// one composite, applying current to a fixed-current composite,
    /// applying voltage to a fixed-voltage composite, or combining
    /// characteristics that violate the singular rules of the component
    /// algebra.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A characteristic was evaluated at an angular frequency for which it
    /// is undefined, e.g. an ideal capacitor with zero capacitance.
    #[error("domain error: {0}")]
    Domain(String),

    /// The optimization loop exhausted `MAX_EPOCHS` without reaching the
    /// convergence tolerance. Unlike the other variants this is a soft
    /// condition: `CircuitSolver::solve` does not return it directly, it
    /// only surfaces through `SolveReport::converged`. It exists so a
    /// caller that wants non-convergence to be a hard error has something
    /// to `?`-propagate.
    #[error("circuit solver did not converge after {iterations} iterations (final loss {final_loss:.3e})")]
    NotConverged { iterations: usize, final_loss: f64 },
}

impl CircuitError {
    /// Build a [`CircuitError::Configuration`] from any displayable message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Build a [`CircuitError::Domain`] from any displayable message.
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }
}
