//! Error taxonomy for the allocation engine.

use thiserror::Error;

/// Failures surfaced by the allocation engine.
///
/// An incomplete matching is not an error; it is reported through
/// [`SantaResult::unmatched`](super::SantaResult::unmatched).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SantaError {
    /// The instance is malformed (shape, negative values, no players).
    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    /// The solver configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No fractional solution reaches the threshold.
    #[error("threshold {threshold} is not achievable")]
    Infeasible { threshold: f64 },

    /// The LP backend could not produce a usable answer.
    #[error("LP solver unavailable: {0}")]
    SolverUnavailable(String),

    /// A time budget was exceeded.
    #[error("solver exceeded its time budget after {elapsed_ms} ms")]
    SolverTimeout { elapsed_ms: u64 },

    /// The search was cancelled before any positive threshold was confirmed.
    #[error("cancelled before a feasible threshold was found")]
    Cancelled,
}
