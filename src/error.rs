//! Error and status types for rope setup and stepping.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by rope construction and structural edits.
///
/// Stepping never returns an error; numerical trouble during a step is
/// reported through [`RopeStatus`] instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RopeError {
    #[error("a rope needs at least one node")]
    EmptyRope,

    #[error("got {positions} positions but {masses} masses")]
    MassCountMismatch { positions: usize, masses: usize },

    #[error("node index {index} out of bounds (count: {count})")]
    NodeOutOfBounds { index: usize, count: usize },

    #[error("link index {index} out of bounds (count: {count})")]
    LinkOutOfBounds { index: usize, count: usize },

    #[error("anchor index {index} out of bounds (count: {count})")]
    AnchorOutOfBounds { index: usize, count: usize },

    #[error("mass must be finite and non-negative, got {0}")]
    InvalidMass(f64),

    #[error("total mass must be finite and positive, got {0}")]
    InvalidTotalMass(f64),

    #[error("rest length must be finite and non-negative, got {0}")]
    InvalidRestLength(f64),

    #[error("{0} must be finite")]
    NonFinite(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Numerical health of the most recent step. Reset to `Valid` when a step
/// starts; the host polls it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum RopeStatus {
    #[default]
    Valid = 0,
    /// A supplied external force had a NaN or infinite component; that
    /// node's contribution was dropped for the step.
    InternalForcesError = 1,
}

impl RopeStatus {
    pub fn is_valid(self) -> bool {
        self == RopeStatus::Valid
    }
}
