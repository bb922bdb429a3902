use thiserror::Error;

use crate::qp::SolverStatus;

/// Errors reported by the builder, the solver and the controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MpcError {
    /// Cost, constraint, reference or system dimensions disagree.
    #[error("dimension mismatch in {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Elapsed time is non-positive or not a whole number of sample periods.
    #[error("invalid interval: {elapsed} s is not a positive multiple of the {sample_period} s sample period")]
    InvalidInterval { elapsed: f64, sample_period: f64 },

    /// The QP solve finished without an optimal solution.
    #[error("QP solver failed: {0:?}")]
    SolverFailure(SolverStatus),

    #[error("cost weights must be configured before the first control step")]
    MissingCost,

    #[error("lower bound exceeds upper bound at constraint row {index}")]
    InvalidBounds { index: usize },

    #[error("singular matrix: {0}")]
    Singular(&'static str),
}

impl MpcError {
    pub(crate) fn dim(what: &'static str, expected: usize, got: usize) -> Self {
        MpcError::DimensionMismatch {
            what,
            expected,
            got,
        }
    }
}

/// Fail with [`MpcError::DimensionMismatch`] unless `got == expected`.
pub(crate) fn check_dim(what: &'static str, expected: usize, got: usize) -> Result<(), MpcError> {
    if expected == got {
        Ok(())
    } else {
        Err(MpcError::dim(what, expected, got))
    }
}
