use thiserror::Error;

/// Failures of the drift operator.
#[derive(Debug, Error)]
pub enum DriftError {
    /// A drift, diffusion or derivative shape disagrees with the state dimension.
    #[error("{quantity} dimension mismatch. Expected {expected}, got {found}.")]
    DimensionMismatch {
        quantity: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("State must have positive dimension.")]
    EmptyState,

    /// Raised by the differentiable function itself; passed through untouched.
    #[error(transparent)]
    Evaluation(#[from] anyhow::Error),

    #[error("Failed to evaluate dynamics: {0}")]
    Dynamics(#[source] anyhow::Error),
}

impl DriftError {
    pub(crate) fn mismatch(quantity: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            quantity,
            expected,
            found,
        }
    }
}
