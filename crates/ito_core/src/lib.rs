//! The `ito_core` crate computes the expected instantaneous change `E[df/dt]`
//! of a scalar function of a diffusing state, via Itô's lemma, using only
//! directional derivatives of the function.
//!
//! Key components:
//! - **Traits**: `Scalar` (numeric type abstraction), `DifferentiableFunction`
//!   (evaluate / JVP / gradient / HVP capabilities), `ItoDynamics` (μ(x), σ(x)).
//! - **Autodiff**: nestable `Dual` numbers for forward mode and a borrowed
//!   `Tape` for reverse mode; recording duals on a tape gives Hessian-vector
//!   products.
//! - **Drift**: the operator itself, costing `1 + m` passes over `f` for m
//!   shocks independently of the state dimension.
//! - **Batch**: rayon-parallel evaluation over independent states.

pub mod autodiff;
pub mod batch;
pub mod derivatives;
pub mod drift;
pub mod dynamics;
pub mod error;
pub mod reverse;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use autodiff::Dual;
pub use batch::{expected_drift_batch, try_expected_drift_batch};
pub use drift::{
    expected_drift, expected_drift_at, expected_drift_report, ito_differential, shock_exposure,
    DriftDecomposition, DriftSettings, ItoDifferential, SecondOrderMode,
};
pub use dynamics::{ConstantDynamics, FnDynamics};
pub use error::DriftError;
pub use reverse::{Tape, Var};
pub use traits::{DifferentiableFunction, ItoDynamics, Scalar};
