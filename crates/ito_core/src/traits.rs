use crate::derivatives;
use anyhow::Result;
use nalgebra::{DMatrix, DVector};
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can flow through a differentiable function.
/// Implemented by `f64`, forward-mode `Dual` numbers (nested or not) and
/// reverse-mode tape variables.
pub trait Scalar: Float + FromPrimitive + Debug {
    /// Lifts an `f64` constant into this scalar type. Constants carry no
    /// derivative information.
    fn lift(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }
}

impl<T: Float + FromPrimitive + Debug> Scalar for T {}

/// A scalar-valued function `f(params, x)` of an n-dimensional state.
///
/// Implementors only write `evaluate`, generically over the scalar type; the
/// derivative capabilities (`jvp`, `gradient`, `hvp`) are derived from it
/// with the crate's automatic differentiation. A provider that already has
/// its own differentiation machinery may override any of them.
pub trait DifferentiableFunction {
    /// Parameters held fixed while differentiating with respect to `x`.
    type Params: ?Sized;

    /// Evaluates the function. Errors (e.g. `x` outside the domain) are
    /// propagated unchanged by every caller in this crate.
    fn evaluate<T: Scalar>(&self, params: &Self::Params, x: &[T]) -> Result<T>;

    fn value(&self, params: &Self::Params, x: &[f64]) -> Result<f64> {
        self.evaluate(params, x)
    }

    /// Returns `(f(x), ∇f(x)·direction)` from a single forward pass.
    fn jvp(&self, params: &Self::Params, x: &[f64], direction: &[f64]) -> Result<(f64, f64)> {
        derivatives::jvp(self, params, x, direction)
    }

    /// Returns `(f(x), ∇f(x))` from one reverse sweep.
    fn gradient(&self, params: &Self::Params, x: &[f64]) -> Result<(f64, Vec<f64>)> {
        derivatives::gradient(self, params, x)
    }

    /// Returns `H(x)·direction` without forming `H`.
    fn hvp(&self, params: &Self::Params, x: &[f64], direction: &[f64]) -> Result<Vec<f64>> {
        derivatives::hvp(self, params, x, direction)
    }

    /// Returns `directionᵀ·H(x)·direction` from a single second-order forward pass.
    fn directional_curvature(
        &self,
        params: &Self::Params,
        x: &[f64],
        direction: &[f64],
    ) -> Result<f64> {
        derivatives::directional_curvature(self, params, x, direction)
    }
}

/// State-dependent Itô dynamics `dx = μ(x) dt + σ(x) dZ`, with `σ(x)` an
/// n × m matrix loading m independent Brownian shocks onto the state.
pub trait ItoDynamics: Sync {
    /// Number of shock sources m. Fixed for a given dynamics.
    fn shock_count(&self) -> usize;

    /// Evaluates the drift vector μ(x).
    fn drift(&self, x: &[f64]) -> Result<DVector<f64>>;

    /// Evaluates the diffusion matrix σ(x) (n rows, m columns).
    fn diffusion(&self, x: &[f64]) -> Result<DMatrix<f64>>;
}
