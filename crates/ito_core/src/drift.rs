//! Expected instantaneous change of `f(x)` under an Itô diffusion.
//!
//! For `dx = μ dt + σ dZ` with σ an n × m loading matrix, Itô's lemma gives
//!
//! ```text
//! E[df/dt] = ∇f·μ + ½ Σ_j σ_jᵀ H σ_j
//! ```
//!
//! where σ_j is the j-th column of σ. The first term is one forward-mode
//! pass; each summand of the second is one Hessian-vector product. The
//! Hessian is never formed, so `f` is evaluated `1 + m` times regardless of n.

use crate::{
    derivatives::dot,
    error::DriftError,
    traits::{DifferentiableFunction, ItoDynamics},
};
use log::{debug, trace, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// How each `σ_jᵀ H σ_j` is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecondOrderMode {
    /// Hessian-vector product by forward-over-reverse, then a dot product.
    #[default]
    ForwardOverReverse,
    /// Second directional derivative from one nested-dual forward pass.
    NestedForward,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriftSettings {
    pub second_order: SecondOrderMode,
    /// Spread batched evaluations over the rayon pool.
    pub parallel: bool,
}

impl Default for DriftSettings {
    fn default() -> Self {
        Self {
            second_order: SecondOrderMode::ForwardOverReverse,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftDecomposition {
    pub expected_drift: f64,
    /// ∇f·μ
    pub first_order: f64,
    /// ½ trace(σᵀ H σ)
    pub second_order: f64,
    pub state_dimension: usize,
    pub shock_count: usize,
}

/// Both parts of `df = expected_drift dt + Σ_j shock_exposure[j] dZ_j`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItoDifferential {
    pub expected_drift: f64,
    pub shock_exposure: Vec<f64>,
}

/// Computes `E[df/dt]` at `state` for drift `μ = drift` and diffusion
/// `σ = diffusion` (n × m).
pub fn expected_drift<F>(
    f: &F,
    params: &F::Params,
    state: &[f64],
    drift: &[f64],
    diffusion: &DMatrix<f64>,
    settings: DriftSettings,
) -> Result<f64, DriftError>
where
    F: DifferentiableFunction + ?Sized,
{
    expected_drift_report(f, params, state, drift, diffusion, settings)
        .map(|report| report.expected_drift)
}

/// Same as [`expected_drift`], keeping the first- and second-order terms apart.
pub fn expected_drift_report<F>(
    f: &F,
    params: &F::Params,
    state: &[f64],
    drift: &[f64],
    diffusion: &DMatrix<f64>,
    settings: DriftSettings,
) -> Result<DriftDecomposition, DriftError>
where
    F: DifferentiableFunction + ?Sized,
{
    check_dimensions(state, drift, diffusion)?;
    let n = state.len();
    let m = diffusion.ncols();
    debug!(
        "expected drift: n = {}, m = {}, mode = {:?}",
        n, m, settings.second_order
    );

    let (_, first_order) = f.jvp(params, state, drift)?;

    let mut trace_sum = 0.0;
    let mut column = vec![0.0; n];
    for j in 0..m {
        for (dst, src) in column.iter_mut().zip(diffusion.column(j).iter()) {
            *dst = *src;
        }
        let curvature = match settings.second_order {
            SecondOrderMode::ForwardOverReverse => {
                let hv = f.hvp(params, state, &column)?;
                if hv.len() != n {
                    return Err(DriftError::mismatch(
                        "Hessian-vector product",
                        n,
                        hv.len(),
                    ));
                }
                dot(&hv, &column)
            }
            SecondOrderMode::NestedForward => {
                f.directional_curvature(params, state, &column)?
            }
        };
        trace!("shock {}: sigma_j^T H sigma_j = {}", j, curvature);
        trace_sum += curvature;
    }

    let second_order = 0.5 * trace_sum;
    let expected_drift = first_order + second_order;
    if !expected_drift.is_finite() {
        warn!(
            "expected drift is not finite (first order = {}, second order = {})",
            first_order, second_order
        );
    }

    Ok(DriftDecomposition {
        expected_drift,
        first_order,
        second_order,
        state_dimension: n,
        shock_count: m,
    })
}

/// Loadings `σᵀ∇f` of `df` on each shock, from a single reverse sweep.
pub fn shock_exposure<F>(
    f: &F,
    params: &F::Params,
    state: &[f64],
    diffusion: &DMatrix<f64>,
) -> Result<Vec<f64>, DriftError>
where
    F: DifferentiableFunction + ?Sized,
{
    if state.is_empty() {
        return Err(DriftError::EmptyState);
    }
    if diffusion.nrows() != state.len() {
        return Err(DriftError::mismatch(
            "Diffusion row",
            state.len(),
            diffusion.nrows(),
        ));
    }
    let (_, grad) = f.gradient(params, state)?;
    if grad.len() != state.len() {
        return Err(DriftError::mismatch("Gradient", state.len(), grad.len()));
    }
    let exposure = diffusion.tr_mul(&DVector::from_vec(grad));
    Ok(exposure.iter().copied().collect())
}

/// Evaluates `μ(x)` and `σ(x)` from `dynamics` and returns `E[df/dt]`.
pub fn expected_drift_at<F, D>(
    f: &F,
    params: &F::Params,
    dynamics: &D,
    state: &[f64],
    settings: DriftSettings,
) -> Result<f64, DriftError>
where
    F: DifferentiableFunction + ?Sized,
    D: ItoDynamics + ?Sized,
{
    let (drift, diffusion) = evaluate_dynamics(dynamics, state)?;
    expected_drift(f, params, state, drift.as_slice(), &diffusion, settings)
}

/// Full Itô differential of `f(x)` under `dynamics` at `state`.
pub fn ito_differential<F, D>(
    f: &F,
    params: &F::Params,
    dynamics: &D,
    state: &[f64],
    settings: DriftSettings,
) -> Result<ItoDifferential, DriftError>
where
    F: DifferentiableFunction + ?Sized,
    D: ItoDynamics + ?Sized,
{
    let (drift, diffusion) = evaluate_dynamics(dynamics, state)?;
    let report = expected_drift_report(f, params, state, drift.as_slice(), &diffusion, settings)?;
    let shock_exposure = shock_exposure(f, params, state, &diffusion)?;
    Ok(ItoDifferential {
        expected_drift: report.expected_drift,
        shock_exposure,
    })
}

fn evaluate_dynamics<D>(
    dynamics: &D,
    state: &[f64],
) -> Result<(DVector<f64>, DMatrix<f64>), DriftError>
where
    D: ItoDynamics + ?Sized,
{
    if state.is_empty() {
        return Err(DriftError::EmptyState);
    }
    let drift = dynamics.drift(state).map_err(DriftError::Dynamics)?;
    let diffusion = dynamics.diffusion(state).map_err(DriftError::Dynamics)?;
    let m = dynamics.shock_count();
    if diffusion.ncols() != m {
        return Err(DriftError::mismatch("Diffusion column", m, diffusion.ncols()));
    }
    Ok((drift, diffusion))
}

fn check_dimensions(
    state: &[f64],
    drift: &[f64],
    diffusion: &DMatrix<f64>,
) -> Result<(), DriftError> {
    let n = state.len();
    if n == 0 {
        return Err(DriftError::EmptyState);
    }
    if drift.len() != n {
        return Err(DriftError::mismatch("Drift", n, drift.len()));
    }
    if diffusion.nrows() != n {
        return Err(DriftError::mismatch("Diffusion row", n, diffusion.nrows()));
    }
    Ok(())
}
