use crate::traits::ItoDynamics;
use anyhow::{bail, Result};
use nalgebra::{DMatrix, DVector};

/// State-independent drift and diffusion.
#[derive(Debug, Clone)]
pub struct ConstantDynamics {
    drift: DVector<f64>,
    diffusion: DMatrix<f64>,
}

impl ConstantDynamics {
    pub fn new(drift: DVector<f64>, diffusion: DMatrix<f64>) -> Result<Self> {
        if drift.is_empty() {
            bail!("Drift must have positive dimension.");
        }
        if diffusion.nrows() != drift.len() {
            bail!(
                "Diffusion row count mismatch. Expected {}, got {}.",
                drift.len(),
                diffusion.nrows()
            );
        }
        Ok(Self { drift, diffusion })
    }

    pub fn dimension(&self) -> usize {
        self.drift.len()
    }

    fn check_state(&self, x: &[f64]) -> Result<()> {
        if x.len() != self.dimension() {
            bail!(
                "State dimension mismatch. Expected {}, got {}.",
                self.dimension(),
                x.len()
            );
        }
        Ok(())
    }
}

impl ItoDynamics for ConstantDynamics {
    fn shock_count(&self) -> usize {
        self.diffusion.ncols()
    }

    fn drift(&self, x: &[f64]) -> Result<DVector<f64>> {
        self.check_state(x)?;
        Ok(self.drift.clone())
    }

    fn diffusion(&self, x: &[f64]) -> Result<DMatrix<f64>> {
        self.check_state(x)?;
        Ok(self.diffusion.clone())
    }
}

/// Dynamics given by a pair of closures `x -> μ(x)` and `x -> σ(x)`.
/// The shock count is fixed at construction and enforced on every σ(x).
pub struct FnDynamics<M, S> {
    shock_count: usize,
    drift_fn: M,
    diffusion_fn: S,
}

impl<M, S> FnDynamics<M, S>
where
    M: Fn(&[f64]) -> DVector<f64> + Sync,
    S: Fn(&[f64]) -> DMatrix<f64> + Sync,
{
    pub fn new(shock_count: usize, drift_fn: M, diffusion_fn: S) -> Self {
        Self {
            shock_count,
            drift_fn,
            diffusion_fn,
        }
    }
}

impl<M, S> ItoDynamics for FnDynamics<M, S>
where
    M: Fn(&[f64]) -> DVector<f64> + Sync,
    S: Fn(&[f64]) -> DMatrix<f64> + Sync,
{
    fn shock_count(&self) -> usize {
        self.shock_count
    }

    fn drift(&self, x: &[f64]) -> Result<DVector<f64>> {
        let mu = (self.drift_fn)(x);
        if mu.len() != x.len() {
            bail!(
                "Drift dimension mismatch. Expected {}, got {}.",
                x.len(),
                mu.len()
            );
        }
        Ok(mu)
    }

    fn diffusion(&self, x: &[f64]) -> Result<DMatrix<f64>> {
        let sigma = (self.diffusion_fn)(x);
        if sigma.shape() != (x.len(), self.shock_count) {
            bail!(
                "Diffusion shape mismatch. Expected {}x{}, got {}x{}.",
                x.len(),
                self.shock_count,
                sigma.nrows(),
                sigma.ncols()
            );
        }
        Ok(sigma)
    }
}
