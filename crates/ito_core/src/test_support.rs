//! Closed-form functions and instrumentation shared by the unit tests.

use crate::traits::{DifferentiableFunction, Scalar};
use anyhow::{bail, Result};
use std::fmt::{Debug, Display};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

pub fn assert_err_contains<T: Debug, E: Display>(result: Result<T, E>, needle: &str) {
    let err = match result {
        Ok(value) => panic!("expected error, got {value:?}"),
        Err(err) => err,
    };
    let message = format!("{err}");
    assert!(
        message.contains(needle),
        "expected error to contain \"{needle}\", got \"{message}\""
    );
}

/// f(x) = Σ x_i
pub struct SumFunction;

impl DifferentiableFunction for SumFunction {
    type Params = ();

    fn evaluate<T: Scalar>(&self, _params: &(), x: &[T]) -> Result<T> {
        Ok(x.iter().fold(T::zero(), |acc, &v| acc + v))
    }
}

/// f(x) = ½ Σ x_i², so ∇f = x and H = I.
pub struct HalfSquaredNorm;

impl DifferentiableFunction for HalfSquaredNorm {
    type Params = ();

    fn evaluate<T: Scalar>(&self, _params: &(), x: &[T]) -> Result<T> {
        let sum = x.iter().fold(T::zero(), |acc, &v| acc + v * v);
        Ok(T::lift(0.5) * sum)
    }
}

#[derive(Debug, Error)]
#[error("state component {index} = {value} is outside the domain of ln")]
pub struct DomainError {
    pub index: usize,
    pub value: f64,
}

/// f(x) = Σ ln x_i, defined only for positive states.
pub struct LogSum;

impl DifferentiableFunction for LogSum {
    type Params = ();

    fn evaluate<T: Scalar>(&self, _params: &(), x: &[T]) -> Result<T> {
        let mut acc = T::zero();
        for (index, &v) in x.iter().enumerate() {
            if v <= T::zero() {
                return Err(DomainError {
                    index,
                    value: v.to_f64().unwrap_or(f64::NAN),
                }
                .into());
            }
            acc = acc + v.ln();
        }
        Ok(acc)
    }
}

#[derive(Debug, Clone)]
pub struct NetworkParams {
    /// hidden × inputs, row-major
    pub weights: Vec<f64>,
    pub biases: Vec<f64>,
    pub output: Vec<f64>,
}

/// One hidden tanh layer followed by a linear readout.
#[derive(Debug, Clone)]
pub struct TanhNetwork {
    pub inputs: usize,
    pub hidden: usize,
}

impl TanhNetwork {
    pub fn new(inputs: usize, hidden: usize) -> Self {
        Self { inputs, hidden }
    }

    /// Deterministic weights scaled by 1/√n so pre-activations stay O(1).
    pub fn params(&self) -> NetworkParams {
        let scale = 1.0 / (self.inputs as f64).sqrt();
        let weights = (0..self.hidden * self.inputs)
            .map(|k| scale * (((k * 31 + 7) % 23) as f64 - 11.0) / 11.0)
            .collect();
        let biases = (0..self.hidden)
            .map(|k| 0.1 * (k as f64) - 0.2)
            .collect();
        let output = (0..self.hidden)
            .map(|k| if k % 2 == 0 { 1.0 } else { -0.5 })
            .collect();
        NetworkParams {
            weights,
            biases,
            output,
        }
    }
}

impl DifferentiableFunction for TanhNetwork {
    type Params = NetworkParams;

    fn evaluate<T: Scalar>(&self, params: &NetworkParams, x: &[T]) -> Result<T> {
        if x.len() != self.inputs {
            bail!(
                "Network input dimension mismatch. Expected {}, got {}.",
                self.inputs,
                x.len()
            );
        }
        let mut out = T::zero();
        for k in 0..self.hidden {
            let row = &params.weights[k * self.inputs..(k + 1) * self.inputs];
            let pre = row
                .iter()
                .zip(x)
                .fold(T::lift(params.biases[k]), |acc, (&w, &xi)| acc + T::lift(w) * xi);
            out = out + T::lift(params.output[k]) * pre.tanh();
        }
        Ok(out)
    }
}

/// Pointwise sum of two functions.
pub struct SumOf<A, B>(pub A, pub B);

impl<A, B> DifferentiableFunction for SumOf<A, B>
where
    A: DifferentiableFunction,
    B: DifferentiableFunction,
    A::Params: Sized,
    B::Params: Sized,
{
    type Params = (A::Params, B::Params);

    fn evaluate<T: Scalar>(&self, params: &Self::Params, x: &[T]) -> Result<T> {
        Ok(self.0.evaluate(&params.0, x)? + self.1.evaluate(&params.1, x)?)
    }
}

/// Counts every evaluation of the wrapped function, whatever the scalar type.
pub struct CountingFunction<F> {
    inner: F,
    evaluations: AtomicUsize,
}

impl<F> CountingFunction<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            evaluations: AtomicUsize::new(0),
        }
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

impl<F: DifferentiableFunction> DifferentiableFunction for CountingFunction<F> {
    type Params = F::Params;

    fn evaluate<T: Scalar>(&self, params: &F::Params, x: &[T]) -> Result<T> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.inner.evaluate(params, x)
    }
}
