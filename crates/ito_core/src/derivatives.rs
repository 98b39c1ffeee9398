use crate::{
    autodiff::Dual,
    reverse::{Tape, Var},
    traits::DifferentiableFunction,
};
use anyhow::{bail, Result};

/// Evaluates `f` once at `x` along `direction` with dual numbers.
/// Returns `(f(x), ∇f(x)·direction)`.
pub fn jvp<F>(f: &F, params: &F::Params, x: &[f64], direction: &[f64]) -> Result<(f64, f64)>
where
    F: DifferentiableFunction + ?Sized,
{
    ensure_direction_len(x, direction)?;
    let seeded: Vec<Dual> = x
        .iter()
        .zip(direction)
        .map(|(&xi, &vi)| Dual::new(xi, vi))
        .collect();
    let out = f.evaluate(params, &seeded)?;
    Ok((out.val, out.eps))
}

/// Records `f` on a tape and sweeps backward once. Returns `(f(x), ∇f(x))`.
pub fn gradient<F>(f: &F, params: &F::Params, x: &[f64]) -> Result<(f64, Vec<f64>)>
where
    F: DifferentiableFunction + ?Sized,
{
    let tape = Tape::with_capacity(x.len());
    let inputs: Vec<Var<'_, f64>> = x.iter().map(|&xi| tape.var(xi)).collect();
    let out = f.evaluate(params, &inputs)?;
    Ok((out.value(), tape.gradient(out, &inputs)))
}

/// Hessian-vector product by forward-over-reverse: the tape records dual
/// numbers seeded with `direction`, so the dual parts of the adjoints are
/// `d/dt ∇f(x + t·direction) = H(x)·direction`.
pub fn hvp<F>(f: &F, params: &F::Params, x: &[f64], direction: &[f64]) -> Result<Vec<f64>>
where
    F: DifferentiableFunction + ?Sized,
{
    ensure_direction_len(x, direction)?;
    let tape = Tape::with_capacity(x.len());
    let inputs: Vec<Var<'_, Dual>> = x
        .iter()
        .zip(direction)
        .map(|(&xi, &vi)| tape.var(Dual::new(xi, vi)))
        .collect();
    let out = f.evaluate(params, &inputs)?;
    Ok(tape
        .gradient(out, &inputs)
        .into_iter()
        .map(|adjoint| adjoint.eps)
        .collect())
}

/// `directionᵀ·H(x)·direction` as the mixed second derivative of
/// `f(x + s·v + t·v)` at `s = t = 0`, from one nested-dual forward pass.
pub fn directional_curvature<F>(
    f: &F,
    params: &F::Params,
    x: &[f64],
    direction: &[f64],
) -> Result<f64>
where
    F: DifferentiableFunction + ?Sized,
{
    ensure_direction_len(x, direction)?;
    let seeded: Vec<Dual<Dual>> = x
        .iter()
        .zip(direction)
        .map(|(&xi, &vi)| Dual::new(Dual::new(xi, vi), Dual::new(vi, 0.0)))
        .collect();
    let out = f.evaluate(params, &seeded)?;
    Ok(out.eps.eps)
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn ensure_direction_len(x: &[f64], direction: &[f64]) -> Result<()> {
    if x.len() != direction.len() {
        bail!(
            "Direction dimension mismatch. Expected {}, got {}.",
            x.len(),
            direction.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::dot;
    use crate::test_support::{assert_err_contains, HalfSquaredNorm, LogSum, TanhNetwork};
    use crate::traits::DifferentiableFunction;
    use approx::assert_abs_diff_eq;

    #[test]
    fn jvp_matches_gradient_dot_direction() {
        let network = TanhNetwork::new(5, 3);
        let params = network.params();
        let x = [0.2, -0.1, 0.4, 0.0, 0.3];
        let v = [1.0, 0.5, -0.25, 2.0, -1.0];

        let (value, directional) = network.jvp(&params, &x, &v).expect("jvp");
        let (grad_value, grad) = network.gradient(&params, &x).expect("gradient");

        assert_abs_diff_eq!(value, grad_value, epsilon = 1e-14);
        assert_abs_diff_eq!(directional, dot(&grad, &v), epsilon = 1e-12);
    }

    #[test]
    fn hvp_matches_closed_form_for_log_sum() {
        // f = Σ ln x_i, H = diag(-1 / x_i^2)
        let x = [0.5, 2.0, 4.0];
        let v = [1.0, -2.0, 0.5];
        let hv = LogSum.hvp(&(), &x, &v).expect("hvp");
        for i in 0..3 {
            assert_abs_diff_eq!(hv[i], -v[i] / (x[i] * x[i]), epsilon = 1e-12);
        }
    }

    #[test]
    fn hvp_of_quadratic_is_direction() {
        let x = [1.0, -3.0, 2.0, 7.0];
        let v = [0.1, 0.2, 0.3, 0.4];
        let hv = HalfSquaredNorm.hvp(&(), &x, &v).expect("hvp");
        for i in 0..4 {
            assert_abs_diff_eq!(hv[i], v[i], epsilon = 1e-15);
        }
    }

    #[test]
    fn directional_curvature_agrees_with_hvp() {
        let network = TanhNetwork::new(6, 4);
        let params = network.params();
        let x = [0.3, -0.2, 0.1, 0.5, -0.4, 0.05];
        let v = [0.7, 0.1, -0.3, 0.2, 0.9, -0.6];

        let hv = network.hvp(&params, &x, &v).expect("hvp");
        let curvature = network
            .directional_curvature(&params, &x, &v)
            .expect("curvature");
        assert_abs_diff_eq!(curvature, dot(&hv, &v), epsilon = 1e-12);
    }

    #[test]
    fn primitives_reject_mismatched_direction() {
        assert_err_contains(
            HalfSquaredNorm.jvp(&(), &[1.0, 2.0], &[1.0]),
            "Direction dimension mismatch",
        );
        assert_err_contains(
            HalfSquaredNorm.hvp(&(), &[1.0, 2.0], &[1.0, 2.0, 3.0]),
            "Direction dimension mismatch",
        );
    }

    #[test]
    fn evaluation_errors_surface_from_every_primitive() {
        let x = [1.0, -1.0];
        assert_err_contains(LogSum.value(&(), &x), "outside the domain");
        assert_err_contains(LogSum.jvp(&(), &x, &[1.0, 1.0]), "outside the domain");
        assert_err_contains(LogSum.gradient(&(), &x), "outside the domain");
        assert_err_contains(LogSum.hvp(&(), &x, &[1.0, 1.0]), "outside the domain");
    }

    #[test]
    fn domain_checks_do_not_depend_on_the_direction() {
        let x = [0.0, 1.0];
        for direction in [[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0]] {
            assert_err_contains(LogSum.jvp(&(), &x, &direction), "outside the domain");
            assert_err_contains(LogSum.hvp(&(), &x, &direction), "outside the domain");
            assert_err_contains(
                LogSum.directional_curvature(&(), &x, &direction),
                "outside the domain",
            );
        }
    }
}
