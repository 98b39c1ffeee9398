use crate::{
    drift::{expected_drift_at, DriftSettings},
    error::DriftError,
    traits::{DifferentiableFunction, ItoDynamics},
};
use log::debug;
use rayon::prelude::*;

/// Expected drift at every state of a batch sharing `f`, `params` and
/// `dynamics`.
///
/// Elements are independent: each gets its own result, in input order, and a
/// failing element leaves the others untouched.
pub fn expected_drift_batch<F, D, S>(
    f: &F,
    params: &F::Params,
    dynamics: &D,
    states: &[S],
    settings: DriftSettings,
) -> Vec<Result<f64, DriftError>>
where
    F: DifferentiableFunction + Sync + ?Sized,
    F::Params: Sync,
    D: ItoDynamics + ?Sized,
    S: AsRef<[f64]> + Sync,
{
    let evaluate = |state: &S| expected_drift_at(f, params, dynamics, state.as_ref(), settings);
    let results: Vec<Result<f64, DriftError>> = if settings.parallel {
        states.par_iter().map(evaluate).collect()
    } else {
        states.iter().map(evaluate).collect()
    };

    let failures = results.iter().filter(|r| r.is_err()).count();
    debug!(
        "drift batch: {} states, {} failed, parallel = {}",
        states.len(),
        failures,
        settings.parallel
    );
    results
}

/// Fail-fast variant of [`expected_drift_batch`]: returns the first error
/// encountered. With `parallel` set, which failing element is reported is
/// unspecified and remaining work is abandoned early.
pub fn try_expected_drift_batch<F, D, S>(
    f: &F,
    params: &F::Params,
    dynamics: &D,
    states: &[S],
    settings: DriftSettings,
) -> Result<Vec<f64>, DriftError>
where
    F: DifferentiableFunction + Sync + ?Sized,
    F::Params: Sync,
    D: ItoDynamics + ?Sized,
    S: AsRef<[f64]> + Sync,
{
    let evaluate = |state: &S| expected_drift_at(f, params, dynamics, state.as_ref(), settings);
    if settings.parallel {
        states.par_iter().map(evaluate).collect()
    } else {
        states.iter().map(evaluate).collect()
    }
}
