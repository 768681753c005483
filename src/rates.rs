//! Self-consistent working point of a recurrent network: mean input, input fluctuation
//! and stationary firing rate per population.
use itertools::izip;
use nalgebra::DVector;

use crate::error::MeanfieldError;
use crate::params::{ConnectivityModel, PopulationParameters};
use crate::siegert::stationary_rate_filtered;

/// Default relaxation step size of the fixed-point iteration.
pub const RELAXATION_STEP: f64 = 0.05;
/// Default convergence tolerance on the maximum absolute rate change per step, in Hz.
pub const RATE_TOLERANCE: f64 = 1e-5;
/// Default cap on the number of relaxation steps.
pub const MAX_ITER_RATES: usize = 100_000;
/// Number of relaxation steps between trace log lines.
const LOG_EVERY: usize = 500;

/// Tuning knobs of the fixed-point relaxation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxationConfig {
    /// Explicit-Euler step size.
    pub step: f64,
    /// Convergence tolerance on the maximum absolute rate change per step, in Hz.
    pub tolerance: f64,
    /// Maximum number of relaxation steps before giving up.
    pub max_iter: usize,
}

impl Default for RelaxationConfig {
    fn default() -> Self {
        RelaxationConfig {
            step: RELAXATION_STEP,
            tolerance: RATE_TOLERANCE,
            max_iter: MAX_ITER_RATES,
        }
    }
}

/// The converged operating point of the network.
///
/// Immutable once computed; rerun the solver to obtain a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingPoint {
    /// Mean input per population in mV.
    pub mean: DVector<f64>,
    /// Input standard deviation per population in mV.
    pub std: DVector<f64>,
    /// Stationary firing rate per population in Hz.
    pub rates: DVector<f64>,
}

/// Mean input to each population in mV, given the population rates in Hz.
///
/// Sums the recurrent contribution `(K ∘ J) ν τ_m` and the external drive
/// `j K_ext ν_ext τ_m`.
pub fn mean_input(
    rates: &DVector<f64>,
    connectivity: &ConnectivityModel,
    params: &PopulationParameters,
) -> DVector<f64> {
    let tau_m = params.tau_m().as_s();
    let recurrent = connectivity.indegrees().component_mul(connectivity.weights()) * rates * tau_m;
    let external = connectivity.ext_indegrees()
        * (connectivity.weight() * connectivity.ext_rate().as_hz() * tau_m);
    recurrent + external
}

/// Input standard deviation of each population in mV, given the population rates in Hz.
///
/// The variance sums `(K ∘ J²) ν τ_m` and `j² K_ext ν_ext τ_m`.
pub fn std_input(
    rates: &DVector<f64>,
    connectivity: &ConnectivityModel,
    params: &PopulationParameters,
) -> DVector<f64> {
    let tau_m = params.tau_m().as_s();
    let squared_weights = connectivity.weights().component_mul(connectivity.weights());
    let recurrent = connectivity.indegrees().component_mul(&squared_weights) * rates * tau_m;
    let external = connectivity.ext_indegrees()
        * (connectivity.weight() * connectivity.weight()
            * connectivity.ext_rate().as_hz()
            * tau_m);
    (recurrent + external).map(f64::sqrt)
}

/// Solve for the self-consistent working point by explicit-Euler relaxation.
///
/// Starting from zero rates, each step maps the current rates through the input statistics
/// and the filtered stationary-rate solver, then relaxes towards the candidate rates with
/// the configured step size. Terminates when the maximum absolute rate change falls below
/// the tolerance; exceeding the iteration cap is a convergence error. The relaxation may
/// cycle or diverge for pathological connectivity; no cycle detection is attempted.
pub fn solve_working_point(
    params: &PopulationParameters,
    connectivity: &ConnectivityModel,
    config: &RelaxationConfig,
) -> Result<WorkingPoint, MeanfieldError> {
    if config.step <= 0.0 || config.tolerance <= 0.0 {
        return Err(MeanfieldError::InvalidParameter(
            "Relaxation step and tolerance must be positive".to_string(),
        ));
    }
    let dimension = connectivity.dimension();
    let mut rates = DVector::zeros(dimension);

    for iter in 0..config.max_iter {
        let mu = mean_input(&rates, connectivity, params);
        let sigma = std_input(&rates, connectivity, params);

        let mut eps: f64 = 0.0;
        for (rate, mu_i, sigma_i) in izip!(rates.iter_mut(), mu.iter(), sigma.iter()) {
            let candidate = stationary_rate_filtered(params, *mu_i, *sigma_i)?;
            let delta = config.step * (candidate - *rate);
            *rate += delta;
            eps = eps.max(delta.abs());
        }

        if iter % LOG_EVERY == 0 {
            log::trace!("Relaxation step {}: max rate change {} Hz", iter, eps);
        }
        if eps < config.tolerance {
            log::info!(
                "Firing rates converged after {} relaxation steps (max change {} Hz)",
                iter + 1,
                eps
            );
            let mean = mean_input(&rates, connectivity, params);
            let std = std_input(&rates, connectivity, params);
            return Ok(WorkingPoint { mean, std, rates });
        }
    }

    Err(MeanfieldError::DidNotConverge(format!(
        "Firing rates did not converge within {} relaxation steps",
        config.max_iter
    )))
}
