//! Linear response of each population around the working point, in the complex
//! frequency domain.
use std::f64::consts::SQRT_2;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use rayon::prelude::*;

use crate::error::{MeanfieldError, SlotFailure};
use crate::params::{FrequencyGrid, PopulationParameters};
use crate::siegert::{
    rate_derivative_delta, rate_derivative_filtered, stationary_rate_delta,
    stationary_rate_filtered, ALPHA,
};
use crate::special::{d2_psi_diff, d_psi_diff, psi_diff, SeriesContext};

/// Angular frequencies below this magnitude are evaluated at the analytic zero-frequency
/// limit.
const OMEGA_ZERO_TOL: f64 = 1e-15;
/// Minimum number of grid frequencies to parallelize the batch evaluation.
const MIN_FREQS_PAR: usize = 8;

/// The two formulations of the linear response.
///
/// Both are equivalent to first order in `sqrt(tau_s/tau_m)`; the shift variant is the
/// default for batch evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMethod {
    /// Asymptotic expansion around the delta-synapse response.
    Taylor,
    /// Delta-synapse response at effectively shifted threshold and reset.
    #[default]
    Shift,
}

/// Batch transfer functions over the frequency grid with per-frequency failure slots.
#[derive(Debug)]
pub struct TransferFunctions {
    /// Complex response in Hz/mV, one row per population, one column per grid frequency.
    /// Columns of failed frequency slots are filled with NaN.
    pub matrix: DMatrix<Complex64>,
    /// Failures of individual frequency slots.
    pub failures: Vec<SlotFailure>,
}

/// Transfer function of one population at one angular frequency, in Hz/mV.
pub fn transfer_function_single(
    mu: f64,
    sigma: f64,
    params: &PopulationParameters,
    omega: f64,
    method: TransferMethod,
    ctx: &SeriesContext,
) -> Result<Complex64, MeanfieldError> {
    match method {
        TransferMethod::Taylor => transfer_taylor(mu, sigma, params, omega, ctx),
        TransferMethod::Shift => transfer_shift(mu, sigma, params, omega, ctx),
    }
}

/// Transfer functions of all populations over the whole frequency grid.
///
/// Independent frequencies are evaluated in parallel; a failing frequency does not abort
/// the rest of the grid.
pub fn transfer_function(
    mu: &DVector<f64>,
    sigma: &DVector<f64>,
    params: &PopulationParameters,
    grid: &FrequencyGrid,
    method: TransferMethod,
    ctx: &SeriesContext,
) -> Result<TransferFunctions, MeanfieldError> {
    if mu.len() != sigma.len() {
        return Err(MeanfieldError::InvalidParameter(
            "Mean and standard deviation vectors must have the same length".to_string(),
        ));
    }
    let dimension = mu.len();

    let column = |omega: &f64| -> Result<Vec<Complex64>, MeanfieldError> {
        (0..dimension)
            .map(|i| transfer_function_single(mu[i], sigma[i], params, *omega, method, ctx))
            .collect()
    };

    let columns: Vec<Result<Vec<Complex64>, MeanfieldError>> = if grid.len() >= MIN_FREQS_PAR {
        grid.omegas().par_iter().map(column).collect()
    } else {
        grid.omegas().iter().map(column).collect()
    };

    let mut matrix = DMatrix::from_element(
        dimension,
        grid.len(),
        Complex64::new(f64::NAN, f64::NAN),
    );
    let mut failures = Vec::new();
    for (index, result) in columns.into_iter().enumerate() {
        match result {
            Ok(values) => {
                for (i, value) in values.into_iter().enumerate() {
                    matrix[(i, index)] = value;
                }
            }
            Err(error) => {
                log::warn!(
                    "Transfer function failed at omega = {} rad/s: {}",
                    grid.omegas()[index],
                    error
                );
                failures.push(SlotFailure {
                    index,
                    omega: grid.omegas()[index],
                    error,
                });
            }
        }
    }
    Ok(TransferFunctions { matrix, failures })
}

/// Asymptotic (small `sqrt(tau_s/tau_m)`) formulation.
fn transfer_taylor(
    mu: f64,
    sigma: f64,
    params: &PopulationParameters,
    omega: f64,
    ctx: &SeriesContext,
) -> Result<Complex64, MeanfieldError> {
    if omega.abs() < OMEGA_ZERO_TOL {
        return Ok(Complex64::new(
            rate_derivative_filtered(params, mu, sigma)?,
            0.0,
        ));
    }

    let tau_m = params.tau_m().as_s();
    let tau_s = params.tau_s().as_s();
    let nu0 = stationary_rate_delta(params, mu, sigma)?;
    let nu0_fb = stationary_rate_filtered(params, mu, sigma)?;
    if nu0 == 0.0 || nu0_fb == 0.0 {
        return Ok(Complex64::new(0.0, 0.0));
    }

    let x_th = SQRT_2 * (params.v_th().as_mv() - mu) / sigma;
    let x_r = SQRT_2 * (params.v_0().as_mv() - mu) / sigma;
    let z = Complex64::new(-0.5, omega * tau_m);
    let k = (tau_s / tau_m).sqrt();
    let a = ALPHA * tau_m * nu0 * k / SQRT_2;

    let a0 = psi_diff(z, x_th, x_r, ctx)?;
    if a0.norm() < f64::MIN_POSITIVE {
        return Err(MeanfieldError::NumericalDegeneracy(format!(
            "Vanishing kernel boundary difference at omega = {} rad/s",
            omega
        )));
    }
    let a1 = d_psi_diff(z, x_th, x_r, ctx)? / a0;
    let a3 = a / tau_m / nu0_fb * (-a1 * a1 + d2_psi_diff(z, x_th, x_r, ctx)? / a0);

    Ok(SQRT_2 / sigma * nu0_fb / Complex64::new(1.0, omega * tau_m) * (a1 + a3))
}

/// Effective-threshold-shift formulation.
fn transfer_shift(
    mu: f64,
    sigma: f64,
    params: &PopulationParameters,
    omega: f64,
    ctx: &SeriesContext,
) -> Result<Complex64, MeanfieldError> {
    let tau_m = params.tau_m().as_s();
    let tau_s = params.tau_s().as_s();

    // Effective threshold and reset, shifted by the synaptic filter correction
    let shift = sigma * ALPHA / 2.0 * (tau_s / tau_m).sqrt();
    let shifted = PopulationParameters::new(
        params.tau_m(),
        params.tau_s(),
        params.tau_r(),
        crate::units::Voltage::mv(params.v_th().as_mv() + shift),
        crate::units::Voltage::mv(params.v_0().as_mv() + shift),
    )?;

    if omega.abs() < OMEGA_ZERO_TOL {
        return Ok(Complex64::new(rate_derivative_delta(&shifted, mu, sigma)?, 0.0));
    }

    let nu = stationary_rate_delta(&shifted, mu, sigma)?;
    if nu == 0.0 {
        return Ok(Complex64::new(0.0, 0.0));
    }

    let x_th = SQRT_2 * (shifted.v_th().as_mv() - mu) / sigma;
    let x_r = SQRT_2 * (shifted.v_0().as_mv() - mu) / sigma;
    let z = Complex64::new(-0.5, omega * tau_m);

    let a0 = psi_diff(z, x_th, x_r, ctx)?;
    if a0.norm() < f64::MIN_POSITIVE {
        return Err(MeanfieldError::NumericalDegeneracy(format!(
            "Vanishing kernel boundary difference at omega = {} rad/s",
            omega
        )));
    }
    let frac = d_psi_diff(z, x_th, x_r, ctx)? / a0;

    Ok(SQRT_2 / sigma * nu / Complex64::new(1.0, omega * tau_m) * frac)
}
