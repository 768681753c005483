//! Stationary firing rates of leaky integrate-and-fire neurons under the diffusion
//! approximation, for delta-shaped and exponentially filtered synaptic input.
use std::f64::consts::{PI, SQRT_2};

use statrs::function::erf::erf;

use crate::error::MeanfieldError;
use crate::params::PopulationParameters;
use crate::special::{phi, phi_prime_mu};

/// Magnitude of the Riemann zeta function at one half.
const ZETA_HALF_ABS: f64 = 1.460_354_508_809_586_8;
/// Prefactor of the synaptic filter correction, `sqrt(2) |zeta(1/2)|`.
pub(crate) const ALPHA: f64 = SQRT_2 * ZETA_HALF_ABS;

/// Integrand values below this threshold are treated as negligible by the bracket search.
const BRACKET_TOL: f64 = 1e-12;
/// The lower integration bound is never pushed below this value.
const BRACKET_FLOOR: f64 = 1e-16;
/// Maximum number of doubling/halving steps when bracketing an integrand.
const MAX_BRACKET_STEPS: usize = 1024;
/// Absolute tolerance of the adaptive quadrature.
const QUAD_TOL: f64 = 1e-12;
/// Maximum recursion depth of the adaptive quadrature.
const MAX_QUAD_DEPTH: u32 = 48;
/// Normalized threshold distance beyond which the firing rate is indistinguishable from zero.
const Y_TH_OVERFLOW: f64 = 20.0;

/// Stationary firing rate in Hz for delta-shaped post-synaptic currents.
///
/// `mu` and `sigma` are the mean and standard deviation of the input in mV. The integration
/// strategy switches close to the threshold: below it, the integrand is scaled by
/// `exp(y_th^2)` and bracketed around the threshold distance; above it, the unscaled
/// integrand is integrated from zero.
pub fn stationary_rate_delta(
    params: &PopulationParameters,
    mu: f64,
    sigma: f64,
) -> Result<f64, MeanfieldError> {
    let v_th = params.v_th().as_mv();
    if mu <= v_th - 0.05 * v_th.abs() {
        rate_below_threshold(params, mu, sigma)
    } else {
        rate_above_threshold(params, mu, sigma)
    }
}

/// Stationary firing rate in Hz for exponentially filtered post-synaptic currents.
///
/// First-order correction in `sqrt(tau_s/tau_m)` to the delta-synapse rate, following
/// Fourcaud & Brunel (2002). Far above the transition region the correction vanishes
/// inside the overflow guard of the scaled complementary error function, so the delta
/// rate is returned unmodified.
pub fn stationary_rate_filtered(
    params: &PopulationParameters,
    mu: f64,
    sigma: f64,
) -> Result<f64, MeanfieldError> {
    let tau_m = params.tau_m().as_s();
    let tau_s = params.tau_s().as_s();
    let x_th = SQRT_2 * (params.v_th().as_mv() - mu) / sigma;
    let x_r = SQRT_2 * (params.v_0().as_mv() - mu) / sigma;

    if x_th > Y_TH_OVERFLOW / SQRT_2 {
        return stationary_rate_delta(params, mu, sigma);
    }

    let r = stationary_rate_delta(params, mu, sigma)?;
    let d_phi = phi(x_th) - phi(x_r);
    let result = r - (tau_s / tau_m).sqrt() * ALPHA / (tau_m * SQRT_2) * d_phi * (r * tau_m).powi(2);
    if !result.is_finite() {
        log::warn!(
            "Non-finite filtered rate at mu = {} mV, sigma = {} mV (x_th = {}, x_r = {})",
            mu,
            sigma,
            x_th,
            x_r
        );
    }
    Ok(result)
}

/// Derivative of the delta-synapse stationary rate with respect to the mean input, in Hz/mV.
pub fn rate_derivative_delta(
    params: &PopulationParameters,
    mu: f64,
    sigma: f64,
) -> Result<f64, MeanfieldError> {
    let tau_m = params.tau_m().as_s();
    let y_th = (params.v_th().as_mv() - mu) / sigma;
    let y_r = (params.v_0().as_mv() - mu) / sigma;
    let nu0 = stationary_rate_delta(params, mu, sigma)?;
    if nu0 == 0.0 {
        return Ok(0.0);
    }
    Ok(PI.sqrt() * tau_m * nu0 * nu0 / sigma
        * ((y_th * y_th).exp() * (1.0 + erf(y_th)) - (y_r * y_r).exp() * (1.0 + erf(y_r))))
}

/// Derivative of the filtered-synapse stationary rate with respect to the mean input,
/// in Hz/mV.
pub fn rate_derivative_filtered(
    params: &PopulationParameters,
    mu: f64,
    sigma: f64,
) -> Result<f64, MeanfieldError> {
    let tau_m = params.tau_m().as_s();
    let tau_s = params.tau_s().as_s();
    let x_th = SQRT_2 * (params.v_th().as_mv() - mu) / sigma;
    let x_r = SQRT_2 * (params.v_0().as_mv() - mu) / sigma;
    let nu0 = stationary_rate_delta(params, mu, sigma)?;
    if nu0 == 0.0 {
        return Ok(0.0);
    }
    let integral = 1.0 / (nu0 * tau_m);
    let prefactor = (tau_s / tau_m).sqrt() * ALPHA / (tau_m * SQRT_2);
    let dnudmu = rate_derivative_delta(params, mu, sigma)?;
    let d_phi_prime = phi_prime_mu(x_th, sigma) - phi_prime_mu(x_r, sigma);
    let d_phi = phi(x_th) - phi(x_r);
    let correction = d_phi_prime * integral + (2.0 * SQRT_2 / sigma) * d_phi * d_phi;
    Ok(dnudmu - prefactor * correction / integral.powi(3))
}

/// Rate branch for mean input below the threshold region.
fn rate_below_threshold(
    params: &PopulationParameters,
    mu: f64,
    sigma: f64,
) -> Result<f64, MeanfieldError> {
    let tau_m = params.tau_m().as_s();
    let tau_r = params.tau_r().as_s();
    let y_th = (params.v_th().as_mv() - mu) / sigma;
    let y_r = (params.v_0().as_mv() - mu) / sigma;

    if y_th >= Y_TH_OVERFLOW {
        return Ok(0.0);
    }

    // Removable singularity at u = 0, defined by its limit
    let integrand = |u: f64| -> f64 {
        if u == 0.0 {
            (-y_th * y_th).exp() * 2.0 * (y_th - y_r)
        } else {
            (-(u - y_th) * (u - y_th)).exp() * (1.0 - (2.0 * (y_r - y_th) * u).exp()) / u
        }
    };

    let mut lower = y_th;
    let mut steps = 0;
    while integrand(lower) > BRACKET_TOL && lower > BRACKET_FLOOR {
        lower /= 2.0;
        steps += 1;
        if steps > MAX_BRACKET_STEPS {
            return Err(MeanfieldError::DidNotConverge(
                "Lower integration bound search exceeded its step budget".to_string(),
            ));
        }
    }

    let mut upper = y_th;
    let mut steps = 0;
    while integrand(upper) > BRACKET_TOL {
        upper *= 2.0;
        steps += 1;
        if steps > MAX_BRACKET_STEPS {
            return Err(MeanfieldError::DidNotConverge(
                "Upper integration bound search exceeded its step budget".to_string(),
            ));
        }
    }

    let integral = adaptive_quadrature(&integrand, lower, upper);
    Ok(1.0 / (tau_r + (y_th * y_th).exp() * integral * tau_m))
}

/// Rate branch for mean input above the threshold region.
fn rate_above_threshold(
    params: &PopulationParameters,
    mu: f64,
    sigma: f64,
) -> Result<f64, MeanfieldError> {
    let tau_m = params.tau_m().as_s();
    let tau_r = params.tau_r().as_s();
    let y_th = (params.v_th().as_mv() - mu) / sigma;
    let y_r = (params.v_0().as_mv() - mu) / sigma;

    let integrand = |u: f64| -> f64 {
        if u == 0.0 {
            2.0 * (y_th - y_r)
        } else {
            ((2.0 * y_th * u - u * u).exp() - (2.0 * y_r * u - u * u).exp()) / u
        }
    };

    let mut upper = 1.0;
    let mut steps = 0;
    while integrand(upper) > BRACKET_TOL {
        upper *= 2.0;
        steps += 1;
        if steps > MAX_BRACKET_STEPS {
            return Err(MeanfieldError::DidNotConverge(
                "Upper integration bound search exceeded its step budget".to_string(),
            ));
        }
    }

    let integral = adaptive_quadrature(&integrand, 0.0, upper);
    Ok(1.0 / (tau_r + integral * tau_m))
}

/// Adaptive Simpson quadrature over `[a, b]`.
fn adaptive_quadrature(f: &impl Fn(f64) -> f64, a: f64, b: f64) -> f64 {
    let m = 0.5 * (a + b);
    let (fa, fm, fb) = (f(a), f(m), f(b));
    let whole = simpson(a, b, fa, fm, fb);
    adaptive_step(f, a, m, b, fa, fm, fb, whole, QUAD_TOL, MAX_QUAD_DEPTH)
}

fn simpson(a: f64, b: f64, fa: f64, fm: f64, fb: f64) -> f64 {
    (b - a) / 6.0 * (fa + 4.0 * fm + fb)
}

#[allow(clippy::too_many_arguments)]
fn adaptive_step(
    f: &impl Fn(f64) -> f64,
    a: f64,
    m: f64,
    b: f64,
    fa: f64,
    fm: f64,
    fb: f64,
    whole: f64,
    tol: f64,
    depth: u32,
) -> f64 {
    let lm = 0.5 * (a + m);
    let rm = 0.5 * (m + b);
    let (flm, frm) = (f(lm), f(rm));
    let left = simpson(a, m, fa, flm, fm);
    let right = simpson(m, b, fm, frm, fb);
    let delta = left + right - whole;
    if depth == 0 || delta.abs() <= 15.0 * tol {
        left + right + delta / 15.0
    } else {
        adaptive_step(f, a, lm, m, fa, flm, fm, left, 0.5 * tol, depth - 1)
            + adaptive_step(f, m, rm, b, fm, frm, fb, right, 0.5 * tol, depth - 1)
    }
}
