//! Special functions for the diffusion approximation: the scaled complementary error
//! function family and a parabolic-cylinder-function kernel with complex order.
//!
//! The kernel `Psi(z, x) = exp(x^2/4) U(z, -x)` is assembled from the even/odd solution
//! pair of the parabolic cylinder equation, with the exponential scaling cancelled
//! analytically against the series prefactors, so it stays finite where the naive product
//! would overflow. Derivatives use order-shift recurrences, not finite differences.
use std::f64::consts::{FRAC_2_SQRT_PI, LN_2, PI};

use num_complex::Complex64;
use statrs::function::erf::{erf, erfc};

use crate::error::MeanfieldError;

/// Radius below which the complex error function uses its Maclaurin series.
const ERF_SERIES_RADIUS: f64 = 3.5;
/// Maximum number of Maclaurin terms for the complex error function.
const ERF_SERIES_MAX: usize = 200;
/// Maximum number of continued-fraction iterations for the complementary error function.
const CF_MAX_ITER: usize = 256;
/// Argument above which the scaled complementary error function switches to its
/// continued-fraction representation.
const ERFCX_CF_CUTOFF: f64 = 4.0;

/// Truncation control for the confluent hypergeometric series behind the kernel.
///
/// Threaded explicitly into every kernel evaluation; there is no ambient precision state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesContext {
    /// Relative tolerance at which the series is considered converged.
    pub tolerance: f64,
    /// Hard cap on the number of series terms.
    pub max_terms: usize,
}

impl Default for SeriesContext {
    fn default() -> Self {
        SeriesContext {
            tolerance: 1e-15,
            max_terms: 5000,
        }
    }
}

/// The scaled complementary error function `sqrt(pi/2) exp(s^2/2) (1 + erf(s/sqrt(2)))`.
///
/// For negative arguments the product is evaluated through the scaled complement, which
/// stays finite where the two factors would overflow and underflow separately.
pub fn phi(s: f64) -> f64 {
    let sqrt_half_pi = (0.5 * PI).sqrt();
    if s >= 0.0 {
        sqrt_half_pi * (0.5 * s * s).exp() * (1.0 + erf(s / f64::sqrt(2.0)))
    } else {
        sqrt_half_pi * erfcx_nonneg(-s / f64::sqrt(2.0))
    }
}

/// Derivative of [`phi`] with respect to the mean input, at normalized argument `s` and
/// input fluctuation `sigma`.
pub fn phi_prime_mu(s: f64, sigma: f64) -> f64 {
    let scaled = if s >= 0.0 {
        s * (0.5 * s * s).exp() * (1.0 + erf(s / f64::sqrt(2.0)))
    } else {
        s * erfcx_nonneg(-s / f64::sqrt(2.0))
    };
    -PI.sqrt() / sigma * (scaled + f64::sqrt(2.0) / PI.sqrt())
}

/// The scaled complementary error function continued to complex arguments.
pub fn phi_complex(s: Complex64) -> Complex64 {
    let sqrt_half_pi = (0.5 * PI).sqrt();
    sqrt_half_pi * (0.5 * s * s).exp() * (1.0 + erf_complex(s / f64::sqrt(2.0)))
}

/// The error function for complex arguments.
///
/// Maclaurin series inside [`ERF_SERIES_RADIUS`], Lentz continued fraction outside,
/// reflected to the right half plane. The continued fraction loses accuracy for large
/// arguments close to the imaginary axis; the delay statistics evaluated here stay well
/// away from that region.
pub fn erf_complex(z: Complex64) -> Complex64 {
    if z.im == 0.0 {
        return Complex64::new(erf(z.re), 0.0);
    }
    if z.norm() <= ERF_SERIES_RADIUS {
        return erf_series(z);
    }
    if z.re >= 0.0 {
        1.0 - (-z * z).exp() * erfc_cf_kernel(z) / PI.sqrt()
    } else {
        -erf_complex(-z)
    }
}

/// Maclaurin series of the error function.
fn erf_series(z: Complex64) -> Complex64 {
    let z2 = z * z;
    let mut p = z;
    let mut sum = z;
    for n in 1..ERF_SERIES_MAX {
        p *= -z2 / n as f64;
        let term = p / (2 * n + 1) as f64;
        sum += term;
        if term.norm() <= f64::EPSILON * sum.norm() {
            break;
        }
    }
    FRAC_2_SQRT_PI * sum
}

/// The scaled complementary error function `exp(y^2) erfc(y)` for `y >= 0`.
fn erfcx_nonneg(y: f64) -> f64 {
    debug_assert!(y >= 0.0);
    if y < ERFCX_CF_CUTOFF {
        (y * y).exp() * erfc(y)
    } else {
        erfc_cf_kernel(Complex64::new(y, 0.0)).re / PI.sqrt()
    }
}

/// Continued fraction `K(z)` with `erfc(z) = exp(-z^2)/sqrt(pi) K(z)`, for `Re(z) > 0`,
/// evaluated with the modified Lentz algorithm.
fn erfc_cf_kernel(z: Complex64) -> Complex64 {
    const TINY: f64 = 1e-300;
    let mut f = Complex64::new(TINY, 0.0);
    let mut c = f;
    let mut d = Complex64::new(0.0, 0.0);
    for j in 1..=CF_MAX_ITER {
        let a = if j == 1 { 1.0 } else { (j - 1) as f64 / 2.0 };
        d = z + a * d;
        if d.norm() < TINY {
            d = Complex64::new(TINY, 0.0);
        }
        d = d.inv();
        c = z + a / c;
        if c.norm() < TINY {
            c = Complex64::new(TINY, 0.0);
        }
        let delta = c * d;
        f *= delta;
        if (delta - 1.0).norm() < f64::EPSILON {
            break;
        }
    }
    f
}

/// Lanczos coefficients, g = 7, n = 9.
const LANCZOS: [f64; 9] = [
    0.99999999999980993,
    676.5203681218851,
    -1259.1392167224028,
    771.32342877765313,
    -176.61502916214059,
    12.507343278686905,
    -0.13857109526572012,
    9.9843695780195716e-6,
    1.5056327351493116e-7,
];

/// The gamma function for complex arguments (Lanczos approximation with reflection).
pub fn gamma_complex(z: Complex64) -> Complex64 {
    if z.re < 0.5 {
        PI / ((PI * z).sin() * gamma_complex(1.0 - z))
    } else {
        let z = z - 1.0;
        let mut x = Complex64::new(LANCZOS[0], 0.0);
        for (i, c) in LANCZOS.iter().enumerate().skip(1) {
            x += *c / (z + i as f64);
        }
        let t = z + 7.5;
        (2.0 * PI).sqrt() * t.powc(z + 0.5) * (-t).exp() * x
    }
}

/// The reciprocal gamma function for complex arguments.
///
/// Entire in the complex plane; evaluates to exactly zero at the non-positive integers,
/// where the gamma function itself has poles.
pub fn gamma_reciprocal_complex(z: Complex64) -> Complex64 {
    if z.re < 0.5 {
        (PI * z).sin() * gamma_complex(1.0 - z) / PI
    } else {
        gamma_complex(z).inv()
    }
}

/// Kummer's confluent hypergeometric function `M(a, b, z)` by direct series.
///
/// The series terminates once the term magnitude has both fallen below the context
/// tolerance and passed the growth peak near `n = |z|`.
pub fn kummer_m(
    a: Complex64,
    b: Complex64,
    z: Complex64,
    ctx: &SeriesContext,
) -> Result<Complex64, MeanfieldError> {
    let mut term = Complex64::new(1.0, 0.0);
    let mut sum = term;
    let z_norm = z.norm();
    for n in 0..ctx.max_terms {
        let nf = n as f64;
        term *= (a + nf) * z / ((b + nf) * (nf + 1.0));
        sum += term;
        if term.norm() <= ctx.tolerance * sum.norm() && nf + 1.0 > z_norm {
            return Ok(sum);
        }
    }
    Err(MeanfieldError::DidNotConverge(format!(
        "Confluent hypergeometric series did not converge within {} terms",
        ctx.max_terms
    )))
}

/// The kernel `Psi(z, x) = exp(x^2/4) U(z, -x)`, with `U` the parabolic cylinder function
/// of (possibly complex) order `z`.
///
/// Assembled from the even/odd solutions of the parabolic cylinder equation; the
/// `exp(x^2/4)` scaling cancels against their common `exp(-x^2/4)` prefactor, so nothing
/// larger than the series values themselves is ever formed.
pub fn psi(z: Complex64, x: f64, ctx: &SeriesContext) -> Result<Complex64, MeanfieldError> {
    let a_half = 0.5 * z;
    let sqrt_pi = PI.sqrt();
    // Boundary values U(z, 0) and U'(z, 0), with 2^w = exp(w ln 2)
    let u0 = sqrt_pi * (-(a_half + 0.25) * LN_2).exp() * gamma_reciprocal_complex(a_half + 0.75);
    let du0 = -sqrt_pi * (-(a_half - 0.25) * LN_2).exp() * gamma_reciprocal_complex(a_half + 0.25);
    let t = Complex64::new(0.5 * x * x, 0.0);
    let m1 = kummer_m(a_half + 0.25, Complex64::new(0.5, 0.0), t, ctx)?;
    let m2 = kummer_m(a_half + 0.75, Complex64::new(1.5, 0.0), t, ctx)?;
    Ok(u0 * m1 - x * du0 * m2)
}

/// First derivative of [`psi`] with respect to `x`, by the order-shift recurrence
/// `(1/2 + z) Psi(z + 1, x)`.
pub fn d_psi(z: Complex64, x: f64, ctx: &SeriesContext) -> Result<Complex64, MeanfieldError> {
    Ok((0.5 + z) * psi(z + 1.0, x, ctx)?)
}

/// Second derivative of [`psi`] with respect to `x`, by the order-shift recurrence
/// `(1/2 + z)(3/2 + z) Psi(z + 2, x)`.
pub fn d2_psi(z: Complex64, x: f64, ctx: &SeriesContext) -> Result<Complex64, MeanfieldError> {
    Ok((0.5 + z) * (1.5 + z) * psi(z + 2.0, x, ctx)?)
}

/// Difference of the kernel between the threshold and reset arguments.
pub fn psi_diff(
    z: Complex64,
    x_th: f64,
    x_r: f64,
    ctx: &SeriesContext,
) -> Result<Complex64, MeanfieldError> {
    Ok(psi(z, x_th, ctx)? - psi(z, x_r, ctx)?)
}

/// Difference of the kernel derivative between the threshold and reset arguments.
pub fn d_psi_diff(
    z: Complex64,
    x_th: f64,
    x_r: f64,
    ctx: &SeriesContext,
) -> Result<Complex64, MeanfieldError> {
    Ok(d_psi(z, x_th, ctx)? - d_psi(z, x_r, ctx)?)
}

/// Difference of the second kernel derivative between the threshold and reset arguments.
pub fn d2_psi_diff(
    z: Complex64,
    x_th: f64,
    x_r: f64,
    ctx: &SeriesContext,
) -> Result<Complex64, MeanfieldError> {
    Ok(d2_psi(z, x_th, ctx)? - d2_psi(z, x_r, ctx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_phi_at_zero() {
        assert_relative_eq!(phi(0.0), (0.5 * PI).sqrt(), epsilon = 1e-14);
    }

    #[test]
    fn test_phi_branches_agree() {
        let s: f64 = -2.0;
        let direct = (0.5 * PI).sqrt() * (0.5 * s * s).exp() * (1.0 + erf(s / f64::sqrt(2.0)));
        assert_relative_eq!(phi(s), direct, max_relative = 1e-12);
    }

    #[test]
    fn test_phi_far_below_threshold_stays_finite() {
        let value = phi(-30.0);
        assert!(value.is_finite());
        assert!(value > 0.0);
    }

    #[test]
    fn test_erf_complex_matches_real_erf_on_real_axis() {
        for x in [0.25, 0.5, 2.0, 5.0] {
            let z = Complex64::new(x, 1e-18);
            assert_relative_eq!(erf_complex(z).re, erf(x), max_relative = 1e-10);
        }
    }

    #[test]
    fn test_erf_complex_imaginary_axis() {
        // erf(i) = i erfi(1)
        let value = erf_complex(Complex64::new(0.0, 1.0));
        assert_relative_eq!(value.re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(value.im, 1.6504257587975429, max_relative = 1e-10);
    }

    #[test]
    fn test_erf_complex_is_odd() {
        let z = Complex64::new(1.0, 2.0);
        let sum = erf_complex(z) + erf_complex(-z);
        assert!(sum.norm() < 1e-12);
    }

    #[test]
    fn test_gamma_complex_known_values() {
        assert_relative_eq!(gamma_complex(Complex64::new(5.0, 0.0)).re, 24.0, max_relative = 1e-12);
        assert_relative_eq!(
            gamma_complex(Complex64::new(0.5, 0.0)).re,
            PI.sqrt(),
            max_relative = 1e-12
        );
        let g = gamma_complex(Complex64::new(1.0, 1.0));
        assert_relative_eq!(g.re, 0.49801566811835604, max_relative = 1e-10);
        assert_relative_eq!(g.im, -0.15494982830181069, max_relative = 1e-10);
    }

    #[test]
    fn test_reciprocal_gamma_vanishes_at_poles() {
        assert_eq!(gamma_reciprocal_complex(Complex64::new(0.0, 0.0)).norm(), 0.0);
        assert!(gamma_reciprocal_complex(Complex64::new(-1.0, 0.0)).norm() < 1e-15);
    }

    #[test]
    fn test_kummer_m_known_values() {
        let ctx = SeriesContext::default();
        let one = Complex64::new(1.0, 0.0);
        assert_relative_eq!(
            kummer_m(one, one, Complex64::new(2.0, 0.0), &ctx).unwrap().re,
            f64::exp(2.0),
            max_relative = 1e-13
        );
        assert_relative_eq!(
            kummer_m(Complex64::new(0.3, 0.1), one, Complex64::new(0.0, 0.0), &ctx)
                .unwrap()
                .re,
            1.0,
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_psi_reduces_to_elementary_orders() {
        let ctx = SeriesContext::default();
        // U(-1/2, -x) = exp(-x^2/4), so Psi(-1/2, x) = 1
        for x in [0.0, 0.5, 2.0, 5.0] {
            let value = psi(Complex64::new(-0.5, 0.0), x, &ctx).unwrap();
            assert_relative_eq!(value.re, 1.0, max_relative = 1e-12);
            assert_relative_eq!(value.im, 0.0, epsilon = 1e-12);
        }
        // U(-3/2, -x) = -x exp(-x^2/4), so Psi(-3/2, x) = -x
        let value = psi(Complex64::new(-1.5, 0.0), 1.3, &ctx).unwrap();
        assert_relative_eq!(value.re, -1.3, max_relative = 1e-12);
    }

    #[test]
    fn test_psi_order_recurrence() {
        // Psi(z - 1, x) = -x Psi(z, x) + (z + 1/2) Psi(z + 1, x)
        let ctx = SeriesContext::default();
        let z = Complex64::new(-0.5, 0.8);
        let x = 1.3;
        let lhs = psi(z - 1.0, x, &ctx).unwrap();
        let rhs = -x * psi(z, x, &ctx).unwrap() + (z + 0.5) * psi(z + 1.0, x, &ctx).unwrap();
        assert!((lhs - rhs).norm() <= 1e-10 * lhs.norm().max(1.0));
    }

    #[test]
    fn test_d_psi_matches_finite_difference() {
        let ctx = SeriesContext::default();
        let z = Complex64::new(-0.5, 0.6);
        let x = 1.1;
        let h = 1e-5;
        let numeric =
            (psi(z, x + h, &ctx).unwrap() - psi(z, x - h, &ctx).unwrap()) / (2.0 * h);
        let analytic = d_psi(z, x, &ctx).unwrap();
        assert!((numeric - analytic).norm() <= 1e-6 * analytic.norm());
    }

    #[test]
    fn test_psi_diff_vanishes_for_equal_arguments() {
        let ctx = SeriesContext::default();
        let z = Complex64::new(-0.5, 2.1);
        assert_eq!(psi_diff(z, 1.7, 1.7, &ctx).unwrap().norm(), 0.0);
    }
}
