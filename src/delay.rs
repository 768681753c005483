//! Frequency-domain prefactor matrices of the synaptic delay distributions.
use nalgebra::DMatrix;
use num_complex::Complex64;
use rayon::prelude::*;

use crate::params::{DelayKind, DelayModel, FrequencyGrid};
use crate::special::{phi, phi_complex};

/// Minimum number of grid frequencies to parallelize the batch evaluation.
const MIN_FREQS_PAR: usize = 8;

/// Complex delay prefactor matrix at a single angular frequency.
///
/// Encodes the phase `exp(-i omega D)` of the mean delay and, for distributed delays,
/// the attenuation of the delay jitter; the truncated Gaussian kind corrects for the
/// non-negative support.
pub fn delay_matrix(delays: &DelayModel, omega: f64) -> DMatrix<Complex64> {
    let n = delays.dimension();
    let mean = delays.mean();
    let std = delays.std();
    match delays.kind() {
        DelayKind::None => DMatrix::from_fn(n, n, |i, j| {
            Complex64::new(0.0, -omega * mean[(i, j)]).exp()
        }),
        DelayKind::TruncatedGaussian => DMatrix::from_fn(n, n, |i, j| {
            let (d, sd) = (mean[(i, j)], std[(i, j)]);
            let a0 = phi_complex(Complex64::new(-d / sd, omega * sd));
            let a1 = phi(-d / sd);
            let b0 = (-0.5 * (sd * omega).powi(2)).exp();
            let b1 = Complex64::new(0.0, -omega * d).exp();
            (1.0 - a0) / (1.0 - a1) * b0 * b1
        }),
        DelayKind::Gaussian => DMatrix::from_fn(n, n, |i, j| {
            let b0 = (-0.5 * (std[(i, j)] * omega).powi(2)).exp();
            b0 * Complex64::new(0.0, -omega * mean[(i, j)]).exp()
        }),
    }
}

/// Delay prefactor matrices over the whole frequency grid, one matrix per frequency.
pub fn delay_matrices(delays: &DelayModel, grid: &FrequencyGrid) -> Vec<DMatrix<Complex64>> {
    if grid.len() >= MIN_FREQS_PAR {
        grid.omegas()
            .par_iter()
            .map(|omega| delay_matrix(delays, *omega))
            .collect()
    } else {
        grid.omegas()
            .iter()
            .map(|omega| delay_matrix(delays, *omega))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeanfieldError;
    use approx::assert_relative_eq;

    fn model(kind: DelayKind) -> Result<DelayModel, MeanfieldError> {
        let mean = DMatrix::from_row_slice(2, 2, &[1.5e-3, 0.75e-3, 1.5e-3, 0.75e-3]);
        let std = mean.map(|d| 0.5 * d);
        DelayModel::new(mean, std, kind)
    }

    #[test]
    fn test_fixed_delay_at_zero_frequency_is_unity() {
        let delays = model(DelayKind::None).unwrap();
        let matrix = delay_matrix(&delays, 0.0);
        for value in matrix.iter() {
            assert_relative_eq!(value.re, 1.0, epsilon = 1e-15);
            assert_relative_eq!(value.im, 0.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_truncated_gaussian_at_zero_frequency_is_unity() {
        let delays = model(DelayKind::TruncatedGaussian).unwrap();
        let matrix = delay_matrix(&delays, 0.0);
        for value in matrix.iter() {
            assert_relative_eq!(value.re, 1.0, epsilon = 1e-10);
            assert_relative_eq!(value.im, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_fixed_delay_is_pure_phase() {
        let delays = model(DelayKind::None).unwrap();
        let omega = 2.0 * std::f64::consts::PI * 40.0;
        let matrix = delay_matrix(&delays, omega);
        for (value, d) in matrix.iter().zip(delays.mean().iter()) {
            assert_relative_eq!(value.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(value.arg(), -omega * d, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_gaussian_attenuates_with_frequency() {
        let delays = model(DelayKind::Gaussian).unwrap();
        let omega = 2.0 * std::f64::consts::PI * 100.0;
        let matrix = delay_matrix(&delays, omega);
        assert!(matrix.iter().all(|v| v.norm() < 1.0));
    }

    #[test]
    fn test_batch_matches_single_frequency() {
        let delays = model(DelayKind::TruncatedGaussian).unwrap();
        let grid = FrequencyGrid::from_frequencies(10.0, 100.0, 10.0).unwrap();
        let matrices = delay_matrices(&delays, &grid);
        assert_eq!(matrices.len(), grid.len());
        let single = delay_matrix(&delays, grid.omegas()[3]);
        assert_eq!(matrices[3], single);
    }
}
