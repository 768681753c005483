//! Spectral analysis of the linearized network dynamics: effective connectivity,
//! sensitivity measure, power spectra and eigenvalue spectra per frequency.
use std::fmt;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use rayon::prelude::*;

use crate::error::{MeanfieldError, SlotFailure};
use crate::linalg;
use crate::params::{ConnectivityModel, FrequencyGrid, PopulationParameters};
use crate::rates::WorkingPoint;

/// Minimum number of grid frequencies to parallelize the batch evaluation.
const MIN_FREQS_PAR: usize = 8;

/// The matrix whose spectrum is analysed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixKind {
    /// The effective connectivity matrix `MH`.
    EffectiveConnectivity,
    /// The propagator `(I - MH)^-1 MH`.
    Propagator,
    /// The inverse of the propagator.
    InversePropagator,
}

impl fmt::Display for MatrixKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MatrixKind::EffectiveConnectivity => write!(f, "effective connectivity"),
            MatrixKind::Propagator => write!(f, "propagator"),
            MatrixKind::InversePropagator => write!(f, "inverse propagator"),
        }
    }
}

/// The quantity extracted from the eigendecomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EigenQuantity {
    /// Eigenvalues only.
    Values,
    /// Right eigenvectors, one per row.
    RightVectors,
    /// Left eigenvectors (the inverse of the right eigenvector matrix).
    LeftVectors,
}

/// Eigendecomposition output of a single frequency slot.
#[derive(Debug, Clone, PartialEq)]
pub enum EigenSpectrum {
    Values(DVector<Complex64>),
    RightVectors(DMatrix<Complex64>),
    LeftVectors(DMatrix<Complex64>),
}

/// Eigenvalue spectra over the frequency grid.
///
/// One slot per grid frequency; failed slots are `None` and reported in `failures`.
/// No ordering of the eigenvalues is imposed and mode identity is not tracked across
/// frequencies, so crossing modes may appear as discontinuities between neighbouring
/// slots.
#[derive(Debug)]
pub struct EigenSpectra {
    pub slots: Vec<Option<EigenSpectrum>>,
    pub failures: Vec<SlotFailure>,
}

/// Population power spectra over the frequency grid.
#[derive(Debug)]
pub struct PowerSpectra {
    /// Spectral magnitude per population (rows) and grid frequency (columns). Columns of
    /// failed frequency slots are filled with NaN.
    pub spectra: DMatrix<f64>,
    /// Failures of individual frequency slots.
    pub failures: Vec<SlotFailure>,
}

/// The effective connectivity matrix `MH` at a single angular frequency.
///
/// Combines the transfer functions (one per population, conjugated for negative
/// frequencies), the synaptic weights and the delay prefactors:
/// `MH_ij = tau_m T_i / (1 + i omega tau_s) J_ij D_ij`.
pub fn effective_connectivity(
    transfer: &DVector<Complex64>,
    delay: &DMatrix<Complex64>,
    connectivity: &ConnectivityModel,
    params: &PopulationParameters,
    omega: f64,
) -> DMatrix<Complex64> {
    linear_response_matrix(transfer, delay, connectivity, params, omega, false)
}

fn linear_response_matrix(
    transfer: &DVector<Complex64>,
    delay: &DMatrix<Complex64>,
    connectivity: &ConnectivityModel,
    params: &PopulationParameters,
    omega: f64,
    with_indegrees: bool,
) -> DMatrix<Complex64> {
    let tau_m = params.tau_m().as_s();
    let tau_s = params.tau_s().as_s();
    let denominator = Complex64::new(1.0, omega * tau_s);
    let n = transfer.len();
    DMatrix::from_fn(n, n, |i, j| {
        let tf = if omega < 0.0 {
            transfer[i].conj()
        } else {
            transfer[i]
        };
        let gain = tau_m * tf / denominator;
        let coupling = if with_indegrees {
            connectivity.weights()[(i, j)] * connectivity.indegrees()[(i, j)]
        } else {
            connectivity.weights()[(i, j)]
        };
        gain * coupling * delay[(i, j)]
    })
}

/// Index of the eigenvalue closest to one, by value; the first index wins exact ties.
pub fn critical_mode_index(values: &DVector<Complex64>) -> usize {
    let mut index = 0;
    let mut best = f64::INFINITY;
    for (i, value) in values.iter().enumerate() {
        let distance = (*value - 1.0).norm();
        if distance < best {
            best = distance;
            index = i;
        }
    }
    index
}

/// Sensitivity measure of the dominant (or requested) eigenmode at one frequency.
///
/// Projects the effective connectivity onto a single eigenmode: with right eigenvector
/// `u_k` and left eigenvector `v_k` of `MH`, the measure is the rank-one projector
/// `(v_k ⊗ u_k) / (v_k · u_k)` scaled elementwise by `MH`. The mode is selected by value
/// (eigenvalue closest to one) unless an explicit index is supplied, so the result does
/// not depend on the ordering produced by the eigensolver.
pub fn sensitivity_measure(
    transfer: &DVector<Complex64>,
    delay: &DMatrix<Complex64>,
    connectivity: &ConnectivityModel,
    params: &PopulationParameters,
    omega: f64,
    mode: Option<usize>,
) -> Result<DMatrix<Complex64>, MeanfieldError> {
    let mh = effective_connectivity(transfer, delay, connectivity, params, omega);
    let (values, vectors) = linalg::eigendecomposition(&mh)?;
    let inverse = vectors
        .clone()
        .try_inverse()
        .ok_or_else(|| MeanfieldError::SingularMatrix {
            omega,
            matrix: "right eigenvector".to_string(),
        })?;

    let k = match mode {
        Some(k) if k < values.len() => k,
        Some(k) => {
            return Err(MeanfieldError::InvalidParameter(format!(
                "Mode index {} out of range for {} populations",
                k,
                values.len()
            )))
        }
        None => critical_mode_index(&values),
    };
    log::debug!(
        "Sensitivity measure at omega = {} rad/s projects on eigenvalue {}",
        omega,
        values[k]
    );

    let left = inverse.row(k);
    let right = vectors.column(k);
    let scale = (left * right)[(0, 0)];
    let n = mh.nrows();
    Ok(DMatrix::from_fn(n, n, |i, j| {
        left[i] * right[j] / scale * mh[(i, j)]
    }))
}

/// Population power spectra over the frequency grid.
///
/// Per frequency, the indegree-scaled effective connectivity `MH` yields the propagator
/// inverse `Q = (I - MH)^-1`, which shapes the rate/size noise floor
/// `D = diag(nu_i / N_i)` into `C = Q D Q^H`; the spectrum is `|diag(C)|`. A singular
/// `(I - MH)` fails only its own frequency slot.
pub fn power_spectra(
    params: &PopulationParameters,
    connectivity: &ConnectivityModel,
    delay_matrices: &[DMatrix<Complex64>],
    working_point: &WorkingPoint,
    transfer: &DMatrix<Complex64>,
    grid: &FrequencyGrid,
) -> Result<PowerSpectra, MeanfieldError> {
    validate_batch_shapes(transfer, delay_matrices, grid, connectivity.dimension())?;
    let dimension = connectivity.dimension();
    if working_point.rates.len() != dimension {
        return Err(MeanfieldError::InvalidParameter(
            "Working point and connectivity have mismatched dimensions".to_string(),
        ));
    }

    let column = |index: usize| -> Result<DVector<f64>, MeanfieldError> {
        let omega = grid.omegas()[index];
        let tf = transfer.column(index).clone_owned();
        let mh = linear_response_matrix(
            &tf,
            &delay_matrices[index],
            connectivity,
            params,
            omega,
            true,
        );
        let q = (DMatrix::<Complex64>::identity(dimension, dimension) - mh)
            .try_inverse()
            .ok_or_else(|| MeanfieldError::SingularMatrix {
                omega,
                matrix: MatrixKind::Propagator.to_string(),
            })?;
        let noise = DMatrix::from_diagonal(&DVector::from_fn(dimension, |i, _| {
            Complex64::new(
                working_point.rates[i] / connectivity.population_sizes()[i],
                0.0,
            )
        }));
        let covariance = &q * noise * q.adjoint();
        Ok(DVector::from_fn(dimension, |i, _| {
            covariance[(i, i)].norm()
        }))
    };

    let columns: Vec<Result<DVector<f64>, MeanfieldError>> = if grid.len() >= MIN_FREQS_PAR {
        (0..grid.len()).into_par_iter().map(column).collect()
    } else {
        (0..grid.len()).map(column).collect()
    };

    let mut spectra = DMatrix::from_element(dimension, grid.len(), f64::NAN);
    let mut failures = Vec::new();
    for (index, result) in columns.into_iter().enumerate() {
        match result {
            Ok(values) => spectra.set_column(index, &values),
            Err(error) => {
                log::warn!("{}", error);
                failures.push(SlotFailure {
                    index,
                    omega: grid.omegas()[index],
                    error,
                });
            }
        }
    }
    Ok(PowerSpectra { spectra, failures })
}

/// Eigenvalue spectra of the requested matrix kind over the frequency grid.
///
/// A singular matrix fails only its own frequency slot. Eigenvalues are not sorted and
/// mode identity is not tracked across frequencies.
pub fn eigen_spectra(
    params: &PopulationParameters,
    connectivity: &ConnectivityModel,
    delay_matrices: &[DMatrix<Complex64>],
    transfer: &DMatrix<Complex64>,
    grid: &FrequencyGrid,
    quantity: EigenQuantity,
    matrix: MatrixKind,
) -> Result<EigenSpectra, MeanfieldError> {
    validate_batch_shapes(transfer, delay_matrices, grid, connectivity.dimension())?;
    let dimension = connectivity.dimension();

    let slot = |index: usize| -> Result<EigenSpectrum, MeanfieldError> {
        let omega = grid.omegas()[index];
        let tf = transfer.column(index).clone_owned();
        let mh = linear_response_matrix(
            &tf,
            &delay_matrices[index],
            connectivity,
            params,
            omega,
            false,
        );
        let target = match matrix {
            MatrixKind::EffectiveConnectivity => mh,
            MatrixKind::Propagator | MatrixKind::InversePropagator => {
                let q = (DMatrix::<Complex64>::identity(dimension, dimension) - &mh)
                    .try_inverse()
                    .ok_or_else(|| MeanfieldError::SingularMatrix {
                        omega,
                        matrix: matrix.to_string(),
                    })?;
                let propagator = q * mh;
                if matrix == MatrixKind::Propagator {
                    propagator
                } else {
                    propagator
                        .try_inverse()
                        .ok_or_else(|| MeanfieldError::SingularMatrix {
                            omega,
                            matrix: matrix.to_string(),
                        })?
                }
            }
        };

        match quantity {
            EigenQuantity::Values => Ok(EigenSpectrum::Values(linalg::eigenvalues(&target)?)),
            EigenQuantity::RightVectors => {
                let (_, vectors) = linalg::eigendecomposition(&target)?;
                Ok(EigenSpectrum::RightVectors(vectors.transpose()))
            }
            EigenQuantity::LeftVectors => {
                let (_, vectors) = linalg::eigendecomposition(&target)?;
                let left =
                    vectors
                        .try_inverse()
                        .ok_or_else(|| MeanfieldError::SingularMatrix {
                            omega,
                            matrix: "right eigenvector".to_string(),
                        })?;
                Ok(EigenSpectrum::LeftVectors(left))
            }
        }
    };

    let results: Vec<Result<EigenSpectrum, MeanfieldError>> = if grid.len() >= MIN_FREQS_PAR {
        (0..grid.len()).into_par_iter().map(slot).collect()
    } else {
        (0..grid.len()).map(slot).collect()
    };

    let mut slots = Vec::with_capacity(grid.len());
    let mut failures = Vec::new();
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(spectrum) => slots.push(Some(spectrum)),
            Err(error) => {
                log::warn!("{}", error);
                slots.push(None);
                failures.push(SlotFailure {
                    index,
                    omega: grid.omegas()[index],
                    error,
                });
            }
        }
    }
    Ok(EigenSpectra { slots, failures })
}

fn validate_batch_shapes(
    transfer: &DMatrix<Complex64>,
    delay_matrices: &[DMatrix<Complex64>],
    grid: &FrequencyGrid,
    dimension: usize,
) -> Result<(), MeanfieldError> {
    if transfer.nrows() != dimension
        || transfer.ncols() != grid.len()
        || delay_matrices.len() != grid.len()
        || delay_matrices
            .iter()
            .any(|d| d.shape() != (dimension, dimension))
    {
        return Err(MeanfieldError::InvalidParameter(
            "Transfer functions, delay matrices and frequency grid have mismatched shapes"
                .to_string(),
        ));
    }
    Ok(())
}
