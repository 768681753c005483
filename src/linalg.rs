//! Dense complex eigen-machinery for the spectral analysis stage.
//!
//! Eigenvalues come from the dense solver in [`faer`]; right eigenvectors are recovered
//! by shifted inverse iteration seeded from a deterministic random start vector, with
//! Gram-Schmidt deflation inside clusters of nearly equal eigenvalues.
use faer::Mat;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::MeanfieldError;

/// Seed of the inverse-iteration start vectors.
const START_VECTOR_SEED: u64 = 42;
/// Maximum number of inverse-iteration steps per eigenvector.
const MAX_ITER_INVERSE: usize = 50;
/// Maximum number of shift perturbations before giving up on an eigenvector.
const MAX_SHIFT_ATTEMPTS: usize = 4;
/// Relative residual tolerance for an eigenpair to be accepted.
const RESIDUAL_TOL: f64 = 1e-10;
/// Relative eigenvalue distance below which two eigenvalues share a cluster.
const CLUSTER_TOL: f64 = 1e-8;
/// Initial relative offset of the inverse-iteration shift from the eigenvalue.
const SHIFT_EPS: f64 = 1e-12;

/// Eigenvalues of a dense complex matrix, in the order returned by the solver.
pub fn eigenvalues(matrix: &DMatrix<Complex64>) -> Result<DVector<Complex64>, MeanfieldError> {
    let n = matrix.nrows();
    let a: Mat<Complex64> = Mat::from_fn(n, n, |i, j| matrix[(i, j)]);
    let values = a.as_ref().eigenvalues().map_err(|e| {
        MeanfieldError::EigensolverFailure(format!(
            "Failed to compute the eigenvalues of the matrix: {:?}",
            e
        ))
    })?;
    Ok(DVector::from_vec(values))
}

/// Eigenvalues and right eigenvectors of a dense complex matrix.
///
/// Returns the eigenvalue vector and the matrix whose columns are the corresponding unit
/// eigenvectors. No ordering of the eigenvalues is imposed.
pub fn eigendecomposition(
    matrix: &DMatrix<Complex64>,
) -> Result<(DVector<Complex64>, DMatrix<Complex64>), MeanfieldError> {
    let n = matrix.nrows();
    let values = eigenvalues(matrix)?;
    let mut vectors = DMatrix::<Complex64>::zeros(n, n);
    let mut rng = StdRng::seed_from_u64(START_VECTOR_SEED);
    let scale = matrix.norm().max(1.0);

    for k in 0..n {
        let lambda = values[k];
        // Previously resolved eigenvectors of (nearly) the same eigenvalue must be
        // deflated away, otherwise the iteration reproduces them
        let cluster: Vec<usize> = (0..k)
            .filter(|j| (values[*j] - lambda).norm() <= CLUSTER_TOL * (1.0 + lambda.norm()))
            .collect();

        let mut v = random_unit_vector(n, &mut rng);
        let mut shift_eps = SHIFT_EPS;
        let mut converged = false;

        'shifts: for _ in 0..MAX_SHIFT_ATTEMPTS {
            let shift = lambda + Complex64::new(shift_eps * (1.0 + lambda.norm()), 0.0);
            let shifted = matrix - DMatrix::<Complex64>::identity(n, n) * shift;
            let lu = shifted.lu();

            for _ in 0..MAX_ITER_INVERSE {
                let mut w = match lu.solve(&v) {
                    Some(w) => w,
                    None => {
                        shift_eps *= 10.0;
                        continue 'shifts;
                    }
                };
                for j in &cluster {
                    let proj = vectors.column(*j).dotc(&w);
                    w -= vectors.column(*j) * proj;
                }
                let norm = w.norm();
                if norm == 0.0 {
                    v = random_unit_vector(n, &mut rng);
                    shift_eps *= 10.0;
                    continue 'shifts;
                }
                v = w.unscale(norm);
                let residual = (matrix * &v - &v * lambda).norm();
                log::trace!(
                    "Inverse iteration for eigenvalue {}: residual {}",
                    lambda,
                    residual
                );
                if residual <= RESIDUAL_TOL * scale {
                    converged = true;
                    break 'shifts;
                }
            }
            shift_eps *= 10.0;
        }

        if !converged {
            return Err(MeanfieldError::DidNotConverge(format!(
                "Inverse iteration did not converge for eigenvalue {}",
                lambda
            )));
        }
        vectors.set_column(k, &v);
    }

    Ok((values, vectors))
}

fn random_unit_vector<R: Rng>(n: usize, rng: &mut R) -> DVector<Complex64> {
    let v = DVector::from_fn(n, |_, _| {
        Complex64::new(rng.gen::<f64>() - 0.5, rng.gen::<f64>() - 0.5)
    });
    let norm = v.norm();
    v.unscale(norm)
}
