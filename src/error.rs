//! Error module for the Rusty Meanfield library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum MeanfieldError {
    /// Error for invalid parameters, e.g., negative time constants or mismatched matrix shapes.
    InvalidParameter(String),
    /// Convergence error from iterative algorithms, e.g., the fixed-point relaxation or a bracket search.
    DidNotConverge(String),
    /// Error for a numerically degenerate evaluation, e.g., a vanishing boundary difference of the
    /// parabolic cylinder kernel.
    NumericalDegeneracy(String),
    /// Error for a singular matrix encountered while analysing a single frequency slot.
    SingularMatrix { omega: f64, matrix: String },
    /// Error from the dense eigenvalue solver.
    EigensolverFailure(String),
}

impl fmt::Display for MeanfieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MeanfieldError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            MeanfieldError::DidNotConverge(e) => write!(f, "Convergence error: {}", e),
            MeanfieldError::NumericalDegeneracy(e) => write!(f, "Numerical degeneracy: {}", e),
            MeanfieldError::SingularMatrix { omega, matrix } => write!(
                f,
                "Singular {} matrix at angular frequency {} rad/s",
                matrix, omega
            ),
            MeanfieldError::EigensolverFailure(e) => write!(f, "Eigensolver failure: {}", e),
        }
    }
}

impl Error for MeanfieldError {}

/// A failure of a single frequency slot, collected by batch computations over a frequency grid.
///
/// Batch computations do not abort on a bad frequency: the offending slot is filled with NaN
/// (or left empty) and the failure is reported alongside the remaining results.
#[derive(Debug, PartialEq)]
pub struct SlotFailure {
    /// Position of the frequency in the grid.
    pub index: usize,
    /// The angular frequency at which the computation failed.
    pub omega: f64,
    /// The underlying error.
    pub error: MeanfieldError,
}

impl fmt::Display for SlotFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Frequency slot {} (omega = {} rad/s) failed: {}",
            self.index, self.omega, self.error
        )
    }
}
