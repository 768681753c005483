//! Network, delay and analysis parameter structures with fail-fast validation.
use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::MeanfieldError;
use crate::units::{Rate, Time, Voltage};

/// Physical constants of a single population of leaky integrate-and-fire neurons.
///
/// All populations of a network share these constants; the per-population state (mean input,
/// input fluctuation, firing rate) lives in [`crate::rates::WorkingPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationParameters {
    tau_m: Time,
    tau_s: Time,
    tau_r: Time,
    v_th: Voltage,
    v_0: Voltage,
}

impl PopulationParameters {
    /// Create a new parameter set.
    ///
    /// Time constants must be non-negative and the relative threshold must lie strictly above
    /// the relative reset potential.
    pub fn new(
        tau_m: Time,
        tau_s: Time,
        tau_r: Time,
        v_th: Voltage,
        v_0: Voltage,
    ) -> Result<Self, MeanfieldError> {
        if tau_m.as_s() < 0.0 || tau_s.as_s() < 0.0 || tau_r.as_s() < 0.0 {
            return Err(MeanfieldError::InvalidParameter(
                "Time constants must be non-negative".to_string(),
            ));
        }
        if tau_m.as_s() == 0.0 {
            return Err(MeanfieldError::InvalidParameter(
                "The membrane time constant must be positive".to_string(),
            ));
        }
        if v_th.as_mv() <= v_0.as_mv() {
            return Err(MeanfieldError::InvalidParameter(format!(
                "The relative threshold ({}) must lie above the relative reset potential ({})",
                v_th, v_0
            )));
        }
        Ok(PopulationParameters {
            tau_m,
            tau_s,
            tau_r,
            v_th,
            v_0,
        })
    }

    /// The membrane time constant.
    pub fn tau_m(&self) -> Time {
        self.tau_m
    }

    /// The synaptic time constant.
    pub fn tau_s(&self) -> Time {
        self.tau_s
    }

    /// The refractory time.
    pub fn tau_r(&self) -> Time {
        self.tau_r
    }

    /// The relative threshold potential.
    pub fn v_th(&self) -> Voltage {
        self.v_th
    }

    /// The relative reset potential.
    pub fn v_0(&self) -> Voltage {
        self.v_0
    }
}

/// Recurrent and external connectivity of the network.
///
/// The indegree matrix `K` counts synapses from source population `j` onto a neuron of target
/// population `i`, the weight matrix `J` holds the corresponding post-synaptic amplitudes in
/// millivolts. External drive is Poisson-like with rate `ext_rate` through `ext_indegrees`
/// synapses of weight `weight`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityModel {
    indegrees: DMatrix<f64>,
    weights: DMatrix<f64>,
    weight: f64,
    ext_indegrees: DVector<f64>,
    ext_rate: Rate,
    population_sizes: DVector<f64>,
}

impl ConnectivityModel {
    pub fn new(
        indegrees: DMatrix<f64>,
        weights: DMatrix<f64>,
        weight: f64,
        ext_indegrees: DVector<f64>,
        ext_rate: Rate,
        population_sizes: DVector<f64>,
    ) -> Result<Self, MeanfieldError> {
        let n = indegrees.nrows();
        if indegrees.ncols() != n {
            return Err(MeanfieldError::InvalidParameter(
                "The indegree matrix must be square".to_string(),
            ));
        }
        if weights.shape() != (n, n) {
            return Err(MeanfieldError::InvalidParameter(
                "The indegree and weight matrices must have identical shape".to_string(),
            ));
        }
        if ext_indegrees.len() != n || population_sizes.len() != n {
            return Err(MeanfieldError::InvalidParameter(
                "External indegrees and population sizes must have one entry per population"
                    .to_string(),
            ));
        }
        if indegrees.iter().any(|k| *k < 0.0) || ext_indegrees.iter().any(|k| *k < 0.0) {
            return Err(MeanfieldError::InvalidParameter(
                "Indegrees must be non-negative".to_string(),
            ));
        }
        if population_sizes.iter().any(|s| *s <= 0.0) {
            return Err(MeanfieldError::InvalidParameter(
                "Population sizes must be positive".to_string(),
            ));
        }
        if ext_rate.as_hz() < 0.0 {
            return Err(MeanfieldError::InvalidParameter(
                "The external rate must be non-negative".to_string(),
            ));
        }
        Ok(ConnectivityModel {
            indegrees,
            weights,
            weight,
            ext_indegrees,
            ext_rate,
            population_sizes,
        })
    }

    /// The number of populations.
    pub fn dimension(&self) -> usize {
        self.indegrees.nrows()
    }

    /// The indegree matrix `K`.
    pub fn indegrees(&self) -> &DMatrix<f64> {
        &self.indegrees
    }

    /// The synaptic weight matrix `J` in millivolts.
    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    /// The external synaptic weight `j` in millivolts.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// The external indegree vector `K_ext`.
    pub fn ext_indegrees(&self) -> &DVector<f64> {
        &self.ext_indegrees
    }

    /// The rate of the external drive.
    pub fn ext_rate(&self) -> Rate {
        self.ext_rate
    }

    /// The number of neurons per population.
    pub fn population_sizes(&self) -> &DVector<f64> {
        &self.population_sizes
    }
}

/// The distribution family of the synaptic transmission delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayKind {
    /// A fixed delay per connection.
    None,
    /// Gaussian delays truncated to non-negative support.
    TruncatedGaussian,
    /// Gaussian delays with unbounded support.
    Gaussian,
}

/// Synaptic delay statistics, one mean and one standard deviation per connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayModel {
    mean: DMatrix<f64>,
    std: DMatrix<f64>,
    kind: DelayKind,
}

impl DelayModel {
    /// Create a new delay model. Matrices are in seconds and must share their shape; the
    /// truncated Gaussian kind requires strictly positive standard deviations.
    pub fn new(
        mean: DMatrix<f64>,
        std: DMatrix<f64>,
        kind: DelayKind,
    ) -> Result<Self, MeanfieldError> {
        if mean.shape() != std.shape() || mean.nrows() != mean.ncols() {
            return Err(MeanfieldError::InvalidParameter(
                "Delay mean and standard deviation must be square matrices of identical shape"
                    .to_string(),
            ));
        }
        if std.iter().any(|s| *s < 0.0) {
            return Err(MeanfieldError::InvalidParameter(
                "Delay standard deviations must be non-negative".to_string(),
            ));
        }
        if kind == DelayKind::TruncatedGaussian && std.iter().any(|s| *s == 0.0) {
            return Err(MeanfieldError::InvalidParameter(
                "Truncated Gaussian delays require strictly positive standard deviations"
                    .to_string(),
            ));
        }
        Ok(DelayModel { mean, std, kind })
    }

    /// The number of populations.
    pub fn dimension(&self) -> usize {
        self.mean.nrows()
    }

    /// The mean delay matrix in seconds.
    pub fn mean(&self) -> &DMatrix<f64> {
        &self.mean
    }

    /// The delay standard deviation matrix in seconds.
    pub fn std(&self) -> &DMatrix<f64> {
        &self.std
    }

    /// The delay distribution kind.
    pub fn kind(&self) -> DelayKind {
        self.kind
    }
}

/// An ordered grid of angular frequencies, read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyGrid {
    omegas: Vec<f64>,
}

impl FrequencyGrid {
    /// Build the grid from regular frequencies in hertz: a half-open range
    /// `[f_min, f_max)` sampled every `df`, converted to angular frequencies.
    pub fn from_frequencies(f_min: f64, f_max: f64, df: f64) -> Result<Self, MeanfieldError> {
        if df <= 0.0 {
            return Err(MeanfieldError::InvalidParameter(
                "The frequency step must be positive".to_string(),
            ));
        }
        if f_max <= f_min {
            return Err(MeanfieldError::InvalidParameter(
                "The maximum frequency must lie above the minimum frequency".to_string(),
            ));
        }
        let (w_min, dw) = (2.0 * PI * f_min, 2.0 * PI * df);
        let steps = ((f_max - f_min) / df).ceil() as usize;
        let omegas = (0..steps)
            .map(|k| w_min + k as f64 * dw)
            .filter(|w| *w < 2.0 * PI * f_max)
            .collect();
        Ok(FrequencyGrid { omegas })
    }

    /// Build the grid directly from angular frequencies in rad/s.
    pub fn from_angular(omegas: Vec<f64>) -> Result<Self, MeanfieldError> {
        if omegas.is_empty() {
            return Err(MeanfieldError::InvalidParameter(
                "The frequency grid must contain at least one frequency".to_string(),
            ));
        }
        Ok(FrequencyGrid { omegas })
    }

    /// The angular frequencies in rad/s.
    pub fn omegas(&self) -> &[f64] {
        &self.omegas
    }

    /// The number of frequencies.
    pub fn len(&self) -> usize {
        self.omegas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.omegas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn valid_population() -> PopulationParameters {
        PopulationParameters::new(
            Time::ms(10.0),
            Time::ms(0.5),
            Time::ms(2.0),
            Voltage::mv(15.0),
            Voltage::mv(0.0),
        )
        .unwrap()
    }

    #[test]
    fn test_population_validation() {
        assert!(PopulationParameters::new(
            Time::ms(-1.0),
            Time::ms(0.5),
            Time::ms(2.0),
            Voltage::mv(15.0),
            Voltage::mv(0.0),
        )
        .is_err());
        assert!(PopulationParameters::new(
            Time::ms(10.0),
            Time::ms(0.5),
            Time::ms(2.0),
            Voltage::mv(0.0),
            Voltage::mv(15.0),
        )
        .is_err());
        assert_relative_eq!(valid_population().tau_m().as_s(), 0.01, epsilon = 1e-15);
    }

    #[test]
    fn test_connectivity_shape_validation() {
        let k = DMatrix::from_element(2, 2, 100.0);
        let j = DMatrix::from_element(2, 3, 0.1);
        assert!(ConnectivityModel::new(
            k,
            j,
            0.1,
            DVector::from_element(2, 1000.0),
            Rate::hz(8.0),
            DVector::from_element(2, 1000.0),
        )
        .is_err());
    }

    #[test]
    fn test_frequency_grid() {
        let grid = FrequencyGrid::from_frequencies(0.0, 100.0, 10.0).unwrap();
        assert_eq!(grid.len(), 10);
        assert_relative_eq!(grid.omegas()[1], 2.0 * PI * 10.0, epsilon = 1e-12);
        assert!(grid.omegas().iter().all(|w| *w < 2.0 * PI * 100.0));

        assert!(FrequencyGrid::from_frequencies(10.0, 10.0, 1.0).is_err());
        assert!(FrequencyGrid::from_frequencies(0.0, 10.0, 0.0).is_err());
    }

    #[test]
    fn test_truncated_gaussian_requires_positive_sd() {
        let mean = DMatrix::from_element(2, 2, 1.5e-3);
        let std = DMatrix::from_element(2, 2, 0.0);
        assert!(DelayModel::new(mean.clone(), std.clone(), DelayKind::Gaussian).is_ok());
        assert!(DelayModel::new(mean, std, DelayKind::TruncatedGaussian).is_err());
    }

    #[test]
    fn test_connectivity_serde_round_trip() {
        let conn = ConnectivityModel::new(
            DMatrix::from_element(2, 2, 100.0),
            DMatrix::from_element(2, 2, 0.1),
            0.1,
            DVector::from_element(2, 1000.0),
            Rate::hz(8.0),
            DVector::from_element(2, 1000.0),
        )
        .unwrap();
        let json = serde_json::to_string(&conn).unwrap();
        let back: ConnectivityModel = serde_json::from_str(&json).unwrap();
        assert_eq!(conn, back);
    }
}
