//! This crate provides mean-field tools for networks of leaky integrate-and-fire (LIF)
//! neuron populations under the diffusion approximation: stationary firing rates,
//! linear-response transfer functions, and the spectral properties of the linearized
//! network dynamics.
//!
//! # Finding the Working Point
//!
//! ```rust
//! use nalgebra::{DMatrix, DVector};
//! use rusty_meanfield::params::{ConnectivityModel, PopulationParameters};
//! use rusty_meanfield::rates::{solve_working_point, RelaxationConfig};
//! use rusty_meanfield::units::{Rate, Time, Voltage};
//!
//! // One excitatory and one inhibitory population
//! let params = PopulationParameters::new(
//!     Time::ms(10.0),
//!     Time::ms(0.5),
//!     Time::ms(2.0),
//!     Voltage::mv(15.0),
//!     Voltage::mv(0.0),
//! ).unwrap();
//! let connectivity = ConnectivityModel::new(
//!     DMatrix::from_row_slice(2, 2, &[200.0, 100.0, 200.0, 100.0]),
//!     DMatrix::from_row_slice(2, 2, &[0.2, -0.8, 0.2, -0.8]),
//!     0.2,
//!     DVector::from_element(2, 800.0),
//!     Rate::hz(8.0),
//!     DVector::from_row_slice(&[800.0, 200.0]),
//! ).unwrap();
//!
//! // Iterate the self-consistency loop to the stationary rates
//! let working_point = solve_working_point(&params, &connectivity, &RelaxationConfig::default()).unwrap();
//! assert!(working_point.rates.iter().all(|rate| rate.is_finite() && *rate >= 0.0));
//! ```
//!
//! # Analysing Spectra
//!
//! ```rust
//! use nalgebra::{DMatrix, DVector};
//! use rusty_meanfield::delay::delay_matrices;
//! use rusty_meanfield::params::{
//!     ConnectivityModel, DelayKind, DelayModel, FrequencyGrid, PopulationParameters,
//! };
//! use rusty_meanfield::rates::{solve_working_point, RelaxationConfig};
//! use rusty_meanfield::spectra::power_spectra;
//! use rusty_meanfield::special::SeriesContext;
//! use rusty_meanfield::transfer::{transfer_function, TransferMethod};
//! use rusty_meanfield::units::{Rate, Time, Voltage};
//!
//! let params = PopulationParameters::new(
//!     Time::ms(10.0),
//!     Time::ms(0.5),
//!     Time::ms(2.0),
//!     Voltage::mv(15.0),
//!     Voltage::mv(0.0),
//! ).unwrap();
//! let connectivity = ConnectivityModel::new(
//!     DMatrix::from_row_slice(2, 2, &[200.0, 100.0, 200.0, 100.0]),
//!     DMatrix::from_row_slice(2, 2, &[0.2, -0.8, 0.2, -0.8]),
//!     0.2,
//!     DVector::from_element(2, 800.0),
//!     Rate::hz(8.0),
//!     DVector::from_row_slice(&[800.0, 200.0]),
//! ).unwrap();
//! let delays = DelayModel::new(
//!     DMatrix::from_element(2, 2, 1.5e-3),
//!     DMatrix::from_element(2, 2, 0.75e-3),
//!     DelayKind::TruncatedGaussian,
//! ).unwrap();
//! let grid = FrequencyGrid::from_frequencies(10.0, 60.0, 10.0).unwrap();
//!
//! let working_point = solve_working_point(&params, &connectivity, &RelaxationConfig::default()).unwrap();
//! let ctx = SeriesContext::default();
//! let tf = transfer_function(
//!     &working_point.mean,
//!     &working_point.std,
//!     &params,
//!     &grid,
//!     TransferMethod::Shift,
//!     &ctx,
//! ).unwrap();
//! let ddm = delay_matrices(&delays, &grid);
//!
//! let power = power_spectra(&params, &connectivity, &ddm, &working_point, &tf.matrix, &grid).unwrap();
//! assert!(power.failures.is_empty());
//! assert!(power.spectra.iter().all(|value| *value >= 0.0));
//! ```

pub mod delay;
pub mod error;
pub mod linalg;
pub mod params;
pub mod rates;
pub mod siegert;
pub mod special;
pub mod spectra;
pub mod transfer;
pub mod units;
