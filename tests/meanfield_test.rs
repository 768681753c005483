use nalgebra::{DMatrix, DVector};

use rusty_meanfield::delay::delay_matrices;
use rusty_meanfield::params::{
    ConnectivityModel, DelayKind, DelayModel, FrequencyGrid, PopulationParameters,
};
use rusty_meanfield::rates::{solve_working_point, RelaxationConfig};
use rusty_meanfield::siegert::stationary_rate_filtered;
use rusty_meanfield::special::SeriesContext;
use rusty_meanfield::spectra::{
    eigen_spectra, power_spectra, sensitivity_measure, EigenQuantity, EigenSpectrum, MatrixKind,
};
use rusty_meanfield::transfer::{transfer_function, TransferMethod};
use rusty_meanfield::units::{Rate, Time, Voltage};

fn network() -> (PopulationParameters, ConnectivityModel, DelayModel, FrequencyGrid) {
    let params = PopulationParameters::new(
        Time::ms(10.0),
        Time::ms(0.5),
        Time::ms(2.0),
        Voltage::mv(15.0),
        Voltage::mv(0.0),
    )
    .unwrap();

    // Four populations, alternating excitatory and inhibitory columns
    let indegrees = DMatrix::from_row_slice(
        4,
        4,
        &[
            150.0, 80.0, 60.0, 40.0, //
            160.0, 70.0, 50.0, 30.0, //
            120.0, 60.0, 80.0, 50.0, //
            140.0, 90.0, 40.0, 60.0,
        ],
    );
    let weights = DMatrix::from_fn(4, 4, |_, j| if j % 2 == 0 { 0.15 } else { -0.6 });
    let connectivity = ConnectivityModel::new(
        indegrees,
        weights,
        0.15,
        DVector::from_row_slice(&[900.0, 850.0, 950.0, 800.0]),
        Rate::hz(10.0),
        DVector::from_row_slice(&[1000.0, 250.0, 1000.0, 250.0]),
    )
    .unwrap();

    let delays = DelayModel::new(
        DMatrix::from_fn(4, 4, |_, j| if j % 2 == 0 { 1.5e-3 } else { 0.75e-3 }),
        DMatrix::from_fn(4, 4, |_, j| if j % 2 == 0 { 0.75e-3 } else { 0.375e-3 }),
        DelayKind::TruncatedGaussian,
    )
    .unwrap();

    let grid = FrequencyGrid::from_frequencies(5.0, 105.0, 10.0).unwrap();
    (params, connectivity, delays, grid)
}

#[test]
fn test_full_pipeline() {
    let (params, connectivity, delays, grid) = network();
    let ctx = SeriesContext::default();

    // Working point
    let working_point =
        solve_working_point(&params, &connectivity, &RelaxationConfig::default()).unwrap();
    assert!(working_point
        .rates
        .iter()
        .all(|rate| rate.is_finite() && *rate >= 0.0));
    for i in 0..4 {
        let candidate =
            stationary_rate_filtered(&params, working_point.mean[i], working_point.std[i])
                .unwrap();
        assert!((candidate - working_point.rates[i]).abs() < 1e-3);
    }

    // Transfer functions over the grid
    let tf = transfer_function(
        &working_point.mean,
        &working_point.std,
        &params,
        &grid,
        TransferMethod::Shift,
        &ctx,
    )
    .unwrap();
    assert!(tf.failures.is_empty());
    assert_eq!(tf.matrix.nrows(), 4);
    assert_eq!(tf.matrix.ncols(), grid.len());
    assert!(tf
        .matrix
        .iter()
        .all(|value| value.re.is_finite() && value.im.is_finite()));

    // Delay prefactors
    let ddm = delay_matrices(&delays, &grid);
    assert_eq!(ddm.len(), grid.len());
    assert!(ddm
        .iter()
        .flat_map(|matrix| matrix.iter())
        .all(|value| value.norm() <= 1.0 + 1e-9));

    // Power spectra are non-negative spectral magnitudes
    let power = power_spectra(
        &params,
        &connectivity,
        &ddm,
        &working_point,
        &tf.matrix,
        &grid,
    )
    .unwrap();
    assert!(power.failures.is_empty());
    assert_eq!(power.spectra.shape(), (4, grid.len()));
    assert!(power
        .spectra
        .iter()
        .all(|value| value.is_finite() && *value >= 0.0));

    // Eigenvalue spectra for every matrix kind
    for kind in [
        MatrixKind::EffectiveConnectivity,
        MatrixKind::Propagator,
        MatrixKind::InversePropagator,
    ] {
        let spectra = eigen_spectra(
            &params,
            &connectivity,
            &ddm,
            &tf.matrix,
            &grid,
            EigenQuantity::Values,
            kind,
        )
        .unwrap();
        assert!(spectra.failures.is_empty());
        for slot in &spectra.slots {
            match slot {
                Some(EigenSpectrum::Values(values)) => {
                    assert_eq!(values.len(), 4);
                    assert!(values.iter().all(|e| e.re.is_finite() && e.im.is_finite()));
                }
                other => panic!("expected eigenvalues, got {:?}", other),
            }
        }
    }

    // Left and right eigenvectors of the effective connectivity are mutually inverse
    let right = eigen_spectra(
        &params,
        &connectivity,
        &ddm,
        &tf.matrix,
        &grid,
        EigenQuantity::RightVectors,
        MatrixKind::EffectiveConnectivity,
    )
    .unwrap();
    let left = eigen_spectra(
        &params,
        &connectivity,
        &ddm,
        &tf.matrix,
        &grid,
        EigenQuantity::LeftVectors,
        MatrixKind::EffectiveConnectivity,
    )
    .unwrap();
    for (right_slot, left_slot) in right.slots.iter().zip(left.slots.iter()) {
        let (right_mat, left_mat) = match (right_slot, left_slot) {
            (
                Some(EigenSpectrum::RightVectors(right_mat)),
                Some(EigenSpectrum::LeftVectors(left_mat)),
            ) => (right_mat, left_mat),
            other => panic!("expected eigenvector matrices, got {:?}", other),
        };
        let product = left_mat * right_mat.transpose();
        let identity = DMatrix::from_diagonal_element(4, 4, num_complex::Complex64::new(1.0, 0.0));
        assert!((product - identity).norm() < 1e-8);
    }

    // Sensitivity measure of the dominant mode at the first grid frequency
    let omega = grid.omegas()[0];
    let tf_column = tf.matrix.column(0).clone_owned();
    let measure =
        sensitivity_measure(&tf_column, &ddm[0], &connectivity, &params, omega, None).unwrap();
    assert_eq!(measure.shape(), (4, 4));
    assert!(measure
        .iter()
        .all(|value| value.re.is_finite() && value.im.is_finite()));

    let explicit =
        sensitivity_measure(&tf_column, &ddm[0], &connectivity, &params, omega, Some(0))
            .unwrap();
    assert_eq!(explicit.shape(), (4, 4));
}

#[test]
fn test_negative_frequencies_mirror_positive_power() {
    let (params, connectivity, delays, _) = network();
    let ctx = SeriesContext::default();
    let omega = 2.0 * std::f64::consts::PI * 20.0;
    let grid = FrequencyGrid::from_angular(vec![-omega, omega]).unwrap();

    let working_point =
        solve_working_point(&params, &connectivity, &RelaxationConfig::default()).unwrap();
    // The transfer function is evaluated at |omega|; the spectral stage conjugates it
    // for the negative branch
    let half_grid = FrequencyGrid::from_angular(vec![omega]).unwrap();
    let tf = transfer_function(
        &working_point.mean,
        &working_point.std,
        &params,
        &half_grid,
        TransferMethod::Shift,
        &ctx,
    )
    .unwrap();
    let tf_matrix = DMatrix::from_fn(4, 2, |i, _| tf.matrix[(i, 0)]);

    let ddm = delay_matrices(&delays, &grid);
    let power = power_spectra(
        &params,
        &connectivity,
        &ddm,
        &working_point,
        &tf_matrix,
        &grid,
    )
    .unwrap();
    assert!(power.failures.is_empty());
    // Power at -omega equals power at +omega for a real-valued signal
    for i in 0..4 {
        let relative = (power.spectra[(i, 0)] - power.spectra[(i, 1)]).abs()
            / power.spectra[(i, 1)].max(f64::MIN_POSITIVE);
        assert!(relative < 1e-8);
    }
}
