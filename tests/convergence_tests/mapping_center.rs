//! The pseudo-Cartesian center matrix of an interpolated mapping converges to that of the
//! analytical mapping.
use super::{cubic_builder, ErrorSummary};
use polar_poisson::mapping::{CurvilinearToCartesian, CzarnyToCartesian, DiscreteToCartesianBuilder};

#[test]
fn discrete_czarny_center_matrix_converges() {
    let mapping = CzarnyToCartesian::new(0.3, 1.4);
    let exact = mapping.pseudo_cartesian_jacobian_center_matrix();

    let resolutions = [16, 32, 64, 128];
    let errors: Vec<f64> = resolutions
        .iter()
        .map(|&nr| {
            let discrete = DiscreteToCartesianBuilder::new(cubic_builder(nr))
                .build(&mapping)
                .unwrap();
            (discrete.pseudo_cartesian_jacobian_center_matrix() - exact).amax()
        })
        .collect();
    let h = resolutions.iter().map(|&nr| 1.0 / nr as f64).collect();
    let summary = ErrorSummary::new("czarny_center_matrix", h, errors);
    summary.write_to_data_dir().unwrap();

    for window in summary.errors.windows(2) {
        assert!(window[1] < window[0], "errors do not decrease: {:?}", summary.errors);
    }
    assert_eq!(summary.orders.len(), resolutions.len() - 1);
    for &order in &summary.orders {
        assert!((order - 4.0).abs() <= 0.25, "observed orders {:?}", summary.orders);
    }
}
