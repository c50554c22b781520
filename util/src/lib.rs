#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

/// Observed orders of convergence `log(e_i / e_{i+1}) / log(h_i / h_{i+1})` between consecutive
/// resolutions.
pub fn convergence_orders(resolutions: &[f64], errors: &[f64]) -> Vec<f64> {
    assert_eq!(
        resolutions.len(),
        errors.len(),
        "Need one error per resolution."
    );
    resolutions
        .windows(2)
        .zip(errors.windows(2))
        .map(|(h, e)| (e[0] / e[1]).ln() / (h[0] / h[1]).ln())
        .collect()
}
