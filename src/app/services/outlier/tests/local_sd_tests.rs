//! Tests for the rolling local SD test

use super::*;
use crate::app::services::outlier::{LocalSd, OutlierTest};
use crate::Error;

#[test]
fn local_spike_is_rejected() {
    // Slow ramp with a spike at position 40
    let mut values: Vec<f64> = (0..80).map(|i| i as f64 * 0.05 + (i % 3) as f64 * 0.02).collect();
    values[40] = 50.0;
    let series = half_hourly("TA", values);

    let test = LocalSd::new(12, 4.0);
    test.validate().unwrap();
    let outcome = test.evaluate(&series, None).unwrap();
    assert!(outcome.rejected.contains(&40));
}

#[test]
fn smooth_ramp_is_untouched() {
    let values: Vec<f64> = (0..60).map(|i| i as f64 * 0.1).collect();
    let series = half_hourly("TA", values);
    let outcome = LocalSd::new(12, 4.0).evaluate(&series, None).unwrap();
    assert!(outcome.rejected.is_empty());
}

#[test]
fn short_series_is_accepted_unchanged() {
    let series = half_hourly("TA", vec![1.0, 2.0]);
    let outcome = LocalSd::new(12, 4.0).evaluate(&series, None).unwrap();
    assert_eq!(outcome.ok.len(), 2);
    assert!(outcome.rejected.is_empty());
}

#[test]
fn invalid_parameters_are_configuration_errors() {
    assert!(matches!(
        LocalSd::new(2, 4.0).validate(),
        Err(Error::Configuration { .. })
    ));
    assert!(matches!(
        LocalSd::new(12, 0.0).validate(),
        Err(Error::Configuration { .. })
    ));
}
