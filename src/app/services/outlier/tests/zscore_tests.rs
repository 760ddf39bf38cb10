//! Tests for z-score outlier tests

use super::*;
use crate::app::services::outlier::{OutlierTest, ZScore, ZScoreIncrements, ZScoreIqr};
use crate::Error;

/// 100 well-behaved values plus one far outlier at position 50
fn series_with_outlier() -> crate::app::models::TimeSeries {
    let mut values: Vec<f64> = (0..100).map(|i| 10.0 + (i % 7) as f64 * 0.5).collect();
    values[50] = 500.0;
    half_hourly("TA", values)
}

#[test]
fn well_separated_outlier_is_rejected() {
    let series = series_with_outlier();
    let outcome = ZScore::new(4.0).evaluate(&series, None).unwrap();
    assert_eq!(outcome.rejected, vec![50]);
    assert_eq!(outcome.ok.len(), 99);
}

#[test]
fn constant_series_has_no_rejections() {
    let series = half_hourly("TA", vec![5.0; 20]);
    let outcome = ZScore::new(4.0).evaluate(&series, None).unwrap();
    assert!(outcome.rejected.is_empty());
    assert_eq!(outcome.ok.len(), 20);
}

#[test]
fn nonpositive_threshold_is_a_configuration_error() {
    assert!(matches!(
        ZScore::new(0.0).validate(),
        Err(Error::Configuration { .. })
    ));
    assert!(matches!(
        ZScore::new(-1.0).validate(),
        Err(Error::Configuration { .. })
    ));
}

#[test]
fn sudden_jump_is_rejected_by_increment_zscore() {
    // Smooth ramp with one abrupt jump at position 30
    let mut values: Vec<f64> = (0..60).map(|i| i as f64 * 0.1).collect();
    values[30] = 80.0;
    let series = half_hourly("TA", values);

    let outcome = ZScoreIncrements::new(4.0).evaluate(&series, None).unwrap();
    assert!(outcome.rejected.contains(&30));
}

#[test]
fn first_valid_value_is_always_kept_by_increment_zscore() {
    let series = half_hourly("TA", vec![f64::NAN, 1.0, 1.1, 1.2, 1.3]);
    let outcome = ZScoreIncrements::new(4.0).evaluate(&series, None).unwrap();
    assert!(outcome.ok.contains(&1));
    assert!(!outcome.rejected.contains(&1));
}

#[test]
fn iqr_restricted_baseline_rejects_extreme_value() {
    let series = series_with_outlier();
    let outcome = ZScoreIqr::new(1.5, 4.0).evaluate(&series, None).unwrap();
    assert!(outcome.rejected.contains(&50));
}

#[test]
fn negative_iqr_factor_is_a_configuration_error() {
    assert!(matches!(
        ZScoreIqr::new(-1.0, 4.0).validate(),
        Err(Error::Configuration { .. })
    ));
}

#[test]
fn partitions_are_disjoint_and_cover_valid_subset() {
    let mut values = vec![10.0; 30];
    values[3] = f64::NAN;
    values[15] = 900.0;
    values[16] = 10.5;
    let series = half_hourly("TA", values);

    let outcome = ZScore::new(4.0).evaluate(&series, None).unwrap();
    assert_eq!(outcome.n_evaluated(), 29);
    for p in &outcome.ok {
        assert!(!outcome.rejected.contains(p));
    }
}
