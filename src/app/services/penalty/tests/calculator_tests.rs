//! Tests for the penalty calculator

use super::*;
use crate::app::services::penalty::calculator::{compute, penalty_percentage};
use chrono::{Duration, NaiveDate};
use float_cmp::assert_approx_eq;

fn series(name: &str, start: NaiveDate, values: Vec<f64>) -> TimeSeries {
    TimeSeries::regular(
        name,
        start.and_hms_opt(0, 30, 0).unwrap(),
        Duration::minutes(30),
        values,
    )
    .unwrap()
}

#[test]
fn reduced_uptake_percentage() {
    // Both uptake, potential shows more uptake
    let perc = penalty_percentage(378.0, 488.0).unwrap();
    assert_approx_eq!(f64, perc, 22.54, epsilon = 0.01);
}

#[test]
fn reduced_emission_percentage() {
    // Both emission, potential shows less emission: obs = -150, pot = -115
    let perc = penalty_percentage(-150.0, -115.0).unwrap();
    assert_approx_eq!(f64, perc, 30.434782608, epsilon = 1e-6);
}

#[test]
fn non_interpretable_sign_combinations_yield_none() {
    assert!(penalty_percentage(-10.0, 5.0).is_none());
    assert!(penalty_percentage(10.0, -5.0).is_none());
    // Potential below observed: no reduction to express
    assert!(penalty_percentage(488.0, 378.0).is_none());
    assert!(penalty_percentage(-115.0, -150.0).is_none());
    assert!(penalty_percentage(0.0, 10.0).is_none());
}

#[test]
fn annual_penalty_is_potential_minus_observed() {
    let start = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
    // Sums: observed = -150, potential = -115 -> penalty = 35
    let observed = series("NEP", start, vec![-100.0, -50.0, 0.0, 0.0]);
    let potential = series("NEP_potential", start, vec![-60.0, -55.0, 0.0, 0.0]);
    let vpd = series("VPD", start, vec![1.0, 1.0, 1.0, 1.0]);

    let report = compute(
        &observed,
        &potential,
        vec![FillProvenance::Observed; 4],
        vec![false; 4],
        vec![false; 4],
        &vpd,
        2.0,
    )
    .unwrap();

    assert_eq!(report.per_year.len(), 1);
    let year = &report.per_year[0];
    assert_eq!(year.year, 2020);
    assert_approx_eq!(f64, year.observed, -150.0, epsilon = 1e-9);
    assert_approx_eq!(f64, year.potential, -115.0, epsilon = 1e-9);
    assert_approx_eq!(f64, year.penalty, 35.0, epsilon = 1e-9);
    assert_approx_eq!(
        f64,
        penalty_percentage(year.observed, year.potential).unwrap(),
        30.434782608,
        epsilon = 1e-6
    );
}

#[test]
fn worst_year_has_the_minimum_penalty() {
    // Two timestamps in 2020, two in 2021
    let start = NaiveDate::from_ymd_opt(2020, 12, 31)
        .unwrap()
        .and_hms_opt(23, 0, 0)
        .unwrap();
    let half_hour = Duration::minutes(30);
    let observed =
        TimeSeries::regular("NEP", start, half_hour, vec![10.0, 10.0, 50.0, 50.0]).unwrap();
    let potential =
        TimeSeries::regular("NEP_potential", start, half_hour, vec![5.0, 5.0, 60.0, 60.0])
            .unwrap();
    let vpd = TimeSeries::regular("VPD", start, half_hour, vec![1.0; 4]).unwrap();

    let report = compute(
        &observed,
        &potential,
        vec![FillProvenance::Observed; 4],
        vec![false; 4],
        vec![false; 4],
        &vpd,
        2.0,
    )
    .unwrap();

    // 2020 penalty: -10, 2021 penalty: +20
    assert_eq!(report.worst_year, Some(2020));
}

#[test]
fn cumulative_sums_skip_missing_values() {
    let start = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
    let observed = series("NEP", start, vec![1.0, f64::NAN, 2.0]);
    let potential = series("NEP_potential", start, vec![2.0, 1.0, 4.0]);
    let vpd = series("VPD", start, vec![1.0; 3]);

    let report = compute(
        &observed,
        &potential,
        vec![FillProvenance::Observed; 3],
        vec![false; 3],
        vec![false; 3],
        &vpd,
        2.0,
    )
    .unwrap();

    let cum = &report.hires.cum_observed;
    assert_eq!(cum[0], 1.0);
    assert!(cum[1].is_nan());
    assert_eq!(cum[2], 3.0);
    // Penalty at the missing observation is missing as well
    assert!(report.hires.penalty[1].is_nan());
}

#[test]
fn critical_day_count_uses_strict_threshold_and_no_month_window() {
    let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
    // Three days, 48 slots each; daily maxima 2.0 (at threshold), 2.5, 1.0
    let mut vpd_values = Vec::new();
    for peak in [2.0, 2.5, 1.0] {
        vpd_values.extend(std::iter::repeat(peak).take(48));
    }
    let n = vpd_values.len();
    let observed = series("NEP", start, vec![1.0; n]);
    let potential = series("NEP_potential", start, vec![1.0; n]);
    let vpd = series("VPD", start, vpd_values);

    let report = compute(
        &observed,
        &potential,
        vec![FillProvenance::Observed; n],
        vec![false; n],
        vec![false; n],
        &vpd,
        2.0,
    )
    .unwrap();

    // Only the 2.5 day exceeds the threshold strictly; March counts even
    // though it lies outside the classification month window
    assert_eq!(report.per_year[0].critical_days, 1);
}

#[test]
fn misaligned_inputs_are_rejected() {
    let start = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
    let observed = series("NEP", start, vec![1.0; 3]);
    let potential = series("NEP_potential", start, vec![1.0; 2]);
    let vpd = series("VPD", start, vec![1.0; 3]);

    assert!(compute(
        &observed,
        &potential,
        vec![FillProvenance::Observed; 3],
        vec![false; 3],
        vec![false; 3],
        &vpd,
        2.0,
    )
    .is_err());
}
