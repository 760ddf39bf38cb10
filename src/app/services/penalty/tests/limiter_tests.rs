//! Tests for the critical-day limiter

use super::*;
use crate::app::services::gapfill::GapFillOptions;
use crate::app::services::penalty::limiter::{
    gapfilled_col, limited_col, CriticalDayLimiter, CriticalDaysConfig, LimiterState, FLAG_CRD,
};
use crate::Error;
use chrono::Duration;

fn config() -> CriticalDaysConfig {
    CriticalDaysConfig::new(2.0, 1.5)
        .unwrap()
        .with_day_start_offset(Duration::zero())
}

/// Peaks: two plain days, two near-critical, one exactly at each bound,
/// one clearly critical
fn default_peaks() -> Vec<f64> {
    vec![1.0, 1.0, 1.6, 1.5, 2.0, 2.5]
}

#[test]
fn classification_bounds_are_inclusive_and_exclusive_where_specified() {
    let frame = build_frame(june_first(), &default_peaks());
    let limiter = CriticalDayLimiter::new(frame, variable_set(), config()).unwrap();

    let crd = limiter.critical_mask();
    let ncrd = limiter.near_critical_mask();

    // Day 3 peaks exactly at the near-critical bound: near-critical
    assert!(ncrd[3 * SLOTS_PER_DAY]);
    assert!(!crd[3 * SLOTS_PER_DAY]);
    // Day 4 peaks exactly at the critical bound: critical, not near-critical
    assert!(crd[4 * SLOTS_PER_DAY]);
    assert!(!ncrd[4 * SLOTS_PER_DAY]);
    // Plain days carry neither class
    assert!(!crd[0] && !ncrd[0]);
    // Never both
    for (c, n) in crd.iter().zip(ncrd.iter()) {
        assert!(!(*c && *n));
    }
}

#[test]
fn classification_respects_the_month_window() {
    // Same peaks in March, outside the default May-September window
    let frame = build_frame(chrono::NaiveDate::from_ymd_opt(2022, 3, 1).unwrap(), &default_peaks());
    let limiter = CriticalDayLimiter::new(frame, variable_set(), config()).unwrap();
    assert!(limiter.critical_mask().iter().all(|c| !c));
    assert!(limiter.near_critical_mask().iter().all(|c| !c));
}

#[test]
fn contradictory_thresholds_are_a_configuration_error() {
    assert!(matches!(
        CriticalDaysConfig::new(1.5, 2.0),
        Err(Error::Configuration { .. })
    ));
}

#[test]
fn steps_must_run_in_order() {
    let frame = build_frame(june_first(), &default_peaks());
    let mut limiter = CriticalDayLimiter::new(frame, variable_set(), config()).unwrap();

    assert!(matches!(
        limiter.limit_temperature(),
        Err(Error::Validation { .. })
    ));
    limiter.build_diel_template().unwrap();
    assert_eq!(limiter.state(), LimiterState::DielTemplateBuilt);
    // Re-running a completed step is also a protocol violation
    assert!(limiter.build_diel_template().is_err());
}

#[test]
fn limited_dataset_is_gated_on_the_terminal_state() {
    let frame = build_frame(june_first(), &default_peaks());
    let mut limiter = CriticalDayLimiter::new(frame, variable_set(), config()).unwrap();
    assert!(matches!(limiter.limited(), Err(Error::Validation { .. })));

    limiter.run(&MeanFiller, &GapFillOptions::default()).unwrap();
    assert_eq!(limiter.state(), LimiterState::Ready);
    assert!(limiter.limited().is_ok());
}

#[test]
fn critical_day_temperature_is_replaced_with_the_template() {
    let frame = build_frame(june_first(), &default_peaks());
    let mut limiter = CriticalDayLimiter::new(frame, variable_set(), config()).unwrap();
    limiter.build_diel_template().unwrap();
    limiter.limit_temperature().unwrap();

    // Critical day 5 ran at 20 + slot; the near-critical template is
    // 10 + slot for every half-hour of day
    let ta_limited = limiter.working_frame().column(&limited_col("TA")).unwrap();
    for slot in 0..SLOTS_PER_DAY {
        let p = 5 * SLOTS_PER_DAY + slot;
        assert_eq!(ta_limited[p], 10.0 + slot as f64);
    }
    // Reference days keep their observations
    assert_eq!(ta_limited[0], 10.0);
}

#[test]
fn full_run_produces_the_limited_dataset() {
    let frame = build_frame(june_first(), &default_peaks());
    let mut limiter = CriticalDayLimiter::new(frame, variable_set(), config()).unwrap();
    limiter.run(&MeanFiller, &GapFillOptions::default()).unwrap();

    let limited = limiter.limited().unwrap();
    let crd = limiter.critical_mask();

    // Flux on critical days is nulled, awaiting downstream gap-filling
    let nep_limited = limited.column(&limited_col("NEP")).unwrap();
    for (p, is_crd) in crd.iter().enumerate() {
        assert_eq!(nep_limited[p].is_nan(), *is_crd, "position {p}");
    }

    // Recomputed VPD is gap-filled completely
    let vpd_gf = limited.column(&gapfilled_col("VPD")).unwrap();
    assert!(vpd_gf.iter().all(|v| !v.is_nan()));

    // Radiation was nulled and gap-filled
    assert!(limited.has_column(&limited_col("SW_IN")));
    assert!(limited.has_column(&gapfilled_col("SW_IN")));

    // The flag columns mirror the masks
    let flag_crd = limited.column(FLAG_CRD).unwrap();
    for (p, is_crd) in crd.iter().enumerate() {
        assert_eq!(flag_crd[p] == 1.0, *is_crd);
    }
}
