//! Tests for the outlier test family

pub mod local_sd_tests;
pub mod zscore_tests;

// Test helper functions and fixtures
use crate::app::models::{DayNightMask, TimeSeries};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

/// Base timestamp shared by the fixtures
pub fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Half-hourly series starting at [`base`]
pub fn half_hourly(name: &str, values: Vec<f64>) -> TimeSeries {
    TimeSeries::regular(name, base(), Duration::minutes(30), values).unwrap()
}

/// Mask with nighttime before 06:00 and from 18:00
pub fn day_night_mask(series: &TimeSeries) -> DayNightMask {
    let is_night = series
        .index()
        .iter()
        .map(|ts| ts.hour() < 6 || ts.hour() >= 18)
        .collect();
    DayNightMask::new(series.index().to_vec(), is_night).unwrap()
}

/// Mask classifying every timestamp as daytime
pub fn all_day_mask(series: &TimeSeries) -> DayNightMask {
    DayNightMask::new(series.index().to_vec(), vec![false; series.len()]).unwrap()
}
