//! Day/night classification from solar position
//!
//! Several outlier tests and the QCF accept thresholds distinguish daytime
//! from nighttime timestamps. The [`DayNightClassifier`] trait is the seam;
//! the default implementation computes potential short-wave radiation from
//! solar geometry and classifies timestamps below a radiation threshold as
//! nighttime. A fixed-hours implementation is provided for tests.

use crate::app::models::DayNightMask;
use crate::constants::{DEFAULT_NIGHTTIME_RADIATION_THRESHOLD, SOLAR_CONSTANT};
use crate::{Error, Result};
use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};

/// Classifies each timestamp of an index as daytime or nighttime
pub trait DayNightClassifier {
    fn classify(&self, index: &[NaiveDateTime]) -> Result<DayNightMask>;
}

/// Solar-position-based classifier: a timestamp is nighttime when the
/// potential (clear-sky, top-of-atmosphere) short-wave radiation falls below
/// the configured threshold.
#[derive(Debug, Clone)]
pub struct SolarClassifier {
    latitude: f64,
    longitude: f64,
    utc_offset_hours: f64,
    nighttime_threshold: f64,
}

impl SolarClassifier {
    pub fn new(latitude: f64, longitude: f64, utc_offset_hours: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::configuration(format!(
                "latitude {latitude} outside [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::configuration(format!(
                "longitude {longitude} outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            utc_offset_hours,
            nighttime_threshold: DEFAULT_NIGHTTIME_RADIATION_THRESHOLD,
        })
    }

    /// Override the nighttime radiation threshold (W m-2)
    pub fn with_nighttime_threshold(mut self, threshold: f64) -> Self {
        self.nighttime_threshold = threshold;
        self
    }

    /// Potential short-wave radiation (W m-2) at a timestamp, from the NOAA
    /// solar position formulas
    pub fn potential_radiation(&self, timestamp: NaiveDateTime) -> f64 {
        let doy = timestamp.ordinal() as f64;
        let hour = timestamp.hour() as f64
            + timestamp.minute() as f64 / 60.0
            + timestamp.second() as f64 / 3600.0;

        // Fractional year (radians)
        let gamma = 2.0 * std::f64::consts::PI / 365.0 * (doy - 1.0 + (hour - 12.0) / 24.0);

        // Equation of time (minutes) and solar declination (radians)
        let eqtime = 229.18
            * (0.000075 + 0.001868 * gamma.cos()
                - 0.032077 * gamma.sin()
                - 0.014615 * (2.0 * gamma).cos()
                - 0.040849 * (2.0 * gamma).sin());
        let decl = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
            - 0.006758 * (2.0 * gamma).cos()
            + 0.000907 * (2.0 * gamma).sin()
            - 0.002697 * (3.0 * gamma).cos()
            + 0.00148 * (3.0 * gamma).sin();

        // True solar time (minutes) and hour angle (radians)
        let time_offset = eqtime + 4.0 * self.longitude - 60.0 * self.utc_offset_hours;
        let true_solar = hour * 60.0 + time_offset;
        let hour_angle = (true_solar / 4.0 - 180.0).to_radians();

        let lat = self.latitude.to_radians();
        let cos_zenith = lat.sin() * decl.sin() + lat.cos() * decl.cos() * hour_angle.cos();

        (SOLAR_CONSTANT * cos_zenith).max(0.0)
    }
}

impl DayNightClassifier for SolarClassifier {
    fn classify(&self, index: &[NaiveDateTime]) -> Result<DayNightMask> {
        let is_night = index
            .iter()
            .map(|ts| self.potential_radiation(*ts) < self.nighttime_threshold)
            .collect();
        DayNightMask::new(index.to_vec(), is_night)
    }
}

/// Fixed-hours classifier: nighttime between `night_start` and `night_end`
/// (wrapping over midnight). Intended for tests and sites without coordinates.
#[derive(Debug, Clone)]
pub struct FixedHoursClassifier {
    night_start: NaiveTime,
    night_end: NaiveTime,
}

impl FixedHoursClassifier {
    pub fn new(night_start: NaiveTime, night_end: NaiveTime) -> Self {
        Self {
            night_start,
            night_end,
        }
    }
}

impl DayNightClassifier for FixedHoursClassifier {
    fn classify(&self, index: &[NaiveDateTime]) -> Result<DayNightMask> {
        let is_night = index
            .iter()
            .map(|ts| {
                let t = ts.time();
                if self.night_start <= self.night_end {
                    t >= self.night_start && t < self.night_end
                } else {
                    t >= self.night_start || t < self.night_end
                }
            })
            .collect();
        DayNightMask::new(index.to_vec(), is_night)
    }
}
