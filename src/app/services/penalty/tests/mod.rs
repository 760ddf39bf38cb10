//! Tests for the critical-day limiter and penalty calculator

pub mod calculator_tests;
pub mod limiter_tests;

// Test helper functions and fixtures
use crate::app::models::Frame;
use crate::app::services::gapfill::{
    FillProvenance, GapFillModel, GapFillOptions, GapFillResult,
};
use crate::app::models::TimeSeries;
use crate::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime};

pub const SLOTS_PER_DAY: usize = 48;

/// Half-hourly frame over consecutive days; every day gets a flat VPD equal
/// to its peak, a diel TA ramp and simple driver columns. Critical-day
/// classification then reduces to the peak values.
pub fn build_frame(first_day: NaiveDate, vpd_peaks: &[f64]) -> Frame {
    let start = first_day.and_hms_opt(0, 0, 0).unwrap();
    let n = vpd_peaks.len() * SLOTS_PER_DAY;
    let index: Vec<NaiveDateTime> =
        (0..n as i32).map(|i| start + Duration::minutes(30) * i).collect();

    let mut vpd = Vec::with_capacity(n);
    let mut ta = Vec::with_capacity(n);
    let mut nep = Vec::with_capacity(n);
    let mut swin = Vec::with_capacity(n);
    for (day, peak) in vpd_peaks.iter().enumerate() {
        for slot in 0..SLOTS_PER_DAY {
            vpd.push(*peak);
            // Critical days run hotter than the reference days
            let hot = *peak >= 2.0;
            ta.push(if hot { 20.0 + slot as f64 } else { 10.0 + slot as f64 });
            nep.push(5.0 + day as f64);
            swin.push(slot as f64 * 10.0);
        }
    }

    let mut frame = Frame::new(index).unwrap();
    frame.insert("VPD", vpd).unwrap();
    frame.insert("TA", ta).unwrap();
    frame.insert("RH", vec![50.0; n]).unwrap();
    frame.insert("NEP", nep).unwrap();
    frame.insert("SW_IN", swin).unwrap();
    frame
}

/// The standard variable set matching [`build_frame`]
pub fn variable_set() -> crate::app::services::penalty::VariableSet {
    crate::app::services::penalty::VariableSet {
        flux: "NEP".to_string(),
        temperature: "TA".to_string(),
        radiation: "SW_IN".to_string(),
        vpd: "VPD".to_string(),
        relative_humidity: "RH".to_string(),
    }
}

/// Deterministic stand-in for the regression collaborator: fills every gap
/// with the mean of the observed target values
pub struct MeanFiller;

impl GapFillModel for MeanFiller {
    fn fill(
        &self,
        frame: &Frame,
        target: &str,
        _options: &GapFillOptions,
    ) -> Result<GapFillResult> {
        let values = frame.require(target)?;
        let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let mean = if finite.is_empty() {
            0.0
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        };

        let mut filled = values.to_vec();
        let mut provenance = vec![FillProvenance::Observed; values.len()];
        let mut n_filled = 0;
        for (p, v) in filled.iter_mut().enumerate() {
            if v.is_nan() {
                *v = mean;
                provenance[p] = FillProvenance::Modeled;
                n_filled += 1;
            }
        }
        Ok(GapFillResult {
            filled: TimeSeries::new(target, frame.index().to_vec(), filled)?,
            provenance,
            n_filled,
        })
    }
}

/// First of June, inside the default month window
pub fn june_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 6, 1).unwrap()
}
