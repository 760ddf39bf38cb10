//! Z-score outlier tests
//!
//! Three variants: plain z-score against the series mean/SD, z-score on
//! value increments (detects sudden jumps), and a robust variant whose
//! baseline statistics come from the interquartile subrange only.

use super::{valid_in_partition, OutlierTest, TestOutcome};
use crate::app::models::{DayNightMask, TimeSeries};
use crate::{Error, Result};

fn check_threshold(test_id: &str, threshold: f64) -> Result<()> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(Error::configuration(format!(
            "{test_id}: threshold must be positive, got {threshold}"
        )));
    }
    Ok(())
}

/// Mean and sample SD of a value slice; None when fewer than two values
fn mean_sd(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some((mean, var.sqrt()))
}

/// Reject values whose absolute z-score exceeds the threshold
#[derive(Debug, Clone)]
pub struct ZScore {
    pub threshold: f64,
}

impl ZScore {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl OutlierTest for ZScore {
    fn id(&self) -> &'static str {
        "OUTLIER_ZSCORE"
    }

    fn validate(&self) -> Result<()> {
        check_threshold(self.id(), self.threshold)
    }

    fn evaluate(
        &self,
        series: &TimeSeries,
        _daynight: Option<&DayNightMask>,
    ) -> Result<TestOutcome> {
        let positions = valid_in_partition(series, None);
        let values: Vec<f64> = positions.iter().map(|&p| series.value(p)).collect();

        let mut outcome = TestOutcome::default();
        match mean_sd(&values) {
            Some((mean, sd)) if sd > 0.0 => {
                for (&p, &v) in positions.iter().zip(values.iter()) {
                    if ((v - mean) / sd).abs() > self.threshold {
                        outcome.rejected.push(p);
                    } else {
                        outcome.ok.push(p);
                    }
                }
            }
            // Constant or near-empty series: nothing to reject
            _ => outcome.ok = positions,
        }
        Ok(outcome)
    }
}

/// Reject values whose increment from the previous valid value has an
/// absolute z-score (over all increments) exceeding the threshold
#[derive(Debug, Clone)]
pub struct ZScoreIncrements {
    pub threshold: f64,
}

impl ZScoreIncrements {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl OutlierTest for ZScoreIncrements {
    fn id(&self) -> &'static str {
        "OUTLIER_INCREMENTS_ZSCORE"
    }

    fn validate(&self) -> Result<()> {
        check_threshold(self.id(), self.threshold)
    }

    fn evaluate(
        &self,
        series: &TimeSeries,
        _daynight: Option<&DayNightMask>,
    ) -> Result<TestOutcome> {
        let positions = valid_in_partition(series, None);
        let mut outcome = TestOutcome::default();
        if positions.len() < 3 {
            outcome.ok = positions;
            return Ok(outcome);
        }

        // Increment at position i is v[i] - v[previous valid]; the first
        // valid value has no increment and is always kept.
        let increments: Vec<f64> = positions
            .windows(2)
            .map(|w| series.value(w[1]) - series.value(w[0]))
            .collect();

        match mean_sd(&increments) {
            Some((mean, sd)) if sd > 0.0 => {
                outcome.ok.push(positions[0]);
                for (i, &p) in positions.iter().enumerate().skip(1) {
                    let z = (increments[i - 1] - mean) / sd;
                    if z.abs() > self.threshold {
                        outcome.rejected.push(p);
                    } else {
                        outcome.ok.push(p);
                    }
                }
            }
            _ => outcome.ok = positions,
        }
        Ok(outcome)
    }
}

/// Z-score with baseline statistics restricted to an interquartile subrange.
///
/// The mean and SD are computed from values inside
/// `[q25 - factor * IQR, q75 + factor * IQR]`, so extreme values cannot
/// inflate their own acceptance envelope.
#[derive(Debug, Clone)]
pub struct ZScoreIqr {
    pub factor: f64,
    pub threshold: f64,
}

impl ZScoreIqr {
    pub fn new(factor: f64, threshold: f64) -> Self {
        Self { factor, threshold }
    }
}

impl OutlierTest for ZScoreIqr {
    fn id(&self) -> &'static str {
        "OUTLIER_IQR_ZSCORE"
    }

    fn validate(&self) -> Result<()> {
        check_threshold(self.id(), self.threshold)?;
        if !self.factor.is_finite() || self.factor < 0.0 {
            return Err(Error::configuration(format!(
                "{}: IQR factor must be non-negative, got {}",
                self.id(),
                self.factor
            )));
        }
        Ok(())
    }

    fn evaluate(
        &self,
        series: &TimeSeries,
        _daynight: Option<&DayNightMask>,
    ) -> Result<TestOutcome> {
        let positions = valid_in_partition(series, None);
        let values: Vec<f64> = positions.iter().map(|&p| series.value(p)).collect();

        let mut outcome = TestOutcome::default();
        let (q25, q75) = match (series.quantile(0.25), series.quantile(0.75)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                outcome.ok = positions;
                return Ok(outcome);
            }
        };
        let iqr = q75 - q25;
        let lower = q25 - self.factor * iqr;
        let upper = q75 + self.factor * iqr;

        let baseline: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| *v >= lower && *v <= upper)
            .collect();

        match mean_sd(&baseline) {
            Some((mean, sd)) if sd > 0.0 => {
                for (&p, &v) in positions.iter().zip(values.iter()) {
                    if ((v - mean) / sd).abs() > self.threshold {
                        outcome.rejected.push(p);
                    } else {
                        outcome.ok.push(p);
                    }
                }
            }
            _ => outcome.ok = positions,
        }
        Ok(outcome)
    }
}
