//! Rolling local standard deviation test
//!
//! Rejects values farther than `factor` local standard deviations from the
//! local rolling mean. The window is centered over neighboring valid values,
//! so isolated spikes stand out against their surroundings even when the
//! series has strong seasonal structure.

use super::{valid_in_partition, OutlierTest, TestOutcome};
use crate::app::models::{DayNightMask, TimeSeries};
use crate::{Error, Result};

/// Minimum valid samples a window must contain before the test applies
const MIN_WINDOW_SAMPLES: usize = 3;

#[derive(Debug, Clone)]
pub struct LocalSd {
    /// Total window size in valid samples (centered)
    pub window: usize,
    /// Rejection distance in local standard deviations
    pub factor: f64,
}

impl LocalSd {
    pub fn new(window: usize, factor: f64) -> Self {
        Self { window, factor }
    }
}

impl OutlierTest for LocalSd {
    fn id(&self) -> &'static str {
        "OUTLIER_LOCALSD"
    }

    fn validate(&self) -> Result<()> {
        if self.window < MIN_WINDOW_SAMPLES {
            return Err(Error::configuration(format!(
                "{}: window must span at least {MIN_WINDOW_SAMPLES} samples, got {}",
                self.id(),
                self.window
            )));
        }
        if !self.factor.is_finite() || self.factor <= 0.0 {
            return Err(Error::configuration(format!(
                "{}: SD factor must be positive, got {}",
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
        let n = values.len();

        let mut outcome = TestOutcome::default();
        if n < MIN_WINDOW_SAMPLES {
            outcome.ok = positions;
            return Ok(outcome);
        }

        let half = (self.window / 2).max(1);
        for (i, &p) in positions.iter().enumerate() {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);

            // Window statistics exclude the candidate itself
            let window: Vec<f64> = (lo..hi).filter(|&j| j != i).map(|j| values[j]).collect();
            if window.len() < MIN_WINDOW_SAMPLES - 1 {
                outcome.ok.push(p);
                continue;
            }
            let mean = window.iter().sum::<f64>() / window.len() as f64;
            let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                / (window.len() - 1).max(1) as f64;
            let sd = var.sqrt();

            if sd > 0.0 && (values[i] - mean).abs() > self.factor * sd {
                outcome.rejected.push(p);
            } else {
                outcome.ok.push(p);
            }
        }
        Ok(outcome)
    }
}
