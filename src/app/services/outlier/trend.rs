//! Seasonal-trend decomposition residual test
//!
//! Decomposes the series into a diel (time-of-day) seasonal component and a
//! rolling trend, then rejects values whose residual z-score exceeds the
//! threshold. This catches outliers that absolute limits miss because they
//! sit inside the physical range but far off the typical diel pattern.

use super::{valid_in_partition, OutlierTest, TestOutcome};
use crate::app::models::{DayNightMask, TimeSeries};
use crate::{Error, Result};
use chrono::NaiveTime;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct TrendResidualZScore {
    /// Trend window in valid samples (centered rolling mean)
    pub trend_window: usize,
    /// Residual z-score rejection threshold
    pub threshold: f64,
}

impl TrendResidualZScore {
    pub fn new(trend_window: usize, threshold: f64) -> Self {
        Self {
            trend_window,
            threshold,
        }
    }
}

impl OutlierTest for TrendResidualZScore {
    fn id(&self) -> &'static str {
        "OUTLIER_STL_ZSCORE"
    }

    fn validate(&self) -> Result<()> {
        if self.trend_window < 3 {
            return Err(Error::configuration(format!(
                "{}: trend window must span at least 3 samples, got {}",
                self.id(),
                self.trend_window
            )));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(Error::configuration(format!(
                "{}: threshold must be positive, got {}",
                self.id(),
                self.threshold
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
        let mut outcome = TestOutcome::default();
        if positions.len() < self.trend_window {
            outcome.ok = positions;
            return Ok(outcome);
        }

        // Seasonal component: mean by time of day
        let mut by_time: BTreeMap<NaiveTime, (f64, usize)> = BTreeMap::new();
        for &p in &positions {
            let slot = by_time.entry(series.timestamp(p).time()).or_insert((0.0, 0));
            slot.0 += series.value(p);
            slot.1 += 1;
        }
        let seasonal: BTreeMap<NaiveTime, f64> = by_time
            .into_iter()
            .map(|(t, (sum, count))| (t, sum / count as f64))
            .collect();

        let deseasonalized: Vec<f64> = positions
            .iter()
            .map(|&p| series.value(p) - seasonal[&series.timestamp(p).time()])
            .collect();

        // Trend: centered rolling mean of the deseasonalized values
        let n = deseasonalized.len();
        let half = self.trend_window / 2;
        let residuals: Vec<f64> = (0..n)
            .map(|i| {
                let lo = i.saturating_sub(half);
                let hi = (i + half + 1).min(n);
                let trend =
                    deseasonalized[lo..hi].iter().sum::<f64>() / (hi - lo) as f64;
                deseasonalized[i] - trend
            })
            .collect();

        let mean = residuals.iter().sum::<f64>() / n as f64;
        let var = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let sd = var.sqrt();

        if sd == 0.0 {
            outcome.ok = positions;
            return Ok(outcome);
        }

        for (i, &p) in positions.iter().enumerate() {
            if ((residuals[i] - mean) / sd).abs() > self.threshold {
                outcome.rejected.push(p);
            } else {
                outcome.ok.push(p);
            }
        }
        Ok(outcome)
    }
}
