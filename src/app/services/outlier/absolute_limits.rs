//! Absolute limit tests
//!
//! Reject values outside a fixed physical range, either one range for the
//! whole series or separate ranges for daytime and nighttime data.

use super::{require_mask, valid_in_partition, OutlierTest, TestOutcome};
use crate::app::models::{DayNightMask, TimeSeries};
use crate::{Error, Result};

/// Reject values outside `[min, max]`
#[derive(Debug, Clone)]
pub struct AbsoluteLimits {
    pub min: f64,
    pub max: f64,
}

impl AbsoluteLimits {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

fn check_range(test_id: &str, min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(Error::configuration(format!(
            "{test_id}: limits must satisfy min < max, got [{min}, {max}]"
        )));
    }
    Ok(())
}

fn partition_outcome(series: &TimeSeries, positions: &[usize], min: f64, max: f64) -> TestOutcome {
    let mut outcome = TestOutcome::default();
    for &p in positions {
        let v = series.value(p);
        if v < min || v > max {
            outcome.rejected.push(p);
        } else {
            outcome.ok.push(p);
        }
    }
    outcome
}

impl OutlierTest for AbsoluteLimits {
    fn id(&self) -> &'static str {
        "OUTLIER_ABSLIM"
    }

    fn validate(&self) -> Result<()> {
        check_range(self.id(), self.min, self.max)
    }

    fn evaluate(
        &self,
        series: &TimeSeries,
        _daynight: Option<&DayNightMask>,
    ) -> Result<TestOutcome> {
        let positions = valid_in_partition(series, None);
        Ok(partition_outcome(series, &positions, self.min, self.max))
    }
}

/// Reject values outside separate daytime and nighttime ranges
#[derive(Debug, Clone)]
pub struct AbsoluteLimitsDayNight {
    pub daytime: (f64, f64),
    pub nighttime: (f64, f64),
}

impl AbsoluteLimitsDayNight {
    pub fn new(daytime: (f64, f64), nighttime: (f64, f64)) -> Self {
        Self { daytime, nighttime }
    }
}

impl OutlierTest for AbsoluteLimitsDayNight {
    fn id(&self) -> &'static str {
        "OUTLIER_ABSLIM_DTNT"
    }

    fn validate(&self) -> Result<()> {
        check_range(self.id(), self.daytime.0, self.daytime.1)?;
        check_range(self.id(), self.nighttime.0, self.nighttime.1)
    }

    fn evaluate(
        &self,
        series: &TimeSeries,
        daynight: Option<&DayNightMask>,
    ) -> Result<TestOutcome> {
        let mask = require_mask(self.id(), series, daynight)?;

        let day = valid_in_partition(series, Some(&mask.daytime_positions()));
        let night = valid_in_partition(series, Some(&mask.nighttime_positions()));

        let mut outcome = partition_outcome(series, &day, self.daytime.0, self.daytime.1);
        outcome.extend(partition_outcome(
            series,
            &night,
            self.nighttime.0,
            self.nighttime.1,
        ));
        Ok(outcome)
    }
}
