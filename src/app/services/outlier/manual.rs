//! Manual date-range removal
//!
//! Rejects values inside operator-specified timestamp ranges (inclusive),
//! e.g. known sensor maintenance or calibration periods.

use super::{valid_in_partition, OutlierTest, TestOutcome};
use crate::app::models::{DayNightMask, TimeSeries};
use crate::{Error, Result};
use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct ManualRemoval {
    /// Inclusive (start, end) removal ranges
    pub ranges: Vec<(NaiveDateTime, NaiveDateTime)>,
}

impl ManualRemoval {
    pub fn new(ranges: Vec<(NaiveDateTime, NaiveDateTime)>) -> Self {
        Self { ranges }
    }
}

impl OutlierTest for ManualRemoval {
    fn id(&self) -> &'static str {
        "OUTLIER_MANUAL"
    }

    fn validate(&self) -> Result<()> {
        if self.ranges.is_empty() {
            return Err(Error::configuration(format!(
                "{}: at least one removal range is required",
                self.id()
            )));
        }
        for (start, end) in &self.ranges {
            if start > end {
                return Err(Error::configuration(format!(
                    "{}: range start {start} is after end {end}",
                    self.id()
                )));
            }
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
        for p in positions {
            let ts = series.timestamp(p);
            let removed = self.ranges.iter().any(|(start, end)| ts >= *start && ts <= *end);
            if removed {
                outcome.rejected.push(p);
            } else {
                outcome.ok.push(p);
            }
        }
        Ok(outcome)
    }
}
