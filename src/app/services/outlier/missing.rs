//! Missing value detection
//!
//! Flags every missing (NaN) timestamp as rejected and every present value
//! as ok. Unlike the other tests this evaluates the full index, so the
//! resulting flag records gaps explicitly in the QCF.

use super::{OutlierTest, TestOutcome};
use crate::app::models::{DayNightMask, TimeSeries};
use crate::Result;

#[derive(Debug, Clone, Default)]
pub struct MissingValues;

impl MissingValues {
    pub fn new() -> Self {
        Self
    }
}

impl OutlierTest for MissingValues {
    fn id(&self) -> &'static str {
        "MISSING"
    }

    fn evaluate(
        &self,
        series: &TimeSeries,
        _daynight: Option<&DayNightMask>,
    ) -> Result<TestOutcome> {
        let mut outcome = TestOutcome::default();
        for p in 0..series.len() {
            if series.is_missing(p) {
                outcome.rejected.push(p);
            } else {
                outcome.ok.push(p);
            }
        }
        Ok(outcome)
    }
}
