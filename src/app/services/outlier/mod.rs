//! Outlier test family
//!
//! Each test is a pure function of (series, parameters, optional day/night
//! partition) producing two disjoint position sets, "ok" and "rejected",
//! covering exactly the evaluated subset of the series. Tests carry no flag
//! bookkeeping of their own; iteration, retries and flag assembly are handled
//! uniformly by [`IterativeTestRunner`](crate::app::services::runner::IterativeTestRunner).
//!
//! Tests evaluate valid (non-missing) values only, except for
//! [`MissingValues`] which exists to flag the gaps themselves.

pub mod absolute_limits;
pub mod local_sd;
pub mod lof;
pub mod manual;
pub mod missing;
pub mod trend;
pub mod zscore;

#[cfg(test)]
pub mod tests;

pub use absolute_limits::{AbsoluteLimits, AbsoluteLimitsDayNight};
pub use local_sd::LocalSd;
pub use lof::{LocalOutlierFactor, LocalOutlierFactorDayNight};
pub use manual::ManualRemoval;
pub use missing::MissingValues;
pub use trend::TrendResidualZScore;
pub use zscore::{ZScore, ZScoreIncrements, ZScoreIqr};

use crate::app::models::{DayNightMask, TimeSeries};
use crate::{Error, Result};

/// Disjoint ok/rejected position sets over the evaluated subset of a series.
///
/// Positions appearing in neither set were not evaluated (missing values, or
/// outside the test's partition).
#[derive(Debug, Clone, Default)]
pub struct TestOutcome {
    pub ok: Vec<usize>,
    pub rejected: Vec<usize>,
}

impl TestOutcome {
    pub fn new(ok: Vec<usize>, rejected: Vec<usize>) -> Self {
        Self { ok, rejected }
    }

    /// Fold another outcome (e.g. from a second partition) into this one
    pub fn extend(&mut self, other: TestOutcome) {
        self.ok.extend(other.ok);
        self.rejected.extend(other.rejected);
    }

    pub fn n_evaluated(&self) -> usize {
        self.ok.len() + self.rejected.len()
    }
}

/// A single outlier detection capability.
///
/// Implementations supply only their detection logic; parameter validation
/// runs once before execution and rejects out-of-range settings with a
/// configuration error.
pub trait OutlierTest {
    /// Short identifier used in flag names, e.g. `OUTLIER_ZSCORE`
    fn id(&self) -> &'static str;

    /// Validate parameters; out-of-range values are a configuration error
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Evaluate the series, optionally using a day/night partition
    fn evaluate(&self, series: &TimeSeries, daynight: Option<&DayNightMask>)
        -> Result<TestOutcome>;
}

/// Require an aligned day/night mask for tests that split by partition
pub(crate) fn require_mask<'a>(
    test_id: &str,
    series: &TimeSeries,
    daynight: Option<&'a DayNightMask>,
) -> Result<&'a DayNightMask> {
    let mask = daynight.ok_or_else(|| {
        Error::validation(format!("test '{test_id}' requires a day/night partition"))
    })?;
    if !mask.aligned_with(series.index()) {
        return Err(Error::validation(format!(
            "day/night partition is not aligned with series '{}'",
            series.name()
        )));
    }
    Ok(mask)
}

/// Valid positions of `series` restricted to `partition` (None = all)
pub(crate) fn valid_in_partition(series: &TimeSeries, partition: Option<&[usize]>) -> Vec<usize> {
    match partition {
        Some(positions) => positions
            .iter()
            .copied()
            .filter(|&p| !series.is_missing(p))
            .collect(),
        None => series.valid_positions(),
    }
}
