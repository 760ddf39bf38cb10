//! Iterative test execution
//!
//! Wraps a single [`OutlierTest`] with a repeat-until-clean loop: each
//! iteration re-evaluates the test on the values still accepted after the
//! previous iteration, so the accepted set shrinks monotonically until an
//! iteration finds no new rejections or the iteration cap triggers.
//!
//! A test iteration that fails (e.g. numerical non-convergence) is retried a
//! bounded number of times; if retries are exhausted the test is skipped
//! with a warning and the flags accumulated so far are preserved.

use crate::app::models::{DayNightMask, FlagSeries, TimeSeries};
use crate::app::services::outlier::{OutlierTest, TestOutcome};
use crate::constants::{DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_RETRIES};
use crate::Result;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// How a test run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// An iteration produced zero new rejections
    Converged,
    /// The iteration cap stopped the loop first
    IterationCapReached,
    /// Retries were exhausted; flags from completed iterations are kept
    Skipped { reason: String },
}

/// Result of running one test to completion
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Merged flag over the full original index: rejected in any iteration
    /// means rejected; unevaluated positions stay unset
    pub flag: FlagSeries,
    /// Completed iterations
    pub iterations: usize,
    pub status: RunStatus,
}

impl RunReport {
    pub fn n_rejected(&self) -> usize {
        self.flag.n_rejected()
    }

    pub fn was_skipped(&self) -> bool {
        matches!(self.status, RunStatus::Skipped { .. })
    }
}

/// Runs one outlier test repeatedly until it converges
#[derive(Debug, Clone)]
pub struct IterativeTestRunner {
    max_iterations: usize,
    max_retries: usize,
}

impl Default for IterativeTestRunner {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl IterativeTestRunner {
    pub fn new(max_iterations: usize, max_retries: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            max_retries,
        }
    }

    /// Run `test` against `series`, naming the merged flag
    /// `FLAG_<series>_<test id>_TEST`.
    ///
    /// With `repeat = false` the test runs exactly once. Parameter validation
    /// failures are fatal; evaluation failures are retried and then surfaced
    /// as a non-fatal [`RunStatus::Skipped`].
    pub fn run(
        &self,
        test: &dyn OutlierTest,
        series: &TimeSeries,
        daynight: Option<&DayNightMask>,
        repeat: bool,
    ) -> Result<RunReport> {
        test.validate()?;

        let flag_name = format!("FLAG_{}_{}_TEST", series.name(), test.id());
        let mut filtered = series.clone();
        let mut rejected_total: BTreeSet<usize> = BTreeSet::new();
        let mut final_ok: Vec<usize> = Vec::new();
        let mut iterations = 0;
        let mut status = RunStatus::Converged;

        loop {
            let outcome = match self.evaluate_with_retries(test, &filtered, daynight) {
                Ok(outcome) => outcome,
                Err(reason) => {
                    warn!(
                        "Test {} skipped after {} retries: {}",
                        test.id(),
                        self.max_retries,
                        reason
                    );
                    status = RunStatus::Skipped { reason };
                    break;
                }
            };
            iterations += 1;

            let new_rejections: Vec<usize> = outcome
                .rejected
                .iter()
                .copied()
                .filter(|p| !rejected_total.contains(p))
                .collect();
            rejected_total.extend(new_rejections.iter().copied());
            final_ok = outcome.ok;

            debug!(
                "{}: iteration {} rejected {} new values",
                test.id(),
                iterations,
                new_rejections.len()
            );

            if !repeat || new_rejections.is_empty() {
                break;
            }
            if iterations >= self.max_iterations {
                status = RunStatus::IterationCapReached;
                break;
            }
            filtered.set_missing(&new_rejections);
        }

        // Points rejected in earlier iterations are missing in later ones and
        // can never return to the ok set, so ok/rejected stay disjoint.
        let rejected: Vec<usize> = rejected_total.into_iter().collect();
        let flag = FlagSeries::from_partition(flag_name, series.index().to_vec(), &final_ok, &rejected);

        Ok(RunReport {
            flag,
            iterations,
            status,
        })
    }

    fn evaluate_with_retries(
        &self,
        test: &dyn OutlierTest,
        series: &TimeSeries,
        daynight: Option<&DayNightMask>,
    ) -> std::result::Result<TestOutcome, String> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            match test.evaluate(series, daynight) {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    last_error = err.to_string();
                    if attempt < self.max_retries {
                        debug!(
                            "{}: attempt {} failed ({}), retrying",
                            test.id(),
                            attempt + 1,
                            last_error
                        );
                    }
                }
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::outlier::ZScore;
    use crate::{Error, Result};
    use chrono::{Duration, NaiveDate};
    use std::cell::Cell;

    fn series(values: Vec<f64>) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2022, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        TimeSeries::regular("TA", start, Duration::minutes(30), values).unwrap()
    }

    /// Rejects the current maximum on every evaluation
    struct RejectMax;

    impl OutlierTest for RejectMax {
        fn id(&self) -> &'static str {
            "REJECT_MAX"
        }

        fn evaluate(
            &self,
            series: &TimeSeries,
            _daynight: Option<&DayNightMask>,
        ) -> Result<TestOutcome> {
            let positions = series.valid_positions();
            let max = positions
                .iter()
                .copied()
                .max_by(|&a, &b| series.value(a).partial_cmp(&series.value(b)).unwrap());
            let mut outcome = TestOutcome::default();
            for p in positions {
                if Some(p) == max {
                    outcome.rejected.push(p);
                } else {
                    outcome.ok.push(p);
                }
            }
            Ok(outcome)
        }
    }

    /// Fails the first `failures` evaluations, then behaves like a no-op
    struct Flaky {
        remaining: Cell<usize>,
    }

    impl OutlierTest for Flaky {
        fn id(&self) -> &'static str {
            "FLAKY"
        }

        fn evaluate(
            &self,
            series: &TimeSeries,
            _daynight: Option<&DayNightMask>,
        ) -> Result<TestOutcome> {
            if self.remaining.get() > 0 {
                self.remaining.set(self.remaining.get() - 1);
                return Err(Error::transient("FLAKY", "fit did not converge"));
            }
            Ok(TestOutcome::new(series.valid_positions(), Vec::new()))
        }
    }

    #[test]
    fn converges_when_no_new_rejections() {
        let mut values = vec![10.0; 50];
        values[25] = 500.0;
        let report = IterativeTestRunner::default()
            .run(&ZScore::new(4.0), &series(values), None, true)
            .unwrap();

        assert_eq!(report.status, RunStatus::Converged);
        assert_eq!(report.flag.rejected_positions(), vec![25]);
        assert!(report.iterations >= 2);
    }

    #[test]
    fn single_run_when_repeat_disabled() {
        let mut values = vec![10.0; 50];
        values[25] = 500.0;
        let report = IterativeTestRunner::default()
            .run(&ZScore::new(4.0), &series(values), None, false)
            .unwrap();
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn iteration_cap_stops_nonconverging_test() {
        let values: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let report = IterativeTestRunner::new(3, 0)
            .run(&RejectMax, &series(values), None, true)
            .unwrap();

        assert_eq!(report.status, RunStatus::IterationCapReached);
        assert_eq!(report.iterations, 3);
        // One value rejected per iteration
        assert_eq!(report.flag.n_rejected(), 3);
    }

    #[test]
    fn accepted_set_shrinks_monotonically() {
        let values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let report = IterativeTestRunner::new(5, 0)
            .run(&RejectMax, &series(values), None, true)
            .unwrap();

        // Rejections are the successive maxima: the accepted set of every
        // iteration is a strict subset of the previous one
        assert_eq!(report.flag.rejected_positions(), vec![15, 16, 17, 18, 19]);
        assert_eq!(report.flag.n_ok(), 15);
    }

    #[test]
    fn transient_failures_are_retried() {
        let flaky = Flaky {
            remaining: Cell::new(2),
        };
        let report = IterativeTestRunner::new(10, 3)
            .run(&flaky, &series(vec![1.0; 10]), None, true)
            .unwrap();
        assert_eq!(report.status, RunStatus::Converged);
    }

    #[test]
    fn exhausted_retries_surface_as_skip() {
        let flaky = Flaky {
            remaining: Cell::new(100),
        };
        let report = IterativeTestRunner::new(10, 2)
            .run(&flaky, &series(vec![1.0; 10]), None, true)
            .unwrap();
        assert!(report.was_skipped());
        assert_eq!(report.iterations, 0);
        assert_eq!(report.flag.n_rejected(), 0);
    }

    #[test]
    fn invalid_parameters_are_fatal() {
        let result =
            IterativeTestRunner::default().run(&ZScore::new(-1.0), &series(vec![1.0; 5]), None, true);
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }
}
