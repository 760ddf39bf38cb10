//! Stepwise screening of one variable
//!
//! [`StepwiseScreening`] owns the ordered list of accepted test flags and the
//! current cleaned series for a single variable. Tests follow a two-phase
//! protocol: `run_test` produces a preview without touching accumulator
//! state, and only `accept_last` commits the previewed flag, appends it to
//! the accepted list, and recomputes the cleaned series. A test that has not
//! been accepted does not influence later test input.

use crate::app::models::{DayNightMask, FlagSeries, TimeSeries};
use crate::app::services::outlier::OutlierTest;
use crate::app::services::runner::{IterativeTestRunner, RunReport};
use crate::{Error, Result};
use tracing::info;

/// Previewed result of one test run, pending acceptance
#[derive(Debug, Clone)]
pub struct TestPreview {
    pub report: RunReport,
    /// Test identifier the preview came from
    pub test_id: String,
}

impl TestPreview {
    pub fn n_rejected(&self) -> usize {
        self.report.n_rejected()
    }
}

/// Preview/accept flag accumulator for one variable.
///
/// The accumulator exclusively owns the accepted flag chain; the list is
/// append-only and never mutated retroactively. Exactly one current cleaned
/// series exists at any step, derived from the raw series and all accepted
/// flags.
#[derive(Debug)]
pub struct StepwiseScreening {
    raw: TimeSeries,
    cleaned: TimeSeries,
    accepted: Vec<FlagSeries>,
    preview: Option<TestPreview>,
    daynight: Option<DayNightMask>,
    runner: IterativeTestRunner,
}

impl StepwiseScreening {
    pub fn new(series: TimeSeries, daynight: Option<DayNightMask>) -> Result<Self> {
        if let Some(mask) = &daynight {
            if !mask.aligned_with(series.index()) {
                return Err(Error::validation(
                    "day/night partition is not aligned with the input series",
                ));
            }
        }
        Ok(Self {
            cleaned: series.clone(),
            raw: series,
            accepted: Vec::new(),
            preview: None,
            daynight,
            runner: IterativeTestRunner::default(),
        })
    }

    /// Replace the default iterative runner (iteration cap / retry budget)
    pub fn with_runner(mut self, runner: IterativeTestRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Run a test against the current cleaned series and store the preview.
    ///
    /// Re-running (the same or another test) before acceptance overwrites
    /// the pending preview; accumulator state is otherwise untouched. The
    /// input is always the most recently accepted cleaned series, never the
    /// raw series.
    pub fn run_test(
        &mut self,
        test: &dyn OutlierTest,
        repeat: bool,
    ) -> Result<&TestPreview> {
        let report = self.runner.run(test, &self.cleaned, self.daynight.as_ref(), repeat)?;
        info!(
            "{}: previewed {} rejections in {} iteration(s)",
            test.id(),
            report.n_rejected(),
            report.iterations
        );
        self.preview = Some(TestPreview {
            report,
            test_id: test.id().to_string(),
        });
        Ok(self.preview.as_ref().unwrap())
    }

    /// Commit the pending preview: append its flag to the accepted list and
    /// recompute the cleaned series.
    ///
    /// Fails without touching state when no preview is pending.
    pub fn accept_last(&mut self) -> Result<()> {
        let preview = self
            .preview
            .take()
            .ok_or_else(|| Error::validation("no previewed test result to accept"))?;

        info!(
            "{}: accepted flag with {} rejections",
            preview.test_id,
            preview.n_rejected()
        );
        self.accepted.push(preview.report.flag);
        self.recompute_cleaned();
        Ok(())
    }

    /// Discard the pending preview, if any
    pub fn discard_preview(&mut self) {
        self.preview = None;
    }

    pub fn has_preview(&self) -> bool {
        self.preview.is_some()
    }

    pub fn last_preview(&self) -> Option<&TestPreview> {
        self.preview.as_ref()
    }

    /// The untouched input series
    pub fn raw_series(&self) -> &TimeSeries {
        &self.raw
    }

    /// Raw series with every value rejected by any accepted flag set missing
    pub fn current_cleaned_series(&self) -> &TimeSeries {
        &self.cleaned
    }

    /// Ordered collection of accepted flags
    pub fn all_flags(&self) -> &[FlagSeries] {
        &self.accepted
    }

    pub fn daynight(&self) -> Option<&DayNightMask> {
        self.daynight.as_ref()
    }

    fn recompute_cleaned(&mut self) {
        let mut values = self.raw.values().to_vec();
        for flag in &self.accepted {
            for p in flag.rejected_positions() {
                values[p] = f64::NAN;
            }
        }
        // Same index as raw by construction
        self.cleaned = self
            .raw
            .with_values(values)
            .expect("cleaned series shares the raw index");
    }
}
