//! NEP penalty pipeline
//!
//! Quantifies the carbon cost attributable to critical heat/drought days:
//! data on critical days is limited (removed or replaced with templates),
//! the resulting gaps are filled by the regression collaborator to obtain
//! the potential flux, and the penalty is the difference between potential
//! and observed flux.
//!
//! # Pipeline
//!
//! 1. [`limiter`] - classify critical/near-critical days and build the
//!    limited dataset (diel template substitution, VPD recompute, nulling)
//! 2. gap-fill the limited flux from the limited drivers
//! 3. [`calculator`] - per-timestep and per-year penalty accounting
//!
//! [`NepPenalty`] drives the whole sequence for a NEP variable set.

pub mod calculator;
pub mod diel;
pub mod limiter;
pub mod vpd;

#[cfg(test)]
pub mod tests;

pub use calculator::{penalty_percentage, PenaltyPerYear, PenaltyReport, PenaltySeries};
pub use diel::DielTemplate;
pub use limiter::{
    gapfilled_col, limited_col, CriticalDayLimiter, CriticalDaysConfig, LimiterState, VariableSet,
    FLAG_CRD, FLAG_NCRD,
};

use crate::app::models::Frame;
use crate::app::services::gapfill::{GapFillModel, GapFillOptions};
use crate::constants::UMOL_CO2_TO_GRAMS_PER_30MIN;
use crate::{Error, Result};
use tracing::info;

/// Settings for one NEP penalty computation
#[derive(Debug, Clone)]
pub struct NepPenaltyConfig {
    pub critical_days: CriticalDaysConfig,
    pub gapfill: GapFillOptions,
    /// Convert the flux column from umol CO2 m-2 s-1 to g CO2 m-2 per
    /// 30-minute interval before accounting
    pub convert_flux_units: bool,
}

impl NepPenaltyConfig {
    pub fn new(critical_days: CriticalDaysConfig) -> Self {
        Self {
            critical_days,
            gapfill: GapFillOptions::default(),
            convert_flux_units: true,
        }
    }

    pub fn with_gapfill(mut self, gapfill: GapFillOptions) -> Self {
        self.gapfill = gapfill;
        self
    }

    pub fn without_unit_conversion(mut self) -> Self {
        self.convert_flux_units = false;
        self
    }
}

/// NEP penalty computation over one half-hourly variable set.
///
/// The input frame is not mutated; all limiting operates on an internal
/// copy. Results are accessible once [`NepPenalty::calculate`] has run.
#[derive(Debug)]
pub struct NepPenalty {
    frame: Frame,
    cols: VariableSet,
    config: NepPenaltyConfig,
    report: Option<PenaltyReport>,
}

impl NepPenalty {
    pub fn new(frame: Frame, cols: VariableSet, config: NepPenaltyConfig) -> Result<Self> {
        for name in [
            &cols.flux,
            &cols.temperature,
            &cols.radiation,
            &cols.vpd,
            &cols.relative_humidity,
        ] {
            frame.require(name)?;
        }
        Ok(Self {
            frame,
            cols,
            config,
            report: None,
        })
    }

    /// Run the full penalty pipeline with the given gap-filling model
    pub fn calculate(&mut self, model: &dyn GapFillModel) -> Result<()> {
        info!("calculating NEP penalty for '{}'", self.cols.flux);

        let mut working = self.frame.clone();
        if self.config.convert_flux_units {
            let converted: Vec<f64> = working
                .require(&self.cols.flux)?
                .iter()
                .map(|v| v * UMOL_CO2_TO_GRAMS_PER_30MIN)
                .collect();
            working.insert(self.cols.flux.clone(), converted)?;
        }

        let mut limiter = CriticalDayLimiter::new(
            working,
            self.cols.clone(),
            self.config.critical_days.clone(),
        )?;
        limiter.run(model, &self.config.gapfill)?;
        let limited = limiter.limited()?;

        // Potential flux: gap-fill the limited flux from the limited drivers
        let flux_limited_col = limited_col(&self.cols.flux);
        let subset = limited.select(&[
            flux_limited_col.as_str(),
            &limited_col(&self.cols.temperature),
            &gapfilled_col(&self.cols.vpd),
            &gapfilled_col(&self.cols.radiation),
        ])?;
        let filled = model.fill(&subset, &flux_limited_col, &self.config.gapfill)?;

        let observed = limited.series(&self.cols.flux)?;
        let mut potential = filled.filled;
        potential.set_name(gapfilled_col(&self.cols.flux));

        let report = calculator::compute(
            &observed,
            &potential,
            filled.provenance,
            limiter.critical_mask().to_vec(),
            limiter.near_critical_mask().to_vec(),
            &limited.series(&self.cols.vpd)?,
            self.config.critical_days.critical_threshold,
        )?;

        self.report = Some(report);
        Ok(())
    }

    /// The penalty report; fails while the pipeline has not run
    pub fn report(&self) -> Result<&PenaltyReport> {
        self.report
            .as_ref()
            .ok_or_else(|| Error::validation("no penalty results yet, run calculate first"))
    }

    pub fn columns(&self) -> &VariableSet {
        &self.cols
    }
}
