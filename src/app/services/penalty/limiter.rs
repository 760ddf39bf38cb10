//! Critical-day data limiting
//!
//! Identifies critical (CRD) and near-critical (nCRD) days from the daily
//! maximum of a threshold variable (typically VPD), then removes or
//! substitutes data on critical days to construct the "limited" dataset that
//! gap-filling turns into the potential flux:
//!
//! 1. classify days against two ascending thresholds inside a month window
//! 2. build a half-hour-of-day median temperature template from nCRD days
//! 3. replace CRD temperature with the template
//! 4. recompute VPD from limited temperature and observed humidity, gap-fill
//! 5. null CRD radiation, gap-fill from limited temperature
//! 6. null CRD flux (gap-filled downstream)
//!
//! The limiter is a state machine; every step checks that the previous step
//! has run, and results are only accessible once the terminal state is
//! reached.

use crate::app::models::Frame;
use crate::app::services::gapfill::{GapFillModel, GapFillOptions};
use crate::app::services::penalty::diel::DielTemplate;
use crate::app::services::penalty::vpd::vpd_series;
use crate::constants::{
    DEFAULT_DAY_START_OFFSET_HOURS, DEFAULT_PENALTY_END_MONTH, DEFAULT_PENALTY_START_MONTH,
};
use crate::{Error, Result};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Column name of the limited variant of `name`
pub fn limited_col(name: &str) -> String {
    format!("_LIMITED_{name}")
}

/// Column name of the gap-filled limited variant of `name`
pub fn gapfilled_col(name: &str) -> String {
    format!("_LIMITED_{name}_gf")
}

/// Flag column marking critical-day timestamps (0/1)
pub const FLAG_CRD: &str = "FLAG_CRD";

/// Flag column marking near-critical-day timestamps (0/1)
pub const FLAG_NCRD: &str = "FLAG_nCRD";

/// Column names of the variable set the limiter operates on
#[derive(Debug, Clone)]
pub struct VariableSet {
    pub flux: String,
    pub temperature: String,
    pub radiation: String,
    pub vpd: String,
    pub relative_humidity: String,
}

/// Thresholds and window for critical-day classification
#[derive(Debug, Clone)]
pub struct CriticalDaysConfig {
    /// Daily maxima at or above this value mark a critical day
    pub critical_threshold: f64,
    /// Lower bound of the near-critical band; near-critical days satisfy
    /// `near_critical_threshold <= daily max < critical_threshold`
    pub near_critical_threshold: f64,
    /// First month of the classification window (inclusive)
    pub start_month: u32,
    /// Last month of the classification window (inclusive)
    pub end_month: u32,
    /// Days start at this offset, so one heat day spans e.g. 07:00-07:00
    pub day_start_offset: Duration,
}

impl CriticalDaysConfig {
    pub fn new(critical_threshold: f64, near_critical_threshold: f64) -> Result<Self> {
        let config = Self {
            critical_threshold,
            near_critical_threshold,
            start_month: DEFAULT_PENALTY_START_MONTH,
            end_month: DEFAULT_PENALTY_END_MONTH,
            day_start_offset: Duration::hours(DEFAULT_DAY_START_OFFSET_HOURS),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_months(mut self, start_month: u32, end_month: u32) -> Result<Self> {
        self.start_month = start_month;
        self.end_month = end_month;
        self.validate()?;
        Ok(self)
    }

    pub fn with_day_start_offset(mut self, offset: Duration) -> Self {
        self.day_start_offset = offset;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.critical_threshold.is_finite() || !self.near_critical_threshold.is_finite() {
            return Err(Error::configuration("thresholds must be finite"));
        }
        if self.near_critical_threshold > self.critical_threshold {
            return Err(Error::configuration(format!(
                "near-critical threshold {} must not exceed critical threshold {}",
                self.near_critical_threshold, self.critical_threshold
            )));
        }
        if !(1..=12).contains(&self.start_month)
            || !(1..=12).contains(&self.end_month)
            || self.start_month > self.end_month
        {
            return Err(Error::configuration(format!(
                "month window {}..={} is not a valid inclusive range",
                self.start_month, self.end_month
            )));
        }
        Ok(())
    }
}

/// Progress of the limiting sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterState {
    Raw,
    DielTemplateBuilt,
    TemperatureLimited,
    VpdRecomputedAndGapfilled,
    RadiationLimitedAndGapfilled,
    FluxLimited,
    Ready,
}

/// State machine producing the limited dataset for one variable set
#[derive(Debug)]
pub struct CriticalDayLimiter {
    frame: Frame,
    cols: VariableSet,
    config: CriticalDaysConfig,
    state: LimiterState,
    crd: Vec<bool>,
    ncrd: Vec<bool>,
    template: Option<DielTemplate>,
}

impl CriticalDayLimiter {
    /// Create the limiter and classify days.
    ///
    /// Classification assigns each timestamp the daily maximum of the
    /// threshold variable for its (offset) day, compares against the two
    /// ascending thresholds with inclusive bounds, and restricts both
    /// classes to the month window. A day can never be both critical and
    /// near-critical; this is validated.
    pub fn new(frame: Frame, cols: VariableSet, config: CriticalDaysConfig) -> Result<Self> {
        config.validate()?;
        for name in [
            &cols.flux,
            &cols.temperature,
            &cols.radiation,
            &cols.vpd,
            &cols.relative_humidity,
        ] {
            frame.require(name)?;
        }

        let (crd, ncrd) = classify_days(&frame, &cols.vpd, &config)?;
        let n_crd_ts = crd.iter().filter(|c| **c).count();
        let n_ncrd_ts = ncrd.iter().filter(|c| **c).count();
        info!(
            "classified {} critical and {} near-critical timestamps",
            n_crd_ts, n_ncrd_ts
        );

        Ok(Self {
            frame,
            cols,
            config,
            state: LimiterState::Raw,
            crd,
            ncrd,
            template: None,
        })
    }

    /// Run every limiting step in order; leaves the limiter in the terminal
    /// state with the limited dataset available
    pub fn run(&mut self, model: &dyn GapFillModel, options: &GapFillOptions) -> Result<()> {
        self.build_diel_template()?;
        self.limit_temperature()?;
        self.recompute_vpd_and_gapfill(model, options)?;
        self.limit_radiation_and_gapfill(model, options)?;
        self.limit_flux()?;
        self.state = LimiterState::Ready;
        Ok(())
    }

    /// Half-hour-of-day median temperature template from near-critical days
    pub fn build_diel_template(&mut self) -> Result<()> {
        self.expect_state(LimiterState::Raw, "build_diel_template")?;
        let temperature = self.frame.require(&self.cols.temperature)?;
        let positions: Vec<usize> = (0..self.frame.len()).filter(|&p| self.ncrd[p]).collect();
        let template = DielTemplate::from_positions(self.frame.index(), temperature, &positions);
        debug!("diel template covers {} time-of-day slot(s)", template.n_slots());
        self.template = Some(template);
        self.state = LimiterState::DielTemplateBuilt;
        Ok(())
    }

    /// Replace critical-day temperature with the template value; times of
    /// day without a template value become gaps
    pub fn limit_temperature(&mut self) -> Result<()> {
        self.expect_state(LimiterState::DielTemplateBuilt, "limit_temperature")?;
        let template = self.template.as_ref().expect("template built");
        let index = self.frame.index().to_vec();
        let mut limited = self.frame.require(&self.cols.temperature)?.to_vec();
        for p in 0..limited.len() {
            if self.crd[p] {
                limited[p] = template
                    .value_at(index[p].time())
                    .unwrap_or(f64::NAN);
            }
        }
        self.frame.insert(limited_col(&self.cols.temperature), limited)?;
        self.state = LimiterState::TemperatureLimited;
        Ok(())
    }

    /// Recompute VPD from limited temperature and observed humidity, then
    /// gap-fill the result from radiation, limited temperature and
    /// timestamp features
    pub fn recompute_vpd_and_gapfill(
        &mut self,
        model: &dyn GapFillModel,
        options: &GapFillOptions,
    ) -> Result<()> {
        self.expect_state(LimiterState::TemperatureLimited, "recompute_vpd_and_gapfill")?;
        let ta_limited_col = limited_col(&self.cols.temperature);
        let vpd_limited_col = limited_col(&self.cols.vpd);

        let ta_limited = self.frame.require(&ta_limited_col)?;
        let rh = self.frame.require(&self.cols.relative_humidity)?;
        let vpd_limited = vpd_series(ta_limited, rh);
        self.frame.insert(vpd_limited_col.clone(), vpd_limited)?;

        let subset = self.frame.select(&[
            vpd_limited_col.as_str(),
            self.cols.radiation.as_str(),
            ta_limited_col.as_str(),
        ])?;
        let filled = model.fill(&subset, &vpd_limited_col, options)?;
        self.frame
            .insert(gapfilled_col(&self.cols.vpd), filled.filled.values().to_vec())?;

        self.state = LimiterState::VpdRecomputedAndGapfilled;
        Ok(())
    }

    /// Null radiation on critical days and gap-fill from limited temperature.
    /// Radiation gap-filling uses no lagged variants.
    pub fn limit_radiation_and_gapfill(
        &mut self,
        model: &dyn GapFillModel,
        options: &GapFillOptions,
    ) -> Result<()> {
        self.expect_state(
            LimiterState::VpdRecomputedAndGapfilled,
            "limit_radiation_and_gapfill",
        )?;
        let swin_limited_col = limited_col(&self.cols.radiation);
        let ta_limited_col = limited_col(&self.cols.temperature);

        let mut limited = self.frame.require(&self.cols.radiation)?.to_vec();
        for p in 0..limited.len() {
            if self.crd[p] {
                limited[p] = f64::NAN;
            }
        }
        self.frame.insert(swin_limited_col.clone(), limited)?;

        let subset = self
            .frame
            .select(&[swin_limited_col.as_str(), ta_limited_col.as_str()])?;
        let radiation_options = options.clone().with_lagged_variants(0);
        let filled = model.fill(&subset, &swin_limited_col, &radiation_options)?;
        self.frame.insert(
            gapfilled_col(&self.cols.radiation),
            filled.filled.values().to_vec(),
        )?;

        self.state = LimiterState::RadiationLimitedAndGapfilled;
        Ok(())
    }

    /// Null the flux variable on critical days and record the CRD/nCRD flag
    /// columns; the flux gap is filled downstream
    pub fn limit_flux(&mut self) -> Result<()> {
        self.expect_state(LimiterState::RadiationLimitedAndGapfilled, "limit_flux")?;
        let mut limited = self.frame.require(&self.cols.flux)?.to_vec();
        for p in 0..limited.len() {
            if self.crd[p] {
                limited[p] = f64::NAN;
            }
        }
        self.frame.insert(limited_col(&self.cols.flux), limited)?;

        let crd_flag: Vec<f64> = self.crd.iter().map(|&c| if c { 1.0 } else { 0.0 }).collect();
        let ncrd_flag: Vec<f64> = self.ncrd.iter().map(|&c| if c { 1.0 } else { 0.0 }).collect();
        self.frame.insert(FLAG_CRD, crd_flag)?;
        self.frame.insert(FLAG_NCRD, ncrd_flag)?;

        self.state = LimiterState::FluxLimited;
        Ok(())
    }

    pub fn state(&self) -> LimiterState {
        self.state
    }

    /// Per-timestamp critical-day mask
    pub fn critical_mask(&self) -> &[bool] {
        &self.crd
    }

    /// Per-timestamp near-critical-day mask
    pub fn near_critical_mask(&self) -> &[bool] {
        &self.ncrd
    }

    pub fn template(&self) -> Option<&DielTemplate> {
        self.template.as_ref()
    }

    pub fn config(&self) -> &CriticalDaysConfig {
        &self.config
    }

    pub fn columns(&self) -> &VariableSet {
        &self.cols
    }

    /// The limited dataset; only available once every step has run
    pub fn limited(&self) -> Result<&Frame> {
        if self.state != LimiterState::Ready {
            return Err(Error::validation(format!(
                "limited dataset is not ready, limiter state is {:?}",
                self.state
            )));
        }
        Ok(&self.frame)
    }

    #[cfg(test)]
    pub(crate) fn working_frame(&self) -> &Frame {
        &self.frame
    }

    fn expect_state(&self, expected: LimiterState, operation: &str) -> Result<()> {
        if self.state != expected {
            return Err(Error::validation(format!(
                "{operation} requires limiter state {expected:?}, current state is {:?}",
                self.state
            )));
        }
        Ok(())
    }
}

/// Classify every timestamp as critical/near-critical from the daily maximum
/// of the threshold column
fn classify_days(
    frame: &Frame,
    threshold_col: &str,
    config: &CriticalDaysConfig,
) -> Result<(Vec<bool>, Vec<bool>)> {
    let values = frame.require(threshold_col)?;
    let index = frame.index();

    // Daily maxima on offset days
    let mut daily_max: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (p, ts) in index.iter().enumerate() {
        let v = values[p];
        if v.is_nan() {
            continue;
        }
        let day = (*ts - config.day_start_offset).date();
        daily_max
            .entry(day)
            .and_modify(|m| *m = m.max(v))
            .or_insert(v);
    }

    let mut crd = vec![false; index.len()];
    let mut ncrd = vec![false; index.len()];
    for (p, ts) in index.iter().enumerate() {
        let month = ts.month();
        if month < config.start_month || month > config.end_month {
            continue;
        }
        let day = (*ts - config.day_start_offset).date();
        let Some(&max) = daily_max.get(&day) else {
            continue;
        };
        if max >= config.critical_threshold {
            crd[p] = true;
        } else if max >= config.near_critical_threshold {
            ncrd[p] = true;
        }
    }

    // Disjoint by construction, but the invariant is load-bearing downstream
    if crd.iter().zip(ncrd.iter()).any(|(c, n)| *c && *n) {
        return Err(Error::validation(
            "a day was classified both critical and near-critical",
        ));
    }

    Ok((crd, ncrd))
}
