//! Configuration management and validation.
//!
//! Provides typed configuration for the screening pipeline: which tests run
//! for which measurement/variable pair, the physically plausible range per
//! variable, QCF accept thresholds, and resampling settings. Configuration
//! is read once at session start, validated eagerly, and immutable
//! thereafter.

use crate::app::services::qcf::QcfThresholds;
use crate::constants::{
    DEFAULT_MIN_FREQUENCY_SHARE, DEFAULT_RESAMPLING_MIN_COVERAGE, WORKING_RESOLUTION_SECS,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Identifiers of the available pipeline steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    MissingValues,
    AbsoluteLimits,
    AbsoluteLimitsDayNight,
    ZScore,
    ZScoreIncrements,
    ZScoreIqr,
    LocalOutlierFactor,
    LocalOutlierFactorDayNight,
    LocalSd,
    TrendResidual,
    ManualRemoval,
}

/// Pipeline definition for one variable within a measurement group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableConfig {
    /// Unit the variable must arrive in; assignment fails on mismatch
    pub units: String,

    /// Ordered pipeline steps to run for this variable
    pub pipeline: Vec<StepId>,

    /// Physically plausible range (min, max) for the absolute-limits step
    pub absolute_limits: (f64, f64),
}

/// Resampling of cleaned high-resolution data to the working resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResamplingConfig {
    /// Target interval in seconds
    pub target_secs: i64,

    /// Minimum fraction of expected records per window
    pub min_coverage: f64,
}

impl Default for ResamplingConfig {
    fn default() -> Self {
        Self {
            target_secs: WORKING_RESOLUTION_SECS,
            min_coverage: DEFAULT_RESAMPLING_MIN_COVERAGE,
        }
    }
}

/// Declarative screening configuration: measurement group -> variable ->
/// pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// Measurement groups ("TA", "SW", "RH", ...) each holding the variables
    /// assigned to them
    pub measurements: BTreeMap<String, BTreeMap<String, VariableConfig>>,

    /// QCF accept thresholds
    pub qcf: QcfThresholds,

    /// Resampling to the working resolution
    pub resampling: ResamplingConfig,

    /// Frequency groups below this record share are rejected during
    /// harmonization
    pub min_frequency_share: f64,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        let mut measurements = BTreeMap::new();

        // Air temperature
        let mut ta = BTreeMap::new();
        ta.insert(
            "TA".to_string(),
            VariableConfig {
                units: "degC".to_string(),
                pipeline: vec![
                    StepId::MissingValues,
                    StepId::AbsoluteLimits,
                    StepId::ZScoreIqr,
                    StepId::LocalOutlierFactor,
                ],
                absolute_limits: (-50.0, 50.0),
            },
        );
        measurements.insert("TA".to_string(), ta);

        // Short-wave incoming radiation
        let mut sw = BTreeMap::new();
        sw.insert(
            "SW_IN".to_string(),
            VariableConfig {
                units: "W m-2".to_string(),
                pipeline: vec![
                    StepId::MissingValues,
                    StepId::AbsoluteLimits,
                    StepId::LocalOutlierFactorDayNight,
                ],
                absolute_limits: (-50.0, 1400.0),
            },
        );
        measurements.insert("SW".to_string(), sw);

        // Relative humidity
        let mut rh = BTreeMap::new();
        rh.insert(
            "RH".to_string(),
            VariableConfig {
                units: "%".to_string(),
                pipeline: vec![
                    StepId::MissingValues,
                    StepId::AbsoluteLimits,
                    StepId::ZScoreIqr,
                ],
                absolute_limits: (-5.0, 125.0),
            },
        );
        measurements.insert("RH".to_string(), rh);

        Self {
            measurements,
            qcf: QcfThresholds::default(),
            resampling: ResamplingConfig::default(),
            min_frequency_share: DEFAULT_MIN_FREQUENCY_SHARE,
        }
    }
}

impl ScreeningConfig {
    /// Validate every entry; called once at session start so bad
    /// configuration fails before any data is touched
    pub fn validate(&self) -> Result<()> {
        if self.measurements.is_empty() {
            return Err(Error::configuration("no measurement groups configured"));
        }
        for (measurement, variables) in &self.measurements {
            if variables.is_empty() {
                return Err(Error::configuration(format!(
                    "measurement group '{measurement}' has no variables"
                )));
            }
            for (variable, config) in variables {
                if config.pipeline.is_empty() {
                    return Err(Error::configuration(format!(
                        "variable '{variable}' in '{measurement}' has an empty pipeline"
                    )));
                }
                let (min, max) = config.absolute_limits;
                if !min.is_finite() || !max.is_finite() || min >= max {
                    return Err(Error::configuration(format!(
                        "variable '{variable}' in '{measurement}' has invalid absolute limits [{min}, {max}]"
                    )));
                }
            }
        }
        if !(0.0..=1.0).contains(&self.resampling.min_coverage) {
            return Err(Error::configuration(format!(
                "resampling minimum coverage must be in [0, 1], got {}",
                self.resampling.min_coverage
            )));
        }
        if self.resampling.target_secs <= 0 {
            return Err(Error::configuration(format!(
                "resampling target must be positive, got {}s",
                self.resampling.target_secs
            )));
        }
        if !(0.0..=1.0).contains(&self.min_frequency_share) {
            return Err(Error::configuration(format!(
                "minimum frequency share must be in [0, 1], got {}",
                self.min_frequency_share
            )));
        }
        Ok(())
    }

    /// Assign the pipeline for a field: the field name must contain a
    /// configured variable key of the measurement group and arrive in the
    /// configured units.
    pub fn assign(&self, measurement: &str, field: &str, units: &str) -> Result<&VariableConfig> {
        let variables = self.measurements.get(measurement).ok_or_else(|| {
            Error::configuration(format!(
                "measurement '{measurement}' is not defined in the screening configuration"
            ))
        })?;

        for (variable, config) in variables {
            if field.contains(variable.as_str()) && config.units == units {
                debug!(
                    "field '{field}' assigned to pipeline of variable '{variable}' ({measurement})"
                );
                return Ok(config);
            }
        }
        Err(Error::configuration(format!(
            "no pipeline in measurement '{measurement}' matches field '{field}' with units '{units}'"
        )))
    }

    /// Replace the QCF thresholds
    pub fn with_qcf(mut self, qcf: QcfThresholds) -> Self {
        self.qcf = qcf;
        self
    }

    /// Replace the resampling settings
    pub fn with_resampling(mut self, resampling: ResamplingConfig) -> Self {
        self.resampling = resampling;
        self
    }

    /// Replace the minimum frequency share
    pub fn with_min_frequency_share(mut self, share: f64) -> Self {
        self.min_frequency_share = share;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ScreeningConfig::default().validate().is_ok());
    }

    #[test]
    fn assignment_matches_field_name_and_units() {
        let config = ScreeningConfig::default();
        let assigned = config.assign("TA", "TA_T1_2_1", "degC").unwrap();
        assert_eq!(assigned.units, "degC");
        assert_eq!(assigned.absolute_limits, (-50.0, 50.0));
    }

    #[test]
    fn assignment_rejects_unit_mismatch() {
        let config = ScreeningConfig::default();
        assert!(matches!(
            config.assign("TA", "TA_T1_2_1", "K"),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn assignment_rejects_unknown_measurement() {
        let config = ScreeningConfig::default();
        assert!(config.assign("G", "G_1_1_1", "W m-2").is_err());
    }

    #[test]
    fn invalid_limits_fail_validation() {
        let mut config = ScreeningConfig::default();
        config
            .measurements
            .get_mut("TA")
            .unwrap()
            .get_mut("TA")
            .unwrap()
            .absolute_limits = (50.0, -50.0);
        assert!(config.validate().is_err());
    }
}
