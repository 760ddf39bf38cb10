//! Overall quality flag (QCF) aggregation
//!
//! A pure reduction over the accepted flag collection: the QCF at each
//! timestamp is the sum of all flag values (unset flags contribute zero,
//! meaning "test not applicable here"), and a timestamp is accepted overall
//! iff its QCF stays below the accept threshold. Thresholds can differ
//! between daytime and nighttime. Because the aggregation holds no hidden
//! state, it can be re-run at any point, e.g. after changing thresholds,
//! without re-running any test.

use crate::app::models::{DayNightMask, FlagSeries, TimeSeries};
use crate::constants::flag;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// QCF accept thresholds; a timestamp is accepted iff QCF < threshold
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QcfThresholds {
    pub daytime: u16,
    pub nighttime: u16,
}

impl Default for QcfThresholds {
    fn default() -> Self {
        // One rejected test (flag value 2) rejects the timestamp
        Self {
            daytime: 2,
            nighttime: 2,
        }
    }
}

impl QcfThresholds {
    pub fn uniform(threshold: u16) -> Self {
        Self {
            daytime: threshold,
            nighttime: threshold,
        }
    }
}

/// Per-test share of the overall rejections, for reporting
#[derive(Debug, Clone)]
pub struct TestContribution {
    pub flag_name: String,
    pub n_rejected: usize,
}

/// Output of one QCF aggregation pass
#[derive(Debug, Clone)]
pub struct QcfResult {
    /// Summed flag per timestamp
    pub qcf: Vec<u16>,
    /// 0 = accepted, 2 = rejected, over the full index
    pub overall_flag: FlagSeries,
    /// Source series with rejected timestamps set to missing
    pub cleaned: TimeSeries,
    /// Per-test rejection counts, in accepted order
    pub contributions: Vec<TestContribution>,
    /// Timestamps rejected overall
    pub n_rejected: usize,
}

/// Aggregate all accepted flags into one overall quality flag.
///
/// Flags must share the series index. Without a day/night partition the
/// daytime threshold applies everywhere.
pub fn aggregate(
    series: &TimeSeries,
    flags: &[FlagSeries],
    daynight: Option<&DayNightMask>,
    thresholds: &QcfThresholds,
) -> Result<QcfResult> {
    for f in flags {
        if !f.aligned_with(series.index()) {
            return Err(Error::validation(format!(
                "flag '{}' is not aligned with series '{}'",
                f.name(),
                series.name()
            )));
        }
    }
    if let Some(mask) = daynight {
        if !mask.aligned_with(series.index()) {
            return Err(Error::validation(
                "day/night partition is not aligned with the series",
            ));
        }
    }

    let n = series.len();
    let mut qcf = vec![0u16; n];
    for f in flags {
        for (p, value) in f.values().iter().enumerate() {
            qcf[p] += u16::from(value.unwrap_or(0));
        }
    }

    let mut overall_flag = FlagSeries::unset(
        format!("FLAG_{}_QCF", series.name()),
        series.index().to_vec(),
    );
    let mut cleaned_values = series.values().to_vec();
    let mut n_rejected = 0;

    for p in 0..n {
        let threshold = match daynight {
            Some(mask) if mask.is_night(p) => thresholds.nighttime,
            _ => thresholds.daytime,
        };
        if qcf[p] < threshold {
            overall_flag.set(p, flag::OK);
        } else {
            overall_flag.set(p, flag::REJECTED);
            cleaned_values[p] = f64::NAN;
            n_rejected += 1;
        }
    }

    let contributions = flags
        .iter()
        .map(|f| TestContribution {
            flag_name: f.name().to_string(),
            n_rejected: f.n_rejected(),
        })
        .collect();

    Ok(QcfResult {
        qcf,
        overall_flag,
        cleaned: series.with_values(cleaned_values)?,
        contributions,
        n_rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series(values: Vec<f64>) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2022, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        TimeSeries::regular("TA", start, Duration::minutes(30), values).unwrap()
    }

    fn flag(series: &TimeSeries, name: &str, rejected: &[usize]) -> FlagSeries {
        let ok: Vec<usize> = (0..series.len()).filter(|p| !rejected.contains(p)).collect();
        FlagSeries::from_partition(name, series.index().to_vec(), &ok, rejected)
    }

    #[test]
    fn qcf_is_the_sum_of_flags() {
        let s = series(vec![1.0; 4]);
        let flags = vec![flag(&s, "A", &[1]), flag(&s, "B", &[1, 2])];
        let result = aggregate(&s, &flags, None, &QcfThresholds::default()).unwrap();

        assert_eq!(result.qcf, vec![0, 4, 2, 0]);
        // QCF is at least each individual flag value
        for f in &flags {
            for p in 0..s.len() {
                assert!(result.qcf[p] >= u16::from(f.value(p).unwrap_or(0)));
            }
        }
    }

    #[test]
    fn aggregation_is_idempotent() {
        let s = series(vec![1.0, 2.0, 3.0, 4.0]);
        let flags = vec![flag(&s, "A", &[0]), flag(&s, "B", &[2])];
        let first = aggregate(&s, &flags, None, &QcfThresholds::default()).unwrap();
        let second = aggregate(&s, &flags, None, &QcfThresholds::default()).unwrap();

        assert_eq!(first.qcf, second.qcf);
        assert_eq!(first.n_rejected, second.n_rejected);
        assert_eq!(first.cleaned.values()[1], second.cleaned.values()[1]);
    }

    #[test]
    fn unset_flags_contribute_zero() {
        let s = series(vec![1.0; 3]);
        let unset = FlagSeries::unset("A", s.index().to_vec());
        let result = aggregate(&s, &[unset], None, &QcfThresholds::default()).unwrap();
        assert_eq!(result.qcf, vec![0, 0, 0]);
        assert_eq!(result.n_rejected, 0);
    }

    #[test]
    fn cleaned_series_keeps_full_index() {
        let s = series(vec![1.0, 2.0, 3.0]);
        let flags = vec![flag(&s, "A", &[1])];
        let result = aggregate(&s, &flags, None, &QcfThresholds::default()).unwrap();

        assert_eq!(result.cleaned.len(), 3);
        assert!(result.cleaned.is_missing(1));
        assert_eq!(result.cleaned.value(0), 1.0);
    }

    #[test]
    fn day_and_night_thresholds_apply_independently() {
        let s = series(vec![1.0, 2.0]);
        let mask = DayNightMask::new(s.index().to_vec(), vec![false, true]).unwrap();
        let flags = vec![flag(&s, "A", &[0, 1])];

        // Rejecting during daytime only: nighttime tolerates one rejection
        let thresholds = QcfThresholds {
            daytime: 2,
            nighttime: 4,
        };
        let result = aggregate(&s, &flags, Some(&mask), &thresholds).unwrap();
        assert!(result.cleaned.is_missing(0));
        assert!(!result.cleaned.is_missing(1));
    }

    #[test]
    fn misaligned_flag_is_rejected() {
        let s = series(vec![1.0; 3]);
        let other = series(vec![1.0; 2]);
        let misaligned = FlagSeries::unset("A", other.index().to_vec());
        assert!(aggregate(&s, &[misaligned], None, &QcfThresholds::default()).is_err());
    }

    #[test]
    fn contributions_report_per_test_rejections() {
        let s = series(vec![1.0; 5]);
        let flags = vec![flag(&s, "A", &[0, 1]), flag(&s, "B", &[4])];
        let result = aggregate(&s, &flags, None, &QcfThresholds::default()).unwrap();
        assert_eq!(result.contributions.len(), 2);
        assert_eq!(result.contributions[0].n_rejected, 2);
        assert_eq!(result.contributions[1].n_rejected, 1);
    }
}
