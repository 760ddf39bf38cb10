//! Time-resolution harmonization
//!
//! A variable downloaded from the database may have been recorded at
//! different sampling frequencies over its history. Harmonization selects
//! the usable frequencies (rejecting rare ones as misconfiguration), picks
//! the finest as the target, upsamples coarser groups by bounded back-fill,
//! and merges everything onto one regular time axis.
//!
//! Back-fill (not forward-fill) is the correct propagation direction because
//! a record's timestamp marks the end of its averaging interval: a 10-minute
//! average stamped 10:10 describes 10:00-10:10.
//!
//! After screening, [`resample`] aggregates the cleaned high-resolution
//! series to the working resolution with a minimum-coverage requirement.

use crate::app::models::{FrequencyGroup, Tags, TimeSeries};
use crate::{Error, Result};
use chrono::{DateTime, Duration, NaiveDateTime};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// One variable's history merged onto a single regular time axis
#[derive(Debug, Clone)]
pub struct Harmonized {
    pub series: TimeSeries,
    /// Merged tags with the frequency updated to the target
    pub tags: Tags,
    /// Selected target sampling interval (the finest usable frequency)
    pub target: Duration,
    /// Intervals that passed the usability threshold, ascending
    pub contributing: Vec<Duration>,
}

/// Harmonize frequency groups of one variable onto the finest usable
/// frequency.
///
/// Groups contributing less than `min_share` of total records are rejected.
/// Fails with a configuration error when no usable frequency remains, and
/// with a validation error when the groups disagree on units or variable
/// name.
pub fn harmonize(groups: &[FrequencyGroup], min_share: f64) -> Result<Harmonized> {
    if groups.is_empty() {
        return Err(Error::configuration(
            "no frequency groups supplied, nothing to harmonize",
        ));
    }
    if !(0.0..=1.0).contains(&min_share) {
        return Err(Error::configuration(format!(
            "minimum frequency share must be in [0, 1], got {min_share}"
        )));
    }
    validate_tag_invariants(groups)?;

    let total: usize = groups.iter().map(|g| g.series.len()).sum();
    let mut usable: Vec<&FrequencyGroup> = groups
        .iter()
        .filter(|g| {
            let share = g.series.len() as f64 / total as f64;
            let keep = share >= min_share;
            if !keep {
                debug!(
                    "rejecting frequency {}s: {:.2}% of records is below the {:.2}% threshold",
                    g.interval.num_seconds(),
                    share * 100.0,
                    min_share * 100.0
                );
            }
            keep
        })
        .collect();
    if usable.is_empty() {
        return Err(Error::configuration(
            "no sampling frequency passes the usability threshold, nothing to harmonize",
        ));
    }
    usable.sort_by_key(|g| g.interval);

    let target = usable[0].interval;
    let target_secs = target.num_seconds();
    for g in &usable {
        if g.interval.num_seconds() % target_secs != 0 {
            return Err(Error::configuration(format!(
                "frequency {}s is not a multiple of the target frequency {}s",
                g.interval.num_seconds(),
                target_secs
            )));
        }
    }

    // Finer groups are merged first, so overlapping boundary timestamps
    // prefer already-present higher-resolution data (first-non-missing-wins).
    let mut combined: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
    for g in &usable {
        let fill_limit = g.interval.num_seconds() / target_secs - 1;
        for p in 0..g.series.len() {
            let ts = g.series.timestamp(p);
            let value = g.series.value(p);
            // The record's value propagates backward over the fine slots it
            // covers; the slot one step past the fill limit belongs to the
            // previous record and is never created.
            for j in 0..=fill_limit {
                let slot = ts - target * j as i32;
                match combined.entry(slot) {
                    Entry::Vacant(e) => {
                        e.insert(value);
                    }
                    Entry::Occupied(mut e) => {
                        if e.get().is_nan() && !value.is_nan() {
                            e.insert(value);
                        }
                    }
                }
            }
        }
    }

    let start = *combined.keys().next().expect("usable groups are non-empty");
    let end = *combined.keys().next_back().expect("usable groups are non-empty");
    let n = ((end - start).num_seconds() / target_secs) as usize + 1;

    let mut matched = 0usize;
    let mut index = Vec::with_capacity(n);
    let mut values = Vec::with_capacity(n);
    for i in 0..n {
        let ts = start + target * i as i32;
        index.push(ts);
        match combined.get(&ts) {
            Some(v) => {
                matched += 1;
                values.push(*v);
            }
            None => values.push(f64::NAN),
        }
    }
    if matched < combined.len() {
        warn!(
            "{} record(s) fell off the regular {}s grid and were dropped",
            combined.len() - matched,
            target_secs
        );
    }

    let varname = usable[0]
        .tags
        .variable()
        .unwrap_or(usable[0].series.name())
        .to_string();
    let mut tags = usable[0].tags.clone();
    tags.insert(Tags::FREQ, format!("{target_secs}s"));

    let contributing: Vec<Duration> = usable.iter().map(|g| g.interval).collect();
    info!(
        "harmonized {} group(s) onto {}s grid, {} records",
        contributing.len(),
        target_secs,
        n
    );

    Ok(Harmonized {
        series: TimeSeries::new(varname, index, values)?,
        tags,
        target,
        contributing,
    })
}

fn validate_tag_invariants(groups: &[FrequencyGroup]) -> Result<()> {
    let units: BTreeSet<&str> = groups.iter().filter_map(|g| g.tags.units()).collect();
    if units.len() > 1 {
        return Err(Error::validation(format!(
            "more than one type of units in input groups, but only one allowed: {units:?}"
        )));
    }
    let varnames: BTreeSet<&str> = groups.iter().filter_map(|g| g.tags.variable()).collect();
    if varnames.len() > 1 {
        return Err(Error::validation(format!(
            "more than one variable name in input groups, but only one allowed: {varnames:?}"
        )));
    }
    Ok(())
}

/// Tags for a series resampled to the working resolution after screening
pub fn resampled_tags(tags: &Tags, target: Duration) -> Tags {
    let mut out = tags.clone();
    out.insert(Tags::FREQ, format!("{}s", target.num_seconds()));
    out.insert(Tags::DATA_VERSION, "screened");
    out
}

/// Aggregate a regular high-resolution series to a coarser working
/// resolution (mean aggregation, right-closed windows labeled by their end).
///
/// Windows covering less than `min_coverage` of the expected records become
/// missing.
pub fn resample(series: &TimeSeries, target: Duration, min_coverage: f64) -> Result<TimeSeries> {
    let source = series
        .infer_step()
        .ok_or_else(|| Error::validation("cannot infer the sampling interval of the series"))?;
    let source_secs = source.num_seconds();
    let target_secs = target.num_seconds();
    if target_secs < source_secs || target_secs % source_secs != 0 {
        return Err(Error::configuration(format!(
            "target interval {target_secs}s must be a multiple of the source interval {source_secs}s"
        )));
    }
    if !(0.0..=1.0).contains(&min_coverage) {
        return Err(Error::configuration(format!(
            "minimum coverage must be in [0, 1], got {min_coverage}"
        )));
    }

    let expected = (target_secs / source_secs) as usize;
    let min_count = ((min_coverage * expected as f64).ceil() as usize).max(1);

    // Window label = window end, anchored to the epoch grid
    let mut windows: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for p in 0..series.len() {
        let secs = series.timestamp(p).and_utc().timestamp();
        let mut label = secs.div_euclid(target_secs) * target_secs;
        if label < secs {
            label += target_secs;
        }
        let slot = windows.entry(label).or_insert((0.0, 0));
        let v = series.value(p);
        if !v.is_nan() {
            slot.0 += v;
            slot.1 += 1;
        }
    }

    let first = *windows.keys().next().ok_or_else(|| {
        Error::validation("cannot resample an empty series")
    })?;
    let last = *windows.keys().next_back().expect("windows are non-empty");

    let mut index = Vec::new();
    let mut values = Vec::new();
    let mut label = first;
    while label <= last {
        let ts = DateTime::from_timestamp(label, 0)
            .expect("window label is a valid timestamp")
            .naive_utc();
        index.push(ts);
        match windows.get(&label) {
            Some((sum, count)) if *count >= min_count => values.push(sum / *count as f64),
            _ => values.push(f64::NAN),
        }
        label += target_secs;
    }

    TimeSeries::new(series.name(), index, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 6, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn group(interval_secs: i64, start: NaiveDateTime, values: Vec<f64>) -> FrequencyGroup {
        let interval = Duration::seconds(interval_secs);
        let series = TimeSeries::regular("TA", start, interval, values).unwrap();
        let mut tags = Tags::new();
        tags.insert(Tags::UNITS, "degC");
        tags.insert(Tags::VARIABLE, "TA");
        tags.insert(Tags::FREQ, format!("{interval_secs}s"));
        FrequencyGroup::new(interval, series, tags).unwrap()
    }

    #[test]
    fn two_frequency_history_is_merged_onto_the_finest_grid() {
        // Fine 60s group 10:00-10:04, coarse 600s records at 10:10 and 10:20
        let fine = group(60, ts(10, 0), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let coarse = group(600, ts(10, 10), vec![10.0, 20.0]);

        let result = harmonize(&[coarse, fine], 0.0).unwrap();

        assert_eq!(result.target, Duration::seconds(60));
        assert_eq!(result.contributing.len(), 2);
        // Span 10:00-10:20 at 60s: span/interval + 1 records
        assert_eq!(result.series.len(), 21);
        assert_eq!(result.series.timestamp(0), ts(10, 0));
        assert_eq!(result.series.timestamp(20), ts(10, 20));

        // Fine data wins on overlapping slots
        assert_eq!(result.series.value(0), 1.0);
        assert_eq!(result.series.value(4), 5.0);
        // Coarse values back-fill the slots they cover, bounded by the limit
        for p in 5..=10 {
            assert_eq!(result.series.value(p), 10.0, "slot {p}");
        }
        for p in 11..=20 {
            assert_eq!(result.series.value(p), 20.0, "slot {p}");
        }
    }

    #[test]
    fn slot_before_first_coarse_record_is_never_created() {
        // The coarse group starts the history; its first record back-fills
        // 10:01-10:10, so the synthetic 10:00 slot must not appear
        let coarse = group(600, ts(10, 10), vec![10.0]);
        let fine = group(60, ts(10, 15), vec![1.0, 2.0]);

        let result = harmonize(&[coarse, fine], 0.0).unwrap();
        assert_eq!(result.series.timestamp(0), ts(10, 1));
        assert_eq!(result.series.value(0), 10.0);
        // Between coarse coverage and fine start the grid is missing
        assert!(result.series.is_missing(10));
    }

    #[test]
    fn rare_frequency_is_rejected_as_noise() {
        let dominant = group(60, ts(10, 0), vec![1.0; 500]);
        let rare = group(600, ts(22, 0), vec![9.0, 9.0]);

        let result = harmonize(&[dominant, rare], 0.01).unwrap();
        assert_eq!(result.contributing, vec![Duration::seconds(60)]);
        // No trace of the rejected group in the output span
        assert!(result.series.timestamp(result.series.len() - 1) < ts(21, 0));
    }

    #[test]
    fn no_usable_frequency_is_a_configuration_error() {
        let a = group(60, ts(10, 0), vec![1.0; 5]);
        let b = group(600, ts(12, 0), vec![2.0; 5]);
        // Each group holds 50% of records; the threshold wants 60%
        assert!(matches!(
            harmonize(&[a, b], 0.6),
            Err(Error::Configuration { .. })
        ));
        assert!(matches!(
            harmonize(&[], 0.01),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn mixed_units_are_a_validation_error() {
        let a = group(60, ts(10, 0), vec![1.0; 5]);
        let mut b = group(60, ts(12, 0), vec![2.0; 5]);
        b.tags.insert(Tags::UNITS, "K");
        assert!(matches!(
            harmonize(&[a, b], 0.0),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn resample_aggregates_full_windows() {
        // 60s values 1..10 ending 10:01-10:10
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let series = TimeSeries::regular("TA", ts(10, 1), Duration::seconds(60), values).unwrap();

        let resampled = resample(&series, Duration::seconds(300), 0.9).unwrap();
        assert_eq!(resampled.len(), 2);
        assert_eq!(resampled.timestamp(0), ts(10, 5));
        assert_eq!(resampled.value(0), 3.0);
        assert_eq!(resampled.timestamp(1), ts(10, 10));
        assert_eq!(resampled.value(1), 8.0);
    }

    #[test]
    fn windows_below_minimum_coverage_become_missing() {
        let mut values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        values[2] = f64::NAN;
        let series = TimeSeries::regular("TA", ts(10, 1), Duration::seconds(60), values).unwrap();

        let resampled = resample(&series, Duration::seconds(300), 0.9).unwrap();
        assert!(resampled.is_missing(0));
        assert_eq!(resampled.value(1), 8.0);
    }

    #[test]
    fn resampled_tags_update_frequency_and_version() {
        let mut tags = Tags::new();
        tags.insert(Tags::UNITS, "degC");
        tags.insert(Tags::VARIABLE, "TA");
        tags.insert(Tags::FREQ, "60s");

        let updated = resampled_tags(&tags, Duration::seconds(1800));
        assert_eq!(updated.get(Tags::FREQ), Some("1800s"));
        assert_eq!(updated.get(Tags::DATA_VERSION), Some("screened"));
        assert_eq!(updated.units(), Some("degC"));
    }

    #[test]
    fn resample_rejects_finer_target() {
        let series =
            TimeSeries::regular("TA", ts(10, 0), Duration::seconds(600), vec![1.0, 2.0]).unwrap();
        assert!(matches!(
            resample(&series, Duration::seconds(60), 0.9),
            Err(Error::Configuration { .. })
        ));
    }
}
