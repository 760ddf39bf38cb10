//! Command implementations for the fluxqc CLI
//!
//! Contains the command execution logic: CSV input/output glue, pipeline
//! assembly from the screening configuration, and console summaries. The
//! core library stays free of file I/O; everything path-shaped lives here.

use crate::app::models::{Frame, TimeSeries};
use crate::app::services::daynight::{DayNightClassifier, SolarClassifier};
use crate::app::services::gapfill::{FillProvenance, GapFillOptions, KnnBootstrapRegressor};
use crate::app::services::outlier::{
    AbsoluteLimits, AbsoluteLimitsDayNight, LocalOutlierFactor, LocalOutlierFactorDayNight,
    LocalSd, MissingValues, OutlierTest, TrendResidualZScore, ZScore, ZScoreIncrements, ZScoreIqr,
};
use crate::app::services::penalty::{
    penalty_percentage, CriticalDaysConfig, NepPenalty, NepPenaltyConfig, VariableSet,
};
use crate::app::services::screening::StepwiseScreening;
use crate::app::services::{harmonize, qcf};
use crate::cli::args::{Args, Commands, PenaltyArgs, ScreenArgs};
use crate::config::{ScreeningConfig, StepId, VariableConfig};
use crate::constants::{
    DEFAULT_IQR_FACTOR, DEFAULT_LOCALSD_FACTOR, DEFAULT_LOCALSD_WINDOW, DEFAULT_LOF_NEIGHBORS,
    DEFAULT_TREND_WINDOW, DEFAULT_ZSCORE_THRESHOLD,
};
use crate::{Error, Result};
use chrono::{Duration, NaiveDateTime};
use colored::Colorize;
use std::path::Path;
use tracing::{info, warn};

/// Main command dispatcher
pub fn run(args: Args) -> Result<()> {
    match args.command {
        Some(Commands::Screen(screen_args)) => run_screen(screen_args),
        Some(Commands::Penalty(penalty_args)) => run_penalty(penalty_args),
        None => Ok(()),
    }
}

/// Set up structured logging to stderr
pub fn setup_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fluxqc={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

// =============================================================================
// screen command
// =============================================================================

fn run_screen(args: ScreenArgs) -> Result<()> {
    let config = ScreeningConfig::default();
    config.validate()?;
    let variable = config.assign(&args.measurement, &args.column, &args.units)?;

    let series = read_series(&args.input, &args.timestamp_col, &args.column)?;
    info!(
        "read {} records for '{}' from {}",
        series.len(),
        args.column,
        args.input.display()
    );

    let daynight = match (args.site_lat, args.site_lon) {
        (Some(lat), Some(lon)) => {
            let classifier = SolarClassifier::new(lat, lon, args.utc_offset)?;
            Some(classifier.classify(series.index())?)
        }
        _ => None,
    };

    let mut screening = StepwiseScreening::new(series, daynight.clone())?;
    for step in &variable.pipeline {
        let Some((test, repeat)) = build_test(*step, variable, daynight.is_some()) else {
            continue;
        };
        let (skipped, test_id) = {
            let preview = screening.run_test(test.as_ref(), repeat)?;
            (preview.report.was_skipped(), preview.test_id.clone())
        };
        if skipped {
            warn!("test {test_id} was skipped, flag not accepted");
            screening.discard_preview();
            continue;
        }
        screening.accept_last()?;
    }

    let result = qcf::aggregate(
        screening.raw_series(),
        screening.all_flags(),
        daynight.as_ref(),
        &config.qcf,
    )?;

    print_screen_summary(&args.column, &result);

    let output = args.resolved_output();
    write_screened(&output, screening.raw_series(), &result)?;
    println!("Cleaned series written to {}", output.display().to_string().cyan());

    if !args.no_resample {
        let resampled = harmonize::resample(
            &result.cleaned,
            Duration::seconds(config.resampling.target_secs),
            config.resampling.min_coverage,
        )?;
        let resampled_path = output.with_file_name(format!(
            "{}_30min.csv",
            output
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "out".to_string())
        ));
        write_series(&resampled_path, &resampled)?;
        println!(
            "Resampled series written to {}",
            resampled_path.display().to_string().cyan()
        );
    }

    Ok(())
}

/// Instantiate the test behind a pipeline step; steps that cannot run in
/// this session (no day/night partition, no manual ranges) are skipped
fn build_test(
    step: StepId,
    variable: &VariableConfig,
    has_daynight: bool,
) -> Option<(Box<dyn OutlierTest>, bool)> {
    let (min, max) = variable.absolute_limits;
    match step {
        StepId::MissingValues => Some((Box::new(MissingValues::new()), false)),
        StepId::AbsoluteLimits => Some((Box::new(AbsoluteLimits::new(min, max)), false)),
        StepId::AbsoluteLimitsDayNight => {
            if !has_daynight {
                warn!("skipping day/night absolute limits: no site coordinates given");
                return None;
            }
            Some((
                Box::new(AbsoluteLimitsDayNight::new((min, max), (min, max))),
                false,
            ))
        }
        StepId::ZScore => Some((Box::new(ZScore::new(DEFAULT_ZSCORE_THRESHOLD)), true)),
        StepId::ZScoreIncrements => Some((
            Box::new(ZScoreIncrements::new(DEFAULT_ZSCORE_THRESHOLD)),
            true,
        )),
        StepId::ZScoreIqr => Some((
            Box::new(ZScoreIqr::new(DEFAULT_IQR_FACTOR, DEFAULT_ZSCORE_THRESHOLD)),
            true,
        )),
        StepId::LocalOutlierFactor => Some((
            Box::new(LocalOutlierFactor::new(DEFAULT_LOF_NEIGHBORS, None)),
            true,
        )),
        StepId::LocalOutlierFactorDayNight => {
            if !has_daynight {
                warn!("skipping day/night LOF: no site coordinates given");
                return None;
            }
            Some((
                Box::new(LocalOutlierFactorDayNight::new(
                    DEFAULT_LOF_NEIGHBORS,
                    DEFAULT_LOF_NEIGHBORS,
                    None,
                )),
                true,
            ))
        }
        StepId::LocalSd => Some((
            Box::new(LocalSd::new(DEFAULT_LOCALSD_WINDOW, DEFAULT_LOCALSD_FACTOR)),
            true,
        )),
        StepId::TrendResidual => Some((
            Box::new(TrendResidualZScore::new(
                DEFAULT_TREND_WINDOW,
                DEFAULT_ZSCORE_THRESHOLD,
            )),
            true,
        )),
        StepId::ManualRemoval => {
            warn!("skipping manual removal: no removal ranges available in this session");
            None
        }
    }
}

fn print_screen_summary(column: &str, result: &qcf::QcfResult) {
    println!();
    println!("{}", format!("Screening summary for {column}").bold());
    println!("{}", "=".repeat(40));
    for contribution in &result.contributions {
        println!(
            "  {:<45} {:>8} rejected",
            contribution.flag_name, contribution.n_rejected
        );
    }
    println!("{}", "-".repeat(40));
    let total = format!("{} of {} timestamps rejected overall", result.n_rejected, result.qcf.len());
    if result.n_rejected > 0 {
        println!("  {}", total.yellow());
    } else {
        println!("  {}", total.green());
    }
}

// =============================================================================
// penalty command
// =============================================================================

fn run_penalty(args: PenaltyArgs) -> Result<()> {
    let columns = [
        args.nep_col.as_str(),
        args.ta_col.as_str(),
        args.rh_col.as_str(),
        args.swin_col.as_str(),
        args.vpd_col.as_str(),
    ];
    let frame = read_frame(&args.input, &args.timestamp_col, &columns)?;
    info!(
        "read {} records over {} columns from {}",
        frame.len(),
        columns.len(),
        args.input.display()
    );

    let critical_days =
        CriticalDaysConfig::new(args.critical_threshold, args.near_critical_threshold)?
            .with_months(args.start_month, args.end_month)?;
    let mut config = NepPenaltyConfig::new(critical_days)
        .with_gapfill(GapFillOptions::default().with_seed(args.seed));
    if args.no_unit_conversion {
        config = config.without_unit_conversion();
    }

    let variables = VariableSet {
        flux: args.nep_col.clone(),
        temperature: args.ta_col.clone(),
        radiation: args.swin_col.clone(),
        vpd: args.vpd_col.clone(),
        relative_humidity: args.rh_col.clone(),
    };

    let mut penalty = NepPenalty::new(frame, variables, config)?;
    penalty.calculate(&KnnBootstrapRegressor::default())?;
    let report = penalty.report()?;

    print_penalty_summary(report);

    let output = args.resolved_output();
    write_penalty(&output, report)?;
    println!("Penalty series written to {}", output.display().to_string().cyan());

    Ok(())
}

fn print_penalty_summary(report: &crate::app::services::penalty::PenaltyReport) {
    println!();
    println!("{}", "NEP penalty per year".bold());
    println!("{}", "=".repeat(72));
    println!(
        "  {:<6} {:>12} {:>12} {:>12} {:>10} {:>10}",
        "year", "observed", "potential", "penalty", "CRDs", "perc"
    );
    for year in &report.per_year {
        let perc = match penalty_percentage(year.observed, year.potential) {
            Some(p) => format!("{p:.1}%"),
            None => "n/a".to_string(),
        };
        let line = format!(
            "  {:<6} {:>12.1} {:>12.1} {:>12.1} {:>10} {:>10}",
            year.year, year.observed, year.potential, year.penalty, year.critical_days, perc
        );
        if Some(year.year) == report.worst_year {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }
    if let Some(worst) = report.worst_year {
        println!("{}", "-".repeat(72));
        println!("  Worst year: {}", worst.to_string().red().bold());
    }
}

// =============================================================================
// CSV input/output glue
// =============================================================================

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let mut last_error = None;
    for format in TIMESTAMP_FORMATS {
        match NaiveDateTime::parse_from_str(raw, format) {
            Ok(ts) => return Ok(ts),
            Err(err) => last_error = Some(err),
        }
    }
    Err(Error::datetime_parsing(
        format!("cannot parse timestamp '{raw}'"),
        last_error.expect("at least one format was tried"),
    ))
}

fn parse_value(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "NA" || trimmed == "NaN" || trimmed == "-9999" {
        return Ok(f64::NAN);
    }
    trimmed
        .parse::<f64>()
        .map_err(|_| Error::validation(format!("cannot parse value '{trimmed}' as a number")))
}

fn column_position(headers: &csv::StringRecord, name: &str, file: &Path) -> Result<usize> {
    headers.iter().position(|h| h == name).ok_or_else(|| {
        Error::csv_parsing(
            file.display().to_string(),
            format!("column '{name}' not found in header"),
            None,
        )
    })
}

/// Read one timestamped column from a CSV file
fn read_series(path: &Path, timestamp_col: &str, column: &str) -> Result<TimeSeries> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::csv_parsing(path.display().to_string(), "cannot open file", Some(e)))?;
    let headers = reader.headers()?.clone();
    let ts_pos = column_position(&headers, timestamp_col, path)?;
    let value_pos = column_position(&headers, column, path)?;

    let mut index = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        index.push(parse_timestamp(&record[ts_pos])?);
        values.push(parse_value(&record[value_pos])?);
    }
    TimeSeries::new(column, index, values)
}

/// Read several timestamped columns from a CSV file into a frame
fn read_frame(path: &Path, timestamp_col: &str, columns: &[&str]) -> Result<Frame> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::csv_parsing(path.display().to_string(), "cannot open file", Some(e)))?;
    let headers = reader.headers()?.clone();
    let ts_pos = column_position(&headers, timestamp_col, path)?;
    let positions: Vec<usize> = columns
        .iter()
        .map(|c| column_position(&headers, c, path))
        .collect::<Result<_>>()?;

    let mut index = Vec::new();
    let mut data: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];
    for record in reader.records() {
        let record = record?;
        index.push(parse_timestamp(&record[ts_pos])?);
        for (slot, &pos) in data.iter_mut().zip(positions.iter()) {
            slot.push(parse_value(&record[pos])?);
        }
    }

    let mut frame = Frame::new(index)?;
    for (name, values) in columns.iter().zip(data.into_iter()) {
        frame.insert(name.to_string(), values)?;
    }
    Ok(frame)
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        format!("{v}")
    }
}

fn write_screened(path: &Path, raw: &TimeSeries, result: &qcf::QcfResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let qc_col = format!("{}_QC", raw.name());
    writer.write_record(["TIMESTAMP_END", raw.name(), qc_col.as_str(), "QCF"])?;
    for p in 0..raw.len() {
        writer.write_record([
            raw.timestamp(p).format(OUTPUT_TIMESTAMP_FORMAT).to_string(),
            format_value(raw.value(p)),
            format_value(result.cleaned.value(p)),
            result.qcf[p].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_series(path: &Path, series: &TimeSeries) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["TIMESTAMP_END", series.name()])?;
    for p in 0..series.len() {
        writer.write_record([
            series.timestamp(p).format(OUTPUT_TIMESTAMP_FORMAT).to_string(),
            format_value(series.value(p)),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_penalty(path: &Path, report: &crate::app::services::penalty::PenaltyReport) -> Result<()> {
    let hires = &report.hires;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "TIMESTAMP_END",
        "OBSERVED",
        "POTENTIAL",
        "PENALTY",
        "CUMSUM_PENALTY",
        "SOURCE",
        "FLAG_CRD",
        "FLAG_nCRD",
    ])?;
    for p in 0..hires.index.len() {
        let source = match hires.provenance[p] {
            FillProvenance::Observed => "observed",
            FillProvenance::Modeled => "modeled",
        };
        writer.write_record([
            hires.index[p].format(OUTPUT_TIMESTAMP_FORMAT).to_string(),
            format_value(hires.observed[p]),
            format_value(hires.potential[p]),
            format_value(hires.penalty[p]),
            format_value(hires.cum_penalty[p]),
            source.to_string(),
            u8::from(hires.critical[p]).to_string(),
            u8::from(hires.near_critical[p]).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
