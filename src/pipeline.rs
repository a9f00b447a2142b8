/*
Copyright 2024 wrfpost developers

This file is part of wrfpost.

wrfpost is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

wrfpost is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with wrfpost. If not, see https://www.gnu.org/licenses/.
*/

//! Module containing the actual pipeline code.
//!
//! The driver walks runs sequentially, advances a year-sized window
//! through the configured date range and, per variable, fans the
//! window's calendar days out onto a bounded worker pool. Each day job
//! runs the select/build/aggregate/write pipeline independently; a
//! failed day is reported and counted but never aborts the batch.

pub mod compute;
pub mod configuration;
pub mod dataset;
pub mod fragment;
pub mod output;
pub mod selector;
pub mod subset;
pub mod timecoord;

use crate::{
    constants::FILE_DATE_FORMAT,
    errors::{JobError, PostprocessError},
    pipeline::{
        compute::{ComputeVariable, DirectExtract},
        configuration::Config,
        fragment::FragmentContext,
        output::DayRecord,
    },
    ALLOCATOR,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use indicatif::ProgressBar;
use log::{debug, error, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{mpsc::channel, Arc},
    time::Instant,
};

/// Structure containing the pipeline runtime.
///
/// Configuration and the worker pool are prepared once, before any day
/// job is dispatched.
pub struct Core {
    pub config: Config,
    pub threadpool: ThreadPool,
}

impl Core {
    /// Pipeline [`Core`] constructor.
    ///
    /// Configuration provided by the user must be loaded and checked
    /// before any worker starts.
    pub fn new() -> Result<Self, PostprocessError> {
        debug!("Reading configuration from config.yaml");
        let config = Config::new_from_file(Path::new("config.yaml"))?;

        debug!("Setting memory limit");
        ALLOCATOR
            .set_limit(config.resources.memory * 1024 * 1024)
            .unwrap();

        debug!("Setting up ThreadPool");
        let threadpool = ThreadPoolBuilder::new()
            .num_threads(config.resources.threads as usize)
            .build()?;

        Ok(Core { config, threadpool })
    }
}

/// Counters of day-job outcomes over the whole batch.
#[derive(Default, Debug)]
pub struct BatchSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of one successfully finished day job.
pub enum DayReport {
    /// No raw file matched the day; nothing was written.
    Skipped,
    /// One output file was written.
    Written {
        path: PathBuf,
        steps: usize,
        last: NaiveDateTime,
    },
}

/// Main pipeline function, responsible for the whole batch.
///
/// It reads the provided configuration, walks every configured run and
/// dispatches day jobs onto the threadpool, gathering outcome counts.
pub fn main() -> Result<BatchSummary, PostprocessError> {
    info!("Preparing the postprocessing core");

    let core = Core::new()?;
    let computer: Arc<dyn ComputeVariable> = Arc::new(DirectExtract);

    let config = Arc::new(core.config);
    let mut summary = BatchSummary::default();

    for run in &config.runs {
        let run_clock = Instant::now();
        info!("Processing run {}", run);

        process_run(&core.threadpool, &config, &computer, run, &mut summary)?;

        info!(
            "======> Run {} done in {:.2} seconds",
            run,
            run_clock.elapsed().as_secs_f64()
        );
    }

    Ok(summary)
}

/// Processes a single run: pre-creates the output directory, then walks
/// the window cursor and the variable list, dispatching day batches.
fn process_run(
    threadpool: &ThreadPool,
    config: &Arc<Config>,
    computer: &Arc<dyn ComputeVariable>,
    run: &str,
    summary: &mut BatchSummary,
) -> Result<(), PostprocessError> {
    // created once here so a write failure inside a job is abnormal
    let output_dir = config.files.output_dir(run);
    fs::create_dir_all(&output_dir).map_err(|source| PostprocessError::OutputDir {
        path: output_dir.clone(),
        source,
    })?;

    for (window_start, window_end) in windows(config) {
        let days = enumerate_days(window_start, window_end);
        debug!(
            "Window {} .. {}: {} days",
            window_start,
            window_end,
            days.len()
        );

        for variable in &config.variables {
            dispatch_days(threadpool, config, computer, run, variable, &days, summary);
        }
    }

    Ok(())
}

/// Year-sized windows covering the configured range, clamped to the
/// exclusive end boundary.
fn windows(config: &Config) -> Vec<(NaiveDate, NaiveDate)> {
    let end_boundary = config.window.end.first_day();
    let mut cursor = config.window.start.first_day();

    let mut spans = Vec::new();
    while cursor < end_boundary {
        let next = cursor
            .with_year(cursor.year() + 1)
            .expect("first-of-month date is valid in every year")
            .min(end_boundary);
        spans.push((cursor, next));
        cursor = next;
    }

    spans
}

/// Every calendar day in `[start, end)`.
fn enumerate_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = start;
    while day < end {
        days.push(day);
        day = day.succ_opt().expect("date range stays within chrono bounds");
    }
    days
}

/// Submits one batch of day jobs for a variable and blocks until every
/// job finished. Job failures are logged with their (run, variable,
/// date) context and counted; they do not stop the batch.
fn dispatch_days(
    threadpool: &ThreadPool,
    config: &Arc<Config>,
    computer: &Arc<dyn ComputeVariable>,
    run: &str,
    variable: &str,
    days: &[NaiveDate],
    summary: &mut BatchSummary,
) {
    info!("{} {}: dispatching {} day jobs", run, variable, days.len());
    let progress = ProgressBar::new(days.len() as u64);

    let (tx, rx) = channel();

    for &date in days {
        let tx = tx.clone();
        let config = Arc::clone(config);
        let computer = Arc::clone(computer);
        let run = run.to_string();
        let variable = variable.to_string();

        threadpool.spawn(move || {
            let report = process_day(&config, computer.as_ref(), &run, &variable, date);
            tx.send((date, report)).unwrap();
        });
    }

    for _ in 0..days.len() {
        let (date, report) = rx.recv().expect("Receiving day job result failed");

        match report {
            Ok(DayReport::Written { path, steps, last }) => {
                info!(
                    "{} {} {}: wrote {} ({} steps, last {})",
                    run,
                    variable,
                    date,
                    path.display(),
                    steps,
                    last
                );
                summary.written += 1;
            }
            Ok(DayReport::Skipped) => {
                summary.skipped += 1;
            }
            Err(err) => {
                error!("{} {} {}: day job failed: {}", run, variable, date, err);
                summary.failed += 1;
            }
        }

        progress.inc(1);
    }

    progress.finish_and_clear();
}

/// Runs the whole pipeline for one (run, variable, day).
pub fn process_day(
    config: &Config,
    computer: &dyn ComputeVariable,
    run: &str,
    variable: &str,
    date: NaiveDate,
) -> Result<DayReport, JobError> {
    let day_clock = Instant::now();

    let files = selector::select_raw_files(
        &config.files.input_dir(run),
        &config.files.pattern,
        &config.files.domain,
        date,
    )?;

    if files.is_empty() {
        warn!("{} {} {}: no raw files match, day skipped", run, variable, date);
        return Ok(DayReport::Skipped);
    }

    debug!("{} {} {}: {} raw file(s)", run, variable, date, files.len());

    let context = FragmentContext {
        run,
        variable,
        date,
        pattern: &config.files.pattern,
        geography_file: &config.files.geography_file,
    };

    let mut fragments = Vec::with_capacity(files.len());
    let mut atts = None;
    for file in &files {
        let (frag, frag_atts) = fragment::build_fragment(&context, file, computer)?;
        fragments.push(frag);
        atts = Some(frag_atts);
    }
    let atts = atts.expect("at least one fragment was built");

    let (values, times) = output::aggregate(fragments)?;
    let (lat, lon) = output::read_reference_coords(&config.files.reference_file)?;

    let last = *times.last().expect("aggregate keeps at least one step");
    let steps = times.len();

    let record = DayRecord {
        values,
        varname: variable.to_string(),
        atts,
        lat,
        lon,
        times,
    };

    let out_path = config.files.output_dir(run).join(format!(
        "{}_{}_{}.nc",
        config.files.institution,
        variable,
        date.format(FILE_DATE_FORMAT)
    ));
    output::write_day_output(&record, &out_path)?;

    debug!(
        "======> {} {} {} done in {:.2} seconds",
        run,
        variable,
        date,
        day_clock.elapsed().as_secs_f64()
    );

    Ok(DayReport::Written {
        path: out_path,
        steps,
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::configuration::{Window, YearMonth};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn config_with_window(start: (i32, u32), end: (i32, u32)) -> Config {
        let yaml = r#"
runs: ["TEST"]
variables: ["RAIN"]
window:
  start: { year: 2000, month: 1 }
  end: { year: 2001, month: 1 }
files:
  pattern: "wrfprec"
  domain: "d01"
  institution: "INST"
  raw_root: "/raw"
  output_root: "/out"
  geography_file: "/geo/geo_em.d01.nc"
  reference_file: "/geo/wrfout_ref.nc"
"#;
        let mut config: Config = serde_yaml::from_str(yaml).unwrap();
        config.window = Window {
            start: YearMonth {
                year: start.0,
                month: start.1,
            },
            end: YearMonth {
                year: end.0,
                month: end.1,
            },
        };
        config
    }

    #[test]
    fn windows_advance_one_year_clamped_to_end() {
        let config = config_with_window((2020, 1), (2021, 3));

        assert_eq!(
            windows(&config),
            vec![
                (date(2020, 1, 1), date(2021, 1, 1)),
                (date(2021, 1, 1), date(2021, 3, 1)),
            ]
        );
    }

    #[test]
    fn windows_single_span_when_range_is_short() {
        let config = config_with_window((2020, 5), (2020, 8));

        assert_eq!(windows(&config), vec![(date(2020, 5, 1), date(2020, 8, 1))]);
    }

    #[test]
    fn windows_mid_year_start_keeps_anniversary_boundaries() {
        let config = config_with_window((2019, 7), (2021, 7));

        assert_eq!(
            windows(&config),
            vec![
                (date(2019, 7, 1), date(2020, 7, 1)),
                (date(2020, 7, 1), date(2021, 7, 1)),
            ]
        );
    }

    #[test]
    fn enumerate_days_covers_leap_year() {
        let days = enumerate_days(date(2020, 1, 1), date(2021, 1, 1));

        assert_eq!(days.len(), 366);
        assert_eq!(days[0], date(2020, 1, 1));
        assert_eq!(*days.last().unwrap(), date(2020, 12, 31));
    }

    #[test]
    fn enumerate_days_end_is_exclusive() {
        let days = enumerate_days(date(2021, 1, 1), date(2021, 3, 1));

        assert_eq!(days.len(), 31 + 28);
        assert_eq!(*days.last().unwrap(), date(2021, 2, 28));
    }

    #[test]
    fn enumerate_days_empty_for_degenerate_range() {
        assert!(enumerate_days(date(2021, 1, 1), date(2021, 1, 1)).is_empty());
    }
}
