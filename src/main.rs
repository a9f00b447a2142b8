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

//! wrfpost generates postprocessed per-variable, per-day NetCDF files
//! from raw WRF model output (wrfout/wrfprec/wrf3hrly files).
//!
//! For every configured run, variable and calendar day the pipeline
//! selects the matching raw files, optionally merges auxiliary 2D and
//! geography fields into the dataset, derives the requested variable,
//! concatenates the day's fragments along the time axis and writes a
//! single output file. Days are processed concurrently on a bounded
//! worker pool.

mod constants;
mod errors;
mod pipeline;


use cap::Cap;
use env_logger::Env;
use log::{error, info};
use std::alloc;

type Float = f64;

/// Global allocator used by the postprocessor.
///
/// Use of static global allocator allows for capping the memory to the limit set by user
/// in configuration file and in effect provide better [OOM error](https://en.wikipedia.org/wiki/Out_of_memory) handling.
#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

/// The main program function.
/// Prepares the runtime environment and calls the [`pipeline::main`].
///
/// The `env_logger` needs to be initiated before any log messages are
/// possible to occur, including those emitted while the configuration
/// is still being read.
fn main() {
    #[cfg(not(feature = "debug"))]
    let logger_env = Env::new().filter_or("WRFPOST_LOG_LEVEL", "info");

    #[cfg(feature = "debug")]
    let logger_env = Env::new().filter_or("WRFPOST_LOG_LEVEL", "debug");

    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    match pipeline::main() {
        Ok(summary) => info!(
            "Postprocessing finished: {} day files written, {} days skipped, {} days failed.",
            summary.written, summary.skipped, summary.failed
        ),
        Err(err) => error!("Postprocessing failed with error: {}", err),
    }
}
