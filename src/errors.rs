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

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostprocessError {
    #[error("Error while reading config.yaml: {0}")]
    Config(#[from] ConfigError),

    #[error("Error while creating ThreadPool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open config.yaml: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot deserialize config.yaml: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("Configuration component is out of bounds {0}")]
    OutOfBounds(&'static str),
}

/// Everything that can abort a single day job.
///
/// A failed day job is reported and counted by the driver but never
/// aborts the batch; a selection miss is a skip, not an error, and has
/// no variant here.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Companion 2D file not found: {path}")]
    CompanionMissing { path: PathBuf },

    #[error("Subsetting tool failed on {path}: {reason}")]
    SubsetTool { path: PathBuf, reason: String },

    #[error("Variable '{name}' not found in {path}")]
    MissingVariable { name: String, path: PathBuf },

    #[error("Cannot decode time coordinate of {path}: {reason}")]
    TimeDecode { path: PathBuf, reason: String },

    #[error("Time coordinate not chronological at step {index}: {previous} followed by {current}")]
    UnorderedTimes {
        index: usize,
        previous: chrono::NaiveDateTime,
        current: chrono::NaiveDateTime,
    },

    #[error("Output record rejected: {0}")]
    ShapeMismatch(String),
}
