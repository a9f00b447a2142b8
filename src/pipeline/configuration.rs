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

//! Module responsible for parsing and checking the configuration file.
//!
//! The configuration file uses [YAML](https://en.wikipedia.org/wiki/YAML)
//! and `serde` to enforce strong typing and automatic type checking.
//!
//! The structures and their fields in this module directly correspond to
//! the fields inside `config.yaml` so you can check this documentation
//! for more details how to set the config file.
//!
//! The whole configuration is read once at startup into an immutable
//! [`Config`] which is then shared by reference with the driver and the
//! day-job workers.

use crate::constants::DEFAULT_WORKERS;
use crate::errors::ConfigError;
use chrono::NaiveDate;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// A single year-month, used for the processing window edges.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Deserialize)]
pub struct YearMonth {
    pub year: i32,

    /// Must meet the condition: `1 <= month <= 12`
    pub month: u32,
}

impl YearMonth {
    /// First day of this year-month as a calendar date.
    pub fn first_day(self) -> NaiveDate {
        // month validity is enforced by check_bounds before any use
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .expect("year-month validated at startup")
    }
}

/// Fields with the processing window information.
///
/// Days are enumerated from the first day of `start` up to, but not
/// including, the first day of `end`. The driver advances through the
/// window in whole-year increments clamped to the end boundary.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Window {
    pub start: YearMonth,
    pub end: YearMonth,
}

impl Window {
    /// Checks if the window edges are valid and properly ordered.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if !(1..=12).contains(&self.start.month) || !(1..=12).contains(&self.end.month) {
            return Err(ConfigError::OutOfBounds(
                "Window months must be between 1 and 12",
            ));
        }

        if self.end <= self.start {
            return Err(ConfigError::OutOfBounds(
                "Window end must be after window start",
            ));
        }

        Ok(())
    }
}

/// Fields describing the raw file naming scheme and the filesystem
/// layout on both the input and the output side.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Files {
    /// Raw filename pattern token (e.g. `wrfprec` or `wrf3hrly`).
    /// Raw files are expected to be named `{pattern}_{domain}_{date}*`.
    pub pattern: String,

    /// Model domain tag (e.g. `d01`).
    pub domain: String,

    /// Institution tag used as the output filename prefix.
    pub institution: String,

    /// Root of the raw model output. Files for a run live under
    /// `{raw_root}/{run}/out/`.
    pub raw_root: PathBuf,

    /// Root of the postprocessed output. Files for a run are written
    /// under `{output_root}/{run}/`.
    pub output_root: PathBuf,

    /// Static geography file merged into the dataset during the
    /// split-layout augmentation.
    pub geography_file: PathBuf,

    /// Reference file from which `XLAT`/`XLONG` are copied into every
    /// output file.
    pub reference_file: PathBuf,
}

impl Files {
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.pattern.is_empty() || self.domain.is_empty() {
            return Err(ConfigError::OutOfBounds(
                "File pattern and domain tag cannot be empty",
            ));
        }

        if self.institution.is_empty() {
            return Err(ConfigError::OutOfBounds(
                "Institution tag cannot be empty",
            ));
        }

        Ok(())
    }

    /// Directory holding the raw files of `run`.
    pub fn input_dir(&self, run: &str) -> PathBuf {
        self.raw_root.join(run).join("out")
    }

    /// Directory receiving the day files of `run`.
    pub fn output_dir(&self, run: &str) -> PathBuf {
        self.output_root.join(run)
    }
}

/// _(Optional)_ Fields with information about
/// resources available for the postprocessor.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Resources {
    /// _(Optional)_ Worker count of the day-job pool.
    ///
    /// Cannot be less than `1`. Defaults to `10`.
    #[serde(default = "Resources::default_threads")]
    pub threads: u16,

    /// _(Optional)_ Heap memory limit for the process in MB.
    /// Useful for enabling meaningful Out-of-memory error messages.
    ///
    /// Cannot be less than `128`. Defaults to whole addressable space.
    #[serde(default = "Resources::default_memory")]
    pub memory: usize,
}

impl Resources {
    fn default_threads() -> u16 {
        DEFAULT_WORKERS
    }

    fn default_memory() -> usize {
        usize::MAX / (1024 * 1024)
    }

    /// Checks if thread count and memory limit are
    /// above limits.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.threads < 1 {
            return Err(ConfigError::OutOfBounds(
                "Available threads cannot be less than 1",
            ));
        }

        if self.memory < 128 {
            return Err(ConfigError::OutOfBounds(
                "Available memory cannot be less than 128 MB",
            ));
        }

        Ok(())
    }
}

impl Default for Resources {
    fn default() -> Self {
        Resources {
            threads: Resources::default_threads(),
            memory: Resources::default_memory(),
        }
    }
}

/// Main config structure representing the fields in
/// configuration file.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Config {
    /// Run identifiers, processed sequentially.
    pub runs: Vec<String>,

    /// Variables to derive, processed sequentially within each window.
    pub variables: Vec<String>,

    pub window: Window,

    pub files: Files,

    #[serde(default)]
    pub resources: Resources,
}

impl Config {
    /// Config structure constructor, responsible for
    /// deserializing configuration and checking it.
    pub fn new_from_file(file_path: &Path) -> Result<Config, ConfigError> {
        let data = fs::read(file_path)?;
        let config: Config = serde_yaml::from_slice(data.as_slice())?;

        config.check_bounds()?;

        Ok(config)
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.runs.is_empty() {
            return Err(ConfigError::OutOfBounds("Run list cannot be empty"));
        }

        if self.variables.is_empty() {
            return Err(ConfigError::OutOfBounds("Variable list cannot be empty"));
        }

        self.window.check_bounds()?;
        self.files.check_bounds()?;
        self.resources.check_bounds()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_yaml() -> &'static str {
        r#"
runs: ["EPICC_2km_ERA5", "EPICC_2km_ERA5_CMIP5anom"]
variables: ["RAIN"]
window:
  start: { year: 2013, month: 1 }
  end: { year: 2021, month: 1 }
files:
  pattern: "wrfprec"
  domain: "d01"
  institution: "UIB"
  raw_root: "/vg6/WRF_OUT"
  output_root: "/vg6/postprocessed"
  geography_file: "/vg6/geo/geo_em.d01.nc"
  reference_file: "/vg6/geo/wrfout_ref.nc"
"#
    }

    #[test]
    fn deserializes_and_defaults_resources() {
        let config: Config = serde_yaml::from_str(example_yaml()).unwrap();
        config.check_bounds().unwrap();

        assert_eq!(config.runs.len(), 2);
        assert_eq!(config.resources.threads, DEFAULT_WORKERS);
        assert_eq!(
            config.files.input_dir("EPICC_2km_ERA5"),
            PathBuf::from("/vg6/WRF_OUT/EPICC_2km_ERA5/out")
        );
        assert_eq!(
            config.files.output_dir("EPICC_2km_ERA5"),
            PathBuf::from("/vg6/postprocessed/EPICC_2km_ERA5")
        );
    }

    #[test]
    fn rejects_inverted_window() {
        let mut config: Config = serde_yaml::from_str(example_yaml()).unwrap();
        config.window.end = YearMonth {
            year: 2012,
            month: 6,
        };

        assert!(matches!(
            config.check_bounds(),
            Err(ConfigError::OutOfBounds(_))
        ));
    }

    #[test]
    fn rejects_month_out_of_range() {
        let mut config: Config = serde_yaml::from_str(example_yaml()).unwrap();
        config.window.start.month = 13;

        assert!(config.check_bounds().is_err());
    }

    #[test]
    fn rejects_empty_variable_list() {
        let mut config: Config = serde_yaml::from_str(example_yaml()).unwrap();
        config.variables.clear();

        assert!(config.check_bounds().is_err());
    }

    #[test]
    fn year_month_ordering_matches_calendar() {
        let earlier = YearMonth {
            year: 2020,
            month: 12,
        };
        let later = YearMonth {
            year: 2021,
            month: 1,
        };

        assert!(earlier < later);
        assert_eq!(
            later.first_day(),
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
        );
    }
}
