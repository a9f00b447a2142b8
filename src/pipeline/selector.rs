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

//! Selection of the raw files belonging to one calendar day.

use crate::constants::FILE_DATE_FORMAT;
use crate::errors::JobError;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the lexicographically sorted raw files of `date`.
///
/// A file matches when its name starts with
/// `{pattern}_{domain}_{YYYY-MM-DD}`, the literal equivalent of the
/// glob `{pattern}_{domain}_{date}*`. No date parsing happens here; the
/// date is only interpolated into the prefix. An empty result is valid
/// and the caller decides how to report it.
///
/// The sorted order is what the aggregator later relies on for
/// chronological concatenation, so it must never be changed to a
/// directory-order scan.
pub fn select_raw_files(
    input_dir: &Path,
    pattern: &str,
    domain: &str,
    date: NaiveDate,
) -> Result<Vec<PathBuf>, JobError> {
    let prefix = format!("{}_{}_{}", pattern, domain, date.format(FILE_DATE_FORMAT));

    let mut matches: Vec<PathBuf> = fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(&prefix))
                .unwrap_or(false)
        })
        .collect();

    matches.sort();

    Ok(matches)
}
