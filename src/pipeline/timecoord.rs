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

//! Decoding of the WRF `Times` coordinate.
//!
//! WRF stores timestamps as a character matrix of shape
//! `(Time, DateStrLen)` holding strings like `2020-06-15_09:00:00`.

use crate::constants::{TIMES_VAR, WRF_TIME_FORMAT};
use crate::errors::JobError;
use chrono::NaiveDateTime;
use std::path::Path;

/// Decodes the time coordinate of an open raw file.
///
/// Always reads the raw file itself; auxiliary sources merged for the
/// augmentation carry their own `Times` which must not leak into the
/// fragment.
pub fn decode_times(file: &netcdf::File, path: &Path) -> Result<Vec<NaiveDateTime>, JobError> {
    let var = file
        .variable(TIMES_VAR)
        .ok_or_else(|| JobError::TimeDecode {
            path: path.to_path_buf(),
            reason: format!("no '{}' variable", TIMES_VAR),
        })?;

    let dims = var.dimensions();
    if dims.len() != 2 {
        return Err(JobError::TimeDecode {
            path: path.to_path_buf(),
            reason: format!(
                "'{}' has {} dimension(s), expected (Time, DateStrLen)",
                TIMES_VAR,
                dims.len()
            ),
        });
    }

    let steps = dims[0].len();
    let width = dims[1].len();
    if steps == 0 || width == 0 {
        return Err(JobError::TimeDecode {
            path: path.to_path_buf(),
            reason: "file contains no time steps".to_string(),
        });
    }

    let raw = var.get_values::<u8, _>(..)?;

    raw.chunks(width)
        .map(|chunk| {
            let text = std::str::from_utf8(chunk)
                .map_err(|_| JobError::TimeDecode {
                    path: path.to_path_buf(),
                    reason: "timestamp is not valid UTF-8".to_string(),
                })?
                .trim_end_matches(&['\0', ' '][..]);

            parse_wrf_timestamp(text).map_err(|reason| JobError::TimeDecode {
                path: path.to_path_buf(),
                reason,
            })
        })
        .collect()
}

/// Parses a single `YYYY-MM-DD_HH:MM:SS` timestamp.
fn parse_wrf_timestamp(text: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(text, WRF_TIME_FORMAT)
        .map_err(|err| format!("cannot parse timestamp '{}': {}", text, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn parses_wrf_timestamp() {
        let ts = parse_wrf_timestamp("2020-06-15_09:30:00").unwrap();

        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2020, 6, 15).unwrap());
        assert_eq!(ts.time().hour(), 9);
        assert_eq!(ts.time().minute(), 30);
    }

    #[test]
    fn rejects_non_wrf_separator() {
        assert!(parse_wrf_timestamp("2020-06-15 09:30:00").is_err());
        assert!(parse_wrf_timestamp("garbage").is_err());
    }

    #[test]
    fn rejects_truncated_timestamp() {
        assert!(parse_wrf_timestamp("2020-06-15_09:30").is_err());
    }
}
