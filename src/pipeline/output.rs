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

//! Day Aggregator & Writer.
//!
//! Fragments of one day are concatenated along the time axis in input
//! order, packed into a typed [`DayRecord`] and written as a single
//! NetCDF file. The record is validated before any file is created, so
//! a malformed day never leaves a partial output behind.

use crate::constants::{LAT_VAR, LON_VAR, OUTPUT_TIME_BASE, OUTPUT_TIME_UNITS};
use crate::errors::JobError;
use crate::pipeline::compute::VarAttributes;
use crate::pipeline::fragment::Fragment;
use crate::Float;
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::{Array2, ArrayD, Axis};
use std::path::Path;

/// Typed output record for one (run, variable, day).
///
/// `lat`/`lon` come from the configured reference file; `atts` from the
/// variable computation. The record is the whole contract of the
/// writer, nothing else flows into the output file.
pub struct DayRecord {
    pub values: ArrayD<Float>,
    pub varname: String,
    pub atts: VarAttributes,
    pub lat: Array2<Float>,
    pub lon: Array2<Float>,
    pub times: Vec<NaiveDateTime>,
}

impl DayRecord {
    /// Checks the internal shape consistency of the record.
    pub fn validate(&self) -> Result<(), JobError> {
        let rank = self.values.ndim();
        if rank != 3 && rank != 4 {
            return Err(JobError::ShapeMismatch(format!(
                "variable '{}' has rank {}, expected 3 (time, y, x) or 4 (time, lev, y, x)",
                self.varname, rank
            )));
        }

        let shape = self.values.shape();
        if self.times.len() != shape[0] {
            return Err(JobError::ShapeMismatch(format!(
                "time coordinate has {} entries but the array holds {} steps",
                self.times.len(),
                shape[0]
            )));
        }

        let spatial = (shape[rank - 2], shape[rank - 1]);
        if self.lat.dim() != spatial || self.lon.dim() != spatial {
            return Err(JobError::ShapeMismatch(format!(
                "lat {:?} / lon {:?} do not match the spatial shape {:?}",
                self.lat.dim(),
                self.lon.dim(),
                spatial
            )));
        }

        Ok(())
    }
}

/// Concatenates the day's fragments along the time axis, in input
/// order.
///
/// No sorting or deduplication happens here; the selector's sorted
/// order is trusted but verified. A non-increasing time coordinate
/// means the filename order was not chronological and the day is
/// rejected.
pub fn aggregate(fragments: Vec<Fragment>) -> Result<(ArrayD<Float>, Vec<NaiveDateTime>), JobError> {
    let views: Vec<_> = fragments.iter().map(|frag| frag.values.view()).collect();
    let values = ndarray::concatenate(Axis(0), &views)
        .map_err(|err| JobError::ShapeMismatch(format!("fragments do not concatenate: {}", err)))?;

    let times: Vec<NaiveDateTime> = fragments
        .iter()
        .flat_map(|frag| frag.times.iter().copied())
        .collect();

    for index in 1..times.len() {
        if times[index] <= times[index - 1] {
            return Err(JobError::UnorderedTimes {
                index,
                previous: times[index - 1],
                current: times[index],
            });
        }
    }

    Ok((values, times))
}

/// Reads `XLAT`/`XLONG` at the first time index of the reference file.
pub fn read_reference_coords(path: &Path) -> Result<(Array2<Float>, Array2<Float>), JobError> {
    let file = netcdf::open(path)?;

    let lat = read_coord(&file, LAT_VAR, path)?;
    let lon = read_coord(&file, LON_VAR, path)?;

    Ok((lat, lon))
}

fn read_coord(file: &netcdf::File, name: &str, path: &Path) -> Result<Array2<Float>, JobError> {
    let var = file.variable(name).ok_or_else(|| JobError::MissingVariable {
        name: name.to_string(),
        path: path.to_path_buf(),
    })?;

    let dims = var.dimensions();
    let (shape, data) = match dims.len() {
        // (Time, y, x): only the first time index is wanted
        3 => {
            let shape = (dims[1].len(), dims[2].len());
            (shape, var.get_values::<Float, _>((0, .., ..))?)
        }
        2 => {
            let shape = (dims[0].len(), dims[1].len());
            (shape, var.get_values::<Float, _>(..)?)
        }
        other => {
            return Err(JobError::ShapeMismatch(format!(
                "coordinate '{}' has rank {}, expected 2 or 3",
                name, other
            )))
        }
    };

    Array2::from_shape_vec(shape, data).map_err(|err| JobError::ShapeMismatch(err.to_string()))
}

/// Writes the record to `path`, overwriting any previous day file.
pub fn write_day_output(record: &DayRecord, path: &Path) -> Result<(), JobError> {
    record.validate()?;

    if path.exists() {
        std::fs::remove_file(path)?;
    }

    let mut file = netcdf::create(path)?;

    let shape = record.values.shape();
    let rank = record.values.ndim();
    let (ny, nx) = (shape[rank - 2], shape[rank - 1]);

    file.add_unlimited_dimension("time")?;
    file.add_dimension("y", ny)?;
    file.add_dimension("x", nx)?;

    let dim_names: Vec<&str> = if rank == 4 {
        file.add_dimension("lev", shape[1])?;
        vec!["time", "lev", "y", "x"]
    } else {
        vec!["time", "y", "x"]
    };

    file.add_attribute("title", "wrfpost daily postprocessed WRF output")?;
    file.add_attribute("source", concat!("wrfpost v", env!("CARGO_PKG_VERSION")))?;
    file.add_attribute("Conventions", "CF-1.6")?;

    {
        let mut time_var = file.add_variable::<Float>("time", &["time"])?;
        time_var.put_attribute("units", OUTPUT_TIME_UNITS)?;
        time_var.put_attribute("calendar", "standard")?;
        time_var.put_values(&encode_times(&record.times), 0..record.times.len())?;
    }

    {
        let mut lat_var = file.add_variable::<Float>("lat", &["y", "x"])?;
        lat_var.put_attribute("units", "degrees_north")?;
        lat_var.put_attribute("long_name", "latitude")?;
        let flat: Vec<Float> = record.lat.iter().copied().collect();
        lat_var.put_values(&flat, (0..ny, 0..nx))?;
    }

    {
        let mut lon_var = file.add_variable::<Float>("lon", &["y", "x"])?;
        lon_var.put_attribute("units", "degrees_east")?;
        lon_var.put_attribute("long_name", "longitude")?;
        let flat: Vec<Float> = record.lon.iter().copied().collect();
        lon_var.put_values(&flat, (0..ny, 0..nx))?;
    }

    {
        let mut var = file.add_variable::<Float>(&record.varname, &dim_names)?;

        // sorted for a reproducible attribute order between reruns
        let mut att_names: Vec<&String> = record.atts.keys().collect();
        att_names.sort();
        for name in att_names {
            var.put_attribute(name, record.atts[name].as_str())?;
        }
        var.put_attribute("coordinates", "lon lat")?;

        let flat: Vec<Float> = record.values.iter().copied().collect();
        if rank == 4 {
            var.put_values(&flat, (0..shape[0], 0..shape[1], 0..ny, 0..nx))?;
        } else {
            var.put_values(&flat, (0..shape[0], 0..ny, 0..nx))?;
        }
    }

    Ok(())
}

/// Encodes timestamps as fractional hours since the output time base.
fn encode_times(times: &[NaiveDateTime]) -> Vec<Float> {
    let (year, month, day) = OUTPUT_TIME_BASE;
    let base = NaiveDate::from_ymd_opt(year, month, day)
        .expect("output time base is a valid date")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time");

    times
        .iter()
        .map(|time| (*time - base).num_seconds() as Float / 3600.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use ndarray::Array;

    fn hours(date: (i32, u32, u32), hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn fragment(day_hours: &[u32], fill: Float) -> Fragment {
        let values =
            Array::from_elem((day_hours.len(), 2, 3), fill).into_dyn();
        Fragment {
            values,
            times: day_hours
                .iter()
                .map(|&h| hours((2020, 6, 15), h))
                .collect(),
        }
    }

    #[test]
    fn aggregate_concatenates_in_input_order() {
        let (values, times) = aggregate(vec![
            fragment(&[0, 1, 2], 1.0),
            fragment(&[3, 4], 2.0),
        ])
        .unwrap();

        assert_eq!(values.shape(), &[5, 2, 3]);
        assert_eq!(times.len(), 5);
        assert_eq!(times[0], hours((2020, 6, 15), 0));
        assert_eq!(times[4], hours((2020, 6, 15), 4));
        assert_eq!(values[[0, 0, 0]], 1.0);
        assert_eq!(values[[3, 0, 0]], 2.0);
    }

    #[test]
    fn aggregate_rejects_non_chronological_fragments() {
        let result = aggregate(vec![fragment(&[3, 4], 1.0), fragment(&[0, 1], 2.0)]);

        assert!(matches!(
            result,
            Err(JobError::UnorderedTimes { index: 2, .. })
        ));
    }

    #[test]
    fn aggregate_rejects_duplicate_timestamps() {
        let result = aggregate(vec![fragment(&[0, 1], 1.0), fragment(&[1, 2], 2.0)]);

        assert!(matches!(result, Err(JobError::UnorderedTimes { .. })));
    }

    #[test]
    fn aggregate_single_fragment_passes_through() {
        let (values, times) = aggregate(vec![fragment(&[0, 1, 2, 3], 7.0)]).unwrap();

        assert_eq!(values.shape(), &[4, 2, 3]);
        assert_eq!(times.len(), 4);
    }

    fn valid_record() -> DayRecord {
        DayRecord {
            values: Array::zeros((2, 2, 3)).into_dyn(),
            varname: "RAIN".to_string(),
            atts: VarAttributes::default(),
            lat: Array2::zeros((2, 3)),
            lon: Array2::zeros((2, 3)),
            times: vec![hours((2020, 6, 15), 0), hours((2020, 6, 15), 1)],
        }
    }

    #[test]
    fn validate_accepts_consistent_record() {
        assert!(valid_record().validate().is_ok());
    }

    #[test]
    fn validate_rejects_time_length_mismatch() {
        let mut record = valid_record();
        record.times.pop();

        assert!(matches!(
            record.validate(),
            Err(JobError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn validate_rejects_coordinate_shape_mismatch() {
        let mut record = valid_record();
        record.lat = Array2::zeros((3, 2));

        assert!(record.validate().is_err());
    }

    #[test]
    fn validate_rejects_missing_time_axis() {
        let mut record = valid_record();
        record.values = Array2::<Float>::zeros((2, 3)).into_dyn();

        assert!(record.validate().is_err());
    }

    #[test]
    fn encode_times_is_hours_since_1900() {
        let encoded = encode_times(&[hours((1900, 1, 2), 6)]);

        assert!(approx_eq!(Float, encoded[0], 30.0));
    }
}
