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

//! Fragment Builder: one raw file in, one (array, times) fragment out.
//!
//! For the split 2D/3D layout the raw file is first augmented with a
//! stride-3 subset of its companion 2D file and with the static
//! geography file; both are merged additively into the dataset view
//! before the variable computation runs.

use crate::constants::{
    AUX_SUBSET_COUNT, AUX_SUBSET_STRIDE, FILE_DATE_FORMAT, SPLIT_2D_TOKEN, SPLIT_3D_TOKEN,
};
use crate::errors::JobError;
use crate::pipeline::compute::{ComputeVariable, VarAttributes};
use crate::pipeline::dataset::DayDataset;
use crate::pipeline::subset::{self, ScratchFile};
use crate::pipeline::timecoord;
use crate::Float;
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use ndarray::{ArrayD, Axis};
use std::path::{Path, PathBuf};

/// In-memory result of processing one raw file: the derived array with
/// a guaranteed leading time axis and the decoded time coordinate.
pub struct Fragment {
    pub values: ArrayD<Float>,
    pub times: Vec<NaiveDateTime>,
}

/// Everything a fragment build needs to know about its day job.
pub struct FragmentContext<'a> {
    pub run: &'a str,
    pub variable: &'a str,
    pub date: NaiveDate,
    pub pattern: &'a str,
    pub geography_file: &'a Path,
}

/// Builds the fragment for one raw file.
///
/// Returns the fragment together with the attribute map produced by the
/// variable computation. Any failure propagates to the day job; the
/// scratch file of the augmentation is removed on every exit path.
pub fn build_fragment(
    ctx: &FragmentContext,
    raw_path: &Path,
    computer: &dyn ComputeVariable,
) -> Result<(Fragment, VarAttributes), JobError> {
    let mut dataset = DayDataset::open(raw_path)?;

    // holds the ncks output alive until the computation is done
    let mut _scratch: Option<ScratchFile> = None;

    if ctx.pattern == SPLIT_3D_TOKEN {
        let companion = companion_2d_path(raw_path);
        if !companion.exists() {
            return Err(JobError::CompanionMissing { path: companion });
        }

        debug!(
            "{} {} {}: augmenting {} from {}",
            ctx.run,
            ctx.variable,
            ctx.date,
            raw_path.display(),
            companion.display()
        );

        let scratch = ScratchFile::new(scratch_path(ctx));
        subset::extract_every_nth_step(
            &companion,
            scratch.path(),
            AUX_SUBSET_STRIDE,
            AUX_SUBSET_COUNT,
        )?;

        dataset.merge_auxiliary(netcdf::open(scratch.path())?);
        dataset.merge_auxiliary(netcdf::open(ctx.geography_file)?);
        _scratch = Some(scratch);
    }

    let (values, atts) = computer.compute(&dataset, ctx.variable)?;
    let times = timecoord::decode_times(dataset.raw(), raw_path)?;
    let values = normalize_rank(values, times.len());

    Ok((Fragment { values, times }, atts))
}

/// Companion 2D filename of a raw 3D file: the 3D pattern token in the
/// file name is substituted with the 2D one.
fn companion_2d_path(raw_path: &Path) -> PathBuf {
    match raw_path.file_name().and_then(|name| name.to_str()) {
        Some(name) => raw_path.with_file_name(name.replace(SPLIT_3D_TOKEN, SPLIT_2D_TOKEN)),
        None => raw_path.to_path_buf(),
    }
}

/// Unique scratch location for the auxiliary subset of one fragment.
///
/// Embeds run, variable, date and the process id so concurrently
/// running day jobs can never collide on the scratch file.
fn scratch_path(ctx: &FragmentContext) -> PathBuf {
    std::env::temp_dir().join(format!(
        "wrfpost_aux_{}_{}_{}_{}.nc",
        ctx.run,
        ctx.variable,
        ctx.date.format(FILE_DATE_FORMAT),
        std::process::id()
    ))
}

/// Inserts a leading time axis of length 1 when a single-step file
/// yields a spatial-only array, so every fragment concatenates along
/// axis 0. An array whose leading axis already has length 1 is assumed
/// to carry its time axis and stays untouched.
fn normalize_rank(values: ArrayD<Float>, time_len: usize) -> ArrayD<Float> {
    if time_len == 1
        && (values.ndim() == 2 || values.ndim() == 3)
        && values.shape()[0] != 1
    {
        values.insert_axis(Axis(0))
    } else {
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn companion_substitutes_only_the_pattern_token() {
        let raw = Path::new("/data/out/wrf3hrly_d01_2020-06-15_00:00:00.nc");

        assert_eq!(
            companion_2d_path(raw),
            Path::new("/data/out/wrfout_d01_2020-06-15_00:00:00.nc")
        );
    }

    #[test]
    fn companion_leaves_directory_untouched() {
        let raw = Path::new("/wrf3hrly_runs/out/wrf3hrly_d01_2020-06-15.nc");

        assert_eq!(
            companion_2d_path(raw),
            Path::new("/wrf3hrly_runs/out/wrfout_d01_2020-06-15.nc")
        );
    }

    #[test]
    fn scratch_paths_differ_per_job() {
        let date = NaiveDate::from_ymd_opt(2020, 6, 15).unwrap();
        let geography = Path::new("/geo/geo_em.d01.nc");

        let a = scratch_path(&FragmentContext {
            run: "TEST",
            variable: "RAIN",
            date,
            pattern: SPLIT_3D_TOKEN,
            geography_file: geography,
        });
        let b = scratch_path(&FragmentContext {
            run: "TEST",
            variable: "TAS",
            date,
            pattern: SPLIT_3D_TOKEN,
            geography_file: geography,
        });
        let c = scratch_path(&FragmentContext {
            run: "TEST",
            variable: "RAIN",
            date: date.succ_opt().unwrap(),
            pattern: SPLIT_3D_TOKEN,
            geography_file: geography,
        });

        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn spatial_2d_single_step_gains_time_axis() {
        let values = Array::zeros((3, 4)).into_dyn();

        let normalized = normalize_rank(values, 1);
        assert_eq!(normalized.shape(), &[1, 3, 4]);
    }

    #[test]
    fn spatial_3d_single_step_gains_time_axis() {
        let values = Array::zeros((5, 3, 4)).into_dyn();

        let normalized = normalize_rank(values, 1);
        assert_eq!(normalized.shape(), &[1, 5, 3, 4]);
    }

    #[test]
    fn multi_step_array_is_untouched() {
        let values = Array::zeros((24, 3, 4)).into_dyn();

        let normalized = normalize_rank(values, 24);
        assert_eq!(normalized.shape(), &[24, 3, 4]);
    }

    #[test]
    fn already_time_leading_single_step_is_untouched() {
        // rank 4 with one step already has its time axis
        let values = Array::zeros((1, 5, 3, 4)).into_dyn();

        let normalized = normalize_rank(values, 1);
        assert_eq!(normalized.shape(), &[1, 5, 3, 4]);
    }

    #[test]
    fn rank3_with_length_one_leading_axis_is_untouched() {
        let values = Array::zeros((1, 3, 4)).into_dyn();

        let normalized = normalize_rank(values, 1);
        assert_eq!(normalized.shape(), &[1, 3, 4]);
    }
}
