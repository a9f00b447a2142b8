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

//! Module containing WRF naming conventions and pipeline constants.

///Format of entries in the WRF `Times` variable
pub const WRF_TIME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

///Date substring interpolated into raw file names
pub const FILE_DATE_FORMAT: &str = "%Y-%m-%d";

///Name of the time coordinate variable in WRF output
pub const TIMES_VAR: &str = "Times";

///Latitude variable in WRF geography/reference files
pub const LAT_VAR: &str = "XLAT";

///Longitude variable in WRF geography/reference files
pub const LON_VAR: &str = "XLONG";

///Pattern token indicating the split 2D/3D file layout
pub const SPLIT_3D_TOKEN: &str = "wrf3hrly";

///Pattern token of the companion 2D files in the split layout
pub const SPLIT_2D_TOKEN: &str = "wrfout";

///Stride of the auxiliary subset taken from companion 2D files
///(hourly output reduced to every third step)
pub const AUX_SUBSET_STRIDE: usize = 3;

///Number of leading time steps considered for the auxiliary subset
pub const AUX_SUBSET_COUNT: usize = 24;

///Time units written into output files
pub const OUTPUT_TIME_UNITS: &str = "hours since 1900-01-01 00:00:00";

///Base of the output time coordinate, see [`OUTPUT_TIME_UNITS`]
pub const OUTPUT_TIME_BASE: (i32, u32, u32) = (1900, 1, 1);

///Default size of the day-job worker pool
pub const DEFAULT_WORKERS: u16 = 10;
