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

//! Read-side dataset view over a raw file and its auxiliary sources.
//!
//! In the split 2D/3D layout some variables needed by the computation
//! live in the companion 2D file or in the static geography file, not
//! in the raw 3D file itself. Rather than copying fields between files
//! the view resolves variable lookups across all merged sources, with
//! the raw file always taking precedence. This gives the additive-merge
//! semantics: an auxiliary source can only contribute variables the raw
//! file does not have.

use crate::errors::JobError;
use std::path::{Path, PathBuf};

/// One raw file plus any merged auxiliary sources.
///
/// All handles are closed when the view is dropped, so a fragment can
/// never leak an open dataset.
pub struct DayDataset {
    path: PathBuf,
    primary: netcdf::File,
    auxiliary: Vec<netcdf::File>,
}

impl DayDataset {
    /// Opens the raw file at `path`.
    ///
    /// A missing file is reported as an I/O error with the offending
    /// path before libnetcdf gets a chance to produce a less readable
    /// one.
    pub fn open(path: &Path) -> Result<Self, JobError> {
        if !path.exists() {
            return Err(JobError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("raw file not found: {}", path.display()),
            )));
        }

        Ok(DayDataset {
            path: path.to_path_buf(),
            primary: netcdf::open(path)?,
            auxiliary: Vec::new(),
        })
    }

    /// Merges `file` as an auxiliary source.
    ///
    /// Sources are consulted in merge order and only for variables the
    /// raw file (and earlier sources) do not provide.
    pub fn merge_auxiliary(&mut self, file: netcdf::File) {
        self.auxiliary.push(file);
    }

    /// Path of the raw file behind this view.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle of the raw file itself, for accesses that must not see
    /// auxiliary sources (e.g. the time coordinate).
    pub fn raw(&self) -> &netcdf::File {
        &self.primary
    }

    /// Resolves `name` across the raw file and the auxiliary sources.
    /// The raw file wins; auxiliary sources are checked in merge order.
    pub fn variable(&self, name: &str) -> Option<netcdf::Variable> {
        if let Some(var) = self.primary.variable(name) {
            return Some(var);
        }

        self.auxiliary.iter().find_map(|file| file.variable(name))
    }

    /// True when the raw file itself carries `name`, regardless of any
    /// auxiliary sources.
    pub fn is_raw_variable(&self, name: &str) -> bool {
        self.primary.variable(name).is_some()
    }
}
