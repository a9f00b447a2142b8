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

//! Time subsetting of companion files via the external `ncks` tool.
//!
//! The subsetting stays an external invocation on purpose: `ncks` is
//! already a hard dependency of the surrounding workflow and its
//! hyperslab semantics are exactly what the augmentation needs. The
//! narrow [`extract_every_nth_step`] interface keeps callers unaware of
//! the tool, so a native slicing implementation can replace it without
//! touching the fragment builder.

use crate::errors::JobError;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A temporary file removed on drop.
///
/// Scratch files produced by the subsetting step must not survive the
/// owning fragment, whether the variable computation succeeds or
/// raises; tying removal to drop guarantees that on every exit path.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: PathBuf) -> Self {
        ScratchFile { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // nothing to do when the tool never produced the file
        let _ = fs::remove_file(&self.path);
    }
}

/// Extracts time steps `0, stride, 2*stride, ...` out of the first
/// `count` steps of `source` into `target`.
///
/// Equivalent to `ncks -d Time,0,{count-1},{stride}`. The tool failing
/// or being absent aborts only the owning day job.
pub fn extract_every_nth_step(
    source: &Path,
    target: &Path,
    stride: usize,
    count: usize,
) -> Result<(), JobError> {
    let output = Command::new("ncks")
        .arg("-O")
        .arg("-d")
        .arg(time_hyperslab(stride, count))
        .arg(source)
        .arg(target)
        .output()
        .map_err(|err| JobError::SubsetTool {
            path: source.to_path_buf(),
            reason: format!("cannot invoke ncks: {}", err),
        })?;

    if !output.status.success() {
        return Err(JobError::SubsetTool {
            path: source.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

/// Hyperslab argument selecting every `stride`-th of the first `count`
/// time steps.
fn time_hyperslab(stride: usize, count: usize) -> String {
    format!("Time,0,{},{}", count.saturating_sub(1), stride)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn hyperslab_matches_three_hourly_selection() {
        assert_eq!(time_hyperslab(3, 24), "Time,0,23,3");
    }

    #[test]
    fn scratch_file_removed_on_drop() {
        let path = std::env::temp_dir().join(format!("wrfpost_scratch_{}.nc", std::process::id()));
        File::create(&path).unwrap();

        {
            let _guard = ScratchFile::new(path.clone());
            assert!(path.exists());
        }

        assert!(!path.exists());
    }

    #[test]
    fn scratch_file_removed_when_owner_errors() {
        let path =
            std::env::temp_dir().join(format!("wrfpost_scratch_err_{}.nc", std::process::id()));

        let failing = |p: PathBuf| -> Result<(), JobError> {
            let _guard = ScratchFile::new(p);
            File::create(_guard.path()).unwrap();
            Err(JobError::ShapeMismatch("forced failure".into()))
        };

        assert!(failing(path.clone()).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn dropping_guard_without_file_is_harmless() {
        let path = std::env::temp_dir().join("wrfpost_scratch_never_created.nc");
        drop(ScratchFile::new(path));
    }
}
