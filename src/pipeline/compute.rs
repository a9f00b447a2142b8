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

//! Variable derivation seam.
//!
//! Physical derivations (accumulation de-staggering, unit conversions
//! and so on) are a concern of their own; the pipeline only needs a
//! function from (dataset, variable name) to (array, attributes). The
//! [`ComputeVariable`] trait is that seam, and [`DirectExtract`] is the
//! implementation used in production: it hands back the stored values
//! of the named variable together with its descriptive attributes.

use crate::errors::JobError;
use crate::pipeline::dataset::DayDataset;
use crate::Float;
use ndarray::ArrayD;
use rustc_hash::FxHashMap;

/// Descriptive attributes attached to a derived variable
/// (`units`, `description`, ...). Written verbatim into the output.
pub type VarAttributes = FxHashMap<String, String>;

/// String attributes carried over from source to output variables.
const CARRIED_ATTRIBUTES: [&str; 4] = ["units", "description", "long_name", "standard_name"];

/// Derives a variable from an open dataset view.
pub trait ComputeVariable: Send + Sync {
    /// Returns the derived array and its attribute map.
    ///
    /// The array may or may not have a leading time axis; the fragment
    /// builder normalizes the rank afterwards.
    fn compute(
        &self,
        dataset: &DayDataset,
        name: &str,
    ) -> Result<(ArrayD<Float>, VarAttributes), JobError>;
}

/// Reads the named variable as stored, resolving it through the
/// dataset view so augmented auxiliary fields are visible.
pub struct DirectExtract;

impl ComputeVariable for DirectExtract {
    fn compute(
        &self,
        dataset: &DayDataset,
        name: &str,
    ) -> Result<(ArrayD<Float>, VarAttributes), JobError> {
        let var = dataset
            .variable(name)
            .ok_or_else(|| JobError::MissingVariable {
                name: name.to_string(),
                path: dataset.path().to_path_buf(),
            })?;

        let shape: Vec<usize> = var.dimensions().iter().map(|dim| dim.len()).collect();
        let data = var.get_values::<Float, _>(..)?;

        let values = ArrayD::from_shape_vec(shape, data)
            .map_err(|err| JobError::ShapeMismatch(err.to_string()))?;

        let mut atts = VarAttributes::default();
        for att_name in CARRIED_ATTRIBUTES {
            if let Some(Ok(value)) = var.attribute_value(att_name) {
                if let Ok(text) = String::try_from(value) {
                    atts.insert(att_name.to_string(), text);
                }
            }
        }

        Ok((values, atts))
    }
}
