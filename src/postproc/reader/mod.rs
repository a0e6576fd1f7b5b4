/*
Copyright 2023 Jakub Lewandowski

This file is part of AtmoRep Mosaic Post-processing (AMP).

AtmoRep Mosaic Post-processing (AMP) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

AtmoRep Mosaic Post-processing (AMP) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with AtmoRep Mosaic Post-processing (AMP). If not, see https://www.gnu.org/licenses/.
*/

//! Module converting archive contents into [`Patch`]es.
//!
//! AtmoRep uses two archive layouts depending on its training
//! strategy. In the forecast layout every stored patch is a regular
//! local field with 1D coordinates. In the BERT layout every stored
//! patch is a set of tokens, each with its own coordinates, stored for
//! each model level separately. Both are converted to the same list of
//! patches so that the rest of the processing does not depend on layout.

mod bert;
mod forecast;

use super::archive::{StoredArray, ZipStore};
use super::mosaic::{CoordAxis, Patch};
use crate::constants::{ENSEMBLE_AXIS, LAT_AXIS, LON_AXIS, TIME_AXIS};
use crate::errors::ArchiveError;
use crate::Float;
use log::debug;
use ndarray::ArrayD;
use serde::Deserialize;
use std::fmt;

/// Kinds of data written by AtmoRep.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Source,
    Pred,
    Target,
    Ens,
}

impl DataKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::Source => "source",
            DataKind::Pred => "pred",
            DataKind::Target => "target",
            DataKind::Ens => "ens",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arrangement of patches in an archive.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ArchiveLayout {
    /// Patches stored as `<variable>/<patch>/{ml,datetime,lat,lon,data}`.
    Forecast,
    /// Tokens stored as `<variable>/<patch>/ml=<level>/{datetime,lat,lon,data}`.
    Bert { model_level: i64 },
}

/// Parameters of reading one variable from archives.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ReadRequest {
    pub variable: String,
    pub kind: DataKind,
    /// Number of ensemble members, taken from data when not set.
    pub ensemble_members: Option<usize>,
}

impl ArchiveLayout {
    /// Reads all patches of requested variable from the archive.
    pub fn read_patches(
        &self,
        store: &ZipStore,
        request: &ReadRequest,
    ) -> Result<Vec<Patch>, ArchiveError> {
        let patch_ids = store.children(&request.variable)?;

        if patch_ids.is_empty() {
            return Err(ArchiveError::MissingEntry(request.variable.clone()));
        }

        debug!(
            "Reading {} patches of {} from {}",
            patch_ids.len(),
            request.variable,
            store.path().display()
        );

        match self {
            ArchiveLayout::Forecast => forecast::read_patches(store, request, &patch_ids),
            ArchiveLayout::Bert { model_level } => {
                bert::read_patches(store, request, &patch_ids, *model_level)
            }
        }
    }
}

/// Label of a patch made from the variable
/// name and patch identifier (eg. `sample=00012`).
fn patch_label(variable: &str, patch_id: &str) -> String {
    format!("{}_{}", variable, patch_id.replace('=', ""))
}

/// Ensemble axis for ensemble data with
/// `members` or, when not set, `found` members.
fn ensemble_axis(members: Option<usize>, found: usize) -> (String, CoordAxis) {
    let members = members.unwrap_or(found) as i64;
    (ENSEMBLE_AXIS.to_string(), CoordAxis::Index((0..members).collect()))
}

/// Reads data array of a patch converted to [`Float`].
fn read_data(store: &ZipStore, key: &str) -> Result<ArrayD<Float>, ArchiveError> {
    match store.read_array(key)? {
        StoredArray::Float(data) => Ok(data.mapv(|v| v as Float)),
        StoredArray::Int(data) => Ok(data.mapv(|v| v as Float)),
        StoredArray::DateTime(_) => Err(ArchiveError::UnexpectedArray {
            key: key.to_string(),
            reason: "data array contains datetimes",
        }),
    }
}

/// Converts one-dimensional stored array into coordinates of `axis`.
///
/// Geographical axes are always floats, time axis must
/// contain datetimes and other axes become integral labels
/// when all their values are integral.
fn to_coords(axis: &str, stored: StoredArray, key: &str) -> Result<CoordAxis, ArchiveError> {
    let unexpected = |reason| ArchiveError::UnexpectedArray {
        key: key.to_string(),
        reason,
    };

    if stored.shape().len() != 1 {
        return Err(unexpected("coordinates are not one-dimensional"));
    }

    let coords = match (axis, stored) {
        (TIME_AXIS, StoredArray::DateTime(values)) => CoordAxis::DateTime(values.into_raw_vec()),
        (TIME_AXIS, _) => return Err(unexpected("time coordinates are not datetimes")),
        (_, StoredArray::DateTime(_)) => return Err(unexpected("unexpected datetime coordinates")),
        (LAT_AXIS | LON_AXIS, StoredArray::Float(values)) => CoordAxis::Float(values.into_raw_vec()),
        (LAT_AXIS | LON_AXIS, StoredArray::Int(values)) => {
            CoordAxis::Float(values.iter().map(|v| *v as f64).collect())
        }
        (_, StoredArray::Int(values)) => CoordAxis::Index(values.into_raw_vec()),
        (_, StoredArray::Float(values)) => {
            if values.iter().all(|v| v.fract() == 0.0) {
                CoordAxis::Index(values.iter().map(|v| *v as i64).collect())
            } else {
                CoordAxis::Float(values.into_raw_vec())
            }
        }
    };

    Ok(coords)
}
