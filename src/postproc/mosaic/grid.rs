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

//! Sub-module deriving the global grid
//! from the coordinates of patches.

use super::{Axis, CoordAxis, GlobalGrid, Patch};
use crate::constants::{
    LAT_AXIS, LAT_MAX, LAT_MIN, LON_AXIS, LON_MIN, LON_PERIOD, SPACING_TOLERANCE, TIME_AXIS,
};
use crate::errors::MosaicError;
use chrono::NaiveDateTime;
use float_cmp::approx_eq;
use log::debug;
use ndarray::Array1;
use rustc_hash::FxHashSet;

/// Derives the global grid that `patches` are expected to tile.
///
/// Grid spacing is taken from the first patch. Latitudes span
/// the closed range from -90 to 90 degrees and longitudes the
/// half-open range from 0 to 360 degrees, so that the zero meridian
/// is not counted twice. Timestamps are the sorted union of all
/// patch timestamps. All other axes are copied from the first patch.
pub fn derive_global_grid(patches: &[Patch]) -> Result<GlobalGrid, MosaicError> {
    let first = patches.first().ok_or(MosaicError::EmptyInput)?;

    let dy = axis_step(first, LAT_AXIS)?.ok_or(MosaicError::DegenerateAxis(
        "first patch has less than two latitudes",
    ))?;
    let dx = axis_step(first, LON_AXIS)?.ok_or(MosaicError::DegenerateAxis(
        "first patch has less than two longitudes",
    ))?;

    check_spacing(patches, LAT_AXIS, dy)?;
    check_spacing(patches, LON_AXIS, dx)?;

    let lat_intervals = count_steps(LAT_MAX - LAT_MIN, dy).ok_or(MosaicError::DegenerateAxis(
        "latitude spacing does not divide the meridian",
    ))?;
    let lon_intervals = count_steps(LON_PERIOD, dx).ok_or(MosaicError::DegenerateAxis(
        "longitude spacing does not divide the equator",
    ))?;

    let lats = Array1::linspace(LAT_MIN, LAT_MAX, lat_intervals + 1).to_vec();
    let lon_step = LON_PERIOD / lon_intervals as f64;
    let lons: Vec<f64> = (0..lon_intervals)
        .map(|i| LON_MIN + i as f64 * lon_step)
        .collect();
    let times = collect_unique_times(patches)?;

    debug!(
        "Derived global grid with {} latitudes, {} longitudes and {} timestamps",
        lat_intervals + 1,
        lon_intervals,
        times.len()
    );

    let mut lats = Some(lats);
    let mut lons = Some(lons);
    let mut times = Some(times);

    let axes: Vec<Axis> = first
        .axes()
        .iter()
        .map(|(name, coords)| {
            let coords = match name.as_str() {
                LAT_AXIS => lats.take().map(CoordAxis::Float),
                LON_AXIS => lons.take().map(CoordAxis::Float),
                TIME_AXIS => times.take().map(CoordAxis::DateTime),
                _ => None,
            }
            .unwrap_or_else(|| coords.clone());

            (name.clone(), coords)
        })
        .collect();

    Ok(GlobalGrid::new(axes))
}

/// Returns the absolute difference between the first two
/// coordinates of a geographical axis, if the axis has them.
///
/// Longitudes are periodic, so their difference is the shorter
/// arc between them, eg. 30 degrees for a patch crossing
/// the zero meridian at `[330, 0]`.
fn axis_step(patch: &Patch, axis: &'static str) -> Result<Option<f64>, MosaicError> {
    let values = float_coords(patch, axis)?;

    if values.len() < 2 {
        return Ok(None);
    }

    let step = if axis == LON_AXIS {
        let arc = (values[1] - values[0]).rem_euclid(LON_PERIOD);
        arc.min(LON_PERIOD - arc)
    } else {
        (values[1] - values[0]).abs()
    };

    if step.is_finite() && step > 0.0 {
        Ok(Some(step))
    } else {
        Ok(None)
    }
}

/// Checks that all patches use the same spacing along `axis`.
/// Patches with a single sample along the axis cannot be checked.
fn check_spacing(patches: &[Patch], axis: &'static str, step: f64) -> Result<(), MosaicError> {
    for patch in patches {
        let matches = match axis_step(patch, axis)? {
            Some(patch_step) => {
                approx_eq!(f64, patch_step, step, epsilon = step * SPACING_TOLERANCE)
            }
            None => float_coords(patch, axis)?.len() < 2,
        };

        if !matches {
            return Err(MosaicError::InconsistentSpacing {
                patch: patch.name().to_string(),
                axis,
            });
        }
    }

    Ok(())
}

/// Number of `step` long intervals in `extent`,
/// if the step divides the extent.
fn count_steps(extent: f64, step: f64) -> Option<usize> {
    let count = extent / step;
    let rounded = count.round();

    if rounded >= 1.0 && approx_eq!(f64, count, rounded, epsilon = SPACING_TOLERANCE) {
        Some(rounded as usize)
    } else {
        None
    }
}

fn collect_unique_times(patches: &[Patch]) -> Result<Vec<NaiveDateTime>, MosaicError> {
    let mut unique_times: FxHashSet<NaiveDateTime> = FxHashSet::default();

    for patch in patches {
        match patch.coords(TIME_AXIS) {
            Some(CoordAxis::DateTime(times)) => unique_times.extend(times.iter().copied()),
            _ => {
                return Err(MosaicError::MissingAxis {
                    patch: patch.name().to_string(),
                    axis: TIME_AXIS,
                })
            }
        }
    }

    let mut unique_times: Vec<NaiveDateTime> = unique_times.into_iter().collect();
    unique_times.sort_unstable();

    Ok(unique_times)
}

fn float_coords<'a>(patch: &'a Patch, axis: &'static str) -> Result<&'a [f64], MosaicError> {
    match patch.coords(axis) {
        Some(CoordAxis::Float(values)) => Ok(values),
        _ => Err(MosaicError::MissingAxis {
            patch: patch.name().to_string(),
            axis,
        }),
    }
}
