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

//! Helpers for building patches in tests.

use super::{CoordAxis, Patch};
use crate::Float;
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use ndarray::ArrayD;

/// Timestamp `hours` after 2018-01-01 00:00.
pub(crate) fn hour(hours: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2018, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::hours(hours)
}

/// Value of the synthetic test field at given coordinates.
/// Distinct for every gridpoint of integral lat-lon grids,
/// within a day and for levels differing modulo 6.
pub(crate) fn field_value(level: i64, time: NaiveDateTime, lat: f64, lon: f64) -> Float {
    let level_term = level.rem_euclid(6) as f64 * 2_097_152.0;
    let time_term = f64::from(time.hour()) * 65_536.0;

    (level_term + time_term + (lat + 90.0) * 360.0 + lon) as Float
}

/// Patch with dims `[ml, datetime, lat, lon]` filled with [`field_value`].
pub(crate) fn coord_patch(
    name: &str,
    levels: &[i64],
    times: &[NaiveDateTime],
    lats: &[f64],
    lons: &[f64],
) -> Patch {
    let shape = vec![levels.len(), times.len(), lats.len(), lons.len()];
    let data = ArrayD::from_shape_fn(shape, |idx| {
        field_value(levels[idx[0]], times[idx[1]], lats[idx[2]], lons[idx[3]])
    });

    let axes = vec![
        ("ml".to_string(), CoordAxis::Index(levels.to_vec())),
        ("datetime".to_string(), CoordAxis::DateTime(times.to_vec())),
        ("lat".to_string(), CoordAxis::Float(lats.to_vec())),
        ("lon".to_string(), CoordAxis::Float(lons.to_vec())),
    ];

    Patch::new(name, axes, data).unwrap()
}

/// Coordinates from `start` to `end` (inclusive) every `step`.
pub(crate) fn range(start: f64, end: f64, step: f64) -> Vec<f64> {
    let count = ((end - start) / step).round() as usize + 1;
    (0..count).map(|i| start + i as f64 * step).collect()
}
