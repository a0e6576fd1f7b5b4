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

//! Sub-module for finding positions of patch
//! coordinates on the global grid axes.

use super::{bisection, CoordAxis};
use crate::constants::{COORD_TOLERANCE, LON_AXIS, LON_PERIOD};
use crate::errors::SearchError;
use chrono::NaiveDateTime;
use rustc_hash::FxHashMap;

/// Index of one global grid axis.
///
/// Timestamps and integral labels are matched exactly with a hash map.
/// Geographical coordinates are matched with tolerance, by bisection when
/// the axis is monotonic and by linear scan otherwise.
#[derive(Debug)]
pub(super) enum AxisLookup<'a> {
    Float {
        values: &'a [f64],
        monotonic: bool,
        periodic: bool,
    },
    DateTime(FxHashMap<NaiveDateTime, usize>),
    Index(FxHashMap<i64, usize>),
}

impl<'a> AxisLookup<'a> {
    pub(super) fn new(name: &str, coords: &'a CoordAxis) -> Self {
        match coords {
            CoordAxis::Float(values) => AxisLookup::Float {
                values,
                monotonic: is_monotonic(values),
                periodic: name == LON_AXIS,
            },
            CoordAxis::DateTime(values) => AxisLookup::DateTime(
                values.iter().enumerate().map(|(i, v)| (*v, i)).collect(),
            ),
            CoordAxis::Index(values) => {
                AxisLookup::Index(values.iter().enumerate().map(|(i, v)| (*v, i)).collect())
            }
        }
    }

    /// Returns positions of all `coords` on this axis.
    ///
    /// Fails when any of the values is not present
    /// or the coordinates are of different kind.
    pub(super) fn positions(&self, coords: &CoordAxis) -> Result<Vec<usize>, SearchError> {
        match (self, coords) {
            (
                AxisLookup::Float {
                    values,
                    monotonic,
                    periodic,
                },
                CoordAxis::Float(searched),
            ) => searched
                .iter()
                .map(|&x| {
                    let x = if *periodic { normalise_longitude(x) } else { x };

                    if *monotonic {
                        bisection::find_within(values, x, COORD_TOLERANCE)
                    } else {
                        values
                            .iter()
                            .position(|v| (v - x).abs() <= COORD_TOLERANCE)
                            .ok_or(SearchError::NotFound)
                    }
                })
                .collect(),
            (AxisLookup::DateTime(index), CoordAxis::DateTime(searched)) => searched
                .iter()
                .map(|x| index.get(x).copied().ok_or(SearchError::NotFound))
                .collect(),
            (AxisLookup::Index(index), CoordAxis::Index(searched)) => searched
                .iter()
                .map(|x| index.get(x).copied().ok_or(SearchError::NotFound))
                .collect(),
            _ => Err(SearchError::NotFound),
        }
    }
}

/// Converts any longitude to the convention used by
/// the global grid (longitude between 0 and 360, excluding 360).
pub(super) fn normalise_longitude(longitude: f64) -> f64 {
    let longitude = longitude.rem_euclid(LON_PERIOD);

    // values just below the seam belong to the zero meridian
    if LON_PERIOD - longitude <= COORD_TOLERANCE {
        return 0.0;
    }

    longitude
}

fn is_monotonic(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1]) || values.windows(2).all(|w| w[0] > w[1])
}
