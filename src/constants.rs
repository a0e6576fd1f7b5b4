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

//! Module containing constants used by the post-processing.

/// Southern edge of the global latitude axis (in degrees).
pub const LAT_MIN: f64 = -90.0;

/// Northern edge of the global latitude axis (in degrees).
pub const LAT_MAX: f64 = 90.0;

/// Western edge of the global longitude axis (in degrees).
pub const LON_MIN: f64 = 0.0;

/// Length of the longitude circle. The global longitude axis
/// is half-open, so this value itself is never in the grid.
pub const LON_PERIOD: f64 = 360.0;

/// Absolute tolerance (in degrees) used when matching
/// patch coordinates against the global grid.
///
/// Archives store coordinates as single precision floats, so
/// exact comparison with a computed global axis is not possible.
pub const COORD_TOLERANCE: f64 = 1.0e-4;

/// Relative tolerance for comparing grid spacings between patches.
pub const SPACING_TOLERANCE: f64 = 1.0e-3;

/// Names of axes that are resolved against the global grid.
/// All other axes are pass-through.
pub const LAT_AXIS: &str = "lat";
pub const LON_AXIS: &str = "lon";
pub const TIME_AXIS: &str = "datetime";

/// Axis names of pass-through axes created by the readers.
pub const LEVEL_AXIS: &str = "ml";
pub const ENSEMBLE_AXIS: &str = "ensemble";
