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

//! Sub-module adjusting Zarr v2 array metadata (`.zarray`) before
//! it is handed to `zarrs`.
//!
//! Numpy `datetime64` arrays are stored as 8-byte integers counting
//! ticks of a time unit since the Unix epoch. Such arrays are opened
//! as `int64` and converted to datetimes afterwards.

use serde_json::{json, Value};

/// Value numpy writes for `NaT` (not a time).
pub const NOT_A_TIME: i64 = i64::MIN;

/// Time units of numpy `datetime64` data type.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl TimeUnit {
    /// Length of the unit in nanoseconds.
    pub fn nanoseconds(self) -> i64 {
        match self {
            TimeUnit::Days => 86_400_000_000_000,
            TimeUnit::Hours => 3_600_000_000_000,
            TimeUnit::Minutes => 60_000_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Nanoseconds => 1,
        }
    }

    fn parse(unit: &str) -> Option<Self> {
        match unit {
            "D" => Some(TimeUnit::Days),
            "h" => Some(TimeUnit::Hours),
            "m" => Some(TimeUnit::Minutes),
            "s" => Some(TimeUnit::Seconds),
            "ms" => Some(TimeUnit::Milliseconds),
            "us" => Some(TimeUnit::Microseconds),
            "ns" => Some(TimeUnit::Nanoseconds),
            _ => None,
        }
    }
}

/// Rewrites `datetime64` dtype (eg. `<M8[ns]`) of the metadata document
/// into an integer dtype with the same byte order and returns the time unit.
///
/// The fill value is set to `NaT` so that chunks missing
/// from the archive are not read as valid timestamps.
/// Documents of other dtypes are left untouched.
pub fn datetime_as_ticks(metadata: &mut Value) -> Option<TimeUnit> {
    let dtype = metadata.get("dtype")?.as_str()?;

    let mut chars = dtype.chars();
    let byte_order = match chars.next()? {
        '>' => '>',
        '<' | '|' => '<',
        _ => return None,
    };
    let unit = chars
        .as_str()
        .strip_prefix("M8[")?
        .strip_suffix(']')
        .and_then(TimeUnit::parse)?;

    metadata["dtype"] = json!(format!("{}i8", byte_order));
    metadata["fill_value"] = json!(NOT_A_TIME);

    Some(unit)
}
