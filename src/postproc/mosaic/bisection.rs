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

//! Module containg methods for conducting
//! binary search (bisection) of elements closests
//! to searched values in coordinate axes.

use crate::errors::SearchError;

/// Core bisection function, an implementation of binary search
/// algorithm adapted to searching values in-between the set items.
///
/// Returns the index of the first item not smaller (for ascending
/// arrays) or not greater (for descending arrays) than `x`.
fn binary_search<T: PartialOrd>(array: &[T], x: &T) -> Result<usize, SearchError> {
    let (first, last) = match (array.first(), array.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(SearchError::EmptyArray),
    };

    if x < first && x < last || x > first && x > last {
        return Err(SearchError::OutOfBounds);
    }

    let mut lo = 0;
    let mut hi = array.len() - 1;

    // if the array is sorted descendingly we use a function with reversed signs
    if first < last {
        while lo < hi {
            let mid = (lo + hi) / 2;

            if array[mid] >= *x {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
    } else {
        while lo < hi {
            let mid = (lo + hi) / 2;

            if array[mid] <= *x {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
    }

    Ok(lo)
}

/// Convienience method to find a closest value
/// to requested to the left of the searched item.
pub fn find_left_closest<T: PartialOrd>(array: &[T], x: &T) -> Result<usize, SearchError> {
    let found_index = binary_search(array, x)?;

    if array[found_index] == *x || found_index == 0 {
        Ok(found_index)
    } else {
        Ok(found_index - 1)
    }
}

/// Convienience method to find a closest value
/// to requested to the right of the searched item.
pub fn find_right_closest<T: PartialOrd>(array: &[T], x: &T) -> Result<usize, SearchError> {
    binary_search(array, x)
}

/// Finds the index of the item nearest to `x`
/// in a monotonic array.
pub fn find_nearest(array: &[f64], x: f64) -> Result<usize, SearchError> {
    let left = find_left_closest(array, &x)?;
    let right = find_right_closest(array, &x)?;

    if (array[left] - x).abs() <= (array[right] - x).abs() {
        Ok(left)
    } else {
        Ok(right)
    }
}

/// Finds the index of the item that is within `tolerance` of `x`
/// in a monotonic array.
///
/// Values slightly outside the array range are also
/// matched to the first or last item.
pub fn find_within(array: &[f64], x: f64, tolerance: f64) -> Result<usize, SearchError> {
    let index = match find_nearest(array, x) {
        Ok(index) => index,
        Err(SearchError::OutOfBounds) => {
            if (array[0] - x).abs() <= (array[array.len() - 1] - x).abs() {
                0
            } else {
                array.len() - 1
            }
        }
        Err(err) => return Err(err),
    };

    if (array[index] - x).abs() <= tolerance {
        Ok(index)
    } else {
        Err(SearchError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::{find_left_closest, find_nearest, find_right_closest, find_within};
    use crate::errors::SearchError;

    #[test]
    fn closest_ascending() {
        let array = [0.0, 1.0, 2.0, 3.0];

        assert_eq!(find_left_closest(&array, &1.5), Ok(1));
        assert_eq!(find_right_closest(&array, &1.5), Ok(2));
        assert_eq!(find_left_closest(&array, &2.0), Ok(2));
        assert_eq!(find_right_closest(&array, &2.0), Ok(2));
        assert_eq!(find_left_closest(&array, &0.0), Ok(0));
    }

    #[test]
    fn closest_descending() {
        let array = [90.0, 45.0, 0.0, -45.0, -90.0];

        assert_eq!(find_left_closest(&array, &10.0), Ok(1));
        assert_eq!(find_right_closest(&array, &10.0), Ok(2));
        assert_eq!(find_nearest(&array, 40.0), Ok(1));
        assert_eq!(find_nearest(&array, -80.0), Ok(4));
    }

    #[test]
    fn search_errors() {
        let empty: [f64; 0] = [];
        assert_eq!(find_nearest(&empty, 1.0), Err(SearchError::EmptyArray));
        assert_eq!(find_nearest(&[0.0, 1.0], 2.0), Err(SearchError::OutOfBounds));
    }

    #[test]
    fn within_tolerance() {
        let array = [0.0, 0.25, 0.5, 0.75];

        assert_eq!(find_within(&array, 0.250_01, 1e-4), Ok(1));
        assert_eq!(find_within(&array, 0.75001, 1e-4), Ok(3));
        assert_eq!(find_within(&array, -0.00001, 1e-4), Ok(0));
        assert_eq!(find_within(&array, 0.3, 1e-4), Err(SearchError::NotFound));
        assert_eq!(find_within(&array, f64::NAN, 1e-4), Err(SearchError::NotFound));
    }
}
