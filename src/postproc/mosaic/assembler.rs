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

//! Sub-module scatter-writing patches
//! onto the global grid.

use super::lookup::AxisLookup;
use super::{GlobalGrid, Mosaic, Patch};
use crate::{errors::MosaicError, Float};
use log::debug;
use ndarray::{ArrayD, IxDyn};
use serde::Deserialize;

/// Rule applied when a gridpoint is covered by more than one patch.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Patch later in the list overwrites values of earlier patches.
    LastWriteWins,
    /// Overlapping patches are an error.
    Reject,
}

impl Default for OverlapPolicy {
    fn default() -> Self {
        OverlapPolicy::LastWriteWins
    }
}

/// Struct assembling patches into a global [`Mosaic`].
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct MosaicAssembler {
    overlap: OverlapPolicy,
}

impl MosaicAssembler {
    pub fn new(overlap: OverlapPolicy) -> Self {
        MosaicAssembler { overlap }
    }

    /// Writes all `patches` onto `grid` and checks
    /// that every gridpoint has been populated.
    ///
    /// Global array is first filled with NaN and then each
    /// patch is written at indices of its coordinate values
    /// on the grid, in the order of the list. Any NaN left
    /// after all patches are written means that patches do not
    /// cover the grid and the global field cannot be returned.
    pub fn assemble(&self, patches: &[Patch], grid: &GlobalGrid) -> Result<Mosaic, MosaicError> {
        if patches.is_empty() {
            return Err(MosaicError::EmptyInput);
        }

        let lookups: Vec<AxisLookup> = grid
            .axes()
            .iter()
            .map(|(name, coords)| AxisLookup::new(name, coords))
            .collect();

        let mut data = ArrayD::<Float>::from_elem(IxDyn(&grid.shape()), Float::NAN);

        debug!(
            "Writing {} patches onto global grid of shape {:?}",
            patches.len(),
            data.shape()
        );

        for patch in patches {
            if !patch.dims().eq(grid.dims()) {
                return Err(MosaicError::DimsMismatch {
                    patch: patch.name().to_string(),
                });
            }

            let positions = patch
                .axes()
                .iter()
                .zip(&lookups)
                .map(|((axis, coords), lookup)| {
                    lookup
                        .positions(coords)
                        .map_err(|_| MosaicError::CoordinateNotInGrid {
                            patch: patch.name().to_string(),
                            axis: axis.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            self.scatter_patch(&mut data, patch, &positions)?;
        }

        let unpopulated = data.iter().filter(|v| v.is_nan()).count();

        if unpopulated > 0 {
            debug!(
                "{} of {} gridpoints were not populated by any patch",
                unpopulated,
                data.len()
            );
            return Err(MosaicError::IncompleteCoverage);
        }

        Ok(Mosaic {
            grid: grid.clone(),
            data,
        })
    }

    /// Copies values of `patch` into `data` at given
    /// global `positions` along each axis.
    fn scatter_patch(
        &self,
        data: &mut ArrayD<Float>,
        patch: &Patch,
        positions: &[Vec<usize>],
    ) -> Result<(), MosaicError> {
        let mut target = vec![0; positions.len()];

        for (source, value) in patch.data().indexed_iter() {
            for (axis, axis_positions) in positions.iter().enumerate() {
                target[axis] = axis_positions[source[axis]];
            }

            let cell = &mut data[target.as_slice()];

            if self.overlap == OverlapPolicy::Reject && !cell.is_nan() {
                return Err(MosaicError::Overlap {
                    patch: patch.name().to_string(),
                });
            }

            *cell = *value;
        }

        Ok(())
    }
}
