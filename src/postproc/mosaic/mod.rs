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

//! Module responsible for reassembling local patches
//! stored in AtmoRep archives into global fields.
//!
//! AtmoRep predicts the atmospheric state in local patches
//! (tokens) scattered over the globe. Each patch carries its own
//! coordinates, so to get a global field the patches are written
//! onto a regular global grid by coordinate values, not by their
//! position in the archive.
//!
//! The assembly happens in two steps. First the [`GlobalGrid`] is
//! derived from the patches with [`derive_global_grid`], then
//! [`MosaicAssembler::assemble`] allocates the global array and
//! scatter-writes every patch into it. A global field is returned
//! only when every gridpoint has been written.

mod assembler;
mod bisection;
mod grid;
mod lookup;

#[cfg(test)]
pub(crate) mod testing;

pub use self::assembler::{MosaicAssembler, OverlapPolicy};
pub use self::grid::derive_global_grid;

use crate::{errors::PatchError, Float};
use chrono::NaiveDateTime;
use ndarray::ArrayD;

/// Named axis with its coordinates.
pub type Axis = (String, CoordAxis);

/// Coordinate values along one array axis.
///
/// Coordinates are typed so that timestamps and integral
/// pass-through values are compared exactly, while
/// geographical coordinates are compared with tolerance.
#[derive(Clone, PartialEq, Debug)]
pub enum CoordAxis {
    /// Geographical coordinates in degrees.
    Float(Vec<f64>),
    DateTime(Vec<NaiveDateTime>),
    /// Integral labels, eg. model levels or ensemble members.
    Index(Vec<i64>),
}

impl CoordAxis {
    pub fn len(&self) -> usize {
        match self {
            CoordAxis::Float(values) => values.len(),
            CoordAxis::DateTime(values) => values.len(),
            CoordAxis::Index(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Labelled n-dimensional array covering a bounded
/// region of the global grid.
#[derive(Clone, Debug)]
pub struct Patch {
    name: String,
    axes: Vec<Axis>,
    data: ArrayD<Float>,
}

impl Patch {
    /// Patch constructor checking that every axis has
    /// exactly as many coordinates as data samples along it.
    pub fn new(
        name: impl Into<String>,
        axes: Vec<Axis>,
        data: ArrayD<Float>,
    ) -> Result<Self, PatchError> {
        let name = name.into();

        if axes.len() != data.ndim() {
            return Err(PatchError::RankMismatch {
                patch: name,
                dims: axes.len(),
                rank: data.ndim(),
            });
        }

        for (i, (axis, coords)) in axes.iter().enumerate() {
            if axes[..i].iter().any(|(other, _)| other == axis) {
                return Err(PatchError::DuplicateAxis {
                    patch: name,
                    axis: axis.clone(),
                });
            }

            if coords.len() != data.shape()[i] {
                return Err(PatchError::ShapeMismatch {
                    patch: name,
                    axis: axis.clone(),
                    coords: coords.len(),
                    len: data.shape()[i],
                });
            }
        }

        Ok(Patch { name, axes, data })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames patch to `<prefix>_<name>`.
    pub fn prefix_name(&mut self, prefix: &str) {
        self.name = format!("{}_{}", prefix, self.name);
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn dims(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|(name, _)| name.as_str())
    }

    pub fn coords(&self, axis: &str) -> Option<&CoordAxis> {
        find_axis(&self.axes, axis)
    }

    pub fn data(&self) -> &ArrayD<Float> {
        &self.data
    }
}

/// Coordinates of the global field that
/// a complete set of patches is expected to tile.
#[derive(Clone, PartialEq, Debug)]
pub struct GlobalGrid {
    axes: Vec<Axis>,
}

impl GlobalGrid {
    pub fn new(axes: Vec<Axis>) -> Self {
        GlobalGrid { axes }
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn dims(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|(name, _)| name.as_str())
    }

    pub fn coords(&self, axis: &str) -> Option<&CoordAxis> {
        find_axis(&self.axes, axis)
    }

    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(|(_, coords)| coords.len()).collect()
    }
}

/// Fully populated global field.
///
/// Can only be created by the [`MosaicAssembler`],
/// which guarantees that no gridpoint is empty.
#[derive(Clone, Debug)]
pub struct Mosaic {
    grid: GlobalGrid,
    data: ArrayD<Float>,
}

impl Mosaic {
    pub fn grid(&self) -> &GlobalGrid {
        &self.grid
    }

    pub fn data(&self) -> &ArrayD<Float> {
        &self.data
    }
}

fn find_axis<'a>(axes: &'a [Axis], name: &str) -> Option<&'a CoordAxis> {
    axes.iter()
        .find(|(axis, _)| axis == name)
        .map(|(_, coords)| coords)
}
