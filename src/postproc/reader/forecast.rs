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

use super::{ensemble_axis, patch_label, read_data, to_coords, DataKind, ReadRequest};
use crate::constants::{LAT_AXIS, LEVEL_AXIS, LON_AXIS, TIME_AXIS};
use crate::errors::ArchiveError;
use crate::postproc::archive::ZipStore;
use crate::postproc::mosaic::Patch;

/// Reads patches stored with regular 1D coordinates.
/// Data of each patch has dims `[ml, datetime, lat, lon]`,
/// preceded by ensemble member for ensemble data.
pub(super) fn read_patches(
    store: &ZipStore,
    request: &ReadRequest,
    patch_ids: &[String],
) -> Result<Vec<Patch>, ArchiveError> {
    let mut patches = Vec::with_capacity(patch_ids.len());

    for patch_id in patch_ids {
        let prefix = format!("{}/{}", request.variable, patch_id);
        let data = read_data(store, &format!("{}/data", prefix))?;

        let mut axes = Vec::with_capacity(data.ndim());

        if request.kind == DataKind::Ens {
            axes.push(ensemble_axis(
                request.ensemble_members,
                data.shape().first().copied().unwrap_or(0),
            ));
        }

        for axis in [LEVEL_AXIS, TIME_AXIS, LAT_AXIS, LON_AXIS] {
            let key = format!("{}/{}", prefix, axis);
            let coords = to_coords(axis, store.read_array(&key)?, &key)?;
            axes.push((axis.to_string(), coords));
        }

        patches.push(Patch::new(
            patch_label(&request.variable, patch_id),
            axes,
            data,
        )?);
    }

    Ok(patches)
}
