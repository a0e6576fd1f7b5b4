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

use super::{ensemble_axis, read_data, to_coords, DataKind, ReadRequest};
use crate::constants::{LAT_AXIS, LEVEL_AXIS, LON_AXIS, TIME_AXIS};
use crate::errors::ArchiveError;
use crate::postproc::archive::{StoredArray, ZipStore};
use crate::postproc::mosaic::{CoordAxis, Patch};
use ndarray::Axis;

/// Reads tokens of one model level as separate patches.
///
/// Data is stored with dims `[itoken, (ensemble), t, y, x]` and
/// coordinates of every token are rows of `[itoken, t|y|x]` arrays.
/// Each token becomes a patch with singleton `ml` axis, so that
/// tokens can be assembled in the same way as forecast patches.
pub(super) fn read_patches(
    store: &ZipStore,
    request: &ReadRequest,
    patch_ids: &[String],
    model_level: i64,
) -> Result<Vec<Patch>, ArchiveError> {
    let ensemble = request.kind == DataKind::Ens;
    let mut patches = vec![];

    for patch_id in patch_ids {
        let prefix = format!("{}/{}/ml={}", request.variable, patch_id, model_level);
        let data_key = format!("{}/data", prefix);
        let data = read_data(store, &data_key)?;

        let expected_rank = if ensemble { 5 } else { 4 };
        if data.ndim() != expected_rank {
            return Err(ArchiveError::UnexpectedArray {
                key: data_key,
                reason: "token data has unexpected rank",
            });
        }

        let num_tokens = data.shape()[0];
        let mut token_coords = vec![];

        for axis in [TIME_AXIS, LAT_AXIS, LON_AXIS] {
            let key = format!("{}/{}", prefix, axis);
            let rows = split_rows(store.read_array(&key)?, &key, num_tokens)?;
            token_coords.push((axis, key, rows));
        }

        let label = format!(
            "{}_ml{}_{}",
            request.variable,
            model_level,
            patch_id.replace('=', "")
        );

        for (token, token_data) in data.outer_iter().enumerate() {
            let level_position = if ensemble { 1 } else { 0 };
            let token_data = token_data.to_owned().insert_axis(Axis(level_position));

            let mut axes = Vec::with_capacity(token_data.ndim());

            if ensemble {
                axes.push(ensemble_axis(request.ensemble_members, token_data.shape()[0]));
            }

            axes.push((LEVEL_AXIS.to_string(), CoordAxis::Index(vec![model_level])));

            for (axis, key, rows) in &token_coords {
                axes.push((axis.to_string(), to_coords(axis, rows[token].clone(), key)?));
            }

            patches.push(Patch::new(
                format!("{}_token{}", label, token),
                axes,
                token_data,
            )?);
        }
    }

    Ok(patches)
}

/// Splits `[itoken, n]` coordinate array into rows of each token.
fn split_rows(
    stored: StoredArray,
    key: &str,
    num_tokens: usize,
) -> Result<Vec<StoredArray>, ArchiveError> {
    let shape = stored.shape();

    if shape.len() != 2 || shape[0] != num_tokens {
        return Err(ArchiveError::UnexpectedArray {
            key: key.to_string(),
            reason: "token coordinates do not match token data",
        });
    }

    let rows = match stored {
        StoredArray::Float(values) => values
            .outer_iter()
            .map(|row| StoredArray::Float(row.to_owned()))
            .collect(),
        StoredArray::Int(values) => values
            .outer_iter()
            .map(|row| StoredArray::Int(row.to_owned()))
            .collect(),
        StoredArray::DateTime(values) => values
            .outer_iter()
            .map(|row| StoredArray::DateTime(row.to_owned()))
            .collect(),
    };

    Ok(rows)
}
