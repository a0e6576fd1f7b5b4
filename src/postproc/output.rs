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

//! Module writing post-processed fields as Zarr (version 3) store.
//!
//! Every array of the store names its dimensions, coordinates are
//! stored as separate arrays named after their axis and timestamps use
//! CF time encoding, so the store opens directly as xarray dataset.
//! Global fields are written in the root group, lists of patches as
//! one group per patch.

use super::mosaic::{Axis, CoordAxis, Mosaic, Patch};
use crate::errors::OutputError;
use crate::Float;
use log::debug;
use ndarray::{ArrayD, Axis as ArrayAxis};
use rustc_hash::FxHashSet;
use serde_json::{Map, Value};
use std::{fs, mem, path::Path, sync::Arc};
use zarrs::{
    array::{codec::GzipCodec, Array, ArrayBuilder, DataType, FillValue},
    group::GroupBuilder,
    storage::store::FilesystemStore,
};

const TIME_UNITS: &str = "seconds since 1970-01-01 00:00:00";
const GZIP_LEVEL: u32 = 1;

pub struct ZarrWriter {
    store: Arc<FilesystemStore>,
}

impl ZarrWriter {
    /// Creates the store at `root`, which must
    /// not exist or be an empty directory.
    pub fn create(root: &Path) -> Result<Self, OutputError> {
        if root.exists() && (!root.is_dir() || fs::read_dir(root)?.next().is_some()) {
            return Err(OutputError::NotEmpty(root.to_path_buf()));
        }

        fs::create_dir_all(root)?;
        debug!("Writing output to {}", root.display());

        let store = Arc::new(FilesystemStore::new(root).map_err(OutputError::store)?);
        GroupBuilder::new().build(store.clone(), "/")?.store_metadata()?;

        Ok(ZarrWriter { store })
    }

    /// Writes the global field in the root group.
    pub fn write_mosaic(&self, variable: &str, mosaic: &Mosaic) -> Result<(), OutputError> {
        self.write_field("", variable, mosaic.grid().axes(), mosaic.data())
    }

    /// Writes every patch in a separate group named after the patch.
    /// Patch names must be unique.
    pub fn write_patches(&self, variable: &str, patches: &[Patch]) -> Result<(), OutputError> {
        let mut written = FxHashSet::default();

        for patch in patches {
            if !written.insert(patch.name()) {
                return Err(OutputError::DuplicatePatch(patch.name().to_string()));
            }

            let group = format!("/{}", patch.name());
            GroupBuilder::new()
                .build(self.store.clone(), &group)?
                .store_metadata()?;
            self.write_field(&group, variable, patch.axes(), patch.data())?;
        }

        Ok(())
    }

    /// Writes root attributes.
    pub fn finish(self, attributes: Map<String, Value>) -> Result<(), OutputError> {
        GroupBuilder::new()
            .attributes(attributes)
            .build(self.store.clone(), "/")?
            .store_metadata()?;

        Ok(())
    }

    fn write_field(
        &self,
        group: &str,
        variable: &str,
        axes: &[Axis],
        data: &ArrayD<Float>,
    ) -> Result<(), OutputError> {
        for (name, coords) in axes {
            self.write_coords(&format!("{}/{}", group, name), name, coords)?;
        }

        let dims: Vec<&str> = axes.iter().map(|(name, _)| name.as_str()).collect();
        let shape: Vec<u64> = data.shape().iter().map(|len| *len as u64).collect();

        // one chunk per index of the leading axis
        let mut chunks: Vec<u64> = shape.iter().map(|len| (*len).max(1)).collect();
        if let Some(leading) = chunks.first_mut() {
            *leading = 1;
        }

        let array = ArrayBuilder::new(
            shape,
            float_data_type(),
            chunks
                .try_into()
                .map_err(|_| OutputError::Store(format!("invalid chunks of '{}'", variable)))?,
            FillValue::from(Float::NAN),
        )
        .bytes_to_bytes_codecs(vec![Box::new(
            GzipCodec::new(GZIP_LEVEL).map_err(OutputError::store)?,
        )])
        .dimension_names(Some(dims))
        .build(self.store.clone(), &format!("{}/{}", group, variable))?;
        array.store_metadata()?;

        if data.is_empty() {
            return Ok(());
        }

        if data.ndim() == 0 {
            let elements: Vec<Float> = data.iter().copied().collect();
            array.store_chunk_elements::<Float>(&[], &elements)?;
            return Ok(());
        }

        let mut chunk_index = vec![0u64; data.ndim()];
        for (i, slab) in data.axis_iter(ArrayAxis(0)).enumerate() {
            chunk_index[0] = i as u64;
            let elements: Vec<Float> = slab.iter().copied().collect();
            array.store_chunk_elements::<Float>(&chunk_index, &elements)?;
        }

        Ok(())
    }

    fn write_coords(&self, path: &str, axis: &str, coords: &CoordAxis) -> Result<(), OutputError> {
        let len = coords.len() as u64;
        let chunks = vec![len.max(1)];

        match coords {
            CoordAxis::Float(values) => {
                let array = self.coords_array(path, axis, len, chunks, DataType::Float64, Map::new())?;
                if !values.is_empty() {
                    array.store_chunk_elements::<f64>(&[0], values)?;
                }
            }
            CoordAxis::Index(values) => {
                let array = self.coords_array(path, axis, len, chunks, DataType::Int64, Map::new())?;
                if !values.is_empty() {
                    array.store_chunk_elements::<i64>(&[0], values)?;
                }
            }
            CoordAxis::DateTime(values) => {
                let mut attributes = Map::new();
                attributes.insert("units".to_string(), TIME_UNITS.into());
                attributes.insert("calendar".to_string(), "proleptic_gregorian".into());

                let array = self.coords_array(path, axis, len, chunks, DataType::Int64, attributes)?;
                let seconds: Vec<i64> = values.iter().map(|v| v.timestamp()).collect();
                if !seconds.is_empty() {
                    array.store_chunk_elements::<i64>(&[0], &seconds)?;
                }
            }
        }

        Ok(())
    }

    /// Creates one-dimensional, single-chunk coordinate array.
    fn coords_array(
        &self,
        path: &str,
        axis: &str,
        len: u64,
        chunks: Vec<u64>,
        data_type: DataType,
        attributes: Map<String, Value>,
    ) -> Result<Array<FilesystemStore>, OutputError> {
        let fill_value = match data_type {
            DataType::Float64 => FillValue::from(f64::NAN),
            _ => FillValue::from(0i64),
        };

        let array = ArrayBuilder::new(
            vec![len],
            data_type,
            chunks
                .try_into()
                .map_err(|_| OutputError::Store(format!("invalid chunks of '{}'", axis)))?,
            fill_value,
        )
        .dimension_names(Some([axis]))
        .attributes(attributes)
        .build(self.store.clone(), path)?;
        array.store_metadata()?;

        Ok(array)
    }
}

fn float_data_type() -> DataType {
    match mem::size_of::<Float>() {
        4 => DataType::Float32,
        _ => DataType::Float64,
    }
}
