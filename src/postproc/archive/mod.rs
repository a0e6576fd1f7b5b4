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

//! Module responsible for reading AtmoRep output archives.
//!
//! AtmoRep writes its output as Zarr (version 2) hierarchies packed
//! in zip files. Groups and arrays are identified by `/`-separated keys,
//! eg. `temperature/sample=00000/lat`. The archive is opened through
//! the zip storage adapter of `zarrs`, which also decodes the chunks.

mod metadata;

#[cfg(test)]
pub(crate) mod testing;

use self::metadata::{TimeUnit, NOT_A_TIME};
use crate::errors::ArchiveError;
use chrono::NaiveDateTime;
use log::debug;
use ndarray::{ArrayD, IxDyn};
use serde_json::Value;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use zarrs::{
    array::{Array, ArrayMetadata, DataType},
    array_subset::ArraySubset,
    storage::{
        storage_adapter::zip::ZipStorageAdapter, store::FilesystemStore, ListableStorageTraits,
        ReadableStorageTraits, StoreKey, StorePrefix,
    },
};

type ZipStorage = ZipStorageAdapter<FilesystemStore>;

/// Array read from the archive with elements
/// converted to one of the supported kinds.
#[derive(Clone, PartialEq, Debug)]
pub enum StoredArray {
    Float(ArrayD<f64>),
    Int(ArrayD<i64>),
    DateTime(ArrayD<NaiveDateTime>),
}

impl StoredArray {
    pub fn shape(&self) -> &[usize] {
        match self {
            StoredArray::Float(array) => array.shape(),
            StoredArray::Int(array) => array.shape(),
            StoredArray::DateTime(array) => array.shape(),
        }
    }
}

/// Read-only Zarr store packed in a zip file.
pub struct ZipStore {
    path: PathBuf,
    storage: Arc<ZipStorage>,
}

impl ZipStore {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        debug!("Opening archive {}", path.display());

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ArchiveError::InvalidPath(path.to_path_buf()))?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let directory = FilesystemStore::new(parent).map_err(ArchiveError::store)?;
        let key = StoreKey::new(file_name).map_err(ArchiveError::store)?;
        let storage =
            ZipStorageAdapter::new(Arc::new(directory), key).map_err(ArchiveError::store)?;

        Ok(ZipStore {
            path: path.to_path_buf(),
            storage: Arc::new(storage),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lists names of groups and arrays directly
    /// under `group`, sorted alphabetically.
    pub fn children(&self, group: &str) -> Result<Vec<String>, ArchiveError> {
        let prefix = format!("{}/", group.trim_matches('/'));
        let prefix = StorePrefix::new(&prefix).map_err(ArchiveError::store)?;

        let listing = self.storage.list_dir(&prefix)?;

        let mut children: Vec<String> = listing
            .prefixes()
            .iter()
            .filter_map(|child| child.as_str().strip_prefix(prefix.as_str()))
            .map(|child| child.trim_end_matches('/').to_string())
            .filter(|child| !child.is_empty() && !child.starts_with('.'))
            .collect();
        children.sort();

        Ok(children)
    }

    /// Reads whole array stored under `key`.
    ///
    /// Chunks missing from the archive take the fill value
    /// of the array, which for datetimes is an error.
    pub fn read_array(&self, key: &str) -> Result<StoredArray, ArchiveError> {
        let key = key.trim_matches('/');
        let metadata_key = StoreKey::new(&format!("{}/.zarray", key)).map_err(ArchiveError::store)?;

        let bytes = self
            .storage
            .get(&metadata_key)?
            .ok_or_else(|| ArchiveError::MissingEntry(key.to_string()))?;
        let metadata_error = |source| ArchiveError::Metadata {
            key: key.to_string(),
            source,
        };

        let mut document: Value = serde_json::from_slice(&bytes).map_err(metadata_error)?;
        let time_unit = metadata::datetime_as_ticks(&mut document);
        let metadata: ArrayMetadata = serde_json::from_value(document).map_err(metadata_error)?;

        let array = Array::new_with_metadata(self.storage.clone(), &format!("/{}", key), metadata)?;
        let subset = ArraySubset::new_with_shape(array.shape().to_vec());
        let shape: Vec<usize> = array.shape().iter().map(|len| *len as usize).collect();

        if let Some(unit) = time_unit {
            let ticks = array.retrieve_array_subset_elements::<i64>(&subset)?;
            let datetimes = ticks
                .into_iter()
                .map(|ticks| to_datetime(ticks, unit, key))
                .collect::<Result<Vec<_>, _>>()?;

            return Ok(StoredArray::DateTime(to_array(&shape, datetimes, key)?));
        }

        let stored = match array.data_type() {
            DataType::Float32 => {
                let elements = array.retrieve_array_subset_elements::<f32>(&subset)?;
                StoredArray::Float(to_array(&shape, widen(elements, f64::from), key)?)
            }
            DataType::Float64 => {
                let elements = array.retrieve_array_subset_elements::<f64>(&subset)?;
                StoredArray::Float(to_array(&shape, elements, key)?)
            }
            DataType::Int8 => {
                let elements = array.retrieve_array_subset_elements::<i8>(&subset)?;
                StoredArray::Int(to_array(&shape, widen(elements, i64::from), key)?)
            }
            DataType::Int16 => {
                let elements = array.retrieve_array_subset_elements::<i16>(&subset)?;
                StoredArray::Int(to_array(&shape, widen(elements, i64::from), key)?)
            }
            DataType::Int32 => {
                let elements = array.retrieve_array_subset_elements::<i32>(&subset)?;
                StoredArray::Int(to_array(&shape, widen(elements, i64::from), key)?)
            }
            DataType::Int64 => {
                let elements = array.retrieve_array_subset_elements::<i64>(&subset)?;
                StoredArray::Int(to_array(&shape, elements, key)?)
            }
            DataType::UInt8 => {
                let elements = array.retrieve_array_subset_elements::<u8>(&subset)?;
                StoredArray::Int(to_array(&shape, widen(elements, i64::from), key)?)
            }
            DataType::UInt16 => {
                let elements = array.retrieve_array_subset_elements::<u16>(&subset)?;
                StoredArray::Int(to_array(&shape, widen(elements, i64::from), key)?)
            }
            DataType::UInt32 => {
                let elements = array.retrieve_array_subset_elements::<u32>(&subset)?;
                StoredArray::Int(to_array(&shape, widen(elements, i64::from), key)?)
            }
            DataType::UInt64 => {
                let elements = array.retrieve_array_subset_elements::<u64>(&subset)?;
                let elements = elements
                    .into_iter()
                    .map(i64::try_from)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| ArchiveError::UnexpectedArray {
                        key: key.to_string(),
                        reason: "unsigned integer does not fit in 64-bit signed integer",
                    })?;
                StoredArray::Int(to_array(&shape, elements, key)?)
            }
            other => return Err(ArchiveError::UnsupportedDtype(format!("{:?}", other))),
        };

        Ok(stored)
    }
}

fn widen<T, U>(elements: Vec<T>, convert: fn(T) -> U) -> Vec<U> {
    elements.into_iter().map(convert).collect()
}

fn to_array<T>(shape: &[usize], elements: Vec<T>, key: &str) -> Result<ArrayD<T>, ArchiveError> {
    ArrayD::from_shape_vec(IxDyn(shape), elements).map_err(|_| ArchiveError::UnexpectedArray {
        key: key.to_string(),
        reason: "decoded elements do not match array shape",
    })
}

fn to_datetime(ticks: i64, unit: TimeUnit, key: &str) -> Result<NaiveDateTime, ArchiveError> {
    if ticks == NOT_A_TIME {
        return Err(ArchiveError::UnexpectedArray {
            key: key.to_string(),
            reason: "datetime array contains NaT values",
        });
    }

    ticks
        .checked_mul(unit.nanoseconds())
        .and_then(datetime_from_nanoseconds)
        .ok_or_else(|| ArchiveError::UnexpectedArray {
            key: key.to_string(),
            reason: "datetime is out of range",
        })
}

fn datetime_from_nanoseconds(nanoseconds: i64) -> Option<NaiveDateTime> {
    let seconds = nanoseconds.div_euclid(1_000_000_000);
    let subsec = nanoseconds.rem_euclid(1_000_000_000) as u32;

    NaiveDateTime::from_timestamp_opt(seconds, subsec)
}
