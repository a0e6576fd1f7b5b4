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

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Error while reading config.yaml: {0}")]
    Config(#[from] ConfigError),

    #[error("Error while creating ThreadPool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Error while accessing results directory: {0}")]
    Results(#[from] ResultsError),

    #[error("Error while reading model configuration: {0}")]
    ModelConfig(#[from] ModelConfigError),

    #[error("Error while reading archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Error while assembling patches: {0}")]
    Mosaic(#[from] MosaicError),

    #[error("Error while writing output: {0}")]
    Output(#[from] OutputError),

    #[error("Cannot set memory limit of {0} MB")]
    MemoryLimit(usize),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open config.yaml: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot deserialize config.yaml: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("Configuration component is out of bounds {0}")]
    OutOfBounds(&'static str),

    #[error("Configuration component is missing: {0}")]
    MissingComponent(&'static str),
}

#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("Could not find AtmoRep results-directory '{0}'")]
    NotADirectory(PathBuf),

    #[error("Results directory exists, but configuration file '{0}' cannot be found")]
    MissingModelConfig(PathBuf),

    #[error("Results directory '{0}' exists, but no zarr output files found")]
    NoArchives(PathBuf),

    #[error("Could not find any files matching pattern '{pattern}' under directory '{dir}'")]
    NoMatchingFiles { pattern: String, dir: PathBuf },

    #[error("Cannot extract epoch number from file name '{0}'")]
    UnparsableEpoch(PathBuf),

    #[error("Cannot list results directory: {0}")]
    CantListDirectory(#[from] std::io::Error),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Cannot access file while searching: {0}")]
    Glob(#[from] glob::GlobError),
}

#[derive(Error, Debug)]
pub enum ModelConfigError {
    #[error("Cannot open model configuration: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot deserialize model configuration: {0}")]
    CantDeserialize(#[from] serde_json::Error),

    #[error("Field entry is malformed: {0}")]
    MalformedField(String),

    #[error("Key '{0}' is missing in model configuration")]
    MissingKey(&'static str),

    #[error("Handling data with sampling strategy '{0}' is not supported")]
    UnsupportedStrategy(String),

    #[error("Model level must be provided to read data written with BERT strategy")]
    MissingModelLevel,
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive path '{0}' has no valid file name")]
    InvalidPath(PathBuf),

    #[error("Cannot open archive store: {0}")]
    Store(String),

    #[error("Cannot access archive entries: {0}")]
    Storage(#[from] zarrs::storage::StorageError),

    #[error("Cannot open array: {0}")]
    ArrayCreate(#[from] zarrs::array::ArrayCreateError),

    #[error("Cannot decode array: {0}")]
    Array(#[from] zarrs::array::ArrayError),

    #[error("Cannot deserialize metadata of '{key}': {source}")]
    Metadata {
        key: String,
        source: serde_json::Error,
    },

    #[error("Entry '{0}' does not exist in archive")]
    MissingEntry(String),

    #[error("Data type '{0}' is not supported")]
    UnsupportedDtype(String),

    #[error("Array '{key}' has unexpected content: {reason}")]
    UnexpectedArray { key: String, reason: &'static str },

    #[error("Cannot construct patch: {0}")]
    Patch(#[from] PatchError),
}

impl ArchiveError {
    pub fn store(err: impl std::fmt::Display) -> Self {
        ArchiveError::Store(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Patch '{patch}' has {dims} dimension names for data of rank {rank}")]
    RankMismatch {
        patch: String,
        dims: usize,
        rank: usize,
    },

    #[error("Patch '{patch}' axis '{axis}' has {coords} coordinates for {len} data samples")]
    ShapeMismatch {
        patch: String,
        axis: String,
        coords: usize,
        len: usize,
    },

    #[error("Patch '{patch}' lists axis '{axis}' more than once")]
    DuplicateAxis { patch: String, axis: String },
}

#[derive(Error, Debug)]
pub enum MosaicError {
    #[error("Cannot assemble global field from empty list of patches")]
    EmptyInput,

    #[error("Patch '{patch}' does not have required axis '{axis}'")]
    MissingAxis { patch: String, axis: &'static str },

    #[error("Cannot infer grid spacing: {0}")]
    DegenerateAxis(&'static str),

    #[error("Patch '{patch}' spacing along '{axis}' differs from the global grid")]
    InconsistentSpacing { patch: String, axis: &'static str },

    #[error("Patch '{patch}' dimensions do not match the global grid")]
    DimsMismatch { patch: String },

    #[error("Patch '{patch}' coordinate on axis '{axis}' is not in the global grid")]
    CoordinateNotInGrid { patch: String, axis: String },

    #[error("Patch '{patch}' overlaps previously written patches")]
    Overlap { patch: String },

    #[error("Could not assemble global field")]
    IncompleteCoverage,
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Cannot write output file: {0}")]
    CantWriteFile(#[from] std::io::Error),

    #[error("Output path '{0}' exists and is not empty")]
    NotEmpty(PathBuf),

    #[error("Cannot create output store: {0}")]
    Store(String),

    #[error("Cannot write store entries: {0}")]
    Storage(#[from] zarrs::storage::StorageError),

    #[error("Cannot create group: {0}")]
    GroupCreate(#[from] zarrs::group::GroupCreateError),

    #[error("Cannot create array: {0}")]
    ArrayCreate(#[from] zarrs::array::ArrayCreateError),

    #[error("Cannot encode array: {0}")]
    Array(#[from] zarrs::array::ArrayError),

    #[error("More than one patch is named '{0}'")]
    DuplicatePatch(String),
}

impl OutputError {
    pub fn store(err: impl std::fmt::Display) -> Self {
        OutputError::Store(err.to_string())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    #[error("Searched array is empty")]
    EmptyArray,

    #[error("Searched value is out of array bounds")]
    OutOfBounds,

    #[error("Searched value is not in the array")]
    NotFound,
}
