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

//! Module locating files written by an AtmoRep run.
//!
//! Each run stores its archives in `<results_basedir>/<model_id>`,
//! next to the model configuration `model_<model_id>.json`. Archive
//! names follow `results_<model_id>_epoch<NNNNN>_<data_type>.zarr`
//! and can be placed in nested directories (eg. one per rank).

use super::reader::DataKind;
use crate::errors::ResultsError;
use glob::Pattern;
use log::debug;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Checked results directory of one AtmoRep run.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ResultsDir {
    model_id: String,
    path: PathBuf,
    model_config: PathBuf,
}

impl ResultsDir {
    /// Checks that the results directory of `model_id` exists
    /// and contains model configuration and at least one archive.
    pub fn new(basedir: &Path, model_id: &str) -> Result<Self, ResultsError> {
        let path = basedir.join(model_id);
        let model_config = path.join(format!("model_{}.json", model_id));

        if !path.is_dir() {
            return Err(ResultsError::NotADirectory(path));
        }

        if !model_config.is_file() {
            return Err(ResultsError::MissingModelConfig(model_config));
        }

        let mut has_archives = false;
        for entry in fs::read_dir(&path)? {
            if entry?.path().extension().map_or(false, |ext| ext == "zarr") {
                has_archives = true;
                break;
            }
        }

        if !has_archives {
            return Err(ResultsError::NoArchives(path));
        }

        Ok(ResultsDir {
            model_id: model_id.to_string(),
            path,
            model_config,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model_config(&self) -> &Path {
        &self.model_config
    }

    /// Finds all archives with `kind` data from one or all epochs.
    ///
    /// Files are sorted by epoch first and by their path within the epoch,
    /// so that archives from different ranks and batches keep the same order
    /// between runs.
    pub fn find_archives(
        &self,
        kind: DataKind,
        epoch: Option<u32>,
    ) -> Result<Vec<PathBuf>, ResultsError> {
        let epoch = match epoch {
            Some(epoch) => format!("epoch{:05}", epoch),
            None => "epoch*".to_string(),
        };
        let file_pattern = format!("results_{}_{}_{}.zarr", self.model_id, epoch, kind);

        let search = format!(
            "{}/**/{}",
            Pattern::escape(&self.path.to_string_lossy()),
            file_pattern
        );
        debug!("Searching archives with pattern {}", search);

        let mut files = vec![];
        for file in glob::glob(&search)? {
            let file = file?;
            let epoch = epoch_number(&file)?;
            files.push((epoch, file));
        }

        if files.is_empty() {
            return Err(ResultsError::NoMatchingFiles {
                pattern: file_pattern,
                dir: self.path.clone(),
            });
        }

        files.sort();

        Ok(files.into_iter().map(|(_, file)| file).collect())
    }
}

/// Extracts epoch number from archive name.
fn epoch_number(file: &Path) -> Result<u32, ResultsError> {
    let unparsable = || ResultsError::UnparsableEpoch(file.to_path_buf());

    let name = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(unparsable)?;

    let (_, rest) = name.split_once("_epoch").ok_or_else(unparsable)?;
    let number = rest.split('_').next().unwrap_or_default();

    number.parse().map_err(|_| unparsable())
}
