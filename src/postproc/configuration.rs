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

//! Module responsible for parsing and checking the configuration file.
//!
//! The configuration file uses [YAML](https://en.wikipedia.org/wiki/YAML)
//! and `serde` to enforce strong typing and automatic type checking.
//!
//! The structures and their fields in this module directly correspond to
//! the fields inside `config.yaml` so you can check this documentation
//! for more details how to set the config file.

use super::mosaic::OverlapPolicy;
use super::reader::DataKind;
use crate::errors::ConfigError;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// _(Optional)_ Fields controlling assembly of global fields.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Deserialize)]
pub struct Assembly {
    /// _(Optional)_ What to do when patches overlap.
    ///
    /// With `last_write_wins` the patch read later overwrites
    /// values of earlier patches, with `reject` the assembly fails.
    /// Defaults to `last_write_wins`.
    #[serde(default)]
    pub overlap: OverlapPolicy,
}

/// _(Optional)_ Fields with information about
/// resources available for the program.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct Resources {
    /// _(Optional)_ Thread count used for reading archives.
    ///
    /// Cannot be less than `1`. Defaults to `1`.
    #[serde(default = "Resources::default_threads")]
    pub threads: u16,

    /// _(Optional)_ Heap memory limit in MB.
    ///
    /// All patches and the global field are kept in memory,
    /// so for long forecasts or ensembles the memory usage can
    /// exceed the available system memory. Capping the allocator
    /// gives an OOM error message instead of the system
    /// killing the process without any information.
    ///
    /// Cannot be less than `128`. Defaults to whole addressable-space.
    #[serde(default = "Resources::default_memory")]
    pub memory: usize,
}

impl Resources {
    fn default_threads() -> u16 {
        1
    }

    fn default_memory() -> usize {
        usize::MAX / (1024 * 1024)
    }

    /// Checks if thread count and memory limit are
    /// above limits.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.threads < 1 {
            return Err(ConfigError::OutOfBounds(
                "Available threads cannot be less than 1",
            ));
        }

        if self.memory < 128 {
            return Err(ConfigError::OutOfBounds(
                "Available memory cannot be less than 128 MB",
            ));
        }

        Ok(())
    }
}

impl Default for Resources {
    fn default() -> Self {
        Resources {
            threads: Resources::default_threads(),
            memory: Resources::default_memory(),
        }
    }
}

/// Main config structure representing the fields in
/// configuration file.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Config {
    /// Identifier of the AtmoRep run, with or without the `id` prefix.
    pub model_id: String,

    /// Directory in which results of all runs are stored.
    /// Results of the run are expected in `<results_basedir>/id<model_id>`.
    pub results_basedir: PathBuf,

    /// Name of the variable to read, eg. `temperature`.
    pub variable: String,

    /// Kind of data to read: `source`, `pred`, `target` or `ens`.
    pub data_type: DataKind,

    /// _(Optional)_ Training epoch to read. All epochs are read when not set.
    #[serde(default)]
    pub epoch: Option<u32>,

    /// _(Optional)_ Model level to read. Required for runs
    /// trained with BERT strategy, ignored otherwise.
    #[serde(default)]
    pub model_level: Option<i64>,

    /// Path of the output Zarr store. Must not exist or be an empty directory.
    pub output: PathBuf,

    #[serde(default)]
    pub assembly: Assembly,

    #[serde(default)]
    pub resources: Resources,
}

impl Config {
    /// Config structure constructor, responsible for
    /// deserializing configuration and checking it.
    pub fn new_from_file(file_path: &Path) -> Result<Config, ConfigError> {
        let data = fs::read(file_path)?;
        Config::new_from_slice(&data)
    }

    fn new_from_slice(data: &[u8]) -> Result<Config, ConfigError> {
        let mut config: Config = serde_yaml::from_slice(data)?;

        config.check_bounds()?;
        config.resources.check_bounds()?;

        if !config.model_id.starts_with("id") {
            config.model_id = format!("id{}", config.model_id);
        }

        Ok(config)
    }

    fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::MissingComponent("model_id"));
        }

        if self.variable.trim().is_empty() {
            return Err(ConfigError::MissingComponent("variable"));
        }

        if self.output.as_os_str().is_empty() {
            return Err(ConfigError::MissingComponent("output"));
        }

        if self.epoch.map_or(false, |epoch| epoch > 99_999) {
            return Err(ConfigError::OutOfBounds(
                "Epoch number cannot have more than 5 digits",
            ));
        }

        Ok(())
    }
}
