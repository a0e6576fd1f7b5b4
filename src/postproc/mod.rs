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

//! Module containing the post-processing pipeline.
//!
//! The processing consists of the following steps:
//!
//! 1. The configuration file `config.yaml` is read and checked.
//! 2. The results directory of the AtmoRep run and the model
//!    configuration stored in it are located and read.
//! 3. All archives with requested data type (and epoch) are found and
//!    their patches are read in parallel. The order of archives (epoch,
//!    then path) is preserved in the list of patches.
//! 4. For forecast runs with overlapping tokens the patches are
//!    reassembled into a global field (see [`mosaic`]). Otherwise
//!    the patches are kept as they are.
//! 5. The result is written to Zarr store that can be opened with xarray.

mod archive;
mod configuration;
mod model_config;
mod mosaic;
mod output;
mod reader;
mod results;

#[cfg(test)]
mod super_tests;

use self::{
    archive::ZipStore,
    configuration::Config,
    model_config::ModelConfig,
    mosaic::{derive_global_grid, Mosaic, MosaicAssembler, Patch},
    output::ZarrWriter,
    reader::{ArchiveLayout, DataKind, ReadRequest},
    results::ResultsDir,
};
use crate::{
    errors::{ArchiveError, ProcessingError},
    ALLOCATOR,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde_json::{Map, Value};
use std::{
    path::{Component, Path, PathBuf},
    sync::mpsc,
};

/// Result of reading one variable from AtmoRep archives.
#[derive(Clone, Debug)]
pub enum FieldData {
    Global(Mosaic),
    Patches(Vec<Patch>),
}

/// Main post-processing function, responsible for all processing steps.
pub fn main() -> Result<(), ProcessingError> {
    info!("Preparing the post-processing core");

    debug!("Reading configuration from config.yaml");
    let config = Config::new_from_file(Path::new("config.yaml"))?;

    debug!("Setting memory limit");
    let memory = config.resources.memory;
    ALLOCATOR
        .set_limit(memory.saturating_mul(1024 * 1024))
        .map_err(|_| ProcessingError::MemoryLimit(memory))?;

    let core = Core::new(config)?;

    info!("Reading {} data of {}", core.config.data_type, core.config.variable);
    let (field, archives_count) = core.read_field()?;

    info!("Writing output to {}", core.config.output.display());
    core.write_output(&field, archives_count)?;

    Ok(())
}

/// Structure containing everything needed
/// to read the data of one AtmoRep run.
#[derive(Debug)]
pub struct Core {
    pub config: Config,
    pub threadpool: ThreadPool,
    pub results: ResultsDir,
    pub model: ModelConfig,
}

impl Core {
    /// Post-processing [`Core`] constructor.
    ///
    /// Checks that results of the requested run
    /// exist and reads the model configuration.
    pub fn new(config: Config) -> Result<Self, ProcessingError> {
        debug!("Setting up ThreadPool");
        let threadpool = ThreadPoolBuilder::new()
            .num_threads(config.resources.threads as usize)
            .stack_size(2 * 1024 * 1024)
            .build()?;

        debug!("Checking results directory");
        let results = ResultsDir::new(&config.results_basedir, &config.model_id)?;
        let model = ModelConfig::new_from_file(results.model_config())?;
        debug!(
            "Results of model trained with {:?} strategy found in {}",
            model.strategy(),
            results.path().display()
        );

        Ok(Core {
            config,
            threadpool,
            results,
            model,
        })
    }

    /// Reads all archives with requested data and assembles
    /// them into global field when the run was global.
    /// Returns the field with the number of archives read.
    pub fn read_field(&self) -> Result<(FieldData, usize), ProcessingError> {
        let kind = self.config.data_type;
        let layout = self.model.layout(kind, self.config.model_level)?;

        let (known_variables, token_config, listed_under) = match kind {
            DataKind::Source => (
                self.model.input_variables(),
                self.model.input_token_config(&self.config.variable),
                "fields",
            ),
            _ => (
                self.model.target_variables(),
                self.model.target_token_config(&self.config.variable),
                self.model.target_kind().key(),
            ),
        };

        if !known_variables.contains(&self.config.variable) {
            warn!(
                "Variable {} is not listed under {} in model configuration, reading it anyway",
                self.config.variable, listed_under
            );
        }

        if let Some(tokens) = token_config {
            debug!(
                "Variable {} uses {:?} tokens of shape {:?}",
                tokens.name, tokens.num_tokens, tokens.token_shape
            );
        }

        let files = self.results.find_archives(kind, self.config.epoch)?;
        let archives_count = files.len();

        let request = ReadRequest {
            variable: self.config.variable.clone(),
            kind,
            ensemble_members: match kind {
                DataKind::Ens => self.model.ensemble_members(),
                _ => None,
            },
        };

        let patches = self.read_archives(files, layout, &request)?;
        info!("Read {} patches from {} archives", patches.len(), archives_count);

        if !self.model.assembles_global_field() {
            return Ok((FieldData::Patches(patches), archives_count));
        }

        debug!("Assembling global field");
        let grid = derive_global_grid(&patches)?;
        let mosaic = MosaicAssembler::new(self.config.assembly.overlap).assemble(&patches, &grid)?;

        Ok((FieldData::Global(mosaic), archives_count))
    }

    /// Reads archives on the threadpool, keeping patches in the order of `files`.
    fn read_archives(
        &self,
        files: Vec<PathBuf>,
        layout: ArchiveLayout,
        request: &ReadRequest,
    ) -> Result<Vec<Patch>, ProcessingError> {
        let files_count = files.len();

        // set progress bar for read archives
        let files_bar = ProgressBar::new(files_count as u64);
        files_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .progress_chars("#>-"),
        );
        files_bar.set_prefix("Read archives");

        let (tx, rx) = mpsc::channel();

        for (index, file) in files.into_iter().enumerate() {
            let tx = tx.clone();
            let request = request.clone();
            let tag = archive_tag(&file, self.results.path());

            self.threadpool.spawn(move || {
                let result = read_archive(&file, &tag, layout, &request);
                // receiver is gone only when another archive already failed
                tx.send((index, result)).ok();
            });
        }

        drop(tx);

        let mut archives: Vec<Option<Vec<Patch>>> = vec![None; files_count];

        for (index, result) in rx.iter() {
            match result {
                Ok(patches) => archives[index] = Some(patches),
                Err(err) => {
                    files_bar.abandon();
                    return Err(err.into());
                }
            }
            files_bar.inc(1);
        }

        files_bar.finish_with_message("All archives read");

        Ok(archives.into_iter().flatten().flatten().collect())
    }

    /// Writes the field with attributes describing its origin.
    pub fn write_output(&self, field: &FieldData, archives_count: usize) -> Result<(), ProcessingError> {
        let writer = ZarrWriter::create(&self.config.output)?;

        match field {
            FieldData::Global(mosaic) => writer.write_mosaic(&self.config.variable, mosaic)?,
            FieldData::Patches(patches) => writer.write_patches(&self.config.variable, patches)?,
        }

        let mut attributes = Map::new();
        attributes.insert("model_id".to_string(), self.results.model_id().into());
        attributes.insert("variable".to_string(), self.config.variable.as_str().into());
        attributes.insert("data_type".to_string(), self.config.data_type.as_str().into());
        attributes.insert("archives".to_string(), archives_count.into());
        attributes.insert(
            "global".to_string(),
            matches!(field, FieldData::Global(_)).into(),
        );

        if let Some(epoch) = self.config.epoch {
            attributes.insert("epoch".to_string(), epoch.into());
        }

        if let Some(model_level) = self.config.model_level {
            attributes.insert("model_level".to_string(), Value::from(model_level));
        }

        writer.finish(attributes)?;

        Ok(())
    }
}

/// Reads patches of one archive. Patch names are prefixed with `tag`
/// as every archive numbers its samples from zero.
fn read_archive(
    file: &Path,
    tag: &str,
    layout: ArchiveLayout,
    request: &ReadRequest,
) -> Result<Vec<Patch>, ArchiveError> {
    let store = ZipStore::open(file)?;
    let mut patches = layout.read_patches(&store, request)?;

    for patch in &mut patches {
        patch.prefix_name(tag);
    }

    Ok(patches)
}

/// Path of the archive relative to the results directory, without
/// extension and with components joined by `_`,
/// eg. `rank0_results_id1234_epoch00001_pred`.
fn archive_tag(file: &Path, results_dir: &Path) -> String {
    let relative = file.strip_prefix(results_dir).unwrap_or(file).with_extension("");

    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_")
}
