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

//! This is a module for integration tests of the post-processing,
//! but with access to private fields and methods.
//!
//! Every test builds a small results directory of an AtmoRep
//! run with model configuration and zipped archives, and then
//! runs the pipeline on it through the [`Core`].

use super::configuration::{Assembly, Config, Resources};
use super::mosaic::testing::{field_value, hour};
use super::mosaic::{CoordAxis, OverlapPolicy};
use super::reader::DataKind;
use super::{Core, FieldData};
use crate::errors::{ModelConfigError, MosaicError, ProcessingError, ResultsError};
use crate::postproc::archive::testing::ArchiveBuilder;
use crate::Float;
use serde_json::{json, Value};
use std::{fs, path::Path, sync::Arc};
use tempfile::TempDir;
use zarrs::{array::Array, array_subset::ArraySubset, storage::store::FilesystemStore};

const LEVEL: i64 = 137;

fn forecast_patch(builder: &mut ArchiveBuilder, id: &str, lats: &[f64], lons: &[f64]) {
    let prefix = format!("temperature/{}", id);
    let times = [hour(0), hour(6)];

    builder.group(&prefix);
    builder.int_array(&format!("{}/ml", prefix), &[1], &[LEVEL]);
    builder.datetime_array(&format!("{}/datetime", prefix), &[2], &times);
    builder.float_array(&format!("{}/lat", prefix), &[lats.len()], lats);
    builder.float_array(&format!("{}/lon", prefix), &[lons.len()], lons);

    let mut values = vec![];
    for time in &times {
        for lat in lats {
            for lon in lons {
                values.push(f64::from(field_value(LEVEL, *time, *lat, *lon)));
            }
        }
    }

    builder.float_array(
        &format!("{}/data", prefix),
        &[1, 2, lats.len(), lons.len()],
        &values,
    );
}

fn bert_patch(builder: &mut ArchiveBuilder, id: &str) {
    let prefix = format!("temperature/{}/ml={}", id, LEVEL);
    let times = [hour(0), hour(6), hour(0), hour(6)];
    let lats = [10.0, 9.0, 10.0, 9.0];
    let lons = [20.0, 21.0, 22.0, 23.0];

    builder.group(&format!("temperature/{}", id));
    builder.group(&prefix);
    builder.datetime_array(&format!("{}/datetime", prefix), &[2, 2], &times);
    builder.float_array(&format!("{}/lat", prefix), &[2, 2], &lats);
    builder.float_array(&format!("{}/lon", prefix), &[2, 2], &lons);
    builder.float_array(&format!("{}/data", prefix), &[2, 2, 2, 2], &[1.0; 16]);
}

fn model_json(strategy: &str, global: bool) -> Value {
    let mut model = json!({
        "BERT_strategy": strategy,
        "fields": [
            ["temperature", [1, 1024, [], 0], [96, 105, 114, 123, 137],
                [12, 2, 4], [3, 9, 9], [0.5, 0.9, 0.2, 0.05]]
        ],
        "fields_prediction": [["temperature", 1.0]],
        "net_tail_num_nets": 4
    });

    if global {
        model["token_overlap"] = json!([0, 0]);
    }

    model
}

/// Results directory with two archives from different epochs,
/// the first one covering northern and the second one southern
/// hemisphere. Both hemispheres share the equator.
fn forecast_results(model: Value, southern: bool) -> TempDir {
    let basedir = tempfile::tempdir().unwrap();
    let dir = basedir.path().join("id1234");
    fs::create_dir_all(dir.join("rank0")).unwrap();
    fs::write(
        dir.join("model_id1234.json"),
        serde_json::to_vec(&model).unwrap(),
    )
    .unwrap();

    let mut north = ArchiveBuilder::new();
    north.group("temperature");
    forecast_patch(&mut north, "sample=00000", &[90.0, 0.0], &[0.0, 90.0]);
    forecast_patch(&mut north, "sample=00001", &[90.0, 0.0], &[180.0, 270.0]);
    north.write(&dir.join("results_id1234_epoch00000_pred.zarr"));

    let mut south = ArchiveBuilder::new();
    south.group("temperature");
    if southern {
        forecast_patch(&mut south, "sample=00002", &[0.0, -90.0], &[0.0, 90.0]);
    }
    forecast_patch(&mut south, "sample=00003", &[0.0, -90.0], &[180.0, 270.0]);
    south.write(&dir.join("rank0/results_id1234_epoch00001_pred.zarr"));

    basedir
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

fn read_output(root: &Path, path: &str) -> Vec<Float> {
    let store = Arc::new(FilesystemStore::new(root).unwrap());
    let array = Array::open(store, path).unwrap();
    let subset = ArraySubset::new_with_shape(array.shape().to_vec());
    array.retrieve_array_subset_elements::<Float>(&subset).unwrap()
}

fn config(basedir: &Path, data_type: DataKind) -> Config {
    Config {
        model_id: "id1234".to_string(),
        results_basedir: basedir.to_path_buf(),
        variable: "temperature".to_string(),
        data_type,
        epoch: None,
        model_level: None,
        output: basedir.join("output/temperature.zarr"),
        assembly: Assembly::default(),
        resources: Resources::default(),
    }
}

#[test]
fn global_forecast() {
    let basedir = forecast_results(model_json("forecast", true), true);
    let core = Core::new(config(basedir.path(), DataKind::Pred)).unwrap();

    let (field, archives_count) = core.read_field().unwrap();
    assert_eq!(archives_count, 2);

    let mosaic = match &field {
        FieldData::Global(mosaic) => mosaic,
        FieldData::Patches(_) => panic!("expected global field"),
    };

    assert_eq!(mosaic.data().shape(), &[1, 2, 3, 4]);
    assert_eq!(
        mosaic.grid().coords("lat"),
        Some(&CoordAxis::Float(vec![-90.0, 0.0, 90.0]))
    );

    for (t, time) in [hour(0), hour(6)].iter().enumerate() {
        for (y, lat) in [-90.0, 0.0, 90.0].iter().enumerate() {
            for (x, lon) in [0.0, 90.0, 180.0, 270.0].iter().enumerate() {
                assert_eq!(
                    mosaic.data()[[0, t, y, x]],
                    field_value(LEVEL, *time, *lat, *lon)
                );
            }
        }
    }

    core.write_output(&field, archives_count).unwrap();

    let root = read_json(&core.config.output.join("zarr.json"));
    let attributes = &root["attributes"];
    assert_eq!(attributes["model_id"], "id1234");
    assert_eq!(attributes["data_type"], "pred");
    assert_eq!(attributes["global"], true);
    assert_eq!(attributes["archives"], 2);

    // the single model level is stored as one chunk
    assert!(core.config.output.join("temperature/c/0/0/0/0").is_file());
    assert!(!core.config.output.join("temperature/c/1/0/0/0").exists());

    let written = read_output(&core.config.output, "/temperature");
    let expected: Vec<Float> = mosaic.data().iter().copied().collect();
    assert_eq!(written, expected);
}

#[test]
fn incomplete_coverage() {
    let basedir = forecast_results(model_json("forecast", true), false);
    let core = Core::new(config(basedir.path(), DataKind::Pred)).unwrap();

    assert!(matches!(
        core.read_field(),
        Err(ProcessingError::Mosaic(MosaicError::IncompleteCoverage))
    ));
}

#[test]
fn rejected_overlap() {
    let basedir = forecast_results(model_json("forecast", true), true);
    let mut config = config(basedir.path(), DataKind::Pred);
    config.assembly.overlap = OverlapPolicy::Reject;
    let core = Core::new(config).unwrap();

    assert!(matches!(
        core.read_field(),
        Err(ProcessingError::Mosaic(MosaicError::Overlap { .. }))
    ));
}

#[test]
fn patches_in_archive_order() {
    let basedir = forecast_results(model_json("forecast", false), true);
    let core = Core::new(config(basedir.path(), DataKind::Pred)).unwrap();

    let (field, _) = core.read_field().unwrap();
    let patches = match &field {
        FieldData::Patches(patches) => patches,
        FieldData::Global(_) => panic!("expected list of patches"),
    };

    let names: Vec<&str> = patches.iter().map(|patch| patch.name()).collect();
    assert_eq!(
        names,
        vec![
            "results_id1234_epoch00000_pred_temperature_sample00000",
            "results_id1234_epoch00000_pred_temperature_sample00001",
            "rank0_results_id1234_epoch00001_pred_temperature_sample00002",
            "rank0_results_id1234_epoch00001_pred_temperature_sample00003"
        ]
    );

    core.write_output(&field, 2).unwrap();
    assert!(core
        .config
        .output
        .join("rank0_results_id1234_epoch00001_pred_temperature_sample00002/temperature/zarr.json")
        .is_file());
}

#[test]
fn unreadable_archive() {
    let basedir = forecast_results(model_json("forecast", false), true);
    fs::write(
        basedir.path().join("id1234/results_id1234_epoch00002_pred.zarr"),
        b"not a zip file",
    )
    .unwrap();

    let core = Core::new(config(basedir.path(), DataKind::Pred)).unwrap();

    assert!(matches!(core.read_field(), Err(ProcessingError::Archive(_))));
}

#[test]
fn sample_ids_shared_by_epochs() {
    let basedir = tempfile::tempdir().unwrap();
    let dir = basedir.path().join("id1234");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("model_id1234.json"),
        serde_json::to_vec(&model_json("forecast", false)).unwrap(),
    )
    .unwrap();

    let lons = [[0.0, 90.0], [180.0, 270.0]];
    for (epoch, lons) in lons.iter().enumerate() {
        let mut builder = ArchiveBuilder::new();
        builder.group("temperature");
        forecast_patch(&mut builder, "sample=00000", &[90.0, 0.0], lons);
        builder.write(&dir.join(format!("results_id1234_epoch{:05}_pred.zarr", epoch)));
    }

    let core = Core::new(config(basedir.path(), DataKind::Pred)).unwrap();
    let (field, archives_count) = core.read_field().unwrap();
    core.write_output(&field, archives_count).unwrap();

    for (epoch, lons) in lons.iter().enumerate() {
        let group = format!("/results_id1234_epoch{:05}_pred_temperature_sample00000", epoch);
        let written = read_output(&core.config.output, &format!("{}/temperature", group));

        assert_eq!(written.len(), 8);
        assert_eq!(written[0], field_value(LEVEL, hour(0), 90.0, lons[0]));
        assert_eq!(written[7], field_value(LEVEL, hour(6), 0.0, lons[1]));
    }
}

#[test]
fn single_epoch() {
    let basedir = forecast_results(model_json("forecast", false), true);
    let mut config = config(basedir.path(), DataKind::Pred);
    config.epoch = Some(1);
    let core = Core::new(config).unwrap();

    let (field, archives_count) = core.read_field().unwrap();
    assert_eq!(archives_count, 1);
    assert!(matches!(field, FieldData::Patches(patches) if patches.len() == 2));

    let mut config = core.config.clone();
    config.data_type = DataKind::Target;
    let core = Core::new(config).unwrap();
    assert!(matches!(
        core.read_field(),
        Err(ProcessingError::Results(ResultsError::NoMatchingFiles { .. }))
    ));
}

#[test]
fn bert_tokens() {
    let basedir = tempfile::tempdir().unwrap();
    let dir = basedir.path().join("id1234");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("model_id1234.json"),
        serde_json::to_vec(&model_json("BERT", true)).unwrap(),
    )
    .unwrap();

    for epoch in 0..2 {
        let mut builder = ArchiveBuilder::new();
        builder.group("temperature");
        bert_patch(&mut builder, "sample=00000");
        bert_patch(&mut builder, "sample=00001");
        builder.write(&dir.join(format!("results_id1234_epoch{:05}_pred.zarr", epoch)));
    }

    let core = Core::new(config(basedir.path(), DataKind::Pred)).unwrap();
    assert!(matches!(
        core.read_field(),
        Err(ProcessingError::ModelConfig(ModelConfigError::MissingModelLevel))
    ));

    let mut config = core.config.clone();
    config.model_level = Some(LEVEL);
    let core = Core::new(config).unwrap();

    let (field, _) = core.read_field().unwrap();
    let patches = match field {
        FieldData::Patches(patches) => patches,
        FieldData::Global(_) => panic!("BERT tokens are never assembled"),
    };

    assert_eq!(patches.len(), 8);
    assert_eq!(
        patches[3].name(),
        "results_id1234_epoch00000_pred_temperature_ml137_sample00001_token1"
    );
    assert_eq!(
        patches[7].name(),
        "results_id1234_epoch00001_pred_temperature_ml137_sample00001_token1"
    );
    assert_eq!(
        patches[3].dims().collect::<Vec<_>>(),
        vec!["ml", "datetime", "lat", "lon"]
    );

    let field = FieldData::Patches(patches);
    core.write_output(&field, 2).unwrap();

    let groups = fs::read_dir(&core.config.output)
        .unwrap()
        .filter(|entry| entry.as_ref().unwrap().path().is_dir())
        .count();
    assert_eq!(groups, 8);
}
