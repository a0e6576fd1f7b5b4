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

//! Helpers for writing Zarr archives in tests,
//! with the layout used by AtmoRep.

use chrono::NaiveDateTime;
use flate2::{write::GzEncoder, Compression};
use ndarray::{Dimension, IxDyn};
use serde_json::{json, Value};
use std::{collections::BTreeMap, fs::File, io::Write, path::Path};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

#[derive(Default)]
pub(crate) struct ArchiveBuilder {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ArchiveBuilder {
    pub(crate) fn new() -> Self {
        ArchiveBuilder::default()
    }

    pub(crate) fn group(&mut self, key: &str) {
        self.entries
            .insert(format!("{}/.zgroup", key), br#"{"zarr_format": 2}"#.to_vec());
    }

    /// Single-chunk uncompressed `<f4` array.
    pub(crate) fn float_array(&mut self, key: &str, shape: &[usize], values: &[f64]) {
        let bytes: Vec<Vec<u8>> = values
            .iter()
            .map(|v| (*v as f32).to_le_bytes().to_vec())
            .collect();
        self.array(key, shape, shape, "<f4", json!("NaN"), &bytes, false);
    }

    /// Chunked, gzip-compressed `<f8` array.
    pub(crate) fn chunked_float_array(
        &mut self,
        key: &str,
        shape: &[usize],
        chunks: &[usize],
        values: &[f64],
    ) {
        let bytes: Vec<Vec<u8>> = values.iter().map(|v| v.to_le_bytes().to_vec()).collect();
        self.array(key, shape, chunks, "<f8", json!("NaN"), &bytes, true);
    }

    pub(crate) fn int_array(&mut self, key: &str, shape: &[usize], values: &[i64]) {
        let bytes: Vec<Vec<u8>> = values.iter().map(|v| v.to_le_bytes().to_vec()).collect();
        self.array(key, shape, shape, "<i8", json!(0), &bytes, false);
    }

    pub(crate) fn datetime_array(&mut self, key: &str, shape: &[usize], values: &[NaiveDateTime]) {
        let bytes: Vec<Vec<u8>> = values
            .iter()
            .map(|v| {
                let nanoseconds = v.timestamp() * 1_000_000_000 + i64::from(v.timestamp_subsec_nanos());
                nanoseconds.to_le_bytes().to_vec()
            })
            .collect();
        self.array(key, shape, shape, "<M8[ns]", Value::Null, &bytes, false);
    }

    pub(crate) fn remove_entry(&mut self, key: &str) {
        self.entries.remove(key);
    }

    #[allow(clippy::too_many_arguments)]
    fn array(
        &mut self,
        key: &str,
        shape: &[usize],
        chunks: &[usize],
        dtype: &str,
        fill_value: Value,
        elements: &[Vec<u8>],
        compress: bool,
    ) {
        let compressor = if compress {
            json!({"id": "gzip", "level": 1})
        } else {
            Value::Null
        };

        let metadata = json!({
            "chunks": chunks,
            "compressor": compressor,
            "dtype": dtype,
            "fill_value": fill_value,
            "filters": null,
            "order": "C",
            "shape": shape,
            "zarr_format": 2
        });
        self.entries.insert(
            format!("{}/.zarray", key),
            serde_json::to_vec(&metadata).unwrap(),
        );

        let element_size = elements.first().map_or(1, Vec::len);
        let grid: Vec<usize> = shape
            .iter()
            .zip(chunks)
            .map(|(len, chunk)| (len + chunk - 1) / chunk)
            .collect();

        for chunk_index in ndarray::indices(IxDyn(&grid)) {
            let mut chunk = vec![];

            for local in ndarray::indices(IxDyn(chunks)) {
                let global: Vec<usize> = (0..shape.len())
                    .map(|axis| chunk_index[axis] * chunks[axis] + local[axis])
                    .collect();

                if global.iter().zip(shape).all(|(i, len)| i < len) {
                    let linear = global
                        .iter()
                        .zip(shape)
                        .fold(0, |acc, (i, len)| acc * len + i);
                    chunk.extend_from_slice(&elements[linear]);
                } else {
                    chunk.extend(std::iter::repeat(0).take(element_size));
                }
            }

            if compress {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
                encoder.write_all(&chunk).unwrap();
                chunk = encoder.finish().unwrap();
            }

            let index: Vec<String> = chunk_index.slice().iter().map(usize::to_string).collect();
            let chunk_key = if index.is_empty() {
                format!("{}/0", key)
            } else {
                format!("{}/{}", key, index.join("."))
            };
            self.entries.insert(chunk_key, chunk);
        }
    }

    pub(crate) fn write(&self, path: &Path) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);

        for (name, bytes) in &self.entries {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(bytes).unwrap();
        }

        zip.finish().unwrap();
    }
}
