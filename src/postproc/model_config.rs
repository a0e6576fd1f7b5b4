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

//! Module reading configuration of the trained AtmoRep model.
//!
//! AtmoRep saves its configuration as `model_<model_id>.json`
//! next to the results. Only a few keys of it are needed to
//! interpret the archives, so the file is kept as a JSON map
//! and the values are extracted and checked when it is loaded.

use super::reader::{ArchiveLayout, DataKind};
use crate::errors::ModelConfigError;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::{fs, path::Path};

/// Training strategy of the model, which
/// determines the layout of its archives.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Strategy {
    Forecast,
    Bert,
    Other(String),
}

impl From<&str> for Strategy {
    fn from(name: &str) -> Self {
        match name {
            "forecast" => Strategy::Forecast,
            "BERT" => Strategy::Bert,
            other => Strategy::Other(other.to_string()),
        }
    }
}

/// Key under which the target fields are listed.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TargetKind {
    FieldsPrediction,
    FieldsTargets,
}

impl TargetKind {
    pub fn key(self) -> &'static str {
        match self {
            TargetKind::FieldsPrediction => "fields_prediction",
            TargetKind::FieldsTargets => "fields_targets",
        }
    }
}

/// Tokenization settings of one field.
#[derive(Clone, PartialEq, Debug)]
pub struct TokenConfig {
    pub name: String,
    pub general_config: Value,
    pub vertical_levels: Vec<i64>,
    pub num_tokens: Vec<usize>,
    pub token_shape: Vec<usize>,
    pub bert_parameters: Value,
}

impl TryFrom<&Value> for TokenConfig {
    type Error = ModelConfigError;

    /// Field entries are lists of
    /// `[name, general_config, vertical_levels, num_tokens, token_shape, bert_parameters]`.
    fn try_from(entry: &Value) -> Result<Self, Self::Error> {
        let malformed = || ModelConfigError::MalformedField(entry.to_string());

        let items = entry.as_array().ok_or_else(malformed)?;
        if items.len() < 6 {
            return Err(malformed());
        }

        Ok(TokenConfig {
            name: field_name(entry)?,
            general_config: items[1].clone(),
            vertical_levels: parse_item(&items[2]).ok_or_else(malformed)?,
            num_tokens: parse_item(&items[3]).ok_or_else(malformed)?,
            token_shape: parse_item(&items[4]).ok_or_else(malformed)?,
            bert_parameters: items[5].clone(),
        })
    }
}

/// Parts of the model configuration used in post-processing.
#[derive(Clone, PartialEq, Debug)]
pub struct ModelConfig {
    strategy: Strategy,
    target_kind: TargetKind,
    input_variables: Vec<String>,
    target_variables: Vec<String>,
    input_tokens: Vec<TokenConfig>,
    target_tokens: Vec<TokenConfig>,
    ensemble_members: Option<usize>,
    token_overlap: bool,
}

impl ModelConfig {
    pub fn new_from_file(file_path: &Path) -> Result<Self, ModelConfigError> {
        debug!("Reading model configuration from {}", file_path.display());

        let data = fs::read(file_path)?;
        ModelConfig::new_from_slice(&data)
    }

    fn new_from_slice(data: &[u8]) -> Result<Self, ModelConfigError> {
        let config: Map<String, Value> = serde_json::from_slice(data)?;

        let strategy = config
            .get("BERT_strategy")
            .and_then(Value::as_str)
            .map(Strategy::from)
            .ok_or(ModelConfigError::MissingKey("BERT_strategy"))?;

        let target_kind = match strategy {
            Strategy::Forecast | Strategy::Bert => TargetKind::FieldsPrediction,
            Strategy::Other(_) => TargetKind::FieldsTargets,
        };

        let fields = field_list(&config, "fields")?;
        let input_variables = fields.iter().map(field_name).collect::<Result<_, _>>()?;
        let input_tokens: Vec<TokenConfig> = fields
            .iter()
            .map(TokenConfig::try_from)
            .collect::<Result<_, _>>()?;

        let targets = field_list(&config, target_kind.key())?;
        let target_variables = targets.iter().map(field_name).collect::<Result<_, _>>()?;

        // only separately listed targets carry their own token settings
        let target_tokens = match target_kind {
            TargetKind::FieldsTargets => targets
                .iter()
                .map(TokenConfig::try_from)
                .collect::<Result<_, _>>()?,
            TargetKind::FieldsPrediction => input_tokens.clone(),
        };

        let ensemble_members = config
            .get("net_tail_num_nets")
            .and_then(Value::as_u64)
            .map(|n| n as usize);

        Ok(ModelConfig {
            strategy,
            target_kind,
            input_variables,
            target_variables,
            input_tokens,
            target_tokens,
            ensemble_members,
            token_overlap: config.contains_key("token_overlap"),
        })
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn target_kind(&self) -> TargetKind {
        self.target_kind
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    pub fn target_variables(&self) -> &[String] {
        &self.target_variables
    }

    pub fn input_token_config(&self, variable: &str) -> Option<&TokenConfig> {
        self.input_tokens.iter().find(|token| token.name == variable)
    }

    /// Token settings of target field, same as for the
    /// input field unless targets are listed separately.
    pub fn target_token_config(&self, variable: &str) -> Option<&TokenConfig> {
        self.target_tokens.iter().find(|token| token.name == variable)
    }

    /// Number of ensemble members predicted by the network tail.
    pub fn ensemble_members(&self) -> Option<usize> {
        self.ensemble_members
    }

    /// Layout of archives with `kind` data.
    ///
    /// Source data of BERT runs is stored the same way as forecast data.
    pub fn layout(
        &self,
        kind: DataKind,
        model_level: Option<i64>,
    ) -> Result<ArchiveLayout, ModelConfigError> {
        match &self.strategy {
            Strategy::Forecast => Ok(ArchiveLayout::Forecast),
            Strategy::Bert if kind == DataKind::Source => Ok(ArchiveLayout::Forecast),
            Strategy::Bert => model_level
                .map(|model_level| ArchiveLayout::Bert { model_level })
                .ok_or(ModelConfigError::MissingModelLevel),
            Strategy::Other(name) => Err(ModelConfigError::UnsupportedStrategy(name.clone())),
        }
    }

    /// Global fields are produced by forecast runs with overlapping tokens.
    pub fn assembles_global_field(&self) -> bool {
        self.strategy == Strategy::Forecast && self.token_overlap
    }
}

fn field_list<'a>(
    config: &'a Map<String, Value>,
    key: &'static str,
) -> Result<&'a Vec<Value>, ModelConfigError> {
    config
        .get(key)
        .ok_or(ModelConfigError::MissingKey(key))?
        .as_array()
        .ok_or_else(|| ModelConfigError::MalformedField(key.to_string()))
}

fn parse_item<T: DeserializeOwned>(item: &Value) -> Option<T> {
    serde_json::from_value(item.clone()).ok()
}

fn field_name(entry: &Value) -> Result<String, ModelConfigError> {
    entry
        .get(0)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ModelConfigError::MalformedField(entry.to_string()))
}
