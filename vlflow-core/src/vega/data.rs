/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::vega::transform::TransformSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single entry of the `data` array of a Vega specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSpec {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<DataFormatSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<TransformSpec>,
}

impl DataSpec {
    /// Names of the signals defined by this dataset's transforms
    pub fn output_signals(&self) -> Vec<String> {
        self.transform
            .iter()
            .flat_map(|tx| tx.output_signals())
            .collect()
    }

    /// Names of the other datasets this dataset's transforms read
    pub fn input_datasets(&self) -> Vec<String> {
        self.transform
            .iter()
            .flat_map(|tx| tx.input_datasets())
            .collect()
    }

    /// Format parse directives, or an empty map when the dataset has none
    pub fn format_parse(&self) -> BTreeMap<String, String> {
        self.format
            .as_ref()
            .and_then(|fmt| fmt.parse.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFormatSpec {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse: Option<BTreeMap<String, String>>,
}

impl DataFormatSpec {
    pub fn is_empty(&self) -> bool {
        self.type_.is_none() && self.parse.as_ref().map(|p| p.is_empty()).unwrap_or(true)
    }
}
