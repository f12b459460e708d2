/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::dataflow::node::{node_hash, DataflowNodeTrait};
use crate::spec::data::DataDef;
use serde::Serialize;
use serde_json::Value;
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::Result;

/// Root of a pipeline: inline rows, a URL, or a dataset supplied by name at runtime
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_type: Option<String>,
}

impl SourceNode {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            url: None,
            values: None,
            format_type: None,
        }
    }
}

impl From<&DataDef> for SourceNode {
    fn from(data: &DataDef) -> Self {
        Self {
            name: data.name.clone(),
            url: data.url.clone(),
            values: data.values.clone(),
            format_type: data.format_type(),
        }
    }
}

impl DataflowNodeTrait for SourceNode {
    fn produced_fields(&self) -> ColumnUsage {
        ColumnUsage::Unknown
    }

    fn hash(&self) -> Result<String> {
        node_hash("Source", self)
    }
}
