/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::dataflow::graph::NodeId;
use crate::dataflow::node::{node_hash, DataflowNodeTrait};
use serde_json::json;
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::Result;

/// Row/column split of a facet model. Facet cells read the table below this node grouped by
/// `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetNode {
    model: String,
    name: String,
    fields: Vec<String>,
    main: NodeId,
}

impl FacetNode {
    pub fn new(model: &str, name: &str, fields: Vec<String>, main: NodeId) -> Self {
        Self {
            model: model.to_string(),
            name: name.to_string(),
            fields,
            main,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Name of the per-cell data
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Main output of the facet model
    pub fn main(&self) -> NodeId {
        self.main
    }
}

impl DataflowNodeTrait for FacetNode {
    fn dependent_fields(&self) -> ColumnUsage {
        ColumnUsage::from(self.fields.as_slice())
    }

    fn hash(&self) -> Result<String> {
        node_hash(
            "Facet",
            &json!({"model": self.model, "name": self.name, "fields": self.fields}),
        )
    }
}
