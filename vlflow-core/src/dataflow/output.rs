/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::dataflow::node::{node_hash, DataflowNodeTrait};
use serde::Serialize;
use vlflow_common::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceType {
    /// Rows after parsing and filtering, before aggregation
    Raw,
    /// The table a view renders
    Main,
    /// Secondary table read by a lookup
    Lookup,
    /// Per-facet-cell copy of a table, used to size facet cells
    FacetScale,
}

/// A named point of the pipeline that consumers read from. Only outputs that at least one
/// consumer requested are emitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputNode {
    name: String,
    source_type: DataSourceType,
    ref_count: usize,
}

impl OutputNode {
    pub fn new(name: &str, source_type: DataSourceType) -> Self {
        Self {
            name: name.to_string(),
            source_type,
            ref_count: 0,
        }
    }

    /// Logical name consumers bind to
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_type(&self) -> DataSourceType {
        self.source_type
    }

    /// Register one more consumer
    pub fn request(&mut self) -> &str {
        self.ref_count += 1;
        &self.name
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    pub fn is_required(&self) -> bool {
        self.ref_count > 0
    }

    /// Copy used for a per-facet-cell table. The copy keeps the consumer count, so it is
    /// emitted whenever the original is.
    pub fn facet_scale_copy(&self) -> Self {
        Self {
            name: format!("scale_{}", self.name),
            source_type: DataSourceType::FacetScale,
            ref_count: self.ref_count,
        }
    }
}

impl DataflowNodeTrait for OutputNode {
    fn hash(&self) -> Result<String> {
        node_hash("Output", &self.name)
    }
}

#[cfg(test)]
mod tests {
    use crate::dataflow::output::{DataSourceType, OutputNode};

    #[test]
    fn test_request_counts_consumers() {
        let mut output = OutputNode::new("main", DataSourceType::Main);
        assert!(!output.is_required());
        assert_eq!(output.request(), "main");
        output.request();
        assert_eq!(output.ref_count(), 2);

        let copy = output.facet_scale_copy();
        assert_eq!(copy.name(), "scale_main");
        assert_eq!(copy.source_type(), DataSourceType::FacetScale);
        assert!(copy.is_required());
    }
}
