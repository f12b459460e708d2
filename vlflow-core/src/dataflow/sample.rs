/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::context::CompileContext;
use crate::dataflow::node::{node_hash, DataflowNodeTrait};
use crate::vega::transform::sample::SampleTransformSpec;
use crate::vega::transform::TransformSpec;
use serde::Serialize;
use vlflow_common::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleNode {
    size: f64,
}

impl SampleNode {
    pub fn new(size: f64) -> Self {
        Self { size }
    }
}

impl DataflowNodeTrait for SampleNode {
    fn hash(&self) -> Result<String> {
        node_hash("Sample", self)
    }

    fn assemble(&self, _ctx: &CompileContext) -> Result<Vec<TransformSpec>> {
        Ok(vec![TransformSpec::Sample(SampleTransformSpec { size: self.size })])
    }
}
