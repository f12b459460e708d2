/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::context::CompileContext;
use crate::dataflow::node::DataflowNodeTrait;
use crate::vega::transform::identifier::{IdentifierTransformSpec, SELECTION_ID};
use crate::vega::transform::TransformSpec;
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::Result;

/// Adds a unique row id for selections to refer to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierNode;

impl DataflowNodeTrait for IdentifierNode {
    fn produced_fields(&self) -> ColumnUsage {
        ColumnUsage::from(SELECTION_ID)
    }

    fn hash(&self) -> Result<String> {
        Ok("Identifier".to_string())
    }

    fn assemble(&self, _ctx: &CompileContext) -> Result<Vec<TransformSpec>> {
        Ok(vec![TransformSpec::Identifier(
            IdentifierTransformSpec::default(),
        )])
    }
}
