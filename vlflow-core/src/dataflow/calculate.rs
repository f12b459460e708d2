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
use crate::spec::predicate::expression_fields;
use crate::vega::transform::formula::FormulaTransformSpec;
use crate::vega::transform::TransformSpec;
use serde::Serialize;
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::Result;

/// Computes a new field from an expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculateNode {
    expr: String,
    #[serde(rename = "as")]
    as_: String,
}

impl CalculateNode {
    pub fn new(expr: &str, as_: &str) -> Self {
        Self {
            expr: expr.to_string(),
            as_: as_.to_string(),
        }
    }
}

impl DataflowNodeTrait for CalculateNode {
    fn dependent_fields(&self) -> ColumnUsage {
        expression_fields(&self.expr).into_iter().collect()
    }

    fn produced_fields(&self) -> ColumnUsage {
        ColumnUsage::from(self.as_.as_str())
    }

    fn hash(&self) -> Result<String> {
        node_hash("Calculate", self)
    }

    fn assemble(&self, _ctx: &CompileContext) -> Result<Vec<TransformSpec>> {
        Ok(vec![TransformSpec::Formula(FormulaTransformSpec::new(
            &self.expr, &self.as_,
        ))])
    }
}
