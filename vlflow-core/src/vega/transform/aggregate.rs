/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::spec::aggregate::AggregateOp;
use crate::vega::transform::TransformSpecTrait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateTransformSpec {
    pub groupby: Vec<String>,

    pub ops: Vec<AggregateOp>,

    pub fields: Vec<Option<String>>,

    #[serde(rename = "as")]
    pub as_: Vec<String>,

    /// Per-op parameters, aligned with `ops`. Only present when some op takes a parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_params: Option<Vec<Option<f64>>>,
}

impl TransformSpecTrait for AggregateTransformSpec {}
