/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::vega::transform::TransformSpecTrait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaTransformSpec {
    pub expr: String,

    #[serde(rename = "as")]
    pub as_: String,
}

impl FormulaTransformSpec {
    pub fn new(expr: impl Into<String>, as_: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            as_: as_.into(),
        }
    }
}

impl TransformSpecTrait for FormulaTransformSpec {}
