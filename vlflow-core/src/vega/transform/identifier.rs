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

/// Field that holds the unique row identifier used by selections
pub const SELECTION_ID: &str = "_vgsid_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierTransformSpec {
    #[serde(rename = "as")]
    pub as_: String,
}

impl Default for IdentifierTransformSpec {
    fn default() -> Self {
        Self {
            as_: SELECTION_ID.to_string(),
        }
    }
}

impl TransformSpecTrait for IdentifierTransformSpec {}
