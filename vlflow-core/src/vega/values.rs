/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrStringList {
    String(String),
    StringList(Vec<String>),
}

impl StringOrStringList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            StringOrStringList::String(v) => vec![v.clone()],
            StringOrStringList::StringList(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalExpressionSpec {
    pub signal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrderSpec {
    Ascending,
    Descending,
}

/// Sort criteria in the `{field, order}` form taken by sorting transforms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareSpec {
    pub field: Vec<String>,
    pub order: Vec<SortOrderSpec>,
}

impl CompareSpec {
    /// Build from field references prefixed with `-` when descending
    pub fn from_signed_fields<S: AsRef<str>>(fields: &[S]) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        let (field, order) = fields
            .iter()
            .map(|f| match f.as_ref().strip_prefix('-') {
                Some(field) => (field.to_string(), SortOrderSpec::Descending),
                None => (f.as_ref().to_string(), SortOrderSpec::Ascending),
            })
            .unzip();
        Some(Self { field, order })
    }
}
