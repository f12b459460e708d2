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
use crate::spec::encoding::Encoding;
use crate::vega::transform::filter::FilterTransformSpec;
use crate::vega::transform::TransformSpec;
use serde::Serialize;
use std::collections::BTreeMap;
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::Result;
use vlflow_common::escape::datum_ref;

/// Drops rows whose value is null or NaN for the flagged fields. Unflagged fields are kept in
/// the map so that merging with a node that flags them is refused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterInvalidNode {
    filter: BTreeMap<String, bool>,
}

impl FilterInvalidNode {
    pub fn new(filter: BTreeMap<String, bool>) -> Self {
        Self { filter }
    }

    /// Decide per encoded field whether invalid values are dropped. `explicit` overrides the
    /// default, which filters continuous fields when `default_filter` is set.
    pub fn make(encoding: &Encoding, explicit: Option<bool>, default_filter: bool) -> Option<Self> {
        let mut filter = BTreeMap::new();
        for (_, field_def) in encoding.field_defs() {
            if !field_def.has_field() {
                continue;
            }
            let Some(field) = &field_def.field else {
                continue;
            };
            let flagged = explicit.unwrap_or(default_filter && field_def.is_continuous());
            filter.entry(field.clone()).or_insert(flagged);
        }
        if filter.is_empty() {
            None
        } else {
            Some(Self { filter })
        }
    }

    pub fn filter(&self) -> &BTreeMap<String, bool> {
        &self.filter
    }

    fn flagged(&self) -> impl Iterator<Item = &String> {
        self.filter
            .iter()
            .filter_map(|(field, flagged)| if *flagged { Some(field) } else { None })
    }

    pub fn merge(&mut self, other: &FilterInvalidNode) -> bool {
        let conflict = other.filter.iter().any(|(field, flagged)| {
            matches!(self.filter.get(field), Some(existing) if existing != flagged)
        });
        if conflict {
            return false;
        }
        self.filter
            .extend(other.filter.iter().map(|(k, v)| (k.clone(), *v)));
        true
    }
}

impl DataflowNodeTrait for FilterInvalidNode {
    fn dependent_fields(&self) -> ColumnUsage {
        self.flagged().cloned().collect()
    }

    fn hash(&self) -> Result<String> {
        node_hash("FilterInvalid", self)
    }

    fn assemble(&self, _ctx: &CompileContext) -> Result<Vec<TransformSpec>> {
        let expr = self
            .flagged()
            .map(|field| {
                let datum = datum_ref(field);
                format!("{datum} !== null && !isNaN({datum})")
            })
            .collect::<Vec<_>>()
            .join(" && ");
        if expr.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![TransformSpec::Filter(FilterTransformSpec { expr })])
    }
}
