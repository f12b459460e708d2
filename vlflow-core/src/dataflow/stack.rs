/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::config::{CompileConfig, StackConfig};
use crate::compile::context::CompileContext;
use crate::dataflow::node::{node_hash, DataflowNodeTrait};
use crate::spec::encoding::{Channel, Encoding, FieldDef, FieldType, StackSpec};
use crate::spec::mark::Mark;
use crate::vega::transform::impute::{ImputeMethodSpec, ImputeTransformSpec};
use crate::vega::transform::stack::{StackOffsetSpec, StackTransformSpec};
use crate::vega::transform::TransformSpec;
use crate::vega::values::CompareSpec;
use serde::Serialize;
use serde_json::json;
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::Result;
use vlflow_common::escape::unescape_field;

/// Channels whose unaggregated fields split a stack into layers
const STACK_BY_CHANNELS: [Channel; 6] = [
    Channel::Color,
    Channel::Fill,
    Channel::Stroke,
    Channel::Opacity,
    Channel::Size,
    Channel::Detail,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackNode {
    /// Stacked value column
    field: String,
    /// Column of the position channel that is not stacked
    dimension: Option<String>,
    stackby: Vec<String>,
    sortby: Vec<String>,
    offset: StackOffsetSpec,
    impute: bool,
    facetby: Vec<String>,
    #[serde(rename = "as")]
    as_: [String; 2],
}

fn is_measure(field_def: &FieldDef) -> bool {
    field_def.aggregate.is_some()
        || (field_def.type_ == Some(FieldType::Quantitative) && !field_def.is_binned())
}

fn resolve_offset(field_def: &FieldDef, config: &CompileConfig) -> Option<StackOffsetSpec> {
    let configured = match config.stack {
        StackConfig::Zero => Some(StackOffsetSpec::Zero),
        StackConfig::Center => Some(StackOffsetSpec::Center),
        StackConfig::Normalize => Some(StackOffsetSpec::Normalize),
        StackConfig::None => None,
    };
    match &field_def.stack {
        None | Some(StackSpec::Bool(true)) => configured,
        Some(StackSpec::Bool(false)) => None,
        Some(StackSpec::Offset(offset)) => match offset.as_str() {
            "zero" => Some(StackOffsetSpec::Zero),
            "center" => Some(StackOffsetSpec::Center),
            "normalize" => Some(StackOffsetSpec::Normalize),
            _ => None,
        },
    }
}

impl StackNode {
    /// Stack for a bar or area mark with exactly one measure position channel and at least
    /// one unaggregated grouping channel
    pub fn make(encoding: &Encoding, mark: Mark, config: &CompileConfig) -> Option<Self> {
        if !mark.is_stackable() {
            return None;
        }
        let x = encoding.get(Channel::X).filter(|fd| !fd.is_empty());
        let y = encoding.get(Channel::Y).filter(|fd| !fd.is_empty());
        let (measure, dimension) = match (x, y) {
            (Some(x), y) if is_measure(x) && !y.map(is_measure).unwrap_or(false) => (x, y),
            (x, Some(y)) if is_measure(y) && !x.map(is_measure).unwrap_or(false) => (y, x),
            _ => return None,
        };

        let mut stackby = Vec::new();
        for channel in STACK_BY_CHANNELS {
            let Some(def) = encoding.0.get(&channel) else {
                continue;
            };
            for field_def in def.field_defs() {
                if field_def.has_field() && field_def.aggregate.is_none() {
                    let field = field_def.field_ref();
                    if !stackby.contains(&field) {
                        stackby.push(field);
                    }
                }
            }
        }
        if stackby.is_empty() {
            return None;
        }

        let offset = resolve_offset(measure, config)?;
        let sortby: Vec<String> = match encoding.0.get(&Channel::Order) {
            Some(order) => order
                .field_defs()
                .into_iter()
                .filter(|fd| fd.has_field() || fd.is_count())
                .map(|fd| {
                    let field = fd.field_ref();
                    if fd.is_descending() {
                        format!("-{field}")
                    } else {
                        field
                    }
                })
                .collect(),
            None => stackby.clone(),
        };

        let field = measure.field_ref();
        let dimension = dimension
            .filter(|fd| fd.has_field())
            .map(|fd| fd.field_ref());
        Some(Self {
            as_: [format!("{field}_start"), format!("{field}_end")],
            impute: mark == Mark::Area && dimension.is_some(),
            field,
            dimension,
            stackby,
            sortby,
            offset,
            facetby: Vec::new(),
        })
    }

    pub fn add_dimensions(&mut self, fields: &[String]) {
        for field in fields {
            if !self.facetby.contains(field) {
                self.facetby.push(field.clone());
            }
        }
    }

    fn groupby(&self) -> Vec<String> {
        self.dimension
            .iter()
            .chain(self.facetby.iter())
            .map(|f| unescape_field(f))
            .collect()
    }
}

impl DataflowNodeTrait for StackNode {
    fn dependent_fields(&self) -> ColumnUsage {
        let sort_fields = self
            .sortby
            .iter()
            .map(|f| f.strip_prefix('-').unwrap_or(f).to_string());
        self.dimension
            .iter()
            .chain(self.facetby.iter())
            .chain(self.stackby.iter())
            .chain(std::iter::once(&self.field))
            .cloned()
            .chain(sort_fields)
            .collect()
    }

    fn produced_fields(&self) -> ColumnUsage {
        ColumnUsage::from(self.as_.as_slice())
    }

    fn hash(&self) -> Result<String> {
        node_hash("Stack", self)
    }

    fn assemble(&self, _ctx: &CompileContext) -> Result<Vec<TransformSpec>> {
        let mut transforms = Vec::new();
        if let (true, Some(dimension)) = (self.impute, &self.dimension) {
            transforms.push(TransformSpec::Impute(ImputeTransformSpec {
                field: unescape_field(&self.field),
                key: unescape_field(dimension),
                groupby: self
                    .stackby
                    .iter()
                    .chain(self.facetby.iter())
                    .map(|f| unescape_field(f))
                    .collect(),
                method: ImputeMethodSpec::Value,
                value: json!(0),
            }));
        }
        transforms.push(TransformSpec::Stack(StackTransformSpec {
            groupby: self.groupby(),
            field: unescape_field(&self.field),
            sort: CompareSpec::from_signed_fields(
                &self.sortby.iter().map(|f| unescape_field(f)).collect::<Vec<_>>(),
            ),
            as_: [unescape_field(&self.as_[0]), unescape_field(&self.as_[1])],
            offset: self.offset,
        }));
        Ok(transforms)
    }
}
