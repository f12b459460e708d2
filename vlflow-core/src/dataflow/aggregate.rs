/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::config::TimeUnitOutput;
use crate::compile::context::CompileContext;
use crate::dataflow::node::{node_hash, DataflowNodeTrait};
use crate::spec::aggregate::{AggregateOp, AggregateSpec};
use crate::spec::encoding::{Channel, Encoding, FieldDef, FieldType};
use crate::spec::mark::Mark;
use crate::spec::transform::AggregateTransform;
use crate::vega::transform::aggregate::AggregateTransformSpec;
use crate::vega::transform::TransformSpec;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::Result;
use vlflow_common::escape::unescape_field;

/// Field name standing in for "the whole row" in counts
const COUNT_FIELD: &str = "*";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Measure {
    aliases: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    param: Option<OrderedFloat<f64>>,
}

type Measures = BTreeMap<String, BTreeMap<AggregateOp, Measure>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateNode {
    dimensions: BTreeSet<String>,
    measures: Measures,
}

fn add_measure(
    measures: &mut Measures,
    field: &str,
    op: AggregateOp,
    alias: String,
    param: Option<f64>,
) {
    let measure = measures
        .entry(field.to_string())
        .or_default()
        .entry(op)
        .or_default();
    measure.aliases.insert(alias);
    if let Some(param) = param {
        measure.param = Some(OrderedFloat(param));
    }
}

/// Group-by columns contributed by an unaggregated field definition
fn add_dimension(
    dimensions: &mut BTreeSet<String>,
    channel: Channel,
    field_def: &FieldDef,
    mark: Mark,
    ctx: &CompileContext,
) {
    if field_def.is_binned() {
        dimensions.insert(field_def.field_ref_with_suffix(Some("start")));
        dimensions.insert(field_def.field_ref_with_suffix(Some("end")));
        if matches!(channel, Channel::Size | Channel::Opacity) {
            dimensions.insert(field_def.field_ref_with_suffix(Some("mid")));
        }
        if matches!(
            channel,
            Channel::Color
                | Channel::Fill
                | Channel::Stroke
                | Channel::Shape
                | Channel::Row
                | Channel::Column
        ) || field_def.type_ == Some(FieldType::Ordinal)
        {
            dimensions.insert(field_def.field_ref_with_suffix(Some("range")));
        }
        return;
    }

    dimensions.insert(field_def.field_ref());
    let banded = field_def.time_unit().is_some()
        && matches!(channel, Channel::X | Channel::Y)
        && matches!(mark, Mark::Bar | Mark::Rect);
    if banded && ctx.config.time_unit_output == TimeUnitOutput::Transform {
        dimensions.insert(field_def.field_ref_with_suffix(Some("end")));
        let band_position = field_def.band_position.unwrap_or(0.5);
        if mark == Mark::Rect && band_position != 0.5 {
            dimensions.insert(field_def.field_ref_with_suffix(Some("offsetted_rect_start")));
            dimensions.insert(field_def.field_ref_with_suffix(Some("offsetted_rect_end")));
        }
    }
}

impl AggregateNode {
    /// Aggregate implied by an encoding. None when no channel is aggregated.
    pub fn make_from_encoding(encoding: &Encoding, mark: Mark, ctx: &CompileContext) -> Option<Self> {
        if !encoding.is_aggregate() {
            return None;
        }
        let mut dimensions = BTreeSet::new();
        let mut measures = Measures::new();

        for (channel, field_def) in encoding.field_defs() {
            let Some(aggregate) = &field_def.aggregate else {
                if field_def.has_field() {
                    add_dimension(&mut dimensions, channel, field_def, mark, ctx);
                }
                continue;
            };
            let alias = field_def.field_ref();
            match aggregate {
                _ if aggregate.is_count() => {
                    add_measure(&mut measures, COUNT_FIELD, AggregateOp::Count, alias, None)
                }
                AggregateSpec::ArgMin { argmin: arg } | AggregateSpec::ArgMax { argmax: arg } => {
                    add_measure(&mut measures, arg, aggregate.op(), alias, None)
                }
                AggregateSpec::Exponential { exponential } => {
                    let Some(field) = &field_def.field else {
                        continue;
                    };
                    add_measure(&mut measures, field, aggregate.op(), alias, Some(*exponential))
                }
                AggregateSpec::Op(op) => {
                    let Some(field) = &field_def.field else {
                        continue;
                    };
                    add_measure(&mut measures, field, *op, alias, None);
                }
            }
            if field_def.is_unaggregated_domain() {
                if let Some(field) = &field_def.field {
                    for op in [AggregateOp::Min, AggregateOp::Max] {
                        add_measure(&mut measures, field, op, format!("{}_{field}", op.name()), None);
                    }
                }
            }
        }

        if dimensions.is_empty() && measures.is_empty() {
            return None;
        }
        Some(Self {
            dimensions,
            measures,
        })
    }

    pub fn make_from_transform(transform: &AggregateTransform) -> Self {
        let mut measures = Measures::new();
        for def in &transform.aggregate {
            let field = match (def.op, &def.field) {
                (AggregateOp::Count, None) => COUNT_FIELD,
                (_, Some(field)) => field.as_str(),
                (_, None) => COUNT_FIELD,
            };
            let param = def.param.filter(|_| def.op.takes_param());
            add_measure(&mut measures, field, def.op, def.as_.clone(), param);
        }
        Self {
            dimensions: transform.groupby.iter().cloned().collect(),
            measures,
        }
    }

    pub fn dimensions(&self) -> &BTreeSet<String> {
        &self.dimensions
    }

    pub fn add_dimensions(&mut self, fields: &[String]) {
        self.dimensions.extend(fields.iter().cloned());
    }

    /// Union the measures of an aggregate with the same group-by columns
    pub fn merge(&mut self, other: &AggregateNode) -> bool {
        if self.dimensions != other.dimensions {
            return false;
        }
        for (field, ops) in &other.measures {
            for (op, measure) in ops {
                let ours = self
                    .measures
                    .entry(field.clone())
                    .or_default()
                    .entry(*op)
                    .or_default();
                ours.aliases.extend(measure.aliases.iter().cloned());
                if measure.param.is_some() {
                    ours.param = measure.param;
                }
            }
        }
        true
    }
}

impl DataflowNodeTrait for AggregateNode {
    fn dependent_fields(&self) -> ColumnUsage {
        self.dimensions
            .iter()
            .cloned()
            .chain(
                self.measures
                    .keys()
                    .filter(|field| field.as_str() != COUNT_FIELD)
                    .cloned(),
            )
            .collect()
    }

    fn produced_fields(&self) -> ColumnUsage {
        self.measures
            .values()
            .flat_map(|ops| ops.values())
            .flat_map(|measure| measure.aliases.iter().cloned())
            .collect()
    }

    fn hash(&self) -> Result<String> {
        node_hash("Aggregate", self)
    }

    fn assemble(&self, _ctx: &CompileContext) -> Result<Vec<TransformSpec>> {
        let mut ops = Vec::new();
        let mut fields = Vec::new();
        let mut as_ = Vec::new();
        let mut params = Vec::new();
        for (field, field_ops) in &self.measures {
            for (op, measure) in field_ops {
                for alias in &measure.aliases {
                    ops.push(*op);
                    fields.push(if field == COUNT_FIELD {
                        None
                    } else {
                        Some(unescape_field(field))
                    });
                    as_.push(unescape_field(alias));
                    params.push(measure.param.map(|p| p.0));
                }
            }
        }
        let aggregate_params = if params.iter().any(|p| p.is_some()) {
            Some(params)
        } else {
            None
        };
        Ok(vec![TransformSpec::Aggregate(AggregateTransformSpec {
            groupby: self.dimensions.iter().map(|d| unescape_field(d)).collect(),
            ops,
            fields,
            as_,
            aggregate_params,
        })])
    }
}
