/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::context::CompileContext;
use crate::compile::model::prefixed_name;
use crate::dataflow::node::{node_hash, DataflowNodeTrait};
use crate::spec::bin::BinParams;
use crate::spec::encoding::{Channel, Encoding, FieldDef, FieldType};
use crate::spec::transform::BinTransform;
use crate::vega::transform::bin::{BinExtent, BinTransformSpec};
use crate::vega::transform::extent::ExtentTransformSpec;
use crate::vega::transform::formula::FormulaTransformSpec;
use crate::vega::transform::TransformSpec;
use crate::vega::values::SignalExpressionSpec;
use serde::Serialize;
use std::collections::BTreeMap;
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::Result;
use vlflow_common::escape::{datum_ref, unescape_field};

/// One binning of one field. A component may write its bins to several alias pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinComponent {
    params: BinParams,
    field: String,
    #[serde(rename = "as")]
    as_: Vec<[String; 2]>,
    signal: String,
    extent_signal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<String>,
}

impl BinComponent {
    fn new(model_name: &str, key: &str, params: BinParams, field: &str) -> Self {
        Self {
            params,
            field: field.to_string(),
            as_: Vec::new(),
            signal: prefixed_name(model_name, &format!("{key}_bins")),
            extent_signal: prefixed_name(model_name, &format!("{key}_extent")),
            mid: None,
            range: None,
        }
    }

    fn add_alias(&mut self, pair: [String; 2]) {
        if !self.as_.contains(&pair) {
            self.as_.push(pair);
        }
    }

    pub fn aliases(&self) -> &[[String; 2]] {
        &self.as_
    }

    pub fn signal(&self) -> &str {
        &self.signal
    }
}

/// Bins keyed by bin parameters and field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinNode {
    bins: BTreeMap<String, BinComponent>,
}

/// Whether a bin feeding this channel needs a human readable `start - end` label
fn requires_range(channel: Channel, field_def: &FieldDef) -> bool {
    matches!(
        channel,
        Channel::Color
            | Channel::Fill
            | Channel::Stroke
            | Channel::Shape
            | Channel::Row
            | Channel::Column
    ) || field_def.type_ == Some(FieldType::Ordinal)
}

impl BinNode {
    pub fn make_from_encoding(model_name: &str, encoding: &Encoding) -> Option<Self> {
        let mut bins: BTreeMap<String, BinComponent> = BTreeMap::new();
        for (channel, field_def) in encoding.field_defs() {
            let (Some(params), Some(field)) = (field_def.bin_params(), &field_def.field) else {
                continue;
            };
            let key = params.bin_key(field);
            let component = bins
                .entry(key.clone())
                .or_insert_with(|| BinComponent::new(model_name, &key, params.clone(), field));
            component.add_alias([
                field_def.field_ref_with_suffix(Some("start")),
                field_def.field_ref_with_suffix(Some("end")),
            ]);
            if matches!(channel, Channel::Size | Channel::Opacity) {
                component.mid = Some(field_def.field_ref_with_suffix(Some("mid")));
            }
            if requires_range(channel, field_def) {
                component.range = Some(field_def.field_ref_with_suffix(Some("range")));
            }
        }
        if bins.is_empty() {
            None
        } else {
            Some(Self { bins })
        }
    }

    pub fn make_from_transform(
        model_name: &str,
        transform: &BinTransform,
        default_maxbins: f64,
    ) -> Option<Self> {
        let params = transform.bin.to_params(None, default_maxbins)?;
        let key = params.bin_key(&transform.field);
        let mut component = BinComponent::new(model_name, &key, params, &transform.field);
        let (start, end) = transform.as_pair();
        component.add_alias([start, end]);
        Some(Self {
            bins: vec![(key, component)].into_iter().collect(),
        })
    }

    pub fn bins(&self) -> &BTreeMap<String, BinComponent> {
        &self.bins
    }

    /// Union the bins of both nodes. Bins present in both keep one runtime signal: the other
    /// node's signal names are renamed to ours.
    pub fn merge(&mut self, other: &BinNode, ctx: &mut CompileContext) -> Result<bool> {
        for (key, theirs) in &other.bins {
            match self.bins.get_mut(key) {
                Some(ours) => {
                    for pair in &theirs.as_ {
                        ours.add_alias(pair.clone());
                    }
                    ours.mid = ours.mid.take().or_else(|| theirs.mid.clone());
                    ours.range = ours.range.take().or_else(|| theirs.range.clone());
                    for (their_signal, our_signal) in [
                        (&theirs.signal, &ours.signal),
                        (&theirs.extent_signal, &ours.extent_signal),
                    ] {
                        if their_signal != our_signal {
                            ctx.signal_names.rename(their_signal, our_signal)?;
                        }
                    }
                }
                None => {
                    self.bins.insert(key.clone(), theirs.clone());
                }
            }
        }
        Ok(true)
    }
}

fn to_f64s(values: &Option<Vec<ordered_float::OrderedFloat<f64>>>) -> Option<Vec<f64>> {
    values.as_ref().map(|v| v.iter().map(|f| f.0).collect())
}

impl DataflowNodeTrait for BinNode {
    fn dependent_fields(&self) -> ColumnUsage {
        self.bins.values().map(|bin| bin.field.clone()).collect()
    }

    fn produced_fields(&self) -> ColumnUsage {
        self.bins
            .values()
            .flat_map(|bin| {
                bin.as_
                    .iter()
                    .flat_map(|pair| pair.iter().cloned())
                    .chain(bin.mid.iter().cloned())
                    .chain(bin.range.iter().cloned())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn hash(&self) -> Result<String> {
        node_hash("Bin", self)
    }

    fn assemble(&self, ctx: &CompileContext) -> Result<Vec<TransformSpec>> {
        let mut transforms = Vec::new();
        for bin in self.bins.values() {
            let Some((first, rest)) = bin.as_.split_first() else {
                continue;
            };
            let field = unescape_field(&bin.field);
            let extent = match &bin.params.extent {
                Some([lo, hi]) => BinExtent::Value([lo.0, hi.0]),
                None => {
                    let signal = ctx.signal_names.get(&bin.extent_signal);
                    transforms.push(TransformSpec::Extent(ExtentTransformSpec {
                        field: field.clone(),
                        signal: Some(signal.clone()),
                    }));
                    BinExtent::Signal(SignalExpressionSpec { signal })
                }
            };
            let params = &bin.params;
            transforms.push(TransformSpec::Bin(Box::new(BinTransformSpec {
                field,
                extent,
                signal: Some(ctx.signal_names.get(&bin.signal)),
                as_: [unescape_field(&first[0]), unescape_field(&first[1])],
                anchor: params.anchor.map(|v| v.0),
                maxbins: params.maxbins.map(|v| v.0),
                base: params.base.map(|v| v.0),
                step: params.step.map(|v| v.0),
                steps: to_f64s(&params.steps),
                minstep: params.minstep.map(|v| v.0),
                divide: to_f64s(&params.divide),
                nice: params.nice,
            })));
            for pair in rest {
                for (src, dst) in first.iter().zip(pair.iter()) {
                    transforms.push(TransformSpec::Formula(FormulaTransformSpec::new(
                        datum_ref(src),
                        unescape_field(dst),
                    )));
                }
            }
            let (start, end) = (datum_ref(&first[0]), datum_ref(&first[1]));
            if let Some(mid) = &bin.mid {
                transforms.push(TransformSpec::Formula(FormulaTransformSpec::new(
                    format!("({start} + {end}) / 2"),
                    unescape_field(mid),
                )));
            }
            if let Some(range) = &bin.range {
                transforms.push(TransformSpec::Formula(FormulaTransformSpec::new(
                    format!(
                        "isValid({start}) ? format({start}, \"\") + \" - \" + format({end}, \"\") : null"
                    ),
                    unescape_field(range),
                )));
            }
        }
        Ok(transforms)
    }
}
