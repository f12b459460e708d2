/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::context::{CompileContext, DiagnosticKind};
use crate::dataflow::graph::{DataflowGraph, NodeId};
use crate::dataflow::output::DataSourceType;
use crate::spec::bin::BinSpec;
use crate::spec::chart::SpecNode;
use crate::spec::data::DataDef;
use crate::spec::encoding::{Channel, ChannelDef, Encoding, FieldDef, FieldType};
use crate::spec::mark::Mark;
use crate::spec::predicate::Predicate;
use crate::spec::timeunit::TimeUnit;
use crate::spec::transform::{CalculateTransform, TransformDirective};
use std::collections::BTreeMap;
use std::str::FromStr;
use vlflow_common::error::{Result, ResultWithContext, VlFlowError};

/// `name` scoped to a model: `<model>_<name>`, or `name` for the unnamed root model
pub fn prefixed_name(model_name: &str, name: &str) -> String {
    if model_name.is_empty() {
        name.to_string()
    } else {
        format!("{model_name}_{name}")
    }
}

/// Fields that must be strictly positive before scaling (log scales), keyed by field. A
/// field mapped to false is used on a continuous positional scale that does not need the
/// filter, which blocks merging with a sibling that does.
pub type NonPositiveFilter = BTreeMap<String, bool>;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelKind {
    Unit {
        mark: Mark,
        encoding: Encoding,
        filter: Option<Predicate>,
        filter_invalid: Option<bool>,
        selection: bool,
    },
    Facet {
        facet: Encoding,
    },
    Layer,
    Concat,
}

/// A node of the view tree, normalized and named, together with the output nodes its
/// dataflow ends in
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub kind: ModelKind,
    pub data: Option<DataDef>,
    pub transforms: Vec<TransformDirective>,
    pub children: Vec<Model>,

    /// Pending non-positive filter, drained into the dataflow by the builder
    pub non_positive: Option<NonPositiveFilter>,

    pub raw: Option<NodeId>,
    pub main: Option<NodeId>,
}

impl Model {
    pub fn try_new(spec: &SpecNode, ctx: &mut CompileContext) -> Result<Self> {
        let name = spec.name().cloned().unwrap_or_default();
        Self::try_new_named(spec, name, ctx)
    }

    fn try_new_named(spec: &SpecNode, name: String, ctx: &mut CompileContext) -> Result<Self> {
        let transforms = normalize_transforms(spec.transforms(), ctx);
        let data = spec.data().cloned();
        let child_name = |given: Option<&String>, default: String| {
            given.cloned().unwrap_or_else(|| prefixed_name(&name, &default))
        };

        let mut model = match spec {
            SpecNode::Unit(unit) => {
                let mark = unit.mark.mark();
                let (facet, encoding) =
                    split_facet_channels(normalize_encoding(&unit.encoding, Some(mark), ctx));
                let unit_kind = ModelKind::Unit {
                    mark,
                    encoding,
                    filter: unit.filter.clone(),
                    filter_invalid: unit.filter_invalid,
                    selection: unit.selection.is_some(),
                };
                if facet.0.is_empty() {
                    Self::new(name, unit_kind, data, transforms, Vec::new())
                } else {
                    // Row and column channels on a unit facet it, the unit becomes the child
                    let mut child = Self::new(
                        prefixed_name(&name, "child"),
                        unit_kind,
                        None,
                        Vec::new(),
                        Vec::new(),
                    );
                    child.collect_non_positive();
                    Self::new(name, ModelKind::Facet { facet }, data, transforms, vec![child])
                }
            }
            SpecNode::Facet(facet) => {
                let child = Self::try_new_named(
                    &facet.spec,
                    child_name(facet.spec.name(), "child".to_string()),
                    ctx,
                )?;
                let facet = normalize_encoding(&facet.facet, None, ctx);
                Self::new(name, ModelKind::Facet { facet }, data, transforms, vec![child])
            }
            SpecNode::Layer(layer) => {
                let children = layer
                    .layer
                    .iter()
                    .enumerate()
                    .map(|(i, child)| {
                        Self::try_new_named(child, child_name(child.name(), format!("layer_{i}")), ctx)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Self::new(name, ModelKind::Layer, data, transforms, children)
            }
            SpecNode::Concat(concat) => {
                let children = concat
                    .concat
                    .iter()
                    .enumerate()
                    .map(|(i, child)| {
                        Self::try_new_named(child, child_name(child.name(), format!("concat_{i}")), ctx)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Self::new(name, ModelKind::Concat, data, transforms, children)
            }
        };
        model.collect_non_positive();
        Ok(model)
    }

    fn new(
        name: String,
        kind: ModelKind,
        data: Option<DataDef>,
        transforms: Vec<TransformDirective>,
        children: Vec<Model>,
    ) -> Self {
        Self {
            name,
            kind,
            data,
            transforms,
            children,
            non_positive: None,
            raw: None,
            main: None,
        }
    }

    /// `name` scoped to this model
    pub fn get_name(&self, name: &str) -> String {
        prefixed_name(&self.name, name)
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.kind, ModelKind::Unit { .. })
    }

    /// Collect the non-positive filter of a unit from its encoding, or pull the children's
    /// filters up into a layer or facet when they don't conflict
    fn collect_non_positive(&mut self) {
        match &self.kind {
            ModelKind::Unit { encoding, .. } => {
                let mut filter = NonPositiveFilter::new();
                for (channel, field_def) in encoding.field_defs() {
                    let Some(field) = &field_def.field else {
                        continue;
                    };
                    if !field_def.has_field() {
                        continue;
                    }
                    if field_def.has_log_scale() {
                        filter.insert(field.clone(), true);
                    } else if channel.is_position() && field_def.is_continuous() {
                        filter.entry(field.clone()).or_insert(false);
                    }
                }
                if !filter.is_empty() {
                    self.non_positive = Some(filter);
                }
            }
            // Children with data of their own start from a different source
            ModelKind::Layer | ModelKind::Facet { .. }
                if self.children.iter().any(|child| child.data.is_some()) => {}
            ModelKind::Layer | ModelKind::Facet { .. } => {
                let mut merged = NonPositiveFilter::new();
                for child in &self.children {
                    for (field, positive) in child.non_positive.iter().flatten() {
                        if matches!(merged.get(field), Some(existing) if existing != positive) {
                            return;
                        }
                        merged.insert(field.clone(), *positive);
                    }
                }
                for child in self.children.iter_mut() {
                    child.non_positive = None;
                }
                if !merged.is_empty() {
                    self.non_positive = Some(merged);
                }
            }
            ModelKind::Concat => {}
        }
    }

    /// Fail if any model still holds a non-positive filter the builder never placed
    pub fn check_drained(&self) -> Result<()> {
        if self.non_positive.is_some() {
            return Err(VlFlowError::internal(format!(
                "Invalid state: non-positive filter of model {:?} was never placed in the dataflow",
                self.name
            )));
        }
        self.children.iter().try_for_each(|child| child.check_drained())
    }

    /// Register a consumer of one of this model's tables and return the logical name to bind
    /// to. Resolve it to the emitted table name through the plan's `data_names`.
    pub fn request_data_source(
        &self,
        graph: &mut DataflowGraph,
        kind: DataSourceType,
    ) -> Result<String> {
        let id = match kind {
            DataSourceType::Raw => self.raw,
            DataSourceType::Main => self.main,
            _ => None,
        }
        .ok_or_else(|| {
            VlFlowError::compilation(format!(
                "Model {:?} has no {kind:?} data source",
                self.name
            ))
        })?;
        let output = graph
            .node_mut(id)?
            .as_output_mut()
            .with_context(|| format!("Node {id} is not an output"))?;
        Ok(output.request().to_string())
    }

    /// This model followed by all of its descendants, parents first
    pub fn descendants(&self) -> Vec<&Model> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.descendants());
        }
        out
    }

    pub fn find(&self, name: &str) -> Option<&Model> {
        self.descendants().into_iter().find(|m| m.name == name)
    }
}

/// Replace deprecated transform forms with their current equivalent
fn normalize_transforms(
    transforms: &[TransformDirective],
    ctx: &mut CompileContext,
) -> Vec<TransformDirective> {
    transforms
        .iter()
        .map(|transform| match transform {
            TransformDirective::LegacyCalculate(legacy) => {
                ctx.warn(
                    DiagnosticKind::DeprecatedTransform,
                    format!(
                        "{{field, expr}} calculate for {} is deprecated, use {{calculate, as}}",
                        legacy.field
                    ),
                );
                TransformDirective::Calculate(CalculateTransform {
                    calculate: legacy.expr.clone(),
                    as_: legacy.field.clone(),
                })
            }
            other => other.clone(),
        })
        .collect()
}

fn default_type(field_def: &FieldDef) -> FieldType {
    if field_def.is_count() || field_def.bin.is_some() {
        FieldType::Quantitative
    } else if field_def.time_unit.is_some() {
        FieldType::Temporal
    } else {
        FieldType::Nominal
    }
}

/// Check a field definition and fill in defaults. Returns None when it must be dropped.
fn normalize_field_def(
    channel: Channel,
    field_def: &FieldDef,
    ctx: &mut CompileContext,
) -> Option<FieldDef> {
    if field_def.is_empty() {
        ctx.warn(
            DiagnosticKind::EmptyFieldDef,
            format!("Dropping {} channel with an empty field definition", channel.name()),
        );
        return None;
    }
    let mut field_def = field_def.clone();
    if let Some(time_unit) = &field_def.time_unit {
        if let Err(err) = TimeUnit::from_str(time_unit) {
            ctx.warn(DiagnosticKind::InvalidTimeUnit, err.to_string());
            field_def.time_unit = None;
        } else if field_def.type_ == Some(FieldType::Quantitative) {
            ctx.warn(
                DiagnosticKind::IncompatibleFieldType,
                format!(
                    "Ignoring timeUnit {time_unit} on quantitative field {:?} of {} channel",
                    field_def.field.as_deref().unwrap_or_default(),
                    channel.name()
                ),
            );
            field_def.time_unit = None;
        }
    }
    if let Some(bin) = &field_def.bin {
        field_def.bin = bin
            .to_params(Some(channel), ctx.config.default_maxbins)
            .map(BinSpec::Params);
    }
    if (field_def.type_.is_none() && field_def.has_field()) || field_def.is_count() {
        field_def.type_.get_or_insert(default_type(&field_def));
    }
    Some(field_def)
}

/// Drop channels the mark can't render and field definitions that name no data, and
/// resolve shorthands
fn normalize_encoding(encoding: &Encoding, mark: Option<Mark>, ctx: &mut CompileContext) -> Encoding {
    let mut normalized = Encoding::default();
    for (channel, def) in &encoding.0 {
        if let Some(mark) = mark {
            if !mark.supports_channel(*channel) {
                ctx.warn(
                    DiagnosticKind::UnsupportedChannel,
                    format!(
                        "Dropping {} channel, it is not supported by {} marks",
                        channel.name(),
                        mark.name()
                    ),
                );
                continue;
            }
        }
        let def = match def {
            ChannelDef::Field(field_def) => {
                normalize_field_def(*channel, field_def, ctx).map(ChannelDef::Field)
            }
            ChannelDef::Fields(field_defs) => {
                let field_defs: Vec<_> = field_defs
                    .iter()
                    .filter_map(|fd| normalize_field_def(*channel, fd, ctx))
                    .collect();
                if field_defs.is_empty() {
                    None
                } else {
                    Some(ChannelDef::Fields(field_defs))
                }
            }
        };
        if let Some(def) = def {
            normalized.0.insert(*channel, def);
        }
    }
    normalized
}

/// Split an encoding into its row/column channels and the rest
fn split_facet_channels(encoding: Encoding) -> (Encoding, Encoding) {
    let (facet, rest) = encoding
        .0
        .into_iter()
        .partition(|(channel, _)| channel.is_facet());
    (Encoding(facet), Encoding(rest))
}

#[cfg(test)]
mod tests {
    use crate::compile::config::CompileConfig;
    use crate::compile::context::{CompileContext, DiagnosticKind};
    use crate::compile::model::{Model, ModelKind};
    use crate::spec::chart::SpecNode;
    use crate::spec::encoding::{Channel, FieldType};
    use crate::spec::transform::TransformDirective;
    use serde_json::json;

    fn model(spec: serde_json::Value) -> (Model, CompileContext) {
        let spec: SpecNode = serde_json::from_value(spec).unwrap();
        let mut ctx = CompileContext::new(CompileConfig::default());
        let model = Model::try_new(&spec, &mut ctx).unwrap();
        (model, ctx)
    }

    #[test]
    fn test_names() {
        let (model, _) = model(json!({
            "data": {"url": "data.csv"},
            "vconcat": [
                {"layer": [{"mark": "point"}, {"mark": "rule", "name": "rules"}]},
                {"facet": {"row": {"field": "r"}}, "spec": {"mark": "bar"}}
            ]
        }));
        let names: Vec<_> = model.descendants().iter().map(|m| m.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                "",
                "concat_0",
                "concat_0_layer_0",
                "rules",
                "concat_1",
                "concat_1_child"
            ]
        );
        assert_eq!(model.children[0].get_name("main"), "concat_0_main");
        assert_eq!(model.get_name("main"), "main");
    }

    #[test]
    fn test_normalize_encoding() {
        let (model, ctx) = model(json!({
            "mark": "line",
            "encoding": {
                "x": {"field": "a", "timeUnit": "yearmonth"},
                "y": {"field": "b", "type": "quantitative", "bin": true},
                "shape": {"field": "c", "type": "nominal"},
                "color": {"type": "nominal"},
                "detail": [{"field": "d", "timeUnit": "fortnight"}]
            },
            "transform": [{"field": "b2", "expr": "datum.b * 2"}]
        }));
        let ModelKind::Unit { encoding, .. } = &model.kind else {
            panic!("expected unit")
        };
        assert!(!encoding.contains(Channel::Shape));
        assert!(!encoding.contains(Channel::Color));
        assert_eq!(encoding.get(Channel::X).unwrap().type_, Some(FieldType::Temporal));
        assert!(encoding.get(Channel::Y).unwrap().is_binned());
        assert_eq!(encoding.get(Channel::Detail).unwrap().time_unit, None);
        assert!(matches!(model.transforms[0], TransformDirective::Calculate(_)));

        let kinds: Vec<_> = ctx.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::DeprecatedTransform,
                DiagnosticKind::EmptyFieldDef,
                DiagnosticKind::UnsupportedChannel,
                DiagnosticKind::InvalidTimeUnit
            ]
        );
    }

    #[test]
    fn test_unit_with_row_becomes_facet() {
        let (model, _) = model(json!({
            "data": {"url": "data.csv"},
            "mark": "bar",
            "encoding": {
                "row": {"field": "r", "type": "nominal"},
                "x": {"field": "a", "type": "nominal"}
            }
        }));
        let ModelKind::Facet { facet } = &model.kind else {
            panic!("expected facet")
        };
        assert!(facet.contains(Channel::Row));
        assert!(model.data.is_some());
        assert_eq!(model.children[0].name, "child");
        assert!(model.children[0].data.is_none());
    }

    #[test]
    fn test_non_positive_merges_into_layer() {
        let (agree, _) = model(json!({"layer": [
            {"mark": "point", "encoding": {"y": {"field": "b", "type": "quantitative", "scale": {"type": "log"}}}},
            {"mark": "rule", "encoding": {"y": {"field": "b", "type": "quantitative", "scale": {"type": "log"}}}}
        ]}));
        assert_eq!(
            agree.non_positive.as_ref().and_then(|f| f.get("b")),
            Some(&true)
        );
        assert!(agree.children.iter().all(|c| c.non_positive.is_none()));

        let (conflict, _) = model(json!({"layer": [
            {"mark": "point", "encoding": {"y": {"field": "b", "type": "quantitative", "scale": {"type": "log"}}}},
            {"mark": "rule", "encoding": {"y": {"field": "b", "type": "quantitative"}}}
        ]}));
        assert!(conflict.non_positive.is_none());
        assert!(conflict.children.iter().all(|c| c.non_positive.is_some()));
        assert!(conflict.check_drained().is_err());

        let (own_data, _) = model(json!({"layer": [
            {"mark": "point", "data": {"url": "a.csv"}, "encoding": {"y": {"field": "b", "type": "quantitative", "scale": {"type": "log"}}}},
            {"mark": "rule", "data": {"url": "b.csv"}, "encoding": {"y": {"field": "b", "type": "quantitative", "scale": {"type": "log"}}}}
        ]}));
        assert!(own_data.non_positive.is_none());
        assert!(own_data.children.iter().all(|c| c.non_positive.is_some()));
    }
}
