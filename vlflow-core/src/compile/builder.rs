/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::context::CompileContext;
use crate::compile::model::{Model, ModelKind, NonPositiveFilter};
use crate::dataflow::aggregate::AggregateNode;
use crate::dataflow::bin::BinNode;
use crate::dataflow::calculate::CalculateNode;
use crate::dataflow::facet::FacetNode;
use crate::dataflow::filter::FilterNode;
use crate::dataflow::filter_invalid::FilterInvalidNode;
use crate::dataflow::graph::{DataflowGraph, NodeId};
use crate::dataflow::identifier::IdentifierNode;
use crate::dataflow::lookup::LookupNode;
use crate::dataflow::node::DataflowNode;
use crate::dataflow::output::{DataSourceType, OutputNode};
use crate::dataflow::parse::{AncestorParse, ParseNode};
use crate::dataflow::sample::SampleNode;
use crate::dataflow::stack::StackNode;
use crate::dataflow::timeunit::TimeUnitNode;
use crate::spec::transform::TransformDirective;
use vlflow_common::error::{Result, ResultWithContext, VlFlowError};

/// Builds the unoptimized dataflow of a model tree. Each model appends its nodes below the
/// head it inherits from its parent, or below its own source when it declares data.
pub struct DataflowBuilder<'a> {
    graph: &'a mut DataflowGraph,
    ctx: &'a mut CompileContext,
}

impl<'a> DataflowBuilder<'a> {
    pub fn new(graph: &'a mut DataflowGraph, ctx: &'a mut CompileContext) -> Self {
        Self { graph, ctx }
    }

    pub fn build(&mut self, model: &mut Model) -> Result<()> {
        self.build_model(model, None, &AncestorParse::new())
    }

    fn push(&mut self, head: &mut NodeId, node: DataflowNode) -> Result<()> {
        *head = self.graph.add(node, Some(*head))?;
        Ok(())
    }

    fn push_output(
        &mut self,
        head: &mut NodeId,
        name: &str,
        source_type: DataSourceType,
    ) -> Result<NodeId> {
        self.push(head, DataflowNode::Output(OutputNode::new(name, source_type)))?;
        self.ctx.register_output(name, *head)?;
        Ok(*head)
    }

    fn build_model(
        &mut self,
        model: &mut Model,
        parent_head: Option<NodeId>,
        ancestor: &AncestorParse,
    ) -> Result<()> {
        let mut ancestor = ancestor.clone();
        let mut head = match (&model.data, parent_head) {
            (Some(data), _) => {
                // A new source starts from unparsed values
                ancestor = AncestorParse::new();
                let mut head = self.ctx.source_root(self.graph, data)?;
                if let Some(parse) = ParseNode::make_explicit(data, &mut ancestor, self.ctx) {
                    self.push(&mut head, DataflowNode::Parse(parse))?;
                }
                head
            }
            (None, Some(head)) => head,
            // Grouping views without rows of their own. Every child has to bring its data.
            (None, None)
                if matches!(model.kind, ModelKind::Layer | ModelKind::Concat)
                    && model.transforms.is_empty()
                    && model.non_positive.is_none() =>
            {
                for child in model.children.iter_mut() {
                    self.build_model(child, None, &ancestor)?;
                }
                return Ok(());
            }
            (None, None) => {
                return Err(VlFlowError::specification(format!(
                    "Model {:?} has no data and no parent to inherit data from",
                    model.name
                )))
            }
        };

        for transform in &model.transforms {
            self.push_transform(&mut head, transform, &model.name, &mut ancestor)?;
        }

        match &model.kind {
            ModelKind::Unit {
                mark,
                encoding,
                filter,
                filter_invalid,
                selection,
            } => {
                if let Some(filter) = filter {
                    if let Some(parse) = ParseNode::make_implicit_from_predicate(filter, &mut ancestor) {
                        self.push(&mut head, DataflowNode::Parse(parse))?;
                    }
                    self.push(&mut head, DataflowNode::Filter(FilterNode::new(filter.clone())))?;
                }
                if let Some(parse) = ParseNode::make_implicit_from_encoding(encoding, &mut ancestor) {
                    self.push(&mut head, DataflowNode::Parse(parse))?;
                }
                if let Some(node) =
                    FilterInvalidNode::make(encoding, *filter_invalid, self.ctx.config.filter_invalid)
                {
                    self.push(&mut head, DataflowNode::FilterInvalid(node))?;
                }
                self.drain_non_positive(&mut head, &mut model.non_positive)?;
                if let Some(node) = BinNode::make_from_encoding(&model.name, encoding) {
                    self.push(&mut head, DataflowNode::Bin(node))?;
                }
                if let Some(node) = TimeUnitNode::make_from_encoding(encoding) {
                    self.push(&mut head, DataflowNode::TimeUnit(node))?;
                }
                model.raw = Some(self.push_output(&mut head, &model.get_name("raw"), DataSourceType::Raw)?);

                if let Some(node) = AggregateNode::make_from_encoding(encoding, *mark, self.ctx) {
                    self.push(&mut head, DataflowNode::Aggregate(node))?;
                }
                if *selection {
                    self.push(&mut head, DataflowNode::Identifier(IdentifierNode))?;
                }
                if let Some(node) = StackNode::make(encoding, *mark, &self.ctx.config) {
                    self.push(&mut head, DataflowNode::Stack(node))?;
                }
                model.main = Some(self.push_output(&mut head, &model.get_name("main"), DataSourceType::Main)?);
            }
            ModelKind::Facet { facet } => {
                self.drain_non_positive(&mut head, &mut model.non_positive)?;
                if let Some(parse) = ParseNode::make_implicit_from_encoding(facet, &mut ancestor) {
                    self.push(&mut head, DataflowNode::Parse(parse))?;
                }
                if let Some(node) = BinNode::make_from_encoding(&model.name, facet) {
                    self.push(&mut head, DataflowNode::Bin(node))?;
                }
                if let Some(node) = TimeUnitNode::make_from_encoding(facet) {
                    self.push(&mut head, DataflowNode::TimeUnit(node))?;
                }
                model.raw = Some(self.push_output(&mut head, &model.get_name("raw"), DataSourceType::Raw)?);
                let main = self.push_output(&mut head, &model.get_name("main"), DataSourceType::Main)?;
                model.main = Some(main);

                let fields = facet
                    .field_defs()
                    .into_iter()
                    .filter(|(_, fd)| fd.has_field())
                    .map(|(_, fd)| fd.field_ref())
                    .collect();
                let facet_node = FacetNode::new(&model.name, &model.get_name("facet"), fields, main);
                self.push(&mut head, DataflowNode::Facet(facet_node))?;
                self.graph
                    .node_mut(main)?
                    .as_output_mut()
                    .with_context(|| format!("Main output of {:?} is not an output", model.name))?
                    .request();
            }
            ModelKind::Layer | ModelKind::Concat => {
                self.drain_non_positive(&mut head, &mut model.non_positive)?;
                model.main = Some(self.push_output(&mut head, &model.get_name("main"), DataSourceType::Main)?);
            }
        }

        for child in model.children.iter_mut() {
            self.build_model(child, Some(head), &ancestor)?;
        }
        Ok(())
    }

    /// Place a pending non-positive filter, keeping rows positive for the fields that need it
    fn drain_non_positive(
        &mut self,
        head: &mut NodeId,
        pending: &mut Option<NonPositiveFilter>,
    ) -> Result<()> {
        let Some(filter) = pending.take() else {
            return Ok(());
        };
        let fields: Vec<String> = filter
            .into_iter()
            .filter_map(|(field, positive)| if positive { Some(field) } else { None })
            .collect();
        if let Some(node) = FilterNode::positive(&fields) {
            self.push(head, DataflowNode::Filter(node))?;
        }
        Ok(())
    }

    fn push_transform(
        &mut self,
        head: &mut NodeId,
        transform: &TransformDirective,
        model_name: &str,
        ancestor: &mut AncestorParse,
    ) -> Result<()> {
        let mut derived = Vec::new();
        let node = match transform {
            TransformDirective::Filter(filter) => {
                if let Some(parse) = ParseNode::make_implicit_from_predicate(&filter.filter, ancestor) {
                    self.push(head, DataflowNode::Parse(parse))?;
                }
                Some(DataflowNode::Filter(FilterNode::new(filter.filter.clone())))
            }
            TransformDirective::Calculate(calculate) => {
                derived.push(calculate.as_.clone());
                Some(DataflowNode::Calculate(CalculateNode::new(
                    &calculate.calculate,
                    &calculate.as_,
                )))
            }
            TransformDirective::LegacyCalculate(legacy) => {
                derived.push(legacy.field.clone());
                Some(DataflowNode::Calculate(CalculateNode::new(
                    &legacy.expr,
                    &legacy.field,
                )))
            }
            TransformDirective::Bin(bin) => {
                let (start, end) = bin.as_pair();
                derived.extend([start, end]);
                BinNode::make_from_transform(model_name, bin, self.ctx.config.default_maxbins)
                    .map(DataflowNode::Bin)
            }
            TransformDirective::TimeUnit(time_unit) => {
                derived.push(time_unit.as_.clone());
                TimeUnitNode::make_from_transform(time_unit, self.ctx).map(DataflowNode::TimeUnit)
            }
            TransformDirective::Aggregate(aggregate) => {
                derived.extend(aggregate.aggregate.iter().map(|def| def.as_.clone()));
                Some(DataflowNode::Aggregate(AggregateNode::make_from_transform(
                    aggregate,
                )))
            }
            TransformDirective::Lookup(lookup) => {
                let node = LookupNode::make(lookup, self.graph, self.ctx)?;
                if let Some(fields) = lookup.as_.as_ref().map(|as_| as_.to_vec()) {
                    derived.extend(fields);
                } else if let Some(fields) = &lookup.from.fields {
                    derived.extend(fields.iter().cloned());
                }
                Some(DataflowNode::Lookup(node))
            }
            TransformDirective::Sample(sample) => {
                Some(DataflowNode::Sample(SampleNode::new(sample.sample)))
            }
        };
        for field in derived {
            ancestor.insert(field, None);
        }
        if let Some(node) = node {
            self.push(head, node)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::builder::DataflowBuilder;
    use crate::compile::config::CompileConfig;
    use crate::compile::context::CompileContext;
    use crate::compile::model::Model;
    use crate::dataflow::graph::DataflowGraph;
    use crate::spec::chart::SpecNode;
    use serde_json::json;

    fn build(spec: serde_json::Value) -> (Model, DataflowGraph, CompileContext) {
        let spec: SpecNode = serde_json::from_value(spec).unwrap();
        let mut ctx = CompileContext::new(CompileConfig::default());
        let mut graph = DataflowGraph::new();
        let mut model = Model::try_new(&spec, &mut ctx).unwrap();
        DataflowBuilder::new(&mut graph, &mut ctx)
            .build(&mut model)
            .unwrap();
        (model, graph, ctx)
    }

    fn kinds(graph: &DataflowGraph, root: crate::dataflow::graph::NodeId) -> Vec<&'static str> {
        graph
            .subtree(root)
            .unwrap()
            .into_iter()
            .map(|id| graph.node(id).unwrap().kind())
            .collect()
    }

    #[test]
    fn test_unit_chain() {
        let (model, graph, ctx) = build(json!({
            "data": {"url": "data.csv"},
            "mark": "bar",
            "transform": [{"calculate": "2*datum.b", "as": "b2"}],
            "encoding": {
                "x": {"field": "a", "type": "nominal"},
                "y": {"field": "b2", "aggregate": "sum", "type": "quantitative", "scale": {"type": "log"}},
                "color": {"field": "c", "type": "nominal"}
            }
        }));
        assert_eq!(ctx.roots.len(), 1);
        assert_eq!(
            kinds(&graph, ctx.roots[0]),
            vec![
                "source", "calculate", "filter_invalid", "filter", "output", "aggregate", "stack",
                "output"
            ]
        );
        assert!(model.raw.is_some() && model.main.is_some());
        assert!(model.check_drained().is_ok());
    }

    #[test]
    fn test_layer_children_share_parent_head() {
        let (model, graph, ctx) = build(json!({
            "data": {"url": "data.csv"},
            "layer": [
                {"mark": "point", "encoding": {"x": {"field": "a", "type": "quantitative"}}},
                {"mark": "rule", "data": {"url": "other.csv"}, "encoding": {"x": {"field": "a", "type": "quantitative"}}}
            ]
        }));
        assert_eq!(ctx.roots.len(), 2);
        let layer_main = model.main.unwrap();
        assert_eq!(graph.children(layer_main).unwrap().len(), 1);
        assert_eq!(ctx.output("layer_1_main"), model.children[1].main);
    }

    #[test]
    fn test_concat_without_data_builds_each_child() {
        let (model, graph, ctx) = build(json!({
            "hconcat": [
                {"mark": "point", "data": {"url": "a.csv"}, "encoding": {"y": {"field": "b", "type": "quantitative", "scale": {"type": "log"}}}},
                {"mark": "rule", "data": {"url": "b.csv"}}
            ]
        }));
        assert_eq!(ctx.roots.len(), 2);
        assert!(model.main.is_none());
        assert!(model.children.iter().all(|c| c.main.is_some()));
        assert!(kinds(&graph, ctx.roots[0]).contains(&"filter"));
        assert!(model.check_drained().is_ok());
    }

    #[test]
    fn test_missing_data_is_an_error() {
        let spec: SpecNode = serde_json::from_value(json!({"mark": "point"})).unwrap();
        let mut ctx = CompileContext::new(CompileConfig::default());
        let mut graph = DataflowGraph::new();
        let mut model = Model::try_new(&spec, &mut ctx).unwrap();
        assert!(DataflowBuilder::new(&mut graph, &mut ctx)
            .build(&mut model)
            .is_err());
    }
}
