/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::context::CompileContext;
use crate::dataflow::aggregate::AggregateNode;
use crate::dataflow::bin::BinNode;
use crate::dataflow::calculate::CalculateNode;
use crate::dataflow::facet::FacetNode;
use crate::dataflow::filter::FilterNode;
use crate::dataflow::filter_invalid::FilterInvalidNode;
use crate::dataflow::identifier::IdentifierNode;
use crate::dataflow::lookup::LookupNode;
use crate::dataflow::output::OutputNode;
use crate::dataflow::parse::ParseNode;
use crate::dataflow::sample::SampleNode;
use crate::dataflow::source::SourceNode;
use crate::dataflow::stack::StackNode;
use crate::dataflow::timeunit::TimeUnitNode;
use crate::vega::transform::TransformSpec;
use serde::Serialize;
use std::ops::Deref;
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::{Result, ResultWithContext};

/// One stage of a data pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum DataflowNode {
    Source(SourceNode),
    Parse(ParseNode),
    Filter(FilterNode),
    FilterInvalid(FilterInvalidNode),
    Bin(BinNode),
    TimeUnit(TimeUnitNode),
    Calculate(CalculateNode),
    Aggregate(AggregateNode),
    Stack(StackNode),
    Lookup(LookupNode),
    Sample(SampleNode),
    Identifier(IdentifierNode),
    Facet(FacetNode),
    Output(OutputNode),
}

impl Deref for DataflowNode {
    type Target = dyn DataflowNodeTrait;

    fn deref(&self) -> &Self::Target {
        match self {
            DataflowNode::Source(n) => n,
            DataflowNode::Parse(n) => n,
            DataflowNode::Filter(n) => n,
            DataflowNode::FilterInvalid(n) => n,
            DataflowNode::Bin(n) => n,
            DataflowNode::TimeUnit(n) => n,
            DataflowNode::Calculate(n) => n,
            DataflowNode::Aggregate(n) => n,
            DataflowNode::Stack(n) => n,
            DataflowNode::Lookup(n) => n,
            DataflowNode::Sample(n) => n,
            DataflowNode::Identifier(n) => n,
            DataflowNode::Facet(n) => n,
            DataflowNode::Output(n) => n,
        }
    }
}

pub trait DataflowNodeTrait {
    /// Fields the node reads from its input rows
    fn dependent_fields(&self) -> ColumnUsage {
        ColumnUsage::empty()
    }

    /// Fields the node adds to or overwrites in its output rows
    fn produced_fields(&self) -> ColumnUsage {
        ColumnUsage::empty()
    }

    /// Stable identity of the node's full parameter set. Equal hashes mean equal transforms.
    fn hash(&self) -> Result<String>;

    /// The node's contribution to the transform array of the data source it ends up in
    fn assemble(&self, _ctx: &CompileContext) -> Result<Vec<TransformSpec>> {
        Ok(Vec::new())
    }
}

/// Hash built from a kind prefix and the canonical JSON of the node's parameters. Parameters
/// keep unordered collections in sorted containers, so the JSON is canonical.
pub fn node_hash<T: Serialize>(kind: &str, params: &T) -> Result<String> {
    let params = serde_json::to_string(params)
        .with_context(|| format!("Failed to hash {kind} node parameters"))?;
    Ok(format!("{kind} {params}"))
}

impl DataflowNode {
    /// Fold `other` into this node. Returns false, leaving both untouched, when the two can't
    /// be combined without changing what either computes.
    pub fn merge(&mut self, other: &DataflowNode, ctx: &mut CompileContext) -> Result<bool> {
        use DataflowNode::*;
        match (self, other) {
            (Parse(this), Parse(other)) => Ok(this.merge(other)),
            (Bin(this), Bin(other)) => this.merge(other, ctx),
            (TimeUnit(this), TimeUnit(other)) => {
                this.merge(other);
                Ok(true)
            }
            (Aggregate(this), Aggregate(other)) => Ok(this.merge(other)),
            (FilterInvalid(this), FilterInvalid(other)) => Ok(this.merge(other)),
            (Source(_) | Output(_) | Facet(_), _) => Ok(false),
            (this, other) => Ok(this.hash()? == other.hash()?),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DataflowNode::Source(_) => "source",
            DataflowNode::Parse(_) => "parse",
            DataflowNode::Filter(_) => "filter",
            DataflowNode::FilterInvalid(_) => "filter_invalid",
            DataflowNode::Bin(_) => "bin",
            DataflowNode::TimeUnit(_) => "timeunit",
            DataflowNode::Calculate(_) => "calculate",
            DataflowNode::Aggregate(_) => "aggregate",
            DataflowNode::Stack(_) => "stack",
            DataflowNode::Lookup(_) => "lookup",
            DataflowNode::Sample(_) => "sample",
            DataflowNode::Identifier(_) => "identifier",
            DataflowNode::Facet(_) => "facet",
            DataflowNode::Output(_) => "output",
        }
    }

    pub fn as_output(&self) -> Option<&OutputNode> {
        match self {
            DataflowNode::Output(output) => Some(output),
            _ => None,
        }
    }

    pub fn as_output_mut(&mut self) -> Option<&mut OutputNode> {
        match self {
            DataflowNode::Output(output) => Some(output),
            _ => None,
        }
    }

    pub fn as_facet(&self) -> Option<&FacetNode> {
        match self {
            DataflowNode::Facet(facet) => Some(facet),
            _ => None,
        }
    }

    /// Grow the grouping of nodes that compute per-group results. Used when a facet split
    /// moves below them.
    pub fn add_dimensions(&mut self, fields: &[String]) {
        match self {
            DataflowNode::Aggregate(aggregate) => aggregate.add_dimensions(fields),
            DataflowNode::Stack(stack) => stack.add_dimensions(fields),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::config::CompileConfig;
    use crate::compile::context::CompileContext;
    use crate::dataflow::calculate::CalculateNode;
    use crate::dataflow::node::{node_hash, DataflowNode};
    use crate::dataflow::output::{DataSourceType, OutputNode};
    use crate::dataflow::source::SourceNode;
    use std::collections::BTreeMap;

    #[test]
    fn test_merge_with_clone_is_noop() {
        let mut ctx = CompileContext::new(CompileConfig::default());
        let mut node = DataflowNode::Calculate(CalculateNode::new("datum.b * 2", "b2"));
        let before = node.assemble(&ctx).unwrap();
        let copy = node.clone();
        assert!(node.merge(&copy, &mut ctx).unwrap());
        assert_eq!(node.assemble(&ctx).unwrap(), before);
    }

    #[test]
    fn test_anchors_never_merge() {
        let mut ctx = CompileContext::new(CompileConfig::default());
        let mut source = DataflowNode::Source(SourceNode::named("table"));
        let copy = source.clone();
        assert!(!source.merge(&copy, &mut ctx).unwrap());

        let mut output = DataflowNode::Output(OutputNode::new("main", DataSourceType::Main));
        let copy = output.clone();
        assert!(!output.merge(&copy, &mut ctx).unwrap());
    }

    #[test]
    fn test_different_kinds_never_merge() {
        let mut ctx = CompileContext::new(CompileConfig::default());
        let mut calc = DataflowNode::Calculate(CalculateNode::new("1", "one"));
        let source = DataflowNode::Source(SourceNode::named("table"));
        assert!(!calc.merge(&source, &mut ctx).unwrap());
    }

    #[test]
    fn test_unserializable_params_fail_to_hash() {
        // JSON object keys must be strings
        let params = BTreeMap::from([((1, 2), "pair")]);
        let err = node_hash("Calculate", &params).unwrap_err();
        assert!(err.to_string().contains("Failed to hash Calculate"));
        assert_eq!(node_hash("Sample", &5).unwrap(), "Sample 5");
    }
}
