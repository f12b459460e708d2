/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::context::CompileContext;
use crate::dataflow::graph::DataflowGraph;
use crate::dataflow::node::{node_hash, DataflowNode, DataflowNodeTrait};
use crate::dataflow::output::{DataSourceType, OutputNode};
use crate::dataflow::parse::{AncestorParse, ParseNode};
use crate::spec::transform::LookupTransform;
use crate::vega::transform::lookup::LookupTransformSpec;
use crate::vega::transform::TransformSpec;
use serde::Serialize;
use serde_json::Value;
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::{Result, VlFlowError};

/// Joins fields of a secondary table onto each row by key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupNode {
    lookup: String,
    secondary: String,
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    values: Option<Vec<String>>,
    #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
    as_: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
}

impl LookupNode {
    /// Build the lookup and the secondary pipeline it reads from: a source root with its
    /// explicit parse, ending in a `lookup_<i>` output that this node holds a reference on
    pub fn make(
        transform: &LookupTransform,
        graph: &mut DataflowGraph,
        ctx: &mut CompileContext,
    ) -> Result<Self> {
        let mut head = ctx.source_root(graph, &transform.from.data)?;
        if let Some(parse) =
            ParseNode::make_explicit(&transform.from.data, &mut AncestorParse::new(), ctx)
        {
            head = graph.add(DataflowNode::Parse(parse), Some(head))?;
        }

        let name = ctx.next_lookup_name();
        let mut output = OutputNode::new(&name, DataSourceType::Lookup);
        output.request();
        let output_id = graph.add(DataflowNode::Output(output), Some(head))?;
        ctx.register_output(&name, output_id)?;

        let values = transform.from.fields.clone();
        let as_ = transform
            .as_
            .as_ref()
            .map(|as_| as_.to_vec())
            .or_else(|| values.clone());
        Ok(Self {
            lookup: transform.lookup.clone(),
            secondary: name,
            key: transform.from.key.clone(),
            values,
            as_,
            default: transform.default.clone(),
        })
    }

    /// Logical name of the secondary table
    pub fn secondary(&self) -> &str {
        &self.secondary
    }
}

impl DataflowNodeTrait for LookupNode {
    fn dependent_fields(&self) -> ColumnUsage {
        ColumnUsage::from(self.lookup.as_str())
    }

    fn produced_fields(&self) -> ColumnUsage {
        match self.as_.as_ref().or(self.values.as_ref()) {
            Some(fields) => ColumnUsage::from(fields.as_slice()),
            None => ColumnUsage::Unknown,
        }
    }

    fn hash(&self) -> Result<String> {
        node_hash("Lookup", self)
    }

    fn assemble(&self, ctx: &CompileContext) -> Result<Vec<TransformSpec>> {
        if !ctx.data_names.has(&self.secondary) {
            return Err(VlFlowError::internal(format!(
                "Lookup reads {} before it was emitted",
                self.secondary
            )));
        }
        Ok(vec![TransformSpec::Lookup(LookupTransformSpec {
            from: ctx.data_names.get(&self.secondary),
            key: self.key.clone(),
            fields: vec![self.lookup.clone()],
            values: self.values.clone(),
            as_: self.as_.clone(),
            default: self.default.clone(),
        })])
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::config::CompileConfig;
    use crate::compile::context::CompileContext;
    use crate::dataflow::graph::DataflowGraph;
    use crate::dataflow::lookup::LookupNode;
    use crate::dataflow::node::DataflowNodeTrait;
    use crate::spec::transform::TransformDirective;
    use serde_json::json;

    #[test]
    fn test_make_creates_secondary() {
        let mut graph = DataflowGraph::new();
        let mut ctx = CompileContext::new(CompileConfig::default());
        let TransformDirective::Lookup(transform) = serde_json::from_value(json!({
            "lookup": "person",
            "from": {"data": {"url": "people.csv"}, "key": "name", "fields": ["age"]}
        }))
        .unwrap() else {
            panic!("expected lookup")
        };
        let node = LookupNode::make(&transform, &mut graph, &mut ctx).unwrap();
        assert_eq!(node.secondary(), "lookup_0");
        assert_eq!(ctx.roots.len(), 1);
        let output = ctx.output("lookup_0").unwrap();
        assert!(graph.node(output).unwrap().as_output().unwrap().is_required());

        assert!(node.assemble(&ctx).is_err());
        ctx.data_names.rename("lookup_0", "source_0").unwrap();
        assert_eq!(
            serde_json::to_value(node.assemble(&ctx).unwrap()).unwrap(),
            json!([{
                "type": "lookup",
                "from": "source_0",
                "key": "name",
                "fields": ["person"],
                "values": ["age"],
                "as": ["age"]
            }])
        );
    }
}
