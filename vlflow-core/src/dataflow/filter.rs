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
use crate::spec::predicate::Predicate;
use crate::vega::transform::filter::FilterTransformSpec;
use crate::vega::transform::TransformSpec;
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::Result;
use vlflow_common::escape::datum_ref;

#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    predicate: Predicate,
}

impl FilterNode {
    pub fn new(predicate: Predicate) -> Self {
        Self { predicate }
    }

    /// Filter keeping rows where every field is strictly positive, for log scales
    pub fn positive(fields: &[String]) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        let expr = fields
            .iter()
            .map(|field| format!("{} > 0", datum_ref(field)))
            .collect::<Vec<_>>()
            .join(" && ");
        Some(Self::new(Predicate::Expr(expr)))
    }
}

impl DataflowNodeTrait for FilterNode {
    fn dependent_fields(&self) -> ColumnUsage {
        self.predicate.fields().into_iter().collect()
    }

    fn hash(&self) -> Result<String> {
        node_hash("Filter", &self.predicate)
    }

    fn assemble(&self, _ctx: &CompileContext) -> Result<Vec<TransformSpec>> {
        Ok(vec![TransformSpec::Filter(FilterTransformSpec {
            expr: self.predicate.to_expr()?,
        })])
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::config::CompileConfig;
    use crate::compile::context::CompileContext;
    use crate::dataflow::filter::FilterNode;
    use crate::dataflow::node::DataflowNodeTrait;
    use serde_json::json;

    #[test]
    fn test_positive_filter() {
        let ctx = CompileContext::new(CompileConfig::default());
        let node = FilterNode::positive(&["x".to_string(), "y".to_string()]).unwrap();
        let transforms = node.assemble(&ctx).unwrap();
        assert_eq!(
            serde_json::to_value(&transforms).unwrap(),
            json!([{"type": "filter", "expr": "datum[\"x\"] > 0 && datum[\"y\"] > 0"}])
        );
        assert!(FilterNode::positive(&[]).is_none());
    }
}
