/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::spec::data::DataDef;
use crate::spec::encoding::Encoding;
use crate::spec::mark::MarkSpec;
use crate::spec::predicate::Predicate;
use crate::spec::transform::TransformDirective;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use vlflow_common::error::Result;

/// A node of the view tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecNode {
    Facet(FacetSpec),
    Layer(LayerSpec),
    Concat(ConcatSpec),
    Unit(UnitSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<TransformDirective>,

    pub mark: MarkSpec,

    #[serde(default)]
    pub encoding: Encoding,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Predicate>,

    #[serde(rename = "filterInvalid", skip_serializing_if = "Option::is_none")]
    pub filter_invalid: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<Value>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<TransformDirective>,

    /// Row and column field definitions
    pub facet: Encoding,

    pub spec: Box<SpecNode>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<TransformDirective>,

    pub layer: Vec<SpecNode>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcatSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<TransformDirective>,

    #[serde(alias = "hconcat", alias = "vconcat")]
    pub concat: Vec<SpecNode>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl SpecNode {
    pub fn name(&self) -> Option<&String> {
        match self {
            SpecNode::Facet(spec) => spec.name.as_ref(),
            SpecNode::Layer(spec) => spec.name.as_ref(),
            SpecNode::Concat(spec) => spec.name.as_ref(),
            SpecNode::Unit(spec) => spec.name.as_ref(),
        }
    }

    pub fn data(&self) -> Option<&DataDef> {
        match self {
            SpecNode::Facet(spec) => spec.data.as_ref(),
            SpecNode::Layer(spec) => spec.data.as_ref(),
            SpecNode::Concat(spec) => spec.data.as_ref(),
            SpecNode::Unit(spec) => spec.data.as_ref(),
        }
    }

    pub fn transforms(&self) -> &[TransformDirective] {
        match self {
            SpecNode::Facet(spec) => &spec.transform,
            SpecNode::Layer(spec) => &spec.transform,
            SpecNode::Concat(spec) => &spec.transform,
            SpecNode::Unit(spec) => &spec.transform,
        }
    }

    pub fn children(&self) -> Vec<&SpecNode> {
        match self {
            SpecNode::Facet(spec) => vec![spec.spec.as_ref()],
            SpecNode::Layer(spec) => spec.layer.iter().collect(),
            SpecNode::Concat(spec) => spec.concat.iter().collect(),
            SpecNode::Unit(_) => Vec::new(),
        }
    }

    /// Visit this node and its descendants depth-first, parents before children. The scope
    /// of a node is the path of child indices leading to it from this node.
    pub fn walk(&self, visitor: &mut dyn SpecVisitor) -> Result<()> {
        self.walk_scoped(visitor, &mut Vec::new())
    }

    fn walk_scoped(&self, visitor: &mut dyn SpecVisitor, scope: &mut Vec<u32>) -> Result<()> {
        visitor.visit_node(self, scope)?;
        if let Some(data) = self.data() {
            visitor.visit_data(data, scope)?;
        }
        for transform in self.transforms() {
            visitor.visit_transform(transform, scope)?;
        }
        for (i, child) in self.children().into_iter().enumerate() {
            scope.push(i as u32);
            child.walk_scoped(visitor, scope)?;
            scope.pop();
        }
        Ok(())
    }
}

pub trait SpecVisitor {
    fn visit_node(&mut self, _node: &SpecNode, _scope: &[u32]) -> Result<()> {
        Ok(())
    }
    fn visit_data(&mut self, _data: &DataDef, _scope: &[u32]) -> Result<()> {
        Ok(())
    }
    fn visit_transform(&mut self, _transform: &TransformDirective, _scope: &[u32]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::spec::chart::{SpecNode, SpecVisitor};
    use crate::spec::data::DataDef;
    use serde_json::json;
    use vlflow_common::error::Result;

    #[derive(Default)]
    struct CollectDataScopes {
        scopes: Vec<Vec<u32>>,
    }

    impl SpecVisitor for CollectDataScopes {
        fn visit_data(&mut self, _data: &DataDef, scope: &[u32]) -> Result<()> {
            self.scopes.push(scope.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_parse_view_tree() {
        let spec: SpecNode = serde_json::from_value(json!({
            "data": {"url": "data/cars.json"},
            "hconcat": [
                {"mark": "point", "encoding": {"x": {"field": "a", "type": "quantitative"}}},
                {
                    "facet": {"row": {"field": "r", "type": "nominal"}},
                    "spec": {"layer": [
                        {"mark": "bar", "data": {"url": "other.csv"}},
                        {"mark": "rule"}
                    ]}
                }
            ]
        }))
        .unwrap();

        let SpecNode::Concat(concat) = &spec else {
            panic!("expected concat")
        };
        assert!(matches!(concat.concat[0], SpecNode::Unit(_)));
        assert!(matches!(concat.concat[1], SpecNode::Facet(_)));

        let mut visitor = CollectDataScopes::default();
        spec.walk(&mut visitor).unwrap();
        assert_eq!(visitor.scopes, vec![vec![], vec![1, 0, 0]]);
    }
}
