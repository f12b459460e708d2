/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::context::CompileContext;
use crate::dataflow::graph::{DataflowGraph, NodeId};
use crate::dataflow::node::DataflowNode;
use crate::dataflow::output::DataSourceType;
use crate::vega::data::{DataFormatSpec, DataSpec};
use serde::Serialize;
use std::collections::HashSet;
use vlflow_common::error::{Result, VlFlowError};

/// Data sources evaluated once per facet cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetAssembly {
    /// Name of the per-cell table the nested data sources read from
    pub name: String,
    /// Table that gets partitioned
    pub data: String,
    pub groupby: Vec<String>,
    pub data_specs: Vec<DataSpec>,
}

/// Serialize the optimized graph into an ordered list of data sources. Tables are named
/// `source_<n>` for roots without a name and `data_<n>` for derived tables. Every output's
/// logical name is bound to the table that ends up holding its rows in `ctx.data_names`.
pub fn assemble_dataflow(
    graph: &DataflowGraph,
    ctx: &mut CompileContext,
) -> Result<(Vec<DataSpec>, Vec<FacetAssembly>)> {
    // Secondary tables of lookups are emitted first so that lookups can refer to them
    let mut roots = Vec::new();
    let mut rest = Vec::new();
    for root in ctx.roots.clone() {
        if feeds_lookup(graph, root)? {
            roots.push(root);
        } else {
            rest.push(root);
        }
    }
    roots.extend(rest);

    let mut assembler = Assembler {
        graph,
        ctx,
        source_counter: 0,
        data_counter: 0,
        facets: Vec::new(),
    };
    let mut data = Vec::new();
    for root in roots {
        assembler.walk(root, empty_spec(), &mut data)?;
    }
    check_input_order(&data)?;
    Ok((data, assembler.facets))
}

/// Every dataset a transform reads has to be defined before the dataset holding it
fn check_input_order(data: &[DataSpec]) -> Result<()> {
    let mut defined = HashSet::new();
    for spec in data {
        for input in spec.input_datasets() {
            if !defined.contains(input.as_str()) {
                return Err(VlFlowError::internal(format!(
                    "Dataset {} reads {input} before it is defined",
                    spec.name
                )));
            }
        }
        defined.insert(spec.name.as_str());
    }
    Ok(())
}

fn feeds_lookup(graph: &DataflowGraph, root: NodeId) -> Result<bool> {
    for id in graph.subtree(root)? {
        if matches!(
            graph.node(id)?.as_output(),
            Some(output) if output.source_type() == DataSourceType::Lookup
        ) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn empty_spec() -> DataSpec {
    DataSpec {
        name: String::new(),
        source: None,
        url: None,
        format: None,
        values: None,
        transform: Vec::new(),
    }
}

fn derived_spec(source: &str) -> DataSpec {
    DataSpec {
        source: Some(source.to_string()),
        ..empty_spec()
    }
}

struct Assembler<'a> {
    graph: &'a DataflowGraph,
    ctx: &'a mut CompileContext,
    source_counter: usize,
    data_counter: usize,
    facets: Vec<FacetAssembly>,
}

impl<'a> Assembler<'a> {
    fn next_source_name(&mut self) -> String {
        let name = format!("source_{}", self.source_counter);
        self.source_counter += 1;
        name
    }

    fn next_data_name(&mut self) -> String {
        let name = format!("data_{}", self.data_counter);
        self.data_counter += 1;
        name
    }

    fn bind(&mut self, logical: &str, table: &str) -> Result<()> {
        if logical != table {
            self.ctx.data_names.bind(logical, table)?;
        }
        Ok(())
    }

    /// Append the transforms of `id` to `current` and continue into its children. `current` is
    /// pushed to `out` once it is complete.
    fn walk(&mut self, id: NodeId, mut current: DataSpec, out: &mut Vec<DataSpec>) -> Result<()> {
        let graph = self.graph;
        let node = graph.node(id)?;
        let parent = match graph.parent(id)? {
            Some(parent) => Some(graph.node(parent)?),
            None => None,
        };

        match node {
            DataflowNode::Source(source) => {
                current.name = match &source.name {
                    Some(name) => name.clone(),
                    None => self.next_source_name(),
                };
                current.url = source.url.clone();
                current.values = source.values.clone();
                current.format = source.format_type.as_ref().map(|format_type| DataFormatSpec {
                    type_: Some(format_type.clone()),
                    parse: None,
                });
            }
            // `format` is only read on datasets that load their own rows
            DataflowNode::Parse(parse)
                if self.ctx.config.format_parse
                    && matches!(parent, Some(DataflowNode::Source(_)))
                    && current.source.is_none()
                    && current.transform.is_empty() =>
            {
                current
                    .format
                    .get_or_insert_with(DataFormatSpec::default)
                    .parse
                    .get_or_insert_with(Default::default)
                    .extend(parse.assemble_format_parse());
            }
            DataflowNode::Output(output) => {
                match current.source.clone() {
                    Some(source) if current.transform.is_empty() => {
                        self.bind(output.name(), &source)?;
                    }
                    _ if matches!(parent, Some(DataflowNode::Output(_))) => {
                        let name = current.name.clone();
                        self.bind(output.name(), &name)?;
                    }
                    _ => {
                        if current.name.is_empty() {
                            current.name = self.next_data_name();
                        }
                        let name = current.name.clone();
                        self.bind(output.name(), &name)?;
                        if graph.num_children(id)? == 1 {
                            out.push(std::mem::replace(&mut current, derived_spec(&name)));
                        }
                    }
                }
            }
            DataflowNode::Facet(facet) => {
                let aliased = current.transform.is_empty()
                    && current.url.is_none()
                    && current.values.is_none()
                    && current.name.is_empty();
                let data = match current.source.clone() {
                    Some(source) if aliased => source,
                    _ => {
                        if current.name.is_empty() {
                            current.name = self.next_data_name();
                        }
                        let name = current.name.clone();
                        out.push(current);
                        name
                    }
                };
                let mut data_specs = Vec::new();
                for child in graph.children(id)? {
                    self.walk(*child, derived_spec(facet.name()), &mut data_specs)?;
                }
                self.facets.push(FacetAssembly {
                    name: facet.name().to_string(),
                    data,
                    groupby: facet.fields().to_vec(),
                    data_specs,
                });
                return Ok(());
            }
            node => current.transform.extend(node.assemble(self.ctx)?),
        }

        let children = graph.children(id)?;
        match children {
            [] => {
                let is_output = matches!(node, DataflowNode::Output(_));
                if is_output && (current.source.is_none() || !current.transform.is_empty()) {
                    out.push(current);
                }
            }
            [child] => self.walk(*child, current, out)?,
            _ => {
                if current.name.is_empty() {
                    current.name = self.next_data_name();
                }
                let mut source = current.name.clone();
                match current.source.clone() {
                    Some(parent_table) if current.transform.is_empty() => {
                        source = parent_table;
                    }
                    _ => out.push(current),
                }
                for child in children {
                    self.walk(*child, derived_spec(&source), out)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::config::CompileConfig;
    use crate::compile::context::CompileContext;
    use crate::dataflow::calculate::CalculateNode;
    use crate::dataflow::graph::{DataflowGraph, NodeId};
    use crate::dataflow::node::DataflowNode;
    use crate::dataflow::output::{DataSourceType, OutputNode};
    use crate::dataflow::parse::ParseNode;
    use crate::dataflow::source::SourceNode;
    use crate::planning::assemble::assemble_dataflow;
    use crate::spec::data::ParseDirective;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn url_source(graph: &mut DataflowGraph, ctx: &mut CompileContext) -> NodeId {
        let mut source = SourceNode::named("unused");
        source.name = None;
        source.url = Some("data/cars.json".to_string());
        let id = graph.add(DataflowNode::Source(source), None).unwrap();
        ctx.roots.push(id);
        id
    }

    fn output(graph: &mut DataflowGraph, name: &str, parent: NodeId) -> NodeId {
        graph
            .add(
                DataflowNode::Output(OutputNode::new(name, DataSourceType::Main)),
                Some(parent),
            )
            .unwrap()
    }

    #[test]
    fn test_parse_into_format_and_output_binding() {
        let mut graph = DataflowGraph::new();
        let mut ctx = CompileContext::new(CompileConfig::default());
        let root = url_source(&mut graph, &mut ctx);
        let parse = graph
            .add(
                DataflowNode::Parse(ParseNode::new(BTreeMap::from([(
                    "a".to_string(),
                    ParseDirective::Number,
                )]))),
                Some(root),
            )
            .unwrap();
        let calc = graph
            .add(
                DataflowNode::Calculate(CalculateNode::new("datum.a * 2", "a2")),
                Some(parse),
            )
            .unwrap();
        output(&mut graph, "main", calc);

        let (data, facets) = assemble_dataflow(&graph, &mut ctx).unwrap();
        assert!(facets.is_empty());
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!([{
                "name": "source_0",
                "url": "data/cars.json",
                "format": {"parse": {"a": "number"}},
                "transform": [{"type": "formula", "expr": "datum.a * 2", "as": "a2"}]
            }])
        );
        assert_eq!(ctx.data_names.get("main"), "source_0");
    }

    #[test]
    fn test_branch_aliases_untransformed_output() {
        let mut graph = DataflowGraph::new();
        let mut ctx = CompileContext::new(CompileConfig::default());
        let root = url_source(&mut graph, &mut ctx);
        let calc = graph
            .add(
                DataflowNode::Calculate(CalculateNode::new("1", "one")),
                Some(root),
            )
            .unwrap();
        output(&mut graph, "derived", calc);
        output(&mut graph, "plain", root);

        let (data, _) = assemble_dataflow(&graph, &mut ctx).unwrap();
        let names: Vec<_> = data.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["source_0", "data_0"]);
        assert_eq!(data[1].source.as_deref(), Some("source_0"));
        assert_eq!(ctx.data_names.get("derived"), "data_0");
        assert_eq!(ctx.data_names.get("plain"), "source_0");
    }

    #[test]
    fn test_parse_on_branch_stays_in_transforms() {
        let mut graph = DataflowGraph::new();
        let mut ctx = CompileContext::new(CompileConfig::default());
        let root = url_source(&mut graph, &mut ctx);
        for (directive, name) in [(ParseDirective::Number, "left"), (ParseDirective::Date, "right")] {
            let parse = graph
                .add(
                    DataflowNode::Parse(ParseNode::new(BTreeMap::from([(
                        "a".to_string(),
                        directive,
                    )]))),
                    Some(root),
                )
                .unwrap();
            output(&mut graph, name, parse);
        }

        let (data, _) = assemble_dataflow(&graph, &mut ctx).unwrap();
        assert_eq!(data.len(), 3);
        assert!(data[0].format.is_none());
        for (spec, expr) in data[1..].iter().zip(["toNumber(datum[\"a\"])", "toDate(datum[\"a\"])"]) {
            assert_eq!(spec.source.as_deref(), Some("source_0"));
            assert!(spec.format.is_none());
            assert_eq!(
                serde_json::to_value(&spec.transform).unwrap(),
                json!([{"type": "formula", "expr": expr, "as": "a"}])
            );
        }
        assert_eq!(ctx.data_names.get("left"), "data_0");
        assert_eq!(ctx.data_names.get("right"), "data_1");
    }
}
