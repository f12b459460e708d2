/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::builder::DataflowBuilder;
use crate::compile::config::CompileConfig;
use crate::compile::context::{CompileContext, Diagnostic, NameMap};
use crate::compile::model::Model;
use crate::dataflow::graph::DataflowGraph;
use crate::dataflow::output::DataSourceType;
use crate::planning::assemble::{assemble_dataflow, FacetAssembly};
use crate::planning::optimize::{optimize_dataflow, prune_dataflow};
use crate::spec::chart::{SpecNode, SpecVisitor};
use crate::spec::data::DataDef;
use crate::spec::encoding::Channel;
use crate::spec::transform::TransformDirective;
use crate::vega::data::DataSpec;
use std::collections::HashSet;
use vlflow_common::error::{Result, VlFlowError};

/// Compilation of one view tree. Between `try_new` and `finish`, consumers register the
/// tables they read with `request`. Outputs nobody requests are dropped.
pub struct DataflowCompiler {
    pub model: Model,
    pub graph: DataflowGraph,
    pub ctx: CompileContext,
}

impl DataflowCompiler {
    pub fn try_new(spec: &SpecNode, config: CompileConfig) -> Result<Self> {
        spec.walk(&mut SpecValidator::default())?;

        let mut ctx = CompileContext::new(config);
        let mut graph = DataflowGraph::new();
        let mut model = Model::try_new(spec, &mut ctx)?;
        DataflowBuilder::new(&mut graph, &mut ctx).build(&mut model)?;
        Ok(Self { model, graph, ctx })
    }

    /// Request a table of the model called `model_name`, returning the logical name to
    /// resolve through the plan's `data_names`
    pub fn request(&mut self, model_name: &str, kind: DataSourceType) -> Result<String> {
        let model = self.model.find(model_name).ok_or_else(|| {
            VlFlowError::compilation(format!("No view named {model_name:?}"))
        })?;
        model.request_data_source(&mut self.graph, kind)
    }

    /// Request the main table of every unit view, the way marks consume their data
    pub fn bind_default_consumers(&mut self) -> Result<()> {
        for model in self.model.descendants() {
            if model.is_unit() {
                model.request_data_source(&mut self.graph, DataSourceType::Main)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<DataflowPlan> {
        self.model.check_drained()?;
        if self.ctx.config.optimize {
            optimize_dataflow(&mut self.graph, &mut self.ctx)?;
        } else {
            prune_dataflow(&mut self.graph, &mut self.ctx)?;
        }
        self.graph.check_acyclic()?;

        let (data, facets) = assemble_dataflow(&self.graph, &mut self.ctx)?;
        Ok(DataflowPlan {
            data,
            facets,
            diagnostics: self.ctx.diagnostics,
            data_names: self.ctx.data_names,
        })
    }
}

/// The compiled data section of a view tree
#[derive(Debug, Clone)]
pub struct DataflowPlan {
    pub data: Vec<DataSpec>,
    pub facets: Vec<FacetAssembly>,
    pub diagnostics: Vec<Diagnostic>,
    /// Logical output names mapped to the emitted table names
    pub data_names: NameMap,
}

impl DataflowPlan {
    /// Compile with every unit view consuming its main table
    pub fn try_new(spec: &SpecNode, config: CompileConfig) -> Result<Self> {
        let mut compiler = DataflowCompiler::try_new(spec, config)?;
        compiler.bind_default_consumers()?;
        compiler.finish()
    }

    /// Emitted data source holding the rows of a logical output
    pub fn dataset(&self, logical_name: &str) -> Option<&DataSpec> {
        let name = self.data_names.get(logical_name);
        self.data
            .iter()
            .chain(self.facets.iter().flat_map(|facet| facet.data_specs.iter()))
            .find(|data| data.name == name)
    }

    /// Signals defined by the emitted transforms, such as bin extents
    pub fn signals(&self) -> Vec<String> {
        self.data
            .iter()
            .chain(self.facets.iter().flat_map(|facet| facet.data_specs.iter()))
            .flat_map(|data| data.output_signals())
            .collect()
    }
}

/// Structural checks that the view tree has to pass before compilation
#[derive(Default)]
struct SpecValidator {
    names: HashSet<String>,
}

impl SpecVisitor for SpecValidator {
    fn visit_node(&mut self, node: &SpecNode, scope: &[u32]) -> Result<()> {
        if let Some(name) = node.name() {
            if !self.names.insert(name.clone()) {
                return Err(VlFlowError::specification(format!(
                    "Duplicate view name {name:?}"
                )));
            }
        }
        match node {
            SpecNode::Layer(layer) if layer.layer.is_empty() => Err(VlFlowError::specification(
                format!("Layer view at {scope:?} has no layers"),
            )),
            SpecNode::Concat(concat) if concat.concat.is_empty() => Err(
                VlFlowError::specification(format!("Concat view at {scope:?} has no views")),
            ),
            SpecNode::Facet(facet)
                if !facet.facet.contains(Channel::Row) && !facet.facet.contains(Channel::Column) =>
            {
                Err(VlFlowError::specification(format!(
                    "Facet view at {scope:?} has neither a row nor a column field"
                )))
            }
            _ => Ok(()),
        }
    }

    fn visit_data(&mut self, data: &DataDef, scope: &[u32]) -> Result<()> {
        if data.name.is_none() && data.url.is_none() && data.values.is_none() {
            return Err(VlFlowError::specification(format!(
                "Data of view at {scope:?} needs one of url, values or name"
            )));
        }
        Ok(())
    }

    fn visit_transform(&mut self, transform: &TransformDirective, scope: &[u32]) -> Result<()> {
        match transform {
            TransformDirective::Calculate(calculate) if calculate.as_.is_empty() => Err(
                VlFlowError::specification(format!("Calculate at {scope:?} has an empty as")),
            ),
            TransformDirective::Lookup(lookup) if lookup.from.key.is_empty() => Err(
                VlFlowError::specification(format!("Lookup at {scope:?} has an empty key")),
            ),
            TransformDirective::Lookup(lookup) => self.visit_data(&lookup.from.data, scope),
            TransformDirective::Sample(sample) if sample.sample <= 0.0 => Err(
                VlFlowError::specification(format!("Sample at {scope:?} must be positive")),
            ),
            _ => Ok(()),
        }
    }
}
