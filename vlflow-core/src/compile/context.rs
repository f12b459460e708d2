/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::config::CompileConfig;
use crate::dataflow::graph::{DataflowGraph, NodeId};
use crate::dataflow::node::DataflowNode;
use crate::dataflow::source::SourceNode;
use crate::spec::data::DataDef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use vlflow_common::error::{Result, VlFlowError};

/// Indirection from the names consumers bind to (logical names) to the names that are
/// finally emitted. Renames chain: if `a` is renamed to `b` and `b` to `c`, then
/// `get("a")` is `c`. A chain stops at a name that was the target of `bind`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameMap {
    names: BTreeMap<String, String>,

    /// Final names, never followed as rename sources after the first step
    #[serde(skip)]
    bound: BTreeSet<String>,
}

impl NameMap {
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        if self.get(new_name) == old_name {
            return Err(VlFlowError::internal(format!(
                "Cannot rename {old_name} to {new_name}: the name would alias itself"
            )));
        }
        self.names.insert(old_name.to_string(), new_name.to_string());
        Ok(())
    }

    /// Point `name` at the final name `target`. Lookups that reach `target` through a chain
    /// stop there, even when `target` is itself a logical name with its own binding.
    pub fn bind(&mut self, name: &str, target: &str) -> Result<()> {
        if name == target {
            return Err(VlFlowError::internal(format!(
                "Cannot bind {name} to itself"
            )));
        }
        self.names.insert(name.to_string(), target.to_string());
        self.bound.insert(target.to_string());
        Ok(())
    }

    /// Resolve a name by following the rename chain. Unknown names resolve to themselves.
    pub fn get(&self, name: &str) -> String {
        let mut current = match self.names.get(name) {
            Some(next) => next.as_str(),
            None => return name.to_string(),
        };
        // rename never creates a cycle, so the chain is at most as long as the map
        for _ in 0..self.names.len() {
            if self.bound.contains(current) {
                break;
            }
            match self.names.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        current.to_string()
    }

    pub fn has(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.names.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    UnsupportedChannel,
    EmptyFieldDef,
    UnrecognizedParse,
    DeprecatedTransform,
    InvalidTimeUnit,
    IncompatibleFieldType,
}

/// A recoverable problem with the input. The offending piece was dropped and compilation
/// continued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// State shared by every phase of a single compile
#[derive(Debug, Clone)]
pub struct CompileContext {
    pub config: CompileConfig,
    pub data_names: NameMap,
    pub scale_names: NameMap,
    pub size_names: NameMap,
    pub signal_names: NameMap,
    pub diagnostics: Vec<Diagnostic>,

    /// Source roots of the dataflow forest in creation order
    pub roots: Vec<NodeId>,

    /// Output nodes by logical name
    outputs: BTreeMap<String, NodeId>,

    /// Source roots by source hash
    sources: BTreeMap<String, NodeId>,

    lookup_counter: usize,
}

impl CompileContext {
    pub fn new(config: CompileConfig) -> Self {
        Self {
            config,
            data_names: Default::default(),
            scale_names: Default::default(),
            size_names: Default::default(),
            signal_names: Default::default(),
            diagnostics: Default::default(),
            roots: Default::default(),
            outputs: Default::default(),
            sources: Default::default(),
            lookup_counter: 0,
        }
    }

    pub fn warn<S: Into<String>>(&mut self, kind: DiagnosticKind, message: S) {
        let message = message.into();
        log::warn!("{kind:?}: {message}");
        self.diagnostics.push(Diagnostic { kind, message });
    }

    /// Source root for a data definition. Structurally equal definitions share one root.
    pub fn source_root(&mut self, graph: &mut DataflowGraph, data: &DataDef) -> Result<NodeId> {
        let node = DataflowNode::Source(SourceNode::from(data));
        let hash = node.hash()?;
        if let Some(id) = self.sources.get(&hash) {
            if graph.contains(*id) {
                return Ok(*id);
            }
        }
        let id = graph.add(node, None)?;
        self.sources.insert(hash, id);
        self.roots.push(id);
        Ok(id)
    }

    pub fn register_output(&mut self, name: &str, id: NodeId) -> Result<()> {
        if self.outputs.contains_key(name) {
            return Err(VlFlowError::internal(format!(
                "Output node {name} registered twice"
            )));
        }
        self.outputs.insert(name.to_string(), id);
        Ok(())
    }

    pub fn output(&self, name: &str) -> Option<NodeId> {
        self.outputs.get(name).copied()
    }

    pub fn outputs(&self) -> &BTreeMap<String, NodeId> {
        &self.outputs
    }

    pub fn next_lookup_name(&mut self) -> String {
        let name = format!("lookup_{}", self.lookup_counter);
        self.lookup_counter += 1;
        name
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::context::NameMap;

    #[test]
    fn test_rename_chain() {
        let mut names = NameMap::default();
        names.rename("child_main", "main").unwrap();
        names.rename("main", "data_0").unwrap();
        assert_eq!(names.get("child_main"), "data_0");
        assert_eq!(names.get("main"), "data_0");
        assert_eq!(names.get("other"), "other");
    }

    #[test]
    fn test_rename_rejects_self_alias() {
        let mut names = NameMap::default();
        let err = names.rename("main", "main").unwrap_err();
        assert!(err.is_internal());

        names.rename("a", "b").unwrap();
        let err = names.rename("b", "a").unwrap_err();
        assert!(err.to_string().contains("alias itself"));
        assert_eq!(names.get("a"), "b");
    }

    #[test]
    fn test_bound_table_is_not_followed() {
        // Input table `v_main` shares its name with the logical main output of view `v`
        let mut names = NameMap::default();
        names.bind("v_raw", "v_main").unwrap();
        names.bind("v_main", "data_0").unwrap();
        assert_eq!(names.get("v_raw"), "v_main");
        assert_eq!(names.get("v_main"), "data_0");
        assert!(names.bind("main", "main").unwrap_err().is_internal());
    }
}
