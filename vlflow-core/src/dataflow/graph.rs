/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::context::CompileContext;
use crate::dataflow::node::DataflowNode;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use vlflow_common::error::{Result, VlFlowError};

/// Stable handle to a node of a [`DataflowGraph`]. Handles are never reused, so a handle to a
/// removed node stays invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct NodeEntry {
    node: DataflowNode,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena holding a forest of dataflow nodes. Every node has at most one parent and an ordered
/// list of children. Each editing operation below updates the parent link and the parent's
/// child list together, so the two directions always agree.
#[derive(Debug, Clone, Default)]
pub struct DataflowGraph {
    entries: Vec<Option<NodeEntry>>,
}

impl DataflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: NodeId) -> Result<&NodeEntry> {
        self.entries
            .get(id.0)
            .and_then(|e| e.as_ref())
            .ok_or_else(|| VlFlowError::internal(format!("Dangling dataflow node {id}")))
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut NodeEntry> {
        self.entries
            .get_mut(id.0)
            .and_then(|e| e.as_mut())
            .ok_or_else(|| VlFlowError::internal(format!("Dangling dataflow node {id}")))
    }

    /// Add a node, appended as the last child of `parent` when one is given
    pub fn add(&mut self, node: DataflowNode, parent: Option<NodeId>) -> Result<NodeId> {
        let id = NodeId(self.entries.len());
        self.entries.push(Some(NodeEntry {
            node,
            parent: None,
            children: Vec::new(),
        }));
        if let Some(parent) = parent {
            self.add_child(parent, id)?;
        }
        Ok(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.entries.get(id.0), Some(Some(_)))
    }

    pub fn node(&self, id: NodeId) -> Result<&DataflowNode> {
        Ok(&self.entry(id)?.node)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut DataflowNode> {
        Ok(&mut self.entry_mut(id)?.node)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.entry(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.entry(id)?.children)
    }

    pub fn num_children(&self, id: NodeId) -> Result<usize> {
        Ok(self.entry(id)?.children.len())
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach a parentless node as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_child_at(parent, child, None)
    }

    fn insert_child_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        position: Option<usize>,
    ) -> Result<()> {
        if parent == child {
            return Err(VlFlowError::internal(format!(
                "Cannot attach node {child} to itself"
            )));
        }
        if let Some(old_parent) = self.entry(child)?.parent {
            return Err(VlFlowError::internal(format!(
                "Node {child} is already attached to {old_parent}"
            )));
        }
        let children = &mut self.entry_mut(parent)?.children;
        match position {
            Some(pos) if pos <= children.len() => children.insert(pos, child),
            _ => children.push(child),
        }
        self.entry_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detach `child` from `parent`, leaving it parentless. Returns the position it occupied.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<usize> {
        let children = &mut self.entry_mut(parent)?.children;
        let pos = children.iter().position(|c| *c == child).ok_or_else(|| {
            VlFlowError::internal(format!("Node {child} is not a child of {parent}"))
        })?;
        children.remove(pos);
        self.entry_mut(child)?.parent = None;
        Ok(pos)
    }

    /// Detach a node from its parent, if it has one
    pub fn detach(&mut self, id: NodeId) -> Result<Option<(NodeId, usize)>> {
        match self.entry(id)?.parent {
            Some(parent) => Ok(Some((parent, self.remove_child(parent, id)?))),
            None => Ok(None),
        }
    }

    /// Remove a node, splicing its children into its parent's child list at the position the
    /// node occupied
    pub fn remove(&mut self, id: NodeId) -> Result<DataflowNode> {
        let children = self.entry(id)?.children.clone();
        let location = self.detach(id)?;
        match location {
            Some((parent, pos)) => {
                for (i, child) in children.iter().enumerate() {
                    self.entry_mut(*child)?.parent = None;
                    self.insert_child_at(parent, *child, Some(pos + i))?;
                }
            }
            None if !children.is_empty() => {
                return Err(VlFlowError::internal(format!(
                    "Cannot remove root node {id} that still has children"
                )));
            }
            None => {}
        }
        self.take(id)
    }

    fn take(&mut self, id: NodeId) -> Result<DataflowNode> {
        let entry = self
            .entries
            .get_mut(id.0)
            .and_then(|e| e.take())
            .ok_or_else(|| VlFlowError::internal(format!("Dangling dataflow node {id}")))?;
        Ok(entry.node)
    }

    /// Detach a node and drop it together with all of its descendants
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<usize> {
        self.detach(id)?;
        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            stack.extend(self.entry(next)?.children.iter().copied());
            self.take(next)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Insert the parentless node `new_node` between `child` and its parent. `new_node` takes
    /// the child's position and the child becomes its last child.
    pub fn insert_as_parent_of(&mut self, new_node: NodeId, child: NodeId) -> Result<()> {
        match self.detach(child)? {
            Some((parent, pos)) => self.insert_child_at(parent, new_node, Some(pos))?,
            None => {
                return Err(VlFlowError::internal(format!(
                    "Cannot insert a parent above root node {child}"
                )))
            }
        }
        self.add_child(new_node, child)
    }

    /// Exchange a node with its parent. The node takes its parent's position under the
    /// grandparent, the parent becomes the node's only child, and the node's former children
    /// are handed to the parent.
    pub fn swap_with_parent(&mut self, id: NodeId) -> Result<()> {
        let parent = self
            .parent(id)?
            .ok_or_else(|| VlFlowError::internal(format!("Node {id} has no parent to swap")))?;
        let grandparent = self.parent(parent)?.ok_or_else(|| {
            VlFlowError::internal(format!("Cannot swap node {id} with root node {parent}"))
        })?;

        let children = self.entry(id)?.children.clone();
        for child in &children {
            self.remove_child(id, *child)?;
        }
        let id_pos = self.remove_child(parent, id)?;
        for (i, child) in children.iter().enumerate() {
            self.insert_child_at(parent, *child, Some(id_pos + i))?;
        }
        let parent_pos = self.remove_child(grandparent, parent)?;
        self.insert_child_at(grandparent, id, Some(parent_pos))?;
        self.add_child(id, parent)
    }

    /// Parentless copy of a node's payload. Children are not copied.
    pub fn clone_node(&mut self, id: NodeId) -> Result<NodeId> {
        let node = self.node(id)?.clone();
        self.add(node, None)
    }

    /// Fold `other` into `keep`. When the node payloads merge, `other`'s children are moved
    /// under `keep` and `other` is dropped. Returns whether the merge happened.
    pub fn merge_into(
        &mut self,
        keep: NodeId,
        other: NodeId,
        ctx: &mut CompileContext,
    ) -> Result<bool> {
        if keep == other {
            return Ok(false);
        }
        let other_node = self.node(other)?.clone();
        if !self.node_mut(keep)?.merge(&other_node, ctx)? {
            return Ok(false);
        }
        let children = self.entry(other)?.children.clone();
        for child in children {
            self.remove_child(other, child)?;
            self.add_child(keep, child)?;
        }
        self.detach(other)?;
        self.take(other)?;
        Ok(true)
    }

    /// A node and all of its descendants, parents before children
    pub fn subtree(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.entry(next)?.children.iter().rev().copied());
        }
        Ok(out)
    }

    /// Descendants of `id` without children, in depth-first order
    pub fn leaves(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut leaves = Vec::new();
        for node in self.subtree(id)? {
            if self.entry(node)?.children.is_empty() {
                leaves.push(node);
            }
        }
        Ok(leaves)
    }

    /// Copy of the live parent/child links as a petgraph graph
    pub fn to_petgraph(&self) -> (DiGraph<NodeId, ()>, HashMap<NodeId, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.is_some() {
                indices.insert(NodeId(i), graph.add_node(NodeId(i)));
            }
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if let Some(entry) = entry {
                for child in &entry.children {
                    if let (Some(from), Some(to)) = (indices.get(&NodeId(i)), indices.get(child)) {
                        graph.add_edge(*from, *to, ());
                    }
                }
            }
        }
        (graph, indices)
    }

    /// Fail if the parent/child links contain a cycle
    pub fn check_acyclic(&self) -> Result<()> {
        let (graph, _) = self.to_petgraph();
        toposort(&graph, None).map_err(|cycle| {
            VlFlowError::internal(format!(
                "Dataflow graph contains a cycle through node {}",
                graph[cycle.node_id()]
            ))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::config::CompileConfig;
    use crate::compile::context::CompileContext;
    use crate::dataflow::graph::{DataflowGraph, NodeId};
    use crate::dataflow::node::DataflowNode;
    use crate::dataflow::output::{DataSourceType, OutputNode};
    use crate::dataflow::sample::SampleNode;
    use crate::dataflow::source::SourceNode;

    fn sample(size: f64) -> DataflowNode {
        DataflowNode::Sample(SampleNode::new(size))
    }

    fn output(name: &str) -> DataflowNode {
        DataflowNode::Output(OutputNode::new(name, DataSourceType::Main))
    }

    fn chain(graph: &mut DataflowGraph) -> (NodeId, NodeId, NodeId, NodeId) {
        let root = graph
            .add(DataflowNode::Source(SourceNode::named("source")), None)
            .unwrap();
        let a = graph.add(sample(1.0), Some(root)).unwrap();
        let b = graph.add(sample(2.0), Some(a)).unwrap();
        let c = graph.add(output("main"), Some(b)).unwrap();
        (root, a, b, c)
    }

    #[test]
    fn test_remove_splices_children() {
        let mut graph = DataflowGraph::new();
        let (root, a, b, c) = chain(&mut graph);
        let sibling = graph.add(output("raw"), Some(a)).unwrap();

        graph.remove(a).unwrap();
        assert!(!graph.contains(a));
        assert_eq!(graph.children(root).unwrap(), &[b, sibling]);
        assert_eq!(graph.parent(b).unwrap(), Some(root));
        assert_eq!(graph.parent(sibling).unwrap(), Some(root));
        assert_eq!(graph.children(b).unwrap(), &[c]);
    }

    #[test]
    fn test_removing_root_with_children_fails() {
        let mut graph = DataflowGraph::new();
        let (root, ..) = chain(&mut graph);
        assert!(graph.remove(root).unwrap_err().is_internal());
    }

    #[test]
    fn test_swap_with_parent() {
        let mut graph = DataflowGraph::new();
        let (root, a, b, c) = chain(&mut graph);
        graph.swap_with_parent(b).unwrap();

        assert_eq!(graph.children(root).unwrap(), &[b]);
        assert_eq!(graph.children(b).unwrap(), &[a]);
        assert_eq!(graph.children(a).unwrap(), &[c]);
        assert_eq!(graph.parent(c).unwrap(), Some(a));
        assert_eq!(graph.parent(a).unwrap(), Some(b));
        graph.check_acyclic().unwrap();
    }

    #[test]
    fn test_swap_keeps_position_among_siblings() {
        let mut graph = DataflowGraph::new();
        let (root, a, b, _) = chain(&mut graph);
        let first = graph.add(output("first"), None).unwrap();
        graph.remove_child(root, a).unwrap();
        graph.add_child(root, first).unwrap();
        graph.add_child(root, a).unwrap();
        let last = graph.add(output("last"), Some(root)).unwrap();

        graph.swap_with_parent(b).unwrap();
        assert_eq!(graph.children(root).unwrap(), &[first, b, last]);
    }

    #[test]
    fn test_insert_as_parent_of() {
        let mut graph = DataflowGraph::new();
        let (_, a, b, c) = chain(&mut graph);
        let new_node = graph.add(sample(3.0), None).unwrap();
        graph.insert_as_parent_of(new_node, c).unwrap();
        assert_eq!(graph.children(b).unwrap(), &[new_node]);
        assert_eq!(graph.children(new_node).unwrap(), &[c]);
        assert!(graph.parent(a).unwrap().is_some());
    }

    #[test]
    fn test_clone_node_has_no_parent() {
        let mut graph = DataflowGraph::new();
        let (_, a, ..) = chain(&mut graph);
        let copy = graph.clone_node(a).unwrap();
        assert_eq!(graph.parent(copy).unwrap(), None);
        assert!(graph.children(copy).unwrap().is_empty());
        assert_eq!(
            graph.node(copy).unwrap().hash().unwrap(),
            graph.node(a).unwrap().hash().unwrap()
        );
    }

    #[test]
    fn test_merge_moves_children() {
        let mut ctx = CompileContext::new(CompileConfig::default());
        let mut graph = DataflowGraph::new();
        let root = graph
            .add(DataflowNode::Source(SourceNode::named("source")), None)
            .unwrap();
        let left = graph.add(sample(5.0), Some(root)).unwrap();
        let right = graph.add(sample(5.0), Some(root)).unwrap();
        let left_out = graph.add(output("left"), Some(left)).unwrap();
        let right_out = graph.add(output("right"), Some(right)).unwrap();

        assert!(graph.merge_into(left, right, &mut ctx).unwrap());
        assert!(!graph.contains(right));
        assert_eq!(graph.children(root).unwrap(), &[left]);
        assert_eq!(graph.children(left).unwrap(), &[left_out, right_out]);

        let other = graph.add(sample(6.0), Some(root)).unwrap();
        assert!(!graph.merge_into(left, other, &mut ctx).unwrap());
        assert!(graph.contains(other));
    }

    #[test]
    fn test_remove_subtree_and_leaves() {
        let mut graph = DataflowGraph::new();
        let (root, a, b, c) = chain(&mut graph);
        let other = graph.add(output("raw"), Some(a)).unwrap();
        assert_eq!(graph.leaves(root).unwrap(), vec![c, other]);

        assert_eq!(graph.remove_subtree(b).unwrap(), 2);
        assert!(!graph.contains(c));
        assert_eq!(graph.children(a).unwrap(), &[other]);
        assert_eq!(graph.len(), 3);
    }
}
