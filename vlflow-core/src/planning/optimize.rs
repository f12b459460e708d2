/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
//! Rewrites of the dataflow graph that shrink the emitted data sources without changing what
//! any requested output contains. Passes run in a fixed order and each reports whether it
//! changed the graph.
use crate::compile::context::CompileContext;
use crate::dataflow::graph::{DataflowGraph, NodeId};
use crate::dataflow::node::DataflowNode;
use std::collections::{BTreeSet, VecDeque};
use vlflow_common::error::{Result, ResultWithContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassResult {
    Changed,
    Unchanged,
}

impl PassResult {
    fn from_changed(changed: bool) -> Self {
        if changed {
            PassResult::Changed
        } else {
            PassResult::Unchanged
        }
    }
}

/// Run the full optimization pipeline
pub fn optimize_dataflow(graph: &mut DataflowGraph, ctx: &mut CompileContext) -> Result<()> {
    let passes: [(&str, fn(&mut DataflowGraph, &mut CompileContext) -> Result<PassResult>); 9] = [
        ("remove_unrequired_outputs", remove_unrequired_outputs),
        ("remove_empty_roots", remove_empty_roots),
        ("remove_unused_subtrees", remove_unused_subtrees),
        ("remove_empty_roots", remove_empty_roots),
        ("move_parse_up", move_parse_up),
        ("remove_duplicate_time_units", remove_duplicate_time_units),
        ("move_facet_down", move_facet_down),
        ("merge_siblings", merge_siblings),
        ("remove_empty_roots", remove_empty_roots),
    ];
    for (name, pass) in passes {
        let result = pass(graph, ctx)?;
        log::debug!(
            "optimization pass {name}: {result:?}, {} roots, {} nodes",
            ctx.roots.len(),
            graph.len()
        );
    }
    Ok(())
}

/// Only drop outputs nobody asked for
pub fn prune_dataflow(graph: &mut DataflowGraph, ctx: &mut CompileContext) -> Result<()> {
    remove_unrequired_outputs(graph, ctx)?;
    remove_empty_roots(graph, ctx)?;
    Ok(())
}

/// Remove outputs without consumers. Their children are spliced into their parent.
pub fn remove_unrequired_outputs(
    graph: &mut DataflowGraph,
    ctx: &mut CompileContext,
) -> Result<PassResult> {
    let mut changed = false;
    let outputs: Vec<NodeId> = ctx.outputs().values().copied().collect();
    for id in outputs {
        if !graph.contains(id) {
            continue;
        }
        let unrequired = matches!(
            graph.node(id)?.as_output(),
            Some(output) if !output.is_required()
        );
        if unrequired {
            graph.remove(id)?;
            changed = true;
        }
    }
    Ok(PassResult::from_changed(changed))
}

/// Drop source roots that feed nothing
pub fn remove_empty_roots(
    graph: &mut DataflowGraph,
    ctx: &mut CompileContext,
) -> Result<PassResult> {
    let mut changed = false;
    let mut kept = Vec::with_capacity(ctx.roots.len());
    for root in std::mem::take(&mut ctx.roots) {
        if !graph.contains(root) {
            changed = true;
        } else if graph.num_children(root)? == 0 {
            graph.remove(root)?;
            changed = true;
        } else {
            kept.push(root);
        }
    }
    ctx.roots = kept;
    Ok(PassResult::from_changed(changed))
}

/// Starting from every leaf, remove childless nodes that aren't outputs, walking upward until
/// a node that is still needed or the source is reached
pub fn remove_unused_subtrees(
    graph: &mut DataflowGraph,
    ctx: &mut CompileContext,
) -> Result<PassResult> {
    let mut changed = false;
    for root in ctx.roots.clone() {
        for leaf in graph.leaves(root)? {
            let mut current = Some(leaf);
            while let Some(id) = current {
                if !graph.contains(id) || graph.num_children(id)? > 0 {
                    break;
                }
                match graph.node(id)? {
                    DataflowNode::Source(_) | DataflowNode::Output(_) => break,
                    _ => {}
                }
                let parent = graph.parent(id)?;
                graph.remove(id)?;
                changed = true;
                current = parent;
            }
        }
    }
    Ok(PassResult::from_changed(changed))
}

/// Hoist parse nodes toward their source, merging them into parse nodes they run into. A
/// parse stops below a branch and below any node producing a field it converts.
pub fn move_parse_up(graph: &mut DataflowGraph, ctx: &mut CompileContext) -> Result<PassResult> {
    let mut changed = false;
    let parse_nodes = nodes_of_kind(graph, ctx, |node| matches!(node, DataflowNode::Parse(_)))?;
    for start in parse_nodes {
        let mut id = start;
        while graph.contains(id) {
            let Some(parent) = graph.parent(id)? else {
                break;
            };
            let parent_node = graph.node(parent)?;
            if matches!(parent_node, DataflowNode::Source(_)) || graph.num_children(parent)? > 1 {
                break;
            }
            if matches!(parent_node, DataflowNode::Parse(_)) {
                if graph.merge_into(parent, id, ctx)? {
                    changed = true;
                    id = parent;
                    continue;
                }
                break;
            }
            let dependent = graph.node(id)?.dependent_fields();
            if parent_node.produced_fields().intersects(&dependent) {
                break;
            }
            graph.swap_with_parent(id)?;
            changed = true;
        }
    }
    Ok(PassResult::from_changed(changed))
}

/// Drop time unit derivations an ancestor already computes. Time unit nodes left with no
/// derivations are removed.
pub fn remove_duplicate_time_units(
    graph: &mut DataflowGraph,
    ctx: &mut CompileContext,
) -> Result<PassResult> {
    let mut changed = false;
    let mut stack: Vec<(NodeId, BTreeSet<String>)> = ctx
        .roots
        .iter()
        .rev()
        .map(|root| (*root, BTreeSet::new()))
        .collect();
    while let Some((id, mut seen)) = stack.pop() {
        let children = graph.children(id)?.to_vec();
        let emptied = match graph.node_mut(id)? {
            DataflowNode::TimeUnit(time_unit) => {
                let before = time_unit.components().len();
                time_unit.retain(|alias, component| {
                    let key = format!("{alias}|{}|{}", component.field, component.time_unit);
                    seen.insert(key)
                });
                changed |= time_unit.components().len() != before;
                time_unit.is_empty()
            }
            _ => false,
        };
        if emptied {
            graph.remove(id)?;
        }
        for child in children.into_iter().rev() {
            stack.push((child, seen.clone()));
        }
    }
    Ok(PassResult::from_changed(changed))
}

/// Push each facet split below the transforms under it, then copy the facet's subtrees
/// above the split so that scales can see values across all cells
pub fn move_facet_down(graph: &mut DataflowGraph, ctx: &mut CompileContext) -> Result<PassResult> {
    let mut changed = false;
    let facets = nodes_of_kind(graph, ctx, |node| matches!(node, DataflowNode::Facet(_)))?;
    for facet_id in facets {
        let facet = graph
            .node(facet_id)?
            .as_facet()
            .with_context(|| format!("Node {facet_id} is not a facet"))?
            .clone();

        loop {
            let children = graph.children(facet_id)?;
            if children.len() != 1 {
                break;
            }
            let child = children[0];
            if matches!(graph.node(child)?, DataflowNode::Output(_)) {
                break;
            }
            graph.node_mut(child)?.add_dimensions(facet.fields());
            graph.swap_with_parent(child)?;
            changed = true;
        }
        log::debug!(
            "facet {} of {} splits {} subtrees",
            facet.name(),
            facet.model(),
            graph.num_children(facet_id)?
        );

        let main = facet.main();
        if !graph.contains(main) || !is_ancestor(graph, main, facet_id)? {
            continue;
        }
        changed |= move_main_down(graph, main, facet_id)?;

        let mut copies = Vec::new();
        for child in graph.children(facet_id)?.to_vec() {
            copies.extend(clone_for_scales(graph, ctx, child, facet.fields())?);
        }
        for copy in copies {
            graph.add_child(main, copy)?;
            changed = true;
        }
    }
    Ok(PassResult::from_changed(changed))
}

/// Move the facet's main output down until it sits directly above the facet
fn move_main_down(graph: &mut DataflowGraph, main: NodeId, facet: NodeId) -> Result<bool> {
    let mut changed = false;
    while graph.parent(facet)? != Some(main) {
        let children = graph.children(main)?;
        if children.len() != 1 {
            break;
        }
        let child = children[0];
        graph.swap_with_parent(child)?;
        changed = true;
    }
    Ok(changed)
}

/// Copy a subtree below a facet. Outputs become facet scale outputs and grouping nodes are
/// widened by the facet fields. Nested facet nodes are skipped over.
fn clone_for_scales(
    graph: &mut DataflowGraph,
    ctx: &mut CompileContext,
    id: NodeId,
    fields: &[String],
) -> Result<Vec<NodeId>> {
    let children = graph.children(id)?.to_vec();
    let node = graph.node(id)?;
    if matches!(node, DataflowNode::Facet(_)) {
        let mut copies = Vec::new();
        for child in children {
            copies.extend(clone_for_scales(graph, ctx, child, fields)?);
        }
        return Ok(copies);
    }

    let mut node = match node {
        DataflowNode::Output(output) => DataflowNode::Output(output.facet_scale_copy()),
        node => node.clone(),
    };
    node.add_dimensions(fields);
    let output_name = node.as_output().map(|output| output.name().to_string());
    let copy = graph.add(node, None)?;
    if let Some(name) = output_name {
        if ctx.output(&name).is_none() {
            ctx.register_output(&name, copy)?;
        }
    }
    for child in children {
        for child_copy in clone_for_scales(graph, ctx, child, fields)? {
            graph.add_child(copy, child_copy)?;
        }
    }
    Ok(vec![copy])
}

/// Merge siblings that compute the same thing. Parse and bin siblings always combine, other
/// kinds only when their parameters are identical. The earliest sibling survives and adopts
/// the children of the others.
pub fn merge_siblings(graph: &mut DataflowGraph, ctx: &mut CompileContext) -> Result<PassResult> {
    let mut changed = false;
    let mut queue: VecDeque<NodeId> = ctx.roots.iter().copied().collect();
    while let Some(id) = queue.pop_front() {
        if !graph.contains(id) {
            continue;
        }
        let children = graph.children(id)?.to_vec();
        for (i, keep) in children.iter().enumerate() {
            for other in &children[i + 1..] {
                if !graph.contains(*keep) || !graph.contains(*other) {
                    continue;
                }
                if siblings_combine(graph.node(*keep)?, graph.node(*other)?)?
                    && graph.merge_into(*keep, *other, ctx)?
                {
                    changed = true;
                }
            }
        }
        queue.extend(graph.children(id)?.iter().copied());
    }
    Ok(PassResult::from_changed(changed))
}

fn siblings_combine(a: &DataflowNode, b: &DataflowNode) -> Result<bool> {
    Ok(match (a, b) {
        (DataflowNode::Parse(_), DataflowNode::Parse(_))
        | (DataflowNode::Bin(_), DataflowNode::Bin(_)) => true,
        (DataflowNode::Source(_) | DataflowNode::Output(_) | DataflowNode::Facet(_), _) => false,
        (a, b) => a.kind() == b.kind() && a.hash()? == b.hash()?,
    })
}

fn is_ancestor(graph: &DataflowGraph, ancestor: NodeId, id: NodeId) -> Result<bool> {
    let mut current = graph.parent(id)?;
    while let Some(next) = current {
        if next == ancestor {
            return Ok(true);
        }
        current = graph.parent(next)?;
    }
    Ok(false)
}

/// Live nodes matching `pred`, in depth-first order from the roots
fn nodes_of_kind(
    graph: &DataflowGraph,
    ctx: &CompileContext,
    pred: impl Fn(&DataflowNode) -> bool,
) -> Result<Vec<NodeId>> {
    let mut out = Vec::new();
    for root in &ctx.roots {
        for id in graph.subtree(*root)? {
            if pred(graph.node(id)?) {
                out.push(id);
            }
        }
    }
    Ok(out)
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
    use crate::dataflow::timeunit::TimeUnitNode;
    use crate::planning::optimize::{
        merge_siblings, move_parse_up, remove_duplicate_time_units, remove_unrequired_outputs,
        remove_unused_subtrees, PassResult,
    };
    use crate::spec::data::ParseDirective;
    use crate::spec::transform::TimeUnitTransform;
    use std::collections::BTreeMap;

    fn setup() -> (DataflowGraph, CompileContext, NodeId) {
        let mut graph = DataflowGraph::new();
        let mut ctx = CompileContext::new(CompileConfig::default());
        let root = graph
            .add(DataflowNode::Source(SourceNode::named("table")), None)
            .unwrap();
        ctx.roots.push(root);
        (graph, ctx, root)
    }

    fn output(
        graph: &mut DataflowGraph,
        ctx: &mut CompileContext,
        name: &str,
        parent: NodeId,
        requested: bool,
    ) -> NodeId {
        let mut node = OutputNode::new(name, DataSourceType::Main);
        if requested {
            node.request();
        }
        let id = graph.add(DataflowNode::Output(node), Some(parent)).unwrap();
        ctx.register_output(name, id).unwrap();
        id
    }

    fn parse(field: &str) -> DataflowNode {
        DataflowNode::Parse(ParseNode::new(BTreeMap::from([(
            field.to_string(),
            ParseDirective::Number,
        )])))
    }

    fn time_unit(field: &str, unit: &str, ctx: &mut CompileContext) -> DataflowNode {
        let transform = TimeUnitTransform {
            time_unit: unit.to_string(),
            field: field.to_string(),
            as_: format!("{unit}_{field}"),
        };
        DataflowNode::TimeUnit(TimeUnitNode::make_from_transform(&transform, ctx).unwrap())
    }

    #[test]
    fn test_unrequired_output_then_unused_subtree() {
        let (mut graph, mut ctx, root) = setup();
        let calc = graph
            .add(
                DataflowNode::Calculate(CalculateNode::new("1", "one")),
                Some(root),
            )
            .unwrap();
        output(&mut graph, &mut ctx, "raw", calc, false);

        assert_eq!(
            remove_unrequired_outputs(&mut graph, &mut ctx).unwrap(),
            PassResult::Changed
        );
        assert_eq!(graph.children(calc).unwrap().len(), 0);
        assert_eq!(
            remove_unused_subtrees(&mut graph, &mut ctx).unwrap(),
            PassResult::Changed
        );
        assert!(!graph.contains(calc));
        assert_eq!(graph.num_children(root).unwrap(), 0);
    }

    #[test]
    fn test_parse_moves_above_unrelated_calculate() {
        let (mut graph, mut ctx, root) = setup();
        let calc = graph
            .add(
                DataflowNode::Calculate(CalculateNode::new("datum.b * 2", "b2")),
                Some(root),
            )
            .unwrap();
        let parse_a = graph.add(parse("a"), Some(calc)).unwrap();
        output(&mut graph, &mut ctx, "main", parse_a, true);

        move_parse_up(&mut graph, &mut ctx).unwrap();
        assert_eq!(graph.children(root).unwrap(), &[parse_a]);
        assert_eq!(graph.children(parse_a).unwrap(), &[calc]);
    }

    #[test]
    fn test_parse_stays_below_producer() {
        let (mut graph, mut ctx, root) = setup();
        let calc = graph
            .add(
                DataflowNode::Calculate(CalculateNode::new("datum.b * 2", "b2")),
                Some(root),
            )
            .unwrap();
        let parse_b2 = graph.add(parse("b2"), Some(calc)).unwrap();
        output(&mut graph, &mut ctx, "main", parse_b2, true);

        assert_eq!(
            move_parse_up(&mut graph, &mut ctx).unwrap(),
            PassResult::Unchanged
        );
        assert_eq!(graph.parent(parse_b2).unwrap(), Some(calc));
    }

    #[test]
    fn test_adjacent_parses_merge() {
        let (mut graph, mut ctx, root) = setup();
        let first = graph.add(parse("a"), Some(root)).unwrap();
        let second = graph.add(parse("b"), Some(first)).unwrap();
        output(&mut graph, &mut ctx, "main", second, true);

        move_parse_up(&mut graph, &mut ctx).unwrap();
        assert!(!graph.contains(second));
        let DataflowNode::Parse(merged) = graph.node(first).unwrap() else {
            panic!("expected parse")
        };
        assert_eq!(merged.parse().len(), 2);
    }

    #[test]
    fn test_duplicate_time_unit_removed() {
        let (mut graph, mut ctx, root) = setup();
        let outer = graph
            .add(time_unit("d", "year", &mut ctx), Some(root))
            .unwrap();
        let inner = graph
            .add(time_unit("d", "year", &mut ctx), Some(outer))
            .unwrap();
        let main = output(&mut graph, &mut ctx, "main", inner, true);

        assert_eq!(
            remove_duplicate_time_units(&mut graph, &mut ctx).unwrap(),
            PassResult::Changed
        );
        assert!(!graph.contains(inner));
        assert_eq!(graph.parent(main).unwrap(), Some(outer));
    }

    #[test]
    fn test_identical_siblings_merge() {
        let (mut graph, mut ctx, root) = setup();
        let first = graph
            .add(
                DataflowNode::Calculate(CalculateNode::new("1", "one")),
                Some(root),
            )
            .unwrap();
        let second = graph
            .add(
                DataflowNode::Calculate(CalculateNode::new("1", "one")),
                Some(root),
            )
            .unwrap();
        let different = graph
            .add(
                DataflowNode::Calculate(CalculateNode::new("2", "two")),
                Some(root),
            )
            .unwrap();
        let a = output(&mut graph, &mut ctx, "a", first, true);
        let b = output(&mut graph, &mut ctx, "b", second, true);
        output(&mut graph, &mut ctx, "c", different, true);

        merge_siblings(&mut graph, &mut ctx).unwrap();
        assert!(!graph.contains(second));
        assert_eq!(graph.children(root).unwrap(), &[first, different]);
        assert_eq!(graph.children(first).unwrap(), &[a, b]);
    }
}
