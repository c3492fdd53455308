//! Graph rewriting
//!
//! Each pass rebuilds the subgraph reachable from the requested outputs
//! bottom-up, letting every node absorb at most one operand through
//! [`Operation::fold`]. Nodes are immutable, so a fold registers a new node
//! and the old one is left for dead-node elimination.
//!
//! A fold is only legal when the absorbed operand has exactly one consumer.
//! Requested outputs count as consumers, so they are never absorbed.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::RewriteConfig;
use crate::graph::{Graph, NodeHandle, NodeId, NodeState};
use crate::operation::{Arity, Operation};

/// Summary of one rewrite run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    pub passes: u32,
    pub folds: usize,
    pub eliminated: usize,
}

/// Applies fold passes and dead-node elimination
pub struct RewriteEngine<'a> {
    graph: &'a Graph,
    config: &'a RewriteConfig,
}

struct Pass {
    consumers: HashMap<NodeId, usize>,
    memo: HashMap<NodeId, NodeHandle>,
    folds: usize,
}

impl<'a> RewriteEngine<'a> {
    /// Create a rewrite engine over `graph`
    pub fn new(graph: &'a Graph, config: &'a RewriteConfig) -> Self {
        Self { graph, config }
    }

    /// Rewrite the graph for `outputs`, returning the replacement outputs
    ///
    /// The result is positionally aligned with `outputs`.
    pub fn run(&self, outputs: &[NodeHandle]) -> (Vec<NodeHandle>, RewriteStats) {
        let mut stats = RewriteStats::default();
        if self.config.max_passes == 0 {
            return (outputs.to_vec(), stats);
        }

        let mut current = outputs.to_vec();
        while stats.passes < self.config.max_passes {
            stats.passes += 1;
            let mut pass = Pass {
                consumers: consumer_counts(&current),
                memo: HashMap::new(),
                folds: 0,
            };
            current = current.iter().map(|o| self.rebuild(o, &mut pass)).collect();
            trace!(pass = stats.passes, folds = pass.folds, "Rewrite pass finished");
            if pass.folds == 0 {
                break;
            }
            stats.folds += pass.folds;
        }

        stats.eliminated = self.graph.retain_reachable(&current);
        debug!(
            passes = stats.passes,
            folds = stats.folds,
            eliminated = stats.eliminated,
            "Rewrite finished"
        );
        (current, stats)
    }

    fn rebuild(&self, node: &NodeHandle, pass: &mut Pass) -> NodeHandle {
        if let Some(done) = pass.memo.get(&node.id()) {
            return done.clone();
        }
        if node.state() != NodeState::Unevaluated {
            pass.memo.insert(node.id(), node.clone());
            return node.clone();
        }

        let operands: Vec<NodeHandle> = node
            .operands()
            .iter()
            .map(|o| self.rebuild(o, pass))
            .collect();
        let changed = operands
            .iter()
            .zip(node.operands())
            .any(|(new, old)| !Arc::ptr_eq(new, old));

        let folded = self.try_fold(node, &operands, pass);
        let result = match folded {
            Some(folded) => {
                pass.folds += 1;
                folded
            }
            None if changed => self
                .graph
                .add(node.operation().clone(), operands)
                .unwrap_or_else(|e| {
                    debug!("Keeping {} unchanged: {}", node.id(), e);
                    node.clone()
                }),
            None => node.clone(),
        };

        pass.memo.insert(node.id(), result.clone());
        result
    }

    fn try_fold(&self, node: &NodeHandle, operands: &[NodeHandle], pass: &Pass) -> Option<NodeHandle> {
        if !can_fold(node.operation(), self.config) {
            return None;
        }
        for (index, (operand, original)) in operands.iter().zip(node.operands()).enumerate() {
            if !self.is_sole_consumer(operand, original, pass) {
                continue;
            }
            let Some(op) = node.operation().fold(index, operand.operation(), self.config) else {
                continue;
            };

            let spliced = splice(operands, index, operand.operands());
            match self.graph.add(op, spliced) {
                Ok(folded) => {
                    trace!(
                        consumer = %node.id(),
                        operand = %operand.id(),
                        folded = %folded.id(),
                        "Folded operand"
                    );
                    return Some(folded);
                }
                Err(e) => debug!("Fold of {} into {} rejected: {}", operand.id(), node.id(), e),
            }
        }
        None
    }

    fn is_sole_consumer(&self, operand: &NodeHandle, original: &NodeHandle, pass: &Pass) -> bool {
        let count = |n: &NodeHandle| pass.consumers.get(&n.id()).copied().unwrap_or(0);
        operand.state() == NodeState::Unevaluated
            && operand.operation().arity() != Arity::Nullary
            && count(original) == 1
            && count(operand) <= 1
    }
}

fn splice(operands: &[NodeHandle], index: usize, replacement: &[NodeHandle]) -> Vec<NodeHandle> {
    let mut spliced = Vec::with_capacity(operands.len() + replacement.len());
    spliced.extend_from_slice(&operands[..index]);
    spliced.extend_from_slice(replacement);
    spliced.extend_from_slice(&operands[index + 1..]);
    spliced
}

/// How many edges (plus output requests) point at each reachable node
pub fn consumer_counts(outputs: &[NodeHandle]) -> HashMap<NodeId, usize> {
    let mut counts: HashMap<NodeId, usize> = HashMap::new();
    let mut visited = std::collections::HashSet::new();
    let mut stack: Vec<&NodeHandle> = Vec::new();

    for output in outputs {
        *counts.entry(output.id()).or_default() += 1;
        stack.push(output);
    }
    while let Some(node) = stack.pop() {
        if !visited.insert(node.id()) {
            continue;
        }
        for operand in node.operands() {
            *counts.entry(operand.id()).or_default() += 1;
            stack.push(operand);
        }
    }
    counts
}

/// Whether any fold family is enabled for this operation
pub fn can_fold(op: &Operation, config: &RewriteConfig) -> bool {
    match op {
        Operation::Transform { .. } => config.fold_transforms,
        Operation::Flush { .. } => config.fold_flush,
        Operation::Union | Operation::Difference | Operation::Intersection => config.fold_booleans,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::FlushAxis;
    use glam::DVec3;

    #[test]
    fn test_zero_passes_is_identity() {
        let graph = Graph::new();
        let a = graph.cube([1.0, 1.0, 1.0], false).unwrap();
        let b = graph.translate(DVec3::X, &a).unwrap();
        let c = graph.translate(DVec3::Y, &b).unwrap();

        let config = RewriteConfig::disabled();
        let (outputs, stats) = RewriteEngine::new(&graph, &config).run(&[c.clone()]);
        assert!(Arc::ptr_eq(&outputs[0], &c));
        assert_eq!(stats, RewriteStats::default());
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_transform_chain_collapses() {
        let graph = Graph::new();
        let a = graph.cube([1.0, 1.0, 1.0], false).unwrap();
        let d = {
            let b = graph.translate(DVec3::X, &a).unwrap();
            let c = graph.translate(DVec3::Y, &b).unwrap();
            graph.translate(DVec3::Z, &c).unwrap()
        };

        let config = RewriteConfig::default();
        let (outputs, stats) = RewriteEngine::new(&graph, &config).run(&[d.clone()]);
        let out = &outputs[0];
        assert_eq!(out.operands().len(), 1);
        assert!(Arc::ptr_eq(&out.operands()[0], &a));
        let Operation::Transform { matrix } = out.operation() else {
            panic!("expected a transform");
        };
        assert_eq!(matrix.transform_point3(DVec3::ZERO), DVec3::ONE);
        assert!(stats.folds >= 2);
        // the original chain is still held through `d`
        assert!(graph.contains(&d));
        assert!(graph.contains(&d.operands()[0]));
        assert!(graph.contains(out));
    }

    #[test]
    fn test_shared_operand_is_not_absorbed() {
        let graph = Graph::new();
        let a = graph.cube([1.0, 1.0, 1.0], false).unwrap();
        let b = graph.translate(DVec3::X, &a).unwrap();
        let c = graph.translate(DVec3::Y, &b).unwrap();
        let other = graph.scale(DVec3::splat(2.0), &b).unwrap();

        let config = RewriteConfig::default();
        let (outputs, stats) = RewriteEngine::new(&graph, &config).run(&[c.clone(), other.clone()]);
        assert!(Arc::ptr_eq(&outputs[0], &c));
        assert!(Arc::ptr_eq(&outputs[1], &other));
        assert_eq!(stats.folds, 0);
    }

    #[test]
    fn test_requested_operand_is_not_absorbed() {
        let graph = Graph::new();
        let a = graph.cube([1.0, 1.0, 1.0], false).unwrap();
        let b = graph.translate(DVec3::X, &a).unwrap();
        let c = graph.translate(DVec3::Y, &b).unwrap();

        let config = RewriteConfig::default();
        let (outputs, _) = RewriteEngine::new(&graph, &config).run(&[c.clone(), b.clone()]);
        assert!(Arc::ptr_eq(&outputs[0], &c));
        assert!(Arc::ptr_eq(&outputs[1], &b));
    }

    #[test]
    fn test_nested_unions_flatten() {
        let graph = Graph::new();
        let a = graph.cube([1.0, 1.0, 1.0], false).unwrap();
        let b = graph.sphere(1.0).unwrap();
        let c = graph.cylinder(1.0, 1.0, 1.0, false).unwrap();
        let inner = graph.union(&[a.clone(), b.clone()]).unwrap();
        let outer = graph.union(&[inner, c.clone()]).unwrap();

        let config = RewriteConfig::default();
        let (outputs, _) = RewriteEngine::new(&graph, &config).run(&[outer]);
        let flat = graph.union(&[a, b, c]).unwrap();
        assert!(Arc::ptr_eq(&outputs[0], &flat));
    }

    #[test]
    fn test_flush_coefficients_merge() {
        let graph = Graph::new();
        let a = graph.cube([1.0, 1.0, 1.0], false).unwrap();
        let low = [FlushAxis::LOW, FlushAxis::NONE, FlushAxis::NONE];
        let center = [FlushAxis::NONE, FlushAxis::CENTER, FlushAxis::NONE];
        let f1 = graph.flush(low, &a).unwrap();
        let f2 = graph.flush(center, &f1).unwrap();

        let config = RewriteConfig::default();
        let (outputs, _) = RewriteEngine::new(&graph, &config).run(&[f2]);
        let Operation::Flush { axes } = outputs[0].operation() else {
            panic!("expected a flush");
        };
        assert_eq!(axes, &[FlushAxis::LOW, FlushAxis::CENTER, FlushAxis::NONE]);
    }

    #[test]
    fn test_disabled_family_is_skipped() {
        let graph = Graph::new();
        let a = graph.cube([1.0, 1.0, 1.0], false).unwrap();
        let b = graph.translate(DVec3::X, &a).unwrap();
        let c = graph.translate(DVec3::Y, &b).unwrap();

        let config = RewriteConfig {
            fold_transforms: false,
            ..RewriteConfig::default()
        };
        assert!(!can_fold(c.operation(), &config));
        let (outputs, stats) = RewriteEngine::new(&graph, &config).run(&[c.clone()]);
        assert!(Arc::ptr_eq(&outputs[0], &c));
        assert_eq!(stats.passes, 1);
    }

    #[test]
    fn test_consumer_counts_include_outputs() {
        let graph = Graph::new();
        let a = graph.cube([1.0, 1.0, 1.0], false).unwrap();
        let u = graph.union(&[a.clone()]).unwrap();
        let d = graph.difference(&[a.clone(), u.clone()]).unwrap();
        let counts = consumer_counts(&[d.clone(), a.clone()]);
        assert_eq!(counts[&a.id()], 3);
        assert_eq!(counts[&u.id()], 1);
        assert_eq!(counts[&d.id()], 1);
    }
}
