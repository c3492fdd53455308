//! Run reports
//!
//! What the caller gets back from [`crate::Engine::evaluate`]: per requested
//! output either a value or a failure with the message log of everything it
//! depended on.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use sg_core::Value;

use crate::cache::CacheStats;
use crate::diagnostics::Message;
use crate::graph::{NodeHandle, NodeId, NodeState};
use crate::rewrite::RewriteStats;
use crate::scheduler::Evaluation;

/// Terminal state of a requested output
#[derive(Debug, Clone)]
pub enum Outcome {
    Done(Arc<Value>),
    Failed,
    /// Left unevaluated because the run was aborted
    NotEvaluated,
}

impl Outcome {
    /// The value, when the output is done
    pub fn value(&self) -> Option<&Arc<Value>> {
        match self {
            Outcome::Done(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the output produced a value
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    fn status(&self) -> &'static str {
        match self {
            Outcome::Done(_) => "done",
            Outcome::Failed => "failed",
            Outcome::NotEvaluated => "not-evaluated",
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Outcome", 2)?;
        state.serialize_field("status", self.status())?;
        state.serialize_field("value", &self.value().map(|v| v.to_string()))?;
        state.end()
    }
}

/// Result for one requested output
#[derive(Debug, Clone, Serialize)]
pub struct OutputReport {
    /// The node the caller asked for
    pub requested: NodeId,
    /// The node actually evaluated (differs after rewriting)
    pub node: NodeId,
    pub descriptor: String,
    pub outcome: Outcome,
    /// The `failure` annotation, if set
    pub failure: Option<String>,
    /// Messages of the output and everything it depends on, by node id
    pub messages: Vec<(NodeId, Message)>,
}

impl OutputReport {
    fn new(requested: &NodeHandle, node: &NodeHandle) -> Self {
        let outcome = match (node.state(), node.value()) {
            (NodeState::Done, Some(value)) => Outcome::Done(value),
            (NodeState::Failed, _) => Outcome::Failed,
            _ => Outcome::NotEvaluated,
        };
        Self {
            requested: requested.id(),
            node: node.id(),
            descriptor: node.descriptor().to_string(),
            outcome,
            failure: node.failure(),
            messages: subgraph_messages(node),
        }
    }
}

fn subgraph_messages(root: &NodeHandle) -> Vec<(NodeId, Message)> {
    let mut nodes = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if seen.insert(node.id()) {
            nodes.push(node);
            stack.extend(node.operands());
        }
    }
    nodes.sort_by_key(|n| n.id());
    nodes
        .into_iter()
        .flat_map(|n| n.messages().into_iter().map(move |m| (n.id(), m)))
        .collect()
}

/// Summary of one engine run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outputs: Vec<OutputReport>,
    /// Nodes whose compute step ran, in dispatch order
    pub evaluated: Vec<NodeId>,
    /// Nodes restored from the disk cache
    pub restored: Vec<NodeId>,
    pub aborted: bool,
    pub errors: usize,
    pub warnings: usize,
    pub rewrite: RewriteStats,
    pub cache: Option<CacheStats>,
}

impl RunReport {
    pub(crate) fn new(
        requested: &[NodeHandle],
        evaluated: &[NodeHandle],
        evaluation: Evaluation,
        rewrite: RewriteStats,
        cache: Option<CacheStats>,
    ) -> Self {
        let outputs = requested
            .iter()
            .zip(evaluated)
            .map(|(r, n)| OutputReport::new(r, n))
            .collect();
        Self {
            outputs,
            evaluated: evaluation.dispatched,
            restored: evaluation.restored,
            aborted: evaluation.aborted,
            errors: evaluation.errors,
            warnings: evaluation.warnings,
            rewrite,
            cache,
        }
    }

    /// True when every output is done and the run was not aborted
    pub fn success(&self) -> bool {
        !self.aborted && self.outputs.iter().all(|o| o.outcome.is_done())
    }

    /// Outputs that did not complete
    pub fn failed(&self) -> impl Iterator<Item = &OutputReport> {
        self.outputs.iter().filter(|o| !o.outcome.is_done())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, output) in self.outputs.iter().enumerate() {
            match &output.outcome {
                Outcome::Done(value) => writeln!(f, "output {}: {} {}", i, output.node, value)?,
                Outcome::Failed => writeln!(
                    f,
                    "output {}: {} FAILED ({})",
                    i,
                    output.node,
                    output.failure.as_deref().unwrap_or("unknown")
                )?,
                Outcome::NotEvaluated => {
                    writeln!(f, "output {}: {} not evaluated", i, output.node)?
                }
            }
            if !output.outcome.is_done() {
                for (node, message) in &output.messages {
                    writeln!(f, "    {node} {message}")?;
                }
            }
        }

        write!(
            f,
            "{} evaluated, {} restored, {} error(s), {} warning(s)",
            self.evaluated.len(),
            self.restored.len(),
            self.errors,
            self.warnings
        )?;
        if self.rewrite.folds > 0 || self.rewrite.eliminated > 0 {
            write!(
                f,
                ", {} fold(s), {} eliminated",
                self.rewrite.folds, self.rewrite.eliminated
            )?;
        }
        if self.aborted {
            write!(f, ", aborted")?;
        }
        Ok(())
    }
}
