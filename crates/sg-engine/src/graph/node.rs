//! Operation nodes

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde::Serialize;
use sg_core::Value;

use crate::diagnostics::Message;
use crate::operation::Operation;

/// Annotation key marking a failed node
pub const FAILURE_KEY: &str = "failure";

/// Stable node identity (registry slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Evaluation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum NodeState {
    Unevaluated = 0,
    Evaluating = 1,
    Done = 2,
    Failed = 3,
}

impl NodeState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => NodeState::Unevaluated,
            1 => NodeState::Evaluating,
            2 => NodeState::Done,
            _ => NodeState::Failed,
        }
    }

    /// Whether the state can no longer change during a run
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Done | NodeState::Failed)
    }
}

/// Shared handle to a node
pub type NodeHandle = Arc<Node>;

/// A vertex of the operation graph
///
/// Everything but `state`, `value`, `messages` and `annotations` is fixed at
/// construction. `value` is written once, before `state` is published as
/// `Done` with release ordering; readers that observe `Done` with acquire
/// ordering see the value.
pub struct Node {
    id: NodeId,
    operation: Operation,
    operands: Vec<NodeHandle>,
    descriptor: String,
    state: AtomicU8,
    value: OnceLock<Arc<Value>>,
    messages: Mutex<Vec<Message>>,
    annotations: Mutex<BTreeMap<String, String>>,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        operation: Operation,
        operands: Vec<NodeHandle>,
        descriptor: String,
    ) -> Self {
        Self {
            id,
            operation,
            operands,
            descriptor,
            state: AtomicU8::new(NodeState::Unevaluated as u8),
            value: OnceLock::new(),
            messages: Mutex::new(Vec::new()),
            annotations: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registry slot of this node
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The operation this node applies
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Operand handles in canonical order
    pub fn operands(&self) -> &[NodeHandle] {
        &self.operands
    }

    /// Canonical descriptor (the registry key)
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Current evaluation state
    pub fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The computed value, once the node is `Done`
    pub fn value(&self) -> Option<Arc<Value>> {
        if self.state() == NodeState::Done {
            self.value.get().cloned()
        } else {
            None
        }
    }

    fn transition(&self, from: NodeState, to: NodeState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim the node for evaluation; false if someone else already has
    pub(crate) fn try_begin(&self) -> bool {
        self.transition(NodeState::Unevaluated, NodeState::Evaluating)
    }

    /// Publish the computed value
    pub(crate) fn complete(&self, value: Arc<Value>) -> bool {
        if self.value.set(value).is_err() {
            return false;
        }
        self.transition(NodeState::Evaluating, NodeState::Done)
    }

    pub(crate) fn fail(&self, reason: impl Into<String>) -> bool {
        let failed = self.transition(NodeState::Evaluating, NodeState::Failed);
        if failed {
            self.annotate(FAILURE_KEY, reason);
        }
        failed
    }

    /// Restore a value loaded from the disk cache without evaluating
    pub(crate) fn restore(&self, value: Arc<Value>) -> bool {
        self.try_begin() && self.complete(value)
    }

    /// Mark failed because an operand failed, skipping the compute step
    pub(crate) fn fail_by_dependency(&self, operand: &Node) -> bool {
        self.try_begin()
            && self.fail(format!("dependency {} failed", operand.id()))
    }

    /// First operand that ended `Failed`
    pub fn failed_operand(&self) -> Option<&NodeHandle> {
        self.operands
            .iter()
            .find(|o| o.state() == NodeState::Failed)
    }

    pub(crate) fn push_message(&self, message: Message) {
        self.messages.lock().push(message);
    }

    /// Snapshot of the message log
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub(crate) fn annotate(&self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.lock().insert(key.into(), value.into());
    }

    /// Look up one annotation
    pub fn annotation(&self, key: &str) -> Option<String> {
        self.annotations.lock().get(key).cloned()
    }

    /// Snapshot of all annotations
    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.annotations.lock().clone()
    }

    /// The `failure` annotation, if any
    pub fn failure(&self) -> Option<String> {
        self.annotation(FAILURE_KEY)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("state", &self.state())
            .field("operands", &self.operands.iter().map(|o| o.id).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_core::Polyhedron;

    fn leaf(id: u64) -> Node {
        Node::new(
            NodeId(id),
            Operation::cube([1.0, 1.0, 1.0]),
            vec![],
            format!("leaf{id}"),
        )
    }

    #[test]
    fn test_state_is_monotonic() {
        let node = leaf(0);
        assert_eq!(node.state(), NodeState::Unevaluated);
        assert!(node.try_begin());
        assert!(!node.try_begin());
        assert!(node.complete(Arc::new(Polyhedron::default().into())));
        assert_eq!(node.state(), NodeState::Done);
        assert!(!node.fail("late"));
        assert!(!node.try_begin());
        assert!(node.failure().is_none());
    }

    #[test]
    fn test_value_hidden_until_done() {
        let node = leaf(1);
        assert!(node.value().is_none());
        assert!(node.try_begin());
        assert!(node.value().is_none());
        assert!(node.complete(Arc::new(Polyhedron::default().into())));
        assert!(node.value().is_some());
    }

    #[test]
    fn test_failure_by_dependency_annotates() {
        let node = leaf(2);
        let operand = leaf(3);
        assert!(node.fail_by_dependency(&operand));
        assert_eq!(node.state(), NodeState::Failed);
        assert_eq!(node.failure().as_deref(), Some("dependency #3 failed"));
    }
}
