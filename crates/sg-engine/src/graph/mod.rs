//! Operation graph and node registry
//!
//! The [`Graph`] is a hash-consing table: every node is registered under its
//! canonical descriptor and a request whose descriptor already exists gets
//! the existing handle back. Operands must be live handles when a consumer
//! is created, so the graph is acyclic by construction.

mod node;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{DMat4, DVec3};
use parking_lot::Mutex;

use crate::descriptor::compute_descriptor;
use crate::kernel::FlushAxis;
use crate::operation::{ConstructionResult, Operation};

pub use node::{FAILURE_KEY, Node, NodeHandle, NodeId, NodeState};

/// Registry of live nodes keyed by descriptor
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Mutex<HashMap<String, NodeHandle>>,
    next_id: AtomicU64,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    /// Whether no node is registered
    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }

    /// Validate `op` and return the node for it, creating one if needed
    pub fn add(&self, op: Operation, mut operands: Vec<NodeHandle>) -> ConstructionResult<NodeHandle> {
        op.validate(operands.len())?;
        if op.is_commutative() {
            operands.sort_by(|a, b| a.descriptor().cmp(b.descriptor()));
        }

        let operand_descriptors: Vec<&str> = operands.iter().map(|o| o.descriptor()).collect();
        let descriptor = compute_descriptor(&op, &operand_descriptors);
        let key = descriptor.clone();
        Ok(self.register(key, move |id| Node::new(id, op, operands, descriptor)))
    }

    /// Return the node registered under `descriptor`, or insert `make_node`'s
    pub fn register(&self, descriptor: String, make_node: impl FnOnce(NodeId) -> Node) -> NodeHandle {
        let mut nodes = self.nodes.lock();
        if let Some(existing) = nodes.get(&descriptor) {
            return existing.clone();
        }
        let id = NodeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let node = Arc::new(make_node(id));
        tracing::trace!(node = %id, descriptor = %descriptor, "Registered node");
        nodes.insert(descriptor, node.clone());
        node
    }

    /// Look up a node by descriptor
    pub fn get(&self, descriptor: &str) -> Option<NodeHandle> {
        self.nodes.lock().get(descriptor).cloned()
    }

    /// Whether this exact node is registered
    pub fn contains(&self, node: &NodeHandle) -> bool {
        self.nodes
            .lock()
            .get(node.descriptor())
            .is_some_and(|n| Arc::ptr_eq(n, node))
    }

    /// Snapshot of all registered nodes in creation order
    pub fn nodes(&self) -> Vec<NodeHandle> {
        let mut nodes: Vec<_> = self.nodes.lock().values().cloned().collect();
        nodes.sort_by_key(|n| n.id());
        nodes
    }

    /// Remove nodes that `outputs` do not reach and no one else holds;
    /// returns how many
    ///
    /// A node held outside the registry (by the caller or by a live
    /// consumer) stays registered so that requesting it again resolves to
    /// the same node.
    pub fn retain_reachable(&self, outputs: &[NodeHandle]) -> usize {
        let reachable = reachable_ids(outputs);
        let mut nodes = self.nodes.lock();
        let before = nodes.len();
        loop {
            let count = nodes.len();
            nodes.retain(|_, node| reachable.contains(&node.id()) || Arc::strong_count(node) > 1);
            if nodes.len() == count {
                break;
            }
        }
        before - nodes.len()
    }

    /// Drop nodes that nothing outside the registry still references
    pub fn collect_garbage(&self) -> usize {
        let mut nodes = self.nodes.lock();
        let before = nodes.len();
        loop {
            let count = nodes.len();
            nodes.retain(|_, node| Arc::strong_count(node) > 1);
            if nodes.len() == count {
                break;
            }
        }
        before - nodes.len()
    }

    // ============== Builders ==============

    /// Axis-aligned box, optionally centered on the origin
    pub fn cube(&self, size: [f64; 3], center: bool) -> ConstructionResult<NodeHandle> {
        self.add(Operation::Cube { size, center }, vec![])
    }

    /// Sphere with the default segment counts
    pub fn sphere(&self, radius: f64) -> ConstructionResult<NodeHandle> {
        self.add(Operation::sphere(radius), vec![])
    }

    /// Cylinder or cone along Z with bottom radius `r1` and top radius `r2`
    pub fn cylinder(&self, height: f64, r1: f64, r2: f64, center: bool) -> ConstructionResult<NodeHandle> {
        let segments = sg_core::constants::CYLINDER_SEGMENTS;
        self.add(
            Operation::Cylinder {
                height,
                r1,
                r2,
                segments,
                center,
            },
            vec![],
        )
    }

    /// Regular planar polygon
    pub fn polygon(&self, sides: u32, radius: f64) -> ConstructionResult<NodeHandle> {
        self.add(Operation::Polygon { sides, radius }, vec![])
    }

    /// Polyhedron from explicit points and faces
    pub fn polyhedron(&self, points: Vec<[f64; 3]>, faces: Vec<Vec<usize>>) -> ConstructionResult<NodeHandle> {
        self.add(Operation::Polyhedron { points, faces }, vec![])
    }

    /// Opaque backend payload
    pub fn native(&self, tag: impl Into<String>, bytes: Vec<u8>) -> ConstructionResult<NodeHandle> {
        self.add(
            Operation::Native {
                tag: tag.into(),
                bytes: Arc::new(bytes),
            },
            vec![],
        )
    }

    /// Apply an affine matrix
    pub fn transform(&self, matrix: DMat4, operand: &NodeHandle) -> ConstructionResult<NodeHandle> {
        self.add(Operation::Transform { matrix }, vec![operand.clone()])
    }

    /// Move by `offset`
    pub fn translate(&self, offset: DVec3, operand: &NodeHandle) -> ConstructionResult<NodeHandle> {
        self.add(Operation::translate(offset), vec![operand.clone()])
    }

    /// Rotate about X, then Y, then Z (degrees)
    pub fn rotate(&self, degrees: DVec3, operand: &NodeHandle) -> ConstructionResult<NodeHandle> {
        self.add(Operation::rotate(degrees), vec![operand.clone()])
    }

    /// Scale per axis
    pub fn scale(&self, factors: DVec3, operand: &NodeHandle) -> ConstructionResult<NodeHandle> {
        self.add(Operation::scale(factors), vec![operand.clone()])
    }

    /// Reflect through the plane with normal `normal`
    pub fn mirror(&self, normal: DVec3, operand: &NodeHandle) -> ConstructionResult<NodeHandle> {
        self.add(Operation::mirror(normal), vec![operand.clone()])
    }

    /// Align to bounding-box edges per axis
    pub fn flush(&self, axes: [FlushAxis; 3], operand: &NodeHandle) -> ConstructionResult<NodeHandle> {
        self.add(Operation::Flush { axes }, vec![operand.clone()])
    }

    /// Union of all operands
    pub fn union(&self, operands: &[NodeHandle]) -> ConstructionResult<NodeHandle> {
        self.add(Operation::Union, operands.to_vec())
    }

    /// First operand minus the rest
    pub fn difference(&self, operands: &[NodeHandle]) -> ConstructionResult<NodeHandle> {
        self.add(Operation::Difference, operands.to_vec())
    }

    /// Intersection of all operands
    pub fn intersection(&self, operands: &[NodeHandle]) -> ConstructionResult<NodeHandle> {
        self.add(Operation::Intersection, operands.to_vec())
    }

    /// Fan-subdivide every face `levels` times
    pub fn subdivide(&self, levels: u32, operand: &NodeHandle) -> ConstructionResult<NodeHandle> {
        self.add(Operation::Subdivide { levels }, vec![operand.clone()])
    }
}

/// Ids of every node reachable from `outputs` over operand edges
pub fn reachable_ids(outputs: &[NodeHandle]) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut stack: Vec<&NodeHandle> = outputs.iter().collect();
    while let Some(node) = stack.pop() {
        if seen.insert(node.id()) {
            stack.extend(node.operands());
        }
    }
    seen
}
