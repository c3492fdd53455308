//! Operation Graph Engine
//!
//! This crate provides:
//! - Operation kinds with validation, canonical descriptors and fold rules
//! - A hash-consing node registry (at most one node per construction)
//! - Compute backend traits and a reference mesh backend
//! - A rewrite engine (folding + dead-node elimination)
//! - A scheduler evaluating nodes sequentially or on a worker pool
//! - A compressed on-disk artifact cache
//! - Per-node diagnostics with configurable warning escalation

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod engine;
pub mod graph;
pub mod kernel;
pub mod operation;
pub mod report;
pub mod rewrite;
pub mod scheduler;

// Re-exports for convenience
pub use cache::{CacheStats, DiskCache, PersistenceError};
pub use config::{CacheConfig, ConfigError, EngineConfig, RewriteConfig};
pub use descriptor::compute_descriptor;
pub use diagnostics::{
    Diagnostics, Message, Severity, WarningCategory, WarningGroup, WarningPolicy, format_message,
};
pub use engine::Engine;
pub use graph::{FAILURE_KEY, Graph, Node, NodeHandle, NodeId, NodeState};
pub use kernel::{
    BooleanType, CadError, CadResult, ComputeBackend, FlushAxis, MeshBackend, NullBackend,
    default_backend,
};
pub use operation::{ConstructionError, ConstructionResult, Operation};
pub use report::{Outcome, OutputReport, RunReport};
pub use rewrite::{RewriteEngine, RewriteStats};
pub use scheduler::{Evaluation, Evaluator};
