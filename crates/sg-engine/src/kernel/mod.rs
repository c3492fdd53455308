//! Compute backends
//!
//! The engine never performs geometry itself. Every operation kind is
//! dispatched to a [`ComputeBackend`], a pure and synchronous collaborator.

mod mesh;
mod traits;

pub use mesh::MeshBackend;
pub use traits::{BooleanType, CadError, CadResult, ComputeBackend, FlushAxis, NullBackend};

/// Get the default compute backend
pub fn default_backend() -> Box<dyn ComputeBackend> {
    Box::new(MeshBackend::new())
}
