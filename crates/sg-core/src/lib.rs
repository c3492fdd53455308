//! SolidGraph geometry core
//!
//! This crate provides:
//! - Exact-rational polyhedra and opaque native payloads (the values nodes compute)
//! - Primitive solid generators
//! - The persistence artifact encoding (point/face and native)
//! - Scoped zstd stream wrappers used by the on-disk cache

pub mod artifact;
pub mod compress;
pub mod constants;
pub mod geometry;
pub mod primitive;

pub use artifact::{ArtifactError, read_artifact, write_artifact};
pub use compress::{CompressedReader, CompressedWriter, read_compressed, write_compressed};
pub use geometry::{
    GeometryError, NativePayload, Point3, Polyhedron, Rational, Value, point_from_f64,
    rational_from_f64, rational_to_f64,
};
