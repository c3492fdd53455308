//! Compute backend trait definitions
//!
//! These traits define the interface that every geometry backend must
//! implement.

use std::sync::Arc;

use glam::DMat4;
use serde::{Deserialize, Serialize};
use sg_core::{GeometryError, Value};
use thiserror::Error;

/// Error type for backend computations
#[derive(Debug, Clone, Error)]
pub enum CadError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Boolean operation failed: {0}")]
    BooleanFailed(String),

    #[error("Backend not available: {0}")]
    KernelNotAvailable(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Result type for backend computations
pub type CadResult<T> = Result<T, CadError>;

/// Boolean operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BooleanType {
    /// Union (add)
    Union,
    /// Difference (cut every later operand from the first)
    Difference,
    /// Intersection (common)
    Intersection,
}

/// Bias coefficients for flushing one axis against the bounding box
///
/// The shape is translated along the axis by `-(min * lo + max * hi)` where
/// `lo`/`hi` are the bounding box extents. `(1, 0)` puts the low edge on the
/// origin, `(0, 1)` the high edge, `(0.5, 0.5)` the center and `(0, 0)`
/// leaves the axis alone.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FlushAxis {
    pub min: f64,
    pub max: f64,
}

impl FlushAxis {
    /// Leave the axis untouched
    pub const NONE: Self = Self { min: 0.0, max: 0.0 };
    /// Low edge on the origin
    pub const LOW: Self = Self { min: 1.0, max: 0.0 };
    /// High edge on the origin
    pub const HIGH: Self = Self { min: 0.0, max: 1.0 };
    /// Center on the origin
    pub const CENTER: Self = Self { min: 0.5, max: 0.5 };

    /// Create a flush axis from its bias coefficients
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Coefficients equivalent to applying `self` and then `next`
    pub fn then(self, next: FlushAxis) -> FlushAxis {
        let carry = 1.0 - next.min - next.max;
        FlushAxis {
            min: next.min + carry * self.min,
            max: next.max + carry * self.max,
        }
    }

    /// Whether this axis leaves the value in place
    pub fn is_identity(&self) -> bool {
        self.min == 0.0 && self.max == 0.0
    }
}

/// The compute backend trait
///
/// Implementations provide the actual geometry for each operation family.
/// Every method must be pure: identical inputs yield structurally equal
/// outputs, and no state may leak between calls.
pub trait ComputeBackend: Send + Sync {
    /// Get the name of this backend
    fn name(&self) -> &str;

    /// Check if the backend is available
    fn is_available(&self) -> bool;

    /// Create a box primitive
    fn create_box(&self, size: [f64; 3], center: bool) -> CadResult<Value>;

    /// Create a UV sphere primitive centered on the origin
    fn create_sphere(&self, radius: f64, lat_segments: u32, lon_segments: u32)
    -> CadResult<Value>;

    /// Create a cylinder or cone along Z
    ///
    /// # Arguments
    /// * `height` - Extent along Z
    /// * `r1` - Bottom radius
    /// * `r2` - Top radius (0 = cone)
    /// * `segments` - Facets around the axis
    /// * `center` - Center along Z instead of starting at z = 0
    fn create_cylinder(
        &self,
        height: f64,
        r1: f64,
        r2: f64,
        segments: u32,
        center: bool,
    ) -> CadResult<Value>;

    /// Create a regular planar polygon
    fn create_polygon(&self, sides: u32, radius: f64) -> CadResult<Value>;

    /// Create an explicit polyhedron
    fn create_polyhedron(&self, points: &[[f64; 3]], faces: &[Vec<usize>]) -> CadResult<Value>;

    /// Wrap an opaque payload produced elsewhere
    fn import_native(&self, tag: &str, bytes: &[u8]) -> CadResult<Value>;

    /// Apply an affine transform
    fn transform(&self, value: &Value, matrix: &DMat4) -> CadResult<Value>;

    /// Flush against bounding box edges, one coefficient pair per axis
    fn flush(&self, value: &Value, axes: &[FlushAxis; 3]) -> CadResult<Value>;

    /// Perform an n-ary boolean operation
    fn boolean(&self, operands: &[Arc<Value>], op: BooleanType) -> CadResult<Value>;

    /// Subdivide faces `levels` times
    fn subdivide(&self, value: &Value, levels: u32) -> CadResult<Value>;
}

/// A null backend that always returns errors (used when no backend is available)
#[derive(Debug, Default)]
pub struct NullBackend;

impl NullBackend {
    fn unavailable<T>() -> CadResult<T> {
        Err(CadError::KernelNotAvailable(
            "No compute backend available".into(),
        ))
    }
}

impl ComputeBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn create_box(&self, _size: [f64; 3], _center: bool) -> CadResult<Value> {
        Self::unavailable()
    }

    fn create_sphere(&self, _radius: f64, _lat: u32, _lon: u32) -> CadResult<Value> {
        Self::unavailable()
    }

    fn create_cylinder(
        &self,
        _height: f64,
        _r1: f64,
        _r2: f64,
        _segments: u32,
        _center: bool,
    ) -> CadResult<Value> {
        Self::unavailable()
    }

    fn create_polygon(&self, _sides: u32, _radius: f64) -> CadResult<Value> {
        Self::unavailable()
    }

    fn create_polyhedron(&self, _points: &[[f64; 3]], _faces: &[Vec<usize>]) -> CadResult<Value> {
        Self::unavailable()
    }

    fn import_native(&self, _tag: &str, _bytes: &[u8]) -> CadResult<Value> {
        Self::unavailable()
    }

    fn transform(&self, _value: &Value, _matrix: &DMat4) -> CadResult<Value> {
        Self::unavailable()
    }

    fn flush(&self, _value: &Value, _axes: &[FlushAxis; 3]) -> CadResult<Value> {
        Self::unavailable()
    }

    fn boolean(&self, _operands: &[Arc<Value>], _op: BooleanType) -> CadResult<Value> {
        Self::unavailable()
    }

    fn subdivide(&self, _value: &Value, _levels: u32) -> CadResult<Value> {
        Self::unavailable()
    }
}
