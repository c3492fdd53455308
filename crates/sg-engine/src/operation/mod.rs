//! Operation kinds
//!
//! Every node in the graph carries one [`Operation`]: the closed set of
//! construction steps the engine knows how to describe, validate, execute
//! and fold.

mod params;

use std::sync::Arc;

use glam::DMat4;
use sg_core::constants::MIN_SEGMENTS;
use sg_core::{GeometryError, Polyhedron, Value};
use thiserror::Error;

use crate::config::RewriteConfig;
use crate::diagnostics::WarningCategory;
use crate::kernel::{BooleanType, CadResult, ComputeBackend, FlushAxis};

pub use params::fmt_f64;

/// Errors raised before a node is registered
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    #[error("{what} must be positive (got {value})")]
    NonPositive { what: &'static str, value: f64 },

    #[error("{0} must be finite")]
    NonFinite(&'static str),

    #[error("At least {min} segments required (got {found})")]
    TooFewSegments { min: u32, found: u32 },

    #[error("{op} expects {expected} operand(s), got {found}")]
    Arity {
        op: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("Transform matrix is not affine")]
    NonAffine,

    #[error("Invalid polyhedron: {0}")]
    InvalidPolyhedron(#[from] GeometryError),

    #[error("Invalid native tag '{0}'")]
    InvalidTag(String),

    #[error("{0}")]
    InvalidParameter(String),
}

/// Result type for node construction
pub type ConstructionResult<T> = Result<T, ConstructionError>;

/// How many operands an operation takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Nullary,
    Unary,
    AtLeastOne,
}

/// A construction step
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Rectangular box
    Cube { size: [f64; 3], center: bool },

    /// UV sphere centered on the origin
    Sphere {
        radius: f64,
        lat_segments: u32,
        lon_segments: u32,
    },

    /// Cylinder or cone along Z
    Cylinder {
        height: f64,
        r1: f64,
        r2: f64,
        segments: u32,
        center: bool,
    },

    /// Regular polygon on the XY plane
    Polygon { sides: u32, radius: f64 },

    /// Explicit vertices and faces
    Polyhedron {
        points: Vec<[f64; 3]>,
        faces: Vec<Vec<usize>>,
    },

    /// Opaque payload imported verbatim
    Native { tag: String, bytes: Arc<Vec<u8>> },

    /// Affine transform of the single operand
    Transform { matrix: DMat4 },

    /// Flush the single operand against its bounding box edges
    Flush { axes: [FlushAxis; 3] },

    /// Union of all operands
    Union,

    /// First operand minus all later ones
    Difference,

    /// Intersection of all operands
    Intersection,

    /// Fan-subdivide every face `levels` times
    Subdivide { levels: u32 },
}

impl Operation {
    /// Get the type name used in descriptors
    pub fn type_name(&self) -> &'static str {
        match self {
            Operation::Cube { .. } => "cube",
            Operation::Sphere { .. } => "sphere",
            Operation::Cylinder { .. } => "cylinder",
            Operation::Polygon { .. } => "polygon",
            Operation::Polyhedron { .. } => "polyhedron",
            Operation::Native { .. } => "native",
            Operation::Transform { .. } => "multmatrix",
            Operation::Flush { .. } => "flush",
            Operation::Union => "union",
            Operation::Difference => "difference",
            Operation::Intersection => "intersection",
            Operation::Subdivide { .. } => "subdivide",
        }
    }

    /// Get the operand arity
    pub fn arity(&self) -> Arity {
        match self {
            Operation::Cube { .. }
            | Operation::Sphere { .. }
            | Operation::Cylinder { .. }
            | Operation::Polygon { .. }
            | Operation::Polyhedron { .. }
            | Operation::Native { .. } => Arity::Nullary,
            Operation::Transform { .. } | Operation::Flush { .. } | Operation::Subdivide { .. } => {
                Arity::Unary
            }
            Operation::Union | Operation::Difference | Operation::Intersection => {
                Arity::AtLeastOne
            }
        }
    }

    /// Get the boolean type, if this is a boolean operation
    pub fn boolean_type(&self) -> Option<BooleanType> {
        match self {
            Operation::Union => Some(BooleanType::Union),
            Operation::Difference => Some(BooleanType::Difference),
            Operation::Intersection => Some(BooleanType::Intersection),
            _ => None,
        }
    }

    /// Whether operand order is irrelevant to the result
    pub fn is_commutative(&self) -> bool {
        matches!(self, Operation::Union | Operation::Intersection)
    }

    /// Check parameters and operand count
    pub fn validate(&self, operand_count: usize) -> ConstructionResult<()> {
        let expected = match self.arity() {
            Arity::Nullary if operand_count != 0 => Some("0"),
            Arity::Unary if operand_count != 1 => Some("exactly 1"),
            Arity::AtLeastOne if operand_count == 0 => Some("at least 1"),
            _ => None,
        };
        if let Some(expected) = expected {
            return Err(ConstructionError::Arity {
                op: self.type_name(),
                expected,
                found: operand_count,
            });
        }

        match self {
            Operation::Cube { size, .. } => {
                for (value, what) in size.iter().zip(["cube width", "cube depth", "cube height"]) {
                    positive(*value, what)?;
                }
            }
            Operation::Sphere {
                radius,
                lat_segments,
                lon_segments,
            } => {
                positive(*radius, "sphere radius")?;
                segments(*lat_segments, 2)?;
                segments(*lon_segments, MIN_SEGMENTS)?;
            }
            Operation::Cylinder {
                height,
                r1,
                r2,
                segments: count,
                ..
            } => {
                positive(*height, "cylinder height")?;
                non_negative(*r1, "cylinder bottom radius")?;
                non_negative(*r2, "cylinder top radius")?;
                if *r1 == 0.0 && *r2 == 0.0 {
                    return Err(ConstructionError::NonPositive {
                        what: "cylinder radius",
                        value: 0.0,
                    });
                }
                segments(*count, MIN_SEGMENTS)?;
            }
            Operation::Polygon { sides, radius } => {
                positive(*radius, "polygon radius")?;
                segments(*sides, MIN_SEGMENTS)?;
            }
            Operation::Polyhedron { points, faces } => {
                if points.iter().flatten().any(|c| !c.is_finite()) {
                    return Err(ConstructionError::NonFinite("polyhedron point"));
                }
                Polyhedron::new(vec![Default::default(); points.len()], faces.clone())
                    .validate()?;
            }
            Operation::Native { tag, .. } => {
                if tag.is_empty() || tag.contains(|c: char| c.is_whitespace() || c == '(') {
                    return Err(ConstructionError::InvalidTag(tag.clone()));
                }
            }
            Operation::Transform { matrix } => {
                if !matrix.is_finite() {
                    return Err(ConstructionError::NonFinite("transform matrix"));
                }
                if matrix.row(3) != glam::DVec4::W {
                    return Err(ConstructionError::NonAffine);
                }
            }
            Operation::Flush { axes } => {
                if axes.iter().any(|a| !a.min.is_finite() || !a.max.is_finite()) {
                    return Err(ConstructionError::NonFinite("flush coefficient"));
                }
            }
            Operation::Subdivide { levels } => {
                if *levels == 0 {
                    return Err(ConstructionError::InvalidParameter(
                        "subdivide needs at least one level".into(),
                    ));
                }
            }
            Operation::Union | Operation::Difference | Operation::Intersection => {}
        }
        Ok(())
    }

    /// Render parameters deterministically for the descriptor
    pub fn describe_params(&self) -> String {
        params::describe(self)
    }

    /// Parameter choices that are legal but likely unintended
    pub fn lint(&self) -> Vec<(WarningCategory, String)> {
        let mut warnings = Vec::new();
        match self {
            Operation::Sphere {
                lat_segments,
                lon_segments,
                ..
            } if u64::from(*lat_segments) * u64::from(*lon_segments) > 1 << 16 => {
                warnings.push((
                    WarningCategory::SuspiciousParameter,
                    format!(
                        "%D uses {} facets",
                        u64::from(*lat_segments) * u64::from(*lon_segments)
                    ),
                ));
            }
            Operation::Cylinder { segments, .. } | Operation::Polygon { sides: segments, .. }
                if *segments > 4096 =>
            {
                warnings.push((
                    WarningCategory::SuspiciousParameter,
                    format!("%D uses {segments} segments"),
                ));
            }
            Operation::Transform { matrix } if matrix.determinant().abs() < 1e-12 => {
                warnings.push((
                    WarningCategory::SuspiciousParameter,
                    "%D has a (nearly) singular matrix".to_string(),
                ));
            }
            Operation::Subdivide { levels } if *levels > 6 => {
                warnings.push((
                    WarningCategory::SuspiciousParameter,
                    format!("%D multiplies face count by 3^{levels} or more"),
                ));
            }
            _ => {}
        }
        warnings
    }

    /// Execute this operation on already computed operand values
    pub fn execute(&self, backend: &dyn ComputeBackend, operands: &[Arc<Value>]) -> CadResult<Value> {
        let single = || {
            operands.first().ok_or_else(|| {
                crate::kernel::CadError::OperationFailed(format!(
                    "{} is missing its operand",
                    self.type_name()
                ))
            })
        };

        match self {
            Operation::Cube { size, center } => backend.create_box(*size, *center),
            Operation::Sphere {
                radius,
                lat_segments,
                lon_segments,
            } => backend.create_sphere(*radius, *lat_segments, *lon_segments),
            Operation::Cylinder {
                height,
                r1,
                r2,
                segments,
                center,
            } => backend.create_cylinder(*height, *r1, *r2, *segments, *center),
            Operation::Polygon { sides, radius } => backend.create_polygon(*sides, *radius),
            Operation::Polyhedron { points, faces } => backend.create_polyhedron(points, faces),
            Operation::Native { tag, bytes } => backend.import_native(tag, bytes),
            Operation::Transform { matrix } => backend.transform(single()?, matrix),
            Operation::Flush { axes } => backend.flush(single()?, axes),
            Operation::Subdivide { levels } => backend.subdivide(single()?, *levels),
            Operation::Union | Operation::Difference | Operation::Intersection => {
                let op = self.boolean_type().ok_or_else(|| {
                    crate::kernel::CadError::OperationFailed("not a boolean".into())
                })?;
                backend.boolean(operands, op)
            }
        }
    }

    /// Try to absorb operand `index` (whose operation is `operand`) into self
    ///
    /// On success the returned operation replaces `self` and the absorbed
    /// operand's own operands are spliced in at `index`. Legality with
    /// respect to sharing is the caller's responsibility.
    pub fn fold(&self, index: usize, operand: &Operation, families: &RewriteConfig) -> Option<Operation> {
        match (self, operand) {
            (Operation::Transform { matrix: outer }, Operation::Transform { matrix: inner })
                if families.fold_transforms =>
            {
                Some(Operation::Transform {
                    matrix: *outer * *inner,
                })
            }
            (Operation::Flush { axes: outer }, Operation::Flush { axes: inner })
                if families.fold_flush =>
            {
                Some(Operation::Flush {
                    axes: [
                        inner[0].then(outer[0]),
                        inner[1].then(outer[1]),
                        inner[2].then(outer[2]),
                    ],
                })
            }
            (Operation::Union, Operation::Union) | (Operation::Intersection, Operation::Intersection)
                if families.fold_booleans =>
            {
                Some(self.clone())
            }
            (Operation::Difference, Operation::Difference)
                if families.fold_booleans && index == 0 =>
            {
                Some(Operation::Difference)
            }
            _ => None,
        }
    }

    // ============== Constructors ==============

    /// Box with the default placement (minimum corner on the origin)
    pub fn cube(size: [f64; 3]) -> Self {
        Operation::Cube {
            size,
            center: false,
        }
    }

    /// Sphere with the default resolution
    pub fn sphere(radius: f64) -> Self {
        use sg_core::constants::{SPHERE_LAT_SEGMENTS, SPHERE_LON_SEGMENTS};
        Operation::Sphere {
            radius,
            lat_segments: SPHERE_LAT_SEGMENTS,
            lon_segments: SPHERE_LON_SEGMENTS,
        }
    }

    /// Straight cylinder with the default resolution
    pub fn cylinder(height: f64, radius: f64) -> Self {
        use sg_core::constants::CYLINDER_SEGMENTS;
        Operation::Cylinder {
            height,
            r1: radius,
            r2: radius,
            segments: CYLINDER_SEGMENTS,
            center: false,
        }
    }

    /// Translation
    pub fn translate(offset: glam::DVec3) -> Self {
        Operation::Transform {
            matrix: DMat4::from_translation(offset),
        }
    }

    /// Rotation by Euler angles in degrees, applied X then Y then Z
    pub fn rotate(degrees: glam::DVec3) -> Self {
        let r = degrees * (std::f64::consts::PI / 180.0);
        Operation::Transform {
            matrix: DMat4::from_euler(glam::EulerRot::ZYX, r.z, r.y, r.x),
        }
    }

    /// Non-uniform scale
    pub fn scale(factors: glam::DVec3) -> Self {
        Operation::Transform {
            matrix: DMat4::from_scale(factors),
        }
    }

    /// Mirror across the plane through the origin with the given normal
    pub fn mirror(normal: glam::DVec3) -> Self {
        let n = normal.normalize_or_zero();
        let m = glam::DMat3::IDENTITY - glam::DMat3::from_cols(n * n.x, n * n.y, n * n.z) * 2.0;
        Operation::Transform {
            matrix: DMat4::from_mat3(m),
        }
    }
}

fn positive(value: f64, what: &'static str) -> ConstructionResult<()> {
    if !value.is_finite() {
        return Err(ConstructionError::NonFinite(what));
    }
    if value <= 0.0 {
        return Err(ConstructionError::NonPositive { what, value });
    }
    Ok(())
}

fn non_negative(value: f64, what: &'static str) -> ConstructionResult<()> {
    if !value.is_finite() {
        return Err(ConstructionError::NonFinite(what));
    }
    if value < 0.0 {
        return Err(ConstructionError::NonPositive { what, value });
    }
    Ok(())
}

fn segments(found: u32, min: u32) -> ConstructionResult<()> {
    if found < min {
        return Err(ConstructionError::TooFewSegments { min, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn all_families() -> RewriteConfig {
        RewriteConfig::default()
    }

    #[test]
    fn test_non_positive_dimension_rejected() {
        let err = Operation::cube([1.0, 0.0, 1.0]).validate(0).unwrap_err();
        assert_eq!(
            err,
            ConstructionError::NonPositive {
                what: "cube depth",
                value: 0.0
            }
        );
        assert!(Operation::sphere(-1.0).validate(0).is_err());
        assert!(Operation::cube([f64::NAN, 1.0, 1.0]).validate(0).is_err());
    }

    #[test]
    fn test_arity_is_checked() {
        assert!(matches!(
            Operation::Union.validate(0),
            Err(ConstructionError::Arity { .. })
        ));
        assert!(Operation::translate(DVec3::X).validate(2).is_err());
        assert!(Operation::cube([1.0; 3]).validate(1).is_err());
        assert!(Operation::Difference.validate(3).is_ok());
    }

    #[test]
    fn test_polyhedron_indices_checked_at_construction() {
        let op = Operation::Polyhedron {
            points: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            faces: vec![vec![0, 1, 3]],
        };
        assert!(matches!(
            op.validate(0),
            Err(ConstructionError::InvalidPolyhedron(_))
        ));
    }

    #[test]
    fn test_non_affine_matrix_rejected() {
        let mut matrix = DMat4::IDENTITY;
        matrix.x_axis.w = 1.0;
        assert_eq!(
            Operation::Transform { matrix }.validate(1),
            Err(ConstructionError::NonAffine)
        );
    }

    #[test]
    fn test_transform_fold_composes_matrices() {
        let inner = Operation::translate(DVec3::new(1.0, 0.0, 0.0));
        let outer = Operation::scale(DVec3::splat(2.0));
        let folded = outer.fold(0, &inner, &all_families()).unwrap();
        let Operation::Transform { matrix } = folded else {
            panic!("expected a transform");
        };
        assert_eq!(matrix.transform_point3(DVec3::ZERO), DVec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_fold_respects_family_flags() {
        let families = RewriteConfig {
            fold_transforms: false,
            ..RewriteConfig::default()
        };
        let inner = Operation::translate(DVec3::X);
        assert!(inner.fold(0, &inner, &families).is_none());
        assert!(Operation::Union.fold(1, &Operation::Union, &families).is_some());
    }

    #[test]
    fn test_difference_only_folds_first_operand() {
        let families = all_families();
        assert!(Operation::Difference.fold(0, &Operation::Difference, &families).is_some());
        assert!(Operation::Difference.fold(1, &Operation::Difference, &families).is_none());
        assert!(Operation::Union.fold(0, &Operation::Intersection, &families).is_none());
    }

    #[test]
    fn test_mirror_is_orientation_reversing() {
        let Operation::Transform { matrix } = Operation::mirror(DVec3::X) else {
            panic!("expected a transform");
        };
        assert!(matrix.determinant() < 0.0);
        assert_eq!(matrix.transform_point3(DVec3::new(2.0, 1.0, 0.0)), DVec3::new(-2.0, 1.0, 0.0));
    }

    #[test]
    fn test_rotate_applies_x_then_z() {
        let Operation::Transform { matrix } = Operation::rotate(DVec3::new(90.0, 0.0, 90.0)) else {
            panic!("expected a transform");
        };
        // +Y goes to +Z under X, and Z is fixed by the later Z rotation
        let p = matrix.transform_point3(DVec3::Y);
        approx::assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        approx::assert_relative_eq!(p.y, 0.0, epsilon = 1e-12);
        approx::assert_relative_eq!(p.z, 1.0, epsilon = 1e-12);
        // +X is fixed by X, then turned to +Y
        let q = matrix.transform_point3(DVec3::X);
        approx::assert_relative_eq!(q.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lint_counts_huge_spheres_without_overflow() {
        let op = Operation::Sphere {
            radius: 1.0,
            lat_segments: 70_000,
            lon_segments: 70_000,
        };
        assert!(op.validate(0).is_ok());
        let lints = op.lint();
        assert_eq!(lints.len(), 1);
        assert_eq!(lints[0].0, WarningCategory::SuspiciousParameter);
        assert!(lints[0].1.contains("4900000000 facets"));
    }

    #[test]
    fn test_lint_flags_deep_subdivision() {
        let lints = Operation::Subdivide { levels: 9 }.lint();
        assert_eq!(lints.len(), 1);
        assert_eq!(lints[0].0, WarningCategory::SuspiciousParameter);
        assert!(Operation::Subdivide { levels: 1 }.lint().is_empty());
    }
}
