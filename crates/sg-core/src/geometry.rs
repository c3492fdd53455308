//! Geometry values exchanged between the engine and compute backends
//!
//! Coordinates are exact rationals. Floating point only enters at the
//! boundary (construction parameters, trigonometric primitives) and is
//! converted exactly from its binary value.

use std::fmt;

use glam::DMat4;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};

/// Exact coordinate type
pub type Rational = BigRational;

/// A point with exact coordinates
pub type Point3 = [Rational; 3];

/// Geometry-level errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Non-finite coordinate: {0}")]
    NonFinite(f64),
    #[error("Face {face} references vertex {index} but only {count} vertices exist")]
    IndexOutOfRange {
        face: usize,
        index: usize,
        count: usize,
    },
    #[error("Face {0} has fewer than 3 vertices")]
    DegenerateFace(usize),
    #[error("Transform is singular")]
    SingularTransform,
}

/// Convert a float to the exact rational it represents
pub fn rational_from_f64(value: f64) -> Result<Rational, GeometryError> {
    BigRational::from_float(value).ok_or(GeometryError::NonFinite(value))
}

/// Convert a float point to an exact point
pub fn point_from_f64(p: [f64; 3]) -> Result<Point3, GeometryError> {
    Ok([
        rational_from_f64(p[0])?,
        rational_from_f64(p[1])?,
        rational_from_f64(p[2])?,
    ])
}

/// Lossy float view of a rational (for diagnostics only)
pub fn rational_to_f64(value: &Rational) -> f64 {
    use num_traits::ToPrimitive;
    value.to_f64().unwrap_or(f64::NAN)
}

/// Polygon mesh with exact vertices and indexed faces
///
/// Faces are ordered vertex loops, counter-clockwise when seen from outside.
/// Planar (2D) shapes use z = 0 and one face per outline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Polyhedron {
    pub vertices: Vec<Point3>,
    pub faces: Vec<Vec<usize>>,
}

impl Polyhedron {
    /// Create a polyhedron from exact vertices and faces
    pub fn new(vertices: Vec<Point3>, faces: Vec<Vec<usize>>) -> Self {
        Self { vertices, faces }
    }

    /// Build from float vertices, converting each coordinate exactly
    pub fn from_f64(vertices: &[[f64; 3]], faces: Vec<Vec<usize>>) -> Result<Self, GeometryError> {
        let vertices = vertices
            .iter()
            .map(|p| point_from_f64(*p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { vertices, faces })
    }

    /// Whether there are no vertices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check that every face is a proper loop over existing vertices
    pub fn validate(&self) -> Result<(), GeometryError> {
        let count = self.vertices.len();
        for (face_index, face) in self.faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(GeometryError::DegenerateFace(face_index));
            }
            if let Some(&index) = face.iter().find(|&&i| i >= count) {
                return Err(GeometryError::IndexOutOfRange {
                    face: face_index,
                    index,
                    count,
                });
            }
        }
        Ok(())
    }

    /// Axis-aligned bounding box as (min, max), `None` when empty
    pub fn bounding_box(&self) -> Option<(Point3, Point3)> {
        let first = self.vertices.first()?;
        let mut min = first.clone();
        let mut max = first.clone();
        for v in &self.vertices[1..] {
            for axis in 0..3 {
                if v[axis] < min[axis] {
                    min[axis] = v[axis].clone();
                }
                if v[axis] > max[axis] {
                    max[axis] = v[axis].clone();
                }
            }
        }
        Some((min, max))
    }

    /// Translate every vertex in place
    pub fn translate(&mut self, offset: &Point3) {
        if offset.iter().all(Zero::is_zero) {
            return;
        }
        for v in &mut self.vertices {
            for axis in 0..3 {
                v[axis] += &offset[axis];
            }
        }
    }

    /// Apply an affine transform exactly
    ///
    /// Orientation-reversing transforms (negative determinant) also reverse
    /// face winding so faces keep pointing outward.
    pub fn transform(&self, matrix: &DMat4) -> Result<Self, GeometryError> {
        let det = matrix.determinant();
        if det == 0.0 {
            return Err(GeometryError::SingularTransform);
        }

        let cols = matrix.to_cols_array_2d();
        // rows[r] = [m_r0, m_r1, m_r2, t_r]
        let mut rows: Vec<[Rational; 4]> = Vec::with_capacity(3);
        for r in 0..3 {
            rows.push([
                rational_from_f64(cols[0][r])?,
                rational_from_f64(cols[1][r])?,
                rational_from_f64(cols[2][r])?,
                rational_from_f64(cols[3][r])?,
            ]);
        }

        let vertices = self
            .vertices
            .iter()
            .map(|v| {
                let apply = |row: &[Rational; 4]| {
                    &row[0] * &v[0] + &row[1] * &v[1] + &row[2] * &v[2] + &row[3]
                };
                [apply(&rows[0]), apply(&rows[1]), apply(&rows[2])]
            })
            .collect();

        let faces = if det < 0.0 {
            self.faces
                .iter()
                .map(|f| f.iter().rev().copied().collect())
                .collect()
        } else {
            self.faces.clone()
        };

        Ok(Self { vertices, faces })
    }

    /// Append another polyhedron as a disjoint piece
    pub fn merge(&mut self, other: &Polyhedron) {
        let offset = self.vertices.len();
        self.vertices.extend(other.vertices.iter().cloned());
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|f| f.iter().map(|i| i + offset).collect::<Vec<_>>()),
        );
    }

    /// Split every face into a triangle fan around its exact centroid
    pub fn fan_subdivide(&self) -> Self {
        let mut vertices = self.vertices.clone();
        let mut faces = Vec::with_capacity(self.faces.len() * 3);

        for face in &self.faces {
            if face.len() < 3 {
                faces.push(face.clone());
                continue;
            }

            let n = BigRational::from_integer(BigInt::from(face.len()));
            let mut centroid: Point3 = [Rational::zero(), Rational::zero(), Rational::zero()];
            for &i in face {
                for axis in 0..3 {
                    centroid[axis] += &self.vertices[i][axis];
                }
            }
            for c in &mut centroid {
                *c /= &n;
            }

            let center = vertices.len();
            vertices.push(centroid);
            for k in 0..face.len() {
                faces.push(vec![center, face[k], face[(k + 1) % face.len()]]);
            }
        }

        Self { vertices, faces }
    }

    /// Rough size of the persisted form in bytes
    pub fn estimated_size(&self) -> usize {
        let coords: u64 = self
            .vertices
            .iter()
            .flat_map(|v| v.iter())
            .map(|c| (c.numer().bits() + c.denom().bits()) / 8 + 2)
            .sum();
        let indices: usize = self.faces.iter().map(|f| f.len() + 1).sum();
        coords as usize + indices * 8
    }

    /// Signed volume times six (exact), zero for planar shapes
    pub fn signed_volume6(&self) -> Rational {
        let mut total = Rational::zero();
        for face in self.faces.iter().filter(|f| f.len() >= 3) {
            let a = &self.vertices[face[0]];
            for k in 1..face.len() - 1 {
                let b = &self.vertices[face[k]];
                let c = &self.vertices[face[k + 1]];
                let cross = [
                    &b[1] * &c[2] - &b[2] * &c[1],
                    &b[2] * &c[0] - &b[0] * &c[2],
                    &b[0] * &c[1] - &b[1] * &c[0],
                ];
                total += &a[0] * &cross[0] + &a[1] * &cross[1] + &a[2] * &cross[2];
            }
        }
        total
    }

    /// True when every vertex lies on z = 0
    pub fn is_planar(&self) -> bool {
        self.vertices.iter().all(|v| v[2].is_zero())
    }

    /// True when the shape encloses no volume although it is not planar
    pub fn is_degenerate(&self) -> bool {
        !self.is_empty() && !self.is_planar() && !self.signed_volume6().is_positive()
    }
}

/// Opaque payload produced by a specific backend, persisted verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativePayload {
    /// Short identifier of the producing format (no whitespace)
    pub tag: String,
    pub bytes: Vec<u8>,
}

impl NativePayload {
    /// Create a payload with a backend tag
    pub fn new(tag: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            tag: tag.into(),
            bytes,
        }
    }
}

/// A computed node value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Polyhedron(Polyhedron),
    Native(NativePayload),
}

impl Value {
    /// Short name of the value kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Polyhedron(_) => "polyhedron",
            Value::Native(_) => "native",
        }
    }

    /// The polyhedron, if this is one
    pub fn as_polyhedron(&self) -> Option<&Polyhedron> {
        match self {
            Value::Polyhedron(p) => Some(p),
            Value::Native(_) => None,
        }
    }

    /// Whether the value carries no geometry
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Polyhedron(p) => p.is_empty(),
            Value::Native(n) => n.bytes.is_empty(),
        }
    }

    /// Rough size of the persisted form in bytes
    pub fn estimated_size(&self) -> usize {
        match self {
            Value::Polyhedron(p) => p.estimated_size(),
            Value::Native(n) => n.bytes.len() + n.tag.len(),
        }
    }

    /// Summary figures recorded as node annotations after evaluation
    pub fn statistics(&self) -> Vec<(&'static str, String)> {
        match self {
            Value::Polyhedron(p) => vec![
                ("kind", self.kind_name().to_string()),
                ("vertices", p.vertex_count().to_string()),
                ("faces", p.face_count().to_string()),
            ],
            Value::Native(n) => vec![
                ("kind", format!("native:{}", n.tag)),
                ("bytes", n.bytes.len().to_string()),
            ],
        }
    }
}

impl From<Polyhedron> for Value {
    fn from(p: Polyhedron) -> Self {
        Value::Polyhedron(p)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Polyhedron(p) => write!(
                f,
                "polyhedron ({} vertices, {} faces)",
                p.vertex_count(),
                p.face_count()
            ),
            Value::Native(n) => write!(f, "native:{} ({} bytes)", n.tag, n.bytes.len()),
        }
    }
}

/// Convenience for building rationals in tests and generators
pub fn ratio(numer: i64, denom: i64) -> Rational {
    BigRational::new(BigInt::from(numer), BigInt::from(denom))
}
