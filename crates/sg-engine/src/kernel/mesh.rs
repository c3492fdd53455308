//! Reference mesh backend
//!
//! Exact-rational polygon mesh backend built on `sg-core`.
//!
//! Note: unions are lazy (operands are merged as disjoint shells) and
//! difference/intersection are only decided when bounding boxes make the
//! answer trivial. Overlapping cuts need an exact boolean kernel.

use std::sync::Arc;

use glam::DMat4;
use num_traits::Zero;
use sg_core::primitive::{
    generate_box, generate_cylinder_with_segments, generate_polygon,
    generate_sphere_with_segments,
};
use sg_core::{NativePayload, Point3, Polyhedron, Rational, Value, rational_from_f64};

use super::{BooleanType, CadError, CadResult, ComputeBackend, FlushAxis};

/// Reference backend over exact polyhedra
#[derive(Debug, Default)]
pub struct MeshBackend;

impl MeshBackend {
    /// Create a new mesh backend
    pub fn new() -> Self {
        Self
    }

    fn polyhedron<'a>(&self, value: &'a Value) -> CadResult<&'a Polyhedron> {
        value.as_polyhedron().ok_or_else(|| {
            CadError::OperationFailed(format!(
                "{} payloads are opaque to the mesh backend",
                value.kind_name()
            ))
        })
    }

    fn union(&self, operands: &[&Polyhedron]) -> Polyhedron {
        let mut result = Polyhedron::default();
        for p in operands {
            result.merge(p);
        }
        result
    }

    fn difference(&self, operands: &[&Polyhedron]) -> CadResult<Polyhedron> {
        let Some((first, rest)) = operands.split_first() else {
            return Ok(Polyhedron::default());
        };
        let Some(bounds) = first.bounding_box() else {
            return Ok(Polyhedron::default());
        };

        let overlapping = rest.iter().filter(|p| {
            p.bounding_box()
                .is_some_and(|other| boxes_overlap(&bounds, &other))
        });
        if overlapping.count() > 0 {
            return Err(CadError::BooleanFailed(
                "difference of overlapping solids requires an exact boolean kernel".into(),
            ));
        }
        Ok((*first).clone())
    }

    fn intersection(&self, operands: &[&Polyhedron]) -> CadResult<Polyhedron> {
        match operands {
            [] => Ok(Polyhedron::default()),
            [only] => Ok((*only).clone()),
            _ => {
                let boxes: Vec<_> = operands.iter().map(|p| p.bounding_box()).collect();
                if boxes.iter().any(Option::is_none) {
                    return Ok(Polyhedron::default());
                }
                let boxes: Vec<_> = boxes.into_iter().flatten().collect();
                let disjoint = boxes.iter().enumerate().any(|(i, a)| {
                    boxes[i + 1..].iter().any(|b| !boxes_overlap(a, b))
                });
                if disjoint {
                    return Ok(Polyhedron::default());
                }
                if operands.windows(2).all(|w| w[0] == w[1]) {
                    return Ok(operands[0].clone());
                }
                Err(CadError::BooleanFailed(
                    "intersection of overlapping solids requires an exact boolean kernel".into(),
                ))
            }
        }
    }
}

/// Closed-interval overlap test on exact bounding boxes
fn boxes_overlap(a: &(Point3, Point3), b: &(Point3, Point3)) -> bool {
    (0..3).all(|axis| a.0[axis] <= b.1[axis] && b.0[axis] <= a.1[axis])
}

impl ComputeBackend for MeshBackend {
    fn name(&self) -> &str {
        "mesh"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn create_box(&self, size: [f64; 3], center: bool) -> CadResult<Value> {
        Ok(generate_box(size, center)?.into())
    }

    fn create_sphere(&self, radius: f64, lat_segments: u32, lon_segments: u32) -> CadResult<Value> {
        Ok(generate_sphere_with_segments(radius, lat_segments, lon_segments)?.into())
    }

    fn create_cylinder(
        &self,
        height: f64,
        r1: f64,
        r2: f64,
        segments: u32,
        center: bool,
    ) -> CadResult<Value> {
        Ok(generate_cylinder_with_segments(height, r1, r2, segments, center)?.into())
    }

    fn create_polygon(&self, sides: u32, radius: f64) -> CadResult<Value> {
        Ok(generate_polygon(sides, radius)?.into())
    }

    fn create_polyhedron(&self, points: &[[f64; 3]], faces: &[Vec<usize>]) -> CadResult<Value> {
        let polyhedron = Polyhedron::from_f64(points, faces.to_vec())?;
        polyhedron.validate()?;
        Ok(polyhedron.into())
    }

    fn import_native(&self, tag: &str, bytes: &[u8]) -> CadResult<Value> {
        Ok(Value::Native(NativePayload::new(tag, bytes.to_vec())))
    }

    fn transform(&self, value: &Value, matrix: &DMat4) -> CadResult<Value> {
        let polyhedron = self.polyhedron(value)?;
        Ok(polyhedron.transform(matrix)?.into())
    }

    fn flush(&self, value: &Value, axes: &[FlushAxis; 3]) -> CadResult<Value> {
        let polyhedron = self.polyhedron(value)?;
        let Some((lo, hi)) = polyhedron.bounding_box() else {
            return Ok(value.clone());
        };

        let mut offset: Point3 = [Rational::zero(), Rational::zero(), Rational::zero()];
        for (axis, coefficients) in axes.iter().enumerate() {
            let a = rational_from_f64(coefficients.min)?;
            let b = rational_from_f64(coefficients.max)?;
            offset[axis] = -(a * &lo[axis] + b * &hi[axis]);
        }

        let mut moved = polyhedron.clone();
        moved.translate(&offset);
        Ok(moved.into())
    }

    fn boolean(&self, operands: &[Arc<Value>], op: BooleanType) -> CadResult<Value> {
        let polyhedra = operands
            .iter()
            .map(|v| self.polyhedron(v))
            .collect::<CadResult<Vec<_>>>()?;

        let result = match op {
            BooleanType::Union => self.union(&polyhedra),
            BooleanType::Difference => self.difference(&polyhedra)?,
            BooleanType::Intersection => self.intersection(&polyhedra)?,
        };
        Ok(result.into())
    }

    fn subdivide(&self, value: &Value, levels: u32) -> CadResult<Value> {
        let mut polyhedron = self.polyhedron(value)?.clone();
        for _ in 0..levels {
            polyhedron = polyhedron.fan_subdivide();
        }
        Ok(polyhedron.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use sg_core::geometry::ratio;

    fn cube(backend: &MeshBackend, offset: f64) -> Arc<Value> {
        let value = backend.create_box([1.0, 1.0, 1.0], false).unwrap();
        let moved = backend
            .transform(&value, &DMat4::from_translation(DVec3::splat(offset)))
            .unwrap();
        Arc::new(moved)
    }

    #[test]
    fn test_flush_low_edge_to_origin() {
        let backend = MeshBackend::new();
        let value = cube(&backend, 3.0);
        let axes = [FlushAxis::LOW, FlushAxis::CENTER, FlushAxis::NONE];
        let flushed = backend.flush(&value, &axes).unwrap();
        let (lo, hi) = flushed.as_polyhedron().unwrap().bounding_box().unwrap();
        assert_eq!(lo, [ratio(0, 1), ratio(-1, 2), ratio(3, 1)]);
        assert_eq!(hi, [ratio(1, 1), ratio(1, 2), ratio(4, 1)]);
    }

    #[test]
    fn test_union_merges_shells() {
        let backend = MeshBackend::new();
        let result = backend
            .boolean(&[cube(&backend, 0.0), cube(&backend, 5.0)], BooleanType::Union)
            .unwrap();
        let p = result.as_polyhedron().unwrap();
        assert_eq!(p.vertex_count(), 16);
        assert_eq!(p.face_count(), 12);
    }

    #[test]
    fn test_difference_of_disjoint_solids_keeps_first() {
        let backend = MeshBackend::new();
        let a = cube(&backend, 0.0);
        let result = backend
            .boolean(&[a.clone(), cube(&backend, 5.0)], BooleanType::Difference)
            .unwrap();
        assert_eq!(&result, a.as_ref());
    }

    #[test]
    fn test_overlapping_difference_fails() {
        let backend = MeshBackend::new();
        let result = backend.boolean(
            &[cube(&backend, 0.0), cube(&backend, 0.5)],
            BooleanType::Difference,
        );
        assert!(matches!(result, Err(CadError::BooleanFailed(_))));
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let backend = MeshBackend::new();
        let result = backend
            .boolean(
                &[cube(&backend, 0.0), cube(&backend, 5.0)],
                BooleanType::Intersection,
            )
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_native_payload_is_opaque() {
        let backend = MeshBackend::new();
        let native = backend.import_native("nef3", b"blob").unwrap();
        assert!(backend.transform(&native, &DMat4::IDENTITY).is_err());
    }
}
