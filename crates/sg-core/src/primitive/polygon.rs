//! Regular polygon generation (planar)

use std::f64::consts::TAU;

use crate::geometry::{GeometryError, Polyhedron};

/// Generate a regular polygon on the XY plane, one vertex on +X
pub fn generate_polygon(sides: u32, radius: f64) -> Result<Polyhedron, GeometryError> {
    let vertices: Vec<[f64; 3]> = (0..sides)
        .map(|i| {
            let theta = (i as f64 / sides as f64) * TAU;
            [radius * theta.cos(), radius * theta.sin(), 0.0]
        })
        .collect();
    let face = (0..vertices.len()).collect();
    Polyhedron::from_f64(&vertices, vec![face])
}
