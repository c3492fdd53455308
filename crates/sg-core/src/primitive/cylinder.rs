//! Cylinder and cone generation (with end caps)

use std::f64::consts::TAU;

use crate::geometry::{GeometryError, Polyhedron};

/// Generate a cylinder along the Z axis with the default segment count
pub fn generate_cylinder(
    height: f64,
    r1: f64,
    r2: f64,
    center: bool,
) -> Result<Polyhedron, GeometryError> {
    use crate::constants::CYLINDER_SEGMENTS;
    generate_cylinder_with_segments(height, r1, r2, CYLINDER_SEGMENTS, center)
}

/// Generate a cylinder with custom segment count
///
/// `r1` is the bottom radius and `r2` the top radius; a zero radius
/// collapses that cap into a single apex vertex.
pub fn generate_cylinder_with_segments(
    height: f64,
    r1: f64,
    r2: f64,
    segments: u32,
    center: bool,
) -> Result<Polyhedron, GeometryError> {
    let (z0, z1) = if center {
        (-height / 2.0, height / 2.0)
    } else {
        (0.0, height)
    };

    let mut vertices: Vec<[f64; 3]> = Vec::new();
    let mut faces: Vec<Vec<usize>> = Vec::new();

    let ring = |radius: f64, z: f64, vertices: &mut Vec<[f64; 3]>| -> Vec<usize> {
        if radius == 0.0 {
            vertices.push([0.0, 0.0, z]);
            return vec![vertices.len() - 1];
        }
        (0..segments)
            .map(|i| {
                let theta = (i as f64 / segments as f64) * TAU;
                vertices.push([radius * theta.cos(), radius * theta.sin(), z]);
                vertices.len() - 1
            })
            .collect()
    };

    let bottom = ring(r1, z0, &mut vertices);
    let top = ring(r2, z1, &mut vertices);
    let n = segments as usize;

    // Side faces
    for i in 0..n {
        let j = (i + 1) % n;
        let mut face = Vec::with_capacity(4);
        match (bottom.len(), top.len()) {
            (1, _) => face.extend([bottom[0], top[j], top[i]]),
            (_, 1) => face.extend([bottom[i], bottom[j], top[0]]),
            _ => face.extend([bottom[i], bottom[j], top[j], top[i]]),
        }
        faces.push(face);
    }

    // Caps
    if bottom.len() > 1 {
        faces.push(bottom.iter().rev().copied().collect());
    }
    if top.len() > 1 {
        faces.push(top.clone());
    }

    Polyhedron::from_f64(&vertices, faces)
}
