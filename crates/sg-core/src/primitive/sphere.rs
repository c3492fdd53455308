//! Sphere generation (UV sphere)

use std::f64::consts::PI;

use glam::DVec3;

use crate::geometry::{GeometryError, Polyhedron};

/// Generate a UV sphere with the default resolution
pub fn generate_sphere(radius: f64) -> Result<Polyhedron, GeometryError> {
    use crate::constants::{SPHERE_LAT_SEGMENTS, SPHERE_LON_SEGMENTS};
    generate_sphere_with_segments(radius, SPHERE_LAT_SEGMENTS, SPHERE_LON_SEGMENTS)
}

/// Generate a UV sphere with custom resolution
///
/// # Arguments
/// * `radius` - Sphere radius
/// * `lat_segments` - Number of latitude bands (at least 2)
/// * `lon_segments` - Number of longitude segments (at least 3)
pub fn generate_sphere_with_segments(
    radius: f64,
    lat_segments: u32,
    lon_segments: u32,
) -> Result<Polyhedron, GeometryError> {
    let lat_segments = lat_segments.max(2) as usize;
    let lon_segments = lon_segments.max(3) as usize;

    let mut vertices: Vec<[f64; 3]> = Vec::new();
    let mut faces: Vec<Vec<usize>> = Vec::new();

    let north = 0;
    vertices.push([0.0, 0.0, radius]);

    // Inner rings, top to bottom
    let ring_start = |ring: usize| 1 + ring * lon_segments;
    for lat in 1..lat_segments {
        let theta = (lat as f64 / lat_segments as f64) * PI;
        for lon in 0..lon_segments {
            let phi = (lon as f64 / lon_segments as f64) * 2.0 * PI;
            let dir = DVec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
            let p = dir * radius;
            vertices.push([p.x, p.y, p.z]);
        }
    }

    let south = vertices.len();
    vertices.push([0.0, 0.0, -radius]);

    let rings = lat_segments - 1;
    for lon in 0..lon_segments {
        let next = (lon + 1) % lon_segments;

        faces.push(vec![north, ring_start(0) + lon, ring_start(0) + next]);

        for ring in 0..rings - 1 {
            let upper = ring_start(ring);
            let lower = ring_start(ring + 1);
            faces.push(vec![lower + lon, lower + next, upper + next, upper + lon]);
        }

        let last = ring_start(rings - 1);
        faces.push(vec![south, last + next, last + lon]);
    }

    Polyhedron::from_f64(&vertices, faces)
}
