//! Box (rectangular prism) generation

use crate::geometry::{GeometryError, Polyhedron};

/// Generate a box with the given dimensions
///
/// # Arguments
/// * `size` - [width (x), depth (y), height (z)]
/// * `center` - center the box on the origin instead of placing its
///   minimum corner there
///
/// # Returns
/// 8 shared corners and 6 quad faces
pub fn generate_box(size: [f64; 3], center: bool) -> Result<Polyhedron, GeometryError> {
    let (lo, hi) = if center {
        (
            [-size[0] / 2.0, -size[1] / 2.0, -size[2] / 2.0],
            [size[0] / 2.0, size[1] / 2.0, size[2] / 2.0],
        )
    } else {
        ([0.0; 3], size)
    };

    // Corner i uses bit 0 for x, bit 1 for y, bit 2 for z
    let corners: Vec<[f64; 3]> = (0..8)
        .map(|i| {
            [
                if i & 1 == 0 { lo[0] } else { hi[0] },
                if i & 2 == 0 { lo[1] } else { hi[1] },
                if i & 4 == 0 { lo[2] } else { hi[2] },
            ]
        })
        .collect();

    let faces = vec![
        vec![0, 2, 3, 1], // -Z (bottom)
        vec![4, 5, 7, 6], // +Z (top)
        vec![0, 1, 5, 4], // -Y
        vec![2, 6, 7, 3], // +Y
        vec![0, 4, 6, 2], // -X
        vec![1, 3, 7, 5], // +X
    ];

    Polyhedron::from_f64(&corners, faces)
}
