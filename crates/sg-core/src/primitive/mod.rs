//! Primitive solid generation
//!
//! Generates exact polyhedra for the basic shapes:
//! - Box (rectangular prism)
//! - Cylinder / cone (with end caps)
//! - Sphere (UV sphere with single-vertex poles)
//! - Regular polygon (planar, z = 0)

mod box_mesh;
mod cylinder;
mod polygon;
mod sphere;

pub use box_mesh::generate_box;
pub use cylinder::{generate_cylinder, generate_cylinder_with_segments};
pub use polygon::generate_polygon;
pub use sphere::{generate_sphere, generate_sphere_with_segments};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{rational_to_f64, ratio};
    use approx::assert_relative_eq;
    use num_traits::Signed;

    #[test]
    fn test_box_counts() {
        let cube = generate_box([1.0, 1.0, 1.0], false).unwrap();
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.face_count(), 6);
        assert!(cube.validate().is_ok());
    }

    #[test]
    fn test_box_dimensions() {
        let cube = generate_box([2.0, 4.0, 6.0], true).unwrap();
        let (min, max) = cube.bounding_box().unwrap();
        assert_eq!(min, [ratio(-1, 1), ratio(-2, 1), ratio(-3, 1)]);
        assert_eq!(max, [ratio(1, 1), ratio(2, 1), ratio(3, 1)]);
    }

    #[test]
    fn test_box_faces_point_outward() {
        let cube = generate_box([2.0, 3.0, 4.0], false).unwrap();
        // 6 * volume
        assert_eq!(cube.signed_volume6(), ratio(144, 1));
    }

    #[test]
    fn test_cylinder_mesh() {
        let cylinder = generate_cylinder_with_segments(2.0, 1.0, 1.0, 16, false).unwrap();
        assert_eq!(cylinder.vertex_count(), 32);
        assert_eq!(cylinder.face_count(), 18);
        assert!(cylinder.validate().is_ok());
        assert!(cylinder.signed_volume6().is_positive());
    }

    #[test]
    fn test_cone_has_apex() {
        let cone = generate_cylinder_with_segments(1.0, 1.0, 0.0, 8, true).unwrap();
        assert_eq!(cone.vertex_count(), 9);
        assert_eq!(cone.face_count(), 9);
        let (min, max) = cone.bounding_box().unwrap();
        assert_relative_eq!(rational_to_f64(&min[2]), -0.5);
        assert_relative_eq!(rational_to_f64(&max[2]), 0.5);
    }

    #[test]
    fn test_sphere_mesh() {
        let sphere = generate_sphere_with_segments(1.0, 4, 8).unwrap();
        // two poles + 3 inner rings of 8
        assert_eq!(sphere.vertex_count(), 26);
        assert_eq!(sphere.face_count(), 32);
        assert!(sphere.validate().is_ok());
        assert!(sphere.signed_volume6().is_positive());
    }

    #[test]
    fn test_polygon_is_planar() {
        let hexagon = generate_polygon(6, 1.0).unwrap();
        assert_eq!(hexagon.vertex_count(), 6);
        assert_eq!(hexagon.face_count(), 1);
        assert!(hexagon.is_planar());
        assert!(!hexagon.is_degenerate());
    }
}
