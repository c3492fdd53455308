//! Deterministic parameter rendering

use glam::DMat4;

use super::Operation;
use crate::kernel::FlushAxis;

/// Render an f64 as its shortest round-trip decimal, with `-0` folded to `0`
pub fn fmt_f64(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{value}")
    }
}

fn fmt_list<T>(items: &[T], f: impl Fn(&T) -> String) -> String {
    let parts: Vec<String> = items.iter().map(f).collect();
    format!("[{}]", parts.join(","))
}

fn fmt_matrix(matrix: &DMat4) -> String {
    let rows: Vec<[f64; 4]> = (0..4).map(|i| matrix.row(i).to_array()).collect();
    fmt_list(&rows, |row| fmt_list(row, |v| fmt_f64(*v)))
}

fn fmt_flush(axis: &FlushAxis) -> String {
    format!("[{},{}]", fmt_f64(axis.min), fmt_f64(axis.max))
}

pub(super) fn describe(op: &Operation) -> String {
    match op {
        Operation::Cube { size, center } => {
            format!("size={},center={}", fmt_list(size, |v| fmt_f64(*v)), center)
        }
        Operation::Sphere {
            radius,
            lat_segments,
            lon_segments,
        } => format!("r={},lat={},lon={}", fmt_f64(*radius), lat_segments, lon_segments),
        Operation::Cylinder {
            height,
            r1,
            r2,
            segments,
            center,
        } => format!(
            "h={},r1={},r2={},segments={},center={}",
            fmt_f64(*height),
            fmt_f64(*r1),
            fmt_f64(*r2),
            segments,
            center
        ),
        Operation::Polygon { sides, radius } => {
            format!("sides={},r={}", sides, fmt_f64(*radius))
        }
        Operation::Polyhedron { points, faces } => {
            let mut out = String::from("points=");
            out.push_str(&fmt_list(points, |p| fmt_list(p, |v| fmt_f64(*v))));
            out.push_str(",faces=");
            out.push_str(&fmt_list(faces, |f| fmt_list(f, |i| i.to_string())));
            out
        }
        Operation::Native { tag, bytes } => format!(
            "tag={},len={},blake3={}",
            tag,
            bytes.len(),
            blake3::hash(bytes).to_hex()
        ),
        Operation::Transform { matrix } => fmt_matrix(matrix),
        Operation::Flush { axes } => fmt_list(axes, fmt_flush),
        Operation::Union | Operation::Difference | Operation::Intersection => String::new(),
        Operation::Subdivide { levels } => format!("levels={levels}"),
    }
}
