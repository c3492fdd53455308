//! Generic point/face encoding
//!
//! ```text
//! n
//! x y z        (n lines, exact rationals "p" or "p/q")
//! m
//! k i0 .. ik-1 (m lines, 0-based vertex indices)
//! ```

use std::io::{BufRead, Write};

use crate::geometry::{Point3, Polyhedron, Rational};

use super::{ArtifactError, LineReader};

/// Write the point/face body of a polyhedron
pub fn write_polyhedron<W: Write>(out: &mut W, polyhedron: &Polyhedron) -> Result<(), ArtifactError> {
    writeln!(out, "{}", polyhedron.vertices.len())?;
    for v in &polyhedron.vertices {
        writeln!(out, "{} {} {}", v[0], v[1], v[2])?;
    }

    writeln!(out, "{}", polyhedron.faces.len())?;
    for face in &polyhedron.faces {
        write!(out, "{}", face.len())?;
        for index in face {
            write!(out, " {index}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Read the point/face body of a polyhedron
pub fn read_polyhedron<R: BufRead>(lines: &mut LineReader<'_, R>) -> Result<Polyhedron, ArtifactError> {
    let vertex_count = lines.next_count("vertex")?;
    let mut vertices: Vec<Point3> = Vec::with_capacity(vertex_count.min(1 << 20));
    for _ in 0..vertex_count {
        let line_no = lines.line() + 1;
        let line = lines.next_line()?;
        let coords = line
            .split_whitespace()
            .map(|c| c.parse::<Rational>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ArtifactError::malformed(line_no, format!("bad coordinate: {e}")))?;
        let [x, y, z]: [Rational; 3] = coords
            .try_into()
            .map_err(|_| ArtifactError::malformed(line_no, "expected three coordinates"))?;
        vertices.push([x, y, z]);
    }

    let face_count = lines.next_count("face")?;
    let mut faces = Vec::with_capacity(face_count.min(1 << 20));
    for _ in 0..face_count {
        let line_no = lines.line() + 1;
        let line = lines.next_line()?;
        let numbers = line
            .split_whitespace()
            .map(|t| t.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ArtifactError::malformed(line_no, format!("bad index: {e}")))?;
        let (&k, indices) = numbers
            .split_first()
            .ok_or_else(|| ArtifactError::malformed(line_no, "empty face line"))?;
        if indices.len() != k {
            return Err(ArtifactError::malformed(
                line_no,
                format!("face declares {k} vertices but lists {}", indices.len()),
            ));
        }
        if let Some(bad) = indices.iter().find(|&&i| i >= vertex_count) {
            return Err(ArtifactError::malformed(
                line_no,
                format!("vertex index {bad} out of range"),
            ));
        }
        faces.push(indices.to_vec());
    }

    Ok(Polyhedron::new(vertices, faces))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ratio;

    #[test]
    fn test_exact_rationals_survive() {
        let tri = Polyhedron::new(
            vec![
                [ratio(1, 3), ratio(-2, 7), ratio(0, 1)],
                [ratio(5, 1), ratio(0, 1), ratio(1, 1)],
                [ratio(0, 1), ratio(1, 1), ratio(-9, 4)],
            ],
            vec![vec![0, 1, 2]],
        );
        let mut out = Vec::new();
        write_polyhedron(&mut out, &tri).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.starts_with("3\n1/3 -2/7 0\n"));
        assert!(text.ends_with("1\n3 0 1 2\n"));

        let mut input = out.as_slice();
        let mut lines = LineReader::new(&mut input);
        assert_eq!(read_polyhedron(&mut lines).unwrap(), tri);
    }

    #[test]
    fn test_face_arity_mismatch() {
        let text = "3\n0 0 0\n1 0 0\n0 1 0\n1\n4 0 1 2\n";
        let mut input = text.as_bytes();
        let mut lines = LineReader::new(&mut input);
        let err = read_polyhedron(&mut lines).unwrap_err();
        assert!(matches!(err, ArtifactError::Malformed { line: 6, .. }));
    }

    #[test]
    fn test_index_out_of_range() {
        let text = "1\n0 0 0\n1\n3 0 1 2\n";
        let mut input = text.as_bytes();
        let mut lines = LineReader::new(&mut input);
        assert!(read_polyhedron(&mut lines).is_err());
    }
}
