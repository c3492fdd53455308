//! Persistence artifact encoding
//!
//! An artifact is a text header followed by one of two bodies:
//!
//! ```text
//! sg-artifact 1 polyhedron
//! descriptor cube(size=[1,1,1],center=false)
//! <point/face body>
//! ```
//!
//! or `sg-artifact 1 native <tag>` followed by a length-prefixed opaque
//! body written verbatim. Both are plain streams; compression is layered
//! on top by [`crate::compress`].

mod native;
mod point_face;

use std::io::{self, BufRead, Write};

use crate::constants::ARTIFACT_VERSION;
use crate::geometry::Value;

pub use native::{read_native, write_native};
pub use point_face::{read_polyhedron, write_polyhedron};

const MAGIC: &str = "sg-artifact";

/// Artifact read/write errors
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed artifact at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("Unsupported artifact version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },
    #[error("Artifact belongs to a different construction")]
    DescriptorMismatch,
    #[error("Cannot encode: {0}")]
    Unencodable(String),
}

impl ArtifactError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        ArtifactError::Malformed {
            line,
            reason: reason.into(),
        }
    }
}

/// Line-oriented reader that keeps track of the current line number
pub struct LineReader<'a, R: BufRead> {
    input: &'a mut R,
    line: usize,
    buf: String,
}

impl<'a, R: BufRead> LineReader<'a, R> {
    /// Wrap `input` for line-counted reading
    pub fn new(input: &'a mut R) -> Self {
        Self {
            input,
            line: 0,
            buf: String::new(),
        }
    }

    /// Current (1-based) line number
    pub fn line(&self) -> usize {
        self.line
    }

    /// Read the next line without its terminator
    pub fn next_line(&mut self) -> Result<&str, ArtifactError> {
        self.buf.clear();
        let read = self.input.read_line(&mut self.buf)?;
        self.line += 1;
        if read == 0 {
            return Err(ArtifactError::malformed(self.line, "unexpected end of file"));
        }
        Ok(self.buf.trim_end_matches(['\n', '\r']))
    }

    /// Read the next line and parse it as a single count
    pub fn next_count(&mut self, what: &str) -> Result<usize, ArtifactError> {
        let line = self.line + 1;
        let text = self.next_line()?.trim().to_string();
        text.parse()
            .map_err(|_| ArtifactError::malformed(line, format!("invalid {what} count '{text}'")))
    }

    /// Access the underlying reader for raw payloads
    pub fn raw(&mut self) -> &mut R {
        self.input
    }
}

/// Write a complete artifact for `value`, tagged with its descriptor
pub fn write_artifact<W: Write>(
    out: &mut W,
    descriptor: &str,
    value: &Value,
) -> Result<(), ArtifactError> {
    if descriptor.contains('\n') {
        return Err(ArtifactError::Unencodable(
            "descriptor spans multiple lines".into(),
        ));
    }

    match value {
        Value::Polyhedron(p) => {
            writeln!(out, "{MAGIC} {ARTIFACT_VERSION} polyhedron")?;
            writeln!(out, "descriptor {descriptor}")?;
            write_polyhedron(out, p)
        }
        Value::Native(n) => {
            if n.tag.is_empty() || n.tag.contains(char::is_whitespace) {
                return Err(ArtifactError::Unencodable(format!(
                    "invalid native tag '{}'",
                    n.tag
                )));
            }
            writeln!(out, "{MAGIC} {ARTIFACT_VERSION} native {}", n.tag)?;
            writeln!(out, "descriptor {descriptor}")?;
            write_native(out, n)
        }
    }
}

/// Read an artifact, checking it was written for `descriptor`
pub fn read_artifact<R: BufRead>(input: &mut R, descriptor: &str) -> Result<Value, ArtifactError> {
    let mut lines = LineReader::new(input);

    let header = lines.next_line()?.to_string();
    let mut parts = header.split_whitespace();
    if parts.next() != Some(MAGIC) {
        return Err(ArtifactError::malformed(1, "missing artifact header"));
    }
    let version: u32 = parts
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ArtifactError::malformed(1, "missing version"))?;
    if version != ARTIFACT_VERSION {
        return Err(ArtifactError::VersionMismatch {
            found: version,
            expected: ARTIFACT_VERSION,
        });
    }
    let encoding = parts.next().map(str::to_string);
    let tag = parts.next().map(str::to_string);

    let stored = lines.next_line()?;
    match stored.strip_prefix("descriptor ") {
        Some(d) if d == descriptor => {}
        Some(_) => return Err(ArtifactError::DescriptorMismatch),
        None => return Err(ArtifactError::malformed(2, "missing descriptor line")),
    }

    match (encoding.as_deref(), tag) {
        (Some("polyhedron"), None) => Ok(Value::Polyhedron(read_polyhedron(&mut lines)?)),
        (Some("native"), Some(tag)) => Ok(Value::Native(read_native(&mut lines, tag)?)),
        (other, _) => Err(ArtifactError::malformed(
            1,
            format!("unknown encoding {:?}", other),
        )),
    }
}
