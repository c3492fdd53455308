//! Opaque native encoding, written verbatim behind a length line

use std::io::{BufRead, Read, Write};

use crate::geometry::NativePayload;

use super::{ArtifactError, LineReader};

/// Write a native payload body
pub fn write_native<W: Write>(out: &mut W, payload: &NativePayload) -> Result<(), ArtifactError> {
    writeln!(out, "{}", payload.bytes.len())?;
    out.write_all(&payload.bytes)?;
    Ok(())
}

/// Read a native payload body
pub fn read_native<R: BufRead>(
    lines: &mut LineReader<'_, R>,
    tag: String,
) -> Result<NativePayload, ArtifactError> {
    let len = lines.next_count("byte")?;
    let line = lines.line();
    let mut bytes = Vec::with_capacity(len.min(1 << 24));
    let read = lines.raw().take(len as u64).read_to_end(&mut bytes)?;
    if read != len {
        return Err(ArtifactError::malformed(
            line,
            format!("native payload truncated ({read} of {len} bytes)"),
        ));
    }
    Ok(NativePayload { tag, bytes })
}
