//! Scoped zstd stream wrappers
//!
//! [`CompressedWriter`] and [`CompressedReader`] own the codec state for one
//! read or write session. Data flows through in chunks; the payload never
//! has to be buffered whole. Calling `finish` ends the session explicitly and
//! hands back the inner stream; dropping the wrapper on any other path
//! (early `?` return, panic unwinding) still finalizes the frame and frees
//! the codec context.

use std::io::{self, BufRead, BufReader, Read, Write};

use zstd::stream::read::Decoder;
use zstd::stream::write::Encoder;

/// Compressing writer over `W`
pub struct CompressedWriter<W: Write> {
    encoder: Option<Encoder<'static, W>>,
}

impl<W: Write> CompressedWriter<W> {
    /// Start a compression session at `level` (0 = zstd default)
    pub fn new(inner: W, level: i32) -> io::Result<Self> {
        Ok(Self {
            encoder: Some(Encoder::new(inner, level)?),
        })
    }

    /// Finalize the frame and return the inner writer
    pub fn finish(mut self) -> io::Result<W> {
        match self.encoder.take() {
            Some(encoder) => encoder.finish(),
            None => Err(finished()),
        }
    }

    fn encoder(&mut self) -> io::Result<&mut Encoder<'static, W>> {
        self.encoder.as_mut().ok_or_else(finished)
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder()?.flush()
    }
}

impl<W: Write> Drop for CompressedWriter<W> {
    fn drop(&mut self) {
        if let Some(encoder) = self.encoder.take()
            && let Err(e) = encoder.finish()
        {
            tracing::debug!("Discarding unfinished compression session: {}", e);
        }
    }
}

/// Decompressing reader over `R`
pub struct CompressedReader<R: BufRead> {
    decoder: Decoder<'static, R>,
}

impl<R: BufRead> CompressedReader<R> {
    /// Start a decompression session
    pub fn new(inner: R) -> io::Result<Self> {
        Ok(Self {
            decoder: Decoder::with_buffer(inner)?,
        })
    }

    /// End the session and return the inner reader
    pub fn finish(self) -> R {
        self.decoder.finish()
    }
}

impl<R: BufRead> Read for CompressedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

fn finished() -> io::Error {
    io::Error::other("compression session already finished")
}

/// Run a write session through a compressing wrapper
///
/// The frame is finalized whether `session` succeeds or fails; on success
/// the inner writer is returned alongside the session result.
pub fn write_compressed<W, T, E, F>(inner: W, level: i32, session: F) -> Result<(T, W), E>
where
    W: Write,
    E: From<io::Error>,
    F: FnOnce(&mut CompressedWriter<W>) -> Result<T, E>,
{
    let mut writer = CompressedWriter::new(inner, level)?;
    let result = session(&mut writer)?;
    let inner = writer.finish()?;
    Ok((result, inner))
}

/// Run a read session through a decompressing wrapper
///
/// The session sees a line-buffered view of the decompressed stream.
pub fn read_compressed<R, T, E, F>(inner: R, session: F) -> Result<T, E>
where
    R: BufRead,
    E: From<io::Error>,
    F: FnOnce(&mut BufReader<CompressedReader<R>>) -> Result<T, E>,
{
    let mut reader = BufReader::new(CompressedReader::new(inner)?);
    session(&mut reader)
}
