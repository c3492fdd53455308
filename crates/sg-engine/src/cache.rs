//! On-disk artifact cache
//!
//! Values are persisted as zstd-compressed artifacts named after the
//! blake3 hash of their descriptor. The in-memory node value is always
//! authoritative: a failed load is a miss and a failed store only loses the
//! artifact.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use sg_core::{ArtifactError, Value, read_artifact, read_compressed, write_artifact, write_compressed};
use thiserror::Error;
use tracing::debug;

use crate::config::CacheConfig;

/// Artifact file extension
pub const ARTIFACT_EXTENSION: &str = "sga";

/// Errors while reading or writing artifacts
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Cache counters for one engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub corrupt: usize,
    pub stores: usize,
    pub store_failures: usize,
    pub skipped_small: usize,
}

/// Deletes a partially written artifact unless disarmed
struct PartialArtifact {
    path: PathBuf,
    armed: bool,
}

impl PartialArtifact {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialArtifact {
    fn drop(&mut self) {
        if self.armed
            && let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            debug!("Failed to remove partial artifact {:?}: {}", self.path, e);
        }
    }
}

/// Compressed artifact store keyed by descriptor
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
    compression_level: i32,
    size_threshold: usize,
    stats: Mutex<CacheStats>,
    sequence: AtomicU64,
}

impl DiskCache {
    /// Open a cache in `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>, compression_level: i32, size_threshold: usize) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            compression_level,
            size_threshold,
            stats: Mutex::new(CacheStats::default()),
            sequence: AtomicU64::new(0),
        })
    }

    /// Open the configured cache, `None` when the disk tier is off
    pub fn open(config: &CacheConfig) -> Result<Option<Self>, PersistenceError> {
        config
            .dir
            .as_ref()
            .map(|dir| Self::new(dir, config.compression_level, config.size_threshold))
            .transpose()
    }

    /// Artifact directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }

    /// Artifact path for a descriptor
    pub fn path_for(&self, descriptor: &str) -> PathBuf {
        let key = blake3::hash(descriptor.as_bytes()).to_hex();
        self.dir.join(format!("{}.{}", key.as_str(), ARTIFACT_EXTENSION))
    }

    /// Load the artifact for `descriptor`
    ///
    /// `Ok(None)` is a plain miss; an error means an artifact existed but
    /// could not be used.
    pub fn load(&self, descriptor: &str) -> Result<Option<Value>, PersistenceError> {
        let path = self.path_for(descriptor);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.stats.lock().misses += 1;
                return Ok(None);
            }
            Err(e) => {
                self.stats.lock().corrupt += 1;
                return Err(e.into());
            }
        };

        match read_compressed(BufReader::new(file), |r| read_artifact(r, descriptor)) {
            Ok(value) => {
                self.stats.lock().hits += 1;
                debug!("Loaded artifact {:?}", path);
                Ok(Some(value))
            }
            Err(e) => {
                self.stats.lock().corrupt += 1;
                Err(e.into())
            }
        }
    }

    /// Persist `value`; returns false when it is below the size threshold
    pub fn store(&self, descriptor: &str, value: &Value) -> Result<bool, PersistenceError> {
        if value.estimated_size() <= self.size_threshold {
            self.stats.lock().skipped_small += 1;
            return Ok(false);
        }
        match self.write(descriptor, value) {
            Ok(()) => {
                self.stats.lock().stores += 1;
                Ok(true)
            }
            Err(e) => {
                self.stats.lock().store_failures += 1;
                Err(e)
            }
        }
    }

    fn write(&self, descriptor: &str, value: &Value) -> Result<(), PersistenceError> {
        let path = self.path_for(descriptor);
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), sequence));

        let guard = PartialArtifact::new(tmp.clone());
        let file = BufWriter::new(File::create(&tmp)?);
        let ((), file) = write_compressed(file, self.compression_level, |w| {
            write_artifact(w, descriptor, value)
        })?;
        file.into_inner().map_err(io::IntoInnerError::into_error)?;
        fs::rename(&tmp, &path)?;
        guard.disarm();

        debug!("Stored artifact {:?}", path);
        Ok(())
    }
}
