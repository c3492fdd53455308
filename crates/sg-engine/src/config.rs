//! Engine configuration
//!
//! One immutable value handed to the rewrite engine and the scheduler at the
//! start of a run. Loadable from a RON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sg_core::constants::DEFAULT_COMPRESSION_LEVEL;
use thiserror::Error;

use crate::diagnostics::WarningPolicy;

/// Rewrite pass configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RewriteConfig {
    /// Maximum number of fold passes (0 = no rewriting)
    pub max_passes: u32,
    /// Compose successive transforms
    pub fold_transforms: bool,
    /// Merge successive flush coefficients
    pub fold_flush: bool,
    /// Flatten nested booleans of the same kind
    pub fold_booleans: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            max_passes: 4,
            fold_transforms: true,
            fold_flush: true,
            fold_booleans: true,
        }
    }
}

impl RewriteConfig {
    /// Rewriting switched off
    pub fn disabled() -> Self {
        Self {
            max_passes: 0,
            ..Self::default()
        }
    }
}

/// On-disk cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Artifact directory; `None` disables the disk tier
    pub dir: Option<PathBuf>,
    /// zstd level
    pub compression_level: i32,
    /// Only values whose estimated size exceeds this many bytes are stored
    pub size_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            size_threshold: 4096,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads (0 = evaluate on the calling thread in a fixed order)
    pub workers: usize,
    pub rewrite: RewriteConfig,
    pub cache: CacheConfig,
    pub warnings: WarningPolicy,
}

impl EngineConfig {
    /// Load from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ron(&content)
    }

    /// Parse from RON text
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            ron::from_str(content).map_err(|e| ConfigError::Deserialize(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let level = self.cache.compression_level;
        if !(0..=22).contains(&level) {
            return Err(ConfigError::Invalid(format!(
                "compression level {level} outside 0..=22"
            )));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },

    #[error("Deserialization error: {0}")]
    Deserialize(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
