//! Global constants for sg-core

/// Default number of segments for cylinder and polygon generation
pub const CYLINDER_SEGMENTS: u32 = 32;

/// Default number of latitude segments for sphere generation
pub const SPHERE_LAT_SEGMENTS: u32 = 16;

/// Default number of longitude segments for sphere generation
pub const SPHERE_LON_SEGMENTS: u32 = 32;

/// Minimum segment count accepted for round primitives
pub const MIN_SEGMENTS: u32 = 3;

/// Artifact format version written into every header
pub const ARTIFACT_VERSION: u32 = 1;

/// Default zstd compression level (3 = good balance of speed/size)
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;
