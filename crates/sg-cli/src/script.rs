//! Construction scripts
//!
//! A script is a RON file listing named steps, each referring to earlier
//! steps by name, plus the step names to evaluate:
//!
//! ```ron
//! (
//!     steps: [
//!         (name: "plate", op: Cube(size: (10.0, 10.0, 2.0), center: true)),
//!         (name: "pin", op: Cylinder(height: 6.0, radius: 1.0)),
//!         (name: "lifted", op: Translate(offset: (0.0, 0.0, 4.0), of: "pin")),
//!         (name: "part", op: Union(["plate", "lifted"])),
//!     ],
//!     outputs: ["part"],
//! )
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{DMat4, DVec3};
use serde::Deserialize;
use sg_engine::{ConstructionError, FlushAxis, Graph, NodeHandle, Operation};
use thiserror::Error;

/// Script loading and building errors
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Cannot read {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Step '{step}' refers to unknown step '{reference}'")]
    UnknownStep { step: String, reference: String },

    #[error("Step name '{0}' is used twice")]
    DuplicateStep(String),

    #[error("Step '{step}': {source}")]
    Construction {
        step: String,
        #[source]
        source: ConstructionError,
    },

    #[error("Output '{0}' is not a step")]
    UnknownOutput(String),

    #[error("Script requests no outputs")]
    NoOutputs,
}

/// A parsed script
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
    pub outputs: Vec<String>,
}

/// One named construction step
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub name: String,
    pub op: StepOp,
}

/// Operations as written in scripts
#[derive(Debug, Clone, Deserialize)]
pub enum StepOp {
    Cube {
        size: [f64; 3],
        #[serde(default)]
        center: bool,
    },
    Sphere {
        radius: f64,
        #[serde(default)]
        segments: Option<(u32, u32)>,
    },
    Cylinder {
        height: f64,
        radius: f64,
        /// Top radius, defaults to `radius`
        #[serde(default)]
        top: Option<f64>,
        #[serde(default)]
        segments: Option<u32>,
        #[serde(default)]
        center: bool,
    },
    Polygon {
        sides: u32,
        radius: f64,
    },
    Polyhedron {
        points: Vec<[f64; 3]>,
        faces: Vec<Vec<usize>>,
    },
    Native {
        tag: String,
        bytes: Vec<u8>,
    },
    Translate {
        offset: [f64; 3],
        of: String,
    },
    Rotate {
        degrees: [f64; 3],
        of: String,
    },
    Scale {
        factors: [f64; 3],
        of: String,
    },
    Mirror {
        normal: [f64; 3],
        of: String,
    },
    /// Row-major affine matrix
    Multmatrix {
        rows: [[f64; 4]; 4],
        of: String,
    },
    /// Per-axis (min, max) bias coefficients
    Flush {
        axes: [(f64, f64); 3],
        of: String,
    },
    Union(Vec<String>),
    Difference(Vec<String>),
    Intersection(Vec<String>),
    Subdivide {
        levels: u32,
        of: String,
    },
}

impl StepOp {
    /// The operation and the names of its operands
    fn lower(&self) -> (Operation, Vec<&str>) {
        use sg_core::constants::{CYLINDER_SEGMENTS, SPHERE_LAT_SEGMENTS, SPHERE_LON_SEGMENTS};

        match self {
            StepOp::Cube { size, center } => (
                Operation::Cube {
                    size: *size,
                    center: *center,
                },
                vec![],
            ),
            StepOp::Sphere { radius, segments } => {
                let (lat_segments, lon_segments) =
                    segments.unwrap_or((SPHERE_LAT_SEGMENTS, SPHERE_LON_SEGMENTS));
                (
                    Operation::Sphere {
                        radius: *radius,
                        lat_segments,
                        lon_segments,
                    },
                    vec![],
                )
            }
            StepOp::Cylinder {
                height,
                radius,
                top,
                segments,
                center,
            } => (
                Operation::Cylinder {
                    height: *height,
                    r1: *radius,
                    r2: top.unwrap_or(*radius),
                    segments: segments.unwrap_or(CYLINDER_SEGMENTS),
                    center: *center,
                },
                vec![],
            ),
            StepOp::Polygon { sides, radius } => (
                Operation::Polygon {
                    sides: *sides,
                    radius: *radius,
                },
                vec![],
            ),
            StepOp::Polyhedron { points, faces } => (
                Operation::Polyhedron {
                    points: points.clone(),
                    faces: faces.clone(),
                },
                vec![],
            ),
            StepOp::Native { tag, bytes } => (
                Operation::Native {
                    tag: tag.clone(),
                    bytes: Arc::new(bytes.clone()),
                },
                vec![],
            ),
            StepOp::Translate { offset, of } => {
                (Operation::translate(DVec3::from_array(*offset)), vec![of.as_str()])
            }
            StepOp::Rotate { degrees, of } => {
                (Operation::rotate(DVec3::from_array(*degrees)), vec![of.as_str()])
            }
            StepOp::Scale { factors, of } => {
                (Operation::scale(DVec3::from_array(*factors)), vec![of.as_str()])
            }
            StepOp::Mirror { normal, of } => {
                (Operation::mirror(DVec3::from_array(*normal)), vec![of.as_str()])
            }
            StepOp::Multmatrix { rows, of } => (
                Operation::Transform {
                    matrix: DMat4::from_cols_array_2d(rows).transpose(),
                },
                vec![of.as_str()],
            ),
            StepOp::Flush { axes, of } => (
                Operation::Flush {
                    axes: (*axes).map(|(min, max)| FlushAxis::new(min, max)),
                },
                vec![of.as_str()],
            ),
            StepOp::Union(names) => (Operation::Union, names.iter().map(String::as_str).collect()),
            StepOp::Difference(names) => (
                Operation::Difference,
                names.iter().map(String::as_str).collect(),
            ),
            StepOp::Intersection(names) => (
                Operation::Intersection,
                names.iter().map(String::as_str).collect(),
            ),
            StepOp::Subdivide { levels, of } => {
                (Operation::Subdivide { levels: *levels }, vec![of.as_str()])
            }
        }
    }
}

impl Script {
    /// Load a script from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ScriptError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ron(&content)
    }

    /// Parse a script from RON text
    pub fn from_ron(content: &str) -> Result<Self, ScriptError> {
        ron::from_str(content).map_err(|e| ScriptError::Parse(e.to_string()))
    }

    /// Register every step in `graph` and return the requested outputs
    ///
    /// Steps may only refer to steps defined before them.
    pub fn build(&self, graph: &Graph) -> Result<Vec<NodeHandle>, ScriptError> {
        if self.outputs.is_empty() {
            return Err(ScriptError::NoOutputs);
        }

        let mut nodes: HashMap<&str, NodeHandle> = HashMap::new();
        for step in &self.steps {
            if nodes.contains_key(step.name.as_str()) {
                return Err(ScriptError::DuplicateStep(step.name.clone()));
            }
            let (op, operand_names) = step.op.lower();
            let operands = operand_names
                .into_iter()
                .map(|name| {
                    nodes
                        .get(name)
                        .cloned()
                        .ok_or_else(|| ScriptError::UnknownStep {
                            step: step.name.clone(),
                            reference: name.to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let node = graph
                .add(op, operands)
                .map_err(|source| ScriptError::Construction {
                    step: step.name.clone(),
                    source,
                })?;
            tracing::debug!(step = %step.name, node = %node.id(), "Step registered");
            nodes.insert(step.name.as_str(), node);
        }

        self.outputs
            .iter()
            .map(|name| {
                nodes
                    .get(name.as_str())
                    .cloned()
                    .ok_or_else(|| ScriptError::UnknownOutput(name.clone()))
            })
            .collect()
    }
}
