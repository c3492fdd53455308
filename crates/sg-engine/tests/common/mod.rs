//! Shared test fixtures

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::DMat4;
use sg_core::Value;
use sg_engine::{
    BooleanType, CadError, CadResult, ComputeBackend, Engine, EngineConfig, FlushAxis, MeshBackend,
};

/// Mesh backend that refuses to build spheres and counts compute calls
#[derive(Debug, Default)]
pub struct SphereFailingBackend {
    inner: MeshBackend,
    pub calls: Arc<AtomicUsize>,
}

impl SphereFailingBackend {
    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl ComputeBackend for SphereFailingBackend {
    fn name(&self) -> &str {
        "sphere-failing"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn create_box(&self, size: [f64; 3], center: bool) -> CadResult<Value> {
        self.count();
        self.inner.create_box(size, center)
    }

    fn create_sphere(&self, _radius: f64, _lat: u32, _lon: u32) -> CadResult<Value> {
        self.count();
        Err(CadError::InvalidGeometry("spheres are broken today".into()))
    }

    fn create_cylinder(&self, h: f64, r1: f64, r2: f64, segments: u32, center: bool) -> CadResult<Value> {
        self.count();
        self.inner.create_cylinder(h, r1, r2, segments, center)
    }

    fn create_polygon(&self, sides: u32, radius: f64) -> CadResult<Value> {
        self.count();
        self.inner.create_polygon(sides, radius)
    }

    fn create_polyhedron(&self, points: &[[f64; 3]], faces: &[Vec<usize>]) -> CadResult<Value> {
        self.count();
        self.inner.create_polyhedron(points, faces)
    }

    fn import_native(&self, tag: &str, bytes: &[u8]) -> CadResult<Value> {
        self.count();
        self.inner.import_native(tag, bytes)
    }

    fn transform(&self, value: &Value, matrix: &DMat4) -> CadResult<Value> {
        self.count();
        self.inner.transform(value, matrix)
    }

    fn flush(&self, value: &Value, axes: &[FlushAxis; 3]) -> CadResult<Value> {
        self.count();
        self.inner.flush(value, axes)
    }

    fn boolean(&self, operands: &[Arc<Value>], op: BooleanType) -> CadResult<Value> {
        self.count();
        self.inner.boolean(operands, op)
    }

    fn subdivide(&self, value: &Value, levels: u32) -> CadResult<Value> {
        self.count();
        self.inner.subdivide(value, levels)
    }
}

/// Engine over [`SphereFailingBackend`] plus a handle on its call counter
pub fn failing_engine(config: EngineConfig) -> (Engine, Arc<AtomicUsize>) {
    let backend = SphereFailingBackend::default();
    let calls = backend.calls.clone();
    let engine = Engine::with_backend(config, Box::new(backend)).unwrap();
    (engine, calls)
}

pub fn config(workers: usize) -> EngineConfig {
    EngineConfig {
        workers,
        ..EngineConfig::default()
    }
}
