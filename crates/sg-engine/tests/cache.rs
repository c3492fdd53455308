//! Disk cache round trips through the engine

mod common;

use std::fs;
use std::path::Path;

use glam::DVec3;
use pretty_assertions::assert_eq;
use sg_engine::{Engine, EngineConfig, NodeHandle, NodeState, Severity, WarningCategory};

fn cached_config(dir: &Path) -> EngineConfig {
    let mut config = common::config(0);
    config.cache.dir = Some(dir.to_path_buf());
    config.cache.size_threshold = 0;
    config
}

fn scene(engine: &Engine) -> (NodeHandle, NodeHandle) {
    let graph = engine.graph();
    let base = graph.cylinder(4.0, 2.0, 1.0, true).unwrap();
    let top = graph.rotate(DVec3::new(90.0, 0.0, 0.0), &base).unwrap();
    (base, top)
}

#[test]
fn value_survives_a_fresh_engine() {
    let tmp = tempfile::tempdir().unwrap();

    let original = {
        let engine = Engine::new(cached_config(tmp.path())).unwrap();
        let (_, top) = scene(&engine);
        let report = engine.evaluate(&[top.clone()]);
        assert!(report.success());
        assert_eq!(report.cache.map(|c| c.stores), Some(2));
        assert_eq!(top.annotation("cache").as_deref(), Some("stored"));
        top.value().unwrap()
    };

    let engine = Engine::new(cached_config(tmp.path())).unwrap();
    let (base, top) = scene(&engine);
    let report = engine.evaluate(&[top.clone()]);

    assert!(report.success());
    assert!(report.evaluated.is_empty());
    assert_eq!(report.restored, vec![top.id()]);
    assert_eq!(top.annotation("cache").as_deref(), Some("hit"));
    // operands of a restored node are never needed
    assert_eq!(base.state(), NodeState::Unevaluated);
    assert_eq!(top.value().unwrap().as_ref(), original.as_ref());
}

#[test]
fn corrupt_artifact_is_recomputed_with_warning() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = Engine::new(cached_config(tmp.path())).unwrap();
    let (_, top) = scene(&engine);

    let path = sg_engine::DiskCache::new(tmp.path(), 3, 0)
        .unwrap()
        .path_for(top.descriptor());
    fs::write(&path, b"\x28\xb5\x2f\xfd garbage").unwrap();

    let report = engine.evaluate(&[top.clone()]);

    assert!(report.success());
    assert_eq!(report.evaluated.len(), 2);
    assert_eq!(report.warnings, 1);
    let messages = top.messages();
    assert_eq!(messages[0].severity, Severity::Warning);
    assert_eq!(messages[0].category, Some(WarningCategory::CacheLoad));
    // the recomputed value replaced the bad artifact
    let fresh = Engine::new(cached_config(tmp.path())).unwrap();
    let (_, again) = scene(&fresh);
    assert_eq!(fresh.evaluate(&[again]).restored.len(), 1);
}

#[test]
fn store_failure_keeps_node_done() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("artifacts");
    let engine = Engine::new(cached_config(&dir)).unwrap();
    fs::remove_dir_all(&dir).unwrap();

    let (_, top) = scene(&engine);
    let report = engine.evaluate(&[top.clone()]);

    assert!(report.success());
    assert_eq!(top.state(), NodeState::Done);
    assert!(
        top.messages()
            .iter()
            .any(|m| m.category == Some(WarningCategory::CacheStore))
    );
    assert_eq!(report.cache.map(|c| c.store_failures), Some(2));
    assert!(!dir.exists());
}

#[test]
fn small_values_stay_in_memory() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = cached_config(tmp.path());
    config.cache.size_threshold = usize::MAX;
    let engine = Engine::new(config).unwrap();
    let (_, top) = scene(&engine);

    let report = engine.evaluate(&[top]);
    assert!(report.success());
    assert_eq!(report.cache.map(|c| c.skipped_small), Some(2));
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}
