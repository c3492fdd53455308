//! Scheduling, failure isolation and escalation

mod common;

use std::sync::atomic::Ordering;

use glam::DVec3;
use pretty_assertions::assert_eq;
use sg_engine::{
    Engine, EngineConfig, NodeState, Outcome, RewriteConfig, Severity, WarningCategory,
};

use common::{config, failing_engine};

#[test]
fn failure_stays_with_dependents() {
    for workers in [0, 1, 4] {
        let (engine, _) = failing_engine(config(workers));
        let graph = engine.graph();
        let ball = graph.sphere(1.0).unwrap();
        let lifted = graph.translate(DVec3::Z, &ball).unwrap();
        let broken = graph.union(&[lifted.clone(), graph.cube([1.0; 3], false).unwrap()]).unwrap();
        let fine = graph.cylinder(2.0, 1.0, 1.0, false).unwrap();

        let report = engine.evaluate(&[broken.clone(), fine.clone()]);

        assert!(!report.success(), "workers = {workers}");
        assert!(!report.aborted);
        assert!(matches!(report.outputs[0].outcome, Outcome::Failed));
        assert!(report.outputs[0].failure.is_some());
        assert_eq!(broken.state(), NodeState::Failed);
        assert_eq!(lifted.state(), NodeState::Failed);
        assert_eq!(
            lifted.failure().as_deref(),
            Some(format!("dependency {} failed", ball.id()).as_str())
        );

        assert!(report.outputs[1].outcome.is_done());
        assert!(report.outputs[1].failure.is_none());
        assert!(fine.value().is_some());
    }
}

#[test]
fn dependents_of_failed_nodes_never_compute() {
    let (engine, calls) = failing_engine(config(0));
    let graph = engine.graph();
    let ball = graph.sphere(1.0).unwrap();
    let scaled = graph.scale(DVec3::splat(2.0), &ball).unwrap();
    let lifted = graph.translate(DVec3::Z, &scaled).unwrap();

    let report = engine.evaluate(&[lifted.clone()]);

    // the transforms fold into one node; only the sphere reaches the backend
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.evaluated.len(), 1);
    let messages = &report.outputs[0].messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].1.severity, Severity::Error);
    assert!(messages[0].1.text.contains("spheres are broken today"));
    assert_eq!(messages[1].1.severity, Severity::Note);
}

#[test]
fn fatal_errors_abort_without_deadlock() {
    for workers in [0, 3] {
        let mut config = config(workers);
        config.warnings.fatal_errors = true;
        config.rewrite = RewriteConfig::disabled();
        let (engine, _) = failing_engine(config);
        let graph = engine.graph();

        let ball = graph.sphere(1.0).unwrap();
        let dependent = graph.translate(DVec3::X, &ball).unwrap();
        let mut independent = graph.cube([1.0; 3], false).unwrap();
        for i in 0..20 {
            independent = graph.translate(DVec3::splat(i as f64), &independent).unwrap();
        }

        let report = engine.evaluate(&[dependent.clone(), independent.clone()]);

        assert!(report.aborted, "workers = {workers}");
        assert!(!report.success());
        assert!(matches!(report.outputs[0].outcome, Outcome::Failed));
        assert!(dependent.failure().is_some());
        assert!(matches!(
            report.outputs[1].outcome,
            Outcome::Done(_) | Outcome::NotEvaluated
        ));
        if workers == 0 {
            assert!(matches!(report.outputs[1].outcome, Outcome::NotEvaluated));
            assert_eq!(independent.state(), NodeState::Unevaluated);
        }
    }
}

#[test]
fn warnings_as_errors_can_abort() {
    let mut config = EngineConfig::default();
    config.warnings.warnings_as_errors = true;
    config.warnings.fatal_errors = true;
    config.rewrite = RewriteConfig::disabled();
    let engine = Engine::new(config).unwrap();
    let graph = engine.graph();

    let a = graph.cube([1.0; 3], false).unwrap();
    let far = graph.translate(DVec3::splat(10.0), &a).unwrap();
    let empty = graph.intersection(&[a.clone(), far]).unwrap();
    let after = graph.translate(DVec3::X, &empty).unwrap();
    let unrelated = graph.sphere(1.0).unwrap();

    let report = engine.evaluate(&[after.clone(), unrelated]);

    assert!(report.aborted);
    assert_eq!(report.errors, 1);
    // the promoted warning does not fail the node that produced it
    assert_eq!(empty.state(), NodeState::Done);
    assert_eq!(empty.messages()[0].severity, Severity::Error);
    assert_eq!(empty.messages()[0].category, Some(WarningCategory::EmptyResult));
    assert!(matches!(report.outputs[0].outcome, Outcome::NotEvaluated));
}

#[test]
fn disabled_categories_are_silent() {
    let mut config = EngineConfig::default();
    config.warnings.warnings_as_errors = true;
    config.warnings.fatal_errors = true;
    config.warnings.set_category(WarningCategory::EmptyResult, false);
    let engine = Engine::new(config).unwrap();
    let graph = engine.graph();

    let a = graph.cube([1.0; 3], false).unwrap();
    let far = graph.translate(DVec3::splat(10.0), &a).unwrap();
    let empty = graph.intersection(&[a, far]).unwrap();

    let report = engine.evaluate(&[empty.clone()]);
    assert!(report.success());
    assert_eq!(report.warnings + report.errors, 0);
    assert!(empty.messages().is_empty());
}

#[test]
fn sequential_runs_are_deterministic() {
    let run = || {
        let engine = Engine::new(config(0)).unwrap();
        let graph = engine.graph();
        let base = graph.cube([2.0, 1.0, 1.0], true).unwrap();
        let ring: Vec<_> = (0..6)
            .map(|i| {
                let turned = graph.rotate(DVec3::new(0.0, 0.0, 60.0 * i as f64), &base).unwrap();
                graph.translate(DVec3::new(0.0, 0.0, i as f64 * 3.0), &turned).unwrap()
            })
            .collect();
        let all = graph.union(&ring).unwrap();
        let post = graph.subdivide(1, &all).unwrap();
        let report = engine.evaluate(&[post, ring[2].clone()]);

        let order: Vec<String> = report
            .evaluated
            .iter()
            .filter_map(|id| {
                graph
                    .nodes()
                    .into_iter()
                    .find(|n| n.id() == *id)
                    .map(|n| n.descriptor().to_string())
            })
            .collect();
        let values: Vec<_> = report
            .outputs
            .iter()
            .map(|o| o.outcome.value().cloned())
            .collect();
        (order, values)
    };

    let (order, values) = run();
    assert!(values.iter().all(Option::is_some));
    for _ in 0..3 {
        let (again_order, again_values) = run();
        assert_eq!(order, again_order);
        assert_eq!(values, again_values);
    }
}

#[test]
fn pool_and_sequential_agree() {
    let build = |workers| {
        let engine = Engine::new(config(workers)).unwrap();
        let graph = engine.graph();
        let parts: Vec<_> = (0..16)
            .map(|i| {
                let cube = graph.cube([1.0, 1.0, 1.0 + i as f64], false).unwrap();
                graph.translate(DVec3::X * (3.0 * i as f64), &cube).unwrap()
            })
            .collect();
        let all = graph.union(&parts).unwrap();
        let report = engine.evaluate(&[all]);
        assert!(report.success());
        report.outputs[0].outcome.value().cloned()
    };
    assert_eq!(build(0), build(4));
}
