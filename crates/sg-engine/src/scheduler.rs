//! Scheduler / evaluator
//!
//! A run plans the subgraph reachable from the requested outputs, then
//! evaluates it either on the calling thread in plan order or on a scoped
//! worker pool draining a shared ready queue. Workers never hold the queue
//! lock across a compute call.
//!
//! Failure flows upward only: a node whose operand failed is marked failed
//! without computing. A fatal error stops new dispatch; in-flight work is
//! allowed to finish.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use sg_core::Value;
use tracing::{debug, trace};

use crate::cache::DiskCache;
use crate::config::EngineConfig;
use crate::diagnostics::{Diagnostics, Severity, WarningCategory, escape};
use crate::graph::{NodeHandle, NodeId, NodeState};
use crate::kernel::ComputeBackend;

/// Outcome of one evaluation run
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Nodes whose compute step was started, in dispatch order
    pub dispatched: Vec<NodeId>,
    /// Nodes restored from the disk cache
    pub restored: Vec<NodeId>,
    /// Whether a fatal error stopped dispatch
    pub aborted: bool,
    pub errors: usize,
    pub warnings: usize,
}

/// Evaluates requested nodes against a backend
pub struct Evaluator<'a> {
    backend: &'a dyn ComputeBackend,
    config: &'a EngineConfig,
    cache: Option<&'a DiskCache>,
}

struct Run<'a> {
    evaluator: &'a Evaluator<'a>,
    diagnostics: Diagnostics,
    dispatched: Mutex<Vec<NodeId>>,
    restored: Mutex<Vec<NodeId>>,
}

/// The ready queue shared by pool workers
struct Queue {
    ready: VecDeque<usize>,
    pending: Vec<usize>,
    in_flight: usize,
    remaining: usize,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator
    pub fn new(
        backend: &'a dyn ComputeBackend,
        config: &'a EngineConfig,
        cache: Option<&'a DiskCache>,
    ) -> Self {
        Self {
            backend,
            config,
            cache,
        }
    }

    /// Evaluate everything `outputs` needs
    pub fn run(&self, outputs: &[NodeHandle]) -> Evaluation {
        let run = Run {
            evaluator: self,
            diagnostics: Diagnostics::new(self.config.warnings.clone()),
            dispatched: Mutex::new(Vec::new()),
            restored: Mutex::new(Vec::new()),
        };

        let plan = run.plan(outputs);
        debug!(
            nodes = plan.len(),
            workers = self.config.workers,
            "Evaluation planned"
        );

        if self.config.workers == 0 || plan.len() <= 1 {
            run.sequential(&plan);
        } else {
            run.parallel(&plan, self.config.workers.min(plan.len()));
        }

        let aborted = run.diagnostics.should_abort();
        if aborted {
            run.sweep(&plan);
        }

        Evaluation {
            dispatched: run.dispatched.into_inner(),
            restored: run.restored.into_inner(),
            aborted,
            errors: run.diagnostics.error_count(),
            warnings: run.diagnostics.warning_count(),
        }
    }
}

impl Run<'_> {
    /// Post-order list of the unevaluated nodes `outputs` depend on
    ///
    /// Nodes restored from the disk cache are not descended into.
    fn plan(&self, outputs: &[NodeHandle]) -> Vec<NodeHandle> {
        let mut order = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut stack: Vec<(NodeHandle, bool)> =
            outputs.iter().rev().map(|o| (o.clone(), false)).collect();

        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
                continue;
            }
            if !seen.insert(node.id()) || node.state() != NodeState::Unevaluated {
                continue;
            }
            if self.probe_cache(&node) {
                continue;
            }
            stack.push((node.clone(), true));
            for operand in node.operands().iter().rev() {
                stack.push((operand.clone(), false));
            }
        }
        order
    }

    fn probe_cache(&self, node: &NodeHandle) -> bool {
        let Some(cache) = self.evaluator.cache else {
            return false;
        };
        match cache.load(node.descriptor()) {
            Ok(Some(value)) => {
                for (key, stat) in value.statistics() {
                    node.annotate(key, stat);
                }
                if node.restore(Arc::new(value)) {
                    node.annotate("cache", "hit");
                    self.restored.lock().push(node.id());
                    trace!(node = %node.id(), "Restored from disk cache");
                    return true;
                }
                false
            }
            Ok(None) => false,
            Err(e) => {
                self.diagnostics.message(
                    node,
                    Severity::Warning,
                    Some(WarningCategory::CacheLoad),
                    &format!("ignoring unreadable cached artifact: {}", escape(&e.to_string())),
                );
                false
            }
        }
    }

    fn sequential(&self, plan: &[NodeHandle]) {
        for node in plan {
            if self.diagnostics.should_abort() {
                break;
            }
            self.process(node);
        }
    }

    fn parallel(&self, plan: &[NodeHandle], workers: usize) {
        let index: HashMap<NodeId, usize> =
            plan.iter().enumerate().map(|(i, n)| (n.id(), i)).collect();
        let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); plan.len()];
        let mut pending = vec![0usize; plan.len()];
        for (i, node) in plan.iter().enumerate() {
            for operand in node.operands() {
                if let Some(&j) = index.get(&operand.id()) {
                    consumers[j].push(i);
                    pending[i] += 1;
                }
            }
        }
        let ready = (0..plan.len()).filter(|&i| pending[i] == 0).collect();

        let queue = Mutex::new(Queue {
            ready,
            pending,
            in_flight: 0,
            remaining: plan.len(),
        });
        let wakeup = Condvar::new();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| self.worker(plan, &consumers, &queue, &wakeup));
            }
        });
    }

    fn worker(&self, plan: &[NodeHandle], consumers: &[Vec<usize>], queue: &Mutex<Queue>, wakeup: &Condvar) {
        loop {
            let next = {
                let mut q = queue.lock();
                loop {
                    if q.remaining == 0 || self.diagnostics.should_abort() {
                        wakeup.notify_all();
                        return;
                    }
                    if let Some(i) = q.ready.pop_front() {
                        q.in_flight += 1;
                        break i;
                    }
                    if q.in_flight == 0 {
                        return;
                    }
                    wakeup.wait(&mut q);
                }
            };

            self.process(&plan[next]);

            let mut q = queue.lock();
            q.in_flight -= 1;
            q.remaining -= 1;
            for &consumer in &consumers[next] {
                q.pending[consumer] -= 1;
                if q.pending[consumer] == 0 {
                    q.ready.push_back(consumer);
                }
            }
            wakeup.notify_all();
        }
    }

    /// Evaluate one node whose operands are all terminal
    fn process(&self, node: &NodeHandle) {
        if let Some(failed) = node.failed_operand() {
            self.fail_by_dependency(node, failed);
            return;
        }
        if !node.try_begin() {
            return;
        }
        self.dispatched.lock().push(node.id());
        trace!(node = %node.id(), kind = node.operation().type_name(), "Dispatching");

        for (category, template) in node.operation().lint() {
            self.diagnostics
                .message(node, Severity::Warning, Some(category), &template);
        }

        let operands: Option<Vec<Arc<Value>>> = node.operands().iter().map(|o| o.value()).collect();
        let result = match operands {
            Some(values) => node
                .operation()
                .execute(self.evaluator.backend, &values)
                .map_err(|e| e.to_string()),
            None => Err("operand value unavailable".to_string()),
        };

        match result {
            Ok(value) => self.finish(node, value),
            Err(reason) => {
                node.fail(reason.clone());
                self.diagnostics.message(
                    node,
                    Severity::Error,
                    None,
                    &format!("evaluation failed: {}", escape(&reason)),
                );
            }
        }
    }

    fn finish(&self, node: &NodeHandle, value: Value) {
        if value.is_empty() {
            self.diagnostics.message(
                node,
                Severity::Warning,
                Some(WarningCategory::EmptyResult),
                "%D produced an empty result",
            );
        } else if value.as_polyhedron().is_some_and(|p| p.is_degenerate()) {
            self.diagnostics.message(
                node,
                Severity::Warning,
                Some(WarningCategory::DegenerateGeometry),
                "result encloses no volume",
            );
        }
        for (key, stat) in value.statistics() {
            node.annotate(key, stat);
        }

        let value = Arc::new(value);
        node.complete(value.clone());

        if let Some(cache) = self.evaluator.cache {
            match cache.store(node.descriptor(), &value) {
                Ok(true) => node.annotate("cache", "stored"),
                Ok(false) => {}
                Err(e) => {
                    self.diagnostics.message(
                        node,
                        Severity::Warning,
                        Some(WarningCategory::CacheStore),
                        &format!("could not persist artifact: {}", escape(&e.to_string())),
                    );
                }
            }
        }
    }

    fn fail_by_dependency(&self, node: &NodeHandle, failed: &NodeHandle) {
        if node.fail_by_dependency(failed) {
            self.diagnostics.message(
                node,
                Severity::Note,
                None,
                &format!("not evaluated: operand {} failed", failed.id()),
            );
        }
    }

    /// Propagate failures through whatever an abort left unevaluated
    fn sweep(&self, plan: &[NodeHandle]) {
        for node in plan {
            if node.state() != NodeState::Unevaluated {
                continue;
            }
            if let Some(failed) = node.failed_operand() {
                self.fail_by_dependency(node, failed);
            }
        }
    }
}
