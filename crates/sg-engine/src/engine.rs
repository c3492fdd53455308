//! Engine facade
//!
//! Owns the graph, the backend, the configuration and the optional disk
//! cache; each `evaluate` call rewrites, evaluates and reports.

use tracing::info;

use crate::cache::{CacheStats, DiskCache, PersistenceError};
use crate::config::EngineConfig;
use crate::graph::{Graph, NodeHandle};
use crate::kernel::{ComputeBackend, default_backend};
use crate::report::RunReport;
use crate::rewrite::RewriteEngine;
use crate::scheduler::Evaluator;

/// The operation graph engine
pub struct Engine {
    graph: Graph,
    backend: Box<dyn ComputeBackend>,
    config: EngineConfig,
    cache: Option<DiskCache>,
}

impl Engine {
    /// Create an engine using the default backend
    pub fn new(config: EngineConfig) -> Result<Self, PersistenceError> {
        Self::with_backend(config, default_backend())
    }

    /// Create an engine with a specific backend
    pub fn with_backend(
        config: EngineConfig,
        backend: Box<dyn ComputeBackend>,
    ) -> Result<Self, PersistenceError> {
        let cache = DiskCache::open(&config.cache)?;
        if let Some(cache) = &cache {
            info!("Disk cache at {:?}", cache.dir());
        }
        Ok(Self {
            graph: Graph::new(),
            backend,
            config,
            cache,
        })
    }

    /// The node registry
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The compute backend
    pub fn backend(&self) -> &dyn ComputeBackend {
        self.backend.as_ref()
    }

    /// Disk cache counters, if a cache is configured
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(DiskCache::stats)
    }

    /// Rewrite and evaluate everything `outputs` needs
    pub fn evaluate(&self, outputs: &[NodeHandle]) -> RunReport {
        let (rewritten, rewrite) =
            RewriteEngine::new(&self.graph, &self.config.rewrite).run(outputs);
        let evaluation =
            Evaluator::new(self.backend.as_ref(), &self.config, self.cache.as_ref()).run(&rewritten);
        let report = RunReport::new(outputs, &rewritten, evaluation, rewrite, self.cache_stats());

        info!(
            backend = self.backend.name(),
            outputs = report.outputs.len(),
            evaluated = report.evaluated.len(),
            restored = report.restored.len(),
            errors = report.errors,
            aborted = report.aborted,
            "Evaluation finished"
        );
        report
    }

    /// Release nodes nothing outside the registry still holds
    pub fn collect_garbage(&self) -> usize {
        self.graph.collect_garbage()
    }
}
