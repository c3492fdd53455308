//! SolidGraph command-line entry point

mod script;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sg_engine::{ConfigError, Engine, EngineConfig, PersistenceError};
use thiserror::Error;

use crate::script::{Script, ScriptError};

/// Evaluate a SolidGraph construction script
#[derive(Debug, Parser)]
#[command(name = "sg", version, about)]
struct Args {
    /// Construction script (RON)
    script: PathBuf,

    /// Engine configuration (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker threads (0 = evaluate sequentially)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Directory for the on-disk artifact cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Maximum rewrite passes (0 = no rewriting)
    #[arg(long)]
    passes: Option<u32>,

    /// Treat warnings as errors
    #[arg(long)]
    werror: bool,

    /// Stop starting new work after the first error
    #[arg(long)]
    fatal_errors: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("Cannot open cache: {0}")]
    Cache(#[from] PersistenceError),

    #[error("Cannot render report: {0}")]
    Json(#[from] serde_json::Error),
}

impl Args {
    fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.dir = Some(dir.clone());
        }
        if let Some(passes) = self.passes {
            config.rewrite.max_passes = passes;
        }
        config.warnings.warnings_as_errors |= self.werror;
        config.warnings.fatal_errors |= self.fatal_errors;
        Ok(config)
    }
}

fn run(args: &Args) -> Result<bool, CliError> {
    let config = args.engine_config()?;
    let script = Script::load(&args.script)?;

    let engine = Engine::new(config)?;
    let outputs = script.build(engine.graph())?;
    tracing::info!(
        "Loaded {} step(s) into {} node(s)",
        script.steps.len(),
        engine.graph().len()
    );

    let report = engine.evaluate(&outputs);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    drop(outputs);
    let released = engine.collect_garbage();
    tracing::debug!("Released {} node(s)", released);

    Ok(report.success())
}

fn main() -> ExitCode {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sg_engine=info,sg_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(2)
        }
    }
}
