// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entry point. Parses the CLI, wires up the in-memory reference backend for
//! `run`, and maps the outcome to a process exit code.

use std::time::Duration;

use chrono::Utc;
use pipeline_engine::infrastructure::in_memory_backend::InMemoryBackend;
use pipeline_engine::infrastructure::logging::init_logging;
use pipeline_engine::infrastructure::metrics::InMemoryMetricsCollector;
use pipeline_engine::{run_pipeline, ExecutionContext, PipelineError, PipelinePlan, PluginContext, RunPipelineArgs, RuntimeArguments};
use pipeline_engine_bootstrap::cli::{self, Commands};
use pipeline_engine_bootstrap::shutdown::ShutdownCoordinator;
use pipeline_engine_bootstrap::{parse_cli, result_to_exit_code};

/// A `PluginContext` that never materializes anything. Suitable for the
/// demo plans this CLI can actually run (sources, pass-through transforms,
/// sinks); any stage that needs real plugin code (`SparkCompute`,
/// `Windower`, a joiner) fails fast with a clear diagnostic instead of the
/// CLI guessing at plugin behavior.
struct NullPluginContext;

impl PluginContext for NullPluginContext {
    fn new_plugin_instance(
        &self,
        stage_name: &str,
        _macro_evaluator: &pipeline_engine_domain::MacroEvaluator,
    ) -> Result<pipeline_engine_domain::PluginInstance, PipelineError> {
        Err(PipelineError::PluginInstantiationFailed(
            stage_name.to_string(),
            "this CLI's in-memory backend has no plugin registry; supply a custom backend and PluginContext for \
             stages that require one"
                .to_string(),
        ))
    }
}

fn build_backend(plan: &PipelinePlan, sources: Vec<(String, Vec<pipeline_engine_domain::RecordInfo>)>) -> InMemoryBackend {
    use pipeline_engine_domain::{PluginKind, Record, RecordInfo};

    let mut backend = InMemoryBackend::new();
    for (name, records) in sources {
        backend = backend.with_source(name, records);
    }

    for stage in plan.stages.values() {
        match &stage.plugin_type {
            PluginKind::Transform => {
                backend = backend.with_transform(stage.name.clone(), |record: &Record| {
                    vec![RecordInfo::Output(record.clone())]
                });
            }
            PluginKind::BatchSink => {
                let name = stage.name.clone();
                backend = backend.with_sink_writer(stage.name.clone(), move |records: &[Record]| {
                    for record in records {
                        println!("[{name}] {record}");
                    }
                    Ok(())
                });
            }
            _ => {}
        }
    }

    backend
}

fn run_validate(plan_path: &std::path::Path) -> Result<(), PipelineError> {
    let document = cli::load_plan_document(plan_path)?;
    let plan = PipelinePlan::new(document.stages)?;
    println!(
        "plan valid: {} stage(s), topological order: {}",
        plan.stages.len(),
        plan.dag.topological_order.join(" -> ")
    );
    Ok(())
}

async fn run_execute(
    plan_path: &std::path::Path,
    sources_path: Option<&std::path::Path>,
    runtime_arguments: RuntimeArguments,
) -> Result<(), PipelineError> {
    let document = cli::load_plan_document(plan_path)?;
    let plan = PipelinePlan::new(document.stages)?;

    let sources = match sources_path {
        Some(path) => cli::load_sources_document(path)?.into_iter().collect(),
        None => Vec::new(),
    };
    let backend = build_backend(&plan, sources);
    let plugin_context = NullPluginContext;
    let execution_context = ExecutionContext::new("cli", Utc::now(), runtime_arguments);
    let metrics = InMemoryMetricsCollector::new();

    let shutdown = ShutdownCoordinator::new(Duration::from_secs(5));
    let ctrl_c = tokio::signal::ctrl_c();

    tokio::select! {
        result = async {
            tokio::task::block_in_place(|| {
                run_pipeline(RunPipelineArgs {
                    plan: &plan,
                    backend: &backend,
                    plugin_context: &plugin_context,
                    execution_context: &execution_context,
                    metrics: &metrics,
                })
            })
        } => result,
        _ = ctrl_c => {
            shutdown.initiate_shutdown();
            Err(PipelineError::Interrupted("received ctrl-c".to_string()))
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = parse_cli();

    init_logging();
    if cli.verbose {
        tracing::debug!("verbose logging enabled");
    }

    let runtime_arguments = match pipeline_engine::infrastructure::config::load_runtime_arguments(
        cli.config.as_deref().and_then(|p| p.to_str()),
    ) {
        Ok(args) => args,
        Err(e) => {
            tracing::error!("failed to load configuration: {e}");
            return result_to_exit_code(Err(PipelineError::InvalidConfiguration(e.to_string())));
        }
    };

    let result = match &cli.command {
        Commands::Validate { plan } => run_validate(plan),
        Commands::Run { plan, sources } => run_execute(plan, sources.as_deref(), runtime_arguments).await,
    };

    result_to_exit_code(result)
}
