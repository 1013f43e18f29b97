// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Driver
//!
//! Top-level orchestration: validate the plan, walk its topological order
//! dispatching one stage at a time, record what each stage emits, and flush
//! any deferred sink writes once the whole DAG has been materialized.

use pipeline_engine_domain::{
    CollectionBackend, EmittedRegistry, ExecutionContext, PipelineError, PipelinePlan, PluginContext,
    StageMetricsCollector,
};

use crate::application::dispatcher::{self, DispatchContext};
use crate::infrastructure::sink_scheduler::SinkScheduler;

pub struct RunPipelineArgs<'a> {
    pub plan: &'a PipelinePlan,
    pub backend: &'a dyn CollectionBackend,
    pub plugin_context: &'a dyn PluginContext,
    pub execution_context: &'a ExecutionContext,
    pub metrics: &'a dyn StageMetricsCollector,
}

#[tracing::instrument(skip_all, fields(stage_count = args.plan.stages.len()))]
pub fn run_pipeline(args: RunPipelineArgs<'_>) -> Result<(), PipelineError> {
    args.plan.validate()?;

    let mut registry = EmittedRegistry::new();
    let mut sink_tasks = Vec::new();

    for stage_name in &args.plan.dag.topological_order {
        let stage = args
            .plan
            .stages
            .get(stage_name)
            .expect("topological order was validated against the stage set");

        let dispatch_ctx = DispatchContext {
            plan: args.plan,
            registry: &registry,
            stage,
            backend: args.backend,
            plugin_context: args.plugin_context,
            execution_context: args.execution_context,
            metrics: args.metrics,
        };

        let started = std::time::Instant::now();
        let outcome = dispatcher::dispatch(&dispatch_ctx)?;
        args.metrics.record_stage_duration(stage_name, started.elapsed());
        tracing::debug!(stage = %stage_name, elapsed_ms = started.elapsed().as_millis(), "stage dispatched");
        // `record_records_emitted` has no caller here: `Collection` is an opaque,
        // lazily-evaluated handle, so the driver has no count to report without
        // forcing materialization a backend may not want yet.

        registry.insert(stage_name, outcome.records)?;
        if let Some(task) = outcome.sink_task {
            sink_tasks.push(task);
        }
    }

    let parallel_enabled = args.execution_context.runtime_arguments.parallel_sinks_enabled();
    tracing::info!(sink_count = sink_tasks.len(), parallel_enabled, "flushing sinks");
    SinkScheduler::new(parallel_enabled).flush(sink_tasks)
}
