// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Dispatcher
//!
//! Binds a stage's inputs and invokes the `CollectionBackend` operation that
//! corresponds to its `PluginKind`. This is an exhaustive match: adding a new
//! `PluginKind` variant without a corresponding dispatcher arm is a compile
//! error, not a runtime surprise.

use std::collections::BTreeMap;
use std::sync::Arc;

use pipeline_engine_domain::{
    Collection, CollectionBackend, EmittedRecords, EmittedRegistry, ExecutionContext, JoinerKind, PipelineError,
    PipelinePlan, PluginContext, PluginInstance, PluginKind, SinkTask, StageMetricsCollector, StageSpec,
};

use crate::application::{emit_router, join_planner};

pub struct DispatchContext<'a> {
    pub plan: &'a PipelinePlan,
    pub registry: &'a EmittedRegistry,
    pub stage: &'a StageSpec,
    pub backend: &'a dyn CollectionBackend,
    pub plugin_context: &'a dyn PluginContext,
    pub execution_context: &'a ExecutionContext,
    pub metrics: &'a dyn StageMetricsCollector,
}

pub struct DispatchOutcome {
    pub records: EmittedRecords,
    pub sink_task: Option<SinkTask>,
}

impl DispatchOutcome {
    fn normal(records: EmittedRecords) -> Self {
        Self { records, sink_task: None }
    }

    fn sink(task: SinkTask) -> Self {
        Self { records: EmittedRecords::default(), sink_task: Some(task) }
    }
}

/// Looks up the collection an upstream stage routes to `stage`: its output
/// port collection if it declared one for `stage` (and neither side is a
/// `Connector`), otherwise its normal output.
fn routed_input_for(
    plan: &PipelinePlan,
    registry: &EmittedRegistry,
    stage: &StageSpec,
    upstream_name: &str,
) -> Option<Arc<dyn Collection>> {
    let upstream = plan.stages.get(upstream_name)?;
    let upstream_records = registry.get(upstream_name)?;

    if let Some(port) = upstream.output_ports.get(&stage.name) {
        let either_is_connector =
            matches!(upstream.plugin_type, PluginKind::Connector) || matches!(stage.plugin_type, PluginKind::Connector);
        if !either_is_connector {
            return upstream_records.output_ports.get(&port.name).cloned();
        }
    }

    upstream_records.output.clone()
}

/// Gathers the normally-routed collection for each declared upstream of
/// `stage`. An upstream name that isn't part of this plan is a dangling
/// edge: this engine rejects it outright rather than silently skipping it.
fn gather_routed_inputs(
    plan: &PipelinePlan,
    registry: &EmittedRegistry,
    stage: &StageSpec,
) -> Result<BTreeMap<String, Arc<dyn Collection>>, PipelineError> {
    let mut inputs = BTreeMap::new();
    for upstream_name in stage.input_schemas.keys() {
        if !plan.stages.contains_key(upstream_name) {
            return Err(PipelineError::MalformedPipeline(format!(
                "stage '{}' references upstream '{}' outside the current plan",
                stage.name, upstream_name
            )));
        }
        if let Some(collection) = routed_input_for(plan, registry, stage, upstream_name) {
            inputs.insert(upstream_name.clone(), collection);
        }
    }
    Ok(inputs)
}

fn gather_error_inputs(
    plan: &PipelinePlan,
    registry: &EmittedRegistry,
    stage: &StageSpec,
) -> Result<BTreeMap<String, Arc<dyn Collection>>, PipelineError> {
    let mut inputs = BTreeMap::new();
    for upstream_name in stage.input_schemas.keys() {
        if !plan.stages.contains_key(upstream_name) {
            return Err(PipelineError::MalformedPipeline(format!(
                "stage '{}' references upstream '{}' outside the current plan",
                stage.name, upstream_name
            )));
        }
        if let Some(records) = registry.get(upstream_name) {
            if let Some(errors) = &records.errors {
                inputs.insert(upstream_name.clone(), errors.clone());
            }
        }
    }
    Ok(inputs)
}

fn gather_alert_inputs(
    plan: &PipelinePlan,
    registry: &EmittedRegistry,
    stage: &StageSpec,
) -> Result<BTreeMap<String, Arc<dyn Collection>>, PipelineError> {
    let mut inputs = BTreeMap::new();
    for upstream_name in stage.input_schemas.keys() {
        if !plan.stages.contains_key(upstream_name) {
            return Err(PipelineError::MalformedPipeline(format!(
                "stage '{}' references upstream '{}' outside the current plan",
                stage.name, upstream_name
            )));
        }
        if let Some(records) = registry.get(upstream_name) {
            if let Some(alerts) = &records.alerts {
                inputs.insert(upstream_name.clone(), alerts.clone());
            }
        }
    }
    Ok(inputs)
}

/// Folds a set of routed inputs into a single collection via union. A
/// singleton map is still routed through `union` rather than special-cased,
/// so backends only need to implement one code path.
fn unioned_input(
    backend: &dyn CollectionBackend,
    routed: BTreeMap<String, Arc<dyn Collection>>,
) -> Result<Option<Arc<dyn Collection>>, PipelineError> {
    if routed.is_empty() {
        return Ok(None);
    }
    let ordered: Vec<_> = routed.into_values().collect();
    Ok(Some(backend.union(&ordered)?))
}

fn require_single_input(
    plan: &PipelinePlan,
    registry: &EmittedRegistry,
    backend: &dyn CollectionBackend,
    stage: &StageSpec,
) -> Result<Arc<dyn Collection>, PipelineError> {
    let routed = gather_routed_inputs(plan, registry, stage)?;
    unioned_input(backend, routed)?.ok_or_else(|| PipelineError::MissingInput(stage.name.clone()))
}

fn materialize_plugin(ctx: &DispatchContext<'_>) -> Result<PluginInstance, PipelineError> {
    let macro_evaluator = ctx.execution_context.macro_evaluator();
    ctx.plugin_context
        .new_plugin_instance(&ctx.stage.name, &macro_evaluator)
        .map_err(|e| PipelineError::PluginInstantiationFailed(ctx.stage.name.clone(), e.to_string()))
}

fn emit_routed(ctx: &DispatchContext<'_>, combined: Arc<dyn Collection>) -> Result<DispatchOutcome, PipelineError> {
    let routed = emit_router::route(ctx.backend, combined, ctx.stage, ctx.plan)?;
    Ok(DispatchOutcome::normal(EmittedRecords {
        output: routed.output,
        output_ports: routed.output_ports,
        errors: routed.errors,
        alerts: routed.alerts,
    }))
}

pub fn dispatch(ctx: &DispatchContext<'_>) -> Result<DispatchOutcome, PipelineError> {
    let stage = ctx.stage;
    let plan = ctx.plan;
    let registry = ctx.registry;
    let backend = ctx.backend;

    match &stage.plugin_type {
        PluginKind::Source => {
            let combined = backend.get_source(stage)?;
            emit_routed(ctx, combined)
        }

        PluginKind::Connector => {
            let routed = gather_routed_inputs(plan, registry, stage)?;
            if routed.is_empty() {
                let combined = backend.get_source(stage)?;
                emit_routed(ctx, combined)
            } else {
                let input = unioned_input(backend, routed)?.expect("non-empty routed map");
                let task = backend.create_store_task(&input, stage)?;
                Ok(DispatchOutcome::sink(task))
            }
        }

        PluginKind::BatchSink => {
            let input = require_single_input(plan, registry, backend, stage)?;
            let task = backend.create_store_task(&input, stage)?;
            Ok(DispatchOutcome::sink(task))
        }

        PluginKind::Transform => {
            let input = require_single_input(plan, registry, backend, stage)?;
            let combined = backend.transform(&input, stage)?;
            emit_routed(ctx, combined)
        }

        PluginKind::SplitterTransform => {
            let input = require_single_input(plan, registry, backend, stage)?;
            let combined = backend.multi_output_transform(&input, stage)?;
            emit_routed(ctx, combined)
        }

        PluginKind::ErrorTransform => {
            let errors_in = gather_error_inputs(plan, registry, stage)?;
            let unioned = unioned_input(backend, errors_in)?.ok_or_else(|| PipelineError::MissingInput(stage.name.clone()))?;
            let combined = backend.error_transform(&unioned, stage)?;
            emit_routed(ctx, combined)
        }

        PluginKind::SparkCompute => {
            let input = require_single_input(plan, registry, backend, stage)?;
            let plugin = materialize_plugin(ctx)?;
            let combined = backend.compute(&input, stage, &plugin)?;
            Ok(DispatchOutcome::normal(EmittedRecords { output: Some(combined), ..Default::default() }))
        }

        PluginKind::SparkSink => {
            let input = require_single_input(plan, registry, backend, stage)?;
            let plugin = materialize_plugin(ctx)?;
            let task = backend.create_store_task_with_plugin(&input, stage, &plugin)?;
            Ok(DispatchOutcome::sink(task))
        }

        PluginKind::BatchAggregator => {
            let input = require_single_input(plan, registry, backend, stage)?;
            let combined = backend.aggregate(&input, stage, stage.partitions)?;
            emit_routed(ctx, combined)
        }

        PluginKind::BatchReducibleAggregator => {
            let input = require_single_input(plan, registry, backend, stage)?;
            let combined = backend.reduce_aggregate(&input, stage, stage.partitions)?;
            emit_routed(ctx, combined)
        }

        PluginKind::BatchJoiner(joiner_kind) => {
            let routed = gather_routed_inputs(plan, registry, stage)?;
            if routed.is_empty() {
                return Err(PipelineError::MissingInput(stage.name.clone()));
            }
            let plugin = materialize_plugin(ctx)?;
            let combined = match (joiner_kind, &plugin) {
                (JoinerKind::Explicit, PluginInstance::Joiner(pipeline_engine_domain::JoinerPlugin::Explicit(p))) => {
                    join_planner::plan_explicit_join(backend, stage, routed, p.as_ref())?
                }
                (JoinerKind::Auto, PluginInstance::Joiner(pipeline_engine_domain::JoinerPlugin::Auto(p))) => {
                    join_planner::plan_auto_join(backend, p.as_ref(), stage, &routed)?
                }
                _ => return Err(PipelineError::UnknownJoinerType(stage.name.clone())),
            };
            Ok(DispatchOutcome::normal(EmittedRecords { output: Some(combined), ..Default::default() }))
        }

        PluginKind::Windower => {
            let input = require_single_input(plan, registry, backend, stage)?;
            let plugin = materialize_plugin(ctx)?;
            let combined = backend.window(&input, stage, &plugin)?;
            Ok(DispatchOutcome::normal(EmittedRecords { output: Some(combined), ..Default::default() }))
        }

        PluginKind::AlertPublisher => {
            let alerts_in = gather_alert_inputs(plan, registry, stage)?;
            let unioned = unioned_input(backend, alerts_in)?.ok_or_else(|| PipelineError::MissingInput(stage.name.clone()))?;
            backend.publish_alerts(&unioned, stage)?;
            Ok(DispatchOutcome::normal(EmittedRecords::default()))
        }
    }
}
