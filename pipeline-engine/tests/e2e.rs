// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # End-to-End Pipeline Scenarios
//!
//! Drives `run_pipeline` against `InMemoryBackend` for full plans, covering
//! the shapes that exercise every dispatcher arm and the cache/routing
//! decisions layered on top of it: a linear ETL, fan-out with error routing,
//! a splitter, an explicit multi-way join, an auto-join with a broadcast
//! side, and parallel sink failure reporting.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;

use pipeline_engine::infrastructure::in_memory_backend::InMemoryBackend;
use pipeline_engine::{run_pipeline, ExecutionContext, PipelineError, PipelinePlan, PluginKind, RunPipelineArgs, RuntimeArguments, StageSpec};
use pipeline_engine_domain::{
    Alert, AutoJoinerContext, AutoJoinerPlugin, ErrorRecord, ExplicitJoinerPlugin, JoinCondition, JoinDefinition,
    JoinOp, JoinStageSpec, JoinerKind, JoinerPlugin, MacroEvaluator, NoopMetricsCollector, Port, PluginContext,
    PluginHandle, PluginInstance, RecordInfo, Schema,
};

fn exec_context() -> ExecutionContext {
    ExecutionContext::new("ns", Utc::now(), RuntimeArguments::default())
}

fn exec_context_with_parallel_sinks() -> ExecutionContext {
    let mut values = BTreeMap::new();
    values.insert("pipeline.spark.parallel.sinks.enabled".to_string(), "true".to_string());
    ExecutionContext::new("ns", Utc::now(), RuntimeArguments::new(values))
}

fn stage(name: &str, kind: PluginKind, inputs: &[&str]) -> StageSpec {
    let mut s = StageSpec::new(name, kind, PluginHandle(name.to_string()));
    for i in inputs {
        s.input_schemas.insert(i.to_string(), Schema::Null);
    }
    s
}

struct NullPluginContext;

impl PluginContext for NullPluginContext {
    fn new_plugin_instance(
        &self,
        stage_name: &str,
        _macro_evaluator: &MacroEvaluator,
    ) -> Result<PluginInstance, PipelineError> {
        Err(PipelineError::PluginInstantiationFailed(stage_name.to_string(), "no plugins registered".into()))
    }
}

/// Linear ETL: `source -> transform -> sink`, doubling `a`.
#[test]
fn linear_etl_doubles_and_sinks_in_order() {
    let mut stages = BTreeMap::new();
    stages.insert("source".into(), stage("source", PluginKind::Source, &[]));
    stages.insert("transform".into(), stage("transform", PluginKind::Transform, &["source"]));
    stages.insert("sink".into(), stage("sink", PluginKind::BatchSink, &["transform"]));
    let plan = PipelinePlan::new(stages).unwrap();

    let backend = InMemoryBackend::new()
        .with_source("source", vec![RecordInfo::Output(json!({"a": 1})), RecordInfo::Output(json!({"a": 2}))])
        .with_transform("transform", |r| {
            let a = r["a"].as_i64().unwrap();
            vec![RecordInfo::Output(json!({"a": a * 2}))]
        });

    let ctx = exec_context();
    let plugin_context = NullPluginContext;
    let metrics = NoopMetricsCollector;
    run_pipeline(RunPipelineArgs {
        plan: &plan,
        backend: &backend,
        plugin_context: &plugin_context,
        execution_context: &ctx,
        metrics: &metrics,
    })
    .unwrap();

    assert_eq!(backend.sink_output("sink"), vec![json!({"a": 2}), json!({"a": 4})]);
}

/// Fan-out with error routing: `source -> transform -> [sink_ok, error_xform -> sink_err]`.
/// `a=0` is rejected as an error record; `sink_ok` should never see it.
#[test]
fn fan_out_routes_errors_to_the_error_transform_only() {
    let mut stages = BTreeMap::new();
    stages.insert("source".into(), stage("source", PluginKind::Source, &[]));
    stages.insert("transform".into(), stage("transform", PluginKind::Transform, &["source"]));
    stages.insert("sink_ok".into(), stage("sink_ok", PluginKind::BatchSink, &["transform"]));
    stages.insert("error_xform".into(), stage("error_xform", PluginKind::ErrorTransform, &["transform"]));
    stages.insert("sink_err".into(), stage("sink_err", PluginKind::BatchSink, &["error_xform"]));
    let plan = PipelinePlan::new(stages).unwrap();

    let backend = InMemoryBackend::new()
        .with_source("source", vec![RecordInfo::Output(json!({"a": 0})), RecordInfo::Output(json!({"a": 1}))])
        .with_transform("transform", |r| {
            let a = r["a"].as_i64().unwrap();
            if a == 0 {
                vec![RecordInfo::Error(ErrorRecord {
                    input_record: r.clone(),
                    error_code: Some(400),
                    error_message: "a must be non-zero".into(),
                    stage_name: "transform".into(),
                })]
            } else {
                vec![RecordInfo::Output(r.clone())]
            }
        })
        .with_error_transform("error_xform", |e| vec![RecordInfo::Output(e.input_record.clone())]);

    let ctx = exec_context();
    let plugin_context = NullPluginContext;
    let metrics = NoopMetricsCollector;
    run_pipeline(RunPipelineArgs {
        plan: &plan,
        backend: &backend,
        plugin_context: &plugin_context,
        execution_context: &ctx,
        metrics: &metrics,
    })
    .unwrap();

    assert_eq!(backend.sink_output("sink_ok"), vec![json!({"a": 1})]);
    assert_eq!(backend.sink_output("sink_err"), vec![json!({"a": 0})]);
}

/// Splitter: `source -> splitter(ports P, Q) -> {sink_p on P, sink_q on Q}`.
/// Even-valued records route to `P`, odd-valued to `Q`.
#[test]
fn splitter_routes_each_record_to_exactly_one_port() {
    let mut splitter = stage("splitter", PluginKind::SplitterTransform, &["source"]);
    splitter.output_ports.insert("sink_p".into(), Port { name: "P".into() });
    splitter.output_ports.insert("sink_q".into(), Port { name: "Q".into() });

    let mut stages = BTreeMap::new();
    stages.insert("source".into(), stage("source", PluginKind::Source, &[]));
    stages.insert("splitter".into(), splitter);
    stages.insert("sink_p".into(), stage("sink_p", PluginKind::BatchSink, &["splitter"]));
    stages.insert("sink_q".into(), stage("sink_q", PluginKind::BatchSink, &["splitter"]));
    let plan = PipelinePlan::new(stages).unwrap();

    let backend = InMemoryBackend::new()
        .with_source(
            "source",
            vec![
                RecordInfo::Output(json!({"n": 1})),
                RecordInfo::Output(json!({"n": 2})),
                RecordInfo::Output(json!({"n": 3})),
                RecordInfo::Output(json!({"n": 4})),
            ],
        )
        .with_splitter("splitter", |r| {
            let n = r["n"].as_i64().unwrap();
            let port = if n % 2 == 0 { "P" } else { "Q" };
            vec![RecordInfo::PortOutput(port.to_string(), r.clone())]
        });

    let ctx = exec_context();
    let plugin_context = NullPluginContext;
    let metrics = NoopMetricsCollector;
    run_pipeline(RunPipelineArgs {
        plan: &plan,
        backend: &backend,
        plugin_context: &plugin_context,
        execution_context: &ctx,
        metrics: &metrics,
    })
    .unwrap();

    assert_eq!(backend.sink_output("sink_p"), vec![json!({"n": 2}), json!({"n": 4})]);
    assert_eq!(backend.sink_output("sink_q"), vec![json!({"n": 1}), json!({"n": 3})]);
}

/// An explicit joiner with required inputs `[a, b]` and one non-required
/// input `c`: expects inner(a, b) then left-outer with `c`, so a row with no
/// match in `c` still survives with just `a` and `b` merged in.
struct ThreeWayExplicitJoiner;

impl ExplicitJoinerPlugin for ThreeWayExplicitJoiner {
    fn required_inputs(&self) -> Vec<String> {
        vec!["a".into(), "b".into()]
    }

    fn null_safe(&self) -> bool {
        false
    }

    fn join_keys(&self) -> BTreeMap<String, Vec<String>> {
        let mut keys = BTreeMap::new();
        keys.insert("a".into(), vec!["id".into()]);
        keys.insert("b".into(), vec!["id".into()]);
        keys.insert("c".into(), vec!["id".into()]);
        keys
    }
}

struct ExplicitJoinerPluginContext;

impl PluginContext for ExplicitJoinerPluginContext {
    fn new_plugin_instance(
        &self,
        _stage_name: &str,
        _macro_evaluator: &MacroEvaluator,
    ) -> Result<PluginInstance, PipelineError> {
        Ok(PluginInstance::Joiner(JoinerPlugin::Explicit(Arc::new(ThreeWayExplicitJoiner))))
    }
}

#[test]
fn explicit_three_way_join_inner_then_left_outer() {
    let mut stages = BTreeMap::new();
    stages.insert("a".into(), stage("a", PluginKind::Source, &[]));
    stages.insert("b".into(), stage("b", PluginKind::Source, &[]));
    stages.insert("c".into(), stage("c", PluginKind::Source, &[]));
    stages.insert(
        "joiner".into(),
        stage("joiner", PluginKind::BatchJoiner(JoinerKind::Explicit), &["a", "b", "c"]),
    );
    stages.insert("sink".into(), stage("sink", PluginKind::BatchSink, &["joiner"]));
    let plan = PipelinePlan::new(stages).unwrap();

    let backend = InMemoryBackend::new()
        .with_source("a", vec![RecordInfo::Output(json!({"id": 1, "x": "a1"})), RecordInfo::Output(json!({"id": 2, "x": "a2"}))])
        .with_source("b", vec![RecordInfo::Output(json!({"id": 1, "y": "b1"})), RecordInfo::Output(json!({"id": 2, "y": "b2"}))])
        .with_source("c", vec![RecordInfo::Output(json!({"id": 1, "z": "c1"}))]);

    let ctx = exec_context();
    let plugin_context = ExplicitJoinerPluginContext;
    let metrics = NoopMetricsCollector;
    run_pipeline(RunPipelineArgs {
        plan: &plan,
        backend: &backend,
        plugin_context: &plugin_context,
        execution_context: &ctx,
        metrics: &metrics,
    })
    .unwrap();

    let rows = backend.sink_output("sink");
    assert_eq!(rows.len(), 2);

    let row_for = |id: i64| rows.iter().find(|r| r["a"]["id"] == json!(id)).unwrap();

    let row1 = row_for(1);
    assert_eq!(row1["a"]["x"], json!("a1"));
    assert_eq!(row1["b"]["y"], json!("b1"));
    assert_eq!(row1["c"]["z"], json!("c1"));

    let row2 = row_for(2);
    assert_eq!(row2["a"]["x"], json!("a2"));
    assert_eq!(row2["b"]["y"], json!("b2"));
    assert!(row2.get("c").is_none(), "id=2 has no match in c and should not appear via left-outer");
}

/// An auto-joiner over `[A (broadcast=false), B (broadcast=true), C
/// (broadcast=false)]`, driven end to end through the full dispatcher path.
/// The exact broadcast-last ordering invariant has a focused unit test in
/// `application::join_planner`; this test is the full-pipeline sanity check
/// that the three-way key-equality join actually produces the right row.
struct BroadcastAwareAutoJoiner;

impl AutoJoinerPlugin for BroadcastAwareAutoJoiner {
    fn define(&self, ctx: &AutoJoinerContext) -> Result<JoinDefinition, PipelineError> {
        let mut keys = BTreeMap::new();
        for name in ctx.input_schemas.keys() {
            keys.insert(name.clone(), vec!["k".to_string()]);
        }
        Ok(JoinDefinition {
            stages: vec![
                JoinStageSpec { stage_name: "a".into(), required: true, broadcast: false },
                JoinStageSpec { stage_name: "b".into(), required: true, broadcast: true },
                JoinStageSpec { stage_name: "c".into(), required: true, broadcast: false },
            ],
            condition: JoinCondition { op: JoinOp::KeyEquality, keys },
            selected_fields: Vec::new(),
            output_schema: Schema::Null,
            null_safe: false,
        })
    }
}

struct AutoJoinerPluginContext;

impl PluginContext for AutoJoinerPluginContext {
    fn new_plugin_instance(
        &self,
        _stage_name: &str,
        _macro_evaluator: &MacroEvaluator,
    ) -> Result<PluginInstance, PipelineError> {
        Ok(PluginInstance::Joiner(JoinerPlugin::Auto(Arc::new(BroadcastAwareAutoJoiner))))
    }
}

#[test]
fn auto_join_three_way_key_equality_produces_merged_row() {
    let mut stages = BTreeMap::new();
    stages.insert("a".into(), stage("a", PluginKind::Source, &[]));
    stages.insert("b".into(), stage("b", PluginKind::Source, &[]));
    stages.insert("c".into(), stage("c", PluginKind::Source, &[]));
    stages.insert("joiner".into(), stage("joiner", PluginKind::BatchJoiner(JoinerKind::Auto), &["a", "b", "c"]));
    stages.insert("sink".into(), stage("sink", PluginKind::BatchSink, &["joiner"]));
    let plan = PipelinePlan::new(stages).unwrap();

    let backend = InMemoryBackend::new()
        .with_source("a", vec![RecordInfo::Output(json!({"k": 1, "from": "a"}))])
        .with_source("b", vec![RecordInfo::Output(json!({"k": 1, "from": "b"}))])
        .with_source("c", vec![RecordInfo::Output(json!({"k": 1, "from": "c"}))]);

    let ctx = exec_context();
    let plugin_context = AutoJoinerPluginContext;
    let metrics = NoopMetricsCollector;
    run_pipeline(RunPipelineArgs {
        plan: &plan,
        backend: &backend,
        plugin_context: &plugin_context,
        execution_context: &ctx,
        metrics: &metrics,
    })
    .unwrap();

    let rows = backend.sink_output("sink");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["a"]["from"], json!("a"));
    assert_eq!(rows[0]["b"]["from"], json!("b"));
    assert_eq!(rows[0]["c"]["from"], json!("c"));
}

/// Two sinks enqueued with parallel sinks enabled; the first-enqueued
/// failure is what `run_pipeline` surfaces, regardless of completion order.
#[test]
fn parallel_sinks_surface_the_first_enqueued_failure() {
    let mut stages = BTreeMap::new();
    stages.insert("source".into(), stage("source", PluginKind::Source, &[]));
    stages.insert("sink_fails".into(), stage("sink_fails", PluginKind::BatchSink, &["source"]));
    stages.insert("sink_ok".into(), stage("sink_ok", PluginKind::BatchSink, &["source"]));
    let plan = PipelinePlan::new(stages).unwrap();

    let ok_ran = Arc::new(Mutex::new(false));
    let ok_ran_clone = ok_ran.clone();

    let backend = InMemoryBackend::new()
        .with_source("source", vec![RecordInfo::Output(json!({"a": 1}))])
        .with_sink_writer("sink_fails", |_records| Err(PipelineError::InternalError("disk full".into())))
        .with_sink_writer("sink_ok", move |_records| {
            *ok_ran_clone.lock().unwrap() = true;
            Ok(())
        });

    let ctx = exec_context_with_parallel_sinks();
    let plugin_context = NullPluginContext;
    let metrics = NoopMetricsCollector;
    let result = run_pipeline(RunPipelineArgs {
        plan: &plan,
        backend: &backend,
        plugin_context: &plugin_context,
        execution_context: &ctx,
        metrics: &metrics,
    });

    assert!(matches!(result, Err(PipelineError::SinkFailure(_))));
    // The other sink still runs to completion; the engine makes no rollback
    // guarantee about already-completed side effects.
    assert!(*ok_ran.lock().unwrap());
}

/// A stage's input is the multi-predecessor union, and rejecting a dangling
/// edge (an upstream name outside the plan) happens before any stage runs.
#[test]
fn dangling_upstream_edge_is_rejected() {
    let mut stages = BTreeMap::new();
    stages.insert("source".into(), stage("source", PluginKind::Source, &[]));
    // `input_schemas` references a stage that doesn't exist in the plan --
    // `PipelinePlan::new`'s validation should reject this before `run_pipeline`
    // ever gets a chance to dispatch anything.
    stages.insert("sink".into(), stage("sink", PluginKind::BatchSink, &["missing"]));

    let err = PipelinePlan::new(stages).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedPipeline(_)));
}

/// `AlertPublisher` never writes to the registry, and an upstream alert
/// reaches it even though the source stage also has a normal-output sink.
#[test]
fn alerts_route_to_the_alert_publisher_alongside_normal_output() {
    let mut stages = BTreeMap::new();
    stages.insert("source".into(), stage("source", PluginKind::Source, &[]));
    stages.insert("sink".into(), stage("sink", PluginKind::BatchSink, &["source"]));
    stages.insert("alerts".into(), stage("alerts", PluginKind::AlertPublisher, &["source"]));
    let plan = PipelinePlan::new(stages).unwrap();

    let backend = InMemoryBackend::new().with_source(
        "source",
        vec![
            RecordInfo::Output(json!({"a": 1})),
            RecordInfo::Alert(Alert { payload: json!({"msg": "watch this"}), stage_name: "source".into() }),
        ],
    );

    let ctx = exec_context();
    let plugin_context = NullPluginContext;
    let metrics = NoopMetricsCollector;
    run_pipeline(RunPipelineArgs {
        plan: &plan,
        backend: &backend,
        plugin_context: &plugin_context,
        execution_context: &ctx,
        metrics: &metrics,
    })
    .unwrap();

    assert_eq!(backend.sink_output("sink"), vec![json!({"a": 1})]);
    assert_eq!(backend.alerts(), vec![Alert { payload: json!({"msg": "watch this"}), stage_name: "source".into() }]);
}
