// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Emit Router
//!
//! Takes the single combined collection a stage just produced and splits it
//! back into the `RecordInfo` sub-collections downstream stages actually
//! care about: normal output (or, for splitters, per-port output), errors,
//! and alerts.
//!
//! Only derives a sub-collection a downstream stage will actually consume --
//! there's no point filtering out an error sub-collection if nothing
//! downstream is an `ErrorTransform`. When more than one sub-collection has
//! to be derived from the same combined collection, the combined collection
//! is cached first so each filtered pass doesn't recompute it from scratch.

use std::collections::BTreeMap;
use std::sync::Arc;

use pipeline_engine_domain::{Collection, CollectionBackend, EmitFilter, PipelineError, PipelinePlan, PluginKind, StageSpec};

use crate::application::cache_policy::should_cache;

#[derive(Default)]
pub struct RoutedOutputs {
    pub output: Option<Arc<dyn Collection>>,
    pub output_ports: BTreeMap<String, Arc<dyn Collection>>,
    pub errors: Option<Arc<dyn Collection>>,
    pub alerts: Option<Arc<dyn Collection>>,
}

pub fn route(
    backend: &dyn CollectionBackend,
    combined: Arc<dyn Collection>,
    stage: &StageSpec,
    plan: &PipelinePlan,
) -> Result<RoutedOutputs, PipelineError> {
    let interest = plan.downstream_interest(&stage.name);
    let is_splitter = matches!(stage.plugin_type, PluginKind::SplitterTransform);
    let port_names = stage.distinct_port_names();

    let needs_precache = interest.has_error_transform || interest.has_alert_publisher || port_names.len() > 1;
    let base = if needs_precache { backend.cache(&combined)? } else { combined };

    let cache_each = should_cache(&stage.name, plan);
    let maybe_cache = |c: Arc<dyn Collection>| -> Result<Arc<dyn Collection>, PipelineError> {
        if cache_each { backend.cache(&c) } else { Ok(c) }
    };

    let errors = if interest.has_error_transform {
        Some(maybe_cache(backend.filter_emit(&base, EmitFilter::Error)?)?)
    } else {
        None
    };

    let alerts = if interest.has_alert_publisher {
        Some(maybe_cache(backend.filter_emit(&base, EmitFilter::Alert)?)?)
    } else {
        None
    };

    let (output, output_ports) = if is_splitter {
        let mut ports = BTreeMap::new();
        for name in port_names {
            let filtered = backend.filter_emit(&base, EmitFilter::Port(name.clone()))?;
            ports.insert(name, maybe_cache(filtered)?);
        }
        (None, ports)
    } else {
        let filtered = backend.filter_emit(&base, EmitFilter::Output)?;
        (Some(maybe_cache(filtered)?), BTreeMap::new())
    };

    Ok(RoutedOutputs { output, output_ports, errors, alerts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_engine_domain::{Alert, ErrorRecord, PluginHandle, PluginKind, Port, Record, RecordInfo, Schema};

    /// Tagged collection containing one normal output, one error, and one
    /// alert record, wrapped so `filter_emit` can pull each back out.
    #[derive(Default)]
    struct RecordingBackend;

    enum Payload {
        Tagged(Vec<RecordInfo>),
        Plain(Vec<Record>),
        Errors(Vec<ErrorRecord>),
        Alerts(Vec<Alert>),
    }

    struct Col(Payload);
    impl Collection for Col {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn wrap(p: Payload) -> Arc<dyn Collection> {
        Arc::new(Col(p))
    }

    fn tagged(c: &Arc<dyn Collection>) -> &[RecordInfo] {
        match &c.as_any().downcast_ref::<Col>().unwrap().0 {
            Payload::Tagged(r) => r,
            _ => panic!("expected Tagged"),
        }
    }

    impl CollectionBackend for RecordingBackend {
        fn get_source(&self, _s: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn transform(&self, _i: &Arc<dyn Collection>, _s: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn multi_output_transform(&self, _i: &Arc<dyn Collection>, _s: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn error_transform(&self, _e: &Arc<dyn Collection>, _s: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn compute(&self, _i: &Arc<dyn Collection>, _s: &StageSpec, _p: &pipeline_engine_domain::PluginInstance) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn window(&self, _i: &Arc<dyn Collection>, _s: &StageSpec, _p: &pipeline_engine_domain::PluginInstance) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn aggregate(&self, _i: &Arc<dyn Collection>, _s: &StageSpec, _p: Option<usize>) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn reduce_aggregate(&self, _i: &Arc<dyn Collection>, _s: &StageSpec, _p: Option<usize>) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn publish_alerts(&self, _a: &Arc<dyn Collection>, _s: &StageSpec) -> Result<(), PipelineError> {
            unimplemented!()
        }
        fn union(&self, _i: &[Arc<dyn Collection>]) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn cache(&self, input: &Arc<dyn Collection>) -> Result<Arc<dyn Collection>, PipelineError> {
            Ok(input.clone())
        }
        fn filter_emit(&self, input: &Arc<dyn Collection>, filter: EmitFilter) -> Result<Arc<dyn Collection>, PipelineError> {
            let records = tagged(input);
            Ok(match filter {
                EmitFilter::Output => wrap(Payload::Plain(
                    records.iter().filter_map(|r| match r { RecordInfo::Output(v) => Some(v.clone()), _ => None }).collect(),
                )),
                EmitFilter::Port(name) => wrap(Payload::Plain(
                    records.iter().filter_map(|r| match r { RecordInfo::PortOutput(p, v) if *p == name => Some(v.clone()), _ => None }).collect(),
                )),
                EmitFilter::Error => wrap(Payload::Errors(
                    records.iter().filter_map(|r| match r { RecordInfo::Error(e) => Some(e.clone()), _ => None }).collect(),
                )),
                EmitFilter::Alert => wrap(Payload::Alerts(
                    records.iter().filter_map(|r| match r { RecordInfo::Alert(a) => Some(a.clone()), _ => None }).collect(),
                )),
            })
        }
        fn add_join_key(&self, _i: &Arc<dyn Collection>, _s: &str, _k: &[String]) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn map_values_initial(&self, _s: &Arc<dyn Collection>, _st: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn join_inner(&self, _l: &Arc<dyn Collection>, _r: &Arc<dyn Collection>, _p: Option<usize>) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn join_left_outer(&self, _l: &Arc<dyn Collection>, _r: &Arc<dyn Collection>, _p: Option<usize>) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn join_full_outer(&self, _l: &Arc<dyn Collection>, _r: &Arc<dyn Collection>, _p: Option<usize>) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn join_flatten(&self, _j: &Arc<dyn Collection>, _s: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn merge_join_results(&self, _j: &Arc<dyn Collection>, _s: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn join(&self, _l: &Arc<dyn Collection>, _r: &pipeline_engine_domain::JoinRequest) -> Result<Arc<dyn Collection>, PipelineError> {
            unimplemented!()
        }
        fn create_store_task(&self, _i: &Arc<dyn Collection>, _s: &StageSpec) -> Result<pipeline_engine_domain::SinkTask, PipelineError> {
            unimplemented!()
        }
        fn create_store_task_with_plugin(
            &self,
            _i: &Arc<dyn Collection>,
            _s: &StageSpec,
            _p: &pipeline_engine_domain::PluginInstance,
        ) -> Result<pipeline_engine_domain::SinkTask, PipelineError> {
            unimplemented!()
        }
    }

    fn combined() -> Arc<dyn Collection> {
        wrap(Payload::Tagged(vec![
            RecordInfo::Output(serde_json::json!({"a": 1})),
            RecordInfo::Error(ErrorRecord {
                input_record: serde_json::json!({"a": 2}),
                error_code: None,
                error_message: "bad".to_string(),
                stage_name: "source".to_string(),
            }),
            RecordInfo::Alert(Alert { payload: serde_json::json!({"a": 3}), stage_name: "source".to_string() }),
        ]))
    }

    fn plain_of(c: &Arc<dyn Collection>) -> Vec<Record> {
        match &c.as_any().downcast_ref::<Col>().unwrap().0 {
            Payload::Plain(r) => r.clone(),
            _ => panic!("expected Plain"),
        }
    }

    fn errors_of(c: &Arc<dyn Collection>) -> Vec<ErrorRecord> {
        match &c.as_any().downcast_ref::<Col>().unwrap().0 {
            Payload::Errors(r) => r.clone(),
            _ => panic!("expected Errors"),
        }
    }

    fn alerts_of(c: &Arc<dyn Collection>) -> Vec<Alert> {
        match &c.as_any().downcast_ref::<Col>().unwrap().0 {
            Payload::Alerts(r) => r.clone(),
            _ => panic!("expected Alerts"),
        }
    }

    #[test]
    fn no_interested_downstream_skips_error_and_alert_derivation() {
        let mut stages = BTreeMap::new();
        stages.insert("source".into(), StageSpec::new("source", PluginKind::Source, PluginHandle("source".into())));
        let mut sink = StageSpec::new("sink", PluginKind::BatchSink, PluginHandle("sink".into()));
        sink.input_schemas.insert("source".into(), Schema::default());
        stages.insert("sink".into(), sink);
        let plan = PipelinePlan::new(stages).unwrap();
        let stage = plan.stages.get("source").unwrap();

        let routed = route(&RecordingBackend, combined(), stage, &plan).unwrap();
        assert_eq!(plain_of(routed.output.as_ref().unwrap()), vec![serde_json::json!({"a": 1})]);
        assert!(routed.errors.is_none());
        assert!(routed.alerts.is_none());
        assert!(routed.output_ports.is_empty());
    }

    #[test]
    fn error_and_alert_downstream_interest_derives_both_plus_output() {
        let mut stages = BTreeMap::new();
        stages.insert("source".into(), StageSpec::new("source", PluginKind::Source, PluginHandle("source".into())));
        let mut sink = StageSpec::new("sink", PluginKind::BatchSink, PluginHandle("sink".into()));
        sink.input_schemas.insert("source".into(), Schema::default());
        let mut err_xform = StageSpec::new("err", PluginKind::ErrorTransform, PluginHandle("err".into()));
        err_xform.input_schemas.insert("source".into(), Schema::default());
        let mut alert_pub = StageSpec::new("alert", PluginKind::AlertPublisher, PluginHandle("alert".into()));
        alert_pub.input_schemas.insert("source".into(), Schema::default());
        stages.insert("sink".into(), sink);
        stages.insert("err".into(), err_xform);
        stages.insert("alert".into(), alert_pub);
        let plan = PipelinePlan::new(stages).unwrap();
        let stage = plan.stages.get("source").unwrap();

        let routed = route(&RecordingBackend, combined(), stage, &plan).unwrap();
        assert_eq!(plain_of(routed.output.as_ref().unwrap()), vec![serde_json::json!({"a": 1})]);
        assert_eq!(errors_of(routed.errors.as_ref().unwrap()).len(), 1);
        assert_eq!(alerts_of(routed.alerts.as_ref().unwrap()).len(), 1);
    }

    #[test]
    fn splitter_emits_one_sub_collection_per_declared_port_and_no_plain_output() {
        let mut stages = BTreeMap::new();
        let mut splitter = StageSpec::new("splitter", PluginKind::SplitterTransform, PluginHandle("splitter".into()));
        splitter.output_ports.insert("p_sink".into(), Port { name: "P".into() });
        splitter.output_ports.insert("q_sink".into(), Port { name: "Q".into() });
        stages.insert("splitter".into(), splitter);
        let mut p_sink = StageSpec::new("p_sink", PluginKind::BatchSink, PluginHandle("p_sink".into()));
        p_sink.input_schemas.insert("splitter".into(), Schema::default());
        let mut q_sink = StageSpec::new("q_sink", PluginKind::BatchSink, PluginHandle("q_sink".into()));
        q_sink.input_schemas.insert("splitter".into(), Schema::default());
        stages.insert("p_sink".into(), p_sink);
        stages.insert("q_sink".into(), q_sink);
        let plan = PipelinePlan::new(stages).unwrap();
        let stage = plan.stages.get("splitter").unwrap();

        let combined = wrap(Payload::Tagged(vec![
            RecordInfo::PortOutput("P".into(), serde_json::json!({"a": 1})),
            RecordInfo::PortOutput("Q".into(), serde_json::json!({"a": 2})),
        ]));
        let routed = route(&RecordingBackend, combined, stage, &plan).unwrap();
        assert!(routed.output.is_none());
        assert_eq!(plain_of(routed.output_ports.get("P").unwrap()), vec![serde_json::json!({"a": 1})]);
        assert_eq!(plain_of(routed.output_ports.get("Q").unwrap()), vec![serde_json::json!({"a": 2})]);
    }
}
