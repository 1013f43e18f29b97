// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory Collection Backend
//!
//! A small, synchronous `CollectionBackend` implementation backed by `Vec`s
//! instead of a real distributed compute engine. It exists so the driver,
//! dispatcher, cache policy, and join planner are exercisable end-to-end in
//! tests and via the bootstrap CLI's demo run mode -- it is not part of the
//! production contract (§6 of the design doc still treats the real backend
//! as an external collaborator the caller supplies).
//!
//! Each stage's behavior (what a source emits, how a transform maps a
//! record, which fields a sink captures) is registered ahead of time, keyed
//! by stage name, via the builder methods below. This mirrors how a real
//! backend resolves a stage's plugin class through its own classloading
//! mechanism rather than through the `PluginContext` the engine uses for
//! `SparkCompute`/`SparkSink`/`Windower`/joiner stages.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use pipeline_engine_domain::{
    Alert, Collection, CollectionBackend, EmitFilter, ErrorRecord, JoinRequest, PipelineError, PluginInstance,
    Record, RecordInfo, SinkTask, StageSpec,
};

type TransformFn = Box<dyn Fn(&Record) -> Vec<RecordInfo> + Send + Sync>;
type ErrorTransformFn = Box<dyn Fn(&ErrorRecord) -> Vec<RecordInfo> + Send + Sync>;
type AggregateFn = Box<dyn Fn(&[Record], Option<usize>) -> Vec<RecordInfo> + Send + Sync>;
type ComputeFn = Box<dyn Fn(&[Record]) -> Vec<Record> + Send + Sync>;
type SinkFn = Arc<dyn Fn(&[Record]) -> Result<(), PipelineError> + Send + Sync>;

/// One row of a join-key-tagged collection: the extracted key tuple plus
/// whatever per-source fields have been merged into it so far. Chained joins
/// accumulate more entries in `fields` as each side is folded in; there is no
/// separate "joined pair" representation to flatten afterward, so
/// `join_flatten` is a no-op for this backend.
#[derive(Clone, Debug)]
struct KeyedRow {
    key: Vec<Record>,
    fields: BTreeMap<String, Record>,
}

/// The one concrete `Collection` type this backend ever hands back. Which
/// variant a handle holds is determined entirely by which backend method
/// produced it; callers never need to know this, since `Arc<dyn Collection>`
/// keeps it opaque.
enum Payload {
    /// A stage's heterogeneous combined output, before the Emit Router has
    /// split it into normal/port/error/alert sub-collections.
    Tagged(Vec<RecordInfo>),
    /// A single-kind collection of plain records: a routed normal or port
    /// output, a `compute`/`window` result, or a join's final output.
    Plain(Vec<Record>),
    Errors(Vec<ErrorRecord>),
    Alerts(Vec<Alert>),
    Keyed(Vec<KeyedRow>),
}

struct InMemoryCollection(Payload);

impl Collection for InMemoryCollection {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn wrap(payload: Payload) -> Arc<dyn Collection> {
    Arc::new(InMemoryCollection(payload))
}

fn payload_of<'a>(collection: &'a Arc<dyn Collection>, what: &str) -> Result<&'a Payload, PipelineError> {
    collection
        .as_any()
        .downcast_ref::<InMemoryCollection>()
        .map(|c| &c.0)
        .ok_or_else(|| PipelineError::InternalError(format!("collection handle did not originate from InMemoryBackend (expected {what})")))
}

fn plain<'a>(collection: &'a Arc<dyn Collection>) -> Result<&'a [Record], PipelineError> {
    match payload_of(collection, "Plain")? {
        Payload::Plain(records) => Ok(records),
        _ => Err(PipelineError::InternalError("expected a Plain collection".into())),
    }
}

fn tagged<'a>(collection: &'a Arc<dyn Collection>) -> Result<&'a [RecordInfo], PipelineError> {
    match payload_of(collection, "Tagged")? {
        Payload::Tagged(records) => Ok(records),
        _ => Err(PipelineError::InternalError("expected a Tagged collection".into())),
    }
}

fn errors<'a>(collection: &'a Arc<dyn Collection>) -> Result<&'a [ErrorRecord], PipelineError> {
    match payload_of(collection, "Errors")? {
        Payload::Errors(records) => Ok(records),
        _ => Err(PipelineError::InternalError("expected an Errors collection".into())),
    }
}

fn keyed<'a>(collection: &'a Arc<dyn Collection>) -> Result<&'a [KeyedRow], PipelineError> {
    match payload_of(collection, "Keyed")? {
        Payload::Keyed(rows) => Ok(rows),
        _ => Err(PipelineError::InternalError("expected a Keyed collection".into())),
    }
}

fn extract_key(record: &Record, fields: &[String]) -> Vec<Record> {
    fields.iter().map(|f| record.get(f).cloned().unwrap_or(Record::Null)).collect()
}

fn missing_registration(kind: &str, stage: &str, available: &BTreeMap<String, impl Sized>) -> PipelineError {
    let names: Vec<&str> = available.keys().map(String::as_str).collect();
    PipelineError::InvalidConfiguration(format!(
        "no {kind} registered for stage '{stage}'. Available: {names:?}"
    ))
}

/// Reference, in-memory implementation of [`CollectionBackend`].
///
/// Construct with [`InMemoryBackend::new`] and register each stage's
/// behavior with the `with_*` builder methods before handing it to
/// `run_pipeline`; sink output and published alerts are readable afterward
/// via [`InMemoryBackend::sink_output`] and [`InMemoryBackend::alerts`].
#[derive(Default)]
pub struct InMemoryBackend {
    sources: BTreeMap<String, Vec<RecordInfo>>,
    transforms: BTreeMap<String, TransformFn>,
    splitters: BTreeMap<String, TransformFn>,
    error_transforms: BTreeMap<String, ErrorTransformFn>,
    aggregates: BTreeMap<String, AggregateFn>,
    reduce_aggregates: BTreeMap<String, AggregateFn>,
    computes: BTreeMap<String, ComputeFn>,
    windows: BTreeMap<String, ComputeFn>,
    sink_writers: BTreeMap<String, SinkFn>,
    sink_output: Arc<Mutex<BTreeMap<String, Vec<Record>>>>,
    published_alerts: Arc<Mutex<Vec<Alert>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, stage_name: impl Into<String>, records: Vec<RecordInfo>) -> Self {
        self.sources.insert(stage_name.into(), records);
        self
    }

    pub fn with_transform(
        mut self,
        stage_name: impl Into<String>,
        f: impl Fn(&Record) -> Vec<RecordInfo> + Send + Sync + 'static,
    ) -> Self {
        self.transforms.insert(stage_name.into(), Box::new(f));
        self
    }

    pub fn with_splitter(
        mut self,
        stage_name: impl Into<String>,
        f: impl Fn(&Record) -> Vec<RecordInfo> + Send + Sync + 'static,
    ) -> Self {
        self.splitters.insert(stage_name.into(), Box::new(f));
        self
    }

    pub fn with_error_transform(
        mut self,
        stage_name: impl Into<String>,
        f: impl Fn(&ErrorRecord) -> Vec<RecordInfo> + Send + Sync + 'static,
    ) -> Self {
        self.error_transforms.insert(stage_name.into(), Box::new(f));
        self
    }

    pub fn with_aggregate(
        mut self,
        stage_name: impl Into<String>,
        f: impl Fn(&[Record], Option<usize>) -> Vec<RecordInfo> + Send + Sync + 'static,
    ) -> Self {
        self.aggregates.insert(stage_name.into(), Box::new(f));
        self
    }

    pub fn with_reduce_aggregate(
        mut self,
        stage_name: impl Into<String>,
        f: impl Fn(&[Record], Option<usize>) -> Vec<RecordInfo> + Send + Sync + 'static,
    ) -> Self {
        self.reduce_aggregates.insert(stage_name.into(), Box::new(f));
        self
    }

    pub fn with_compute(
        mut self,
        stage_name: impl Into<String>,
        f: impl Fn(&[Record]) -> Vec<Record> + Send + Sync + 'static,
    ) -> Self {
        self.computes.insert(stage_name.into(), Box::new(f));
        self
    }

    pub fn with_window(
        mut self,
        stage_name: impl Into<String>,
        f: impl Fn(&[Record]) -> Vec<Record> + Send + Sync + 'static,
    ) -> Self {
        self.windows.insert(stage_name.into(), Box::new(f));
        self
    }

    pub fn with_sink_writer(
        mut self,
        stage_name: impl Into<String>,
        f: impl Fn(&[Record]) -> Result<(), PipelineError> + Send + Sync + 'static,
    ) -> Self {
        self.sink_writers.insert(stage_name.into(), Arc::new(f));
        self
    }

    /// Records captured by `stage_name`'s sink task, in write order. Empty if
    /// the sink never ran (e.g. the pipeline failed before reaching it).
    pub fn sink_output(&self, stage_name: &str) -> Vec<Record> {
        self.sink_output.lock().expect("sink_output mutex poisoned").get(stage_name).cloned().unwrap_or_default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.published_alerts.lock().expect("alerts mutex poisoned").clone()
    }

    fn merge_keyed(left: &[KeyedRow], right: &[KeyedRow], mode: JoinMode) -> Vec<KeyedRow> {
        let mut right_by_key: BTreeMap<String, &KeyedRow> = BTreeMap::new();
        for row in right {
            right_by_key.insert(format!("{:?}", row.key), row);
        }
        let mut matched_right_keys = std::collections::BTreeSet::new();

        let mut out = Vec::new();
        for l in left {
            let key_str = format!("{:?}", l.key);
            match right_by_key.get(&key_str) {
                Some(r) => {
                    matched_right_keys.insert(key_str);
                    let mut fields = l.fields.clone();
                    fields.extend(r.fields.clone());
                    out.push(KeyedRow { key: l.key.clone(), fields });
                }
                None => {
                    if matches!(mode, JoinMode::LeftOuter | JoinMode::FullOuter) {
                        out.push(l.clone());
                    }
                }
            }
        }

        if matches!(mode, JoinMode::FullOuter) {
            for r in right {
                let key_str = format!("{:?}", r.key);
                if !matched_right_keys.contains(&key_str) {
                    out.push(r.clone());
                }
            }
        }

        out
    }
}

#[derive(Clone, Copy)]
enum JoinMode {
    Inner,
    LeftOuter,
    FullOuter,
}

impl CollectionBackend for InMemoryBackend {
    fn get_source(&self, stage: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
        let records = self
            .sources
            .get(&stage.name)
            .ok_or_else(|| missing_registration("source", &stage.name, &self.sources))?;
        Ok(wrap(Payload::Tagged(records.clone())))
    }

    fn transform(&self, input: &Arc<dyn Collection>, stage: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
        let f = self
            .transforms
            .get(&stage.name)
            .ok_or_else(|| missing_registration("transform", &stage.name, &self.transforms))?;
        let out = plain(input)?.iter().flat_map(|r| f(r)).collect();
        Ok(wrap(Payload::Tagged(out)))
    }

    fn multi_output_transform(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
    ) -> Result<Arc<dyn Collection>, PipelineError> {
        let f = self
            .splitters
            .get(&stage.name)
            .ok_or_else(|| missing_registration("splitter", &stage.name, &self.splitters))?;
        let out = plain(input)?.iter().flat_map(|r| f(r)).collect();
        Ok(wrap(Payload::Tagged(out)))
    }

    fn error_transform(&self, errs: &Arc<dyn Collection>, stage: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
        let f = self
            .error_transforms
            .get(&stage.name)
            .ok_or_else(|| missing_registration("error transform", &stage.name, &self.error_transforms))?;
        let out = errors(errs)?.iter().flat_map(|r| f(r)).collect();
        Ok(wrap(Payload::Tagged(out)))
    }

    fn compute(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
        _plugin: &PluginInstance,
    ) -> Result<Arc<dyn Collection>, PipelineError> {
        let f = self
            .computes
            .get(&stage.name)
            .ok_or_else(|| missing_registration("compute", &stage.name, &self.computes))?;
        Ok(wrap(Payload::Plain(f(plain(input)?))))
    }

    fn window(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
        _plugin: &PluginInstance,
    ) -> Result<Arc<dyn Collection>, PipelineError> {
        let f = self.windows.get(&stage.name).ok_or_else(|| missing_registration("windower", &stage.name, &self.windows))?;
        Ok(wrap(Payload::Plain(f(plain(input)?))))
    }

    fn aggregate(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
        partitions: Option<usize>,
    ) -> Result<Arc<dyn Collection>, PipelineError> {
        let f = self
            .aggregates
            .get(&stage.name)
            .ok_or_else(|| missing_registration("aggregator", &stage.name, &self.aggregates))?;
        Ok(wrap(Payload::Tagged(f(plain(input)?, partitions))))
    }

    fn reduce_aggregate(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
        partitions: Option<usize>,
    ) -> Result<Arc<dyn Collection>, PipelineError> {
        let f = self
            .reduce_aggregates
            .get(&stage.name)
            .ok_or_else(|| missing_registration("reducible aggregator", &stage.name, &self.reduce_aggregates))?;
        Ok(wrap(Payload::Tagged(f(plain(input)?, partitions))))
    }

    fn publish_alerts(&self, alerts_in: &Arc<dyn Collection>, _stage: &StageSpec) -> Result<(), PipelineError> {
        let alerts = match payload_of(alerts_in, "Alerts")? {
            Payload::Alerts(a) => a.clone(),
            _ => return Err(PipelineError::InternalError("expected an Alerts collection".into())),
        };
        self.published_alerts.lock().expect("alerts mutex poisoned").extend(alerts);
        Ok(())
    }

    fn union(&self, inputs: &[Arc<dyn Collection>]) -> Result<Arc<dyn Collection>, PipelineError> {
        let Some(first) = inputs.first() else {
            return Ok(wrap(Payload::Plain(Vec::new())));
        };
        match payload_of(first, "union input")? {
            Payload::Plain(_) => {
                let mut out = Vec::new();
                for c in inputs {
                    out.extend(plain(c)?.iter().cloned());
                }
                Ok(wrap(Payload::Plain(out)))
            }
            Payload::Errors(_) => {
                let mut out = Vec::new();
                for c in inputs {
                    out.extend(errors(c)?.iter().cloned());
                }
                Ok(wrap(Payload::Errors(out)))
            }
            Payload::Alerts(_) => {
                let mut out = Vec::new();
                for c in inputs {
                    if let Payload::Alerts(a) = payload_of(c, "Alerts")? {
                        out.extend(a.iter().cloned());
                    }
                }
                Ok(wrap(Payload::Alerts(out)))
            }
            Payload::Tagged(_) | Payload::Keyed(_) => {
                Err(PipelineError::InternalError("union is only defined over Plain/Errors/Alerts collections".into()))
            }
        }
    }

    fn cache(&self, input: &Arc<dyn Collection>) -> Result<Arc<dyn Collection>, PipelineError> {
        // Already fully materialized in memory; caching twice is the same
        // handle both times, satisfying cache idempotence trivially.
        Ok(input.clone())
    }

    fn filter_emit(&self, input: &Arc<dyn Collection>, filter: EmitFilter) -> Result<Arc<dyn Collection>, PipelineError> {
        let records = tagged(input)?;
        match filter {
            EmitFilter::Output => {
                let out = records
                    .iter()
                    .filter_map(|r| match r {
                        RecordInfo::Output(v) => Some(v.clone()),
                        _ => None,
                    })
                    .collect();
                Ok(wrap(Payload::Plain(out)))
            }
            EmitFilter::Port(name) => {
                let out = records
                    .iter()
                    .filter_map(|r| match r {
                        RecordInfo::PortOutput(p, v) if *p == name => Some(v.clone()),
                        _ => None,
                    })
                    .collect();
                Ok(wrap(Payload::Plain(out)))
            }
            EmitFilter::Error => {
                let out = records
                    .iter()
                    .filter_map(|r| match r {
                        RecordInfo::Error(e) => Some(e.clone()),
                        _ => None,
                    })
                    .collect();
                Ok(wrap(Payload::Errors(out)))
            }
            EmitFilter::Alert => {
                let out = records
                    .iter()
                    .filter_map(|r| match r {
                        RecordInfo::Alert(a) => Some(a.clone()),
                        _ => None,
                    })
                    .collect();
                Ok(wrap(Payload::Alerts(out)))
            }
        }
    }

    fn add_join_key(
        &self,
        input: &Arc<dyn Collection>,
        source_name: &str,
        key_fields: &[String],
    ) -> Result<Arc<dyn Collection>, PipelineError> {
        let rows = plain(input)?
            .iter()
            .map(|r| {
                let mut fields = BTreeMap::new();
                fields.insert(source_name.to_string(), r.clone());
                KeyedRow { key: extract_key(r, key_fields), fields }
            })
            .collect();
        Ok(wrap(Payload::Keyed(rows)))
    }

    fn map_values_initial(&self, seed: &Arc<dyn Collection>, _stage: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
        Ok(wrap(Payload::Keyed(keyed(seed)?.to_vec())))
    }

    fn join_inner(
        &self,
        left: &Arc<dyn Collection>,
        right: &Arc<dyn Collection>,
        _partitions: Option<usize>,
    ) -> Result<Arc<dyn Collection>, PipelineError> {
        Ok(wrap(Payload::Keyed(Self::merge_keyed(keyed(left)?, keyed(right)?, JoinMode::Inner))))
    }

    fn join_left_outer(
        &self,
        left: &Arc<dyn Collection>,
        right: &Arc<dyn Collection>,
        _partitions: Option<usize>,
    ) -> Result<Arc<dyn Collection>, PipelineError> {
        Ok(wrap(Payload::Keyed(Self::merge_keyed(keyed(left)?, keyed(right)?, JoinMode::LeftOuter))))
    }

    fn join_full_outer(
        &self,
        left: &Arc<dyn Collection>,
        right: &Arc<dyn Collection>,
        _partitions: Option<usize>,
    ) -> Result<Arc<dyn Collection>, PipelineError> {
        Ok(wrap(Payload::Keyed(Self::merge_keyed(keyed(left)?, keyed(right)?, JoinMode::FullOuter))))
    }

    fn join_flatten(&self, joined: &Arc<dyn Collection>, _stage: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
        // Rows are already flat maps of source name -> record; nothing to do.
        Ok(wrap(Payload::Keyed(keyed(joined)?.to_vec())))
    }

    fn merge_join_results(&self, joined: &Arc<dyn Collection>, _stage: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError> {
        let out = keyed(joined)?
            .iter()
            .map(|row| {
                let mut merged = serde_json::Map::new();
                for (source, record) in &row.fields {
                    merged.insert(source.clone(), record.clone());
                }
                Record::Object(merged)
            })
            .collect();
        Ok(wrap(Payload::Plain(out)))
    }

    fn join(&self, left: &Arc<dyn Collection>, request: &JoinRequest) -> Result<Arc<dyn Collection>, PipelineError> {
        let mut accumulator = keyed(&self.add_join_key(left, &request.left.stage_name, &request.left.keys)?)?.to_vec();

        for right in &request.right_inputs {
            let keyed_right = keyed(&self.add_join_key(&right.collection, &right.stage_name, &right.keys)?)?.to_vec();
            let mode = if right.required { JoinMode::Inner } else { JoinMode::LeftOuter };
            accumulator = Self::merge_keyed(&accumulator, &keyed_right, mode);
        }

        self.merge_join_results(&wrap(Payload::Keyed(accumulator)), &placeholder_stage())
    }

    fn create_store_task(&self, input: &Arc<dyn Collection>, stage: &StageSpec) -> Result<SinkTask, PipelineError> {
        let records = plain(input)?.to_vec();
        let stage_name = stage.name.clone();
        let writer = self.sink_writers.get(&stage.name).cloned();
        let sink_output = self.sink_output.clone();

        Ok(SinkTask::new(stage_name.clone(), move || {
            if let Some(writer) = &writer {
                writer(&records)?;
            }
            sink_output.lock().expect("sink_output mutex poisoned").insert(stage_name.clone(), records);
            Ok(())
        }))
    }

    fn create_store_task_with_plugin(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
        _plugin: &PluginInstance,
    ) -> Result<SinkTask, PipelineError> {
        self.create_store_task(input, stage)
    }
}

/// `merge_join_results` only reads `joined`, but the trait threads `stage`
/// through for backends that need it (e.g. to look up selected-field
/// projections). This backend doesn't, so the auto-join path synthesizes an
/// unused placeholder rather than requiring callers to thread one in.
fn placeholder_stage() -> StageSpec {
    StageSpec::new(
        "__auto_join__",
        pipeline_engine_domain::PluginKind::BatchJoiner(pipeline_engine_domain::JoinerKind::Auto),
        pipeline_engine_domain::PluginHandle("__auto_join__".to_string()),
    )
}
