// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Collection Backend Contract
//!
//! The engine never touches record data directly: every transformation,
//! aggregation, join, and sink write is delegated to a `CollectionBackend`
//! implementation (an in-memory reference backend for tests and small runs,
//! or something that plans physical jobs against a real distributed compute
//! engine). Handles to a backend's collections are fully opaque to the
//! engine -- `Arc<dyn Collection>` carries no accessible structure, so the
//! driver, dispatcher, and join planner can only ever move handles around
//! and pass them back into further backend calls.

use std::any::Any;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::join::JoinRequest;
use crate::plan::StageSpec;
use crate::plugin::PluginInstance;
use crate::record::EmitFilter;

/// Marker trait for an opaque, backend-owned collection handle.
///
/// Implementations are expected to be cheap to clone (typically an `Arc`
/// around whatever lazy plan representation the backend uses) since handles
/// are threaded through the dispatcher, cache policy, and join planner by
/// value.
pub trait Collection: Send + Sync + Any {
    fn as_any(&self) -> &dyn Any;
}

/// A deferred, boxed sink write. The driver collects one of these per sink
/// stage instead of running the write immediately, so the Sink Scheduler can
/// choose sequential or parallel execution after the whole DAG has been
/// walked.
pub struct SinkTask {
    pub stage_name: String,
    run: Box<dyn FnOnce() -> Result<(), PipelineError> + Send>,
}

impl SinkTask {
    pub fn new(
        stage_name: impl Into<String>,
        run: impl FnOnce() -> Result<(), PipelineError> + Send + 'static,
    ) -> Self {
        Self { stage_name: stage_name.into(), run: Box::new(run) }
    }

    pub fn run(self) -> Result<(), PipelineError> {
        (self.run)()
    }
}

impl std::fmt::Debug for SinkTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkTask").field("stage_name", &self.stage_name).finish_non_exhaustive()
    }
}

/// The operations the Stage Dispatcher and Join Planner need from a compute
/// backend. Every method is synchronous: constructing a collection handle is
/// plan-building, not data movement, and never blocks on record I/O -- only
/// `SinkTask::run` (invoked later, by the Sink Scheduler) actually moves
/// data.
pub trait CollectionBackend: Send + Sync {
    fn get_source(&self, stage: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError>;

    fn transform(&self, input: &Arc<dyn Collection>, stage: &StageSpec) -> Result<Arc<dyn Collection>, PipelineError>;

    fn multi_output_transform(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    fn error_transform(
        &self,
        errors: &Arc<dyn Collection>,
        stage: &StageSpec,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    fn compute(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
        plugin: &PluginInstance,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    fn window(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
        plugin: &PluginInstance,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    fn aggregate(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
        partitions: Option<usize>,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    fn reduce_aggregate(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
        partitions: Option<usize>,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    fn publish_alerts(&self, alerts: &Arc<dyn Collection>, stage: &StageSpec) -> Result<(), PipelineError>;

    fn union(&self, inputs: &[Arc<dyn Collection>]) -> Result<Arc<dyn Collection>, PipelineError>;

    fn cache(&self, input: &Arc<dyn Collection>) -> Result<Arc<dyn Collection>, PipelineError>;

    fn filter_emit(
        &self,
        input: &Arc<dyn Collection>,
        filter: EmitFilter,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    /// Keys `input` for a join, tagging each record with the tuple of
    /// values from `key_fields` and with `source_name` (for diagnostics and
    /// for `merge_join_results` to know field provenance).
    fn add_join_key(
        &self,
        input: &Arc<dyn Collection>,
        source_name: &str,
        key_fields: &[String],
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    /// Seeds an explicit join's accumulator from the first (or only) keyed
    /// side, without joining it against anything yet.
    fn map_values_initial(
        &self,
        keyed: &Arc<dyn Collection>,
        stage: &StageSpec,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    fn join_inner(
        &self,
        left: &Arc<dyn Collection>,
        right: &Arc<dyn Collection>,
        partitions: Option<usize>,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    fn join_left_outer(
        &self,
        left: &Arc<dyn Collection>,
        right: &Arc<dyn Collection>,
        partitions: Option<usize>,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    fn join_full_outer(
        &self,
        left: &Arc<dyn Collection>,
        right: &Arc<dyn Collection>,
        partitions: Option<usize>,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    /// Flattens a pairwise-joined keyed collection back into a single keyed
    /// value, ready to be joined again against the next side.
    fn join_flatten(
        &self,
        joined: &Arc<dyn Collection>,
        stage: &StageSpec,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    /// Drops join keys and applies the joiner's field-selection logic to
    /// produce the stage's final output collection.
    fn merge_join_results(
        &self,
        joined: &Arc<dyn Collection>,
        stage: &StageSpec,
    ) -> Result<Arc<dyn Collection>, PipelineError>;

    /// Declarative join path used by `AutoJoiner`: the backend is responsible
    /// for the whole key-equality, broadcast-aware join plan described by
    /// `request`.
    fn join(&self, left: &Arc<dyn Collection>, request: &JoinRequest) -> Result<Arc<dyn Collection>, PipelineError>;

    fn create_store_task(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
    ) -> Result<SinkTask, PipelineError>;

    fn create_store_task_with_plugin(
        &self,
        input: &Arc<dyn Collection>,
        stage: &StageSpec,
        plugin: &PluginInstance,
    ) -> Result<SinkTask, PipelineError>;
}
