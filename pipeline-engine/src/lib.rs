// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Engine
//!
//! A batch pipeline execution engine: given a plan describing a DAG of
//! typed stages (sources, transforms, aggregators, joiners, sinks, ...) and a
//! `CollectionBackend` to run it against, [`application::run_pipeline`] walks
//! the plan in topological order, dispatches each stage to the backend
//! operation its `PluginKind` maps to, routes tagged record streams to the
//! right downstream consumers, plans joins (explicit and auto), decides what
//! to cache, and defers every sink write until a final scheduled flush.
//!
//! The engine never looks inside a collection. Every transformation is
//! delegated to a `CollectionBackend` implementation -- this crate ships one,
//! [`infrastructure::in_memory_backend::InMemoryBackend`], suitable for tests,
//! demos, and small runs. A production deployment would implement
//! `CollectionBackend` against a real distributed compute engine and reuse
//! everything else unchanged.
//!
//! ## Layout
//!
//! - [`application`]: the driver, dispatcher, cache policy, emit router, and
//!   join planner -- pure orchestration over the `pipeline-engine-domain`
//!   contracts, backend-agnostic.
//! - [`infrastructure`]: the in-memory reference backend, the sink scheduler,
//!   and the ambient config/logging/metrics wiring.
//!
//! The plan/record/plugin/backend data model lives in the sibling
//! `pipeline-engine-domain` crate and is re-exported here for convenience.

pub mod application;
pub mod infrastructure;

pub use application::{run_pipeline, RunPipelineArgs};
pub use pipeline_engine_domain::{
    Collection, CollectionBackend, Dag, EmittedRecords, ExecutionContext, PipelineError, PipelinePlan, PluginContext,
    PluginKind, RuntimeArguments, SinkTask, StageSpec,
};
