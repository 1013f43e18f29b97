// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Engine Domain
//!
//! Pure business logic for compiling and describing a batch data pipeline:
//! the plan/DAG model, the record model, the emitted-records registry, join
//! types, and the `CollectionBackend`/`PluginContext` ports that the
//! `pipeline-engine` crate's application layer drives against. Nothing here
//! depends on any particular compute engine, serialization format, or I/O
//! mechanism -- those are infrastructure concerns that live one layer up.

pub mod backend;
pub mod error;
pub mod execution_context;
pub mod join;
pub mod metrics;
pub mod plan;
pub mod plugin;
pub mod record;
pub mod registry;

pub use backend::{Collection, CollectionBackend, SinkTask};
pub use error::PipelineError;
pub use execution_context::{ExecutionContext, MacroEvaluator, RuntimeArguments};
pub use join::{
    AutoJoinerContext, JoinCollection, JoinCondition, JoinDefinition, JoinOp, JoinRequest, JoinSide, JoinStageSpec,
};
pub use metrics::{NoopMetricsCollector, StageMetricsCollector};
pub use plan::{Dag, DownstreamInterest, JoinerKind, PipelinePlan, PluginKind, Port, PluginHandle, StageSpec};
pub use plugin::{AutoJoinerPlugin, ExplicitJoinerPlugin, JoinerPlugin, PluginContext, PluginInstance};
pub use record::{Alert, EmitFilter, ErrorRecord, PortBindings, Record, RecordInfo, Schema};
pub use registry::{EmittedRecords, EmittedRegistry};
