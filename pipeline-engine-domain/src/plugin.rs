// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Plugin Materialization
//!
//! Plugins (transform logic, compute logic, joiner configuration) are
//! supplied by the caller, not constructed by this crate. `PluginContext` is
//! the seam: the dispatcher asks it to materialize the plugin instance a
//! stage's `PluginHandle` refers to, and gets back an opaque handle it either
//! passes straight through to the backend (`SparkCompute`, `SparkSink`,
//! `Windower`) or inspects just enough to drive the join planner
//! (`BatchJoiner`).

use std::any::Any;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::execution_context::MacroEvaluator;
use crate::join::{AutoJoinerContext, JoinDefinition};

/// An explicit (`BatchJoiner`) joiner plugin's configuration, as needed by
/// the pull-model join planner.
pub trait ExplicitJoinerPlugin: Send + Sync {
    /// Ordered list of input stage names this joiner requires to be present;
    /// these are joined inner-to-inner first, in declared order.
    fn required_inputs(&self) -> Vec<String>;

    /// Whether outer-join rows with no match on the required side should
    /// still be null-safe-compared (vs. dropped). Threaded through to the
    /// backend's outer-join operations.
    fn null_safe(&self) -> bool;

    /// Join key field names per input stage, in the same shape an
    /// `AutoJoiner`'s `JoinCondition::keys` uses.
    fn join_keys(&self) -> std::collections::BTreeMap<String, Vec<String>>;
}

/// An `AutoJoiner` plugin's configuration: a single `define` call that
/// returns a complete, declarative join plan.
pub trait AutoJoinerPlugin: Send + Sync {
    fn define(&self, ctx: &AutoJoinerContext) -> Result<JoinDefinition, PipelineError>;
}

/// Discriminates which joiner trait a materialized `BatchJoiner` plugin
/// instance implements. Kept separate from `PluginInstance` so the
/// dispatcher can match on it directly against the stage's declared
/// `JoinerKind`.
pub enum JoinerPlugin {
    Explicit(Arc<dyn ExplicitJoinerPlugin>),
    Auto(Arc<dyn AutoJoinerPlugin>),
}

/// What `PluginContext::new_plugin_instance` returns. Most plugin kinds
/// (`SparkCompute`, `SparkSink`, `Windower`) only ever need to hand this
/// straight to the backend, which is free to downcast the `Opaque` payload
/// however it likes; `BatchJoiner` stages are the one case the dispatcher
/// itself inspects, via the `Joiner` variant.
pub enum PluginInstance {
    Joiner(JoinerPlugin),
    Opaque(Arc<dyn Any + Send + Sync>),
}

/// Resolves a stage's `PluginHandle` to a live plugin instance. Kept
/// synchronous: materializing a plugin object is configuration lookup, not
/// I/O, and the rest of plan execution never blocks on record data either.
pub trait PluginContext: Send + Sync {
    fn new_plugin_instance(
        &self,
        stage_name: &str,
        macro_evaluator: &MacroEvaluator,
    ) -> Result<PluginInstance, PipelineError>;
}
