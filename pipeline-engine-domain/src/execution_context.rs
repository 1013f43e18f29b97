// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Context
//!
//! The handful of ambient values a pipeline run needs that are not part of
//! the plan itself: the namespace it runs in, its logical start time (used
//! for macro substitution, not wall-clock telemetry), and the runtime
//! arguments a caller supplied on top of the plan.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Typed access over the raw runtime-argument map a caller supplies
/// alongside a plan. Keeps the one flag the Sink Scheduler cares about
/// (`pipeline.spark.parallel.sinks.enabled`) from being looked up by hand in
/// more than one place.
#[derive(Debug, Clone, Default)]
pub struct RuntimeArguments {
    values: BTreeMap<String, String>,
}

impl RuntimeArguments {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether `pipeline.spark.parallel.sinks.enabled` is set to `true`.
    /// Absent or unparseable values default to `false` (sequential flush).
    pub fn parallel_sinks_enabled(&self) -> bool {
        self.get("pipeline.spark.parallel.sinks.enabled").map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false)
    }
}

/// Minimal macro evaluator passed to `PluginContext::new_plugin_instance`.
/// Real macro substitution (`${logicalStartTime(...)}`-style expressions in
/// plugin configuration) is out of scope; this carries just enough context
/// for a `PluginContext` implementation to build one if it needs to.
#[derive(Debug, Clone)]
pub struct MacroEvaluator {
    pub namespace: String,
    pub logical_start_time: DateTime<Utc>,
}

/// Ambient state for one pipeline run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub namespace: String,
    pub logical_start_time: DateTime<Utc>,
    pub runtime_arguments: RuntimeArguments,
}

impl ExecutionContext {
    pub fn new(namespace: impl Into<String>, logical_start_time: DateTime<Utc>, runtime_arguments: RuntimeArguments) -> Self {
        Self { namespace: namespace.into(), logical_start_time, runtime_arguments }
    }

    pub fn macro_evaluator(&self) -> MacroEvaluator {
        MacroEvaluator { namespace: self.namespace.clone(), logical_start_time: self.logical_start_time }
    }
}
