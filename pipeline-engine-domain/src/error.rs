// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! A single, hierarchical error type for the pipeline execution domain. Every
//! fallible operation across the driver, dispatcher, join planner and backend
//! contract returns `Result<_, PipelineError>`, so callers never need to match
//! on multiple error types to find out what went wrong.
//!
//! ## Error Categories
//!
//! - **Plan errors**: malformed plans, unsupported plugin kinds, unresolved
//!   joiner types -- these indicate the plan itself cannot be executed.
//! - **Runtime errors**: missing inputs, plugin instantiation failures, sink
//!   failures -- these surface while a well-formed plan is being run.
//! - **Ambient errors**: I/O, configuration, and internal errors that are not
//!   specific to pipeline semantics.

use thiserror::Error;

/// Errors that can occur while validating or executing a pipeline plan.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    /// The plan is structurally invalid: no source stage, a topological order
    /// that disagrees with the stage set, a dangling edge to an unknown
    /// upstream, or a cycle.
    #[error("malformed pipeline: {0}")]
    MalformedPipeline(String),

    /// A stage declares a `PluginKind` the dispatcher has no case for. Should
    /// be unreachable for plans built through `PipelinePlan::new`, since
    /// `PluginKind` is a closed enum, but kept so the dispatcher's match stays
    /// exhaustive rather than relying on a catch-all.
    #[error("unsupported plugin kind on stage '{0}'")]
    UnsupportedPluginKind(String),

    /// An auto-joiner's `JoinDefinition` uses a condition operator the engine
    /// does not implement.
    #[error("unsupported join condition on stage '{0}'")]
    UnsupportedJoinCondition(String),

    /// The stage's declared joiner kind (explicit vs. auto) does not match
    /// the capability of the plugin instance the `PluginContext` returned.
    #[error("unknown or mismatched joiner type for stage '{0}'")]
    UnknownJoinerType(String),

    /// `PluginContext::new_plugin_instance` failed.
    #[error("plugin instantiation failed for stage '{0}': {1}")]
    PluginInstantiationFailed(String, String),

    /// A deferred sink task failed when the scheduler ran it.
    #[error("sink failure: {0}")]
    SinkFailure(String),

    /// A cooperative cancellation or worker-disconnect condition.
    #[error("interrupted: {0}")]
    Interrupted(String),

    /// A stage required input that was not available in the emitted-records
    /// registry (an upstream produced no records of the needed kind, or the
    /// stage has no wired inputs at all).
    #[error("missing input for stage '{0}'")]
    MissingInput(String),

    /// A configuration value was missing or could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A backend or bootstrap failure that doesn't fit another category.
    #[error("internal error: {0}")]
    InternalError(String),

    /// An I/O failure while reading a plan, loading a record source, or
    /// writing a sink.
    #[error("io error: {0}")]
    IoError(String),

    /// A serialization/deserialization failure.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl PipelineError {
    /// Returns whether retrying the operation unchanged might succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipelineError::IoError(_) | PipelineError::Interrupted(_))
    }

    /// Coarse category, useful for metrics labels and log fields.
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::MalformedPipeline(_) => "plan",
            PipelineError::UnsupportedPluginKind(_) => "plan",
            PipelineError::UnsupportedJoinCondition(_) => "plan",
            PipelineError::UnknownJoinerType(_) => "plan",
            PipelineError::PluginInstantiationFailed(_, _) => "plugin",
            PipelineError::SinkFailure(_) => "sink",
            PipelineError::Interrupted(_) => "cancellation",
            PipelineError::MissingInput(_) => "runtime",
            PipelineError::InvalidConfiguration(_) => "configuration",
            PipelineError::InternalError(_) => "internal",
            PipelineError::IoError(_) => "io",
            PipelineError::SerializationError(_) => "serialization",
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_recoverable() {
        let err: PipelineError = std::io::Error::new(std::io::ErrorKind::NotFound, "nope").into();
        assert!(err.is_recoverable());
        assert_eq!(err.category(), "io");
    }

    #[test]
    fn malformed_pipeline_is_not_recoverable() {
        let err = PipelineError::MalformedPipeline("no source stage".into());
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "plan");
    }
}
