// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Mapping
//!
//! Maps a `PipelineError` category to a Unix `sysexits.h`-style process exit
//! code, so a failed run tells a calling shell script what kind of failure
//! happened without it having to parse stderr.

use pipeline_engine_domain::PipelineError;

/// Unix exit codes, following the `sysexits.h` convention the teacher's CLI
/// bootstrap layer also uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Successful termination.
    Ok = 0,
    /// Catch-all for errors not covered by a more specific code.
    Software = 70,
    /// Input data was incorrect in some way (malformed plan, bad plugin
    /// wiring, unsupported join condition).
    DataErr = 65,
    /// An input file did not exist or was not readable.
    NoInput = 66,
    /// A required configuration value was missing or invalid.
    Config = 78,
    /// Temporary failure; the caller is invited to retry (I/O, interrupted).
    TempFail = 75,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

/// Maps a `PipelineError` to the exit code a shell script should see.
pub fn map_error_to_exit_code(error: &PipelineError) -> ExitCode {
    match error {
        PipelineError::MalformedPipeline(_)
        | PipelineError::UnsupportedPluginKind(_)
        | PipelineError::UnsupportedJoinCondition(_)
        | PipelineError::UnknownJoinerType(_) => ExitCode::DataErr,
        PipelineError::InvalidConfiguration(_) => ExitCode::Config,
        PipelineError::IoError(_) => ExitCode::NoInput,
        PipelineError::Interrupted(_) => ExitCode::TempFail,
        PipelineError::PluginInstantiationFailed(_, _)
        | PipelineError::SinkFailure(_)
        | PipelineError::MissingInput(_)
        | PipelineError::InternalError(_)
        | PipelineError::SerializationError(_) => ExitCode::Software,
    }
}

/// Converts a top-level run result directly into a process exit code,
/// logging the error (if any) before returning.
pub fn result_to_exit_code(result: Result<(), PipelineError>) -> std::process::ExitCode {
    match result {
        Ok(()) => ExitCode::Ok.into(),
        Err(e) => {
            tracing::error!(category = e.category(), "{e}");
            map_error_to_exit_code(&e).into()
        }
    }
}
