// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Structured Logging
//!
//! Installs a `tracing-subscriber` global default so `#[tracing::instrument]`
//! spans on `run_pipeline` and its collaborators actually go somewhere.
//! Callers that already installed their own subscriber (a test harness, an
//! embedding application) should skip this and configure their own.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`, defaulting to
/// `info` when the variable is unset or unparsable.
///
/// Safe to call more than once per process; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
