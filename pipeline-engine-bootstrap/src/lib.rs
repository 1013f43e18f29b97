// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap
//!
//! Everything that sits **outside** the engine's domain/application/
//! infrastructure layers: CLI parsing, process-exit-code mapping, bootstrap
//! logging, and graceful-shutdown coordination. The enterprise layers never
//! depend back on this crate.
//!
//! - [`cli`] -- argument parsing and plan/sources document loading.
//! - [`exit_code`] -- maps a `PipelineError` to a `sysexits.h`-style process
//!   exit code.
//! - [`logger`] -- a minimal logging trait for bootstrap-phase messages,
//!   separate from the `tracing` spans the engine itself emits.
//! - [`shutdown`] -- cancellation tokens and grace-period coordination for
//!   the `run` command's Ctrl+C handling.

pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod shutdown;

pub use cli::{parse_cli, Cli, Commands};
pub use exit_code::{map_error_to_exit_code, result_to_exit_code, ExitCode};
