// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Runtime Configuration
//!
//! Layers the one runtime flag the engine consumes
//! (`pipeline.spark.parallel.sinks.enabled`) over the `config` crate's
//! file/environment/default precedence, instead of having callers poke at a
//! raw string map by hand. A CLI layer (`pipeline-engine-bootstrap`) is free
//! to add its own flags on top; this module only typechecks the one the
//! engine itself reads.

use std::collections::BTreeMap;

use config::{Config, ConfigError, Environment, File};
use pipeline_engine_domain::RuntimeArguments;
use serde::Deserialize;

const PARALLEL_SINKS_KEY: &str = "pipeline.spark.parallel.sinks.enabled";

#[derive(Debug, Clone, Deserialize, Default)]
struct RawEngineConfig {
    #[serde(default)]
    parallel_sinks_enabled: bool,
}

/// Loads engine runtime arguments from an optional config file, overridden by
/// `PIPELINE_` prefixed environment variables, falling back to defaults
/// (`parallel_sinks_enabled = false`) when neither source sets a value.
pub fn load_runtime_arguments(config_path: Option<&str>) -> Result<RuntimeArguments, ConfigError> {
    let mut builder = Config::builder().set_default("parallel_sinks_enabled", false)?;

    if let Some(path) = config_path {
        builder = builder.add_source(File::with_name(path).required(false));
    }
    builder = builder.add_source(Environment::with_prefix("PIPELINE").separator("__"));

    let raw: RawEngineConfig = builder.build()?.try_deserialize()?;

    let mut values = BTreeMap::new();
    values.insert(PARALLEL_SINKS_KEY.to_string(), raw.parallel_sinks_enabled.to_string());
    Ok(RuntimeArguments::new(values))
}
