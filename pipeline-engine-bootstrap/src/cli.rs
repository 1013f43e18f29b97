// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface
//!
//! A thin `clap`-based front end over the engine: `validate` checks a plan
//! document's structure without running anything, `run` additionally
//! executes it against the in-memory reference backend.
//!
//! The in-memory backend only knows how to pass records straight through a
//! `Transform`/`SplitterTransform` stage and write a `BatchSink` stage's
//! input to stdout -- there is no way to express arbitrary plugin logic in a
//! JSON document. This makes `run` genuinely useful for demo plans built out
//! of sources, pass-through transforms, and sinks, and gives a clear
//! diagnostic (`PipelineError::InvalidConfiguration`) for anything that needs
//! real plugin code (`SparkCompute`, `Windower`, joiners, ...).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use pipeline_engine_domain::{PipelineError, RecordInfo, StageSpec};
use serde::Deserialize;

#[derive(Debug, Parser)]
#[command(name = "pipeline-engine", version, about = "Batch pipeline execution engine")]
pub struct Cli {
    /// Enable debug-level logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Optional configuration file (layered under environment and defaults).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse and validate a plan document without executing it.
    Validate {
        /// Path to a JSON plan document.
        plan: PathBuf,
    },
    /// Execute a plan document against the in-memory reference backend.
    Run {
        /// Path to a JSON plan document.
        plan: PathBuf,
        /// Path to a JSON document mapping source stage name to an array of
        /// record payloads; required if the plan has any `Source` stages.
        #[arg(long)]
        sources: Option<PathBuf>,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// A plan document as read from disk: a map from stage name to its spec. Kept
/// separate from `PipelinePlan` so a malformed document (a cycle, a dangling
/// edge) reports through `PipelineError::MalformedPipeline` from
/// `PipelinePlan::new` rather than a bespoke loader error.
#[derive(Debug, Deserialize)]
pub struct PlanDocument {
    pub stages: BTreeMap<String, StageSpec>,
}

pub fn load_plan_document(path: &Path) -> Result<PlanDocument, PipelineError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// A sources document: source stage name -> literal output records, loaded
/// straight into the in-memory backend's `with_source`.
pub fn load_sources_document(path: &Path) -> Result<BTreeMap<String, Vec<RecordInfo>>, PipelineError> {
    let contents = std::fs::read_to_string(path)?;
    let raw: BTreeMap<String, Vec<serde_json::Value>> = serde_json::from_str(&contents)?;
    Ok(raw.into_iter().map(|(stage, records)| (stage, records.into_iter().map(RecordInfo::Output).collect())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_validate_subcommand() {
        let cli = Cli::parse_from(["pipeline-engine", "validate", "plan.json"]);
        match cli.command {
            Commands::Validate { plan } => assert_eq!(plan, PathBuf::from("plan.json")),
            other => panic!("expected Validate, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_run_subcommand_with_sources() {
        let cli = Cli::parse_from(["pipeline-engine", "run", "plan.json", "--sources", "sources.json"]);
        match cli.command {
            Commands::Run { plan, sources } => {
                assert_eq!(plan, PathBuf::from("plan.json"));
                assert_eq!(sources, Some(PathBuf::from("sources.json")));
            }
            other => panic!("expected Run, got {other:?}"),
        }
    }
}
