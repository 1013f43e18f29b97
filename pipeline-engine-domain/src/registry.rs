// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Emitted Records Registry
//!
//! After a stage is dispatched, whatever it produced is written into the
//! registry under the stage's name, and every later stage's input resolution
//! reads back out of it. A stage is written to exactly once: the registry
//! enforces this so a dispatcher bug that re-runs a stage fails loudly
//! instead of silently overwriting an earlier result.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::Collection;
use crate::error::PipelineError;

/// Everything one stage produced, split by `RecordInfo` variant.
#[derive(Clone, Default)]
pub struct EmittedRecords {
    pub output: Option<Arc<dyn Collection>>,
    pub output_ports: BTreeMap<String, Arc<dyn Collection>>,
    pub errors: Option<Arc<dyn Collection>>,
    pub alerts: Option<Arc<dyn Collection>>,
}

/// Write-once map from stage name to what that stage emitted.
#[derive(Default)]
pub struct EmittedRegistry {
    entries: BTreeMap<String, EmittedRecords>,
}

impl EmittedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stage's output. Returns `PipelineError::InternalError` if
    /// the stage already has an entry -- the driver's topological iteration
    /// should never visit the same stage twice, so this indicates a bug
    /// rather than a user-facing condition.
    pub fn insert(&mut self, stage_name: &str, records: EmittedRecords) -> Result<(), PipelineError> {
        if self.entries.contains_key(stage_name) {
            return Err(PipelineError::InternalError(format!(
                "stage '{stage_name}' already has emitted records in the registry"
            )));
        }
        self.entries.insert(stage_name.to_string(), records);
        Ok(())
    }

    pub fn get(&self, stage_name: &str) -> Option<&EmittedRecords> {
        self.entries.get(stage_name)
    }
}
