// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cache Policy
//!
//! Decides whether a stage's output is worth memoizing before it's consumed
//! downstream. A lazily-built collection is otherwise recomputed once per
//! consumer, which is wasted work the moment a stage fans out to more than
//! one downstream stage, or feeds a stage that also reads from elsewhere.

use pipeline_engine_domain::PipelinePlan;

/// Whether `stage_name`'s emitted collections should be cached before being
/// handed to downstream stages.
///
/// Caches when either:
/// - the stage has more than one downstream successor (each would otherwise
///   recompute the same lazy collection independently), or
/// - any single downstream successor has more than one input (so it would
///   union this collection with others, and recomputing the union's inputs
///   on every fold iteration is wasted work).
pub fn should_cache(stage_name: &str, plan: &PipelinePlan) -> bool {
    let successors = plan.dag.successors(stage_name);
    if successors.len() > 1 {
        return true;
    }
    successors.iter().any(|successor| {
        plan.stages.get(successor).map(|stage| stage.input_schemas.len() > 1).unwrap_or(false)
    })
}
