// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Join Planner
//!
//! Turns a `BatchJoiner` stage's routed inputs into a single output
//! collection, via one of two algorithms depending on which joiner plugin
//! kind the stage resolved to:
//!
//! - [`plan_explicit_join`]: the pull model. The joiner plugin declares which
//!   of its inputs are required; required inputs are inner-joined together
//!   first (in declared order), then non-required inputs are outer-joined
//!   onto the accumulated result. If there are no required inputs at all,
//!   every side is full-outer-joined instead of left-outer-joined.
//! - [`plan_auto_join`]: the declarative model. The joiner plugin's `define`
//!   returns a complete join plan up front, which is handed to the backend
//!   as a single `CollectionBackend::join` call.

use std::collections::BTreeMap;
use std::sync::Arc;

use pipeline_engine_domain::{
    AutoJoinerContext, AutoJoinerPlugin, Collection, CollectionBackend, ExplicitJoinerPlugin, JoinCollection,
    JoinOp, JoinRequest, JoinSide, PipelineError, Schema, StageSpec,
};

pub fn plan_explicit_join(
    backend: &dyn CollectionBackend,
    stage: &StageSpec,
    routed_inputs: BTreeMap<String, Arc<dyn Collection>>,
    plugin: &dyn ExplicitJoinerPlugin,
) -> Result<Arc<dyn Collection>, PipelineError> {
    let required = plugin.required_inputs();
    let join_keys = plugin.join_keys();

    for name in &required {
        if !routed_inputs.contains_key(name) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "joiner '{}' declares required input '{}' which is not a wired input stage",
                stage.name, name
            )));
        }
    }

    let non_required: Vec<String> = routed_inputs
        .keys()
        .filter(|name| !required.iter().any(|r| r == name.as_str()))
        .cloned()
        .collect();

    let keyed = |name: &str| -> Result<Arc<dyn Collection>, PipelineError> {
        let collection =
            routed_inputs.get(name).ok_or_else(|| PipelineError::MissingInput(name.to_string()))?;
        let key_fields = join_keys.get(name).cloned().unwrap_or_default();
        backend.add_join_key(collection, name, &key_fields)
    };

    let mut accumulator: Option<Arc<dyn Collection>> = None;
    for name in &required {
        let keyed_input = keyed(name)?;
        accumulator = Some(match accumulator {
            None => backend.map_values_initial(&keyed_input, stage)?,
            Some(acc) => {
                let joined = backend.join_inner(&acc, &keyed_input, stage.partitions)?;
                backend.join_flatten(&joined, stage)?
            }
        });
    }

    let full_outer = required.is_empty();
    for name in &non_required {
        let keyed_input = keyed(name)?;
        accumulator = Some(match accumulator {
            None => backend.map_values_initial(&keyed_input, stage)?,
            Some(acc) => {
                let joined = if full_outer {
                    backend.join_full_outer(&acc, &keyed_input, stage.partitions)?
                } else {
                    backend.join_left_outer(&acc, &keyed_input, stage.partitions)?
                };
                backend.join_flatten(&joined, stage)?
            }
        });
    }

    let joined = accumulator.ok_or_else(|| PipelineError::MissingInput(stage.name.clone()))?;
    let merged = backend.merge_join_results(&joined, stage)?;
    backend.cache(&merged)
}

pub fn plan_auto_join(
    backend: &dyn CollectionBackend,
    auto_plugin: &dyn AutoJoinerPlugin,
    stage: &StageSpec,
    routed_inputs: &BTreeMap<String, Arc<dyn Collection>>,
) -> Result<Arc<dyn Collection>, PipelineError> {
    let auto_ctx = AutoJoinerContext { input_schemas: stage.input_schemas.clone() };
    let mut definition = auto_plugin.define(&auto_ctx)?;

    if definition.condition.op != JoinOp::KeyEquality {
        return Err(PipelineError::UnsupportedJoinCondition(stage.name.clone()));
    }

    // Stable sort: broadcast sides move to the end, ties keep declared order.
    definition.stages.sort_by_key(|s| s.broadcast);

    let mut sides = definition.stages.into_iter();
    let left_spec = sides.next().ok_or_else(|| PipelineError::MissingInput(stage.name.clone()))?;
    let left_collection = routed_inputs
        .get(&left_spec.stage_name)
        .ok_or_else(|| PipelineError::MissingInput(left_spec.stage_name.clone()))?
        .clone();

    let left = JoinSide {
        stage_name: left_spec.stage_name.clone(),
        keys: definition.condition.keys.get(&left_spec.stage_name).cloned().unwrap_or_default(),
        schema: stage.input_schemas.get(&left_spec.stage_name).cloned().unwrap_or(Schema::Null),
        required: left_spec.required,
    };

    let mut right_inputs = Vec::new();
    for right_spec in sides {
        let collection = routed_inputs
            .get(&right_spec.stage_name)
            .ok_or_else(|| PipelineError::MissingInput(right_spec.stage_name.clone()))?
            .clone();
        right_inputs.push(JoinCollection {
            stage_name: right_spec.stage_name.clone(),
            collection,
            schema: stage.input_schemas.get(&right_spec.stage_name).cloned().unwrap_or(Schema::Null),
            keys: definition.condition.keys.get(&right_spec.stage_name).cloned().unwrap_or_default(),
            required: right_spec.required,
            broadcast: right_spec.broadcast,
        });
    }

    let request = JoinRequest {
        left,
        right_inputs,
        null_safe: definition.null_safe,
        selected_fields: definition.selected_fields,
        output_schema: definition.output_schema,
    };

    backend.join(&left_collection, &request)
}
