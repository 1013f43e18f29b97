// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Join Types
//!
//! Types shared between the explicit-joiner pull model (`BatchJoiner`,
//! driven stage-by-stage by `application::join_planner::plan_explicit_join`)
//! and the declarative auto-joiner (`AutoJoiner`, whose plugin hands back a
//! `JoinDefinition` that `plan_auto_join` turns into a single
//! `CollectionBackend::join` call).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::Collection;
use crate::record::Schema;

/// The only join condition operator currently implemented. Kept as an enum
/// rather than hard-coded so `UnsupportedJoinCondition` has something real
/// to report against when an auto-joiner plugin asks for anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOp {
    KeyEquality,
}

#[derive(Debug, Clone)]
pub struct JoinCondition {
    pub op: JoinOp,
    /// Stage name -> the field names that stage's key tuple is built from.
    pub keys: BTreeMap<String, Vec<String>>,
}

/// One side of an auto-joiner's declared join, before it has been resolved
/// against the plan's actual collections.
#[derive(Debug, Clone)]
pub struct JoinStageSpec {
    pub stage_name: String,
    pub required: bool,
    pub broadcast: bool,
}

/// What an `AutoJoiner` plugin's `define` returns: a full description of how
/// to join its inputs, left for the engine to execute via a single
/// `CollectionBackend::join` call.
#[derive(Debug, Clone)]
pub struct JoinDefinition {
    pub stages: Vec<JoinStageSpec>,
    pub condition: JoinCondition,
    pub selected_fields: Vec<String>,
    pub output_schema: Schema,
    pub null_safe: bool,
}

/// Context an `AutoJoiner` plugin's `define` is evaluated against: the
/// schemas of its declared input stages, nothing else -- an auto-joiner
/// plans its join from schema alone, never from record contents.
#[derive(Debug, Clone, Default)]
pub struct AutoJoinerContext {
    pub input_schemas: BTreeMap<String, Schema>,
}

/// The left (non-broadcast, driving) side of a resolved auto-join.
#[derive(Clone)]
pub struct JoinSide {
    pub stage_name: String,
    pub keys: Vec<String>,
    pub schema: Schema,
    pub required: bool,
}

/// One right-hand side of a resolved auto-join, with its collection handle
/// already looked up.
#[derive(Clone)]
pub struct JoinCollection {
    pub stage_name: String,
    pub collection: Arc<dyn Collection>,
    pub schema: Schema,
    pub keys: Vec<String>,
    pub required: bool,
    pub broadcast: bool,
}

/// Fully resolved auto-join request handed to `CollectionBackend::join`.
#[derive(Clone)]
pub struct JoinRequest {
    pub left: JoinSide,
    pub right_inputs: Vec<JoinCollection>,
    pub null_safe: bool,
    pub selected_fields: Vec<String>,
    pub output_schema: Schema,
}
