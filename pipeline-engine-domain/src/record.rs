// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Record Model
//!
//! The engine treats record payloads as opaque JSON values -- it never
//! inspects their contents, only routes them. `RecordInfo` is the tagged
//! union a stage's combined collection is made of before the Emit Router
//! splits it back apart by tag.

use std::collections::BTreeMap;

/// The payload type the engine moves around. Kept as `serde_json::Value`
/// rather than a type parameter: the engine is schema-agnostic and never
/// needs to know more about a record than "it's some JSON value".
pub type Record = serde_json::Value;

/// An opaque JSON schema descriptor, attached to stage inputs/outputs and to
/// join requests. Schema validation is out of scope; the engine only threads
/// these through so a backend can enforce compatibility if it chooses to.
pub type Schema = serde_json::Value;

/// A record that failed processing somewhere upstream, carrying the original
/// input alongside diagnostic information about the failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub input_record: Record,
    pub error_code: Option<i32>,
    pub error_message: String,
    pub stage_name: String,
}

/// An out-of-band notification emitted by a stage, routed to any downstream
/// `AlertPublisher` rather than flowing with the stage's normal output.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub payload: Record,
    pub stage_name: String,
}

/// Tagged union of everything a stage's combined collection can contain.
/// Replaces the class-hierarchy dispatch of the system this engine emulates
/// with an exhaustive match: every place that consumes a `RecordInfo` has to
/// account for all four variants.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordInfo {
    /// Ordinary output, routed to the stage's default downstream consumers.
    Output(Record),
    /// Output addressed to a named port (`SplitterTransform` stages only).
    PortOutput(String, Record),
    /// A processing failure, routed to any downstream `ErrorTransform`.
    Error(ErrorRecord),
    /// An alert, routed to any downstream `AlertPublisher`.
    Alert(Alert),
}

impl RecordInfo {
    pub fn is_output(&self) -> bool {
        matches!(self, RecordInfo::Output(_))
    }

    pub fn is_port(&self, name: &str) -> bool {
        matches!(self, RecordInfo::PortOutput(p, _) if p == name)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RecordInfo::Error(_))
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, RecordInfo::Alert(_))
    }
}

/// Declarative description of which variant of a combined collection to pull
/// out. Passed to `CollectionBackend::filter_emit` instead of an arbitrary
/// closure, since the backend (not the engine) is what actually knows how to
/// evaluate a filtered pass over its collection representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitFilter {
    Output,
    Port(String),
    Error,
    Alert,
}

/// Names of the distinct output ports a stage declares, keyed by the
/// downstream stage name that subscribes to each one.
pub type PortBindings = BTreeMap<String, String>;
