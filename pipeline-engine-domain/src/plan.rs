// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Plan
//!
//! A `PipelinePlan` is the compiled, validated description of a DAG of
//! stages. It is built once (typically by deserializing a plan document) and
//! then driven to completion by `application::driver::run_pipeline`.
//!
//! Stage identity is always by name: there is no separate numeric id, since
//! plan documents and log output both want the human-readable name and
//! keeping a single identifier avoids them drifting apart.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::record::Schema;

/// The kind of joiner a `BatchJoiner` stage uses. Determined when the plan is
/// compiled (out of scope for this crate); by the time a `StageSpec` reaches
/// the dispatcher it is already known which algorithm applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinerKind {
    Explicit,
    Auto,
}

/// The closed set of plugin kinds a stage can declare. Dispatch is an
/// exhaustive match over this enum rather than a chain of type checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Source,
    /// Acts as a source when the stage has no inputs, or as a sink when it
    /// has exactly one input -- the dispatcher decides which based on the
    /// stage's wiring, not on a separate flag.
    Connector,
    BatchSink,
    Transform,
    SplitterTransform,
    ErrorTransform,
    SparkCompute,
    SparkSink,
    BatchAggregator,
    BatchReducibleAggregator,
    BatchJoiner(JoinerKind),
    Windower,
    AlertPublisher,
}

/// A named output port a `SplitterTransform` stage can route records to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
}

/// Opaque handle identifying which configured plugin instance backs a stage.
/// Resolved to an actual plugin object by `PluginContext::new_plugin_instance`
/// at dispatch time; the plan itself never constructs plugin objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginHandle(pub String);

/// One stage of a pipeline plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    pub plugin_type: PluginKind,
    pub plugin_handle: PluginHandle,
    /// Upstream stage name -> the schema that stage is expected to produce.
    /// Also doubles as the edge list: a key present here that is not a key in
    /// the plan's stage map is a dangling edge.
    #[serde(default)]
    pub input_schemas: BTreeMap<String, Schema>,
    #[serde(default)]
    pub output_schema: Option<Schema>,
    /// Downstream stage name -> which named port that downstream consumes.
    /// Only populated for `SplitterTransform` stages.
    #[serde(default)]
    pub output_ports: BTreeMap<String, Port>,
    /// Partition count hint passed to aggregation/join backend operations;
    /// `None` lets the backend pick its own default.
    #[serde(default)]
    pub partitions: Option<usize>,
}

impl StageSpec {
    pub fn new(name: impl Into<String>, plugin_type: PluginKind, plugin_handle: PluginHandle) -> Self {
        Self {
            name: name.into(),
            plugin_type,
            plugin_handle,
            input_schemas: BTreeMap::new(),
            output_schema: None,
            output_ports: BTreeMap::new(),
            partitions: None,
        }
    }

    /// Distinct port names this stage declares, regardless of how many
    /// downstream stages subscribe to each one.
    pub fn distinct_port_names(&self) -> BTreeSet<String> {
        self.output_ports.values().map(|p| p.name.clone()).collect()
    }
}

/// Precomputed DAG structure: a deterministic topological order plus the
/// successor sets needed by the Cache Policy and the Emit Router.
#[derive(Debug, Clone, Default)]
pub struct Dag {
    pub topological_order: Vec<String>,
    successors: BTreeMap<String, BTreeSet<String>>,
}

impl Dag {
    /// Builds the DAG from each stage's declared `input_schemas`. Ties in the
    /// topological sort are broken lexicographically by stage name, so the
    /// same plan always produces the same execution order.
    pub fn build(stages: &BTreeMap<String, StageSpec>) -> Result<Self, PipelineError> {
        let mut indegree: BTreeMap<String, usize> = stages.keys().map(|k| (k.clone(), 0)).collect();
        let mut successors: BTreeMap<String, BTreeSet<String>> =
            stages.keys().map(|k| (k.clone(), BTreeSet::new())).collect();

        for stage in stages.values() {
            for upstream in stage.input_schemas.keys() {
                if let Some(set) = successors.get_mut(upstream) {
                    set.insert(stage.name.clone());
                    *indegree.get_mut(&stage.name).expect("stage present in indegree map") += 1;
                }
                // Upstream not present in this plan: left for PipelinePlan::validate
                // to reject as a dangling edge rather than silently dropped here.
            }
        }

        let mut ready: BinaryHeap<Reverse<String>> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| Reverse(name.clone()))
            .collect();

        let mut order = Vec::with_capacity(stages.len());
        while let Some(Reverse(name)) = ready.pop() {
            if let Some(next) = successors.get(&name).cloned() {
                for successor in next {
                    let degree = indegree.get_mut(&successor).expect("successor present in indegree map");
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(successor));
                    }
                }
            }
            order.push(name);
        }

        if order.len() != stages.len() {
            return Err(PipelineError::MalformedPipeline(
                "pipeline contains a cycle or an unresolvable dependency".into(),
            ));
        }

        Ok(Self { topological_order: order, successors })
    }

    pub fn successors(&self, stage_name: &str) -> Vec<String> {
        self.successors.get(stage_name).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn fan_out(&self, stage_name: &str) -> usize {
        self.successors.get(stage_name).map(|s| s.len()).unwrap_or(0)
    }
}

/// Which kinds of sub-collections a stage's downstream neighbors actually
/// consume. Drives the Emit Router's decision about which sub-collections to
/// bother deriving at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownstreamInterest {
    pub has_error_transform: bool,
    pub has_alert_publisher: bool,
}

/// The compiled, validated DAG of stages ready to execute.
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    pub stages: BTreeMap<String, StageSpec>,
    pub dag: Dag,
    pub sources: BTreeSet<String>,
}

impl PipelinePlan {
    pub fn new(stages: BTreeMap<String, StageSpec>) -> Result<Self, PipelineError> {
        if stages.is_empty() {
            return Err(PipelineError::MalformedPipeline("pipeline has no stages".into()));
        }

        let dag = Dag::build(&stages)?;
        let sources: BTreeSet<String> =
            stages.values().filter(|s| s.input_schemas.is_empty()).map(|s| s.name.clone()).collect();

        let plan = Self { stages, dag, sources };
        plan.validate()?;
        Ok(plan)
    }

    /// Pre-flight validation run once before the driver starts iterating
    /// stages: catches a malformed plan before any stage executes, rather
    /// than failing midway through a partially-materialized run.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.dag.topological_order.is_empty() {
            return Err(PipelineError::MalformedPipeline("topological order is empty".into()));
        }

        if self.sources.is_empty() {
            return Err(PipelineError::MalformedPipeline("pipeline has no source stage".into()));
        }

        let mut seen = BTreeSet::new();
        for name in &self.dag.topological_order {
            if !self.stages.contains_key(name) {
                return Err(PipelineError::MalformedPipeline(format!(
                    "topological order references unknown stage '{name}'"
                )));
            }
            if !seen.insert(name.clone()) {
                return Err(PipelineError::MalformedPipeline(format!(
                    "stage '{name}' appears more than once in topological order"
                )));
            }
        }
        if seen.len() != self.stages.len() {
            return Err(PipelineError::MalformedPipeline(
                "topological order is missing one or more stages".into(),
            ));
        }

        for stage in self.stages.values() {
            for upstream in stage.input_schemas.keys() {
                if !self.stages.contains_key(upstream) {
                    return Err(PipelineError::MalformedPipeline(format!(
                        "stage '{}' declares input from unknown upstream '{}'",
                        stage.name, upstream
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn downstream_interest(&self, stage_name: &str) -> DownstreamInterest {
        let mut interest = DownstreamInterest::default();
        for successor_name in self.dag.successors(stage_name) {
            if let Some(successor) = self.stages.get(&successor_name) {
                match successor.plugin_type {
                    PluginKind::ErrorTransform => interest.has_error_transform = true,
                    PluginKind::AlertPublisher => interest.has_alert_publisher = true,
                    _ => {}
                }
            }
        }
        interest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str, inputs: &[&str]) -> StageSpec {
        let mut s = StageSpec::new(name, PluginKind::Transform, PluginHandle(name.to_string()));
        for i in inputs {
            s.input_schemas.insert(i.to_string(), Schema::default());
        }
        s
    }

    #[test]
    fn topological_order_is_deterministic_on_ties() {
        let mut stages = BTreeMap::new();
        stages.insert("source".into(), {
            let mut s = stage("source", &[]);
            s.plugin_type = PluginKind::Source;
            s
        });
        stages.insert("b".into(), stage("b", &["source"]));
        stages.insert("a".into(), stage("a", &["source"]));

        let plan = PipelinePlan::new(stages).expect("valid plan");
        assert_eq!(plan.dag.topological_order, vec!["source", "a", "b"]);
    }

    #[test]
    fn rejects_plan_with_no_source() {
        let mut stages = BTreeMap::new();
        stages.insert("a".into(), stage("a", &["b"]));
        stages.insert("b".into(), stage("b", &["a"]));
        let err = PipelinePlan::new(stages).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedPipeline(_)));
    }

    #[test]
    fn rejects_dangling_edge() {
        let mut stages = BTreeMap::new();
        let mut source = stage("source", &[]);
        source.plugin_type = PluginKind::Source;
        stages.insert("source".into(), source);
        stages.insert("downstream".into(), stage("downstream", &["missing"]));

        let err = PipelinePlan::new(stages).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedPipeline(_)));
    }

    #[test]
    fn fan_out_counts_distinct_successors() {
        let mut stages = BTreeMap::new();
        let mut source = stage("source", &[]);
        source.plugin_type = PluginKind::Source;
        stages.insert("source".into(), source);
        stages.insert("a".into(), stage("a", &["source"]));
        stages.insert("b".into(), stage("b", &["source"]));

        let plan = PipelinePlan::new(stages).expect("valid plan");
        assert_eq!(plan.dag.fan_out("source"), 2);
    }
}
