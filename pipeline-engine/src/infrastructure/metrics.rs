// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Process Metrics Collector
//!
//! A `StageMetricsCollector` that keeps per-stage counters in memory instead
//! of shipping them anywhere, for the demo CLI and for tests that want to
//! assert on what the driver reported without standing up a real metrics
//! backend.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use pipeline_engine_domain::StageMetricsCollector;

#[derive(Debug, Default)]
struct StageTotals {
    duration: Duration,
    invocations: u64,
    records_emitted: u64,
}

/// Accumulates stage durations and emitted-record counts, keyed by stage
/// name. Cheap to share: wrap in `Arc` and clone the handle into whatever
/// scope runs the pipeline.
#[derive(Debug, Default)]
pub struct InMemoryMetricsCollector {
    totals: Mutex<BTreeMap<String, StageTotals>>,
}

impl InMemoryMetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_duration(&self, stage_name: &str) -> Duration {
        self.totals.lock().expect("metrics mutex poisoned").get(stage_name).map(|t| t.duration).unwrap_or_default()
    }

    pub fn records_emitted(&self, stage_name: &str) -> u64 {
        self.totals
            .lock()
            .expect("metrics mutex poisoned")
            .get(stage_name)
            .map(|t| t.records_emitted)
            .unwrap_or_default()
    }

    pub fn invocations(&self, stage_name: &str) -> u64 {
        self.totals.lock().expect("metrics mutex poisoned").get(stage_name).map(|t| t.invocations).unwrap_or_default()
    }
}

impl StageMetricsCollector for InMemoryMetricsCollector {
    fn record_stage_duration(&self, stage_name: &str, duration: Duration) {
        let mut totals = self.totals.lock().expect("metrics mutex poisoned");
        let entry = totals.entry(stage_name.to_string()).or_default();
        entry.duration += duration;
        entry.invocations += 1;
    }

    fn record_records_emitted(&self, stage_name: &str, count: u64) {
        let mut totals = self.totals.lock().expect("metrics mutex poisoned");
        totals.entry(stage_name.to_string()).or_default().records_emitted += count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_multiple_calls() {
        let collector = InMemoryMetricsCollector::new();
        collector.record_stage_duration("parse", Duration::from_millis(10));
        collector.record_stage_duration("parse", Duration::from_millis(15));
        collector.record_records_emitted("parse", 3);
        collector.record_records_emitted("parse", 4);

        assert_eq!(collector.total_duration("parse"), Duration::from_millis(25));
        assert_eq!(collector.records_emitted("parse"), 7);
        assert_eq!(collector.invocations("parse"), 2);
    }

    #[test]
    fn unknown_stage_reports_zero() {
        let collector = InMemoryMetricsCollector::new();
        assert_eq!(collector.total_duration("missing"), Duration::ZERO);
        assert_eq!(collector.records_emitted("missing"), 0);
    }
}
