// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sink Scheduler
//!
//! Runs the deferred `SinkTask`s the driver collected while walking the
//! plan. Sequential by default; set `pipeline.spark.parallel.sinks.enabled`
//! on the execution context's runtime arguments to run them on a bounded,
//! named worker pool instead.
//!
//! On failure, the first task (by enqueue order) observed to have failed is
//! what gets reported, always as `PipelineError::SinkFailure`. In parallel
//! mode every task still runs to completion, so a slow failing sink never
//! silently shadows a fast one; in sequential mode the remaining tasks are
//! never started.

use pipeline_engine_domain::{PipelineError, SinkTask};

pub struct SinkScheduler {
    parallel_enabled: bool,
}

impl SinkScheduler {
    pub fn new(parallel_enabled: bool) -> Self {
        Self { parallel_enabled }
    }

    pub fn flush(&self, tasks: Vec<SinkTask>) -> Result<(), PipelineError> {
        if tasks.is_empty() {
            return Ok(());
        }
        if !self.parallel_enabled {
            return self.flush_sequential(tasks);
        }
        self.flush_parallel(tasks)
    }

    fn flush_sequential(&self, tasks: Vec<SinkTask>) -> Result<(), PipelineError> {
        for task in tasks {
            if let Err(e) = task.run() {
                return Err(PipelineError::SinkFailure(e.to_string()));
            }
        }
        Ok(())
    }

    fn flush_parallel(&self, tasks: Vec<SinkTask>) -> Result<(), PipelineError> {
        let worker_count = tasks.len();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("sink-worker-{i}"))
            .build()
            .map_err(|e| PipelineError::InternalError(format!("failed to build sink worker pool: {e}")))?;

        let mut receivers = Vec::with_capacity(worker_count);
        for task in tasks {
            let (tx, rx) = crossbeam::channel::bounded(1);
            receivers.push(rx);
            pool.spawn(move || {
                let _ = tx.send(task.run());
            });
        }

        let mut first_failure: Option<PipelineError> = None;
        for rx in receivers {
            match rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
                Err(_) => {
                    if first_failure.is_none() {
                        first_failure = Some(PipelineError::Interrupted("sink worker disconnected before reporting".into()));
                    }
                }
            }
        }

        match first_failure {
            Some(e) => Err(PipelineError::SinkFailure(e.to_string())),
            None => Ok(()),
        }
    }
}
