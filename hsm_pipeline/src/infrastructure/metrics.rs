// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Metrics
//!
//! Prometheus metrics for pipeline observability: per-stage throughput and
//! drops, handler failures, and the number of operations currently in
//! flight. The scheduler records them; a daemon exposes the registry on
//! its metrics endpoint.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

use hsm_pipeline_domain::{PipelineError, StageId};

/// Prometheus metrics service for the entry processor.
#[derive(Clone)]
pub struct PipelineMetrics {
    registry: Arc<Registry>,

    operations_submitted_total: IntCounter,
    operations_in_flight: IntGauge,

    // Per-stage counters, labeled by stage name
    stage_processed_total: IntCounterVec,
    stage_dropped_total: IntCounterVec,
    stage_errors_total: IntCounterVec,
}

impl PipelineMetrics {
    pub fn new() -> Result<Self, PipelineError> {
        let registry = Arc::new(Registry::new());

        let operations_submitted_total = IntCounter::with_opts(Opts::new(
            "pipeline_operations_submitted_total",
            "Operations accepted at the pipeline ingress",
        ))
        .map_err(|e| PipelineError::metrics_error(e.to_string()))?;

        let operations_in_flight = IntGauge::with_opts(Opts::new(
            "pipeline_operations_in_flight",
            "Operations currently queued or running in the pipeline",
        ))
        .map_err(|e| PipelineError::metrics_error(e.to_string()))?;

        let stage_processed_total = IntCounterVec::new(
            Opts::new(
                "pipeline_stage_processed_total",
                "Operations a stage handler completed and routed onward",
            ),
            &["stage"],
        )
        .map_err(|e| PipelineError::metrics_error(e.to_string()))?;

        let stage_dropped_total = IntCounterVec::new(
            Opts::new(
                "pipeline_stage_dropped_total",
                "Operations released from the pipeline at a stage",
            ),
            &["stage"],
        )
        .map_err(|e| PipelineError::metrics_error(e.to_string()))?;

        let stage_errors_total = IntCounterVec::new(
            Opts::new(
                "pipeline_stage_errors_total",
                "Stage handler failures (the operation is dropped)",
            ),
            &["stage"],
        )
        .map_err(|e| PipelineError::metrics_error(e.to_string()))?;

        registry
            .register(Box::new(operations_submitted_total.clone()))
            .map_err(|e| PipelineError::metrics_error(e.to_string()))?;
        registry
            .register(Box::new(operations_in_flight.clone()))
            .map_err(|e| PipelineError::metrics_error(e.to_string()))?;
        registry
            .register(Box::new(stage_processed_total.clone()))
            .map_err(|e| PipelineError::metrics_error(e.to_string()))?;
        registry
            .register(Box::new(stage_dropped_total.clone()))
            .map_err(|e| PipelineError::metrics_error(e.to_string()))?;
        registry
            .register(Box::new(stage_errors_total.clone()))
            .map_err(|e| PipelineError::metrics_error(e.to_string()))?;

        Ok(Self {
            registry,
            operations_submitted_total,
            operations_in_flight,
            stage_processed_total,
            stage_dropped_total,
            stage_errors_total,
        })
    }

    pub fn record_submitted(&self) {
        self.operations_submitted_total.inc();
        self.operations_in_flight.inc();
    }

    pub fn record_processed(&self, stage: StageId) {
        self.stage_processed_total
            .with_label_values(&[stage.name()])
            .inc();
    }

    pub fn record_dropped(&self, stage: StageId) {
        self.stage_dropped_total
            .with_label_values(&[stage.name()])
            .inc();
        self.operations_in_flight.dec();
    }

    pub fn record_error(&self, stage: StageId) {
        self.stage_errors_total
            .with_label_values(&[stage.name()])
            .inc();
    }

    pub fn in_flight(&self) -> i64 {
        self.operations_in_flight.get()
    }

    /// Exports all metrics in Prometheus text format.
    pub fn gather(&self) -> Result<String, PipelineError> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = prometheus::TextEncoder::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| PipelineError::metrics_error(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| PipelineError::metrics_error(e.to_string()))
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}
