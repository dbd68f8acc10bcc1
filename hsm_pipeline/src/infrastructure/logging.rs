// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logging Initialization
//!
//! Structured logging for the pipeline daemon via `tracing`. The filter
//! comes from `RUST_LOG` when set, otherwise from the provided default
//! directive. Handlers log with field syntax throughout; the severity
//! conventions follow the pipeline's error policy (catalog failures at
//! `error`, probe failures at `debug`, vanished entries at `trace`).

use tracing_subscriber::EnvFilter;

use hsm_pipeline_domain::PipelineError;

/// Initializes the global tracing subscriber.
///
/// Safe to call once per process; a second call reports an error rather
/// than panicking, so embedding applications keep their own subscriber.
pub fn init(default_directive: &str) -> Result<(), PipelineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| PipelineError::invalid_config(format!("invalid log directive: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| {
            PipelineError::internal_error(format!("cannot install tracing subscriber: {}", e))
        })
}
