// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use thiserror::Error;

/// Domain-specific errors for the entry-processing pipeline.
///
/// Each variant carries a descriptive message. Variants are grouped by the
/// subsystem that raises them so callers can handle them systematically;
/// `category()` exposes the grouping for logging and metrics labels.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Pipeline is shutting down")]
    ShuttingDown,

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PipelineError {
    /// Creates a new invalid-operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new database error
    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::DatabaseError(msg.into())
    }

    /// Creates a new probe error
    pub fn probe_failed(msg: impl Into<String>) -> Self {
        Self::ProbeFailed(msg.into())
    }

    /// Creates a new metrics error
    pub fn metrics_error(msg: impl Into<String>) -> Self {
        Self::MetricsError(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::InvalidOperation(_) => "operation",
            PipelineError::InvalidConfiguration(_) => "configuration",
            PipelineError::DatabaseError(_) => "database",
            PipelineError::ProbeFailed(_) => "probe",
            PipelineError::ShuttingDown => "shutdown",
            PipelineError::MetricsError(_) => "metrics",
            PipelineError::InternalError(_) => "internal",
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::InternalError(err.to_string())
    }
}
