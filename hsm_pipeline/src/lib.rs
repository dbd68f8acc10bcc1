// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # HSM Pipeline
//!
//! Entry-processing pipeline of the HSM policy engine: a work-scheduling
//! substrate that reconciles a filesystem change journal and periodic
//! full-tree scans into a queryable catalog of the namespace and per-file
//! archival status.
//!
//! Each file event becomes one operation routed through an ordered
//! sequence of stages (identify, consult DB, consult FS, report, mutate
//! DB, acknowledge, post-scan reclaim) while the scheduler enforces
//! per-stage concurrency, per-entry ordering and strict journal
//! acknowledgement order.
//!
//! ## Layers
//!
//! - [`application`]: the stage handlers that implement the pipeline's semantics.
//! - [`infrastructure`]: the scheduler runtime, the SQLite catalog
//!   backend, configuration, logging and metrics.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hsm_pipeline::application::stages::StageContext;
//! use hsm_pipeline::infrastructure::config::PipelineConfig;
//! use hsm_pipeline::infrastructure::runtime::EntryProcessor;
//!
//! let config = Arc::new(PipelineConfig::new(settings, alerts));
//! let ctx = StageContext::new(config, catalog, probe, emitter, Some(matcher));
//! let processor = EntryProcessor::start(ctx)?;
//!
//! // producers push operations:
//! processor.submit(Operation::from_journal(id, record, Some(ack)))?;
//!
//! // on SIGTERM:
//! processor.shutdown().await;
//! ```

pub mod application;
pub mod infrastructure;

pub use application::stages::StageContext;
pub use infrastructure::config::{PipelineConfig, PipelineSettings};
pub use infrastructure::runtime::EntryProcessor;
