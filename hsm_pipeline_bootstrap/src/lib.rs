// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Module
//!
//! Sits outside the domain/application/infrastructure layers and provides
//! the process-lifecycle plumbing the pipeline daemon needs:
//!
//! - **Shutdown coordination**: a cancellation token the scheduler's
//!   workers watch, plus a coordinator that sequences
//!   stop-accepting → drain-in-flight → cancel → join.
//! - **Signal handling**: SIGTERM/SIGINT/SIGHUP wired to shutdown
//!   initiation.
//!
//! The pipeline never force-kills in-flight operations: shutdown waits for
//! every accepted operation to reach its terminal acknowledgement, bounded
//! only by the coordinator's grace period.

pub mod shutdown;

#[cfg(unix)]
pub mod signals;

pub use shutdown::{CancellationToken, ShutdownCoordinator, DEFAULT_GRACE_PERIOD_SECS};
