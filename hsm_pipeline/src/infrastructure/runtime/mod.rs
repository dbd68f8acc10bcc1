// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Runtime
//!
//! The scheduler that drives operations through the stage table: a worker
//! pool over per-stage queues, enforcing each stage's concurrency flags,
//! the per-entry ordering constraint and the strict journal
//! acknowledgement order.

pub mod scheduler;

pub use scheduler::{EntryProcessor, StageStats};
