// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Entities
//!
//! The objects the pipeline flows through and the table describing the
//! pipeline itself.
//!
//! ## Core Entities
//!
//! ### Operation
//! The unit of work: one per file event, created by a producer (scanner or
//! journal reader), routed through the stages, destroyed on terminal
//! acknowledgement. Carries the entry identity, the attribute record, the
//! fetch plan, the planned catalog mutation and the acknowledgement
//! callback.
//!
//! ### EntryAttributes / AttrMask
//! The per-entry attribute record and the bitset naming which of its fields
//! are meaningful. The mask is the contract between stages: a field is read
//! only if its bit is set, and every write sets the bit.
//!
//! ### StageDescriptor
//! One row of the pipeline table: stage identifier, display name,
//! concurrency flags and optional thread cap. The scheduler enforces the
//! flags; the handlers never see them.

pub mod attributes;
pub mod entry;
pub mod operation;
pub mod pipeline_stage;

pub use attributes::{AttrMask, EntryAttributes};
pub use entry::{EntryId, FileKind, FileStat, HsmStatus, StripeInfo, StripeItem};
pub use operation::{
    AckCallback, DbExists, DbOp, EventSource, FetchPlan, JournalRecord, Operation, RecordType,
};
pub use pipeline_stage::{build_pipeline, StageDescriptor, StageFlags, StageId, STAGE_COUNT};
