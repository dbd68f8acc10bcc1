// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Stage Table
//!
//! The pipeline is a fixed, ordered list of stages; each stage has a name,
//! concurrency flags and an optional thread cap. The scheduler enforces
//! the flags when dispatching; stage handlers never see them.
//!
//! The table is built at startup by [`build_pipeline`], because the apply
//! stage's concurrency is a deployment-time parameter: backends with
//! row-level write concurrency run it parallel, whole-store-locking
//! backends (SQLite) cap it to a single thread.

use bitflags::bitflags;
use std::fmt;

/// Number of stages in the pipeline.
pub const STAGE_COUNT: usize = 7;

/// Identifier of a pipeline stage, in routing order. Operations only move
/// forward through this order; there are no back-edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageId {
    /// Resolve filesystem path to entry id (scan events).
    GetId = 0,
    /// Look up the entry in the catalog; plan what to fetch.
    GetInfoDb = 1,
    /// Probe the filesystem for the planned items.
    GetInfoFs = 2,
    /// Evaluate alert predicates; emit alerts out of band.
    Reporting = 3,
    /// Execute the planned catalog mutation.
    DbApply = 4,
    /// Acknowledge the journal record, in strict index order.
    JournalAck = 5,
    /// Mass-remove entries absent from the latest scan.
    ScanSweep = 6,
}

impl StageId {
    pub const ALL: [StageId; STAGE_COUNT] = [
        StageId::GetId,
        StageId::GetInfoDb,
        StageId::GetInfoFs,
        StageId::Reporting,
        StageId::DbApply,
        StageId::JournalAck,
        StageId::ScanSweep,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            StageId::GetId => "STAGE_GET_ID",
            StageId::GetInfoDb => "STAGE_GET_INFO_DB",
            StageId::GetInfoFs => "STAGE_GET_INFO_FS",
            StageId::Reporting => "STAGE_REPORTING",
            StageId::DbApply => "STAGE_DB_APPLY",
            StageId::JournalAck => "STAGE_JOURNAL_ACK",
            StageId::ScanSweep => "STAGE_SCAN_SWEEP",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Concurrency and acknowledgement flags of a stage.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StageFlags: u8 {
        /// Any number of concurrent invocations.
        const PARALLEL      = 1 << 0;
        /// At most `max_threads` concurrent invocations.
        const MAX_THREADS   = 1 << 1;
        /// At most one invocation globally, FIFO arrival order.
        const SEQUENTIAL    = 1 << 2;
        /// At most one concurrent invocation per distinct entry id.
        const ID_CONSTRAINT = 1 << 3;
        /// Acknowledgement happens inside the handler invocation.
        const SYNC          = 1 << 4;
        /// Acknowledgement may happen after the handler returns.
        const ASYNC         = 1 << 5;
    }
}

/// One row of the pipeline table.
#[derive(Debug, Clone, Copy)]
pub struct StageDescriptor {
    pub id: StageId,
    pub flags: StageFlags,
    /// Thread cap for `MAX_THREADS` stages; ignored otherwise.
    pub max_threads: usize,
}

impl StageDescriptor {
    /// Concurrency limit the scheduler enforces for this stage.
    pub fn max_concurrent(&self) -> usize {
        if self.flags.contains(StageFlags::SEQUENTIAL) {
            1
        } else if self.flags.contains(StageFlags::MAX_THREADS) {
            self.max_threads.max(1)
        } else {
            usize::MAX
        }
    }

    pub fn is_sequential(&self) -> bool {
        self.flags.contains(StageFlags::SEQUENTIAL)
    }

    pub fn has_id_constraint(&self) -> bool {
        self.flags.contains(StageFlags::ID_CONSTRAINT)
    }
}

/// Builds the pipeline table.
///
/// `db_apply_threads = 0` runs the apply stage fully parallel (backends
/// with row-level write concurrency); any other value caps it, with `1`
/// being the setting for whole-store-locking backends such as SQLite.
pub fn build_pipeline(db_apply_threads: usize) -> [StageDescriptor; STAGE_COUNT] {
    let db_apply_flags = if db_apply_threads == 0 {
        StageFlags::PARALLEL | StageFlags::SYNC
    } else {
        StageFlags::MAX_THREADS | StageFlags::SYNC
    };

    [
        StageDescriptor {
            id: StageId::GetId,
            flags: StageFlags::PARALLEL | StageFlags::SYNC,
            max_threads: 0,
        },
        StageDescriptor {
            id: StageId::GetInfoDb,
            flags: StageFlags::PARALLEL | StageFlags::SYNC | StageFlags::ID_CONSTRAINT,
            max_threads: 0,
        },
        StageDescriptor {
            id: StageId::GetInfoFs,
            flags: StageFlags::PARALLEL | StageFlags::SYNC,
            max_threads: 0,
        },
        StageDescriptor {
            id: StageId::Reporting,
            flags: StageFlags::PARALLEL | StageFlags::ASYNC,
            max_threads: 0,
        },
        StageDescriptor {
            id: StageId::DbApply,
            flags: db_apply_flags,
            max_threads: db_apply_threads,
        },
        StageDescriptor {
            id: StageId::JournalAck,
            flags: StageFlags::SEQUENTIAL | StageFlags::SYNC,
            max_threads: 1,
        },
        StageDescriptor {
            id: StageId::ScanSweep,
            flags: StageFlags::SEQUENTIAL | StageFlags::SYNC,
            max_threads: 1,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_matches_indices() {
        for (i, stage) in StageId::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_sequential_stages_cap_to_one() {
        let stages = build_pipeline(0);
        assert_eq!(stages[StageId::JournalAck.index()].max_concurrent(), 1);
        assert_eq!(stages[StageId::ScanSweep.index()].max_concurrent(), 1);
    }

    #[test]
    fn test_db_apply_cap_is_deployment_choice() {
        let parallel = build_pipeline(0);
        assert_eq!(
            parallel[StageId::DbApply.index()].max_concurrent(),
            usize::MAX
        );

        let capped = build_pipeline(1);
        assert_eq!(capped[StageId::DbApply.index()].max_concurrent(), 1);
    }

    #[test]
    fn test_id_constraint_only_on_db_lookup() {
        let stages = build_pipeline(0);
        for desc in &stages {
            assert_eq!(
                desc.has_id_constraint(),
                desc.id == StageId::GetInfoDb,
                "unexpected id constraint on {}",
                desc.id
            );
        }
    }
}
