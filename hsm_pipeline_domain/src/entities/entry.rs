// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entry Identity and Filesystem-Facing Types
//!
//! [`EntryId`] is the stable identifier the filesystem assigns to an entry.
//! It is opaque to the pipeline: comparable, hashable, printable, and used
//! as the key for the per-id ordering constraint at the catalog-lookup
//! stage. The remaining types mirror what the filesystem probes return:
//! the HSM archival state, the striping layout, and the subset of `lstat`
//! output the catalog records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable entry identifier assigned by the filesystem.
///
/// Modeled as a sequence/object pair the way distributed filesystems hand
/// out file identifiers. The pipeline never interprets the two halves; it
/// only compares, hashes and prints them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId {
    seq: u64,
    oid: u32,
}

impl EntryId {
    pub fn new(seq: u64, oid: u32) -> Self {
        Self { seq, oid }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn oid(&self) -> u32 {
        self.oid
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:x}:0x{:x}]", self.seq, self.oid)
    }
}

/// Per-file archival state as reported by the HSM status probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HsmStatus {
    /// Never archived.
    New,
    /// Archived copy is stale.
    Modified,
    /// Data evicted, stub remains. Outside the policy working set.
    Released,
    ReleasePending,
    ArchiveRunning,
    /// Fresh/clean state with no HSM flags set.
    NoFlags,
    #[default]
    Unknown,
}

impl HsmStatus {
    /// Stable integer encoding used by catalog backends.
    pub fn as_db_code(&self) -> i64 {
        match self {
            HsmStatus::New => 0,
            HsmStatus::Modified => 1,
            HsmStatus::Released => 2,
            HsmStatus::ReleasePending => 3,
            HsmStatus::ArchiveRunning => 4,
            HsmStatus::NoFlags => 5,
            HsmStatus::Unknown => 6,
        }
    }

    pub fn from_db_code(code: i64) -> Self {
        match code {
            0 => HsmStatus::New,
            1 => HsmStatus::Modified,
            2 => HsmStatus::Released,
            3 => HsmStatus::ReleasePending,
            4 => HsmStatus::ArchiveRunning,
            5 => HsmStatus::NoFlags,
            _ => HsmStatus::Unknown,
        }
    }
}

impl fmt::Display for HsmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HsmStatus::New => "new",
            HsmStatus::Modified => "modified",
            HsmStatus::Released => "released",
            HsmStatus::ReleasePending => "release_pending",
            HsmStatus::ArchiveRunning => "archive_running",
            HsmStatus::NoFlags => "no_flags",
            HsmStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Layout metadata describing how a file is distributed across storage
/// targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripeInfo {
    pub stripe_count: u32,
    pub stripe_size: u64,
    pub pool: String,
}

/// One storage target holding a piece of a striped file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripeItem {
    pub target: u32,
}

/// Kind of filesystem object, from the stat probe. The pipeline only
/// catalogs regular files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    Other,
}

/// Subset of `lstat` output the catalog records.
#[derive(Debug, Clone)]
pub struct FileStat {
    pub kind: FileKind,
    pub size: u64,
    pub blocks: u64,
    pub owner: String,
    pub group: String,
    /// Seconds since epoch.
    pub last_access: i64,
    /// Seconds since epoch.
    pub last_mod: i64,
}

impl FileStat {
    pub fn is_regular(&self) -> bool {
        self.kind == FileKind::Regular
    }
}
