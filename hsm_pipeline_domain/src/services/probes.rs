// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Filesystem Probe Port
//!
//! Path/id mapping, stat, striping and HSM status queries. The production
//! implementation binds to the filesystem's native API (with per-syscall
//! timeouts configured there); tests script one in memory.
//!
//! Probes report vanished entries through [`ProbeError::Missing`] so the
//! pipeline can route the race case (entry deleted between event and
//! probe) differently from real failures.

use async_trait::async_trait;

use crate::entities::{EntryId, FileStat, HsmStatus, StripeInfo, StripeItem};
use crate::error::ProbeError;

/// HSM status probe result: the archival state plus the two user-set
/// exclusion flags.
#[derive(Debug, Clone, Copy)]
pub struct HsmProbeResult {
    pub status: HsmStatus,
    pub no_release: bool,
    pub no_archive: bool,
}

/// Filesystem probes consumed by the pipeline.
#[async_trait]
pub trait FsProbe: Send + Sync {
    /// Canonical id-based path for `id`: a synthetic path under the
    /// filesystem's id namespace, valid even when the real path is
    /// unknown. Pure string construction, no I/O.
    fn id_path(&self, id: &EntryId) -> String;

    /// Resolves a filesystem path to its stable entry id.
    async fn path_to_id(&self, path: &str) -> Result<EntryId, ProbeError>;

    /// Resolves an entry id to its current full path.
    async fn resolve_path(&self, id: &EntryId) -> Result<String, ProbeError>;

    /// `lstat` on the given path.
    async fn lstat(&self, path: &str) -> Result<FileStat, ProbeError>;

    /// Fetches the striping layout and items for the given path.
    async fn stripe(&self, path: &str) -> Result<(StripeInfo, Vec<StripeItem>), ProbeError>;

    /// Queries the HSM state for the given path.
    async fn hsm_status(&self, path: &str) -> Result<HsmProbeResult, ProbeError>;
}
