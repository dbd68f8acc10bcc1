// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Catalog Port
//!
//! Operational contract of the namespace-mirror store. Reads are masked: a
//! `get` fetches only the fields named by the caller's [`AttrMask`], and
//! the returned record's mask tells the caller which of those the backend
//! actually had. Writes honor the record's mask the same way: unmasked
//! fields are never touched.
//!
//! The pipeline tolerates backend failures: stage handlers log catalog
//! errors and keep routing, so an implementation should return an error
//! rather than retry indefinitely.

use async_trait::async_trait;

use crate::entities::{AttrMask, EntryAttributes, EntryId};
use crate::error::PipelineError;

/// Name of the persisted variable recording the last completed scan, as a
/// decimal seconds-since-epoch string.
pub const LAST_SCAN_VAR: &str = "LastScan";

/// Row filter for mass operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFilter {
    /// Rows whose metadata was last refreshed strictly before the given
    /// time, i.e. rows not seen by the scan that started then.
    MdUpdateBefore(i64),
}

/// The relational backing store for the namespace mirror.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetches the fields named by `mask` for `id`. Returns `Ok(None)`
    /// when the entry is not in the catalog.
    async fn get(
        &self,
        id: &EntryId,
        mask: AttrMask,
    ) -> Result<Option<EntryAttributes>, PipelineError>;

    /// Cheap existence check, for callers that need no attributes.
    async fn exists(&self, id: &EntryId) -> Result<bool, PipelineError>;

    /// Whether a striping record exists for `id`.
    async fn check_stripe(&self, id: &EntryId) -> Result<bool, PipelineError>;

    /// Inserts a row with the masked fields of `attrs`.
    async fn insert(&self, id: &EntryId, attrs: &EntryAttributes) -> Result<(), PipelineError>;

    /// Upserts the masked fields of `attrs` into the row for `id`.
    async fn update(&self, id: &EntryId, attrs: &EntryAttributes) -> Result<(), PipelineError>;

    /// Deletes the row (and its striping record) for `id`.
    async fn remove(&self, id: &EntryId) -> Result<(), PipelineError>;

    /// Moves the row to the deferred-removal queue, retaining `fullpath`
    /// when known, for backend cleanup after `deadline` (seconds since
    /// epoch).
    async fn soft_remove(
        &self,
        id: &EntryId,
        fullpath: Option<&str>,
        deadline: i64,
    ) -> Result<(), PipelineError>;

    /// Deletes every row matching `filter`; returns the number removed.
    async fn mass_remove(&self, filter: &CatalogFilter) -> Result<u64, PipelineError>;

    /// Persists a named variable.
    async fn set_var(&self, name: &str, value: &str) -> Result<(), PipelineError>;

    /// Reads a named variable, if present.
    async fn get_var(&self, name: &str) -> Result<Option<String>, PipelineError>;

    /// Toggles forced-commit mode. While enabled, every mutation commits
    /// immediately; while disabled, the backend may batch mutations into
    /// larger transactions. Backends without batching treat this as a
    /// no-op.
    async fn force_commit(&self, enable: bool) -> Result<(), PipelineError>;
}
