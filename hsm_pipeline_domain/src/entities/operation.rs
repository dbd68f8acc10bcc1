// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Operation
//!
//! [`Operation`] is the unit that flows through the pipeline: one per file
//! event. A producer creates it (scanner or journal reader), the scheduler
//! routes it through the stages, and it is destroyed on terminal
//! acknowledgement: a drop, or the journal-acknowledgement callback.
//!
//! An operation is owned exclusively by the stage currently processing it;
//! the scheduler owns it between stages. Handlers communicate through the
//! operation: the catalog-lookup stage records what it found
//! ([`DbExists`]) and what must be fetched ([`FetchPlan`]); the
//! filesystem stage fills the attribute record; the apply stage executes
//! the planned [`DbOp`].

use std::fmt;

use super::attributes::EntryAttributes;
use super::entry::EntryId;
use super::pipeline_stage::StageId;

/// Class of a journal record.
///
/// `TimeUpdate` covers the timestamp-change records (mtime/ctime class);
/// `Rename` is the rename-target record carrying the post-rename name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Create,
    Unlink,
    Rename,
    Trunc,
    SetAttr,
    TimeUpdate,
    Hsm,
    Other,
}

impl RecordType {
    /// Record classes that imply the entry's metadata changed and a stat
    /// refresh is worthwhile.
    pub fn implies_metadata_change(&self) -> bool {
        matches!(
            self,
            RecordType::Trunc | RecordType::SetAttr | RecordType::Hsm | RecordType::TimeUpdate
        )
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordType::Create => "CREATE",
            RecordType::Unlink => "UNLINK",
            RecordType::Rename => "RENAME",
            RecordType::Trunc => "TRUNC",
            RecordType::SetAttr => "SETATTR",
            RecordType::TimeUpdate => "TIME",
            RecordType::Hsm => "HSM",
            RecordType::Other => "OTHER",
        };
        f.write_str(s)
    }
}

/// One record from the filesystem change journal.
#[derive(Debug, Clone)]
pub struct JournalRecord {
    /// Monotonic record index assigned by the journal.
    pub index: u64,
    pub rec_type: RecordType,
    /// Record timestamp, seconds since epoch.
    pub time: i64,
    /// Basename carried by the record, when the journal provides one.
    pub name: Option<String>,
    /// Last-reference bit on UNLINK records; `None` when the journal
    /// format does not expose it.
    pub unlink_last: Option<bool>,
}

impl JournalRecord {
    pub fn new(index: u64, rec_type: RecordType, time: i64) -> Self {
        Self {
            index,
            rec_type,
            time,
            name: None,
            unlink_last: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_unlink_last(mut self, last: bool) -> Self {
        self.unlink_last = Some(last);
        self
    }
}

/// Where an operation came from.
pub enum EventSource {
    /// Periodic full-tree scan; the scanner provides path and metadata.
    Scan,
    /// Change-journal record.
    Journal(JournalRecord),
}

/// What must still be fetched from the filesystem for this operation.
/// Computed by the catalog-lookup stage, consumed by the filesystem stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchPlan {
    pub need_attr: bool,
    pub need_path: bool,
    pub need_stripe: bool,
    pub need_status: bool,
}

impl FetchPlan {
    pub fn all() -> Self {
        Self {
            need_attr: true,
            need_path: true,
            need_stripe: true,
            need_status: true,
        }
    }

    pub fn set_all(&mut self) {
        *self = Self::all();
    }
}

/// Catalog mutation planned for the apply stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DbOp {
    #[default]
    None,
    Insert,
    Update,
    Remove,
    /// Move the row to the deferred-removal queue, retaining the path for
    /// later backend cleanup.
    SoftRemove,
}

impl fmt::Display for DbOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DbOp::None => "NONE",
            DbOp::Insert => "INSERT",
            DbOp::Update => "UPDATE",
            DbOp::Remove => "REMOVE",
            DbOp::SoftRemove => "SOFT_REMOVE",
        };
        f.write_str(s)
    }
}

/// Tri-state result of the catalog existence check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DbExists {
    #[default]
    Unknown,
    Yes,
    No,
}

impl DbExists {
    pub fn is_true(&self) -> bool {
        matches!(self, DbExists::Yes)
    }
}

/// Acknowledgement callback, invoked after the catalog mutation commits
/// (journal operations) or after the sweep completes (scan end).
pub type AckCallback = Box<dyn FnOnce() + Send + 'static>;

/// The unit of work flowing through the pipeline.
pub struct Operation {
    entry_id: Option<EntryId>,
    attrs: EntryAttributes,
    fetch: FetchPlan,
    fetch_planned: bool,
    source: EventSource,
    db_op: DbOp,
    db_exists: DbExists,
    callback: Option<AckCallback>,
    stage: StageId,
}

impl Operation {
    /// Operation for one entry enumerated by a full-tree scan. The scanner
    /// provides at least `fullpath`; the first stage resolves the id.
    pub fn from_scan(attrs: EntryAttributes) -> Self {
        Self {
            entry_id: None,
            attrs,
            fetch: FetchPlan::default(),
            fetch_planned: false,
            source: EventSource::Scan,
            db_op: DbOp::None,
            db_exists: DbExists::Unknown,
            callback: None,
            stage: StageId::GetId,
        }
    }

    /// Operation for one journal record. The journal reader supplies the
    /// entry id and an acknowledgement callback; the operation enters the
    /// pipeline at the catalog-lookup stage.
    pub fn from_journal(
        entry_id: EntryId,
        record: JournalRecord,
        callback: Option<AckCallback>,
    ) -> Self {
        Self {
            entry_id: Some(entry_id),
            attrs: EntryAttributes::new(),
            fetch: FetchPlan::default(),
            fetch_planned: false,
            source: EventSource::Journal(record),
            db_op: DbOp::None,
            db_exists: DbExists::Unknown,
            callback,
            stage: StageId::GetInfoDb,
        }
    }

    /// End-of-scan marker pushed by the scanner once a full scan
    /// completes. Carries the scan start time in `md_update`; the sweep
    /// stage removes every row older than it.
    pub fn scan_sweep(scan_start: i64, callback: Option<AckCallback>) -> Self {
        let mut attrs = EntryAttributes::new();
        attrs.set_md_update(scan_start);
        Self {
            entry_id: None,
            attrs,
            fetch: FetchPlan::default(),
            fetch_planned: false,
            source: EventSource::Scan,
            db_op: DbOp::None,
            db_exists: DbExists::Unknown,
            callback,
            stage: StageId::ScanSweep,
        }
    }

    pub fn entry_id(&self) -> Option<EntryId> {
        self.entry_id
    }

    pub fn set_entry_id(&mut self, id: EntryId) {
        self.entry_id = Some(id);
    }

    pub fn attrs(&self) -> &EntryAttributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut EntryAttributes {
        &mut self.attrs
    }

    pub fn fetch(&self) -> FetchPlan {
        self.fetch
    }

    pub fn fetch_mut(&mut self) -> &mut FetchPlan {
        self.fetch_planned = true;
        &mut self.fetch
    }

    /// Whether the catalog-lookup stage computed a fetch plan.
    pub fn fetch_planned(&self) -> bool {
        self.fetch_planned
    }

    pub fn source(&self) -> &EventSource {
        &self.source
    }

    pub fn is_journal(&self) -> bool {
        matches!(self.source, EventSource::Journal(_))
    }

    pub fn record(&self) -> Option<&JournalRecord> {
        match &self.source {
            EventSource::Journal(rec) => Some(rec),
            EventSource::Scan => None,
        }
    }

    /// Journal record index, for the acknowledgement ordering ledger.
    pub fn record_index(&self) -> Option<u64> {
        self.record().map(|rec| rec.index)
    }

    pub fn db_op(&self) -> DbOp {
        self.db_op
    }

    pub fn set_db_op(&mut self, op: DbOp) {
        self.db_op = op;
    }

    pub fn db_exists(&self) -> DbExists {
        self.db_exists
    }

    pub fn set_db_exists(&mut self, exists: DbExists) {
        self.db_exists = exists;
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub fn take_callback(&mut self) -> Option<AckCallback> {
        self.callback.take()
    }

    /// The scheduler's routing state. Owned by the scheduler; handlers
    /// only read it.
    pub fn stage(&self) -> StageId {
        self.stage
    }

    pub fn set_stage(&mut self, stage: StageId) {
        self.stage = stage;
    }

    /// Short identity string for logs.
    pub fn describe(&self) -> String {
        let id = match self.entry_id {
            Some(id) => id.to_string(),
            None => "<no-id>".to_string(),
        };
        match &self.source {
            EventSource::Journal(rec) => format!("{} #{} {}", rec.rec_type, rec.index, id),
            EventSource::Scan => format!("SCAN {}", id),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("entry_id", &self.entry_id)
            .field("stage", &self.stage)
            .field("db_op", &self.db_op)
            .field("db_exists", &self.db_exists)
            .field("fetch", &self.fetch)
            .field("journal", &self.record_index())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
