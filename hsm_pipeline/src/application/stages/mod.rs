// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Handlers
//!
//! One handler per pipeline stage. A handler completes by returning a
//! [`StageOutcome`]: either the next stage to route the operation to, or a
//! drop. Handlers never retry and never block unrelated operations; the
//! pipeline drains, it does not wedge. Failures follow the error policy:
//!
//! | Condition                       | Handling                               |
//! |---------------------------------|----------------------------------------|
//! | Missing precondition            | `Err(InvalidOperation)`; scheduler logs and drops |
//! | Entry vanished (probe missing)  | Journal: route to acknowledgement; scan: drop |
//! | Catalog read error              | Log, treat as not-found, keep routing  |
//! | Catalog write error             | Log, keep routing (callback still fires) |
//! | Other probe error               | Drop, log at debug                     |

mod ack;
mod db_apply;
mod db_lookup;
mod fs_probe;
mod identify;
mod reporting;

use std::sync::Arc;

use hsm_pipeline_domain::{
    AlertEmitter, AttrMask, Catalog, FsProbe, Operation, PipelineError, PolicyMatcher, StageId,
};

use crate::infrastructure::config::PipelineConfig;

/// Routing decision returned by a stage handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Re-queue the operation at the given (equal or later) stage.
    Next(StageId),
    /// Remove the operation from the pipeline and release it.
    Drop,
}

/// Shared collaborators handed to every stage handler.
#[derive(Clone)]
pub struct StageContext {
    pub config: Arc<PipelineConfig>,
    pub catalog: Arc<dyn Catalog>,
    pub probe: Arc<dyn FsProbe>,
    pub alerts: Arc<dyn AlertEmitter>,
    pub policies: Option<Arc<dyn PolicyMatcher>>,
}

impl StageContext {
    pub fn new(
        config: Arc<PipelineConfig>,
        catalog: Arc<dyn Catalog>,
        probe: Arc<dyn FsProbe>,
        alerts: Arc<dyn AlertEmitter>,
        policies: Option<Arc<dyn PolicyMatcher>>,
    ) -> Self {
        Self {
            config,
            catalog,
            probe,
            alerts,
            policies,
        }
    }

    /// Class matching is effective only when configured *and* a matcher
    /// was wired in.
    pub fn match_classes(&self) -> bool {
        self.config.settings.match_classes && self.policies.is_some()
    }

    /// Attributes the class engine needs: the class fields themselves plus
    /// whatever the matcher's predicates read.
    pub(crate) fn class_attr_mask(&self) -> AttrMask {
        let mut mask = AttrMask::RELEASE_CLASS
            | AttrMask::REL_CL_UPDATE
            | AttrMask::ARCHIVE_CLASS
            | AttrMask::ARCH_CL_UPDATE;
        if let Some(matcher) = &self.policies {
            mask |= matcher.attr_mask();
        }
        mask
    }
}

/// Dispatches an operation to the handler of `stage`.
pub async fn run_stage(
    stage: StageId,
    op: &mut Operation,
    ctx: &StageContext,
) -> Result<StageOutcome, PipelineError> {
    match stage {
        StageId::GetId => identify::get_id(op, ctx).await,
        StageId::GetInfoDb => db_lookup::get_info_db(op, ctx).await,
        StageId::GetInfoFs => fs_probe::get_info_fs(op, ctx).await,
        StageId::Reporting => reporting::report(op, ctx).await,
        StageId::DbApply => db_apply::db_apply(op, ctx).await,
        StageId::JournalAck => ack::journal_ack(op, ctx).await,
        StageId::ScanSweep => ack::scan_sweep(op, ctx).await,
    }
}

/// Current time as seconds since epoch.
pub(crate) fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Routing for an entry that vanished between event and probe: journal
/// records go to acknowledgement (a later UNLINK reconciles), scan
/// entries are dropped (the next sweep reconciles).
pub(crate) fn vanished_entry_route(op: &Operation) -> StageOutcome {
    if op.is_journal() {
        StageOutcome::Next(StageId::JournalAck)
    } else {
        StageOutcome::Drop
    }
}
