// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # STAGE_JOURNAL_ACK and STAGE_SCAN_SWEEP
//!
//! The two terminal stages. Acknowledgement notifies the journal reader
//! that a record is committed; the scheduler guarantees callbacks fire in
//! strictly increasing record-index order. The sweep runs once per
//! completed scan and reclaims every row the scan did not touch.

use tracing::{debug, error, trace};

use hsm_pipeline_domain::{CatalogFilter, Operation, PipelineError, LAST_SCAN_VAR};

use super::{now_secs, StageContext, StageOutcome};

/// Invokes the journal reader's acknowledgement callback and releases the
/// operation.
pub(super) async fn journal_ack(
    op: &mut Operation,
    _ctx: &StageContext,
) -> Result<StageOutcome, PipelineError> {
    if let Some(rec) = op.record() {
        trace!(index = rec.index, entry = ?op.entry_id(), "committing journal record");
    }

    if let Some(callback) = op.take_callback() {
        callback();
    }

    Ok(StageOutcome::Drop)
}

/// Mass-removes entries absent from the scan that just completed and
/// records the scan time.
///
/// The sweep operation carries the scan start time in `md_update`; every
/// row whose metadata was last refreshed before it was not seen by the
/// scan and is removed. The whole step runs in forced-commit mode so the
/// reclaim is durable before the scanner is notified.
pub(super) async fn scan_sweep(
    op: &mut Operation,
    ctx: &StageContext,
) -> Result<StageOutcome, PipelineError> {
    let Some(scan_start) = op.attrs().md_update() else {
        return Err(PipelineError::invalid_operation(
            "scan start time is expected to be set at STAGE_SCAN_SWEEP",
        ));
    };

    if let Err(err) = ctx.catalog.force_commit(true).await {
        error!(error = %err, "cannot enable forced-commit mode");
    }

    match ctx
        .catalog
        .mass_remove(&CatalogFilter::MdUpdateBefore(scan_start))
        .await
    {
        Ok(removed) => {
            debug!(removed, scan_start, "removed entries absent from the latest scan");
        }
        Err(err) => error!(error = %err, "catalog mass removal failed"),
    }

    let timestamp = now_secs().to_string();
    if let Err(err) = ctx.catalog.set_var(LAST_SCAN_VAR, &timestamp).await {
        error!(error = %err, "cannot record last scan time");
    }

    if let Err(err) = ctx.catalog.force_commit(false).await {
        error!(error = %err, "cannot disable forced-commit mode");
    }

    if let Some(callback) = op.take_callback() {
        callback();
    }

    Ok(StageOutcome::Drop)
}
