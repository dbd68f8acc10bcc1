// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # STAGE_DB_APPLY
//!
//! Executes the planned catalog mutation. Catalog errors are logged and
//! routing continues: the journal reader still gets its acknowledgement,
//! and a later scan reconciles the missed write.

use tracing::{error, trace};

use hsm_pipeline_domain::{AttrMask, DbOp, Operation, PipelineError, StageId};

use super::{now_secs, StageContext, StageOutcome};

pub(super) async fn db_apply(
    op: &mut Operation,
    ctx: &StageContext,
) -> Result<StageOutcome, PipelineError> {
    let Some(id) = op.entry_id() else {
        return Err(PipelineError::invalid_operation(
            "entry id is expected to be set at STAGE_DB_APPLY",
        ));
    };

    // If striping was not fetched this pass, leave the stored stripe
    // untouched.
    if !op.fetch().need_stripe {
        op.attrs_mut().clear(AttrMask::STRIPE_INFO);
    }

    let result = match op.db_op() {
        DbOp::Insert => {
            op.attrs_mut().strip_read_only();
            trace!(entry = %id, "Insert");
            ctx.catalog.insert(&id, op.attrs()).await
        }
        DbOp::Update => {
            op.attrs_mut().strip_read_only();
            trace!(entry = %id, "Update");
            ctx.catalog.update(&id, op.attrs()).await
        }
        DbOp::Remove => {
            trace!(entry = %id, "Remove");
            ctx.catalog.remove(&id).await
        }
        DbOp::SoftRemove => {
            trace!(entry = %id, "SoftRemove");
            let deadline =
                now_secs() + ctx.config.settings.unlink.deferred_remove_delay_secs as i64;
            ctx.catalog
                .soft_remove(&id, op.attrs().fullpath(), deadline)
                .await
        }
        DbOp::None => {
            error!(op = %op.describe(), "unhandled catalog operation type");
            return Ok(StageOutcome::Drop);
        }
    };

    if let Err(err) = result {
        error!(entry = %id, op = %op.db_op(), error = %err, "error performing catalog operation");
    }

    // Journal operations carry a callback and still need acknowledging;
    // scan operations terminate here.
    if op.has_callback() {
        Ok(StageOutcome::Next(StageId::JournalAck))
    } else {
        Ok(StageOutcome::Drop)
    }
}
