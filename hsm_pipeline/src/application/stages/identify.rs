// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # STAGE_GET_ID
//!
//! Entries from a filesystem scan arrive with a full path but no stable
//! identifier; this stage resolves path → id. Journal operations carry
//! their id already and bypass this stage entirely.

use tracing::{debug, error};

use hsm_pipeline_domain::{Operation, PipelineError, StageId};

use super::{StageContext, StageOutcome};

pub(super) async fn get_id(
    op: &mut Operation,
    ctx: &StageContext,
) -> Result<StageOutcome, PipelineError> {
    let Some(path) = op.attrs().fullpath().map(str::to_owned) else {
        error!("entry full path is expected to be set at STAGE_GET_ID");
        return Err(PipelineError::invalid_operation(
            "entry full path is expected to be set at STAGE_GET_ID",
        ));
    };

    match ctx.probe.path_to_id(&path).await {
        Ok(id) => {
            op.set_entry_id(id);
            Ok(StageOutcome::Next(StageId::GetInfoDb))
        }
        Err(err) => {
            // The entry vanished between enumeration and processing; a
            // later scan or an UNLINK record reconciles the catalog.
            debug!(path = %path, error = %err, "path_to_id failed, dropping scan entry");
            Ok(StageOutcome::Drop)
        }
    }
}
