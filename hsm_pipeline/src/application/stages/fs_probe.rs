// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # STAGE_GET_INFO_FS
//!
//! Executes the fetch plan against the filesystem through the id-based
//! path: stat, path resolution (journal events only), striping layout and
//! HSM status.
//!
//! Absence is handled uniformly across all probes: a vanished entry
//! routes journal operations straight to acknowledgement (a later UNLINK
//! record reconciles) and drops scan operations (the next sweep
//! reconciles). Any other probe failure drops the operation.

use tracing::{debug, trace};

use hsm_pipeline_domain::{DbOp, HsmStatus, Operation, PipelineError, StageId};

use super::{now_secs, vanished_entry_route, StageContext, StageOutcome};

pub(super) async fn get_info_fs(
    op: &mut Operation,
    ctx: &StageContext,
) -> Result<StageOutcome, PipelineError> {
    let Some(id) = op.entry_id() else {
        return Err(PipelineError::invalid_operation(
            "entry id is expected to be set at STAGE_GET_INFO_FS",
        ));
    };

    if op.fetch_planned() {
        let path = ctx.probe.id_path(&id);
        let fetch = op.fetch();

        if fetch.need_attr {
            match ctx.probe.lstat(&path).await {
                Ok(stat) => {
                    if !stat.is_regular() {
                        // Only regular files are cataloged; the record is
                        // still acknowledged.
                        return Ok(vanished_entry_route(op));
                    }
                    op.attrs_mut().apply_stat(&stat);
                    op.attrs_mut().set_md_update(now_secs());
                }
                Err(err) if err.is_missing() => {
                    trace!(entry = %id, "entry does not exist anymore");
                    return Ok(vanished_entry_route(op));
                }
                Err(err) => {
                    debug!(entry = %id, path = %path, error = %err, "lstat failed");
                    return Ok(StageOutcome::Drop);
                }
            }
        }

        // Path resolution only makes sense for journal events; the
        // scanner already provided the path it enumerated.
        if fetch.need_path && op.is_journal() {
            match ctx.probe.resolve_path(&id).await {
                Ok(fullpath) => {
                    op.attrs_mut().set_fullpath(fullpath);
                    op.attrs_mut().set_path_update(now_secs());
                }
                Err(err) if err.is_missing() => {
                    trace!(entry = %id, "entry does not exist anymore");
                    return Ok(vanished_entry_route(op));
                }
                Err(err) => {
                    debug!(entry = %id, error = %err, "path resolution failed");
                    return Ok(StageOutcome::Drop);
                }
            }
        }

        if fetch.need_stripe {
            match ctx.probe.stripe(&path).await {
                Ok((info, items)) => {
                    op.attrs_mut().set_stripe_info(info);
                    op.attrs_mut().set_stripe_items(items);
                }
                Err(err) if err.is_missing() => {
                    trace!(entry = %id, "entry does not exist anymore");
                    return Ok(vanished_entry_route(op));
                }
                Err(err) => {
                    debug!(entry = %id, path = %path, error = %err, "stripe probe failed");
                    return Ok(StageOutcome::Drop);
                }
            }
        }

        if fetch.need_status {
            match ctx.probe.hsm_status(&path).await {
                Ok(res) => {
                    let attrs = op.attrs_mut();
                    attrs.set_status(res.status);
                    attrs.set_no_release(res.no_release);
                    attrs.set_no_archive(res.no_archive);

                    // No flags at all: the entry was never archived or
                    // restored.
                    if res.status == HsmStatus::NoFlags {
                        attrs.set_last_archive(0);
                        attrs.set_last_restore(0);
                    }

                    // A released entry is outside the policy working set.
                    if res.status == HsmStatus::Released {
                        debug!(
                            entry = %id,
                            "entry is released: removing it from the policy working set"
                        );
                        if op.db_exists().is_true() {
                            op.set_db_op(DbOp::Remove);
                        } else {
                            return Ok(vanished_entry_route(op));
                        }
                    }
                }
                Err(err) if err.is_missing() => {
                    trace!(entry = %id, "entry does not exist anymore");
                    return Ok(vanished_entry_route(op));
                }
                Err(err) => {
                    debug!(entry = %id, path = %path, error = %err, "HSM status probe failed");
                    return Ok(StageOutcome::Drop);
                }
            }
        }
    }

    if ctx.match_classes() {
        if let Some(matcher) = &ctx.policies {
            matcher.check_policies(&id, op.attrs_mut(), true);
        }
    }

    if let Some(index) = op.record_index() {
        op.attrs_mut().set_last_op_index(index);
    }

    Ok(StageOutcome::Next(StageId::Reporting))
}
