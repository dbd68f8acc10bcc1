// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # STAGE_REPORTING
//!
//! Synthesizes derivable attributes and evaluates the configured alert
//! rules, first match wins. The stage is asynchronous: the operation is
//! routed to DB_APPLY immediately, and the matched alert (if any) is
//! emitted out of band so slow alert channels never block the pipeline.

use tracing::debug;

use hsm_pipeline_domain::{EntryAlert, Operation, PipelineError, StageId};

use super::{StageContext, StageOutcome};

pub(super) async fn report(
    op: &mut Operation,
    ctx: &StageContext,
) -> Result<StageOutcome, PipelineError> {
    op.attrs_mut().generate_fields(ctx.config.alert_attr_mask());

    let mut matched: Option<EntryAlert> = None;
    if let Some(id) = op.entry_id() {
        for rule in ctx.config.alerts() {
            if rule.matches(&id, op.attrs()) {
                let entry = op
                    .attrs()
                    .fullpath()
                    .map(str::to_owned)
                    .unwrap_or_else(|| id.to_string());
                matched = Some(EntryAlert {
                    title: rule.title().map(str::to_owned),
                    predicate: rule.description().to_owned(),
                    entry,
                    values: op.attrs().dump(rule.required_mask()),
                });
                break;
            }
        }
    }

    if let Some(alert) = matched {
        debug!(entry = %alert.entry, "alert matched, emitting out of band");
        let emitter = ctx.alerts.clone();
        tokio::spawn(async move {
            emitter.raise(alert).await;
        });
    }

    Ok(StageOutcome::Next(StageId::DbApply))
}
