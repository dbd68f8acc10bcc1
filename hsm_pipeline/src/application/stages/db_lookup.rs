// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # STAGE_GET_INFO_DB
//!
//! Looks the entry up in the catalog and plans what must still be fetched
//! from the filesystem.
//!
//! Journal operations run a masked lookup, then a two-phase plan: the base
//! plan from the DB state (insert vs update, staleness policies), refined
//! by what the record itself implies (CREATE seeding, reformat detection,
//! name/rename-driven path refresh, metadata-change classes). Scan
//! operations already carry path and metadata from the scanner, so the
//! lookup only fills what class matching and alerting need, and the plan
//! reduces to status (always) and striping (when the catalog has none).
//!
//! A catalog read error is logged and treated as not-found: the pipeline
//! keeps draining on transient backend failures, and a later scan
//! reconciles any resulting duplicate insert.

use tracing::{debug, error, warn};

use hsm_pipeline_domain::{
    AttrMask, DbExists, DbOp, JournalRecord, Operation, PipelineError, RecordType, StageId,
};

use super::{now_secs, StageContext, StageOutcome};
use crate::infrastructure::config::PipelineConfig;

pub(super) async fn get_info_db(
    op: &mut Operation,
    ctx: &StageContext,
) -> Result<StageOutcome, PipelineError> {
    if op.is_journal() {
        journal_lookup(op, ctx).await
    } else {
        scan_lookup(op, ctx).await
    }
}

async fn journal_lookup(
    op: &mut Operation,
    ctx: &StageContext,
) -> Result<StageOutcome, PipelineError> {
    let Some(id) = op.entry_id() else {
        return Err(PipelineError::invalid_operation(
            "entry id is expected to be set at STAGE_GET_INFO_DB",
        ));
    };

    // What this pipeline needs to know about the entry for any record.
    let mut wanted = AttrMask::FULLPATH
        | AttrMask::NAME
        | AttrMask::STRIPE_INFO
        | AttrMask::MD_UPDATE
        | AttrMask::PATH_UPDATE
        | AttrMask::STATUS;
    if ctx.match_classes() {
        wanted |= ctx.class_attr_mask();
    }
    wanted |= ctx.config.alert_attr_mask();

    match ctx.catalog.get(&id, wanted).await {
        Ok(Some(attrs)) => {
            op.set_db_exists(DbExists::Yes);
            *op.attrs_mut() = attrs;
        }
        Ok(None) => {
            op.set_db_exists(DbExists::No);
            op.attrs_mut().clear_all();
        }
        Err(err) => {
            error!(entry = %id, error = %err, "error retrieving entry from catalog");
            op.set_db_exists(DbExists::No);
            op.attrs_mut().clear_all();
        }
    }

    let route = plan_journal_record(op, &ctx.config, now_secs());

    if let Some(rec) = op.record() {
        let fetch = op.fetch();
        debug!(
            record = %rec.rec_type,
            index = rec.index,
            entry = %id,
            name = rec.name.as_deref().unwrap_or("<null>"),
            getstripe = fetch.need_stripe,
            getattr = fetch.need_attr,
            getpath = fetch.need_path,
            getstatus = fetch.need_status,
            "journal record planned"
        );
    }

    Ok(route)
}

/// Derives the catalog operation and the fetch plan from a journal record
/// and the DB state established by the lookup.
pub(crate) fn plan_journal_record(
    op: &mut Operation,
    config: &PipelineConfig,
    now: i64,
) -> StageOutcome {
    let Some(rec) = op.record().cloned() else {
        return StageOutcome::Drop;
    };

    // Event-driven updates are allowed unless a freshness policy says the
    // cached value must not be refreshed.
    let mut allow_md_event = true;
    let mut allow_path_event = true;

    if rec.rec_type == RecordType::Unlink {
        debug!(
            entry = %op.describe(),
            known = op.db_exists().is_true(),
            last = ?rec.unlink_last,
            "unlink record"
        );

        if rec.unlink_last == Some(true) {
            if !config.settings.unlink.hsm_remove {
                // No HSM-side cleanup: remove the row if we have one,
                // otherwise the record only needs acknowledging.
                if op.db_exists().is_true() {
                    op.set_db_op(DbOp::Remove);
                    return StageOutcome::Next(StageId::DbApply);
                }
                return StageOutcome::Next(StageId::JournalAck);
            }
            // Backend cleanup pending: park the entry in the
            // deferred-removal queue whether or not it was in the DB.
            op.set_db_op(DbOp::SoftRemove);
            return StageOutcome::Next(StageId::DbApply);
        }

        // Last-reference unknown or not last: probe whether the file
        // still exists, and whether an orphan copy lingers in the backend.
        op.fetch_mut().need_attr = true;
        if config.settings.unlink.hsm_remove {
            op.fetch_mut().need_status = true;
        }
        if op.db_exists().is_true() {
            // The cached path may be the removed link.
            op.fetch_mut().need_path = true;
        }
    }

    if !op.db_exists().is_true() {
        // Record on an unknown entry: insert it, fetching everything the
        // journal does not carry.
        op.set_db_op(DbOp::Insert);
        op.attrs_mut().set_creation_time(rec.time);
        let fetch = op.fetch_mut();
        fetch.need_attr = true;
        fetch.need_path = true;
        fetch.need_stripe = true;
        fetch.need_status = true;
    } else {
        op.set_db_op(DbOp::Update);

        if op.attrs().is_empty() {
            // The lookup matched but returned nothing we asked for.
            op.fetch_mut().set_all();
        } else {
            let need_stripe = !op.attrs().has(AttrMask::STRIPE_INFO);
            let need_status = !op.attrs().has(AttrMask::STATUS);
            let (need_attr, md_event) = config
                .settings
                .md_update
                .evaluate(op.attrs().md_update(), now);
            let (need_path, path_event) = config
                .settings
                .path_update
                .evaluate(op.attrs().path_update(), now);
            allow_md_event = md_event;
            allow_path_event = path_event;

            let fetch = op.fetch_mut();
            fetch.need_stripe = fetch.need_stripe || need_stripe;
            fetch.need_status = fetch.need_status || need_status;
            fetch.need_attr = fetch.need_attr || need_attr;
            fetch.need_path = fetch.need_path || need_path;
        }
    }

    refine_from_record(op, &rec, allow_md_event, allow_path_event);

    StageOutcome::Next(StageId::GetInfoFs)
}

/// Second phase of the journal plan: overrides driven by the record class
/// itself.
fn refine_from_record(
    op: &mut Operation,
    rec: &JournalRecord,
    allow_md_event: bool,
    allow_path_event: bool,
) {
    if rec.rec_type == RecordType::Create {
        if op.db_exists().is_true() {
            // A CREATE for a known id means the filesystem was reformatted
            // or reinitialized and is reusing ids: refresh everything.
            warn!(
                entry = %op.describe(),
                path = op.attrs().fullpath().unwrap_or("<unknown>"),
                "CREATE record on already existing entry"
            );
            op.attrs_mut().set_creation_time(rec.time);
            op.fetch_mut().set_all();
        } else {
            // Brand new entry: its status is known without probing.
            let attrs = op.attrs_mut();
            attrs.set_status(hsm_pipeline_domain::HsmStatus::New);
            attrs.set_no_archive(false);
            attrs.set_last_archive(0);
            op.fetch_mut().need_status = false;
        }
    }

    if !op.db_exists().is_true() {
        return;
    }

    // Known entry: determine whether the record contradicts the cache.
    if allow_path_event {
        if let Some(rec_name) = rec.name.as_deref() {
            let mismatch = if let Some(name) = op.attrs().name() {
                name != rec_name
            } else if let Some(fullpath) = op.attrs().fullpath() {
                match fullpath.rsplit('/').next() {
                    Some(base) if !base.is_empty() => base != rec_name,
                    _ => false,
                }
            } else {
                false
            };
            if mismatch {
                debug!(
                    entry = %op.describe(),
                    record_name = rec_name,
                    "path refresh needed: record name does not match stored name"
                );
                op.fetch_mut().need_path = true;
            }
        }

        if rec.rec_type == RecordType::Rename {
            debug!(entry = %op.describe(), "path refresh needed: rename record");
            op.fetch_mut().need_path = true;
        }
    }

    if allow_md_event && rec.rec_type.implies_metadata_change() {
        op.fetch_mut().need_attr = true;
    }
}

async fn scan_lookup(
    op: &mut Operation,
    ctx: &StageContext,
) -> Result<StageOutcome, PipelineError> {
    let Some(id) = op.entry_id() else {
        return Err(PipelineError::invalid_operation(
            "entry id is expected to be set at STAGE_GET_INFO_DB",
        ));
    };
    if !op.attrs().has(AttrMask::FULLPATH) {
        error!(entry = %id, "missing info from FS scan");
        return Err(PipelineError::invalid_operation(
            "scan entries must carry a full path",
        ));
    }

    // The scanner provided path and metadata; only fetch what class
    // matching and alerting need beyond that.
    let mut extra = AttrMask::empty();
    if ctx.match_classes() {
        extra |= ctx.class_attr_mask();
    }
    extra |= ctx.config.alert_attr_mask();
    extra &= !op.attrs().mask();

    if !extra.is_empty() {
        match ctx.catalog.get(&id, extra).await {
            Ok(Some(attrs)) => {
                op.set_db_exists(DbExists::Yes);
                op.attrs_mut().merge_from(&attrs);
            }
            Ok(None) => op.set_db_exists(DbExists::No),
            Err(err) => {
                error!(entry = %id, error = %err, "error retrieving entry from catalog");
                op.set_db_exists(DbExists::No);
            }
        }
    } else {
        match ctx.catalog.exists(&id).await {
            Ok(true) => op.set_db_exists(DbExists::Yes),
            Ok(false) => op.set_db_exists(DbExists::No),
            Err(err) => {
                error!(entry = %id, error = %err, "error checking entry existence");
                op.set_db_exists(DbExists::No);
            }
        }
    }

    if !op.db_exists().is_true() {
        op.set_db_op(DbOp::Insert);
        op.attrs_mut().set_creation_time(now_secs());
        let fetch = op.fetch_mut();
        fetch.need_status = true;
        fetch.need_stripe = true;
        fetch.need_attr = false;
        fetch.need_path = false;
    } else {
        op.set_db_op(DbOp::Update);

        // A scan resynchronizes the catalog, so the status is always
        // refreshed; striping only when the catalog has none.
        let has_stripe = match ctx.catalog.check_stripe(&id).await {
            Ok(found) => found,
            Err(err) => {
                error!(entry = %id, error = %err, "error checking stripe record");
                false
            }
        };
        let fetch = op.fetch_mut();
        fetch.need_status = true;
        fetch.need_stripe = !has_stripe;
        fetch.need_attr = false;
        fetch.need_path = false;
    }

    Ok(StageOutcome::Next(StageId::GetInfoFs))
}
