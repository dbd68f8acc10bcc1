// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite catalog backend: masked reads and writes, striping tables, the
//! deferred-removal queue, mass removal, named variables, commit
//! batching, and one full pipeline pass on the real backend.

mod common;

use std::sync::Arc;

use common::*;
use hsm_pipeline::application::stages::StageContext;
use hsm_pipeline::infrastructure::config::PipelineConfig;
use hsm_pipeline::infrastructure::repositories::SqliteCatalog;
use hsm_pipeline::infrastructure::runtime::EntryProcessor;
use hsm_pipeline_domain::{
    AttrMask, Catalog, CatalogFilter, EntryAttributes, EntryId, HsmStatus, JournalRecord,
    Operation, RecordType, StripeInfo, StripeItem, LAST_SCAN_VAR,
};

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn sample_attrs() -> EntryAttributes {
    let mut attrs = EntryAttributes::new();
    attrs.set_fullpath("/fs/dir/file");
    attrs.set_name("file");
    attrs.set_owner("alice");
    attrs.set_group("users");
    attrs.set_size(1 << 20);
    attrs.set_status(HsmStatus::Modified);
    attrs.set_creation_time(1_000);
    attrs.set_md_update(2_000);
    attrs
}

#[tokio::test]
async fn masked_get_returns_only_requested_fields() -> anyhow::Result<()> {
    let catalog = SqliteCatalog::in_memory().await?;
    let id = EntryId::new(1, 1);
    catalog.insert(&id, &sample_attrs()).await?;

    let got = catalog
        .get(&id, AttrMask::FULLPATH | AttrMask::SIZE | AttrMask::LAST_ARCHIVE)
        .await?
        .expect("row exists");

    assert_eq!(got.fullpath(), Some("/fs/dir/file"));
    assert_eq!(got.size(), Some(1 << 20));
    assert_eq!(got.status(), None, "status not requested");
    assert_eq!(got.last_archive(), None, "requested but never written");
    Ok(())
}

#[tokio::test]
async fn get_unknown_id_is_none() -> anyhow::Result<()> {
    let catalog = SqliteCatalog::in_memory().await?;
    let got = catalog.get(&EntryId::new(9, 9), AttrMask::FULLPATH).await?;
    assert!(got.is_none());
    assert!(!catalog.exists(&EntryId::new(9, 9)).await?);
    Ok(())
}

#[tokio::test]
async fn update_touches_only_masked_columns() -> anyhow::Result<()> {
    let catalog = SqliteCatalog::in_memory().await?;
    let id = EntryId::new(1, 2);
    catalog.insert(&id, &sample_attrs()).await?;

    let mut patch = EntryAttributes::new();
    patch.set_size(0);
    patch.set_md_update(3_000);
    catalog.update(&id, &patch).await?;

    let got = catalog
        .get(&id, AttrMask::SIZE | AttrMask::MD_UPDATE | AttrMask::FULLPATH)
        .await?
        .expect("row exists");
    assert_eq!(got.size(), Some(0));
    assert_eq!(got.md_update(), Some(3_000));
    assert_eq!(got.fullpath(), Some("/fs/dir/file"), "unmasked field kept");
    Ok(())
}

#[tokio::test]
async fn stripe_round_trip_and_check() {
    let catalog = SqliteCatalog::in_memory().await.unwrap();
    let id = EntryId::new(2, 1);
    assert!(!catalog.check_stripe(&id).await.unwrap());

    let mut attrs = EntryAttributes::new();
    attrs.set_fullpath("/fs/striped");
    attrs.set_stripe_info(StripeInfo {
        stripe_count: 4,
        stripe_size: 1 << 20,
        pool: "archive".to_owned(),
    });
    attrs.set_stripe_items(vec![
        StripeItem { target: 3 },
        StripeItem { target: 7 },
        StripeItem { target: 1 },
        StripeItem { target: 5 },
    ]);
    catalog.insert(&id, &attrs).await.unwrap();

    assert!(catalog.check_stripe(&id).await.unwrap());
    let got = catalog
        .get(&id, AttrMask::STRIPE_INFO | AttrMask::STRIPE_ITEMS)
        .await
        .unwrap()
        .unwrap();
    let info = got.stripe_info().expect("stripe info");
    assert_eq!(info.stripe_count, 4);
    assert_eq!(info.pool, "archive");
    let items: Vec<u32> = got
        .stripe_items()
        .expect("stripe items")
        .iter()
        .map(|item| item.target)
        .collect();
    assert_eq!(items, vec![3, 7, 1, 5], "item order preserved");
}

#[tokio::test]
async fn remove_deletes_row_and_stripe() {
    let catalog = SqliteCatalog::in_memory().await.unwrap();
    let id = EntryId::new(2, 2);
    let mut attrs = sample_attrs();
    attrs.set_stripe_info(StripeInfo::default());
    catalog.insert(&id, &attrs).await.unwrap();

    catalog.remove(&id).await.unwrap();
    assert!(!catalog.exists(&id).await.unwrap());
    assert!(!catalog.check_stripe(&id).await.unwrap());
}

#[tokio::test]
async fn soft_remove_moves_row_to_deferred_queue() {
    let catalog = SqliteCatalog::in_memory().await.unwrap();
    let id = EntryId::new(2, 3);
    catalog.insert(&id, &sample_attrs()).await.unwrap();

    let deadline = now() + 3600;
    catalog
        .soft_remove(&id, Some("/fs/dir/file"), deadline)
        .await
        .unwrap();

    assert!(!catalog.exists(&id).await.unwrap(), "row left the main table");

    // soft-removing an id that was never cataloged still queues it
    let ghost = EntryId::new(2, 4);
    catalog.soft_remove(&ghost, None, deadline).await.unwrap();
    assert!(!catalog.exists(&ghost).await.unwrap());
}

#[tokio::test]
async fn mass_remove_honors_md_update_filter() {
    let catalog = SqliteCatalog::in_memory().await.unwrap();
    let threshold = 10_000;

    for (oid, md_update) in [(1u32, 9_000), (2, 9_999), (3, 10_000), (4, 12_000)] {
        let mut attrs = EntryAttributes::new();
        attrs.set_md_update(md_update);
        catalog.insert(&EntryId::new(3, oid), &attrs).await.unwrap();
    }

    let removed = catalog
        .mass_remove(&CatalogFilter::MdUpdateBefore(threshold))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert!(!catalog.exists(&EntryId::new(3, 1)).await.unwrap());
    assert!(!catalog.exists(&EntryId::new(3, 2)).await.unwrap());
    assert!(catalog.exists(&EntryId::new(3, 3)).await.unwrap());
    assert!(catalog.exists(&EntryId::new(3, 4)).await.unwrap());
}

#[tokio::test]
async fn vars_round_trip() {
    let catalog = SqliteCatalog::in_memory().await.unwrap();
    assert_eq!(catalog.get_var(LAST_SCAN_VAR).await.unwrap(), None);

    catalog.set_var(LAST_SCAN_VAR, "1700000000").await.unwrap();
    assert_eq!(
        catalog.get_var(LAST_SCAN_VAR).await.unwrap().as_deref(),
        Some("1700000000")
    );

    catalog.set_var(LAST_SCAN_VAR, "1700000100").await.unwrap();
    assert_eq!(
        catalog.get_var(LAST_SCAN_VAR).await.unwrap().as_deref(),
        Some("1700000100")
    );
}

#[tokio::test]
async fn batched_writes_survive_forced_flush_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");

    {
        let catalog = SqliteCatalog::from_file(&path, 16).await.unwrap();
        for oid in 1..=5u32 {
            let mut attrs = EntryAttributes::new();
            attrs.set_size(oid as u64);
            catalog.insert(&EntryId::new(4, oid), &attrs).await.unwrap();
        }
        // the batch is still open; forcing commit flushes it
        catalog.force_commit(true).await.unwrap();
    }

    let reopened = SqliteCatalog::from_file(&path, 16).await.unwrap();
    for oid in 1..=5u32 {
        assert!(
            reopened.exists(&EntryId::new(4, oid)).await.unwrap(),
            "row {} persisted",
            oid
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_flow_on_sqlite_backend() {
    let catalog = Arc::new(SqliteCatalog::in_memory().await.unwrap());
    let probe = ScriptedProbe::new();
    let alerts = RecordingEmitter::new();

    let ctx = StageContext::new(
        Arc::new(PipelineConfig::new(default_settings(), Vec::new())),
        catalog.clone(),
        probe.clone(),
        alerts.clone(),
        None,
    );
    let processor = EntryProcessor::start(ctx).unwrap();

    let id = EntryId::new(5, 1);
    let t = now();
    probe.add_file(id, "/x/sq", regular_stat(2048, t), HsmStatus::NoFlags);

    let rec = JournalRecord::new(1, RecordType::Create, t).with_name("sq");
    processor
        .submit(Operation::from_journal(id, rec, None))
        .unwrap();
    processor.wait_idle().await;

    let row = catalog
        .get(
            &id,
            AttrMask::FULLPATH | AttrMask::STATUS | AttrMask::CREATION_TIME | AttrMask::SIZE,
        )
        .await
        .unwrap()
        .expect("entry inserted through the pipeline");
    assert_eq!(row.fullpath(), Some("/x/sq"));
    assert_eq!(row.status(), Some(HsmStatus::New));
    assert_eq!(row.creation_time(), Some(t));
    assert_eq!(row.size(), Some(2048));
    assert!(catalog.check_stripe(&id).await.unwrap());

    processor.shutdown().await;
}
