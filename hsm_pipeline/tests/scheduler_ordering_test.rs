// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Scheduler-level guarantees: strict journal acknowledgement order, the
//! per-entry constraint at the catalog-lookup stage, ordering-slot release
//! on drops, and the drain-then-stop shutdown sequence.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::*;
use hsm_pipeline_domain::{
    EntryAttributes, EntryId, HsmStatus, JournalRecord, Operation, RecordType, StageId,
};

fn ack_recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn(u64) -> Box<dyn FnOnce() + Send>) {
    let order: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let handle = order.clone();
    let make = move |index: u64| {
        let order = handle.clone();
        Box::new(move || order.lock().unwrap().push(index)) as Box<dyn FnOnce() + Send>
    };
    (order, make)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn acknowledgements_fire_in_record_index_order() {
    let harness = start_pipeline(default_settings(), Vec::new());
    let (order, ack) = ack_recorder();

    // Jitter inside the catalog lookup makes operations overtake each
    // other at the parallel stages.
    harness.catalog.set_get_delay(Duration::from_millis(3));

    let count = 24u64;
    for index in 1..=count {
        // spread records across a handful of entries
        let id = EntryId::new(0x30, (index % 5) as u32);
        harness
            .probe
            .add_file(id, &format!("/x/{}", id), regular_stat(index, now()), HsmStatus::NoFlags);
        let rec = JournalRecord::new(index, RecordType::SetAttr, now());
        harness
            .processor
            .submit(Operation::from_journal(id, rec, Some(ack(index))))
            .unwrap();
    }
    harness.processor.wait_idle().await;

    let observed = order.lock().unwrap().clone();
    let expected: Vec<u64> = (1..=count).collect();
    assert_eq!(observed, expected, "callbacks must follow record order");

    harness.processor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_entry_lookups_never_run_concurrently() {
    let harness = start_pipeline(default_settings(), Vec::new());
    let (order, ack) = ack_recorder();
    let id = EntryId::new(0x31, 1);

    harness
        .probe
        .add_file(id, "/x/e", regular_stat(1, now()), HsmStatus::NoFlags);
    harness.catalog.set_get_delay(Duration::from_millis(5));

    for index in 10..=13 {
        let rec = JournalRecord::new(index, RecordType::SetAttr, now());
        harness
            .processor
            .submit(Operation::from_journal(id, rec, Some(ack(index))))
            .unwrap();
    }
    harness.processor.wait_idle().await;

    assert_eq!(
        harness.catalog.max_concurrent_gets(&id),
        1,
        "at most one catalog lookup per entry id at any instant"
    );
    assert_eq!(*order.lock().unwrap(), vec![10, 11, 12, 13]);
    assert!(harness.catalog.contains(&id), "records were applied");

    harness.processor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dropped_record_releases_its_ordering_slot() {
    let harness = start_pipeline(default_settings(), Vec::new());
    let (order, ack) = ack_recorder();

    let id_ok1 = EntryId::new(0x32, 1);
    let id_bad = EntryId::new(0x32, 2);
    let id_ok2 = EntryId::new(0x32, 3);
    harness
        .probe
        .add_file(id_ok1, "/x/ok1", regular_stat(1, now()), HsmStatus::NoFlags);
    harness
        .probe
        .add_file(id_bad, "/x/bad", regular_stat(1, now()), HsmStatus::NoFlags);
    harness
        .probe
        .add_file(id_ok2, "/x/ok2", regular_stat(1, now()), HsmStatus::NoFlags);

    // record 2's stat fails with a real error: the operation is dropped
    // before acknowledgement
    harness.probe.fail_stat(id_bad);

    for (index, id) in [(1, id_ok1), (2, id_bad), (3, id_ok2)] {
        let rec = JournalRecord::new(index, RecordType::SetAttr, now());
        harness
            .processor
            .submit(Operation::from_journal(id, rec, Some(ack(index))))
            .unwrap();
    }
    harness.processor.wait_idle().await;

    assert_eq!(
        *order.lock().unwrap(),
        vec![1, 3],
        "the dropped record must not hold back later acknowledgements"
    );

    harness.processor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_drains_in_flight_operations() {
    let harness = start_pipeline(default_settings(), Vec::new());
    let (order, ack) = ack_recorder();

    harness.catalog.set_get_delay(Duration::from_millis(2));
    let count = 10u64;
    for index in 1..=count {
        let id = EntryId::new(0x33, index as u32);
        harness
            .probe
            .add_file(id, &format!("/y/{}", index), regular_stat(1, now()), HsmStatus::NoFlags);
        let rec = JournalRecord::new(index, RecordType::Create, now());
        harness
            .processor
            .submit(Operation::from_journal(id, rec, Some(ack(index))))
            .unwrap();
    }

    harness.processor.shutdown().await;

    let observed = order.lock().unwrap().clone();
    assert_eq!(observed.len() as u64, count, "every accepted record acked");
    for index in 1..=count {
        let id = EntryId::new(0x33, index as u32);
        assert!(harness.catalog.contains(&id));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stage_stats_drain_to_zero() {
    let harness = start_pipeline(default_settings(), Vec::new());
    let id = EntryId::new(0x34, 1);
    harness
        .probe
        .add_file(id, "/x/s", regular_stat(1, now()), HsmStatus::NoFlags);

    let mut attrs = EntryAttributes::new();
    attrs.set_fullpath("/x/s");
    attrs.set_md_update(now());
    harness.processor.submit(Operation::from_scan(attrs)).unwrap();
    harness.processor.wait_idle().await;

    for stats in harness.processor.stage_stats() {
        assert_eq!(stats.queued, 0, "{} queue not drained", stats.stage);
        assert_eq!(stats.running, 0, "{} still running", stats.stage);
    }
    assert_eq!(harness.processor.metrics().in_flight(), 0);

    // the scan entry reached the catalog through every parallel stage
    let text = harness.processor.metrics().gather().unwrap();
    assert!(text.contains(StageId::DbApply.name()));

    harness.processor.shutdown().await;
}
