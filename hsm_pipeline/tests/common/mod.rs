// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Common Test Helpers
//!
//! In-memory collaborators for pipeline integration tests: a mock catalog
//! with concurrency tracking, a scripted filesystem probe, a recording
//! alert emitter and a static policy matcher, plus a harness that wires
//! them into a running entry processor.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hsm_pipeline::application::stages::StageContext;
use hsm_pipeline::infrastructure::config::{PipelineConfig, PipelineSettings};
use hsm_pipeline::infrastructure::runtime::EntryProcessor;
use hsm_pipeline_domain::{
    AlertEmitter, AlertRule, AttrMask, Catalog, CatalogFilter, EntryAlert, EntryAttributes,
    EntryId, FileKind, FileStat, FsProbe, HsmProbeResult, HsmStatus, PipelineError, PolicyMatcher,
    ProbeError, StripeInfo, StripeItem,
};

/// In-memory catalog with masked reads, a deferred-removal queue, named
/// variables, and instrumentation for concurrency assertions.
#[derive(Default)]
pub struct MockCatalog {
    rows: Mutex<HashMap<EntryId, EntryAttributes>>,
    stripes: Mutex<HashSet<EntryId>>,
    soft_rm: Mutex<HashMap<EntryId, (Option<String>, i64)>>,
    vars: Mutex<HashMap<String, String>>,
    /// force_commit transitions, in call order.
    commit_calls: Mutex<Vec<bool>>,
    /// When set, reads fail (to exercise the drain-don't-wedge policy).
    fail_reads: AtomicBool,
    /// Artificial latency inside get(), to widen race windows.
    get_delay: Mutex<Option<Duration>>,
    /// Per-id concurrent get() calls, and the maximum observed.
    active_gets: Mutex<HashMap<EntryId, usize>>,
    max_concurrent_gets: Mutex<HashMap<EntryId, usize>>,
}

impl MockCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, id: EntryId, attrs: EntryAttributes, has_stripe: bool) {
        self.rows.lock().unwrap().insert(id, attrs);
        if has_stripe {
            self.stripes.lock().unwrap().insert(id);
        }
    }

    pub fn row(&self, id: &EntryId) -> Option<EntryAttributes> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.rows.lock().unwrap().contains_key(id)
    }

    pub fn soft_removed(&self, id: &EntryId) -> Option<(Option<String>, i64)> {
        self.soft_rm.lock().unwrap().get(id).cloned()
    }

    pub fn var(&self, name: &str) -> Option<String> {
        self.vars.lock().unwrap().get(name).cloned()
    }

    pub fn commit_calls(&self) -> Vec<bool> {
        self.commit_calls.lock().unwrap().clone()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_get_delay(&self, delay: Duration) {
        *self.get_delay.lock().unwrap() = Some(delay);
    }

    pub fn max_concurrent_gets(&self, id: &EntryId) -> usize {
        self.max_concurrent_gets
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn get(
        &self,
        id: &EntryId,
        mask: AttrMask,
    ) -> Result<Option<EntryAttributes>, PipelineError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PipelineError::database_error("injected read failure"));
        }

        {
            let mut active = self.active_gets.lock().unwrap();
            let count = active.entry(*id).or_insert(0);
            *count += 1;
            let mut max = self.max_concurrent_gets.lock().unwrap();
            let peak = max.entry(*id).or_insert(0);
            *peak = (*peak).max(*count);
        }

        let delay = *self.get_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = self
            .rows
            .lock()
            .unwrap()
            .get(id)
            .map(|attrs| attrs.filtered(mask));

        {
            let mut active = self.active_gets.lock().unwrap();
            if let Some(count) = active.get_mut(id) {
                *count -= 1;
            }
        }

        Ok(result)
    }

    async fn exists(&self, id: &EntryId) -> Result<bool, PipelineError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PipelineError::database_error("injected read failure"));
        }
        Ok(self.rows.lock().unwrap().contains_key(id))
    }

    async fn check_stripe(&self, id: &EntryId) -> Result<bool, PipelineError> {
        Ok(self.stripes.lock().unwrap().contains(id))
    }

    async fn insert(&self, id: &EntryId, attrs: &EntryAttributes) -> Result<(), PipelineError> {
        self.update(id, attrs).await
    }

    async fn update(&self, id: &EntryId, attrs: &EntryAttributes) -> Result<(), PipelineError> {
        let mut rows = self.rows.lock().unwrap();
        rows.entry(*id)
            .or_insert_with(EntryAttributes::new)
            .merge_from(attrs);
        if attrs.has(AttrMask::STRIPE_INFO) {
            self.stripes.lock().unwrap().insert(*id);
        }
        Ok(())
    }

    async fn remove(&self, id: &EntryId) -> Result<(), PipelineError> {
        self.rows.lock().unwrap().remove(id);
        self.stripes.lock().unwrap().remove(id);
        Ok(())
    }

    async fn soft_remove(
        &self,
        id: &EntryId,
        fullpath: Option<&str>,
        deadline: i64,
    ) -> Result<(), PipelineError> {
        self.rows.lock().unwrap().remove(id);
        self.stripes.lock().unwrap().remove(id);
        self.soft_rm
            .lock()
            .unwrap()
            .insert(*id, (fullpath.map(str::to_owned), deadline));
        Ok(())
    }

    async fn mass_remove(&self, filter: &CatalogFilter) -> Result<u64, PipelineError> {
        let CatalogFilter::MdUpdateBefore(threshold) = *filter;
        let mut rows = self.rows.lock().unwrap();
        let doomed: Vec<EntryId> = rows
            .iter()
            .filter(|(_, attrs)| attrs.md_update().is_some_and(|t| t < threshold))
            .map(|(id, _)| *id)
            .collect();
        for id in &doomed {
            rows.remove(id);
            self.stripes.lock().unwrap().remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn set_var(&self, name: &str, value: &str) -> Result<(), PipelineError> {
        self.vars
            .lock()
            .unwrap()
            .insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    async fn get_var(&self, name: &str) -> Result<Option<String>, PipelineError> {
        Ok(self.vars.lock().unwrap().get(name).cloned())
    }

    async fn force_commit(&self, enable: bool) -> Result<(), PipelineError> {
        self.commit_calls.lock().unwrap().push(enable);
        Ok(())
    }
}

/// Scripted filesystem: tests register files; probes answer from the
/// script and report `Missing` for anything else.
#[derive(Default)]
pub struct ScriptedProbe {
    by_path: Mutex<HashMap<String, EntryId>>,
    paths: Mutex<HashMap<EntryId, String>>,
    stats: Mutex<HashMap<EntryId, FileStat>>,
    stripes: Mutex<HashMap<EntryId, (StripeInfo, Vec<StripeItem>)>>,
    statuses: Mutex<HashMap<EntryId, HsmProbeResult>>,
    stat_failures: Mutex<HashSet<EntryId>>,
}

pub fn regular_stat(size: u64, mtime: i64) -> FileStat {
    FileStat {
        kind: FileKind::Regular,
        size,
        blocks: size / 512,
        owner: "root".to_owned(),
        group: "root".to_owned(),
        last_access: mtime,
        last_mod: mtime,
    }
}

pub fn default_stripe() -> (StripeInfo, Vec<StripeItem>) {
    (
        StripeInfo {
            stripe_count: 1,
            stripe_size: 1 << 20,
            pool: "default".to_owned(),
        },
        vec![StripeItem { target: 0 }],
    )
}

impl ScriptedProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a regular file visible to every probe.
    pub fn add_file(&self, id: EntryId, path: &str, stat: FileStat, status: HsmStatus) {
        let id_path = format!("/.fid/{}", id);
        self.by_path.lock().unwrap().insert(path.to_owned(), id);
        self.by_path.lock().unwrap().insert(id_path, id);
        self.paths.lock().unwrap().insert(id, path.to_owned());
        self.stats.lock().unwrap().insert(id, stat);
        self.stripes.lock().unwrap().insert(id, default_stripe());
        self.statuses.lock().unwrap().insert(
            id,
            HsmProbeResult {
                status,
                no_release: false,
                no_archive: false,
            },
        );
    }

    pub fn set_status(&self, id: EntryId, result: HsmProbeResult) {
        self.statuses.lock().unwrap().insert(id, result);
    }

    pub fn set_stat(&self, id: EntryId, stat: FileStat) {
        self.stats.lock().unwrap().insert(id, stat);
    }

    pub fn rename(&self, id: EntryId, new_path: &str) {
        let mut paths = self.paths.lock().unwrap();
        if let Some(old) = paths.insert(id, new_path.to_owned()) {
            self.by_path.lock().unwrap().remove(&old);
        }
        self.by_path.lock().unwrap().insert(new_path.to_owned(), id);
    }

    /// Registers only the path ↔ id mapping: identification succeeds but
    /// every other probe reports the entry as vanished.
    pub fn add_path_mapping(&self, id: EntryId, path: &str) {
        self.by_path.lock().unwrap().insert(path.to_owned(), id);
        self.by_path
            .lock()
            .unwrap()
            .insert(format!("/.fid/{}", id), id);
        self.paths.lock().unwrap().insert(id, path.to_owned());
    }

    /// Makes lstat fail with a non-missing I/O error for this entry.
    pub fn fail_stat(&self, id: EntryId) {
        self.stat_failures.lock().unwrap().insert(id);
    }

    /// Makes every probe report the entry as vanished.
    pub fn remove_file(&self, id: EntryId) {
        let mut paths = self.paths.lock().unwrap();
        if let Some(path) = paths.remove(&id) {
            self.by_path.lock().unwrap().remove(&path);
        }
        self.by_path.lock().unwrap().remove(&format!("/.fid/{}", id));
        self.stats.lock().unwrap().remove(&id);
        self.stripes.lock().unwrap().remove(&id);
        self.statuses.lock().unwrap().remove(&id);
    }

    fn id_for(&self, path: &str) -> Result<EntryId, ProbeError> {
        self.by_path
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or(ProbeError::Missing)
    }
}

#[async_trait]
impl FsProbe for ScriptedProbe {
    fn id_path(&self, id: &EntryId) -> String {
        format!("/.fid/{}", id)
    }

    async fn path_to_id(&self, path: &str) -> Result<EntryId, ProbeError> {
        self.id_for(path)
    }

    async fn resolve_path(&self, id: &EntryId) -> Result<String, ProbeError> {
        self.paths
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(ProbeError::Missing)
    }

    async fn lstat(&self, path: &str) -> Result<FileStat, ProbeError> {
        let id = self.id_for(path)?;
        if self.stat_failures.lock().unwrap().contains(&id) {
            return Err(ProbeError::Io("injected stat failure".to_owned()));
        }
        self.stats
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(ProbeError::Missing)
    }

    async fn stripe(&self, path: &str) -> Result<(StripeInfo, Vec<StripeItem>), ProbeError> {
        let id = self.id_for(path)?;
        self.stripes
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(ProbeError::Missing)
    }

    async fn hsm_status(&self, path: &str) -> Result<HsmProbeResult, ProbeError> {
        let id = self.id_for(path)?;
        self.statuses
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .ok_or(ProbeError::Missing)
    }
}

/// Collects every emitted alert.
#[derive(Default)]
pub struct RecordingEmitter {
    alerts: Mutex<Vec<EntryAlert>>,
    received: tokio::sync::Notify,
}

impl RecordingEmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn alerts(&self) -> Vec<EntryAlert> {
        self.alerts.lock().unwrap().clone()
    }

    /// Waits until at least `count` alerts arrived (emission is out of
    /// band, so draining the pipeline is not enough).
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.received.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.alerts.lock().unwrap().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl AlertEmitter for RecordingEmitter {
    async fn raise(&self, alert: EntryAlert) {
        self.alerts.lock().unwrap().push(alert);
        self.received.notify_waiters();
    }
}

/// Matcher that stamps fixed class names, to exercise the class path.
pub struct StaticMatcher;

impl PolicyMatcher for StaticMatcher {
    fn attr_mask(&self) -> AttrMask {
        AttrMask::SIZE
    }

    fn check_policies(&self, _id: &EntryId, attrs: &mut EntryAttributes, _force_update: bool) {
        attrs.set_release_class("default");
        attrs.set_archive_class("default");
    }
}

/// A running pipeline plus handles to its collaborators.
pub struct TestHarness {
    pub processor: EntryProcessor,
    pub catalog: Arc<MockCatalog>,
    pub probe: Arc<ScriptedProbe>,
    pub alerts: Arc<RecordingEmitter>,
}

pub fn start_pipeline(settings: PipelineSettings, rules: Vec<AlertRule>) -> TestHarness {
    let catalog = MockCatalog::new();
    let probe = ScriptedProbe::new();
    let alerts = RecordingEmitter::new();

    let ctx = StageContext::new(
        Arc::new(PipelineConfig::new(settings, rules)),
        catalog.clone(),
        probe.clone(),
        alerts.clone(),
        None,
    );
    let processor = EntryProcessor::start(ctx).expect("start entry processor");

    TestHarness {
        processor,
        catalog,
        probe,
        alerts,
    }
}

pub fn default_settings() -> PipelineSettings {
    PipelineSettings {
        worker_count: 4,
        ..Default::default()
    }
}
