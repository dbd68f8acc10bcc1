// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entry Processor Scheduler
//!
//! [`EntryProcessor`] accepts operations at the pipeline ingress and
//! dispatches them through the stage table with a pool of worker tasks
//! pulling from per-stage queues. The scheduler enforces:
//!
//! - **Concurrency flags**: parallel stages run unbounded, capped stages
//!   up to their thread limit, sequential stages one at a time.
//! - **Per-entry ordering**: at most one catalog lookup runs per entry id
//!   at any instant; same-id operations queue in arrival order. This is a
//!   map from id to a held slot, not a lock on the id space.
//! - **Journal acknowledgement order**: an ordering ledger of outstanding
//!   record indices; the acknowledgement stage only dispatches the
//!   operation holding the minimum outstanding index, and an operation
//!   dropped earlier releases its index. Acknowledgement callbacks
//!   therefore fire in strictly increasing index order with no gaps.
//!
//! Dispatch scans the stage table from the tail so later stages drain
//! before ingress pressure feeds the head; sequential stages are never
//! starved by a flood of new events.
//!
//! On shutdown the processor stops accepting, drains every in-flight
//! operation through its terminal stage, then cancels the workers.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use hsm_pipeline_bootstrap::shutdown::CancellationToken;
use hsm_pipeline_domain::entities::{build_pipeline, StageDescriptor, STAGE_COUNT};
use hsm_pipeline_domain::{EntryId, Operation, PipelineError, StageId};

use crate::application::stages::{self, StageContext, StageOutcome};
use crate::infrastructure::metrics::PipelineMetrics;

/// Queue depth and active handler count of one stage, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct StageStats {
    pub stage: StageId,
    pub queued: usize,
    pub running: usize,
}

struct SchedState {
    queues: [VecDeque<Operation>; STAGE_COUNT],
    running: [usize; STAGE_COUNT],
    /// Entry ids currently inside the id-constrained stage.
    busy_ids: HashSet<EntryId>,
    /// Record indices of journal operations alive in the pipeline.
    outstanding: BTreeSet<u64>,
    accepting: bool,
    in_flight: usize,
}

struct Inner {
    stages: [StageDescriptor; STAGE_COUNT],
    ctx: StageContext,
    state: Mutex<SchedState>,
    work_ready: Notify,
    idle: Notify,
    token: CancellationToken,
    metrics: PipelineMetrics,
}

/// The pipeline scheduler. Producers push operations with [`submit`];
/// the worker pool routes them through the stages until terminal
/// acknowledgement.
///
/// [`submit`]: EntryProcessor::submit
pub struct EntryProcessor {
    inner: Arc<Inner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl EntryProcessor {
    /// Builds the stage table from the configuration and starts the
    /// worker pool on the current tokio runtime.
    pub fn start(ctx: StageContext) -> Result<Self, PipelineError> {
        ctx.config.settings.validate()?;
        let worker_count = ctx.config.settings.worker_count;
        let db_apply_threads = ctx.config.settings.db_apply_threads;

        let metrics = PipelineMetrics::new()?;
        let inner = Arc::new(Inner {
            stages: build_pipeline(db_apply_threads),
            ctx,
            state: Mutex::new(SchedState {
                queues: std::array::from_fn(|_| VecDeque::new()),
                running: [0; STAGE_COUNT],
                busy_ids: HashSet::new(),
                outstanding: BTreeSet::new(),
                accepting: true,
                in_flight: 0,
            }),
            work_ready: Notify::new(),
            idle: Notify::new(),
            token: CancellationToken::new(),
            metrics,
        });

        let workers = (0..worker_count)
            .map(|index| {
                let inner = inner.clone();
                tokio::spawn(worker_loop(inner, index))
            })
            .collect();

        info!(worker_count, "entry processor started");
        Ok(Self {
            inner,
            workers: Mutex::new(workers),
        })
    }

    /// Accepts an operation at its ingress stage: GET_ID for scan
    /// entries, GET_INFO_DB for journal records, SCAN_SWEEP for
    /// end-of-scan markers.
    ///
    /// Returns [`PipelineError::ShuttingDown`] once shutdown has begun;
    /// the rejected operation is released without its callback firing.
    pub fn submit(&self, op: Operation) -> Result<(), PipelineError> {
        {
            let mut state = self.inner.state.lock();
            if !state.accepting {
                return Err(PipelineError::ShuttingDown);
            }
            if let Some(index) = op.record_index() {
                state.outstanding.insert(index);
            }
            state.in_flight += 1;
            trace!(op = %op.describe(), stage = %op.stage(), "operation submitted");
            let slot = op.stage().index();
            state.queues[slot].push_back(op);
        }
        self.inner.metrics.record_submitted();
        self.inner.work_ready.notify_waiters();
        Ok(())
    }

    /// Waits until no operation is queued or running. Producers keep the
    /// pipeline busy; this is for scan barriers and tests.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.state.lock().in_flight == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Graceful shutdown: stop accepting, drain in-flight operations
    /// through their terminal stage, then stop the workers.
    pub async fn shutdown(&self) {
        {
            self.inner.state.lock().accepting = false;
        }
        debug!("entry processor draining");
        self.wait_idle().await;

        self.inner.token.cancel();
        self.inner.work_ready.notify_waiters();

        let workers = std::mem::take(&mut *self.workers.lock());
        for result in futures::future::join_all(workers).await {
            if let Err(err) = result {
                error!(error = %err, "pipeline worker terminated abnormally");
            }
        }
        info!("entry processor stopped");
    }

    /// Per-stage queue depths and active handler counts.
    pub fn stage_stats(&self) -> Vec<StageStats> {
        let state = self.inner.state.lock();
        StageId::ALL
            .iter()
            .map(|&stage| StageStats {
                stage,
                queued: state.queues[stage.index()].len(),
                running: state.running[stage.index()],
            })
            .collect()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.inner.metrics
    }
}

async fn worker_loop(inner: Arc<Inner>, index: usize) {
    debug!(worker = index, "pipeline worker starting");
    loop {
        // Register for wakeups before checking the queues, so work queued
        // in between is not missed.
        let notified = inner.work_ready.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if let Some((stage, mut op)) = inner.try_dispatch() {
            let outcome = stages::run_stage(stage, &mut op, &inner.ctx).await;
            inner.complete(stage, op, outcome);
            continue;
        }

        if inner.token.is_cancelled() {
            break;
        }
        notified.await;
    }
    debug!(worker = index, "pipeline worker stopped");
}

impl Inner {
    /// Picks the next runnable operation, honoring every stage's flags.
    /// Scans from the tail of the pipeline so later stages drain first.
    fn try_dispatch(&self) -> Option<(StageId, Operation)> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        for desc in self.stages.iter().rev() {
            let slot = desc.id.index();
            if state.running[slot] >= desc.max_concurrent() {
                continue;
            }
            if state.queues[slot].is_empty() {
                continue;
            }

            let op = if desc.id == StageId::JournalAck {
                // Only the operation holding the minimum outstanding
                // record index may acknowledge; earlier records still in
                // flight keep later ones waiting here.
                match state.outstanding.first().copied() {
                    Some(low) => {
                        let pos = state.queues[slot]
                            .iter()
                            .position(|op| op.record_index() == Some(low));
                        pos.and_then(|p| state.queues[slot].remove(p))
                    }
                    None => None,
                }
            } else if desc.has_id_constraint() {
                // First queued operation whose id is not already inside
                // the stage; same-id followers keep arrival order because
                // the busy check skips them all.
                let busy_ids = &state.busy_ids;
                let pos = state.queues[slot].iter().position(|op| {
                    op.entry_id().map_or(true, |id| !busy_ids.contains(&id))
                });
                pos.and_then(|p| state.queues[slot].remove(p))
            } else {
                state.queues[slot].pop_front()
            };

            let Some(op) = op else {
                continue;
            };

            state.running[slot] += 1;
            if desc.has_id_constraint() {
                if let Some(id) = op.entry_id() {
                    state.busy_ids.insert(id);
                }
            }
            return Some((desc.id, op));
        }
        None
    }

    /// Applies a handler's routing decision: re-queue at the next stage,
    /// or release the operation (and its acknowledgement-ordering slot).
    fn complete(
        &self,
        stage: StageId,
        op: Operation,
        outcome: Result<StageOutcome, PipelineError>,
    ) {
        let routed = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    stage = %stage,
                    op = %op.describe(),
                    error = %err,
                    "stage handler failed, dropping operation"
                );
                self.metrics.record_error(stage);
                StageOutcome::Drop
            }
        };

        let mut became_idle = false;
        {
            let mut state = self.state.lock();
            state.running[stage.index()] -= 1;
            if self.stages[stage.index()].has_id_constraint() {
                if let Some(id) = op.entry_id() {
                    state.busy_ids.remove(&id);
                }
            }

            match routed {
                StageOutcome::Next(next) => {
                    debug_assert!(
                        next.index() >= stage.index(),
                        "pipeline routing must move forward: {} -> {}",
                        stage,
                        next
                    );
                    let mut op = op;
                    op.set_stage(next);
                    state.queues[next.index()].push_back(op);
                    self.metrics.record_processed(stage);
                }
                StageOutcome::Drop => {
                    // Release the acknowledgement-ordering slot so later
                    // records are not held back by a dropped one.
                    if let Some(index) = op.record_index() {
                        state.outstanding.remove(&index);
                    }
                    state.in_flight -= 1;
                    if state.in_flight == 0 {
                        became_idle = true;
                    }
                    self.metrics.record_dropped(stage);
                }
            }
        }

        self.work_ready.notify_waiters();
        if became_idle {
            self.idle.notify_waiters();
        }
    }
}
