// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! Manages graceful shutdown across the pipeline's components.
//!
//! The pattern: the entry processor stops accepting new operations and
//! drains the ones in flight through their terminal stage; once drained,
//! the [`CancellationToken`] is cancelled so the worker tasks exit. The
//! [`ShutdownCoordinator`] bounds the whole sequence with a grace period
//! so a wedged collaborator (catalog, probe library) cannot hold the
//! process hostage.
//!
//! ## Usage
//!
//! ```rust
//! use hsm_pipeline_bootstrap::shutdown::ShutdownCoordinator;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let coordinator = ShutdownCoordinator::new(Duration::from_secs(30));
//! let token = coordinator.token();
//!
//! // Workers watch the token:
//! tokio::spawn(async move {
//!     token.cancelled().await;
//!     // exit the work loop
//! });
//!
//! // On SIGTERM:
//! coordinator.initiate_shutdown();
//! if !coordinator.wait_for_shutdown().await {
//!     eprintln!("grace period expired");
//! }
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Default grace period for graceful shutdown (in seconds)
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 30;

/// Cancellation token for signaling shutdown.
///
/// Lightweight, cloneable, and safe to hand to every worker task.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token, waking all waiters.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Check if cancelled (non-blocking)
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for cancellation (async)
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Sequences graceful shutdown with a grace period.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    grace_period: Duration,
    shutdown_initiated: Arc<AtomicBool>,
    shutdown_complete: Arc<Notify>,
    completed: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace_period,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_complete: Arc::new(Notify::new()),
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Token for worker tasks. Clones share the same cancellation state.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Initiate graceful shutdown: set the flag and cancel all tokens.
    /// Idempotent.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!(
                grace_period_secs = self.grace_period.as_secs(),
                "initiating graceful shutdown"
            );
            self.token.cancel();
        }
    }

    /// Wait for shutdown completion or grace-period expiry.
    ///
    /// Returns `true` if the drain completed within the grace period.
    pub async fn wait_for_shutdown(&self) -> bool {
        if !self.is_shutting_down() {
            tracing::warn!("wait_for_shutdown called but shutdown not initiated");
            return true;
        }
        // Register interest before checking the flag so a completion
        // landing in between is not lost.
        let notified = self.shutdown_complete.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.completed.load(Ordering::SeqCst) {
            return true;
        }

        tokio::select! {
            _ = notified => {
                tracing::info!("shutdown completed gracefully");
                true
            }
            _ = tokio::time::sleep(self.grace_period) => {
                tracing::warn!("shutdown grace period expired");
                false
            }
        }
    }

    /// Signal that the drain finished and all resources are released.
    pub fn complete_shutdown(&self) {
        self.completed.store(true, Ordering::SeqCst);
        self.shutdown_complete.notify_waiters();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS))
    }
}
