// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Signal Handling
//!
//! Wires Unix termination signals to shutdown initiation. The daemon
//! spawns [`listen`] once at startup; the first SIGTERM, SIGINT or SIGHUP
//! initiates graceful shutdown through the coordinator.

use std::io;

use tokio::signal::unix::{signal, SignalKind};

use crate::shutdown::ShutdownCoordinator;

/// Waits for a termination signal and initiates shutdown.
///
/// Returns after shutdown has been initiated, or an error if signal
/// handlers could not be registered.
pub async fn listen(coordinator: ShutdownCoordinator) -> io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("received SIGINT, initiating graceful shutdown");
        }
        _ = sighup.recv() => {
            tracing::info!("received SIGHUP, initiating graceful shutdown");
        }
    }

    coordinator.initiate_shutdown();
    Ok(())
}
