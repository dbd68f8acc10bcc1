// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Layer
//!
//! Concrete runtime and backends behind the domain ports: the scheduler
//! that drives operations through the stages, the SQLite catalog, and the
//! ambient services (configuration, logging, metrics).

pub mod config;
pub mod logging;
pub mod metrics;
pub mod repositories;
pub mod runtime;
