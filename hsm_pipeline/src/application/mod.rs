// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Layer
//!
//! The stage handlers, i.e. the pipeline's semantics. Each handler receives
//! the operation it exclusively owns plus the shared [`stages::StageContext`]
//! and returns a routing decision; the scheduler in the infrastructure
//! layer enforces concurrency and ordering around them.

pub mod stages;
