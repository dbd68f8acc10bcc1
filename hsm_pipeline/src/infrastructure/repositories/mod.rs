// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Catalog Backends
//!
//! Concrete implementations of the domain `Catalog` port. The bundled
//! backend is SQLite; it is the reason the DB-apply stage defaults to a
//! single-thread cap (SQLite locks the whole store for writes).

pub mod sqlite_catalog;

pub use sqlite_catalog::SqliteCatalog;
